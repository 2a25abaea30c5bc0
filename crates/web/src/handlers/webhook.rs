use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use recheck_core::AppError;
use recheck_github::rerun::run_pr_checks;

use crate::{AppState, jira::JiraEvent};

/// Jira webhook endpoint. Re-triggers checks on the open pull requests whose
/// discussion mentions the event's issue key.
pub async fn webhook(
    State(state): State<AppState>,
    JiraEvent { event }: JiraEvent,
) -> Result<Response, AppError> {
    let Some(issue) = &event.issue else {
        tracing::warn!("Received {} event with no issue", event.webhook_event);
        return Ok((StatusCode::OK, "No issue in event").into_response());
    };
    tracing::info!("Received {} event for issue {}", event.webhook_event, issue.key);
    run_pr_checks(state.github.as_ref(), &state.config.rerun, Some(&issue.key)).await?;
    Ok((StatusCode::OK, "Webhook received").into_response())
}
