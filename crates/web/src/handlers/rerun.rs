use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use recheck_core::AppError;
use recheck_github::rerun::run_pr_checks;

use crate::AppState;

/// Manual trigger: re-run matching checks on every open pull request.
pub async fn rerun_pr_checks(State(state): State<AppState>) -> Result<Response, AppError> {
    run_pr_checks(state.github.as_ref(), &state.config.rerun, None).await?;
    Ok((StatusCode::OK, "Triggered re-run of all open PR checks.").into_response())
}
