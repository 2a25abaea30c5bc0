use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

mod rerun;
mod webhook;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/webhook", post(webhook::webhook))
        .route("/rerun-pr-checks", post(rerun::rerun_pr_checks))
}

async fn index() -> &'static str { "Jira webhook server is running." }
