//! Transient views of remote entities: fetched from the API for one
//! orchestration run and discarded afterward.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head_sha: String,
    pub head_branch: String,
    pub state: PullRequestState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Closed,
}

/// A discussion comment on a pull request. The body is only ever used for a
/// literal substring containment test against an issue key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub body: Option<String>,
}

/// A single reported CI result attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub id: u64,
    pub name: String,
    /// Identifier of the parent check suite, when the reporting integration
    /// grouped this run into one. Required for a check-suite re-request.
    pub check_suite_id: Option<u64>,
}

/// One execution of a CI workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    pub head_sha: String,
    pub head_branch: String,
    /// Status string as reported by the API ("completed", "in_progress", ...).
    pub status: String,
}

/// One named unit of work within a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
}
