pub mod rerun;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use octocrab::{
    Octocrab,
    models::{Installation, IssueState, workflows::Run},
    params,
};
use recheck_core::{
    config::GitHubConfig,
    models::{CheckRun, Comment, Job, PullRequest, PullRequestState, WorkflowRun},
};

/// Operations the re-run orchestrator needs from the hosting platform.
///
/// The orchestrator depends only on this trait, so tests can substitute an
/// implementation returning fixed fixtures.
#[async_trait]
pub trait CheckProvider: Send + Sync {
    async fn list_open_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>>;

    async fn list_comments(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Comment>>;

    async fn list_check_runs(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<CheckRun>>;

    async fn rerequest_check_suite(
        &self,
        owner: &str,
        repo: &str,
        check_suite_id: u64,
    ) -> Result<()>;

    /// Workflow runs for the repository, filtered by head branch, run name
    /// and status "completed". The filters are best-effort hints; callers
    /// must re-verify what they care about.
    async fn list_completed_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        name: &str,
    ) -> Result<Vec<WorkflowRun>>;

    async fn list_jobs(&self, owner: &str, repo: &str, run_id: u64) -> Result<Vec<Job>>;

    async fn rerun_workflow(&self, owner: &str, repo: &str, run_id: u64) -> Result<()>;
}

#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
}

impl GitHub {
    /// Create a client for the configured repository. App credentials take
    /// precedence over a personal token; the client is then scoped to the
    /// app installation that covers the repository.
    pub async fn new(config: &GitHubConfig, owner: &str, repo: &str) -> Result<Arc<Self>> {
        let client = if let Some(app_config) = &config.app {
            let app_client = Octocrab::builder()
                .app(
                    app_config.id.into(),
                    jsonwebtoken::EncodingKey::from_rsa_pem(app_config.private_key.as_bytes())?,
                )
                .build()
                .context("Failed to create GitHub App client")?;
            let installation: Installation = app_client
                .get(format!("/repos/{owner}/{repo}/installation"), None::<&()>)
                .await
                .with_context(|| format!("Failed to resolve installation for {owner}/{repo}"))?;
            tracing::info!("Using app installation {} for {}/{}", installation.id, owner, repo);
            app_client.installation(installation.id)?
        } else if let Some(token) = &config.token {
            let client = Octocrab::builder()
                .personal_token(token.clone())
                .build()
                .context("Failed to create GitHub client")?;
            let profile = client.current().user().await.context("Failed to fetch current user")?;
            tracing::info!("Logged in as {}", profile.login);
            client
        } else {
            bail!("No GitHub credentials configured (set github.token or github.app)");
        };
        Ok(Arc::new(Self { client }))
    }
}

#[derive(serde::Serialize)]
struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    per_page: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

#[derive(serde::Deserialize)]
struct CheckRunList {
    total_count: u64,
    check_runs: Vec<ApiCheckRun>,
}

#[derive(serde::Deserialize)]
struct ApiCheckRun {
    id: u64,
    name: String,
    check_suite: Option<ApiCheckSuiteRef>,
}

#[derive(serde::Deserialize)]
struct ApiCheckSuiteRef {
    id: Option<u64>,
}

#[derive(serde::Deserialize)]
struct JobList {
    total_count: u64,
    jobs: Vec<ApiJob>,
}

#[derive(serde::Deserialize)]
struct ApiJob {
    id: u64,
    name: String,
}

fn pull_request_from_api(pr: octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        head_sha: pr.head.sha,
        head_branch: pr.head.ref_field,
        state: match pr.state {
            Some(IssueState::Open) => PullRequestState::Open,
            _ => PullRequestState::Closed,
        },
    }
}

fn workflow_run_from_api(run: Run) -> WorkflowRun {
    WorkflowRun {
        id: run.id.0,
        name: run.name,
        head_sha: run.head_sha,
        head_branch: run.head_branch,
        status: run.status,
    }
}

#[async_trait]
impl CheckProvider for GitHub {
    async fn list_open_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>> {
        let page = self
            .client
            .pulls(owner, repo)
            .list()
            .state(params::State::Open)
            .per_page(100)
            .send()
            .await?;
        let items = self.client.all_pages(page).await?;
        Ok(items.into_iter().map(pull_request_from_api).collect())
    }

    async fn list_comments(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Comment>> {
        let page =
            self.client.issues(owner, repo).list_comments(number).per_page(100).send().await?;
        let items = self.client.all_pages(page).await?;
        Ok(items.into_iter().map(|comment| Comment { body: comment.body }).collect())
    }

    async fn list_check_runs(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<CheckRun>> {
        // Not covered by a typed octocrab handler.
        let route = format!("/repos/{owner}/{repo}/commits/{sha}/check-runs");
        let mut check_runs = Vec::new();
        let mut page = 1u32;
        loop {
            let response: CheckRunList = self
                .client
                .get(&route, Some(&PageParams { per_page: Some(100), page: Some(page) }))
                .await?;
            let total_count = response.total_count as usize;
            if response.check_runs.is_empty() {
                break;
            }
            check_runs.extend(response.check_runs.into_iter().map(|check| CheckRun {
                id: check.id,
                name: check.name,
                check_suite_id: check.check_suite.and_then(|suite| suite.id),
            }));
            if check_runs.len() >= total_count {
                break;
            }
            page += 1;
        }
        Ok(check_runs)
    }

    async fn rerequest_check_suite(
        &self,
        owner: &str,
        repo: &str,
        check_suite_id: u64,
    ) -> Result<()> {
        let route = format!("/repos/{owner}/{repo}/check-suites/{check_suite_id}/rerequest");
        let response = self.client._post(route, None::<&()>).await?;
        if !response.status().is_success() {
            bail!("Check suite re-request returned {}", response.status());
        }
        Ok(())
    }

    async fn list_completed_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        name: &str,
    ) -> Result<Vec<WorkflowRun>> {
        let page = self
            .client
            .workflows(owner, repo)
            .list_all_runs()
            .branch(branch)
            .status("completed")
            .per_page(100)
            .send()
            .await?;
        let runs = self.client.all_pages(page).await?;
        // The runs endpoint has no name filter; apply it here.
        Ok(runs
            .into_iter()
            .filter(|run| run.name == name)
            .map(workflow_run_from_api)
            .collect())
    }

    async fn list_jobs(&self, owner: &str, repo: &str, run_id: u64) -> Result<Vec<Job>> {
        let route = format!("/repos/{owner}/{repo}/actions/runs/{run_id}/jobs");
        let mut jobs = Vec::new();
        let mut page = 1u32;
        loop {
            let response: JobList = self
                .client
                .get(&route, Some(&PageParams { per_page: Some(100), page: Some(page) }))
                .await?;
            let total_count = response.total_count as usize;
            if response.jobs.is_empty() {
                break;
            }
            jobs.extend(response.jobs.into_iter().map(|job| Job { id: job.id, name: job.name }));
            if jobs.len() >= total_count {
                break;
            }
            page += 1;
        }
        Ok(jobs)
    }

    async fn rerun_workflow(&self, owner: &str, repo: &str, run_id: u64) -> Result<()> {
        let route = format!("/repos/{owner}/{repo}/actions/runs/{run_id}/rerun");
        let response = self.client._post(route, None::<&()>).await?;
        if !response.status().is_success() {
            bail!("Workflow re-run returned {}", response.status());
        }
        Ok(())
    }
}
