//! Re-run orchestration: select open pull requests, match their CI checks
//! against the configured name pattern, and re-trigger the matches.

use std::collections::HashSet;

use anyhow::{Context, Result};
use recheck_core::{
    config::{RerunConfig, RerunGranularity},
    models::{CheckRun, PullRequest, WorkflowRun},
};
use regex::Regex;

use crate::CheckProvider;

/// Re-trigger CI checks on open pull requests.
///
/// When `issue_key` is given, only pull requests whose discussion mentions
/// the key are processed. Failures on individual pull requests, checks and
/// workflow runs are logged and skipped; only the initial pull request
/// listing and an invalid configured pattern abort the run.
pub async fn run_pr_checks(
    provider: &dyn CheckProvider,
    config: &RerunConfig,
    issue_key: Option<&str>,
) -> Result<()> {
    let pattern = Regex::new(config.check_pattern.as_deref().unwrap_or(".*"))
        .context("Invalid check name pattern")?;
    let pull_requests = select_pull_requests(provider, config, issue_key).await?;
    for pr in &pull_requests {
        let result = match config.granularity {
            RerunGranularity::CheckSuite => {
                rerun_check_suites(provider, config, &pattern, pr).await
            }
            RerunGranularity::WorkflowRun => {
                rerun_workflow_runs(provider, config, &pattern, pr).await
            }
        };
        if let Err(e) = result {
            tracing::error!("Failed to process PR #{}: {:?}", pr.number, e);
        }
    }
    Ok(())
}

/// All open pull requests, narrowed to those mentioning `issue_key` in a
/// discussion comment when a key is given.
///
/// Failure of the open-PR listing fails the whole run; a comment listing
/// failure skips that pull request only.
pub async fn select_pull_requests(
    provider: &dyn CheckProvider,
    config: &RerunConfig,
    issue_key: Option<&str>,
) -> Result<Vec<PullRequest>> {
    let open = provider
        .list_open_pull_requests(&config.owner, &config.repo)
        .await
        .context("Failed to list open pull requests")?;
    let Some(issue_key) = issue_key else {
        return Ok(open);
    };
    let mut selected = Vec::new();
    for pr in open {
        let comments = match provider.list_comments(&config.owner, &config.repo, pr.number).await {
            Ok(comments) => comments,
            Err(e) => {
                tracing::error!("Failed to list comments for PR #{}: {:?}", pr.number, e);
                continue;
            }
        };
        if comments.iter().any(|c| c.body.as_deref().is_some_and(|body| body.contains(issue_key)))
        {
            selected.push(pr);
        } else {
            tracing::info!(
                "Skipping PR #{} as it does not mention the issue key {}",
                pr.number,
                issue_key
            );
        }
    }
    Ok(selected)
}

/// Check runs on `pr`'s head commit whose name matches `pattern`.
pub async fn matching_checks(
    provider: &dyn CheckProvider,
    config: &RerunConfig,
    pattern: &Regex,
    pr: &PullRequest,
) -> Result<Vec<CheckRun>> {
    let checks = provider
        .list_check_runs(&config.owner, &config.repo, &pr.head_sha)
        .await
        .with_context(|| format!("Failed to list check runs for PR #{}", pr.number))?;
    Ok(checks
        .into_iter()
        .filter(|check| {
            if pattern.is_match(&check.name) {
                true
            } else {
                tracing::info!(
                    "Skipping check {} for PR #{} as it does not match the pattern",
                    check.name,
                    pr.number
                );
                false
            }
        })
        .collect())
}

/// Workflow runs behind `pr`'s matching checks, each paired with whether it
/// was accepted for re-run.
///
/// A run is accepted only if its head SHA equals the pull request's, its
/// status is "completed", and at least one of its job names matches
/// `pattern`. Job names need not equal the originating check name.
pub async fn matching_workflow_runs(
    provider: &dyn CheckProvider,
    config: &RerunConfig,
    pattern: &Regex,
    pr: &PullRequest,
) -> Result<Vec<(WorkflowRun, bool)>> {
    let checks = matching_checks(provider, config, pattern, pr).await?;
    let mut result = Vec::new();
    let mut seen = HashSet::new();
    for check in &checks {
        let runs = match provider
            .list_completed_workflow_runs(&config.owner, &config.repo, &pr.head_branch, &check.name)
            .await
        {
            Ok(runs) => runs,
            Err(e) => {
                tracing::error!(
                    "Failed to list workflow runs for check {} on PR #{}: {:?}",
                    check.name,
                    pr.number,
                    e
                );
                continue;
            }
        };
        for run in runs {
            if !seen.insert(run.id) {
                continue;
            }
            // The branch and status filters on the listing endpoint are
            // hints; verify both against the pull request before accepting.
            if run.head_sha != pr.head_sha || run.status != "completed" {
                tracing::info!(
                    "Skipping workflow run {} ({}) for PR #{}: head {}, status {}",
                    run.name,
                    run.id,
                    pr.number,
                    run.head_sha,
                    run.status
                );
                result.push((run, false));
                continue;
            }
            let jobs = match provider.list_jobs(&config.owner, &config.repo, run.id).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::error!(
                        "Failed to list jobs for workflow run {} on PR #{}: {:?}",
                        run.id,
                        pr.number,
                        e
                    );
                    continue;
                }
            };
            let matched = jobs.iter().any(|job| pattern.is_match(&job.name));
            if !matched {
                let job_names = jobs.iter().map(|job| job.name.as_str()).collect::<Vec<_>>();
                tracing::info!(
                    "Skipping workflow run {} ({}) for PR #{}: no job matches the pattern (jobs: {})",
                    run.name,
                    run.id,
                    pr.number,
                    job_names.join(", ")
                );
            }
            result.push((run, matched));
        }
    }
    Ok(result)
}

/// Re-request the check suite behind each matching check run.
async fn rerun_check_suites(
    provider: &dyn CheckProvider,
    config: &RerunConfig,
    pattern: &Regex,
    pr: &PullRequest,
) -> Result<()> {
    let checks = matching_checks(provider, config, pattern, pr).await?;
    for check in &checks {
        let Some(check_suite_id) = check.check_suite_id else {
            tracing::warn!("No check suite found for check {} on PR #{}", check.name, pr.number);
            continue;
        };
        match provider.rerequest_check_suite(&config.owner, &config.repo, check_suite_id).await {
            Ok(()) => tracing::info!(
                "Re-requested check suite {} for PR #{}, check {}",
                check_suite_id,
                pr.number,
                check.name
            ),
            Err(e) => tracing::error!(
                "Failed to re-request check suite {} for PR #{}, check {}: {:?}",
                check_suite_id,
                pr.number,
                check.name,
                e
            ),
        }
    }
    Ok(())
}

/// Re-run each accepted workflow run.
async fn rerun_workflow_runs(
    provider: &dyn CheckProvider,
    config: &RerunConfig,
    pattern: &Regex,
    pr: &PullRequest,
) -> Result<()> {
    let runs = matching_workflow_runs(provider, config, pattern, pr).await?;
    for (run, matched) in &runs {
        if !matched {
            continue;
        }
        match provider.rerun_workflow(&config.owner, &config.repo, run.id).await {
            Ok(()) => {
                tracing::info!("Re-ran workflow run {} ({}) for PR #{}", run.name, run.id, pr.number)
            }
            Err(e) => tracing::error!(
                "Failed to re-run workflow run {} ({}) for PR #{}: {:?}",
                run.name,
                run.id,
                pr.number,
                e
            ),
        }
    }
    Ok(())
}
