//! CIMerger (§4.8): after finalize, wait for remote CI and merge the PR,
//! retrying with a rebase pass when the base branch moved underneath it.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::config::Config;
use crate::domain::{CiCheckResult, CiOverallStatus, Task};
use crate::events::{EventSink, OrcEvent};
use crate::phase::ResolutionContext;
use crate::worktree;

use super::error::CiMergeError;
use super::hosting::{HostingError, HostingProvider, MergeOptions};

const MAX_MERGE_ATTEMPTS: u32 = 3;
const MAX_BACKOFF_SECS: u64 = 8;

pub struct CIMerger {
    backend: Arc<dyn Backend>,
    hosting: Arc<dyn HostingProvider>,
    event_sink: EventSink,
    config: Config,
}

impl CIMerger {
    pub fn new(backend: Arc<dyn Backend>, hosting: Arc<dyn HostingProvider>, event_sink: EventSink, config: Config) -> Self {
        Self { backend, hosting, event_sink, config }
    }

    /// Poll check-runs for `git_ref` until pass/fail/timeout, then merge the
    /// PR when configured to and CI passed.
    pub async fn run(&self, task_id: &str, pr_number: u64, git_ref: &str, worktree_path: &Path) -> Result<(), CiMergeError> {
        let result = self.poll_checks(task_id, git_ref).await?;

        if !self.config.merge_on_ci_pass {
            info!(task_id, "CI passed, merge disabled by config, stopping");
            return Ok(());
        }
        let _ = result;

        self.merge_with_retry(task_id, pr_number, worktree_path).await
    }

    async fn poll_checks(&self, task_id: &str, git_ref: &str) -> Result<CiCheckResult, CiMergeError> {
        let deadline = Instant::now() + self.config.ci_timeout;
        loop {
            let runs = self
                .hosting
                .get_check_runs(git_ref)
                .await
                .map_err(|err| CiMergeError::Provider(eyre::eyre!(err.to_string())))?;
            let result = CiCheckResult::from_check_runs(runs);
            info!(task_id, overall = ?result.overall, total = result.total, "CI poll tick");

            match result.overall {
                CiOverallStatus::Passed | CiOverallStatus::NoChecks => return Ok(result),
                CiOverallStatus::Failed => {
                    self.event_sink.publish(OrcEvent::Error {
                        task_id: task_id.to_string(),
                        context: "ci".to_string(),
                        message: format!("CI failed: {:?}", result.failed_names),
                    });
                    return Err(CiMergeError::CiFailed(result.failed_names));
                }
                CiOverallStatus::Pending => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(CiMergeError::CiTimeout);
                    }
                    let remaining = deadline - now;
                    tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
                }
            }
        }
    }

    async fn merge_with_retry(&self, task_id: &str, pr_number: u64, worktree_path: &Path) -> Result<(), CiMergeError> {
        let task = self
            .backend
            .load_task(task_id)
            .await
            .map_err(|err| CiMergeError::Provider(err.into()))?;

        let method = if self.config.merge_method.is_empty() { "squash".to_string() } else { self.config.merge_method.clone() };
        let commit_title = render_commit_title(&task, pr_number);
        let target_branch = task.pr.branch.clone().unwrap_or_else(|| "main".to_string());

        for attempt in 0..MAX_MERGE_ATTEMPTS {
            let sha = if self.config.verify_sha_on_merge {
                match self.hosting.get_pr(pr_number).await {
                    Ok(pr) => Some(pr.head_sha),
                    Err(err) => {
                        warn!(task_id, %err, "failed to fetch PR head sha for optimistic concurrency, continuing without it");
                        None
                    }
                }
            } else {
                None
            };

            let opts = MergeOptions {
                method: method.clone(),
                commit_title: Some(commit_title.clone()),
                commit_message: None,
                squash_commit_message: None,
                delete_branch: self.config.delete_branch_after_merge,
                sha,
            };

            match self.hosting.merge_pr(pr_number, opts).await {
                Ok(outcome) if outcome.merged => {
                    self.persist_merge(task_id, outcome.merge_commit_sha).await?;
                    return Ok(());
                }
                Ok(_) => {
                    return Err(CiMergeError::MergeFailed("hosting provider reported merge did not complete".to_string()));
                }
                Err(HostingError::Retryable(reason)) => {
                    warn!(task_id, attempt, %reason, "retryable merge failure, rebasing and retrying");
                    let backoff = Duration::from_secs(2u64.saturating_pow(attempt + 1).min(MAX_BACKOFF_SECS));
                    tokio::time::sleep(backoff).await;
                    worktree::rebase_and_force_push(worktree_path, &target_branch)
                        .await
                        .map_err(|err| CiMergeError::MergeFailed(err.to_string()))?;
                }
                Err(HostingError::Validation(reason)) => {
                    return Err(CiMergeError::MergeFailed(reason));
                }
                Err(HostingError::Other(err)) => {
                    return Err(CiMergeError::MergeFailed(err.to_string()));
                }
            }
        }

        Err(CiMergeError::MergeFailed("exhausted merge retry attempts".to_string()))
    }

    async fn persist_merge(&self, task_id: &str, merge_commit_sha: Option<String>) -> Result<(), CiMergeError> {
        let mut task = self
            .backend
            .load_task(task_id)
            .await
            .map_err(|err| CiMergeError::Provider(err.into()))?;
        task.mark_merged(merge_commit_sha);
        self.backend.save_task(&task).await.map_err(|err| CiMergeError::Provider(err.into()))?;
        self.event_sink.publish(OrcEvent::StateChanged {
            task_id: task_id.to_string(),
            status: "merged".to_string(),
        });
        Ok(())
    }
}

fn render_commit_title(task: &Task, pr_number: u64) -> String {
    let mut ctx = ResolutionContext::new();
    ctx.set("TASK_ID", Value::String(task.id.clone()));
    ctx.set("TASK_TITLE", Value::String(task.title.clone()));
    if let Some(branch) = &task.pr.branch {
        ctx.set("TASK_BRANCH", Value::String(branch.clone()));
    }
    format!("{} (#{pr_number})", ctx.render("[orc] {{TASK_ID}}: {{TASK_TITLE}}"))
}
