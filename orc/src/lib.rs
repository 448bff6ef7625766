//! orc - task-phase orchestration engine.
//!
//! Drives a task through an ordered sequence of phases (spec, research,
//! implement, test, review, docs, validate, finalize, ci-merge), invoking an
//! external LLM agent once per phase inside an isolated git worktree, gating
//! advancement on automatic or AI-assisted review, and retrying failed phases
//! with accumulated context before handing off to CI and merge.
//!
//! # Modules
//!
//! - [`domain`] - core persisted types (Task, ExecutionState, PhaseOutput, ...)
//! - [`turn`] - TurnExecutor: one LLM turn per call
//! - [`phase`] - PhaseExecutor, WorkflowExecutor, GateEvaluator, RetryContextBuilder, ArtifactStore
//! - [`backend`] - persistence over `orcstore`
//! - [`ci`] - CIMerger and hosting-provider client
//! - [`watcher`] - FileWatcher
//! - [`worktree`] - git worktree merge/rebase helpers
//! - [`events`] - EventSink and event types
//! - [`config`] - Config and defaults
//! - [`cli`] - command-line interface

pub mod backend;
pub mod ci;
pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod phase;
pub mod turn;
pub mod watcher;
pub mod worktree;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

/// Wires the concrete pieces together (§4.12) and drives one task through
/// the workflow. Hands off to [`ci::CIMerger`] afterward only when the task
/// finished and configuration calls for a CI wait; the hosting-provider
/// credentials (`ORC_GITHUB_OWNER`/`ORC_GITHUB_REPO`/`ORC_GITHUB_TOKEN`) are
/// read from the environment rather than the CLI, since they name a specific
/// remote rather than a per-run setting.
pub async fn run_task(task_id: &str, config: &config::Config, backend_path: &Path, worktree_path: &Path, agent_binary: &str, model: &str) -> eyre::Result<()> {
    let backend: Arc<dyn backend::Backend> = Arc::new(backend::JsonlBackend::open(backend_path)?);
    let turn_executor: Arc<dyn turn::TurnExecutor> = Arc::new(turn::SubprocessTurnExecutor::new(agent_binary));
    let event_sink = events::EventSink::default();

    let logger_handle = events::spawn_event_logger(event_sink.clone())?;

    let watcher_cancelled = Arc::new(AtomicBool::new(false));
    let watcher = watcher::FileWatcher::new(worktree_path, task_id, event_sink.clone());
    let watcher_flag = watcher_cancelled.clone();
    let watcher_handle = tokio::spawn(async move { watcher.run(watcher_flag).await });

    let workflow = phase::WorkflowExecutor::new(backend.clone(), turn_executor, event_sink.clone(), config.clone()).with_model(model);

    let result = workflow.run(task_id, worktree_path).await?;
    info!(task_id, status = %result.task_status, "workflow finished");

    watcher_cancelled.store(true, Ordering::SeqCst);
    watcher_handle.abort();
    logger_handle.abort();

    if result.task_status != domain::TaskStatus::Complete || !config.wait_for_ci {
        return Ok(());
    }

    let task = backend.load_task(task_id).await?;
    let Some(pr_number) = task.pr.number else {
        warn!(task_id, "wait_for_ci set but task has no PR number, skipping CI merge");
        return Ok(());
    };

    let (owner, repo, token_env) = match (std::env::var("ORC_GITHUB_OWNER"), std::env::var("ORC_GITHUB_REPO")) {
        (Ok(owner), Ok(repo)) => (owner, repo, "ORC_GITHUB_TOKEN"),
        _ => {
            warn!(task_id, "wait_for_ci set but ORC_GITHUB_OWNER/ORC_GITHUB_REPO are unset, skipping CI merge");
            return Ok(());
        }
    };

    let hosting = Arc::new(ci::GitHubProvider::new(owner, repo, token_env)?);
    let merger = ci::CIMerger::new(backend, hosting, event_sink, config.clone());
    let git_ref = task.pr.branch.clone().unwrap_or_else(|| task_id.to_string());
    merger.run(task_id, pr_number, &git_ref, worktree_path).await?;

    Ok(())
}
