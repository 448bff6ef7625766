//! Worktree git-automation helpers (§4.8 merge mechanics), grounded in the
//! teacher's `worktree/merge.rs` `tokio::process::Command` idiom.

use std::path::Path;

use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("git command failed to spawn: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("rebase conflict, aborted: {0}")]
    RebaseConflict(String),
    #[error("force-with-lease push failed: {0}")]
    PushFailed(String),
}

async fn run_git(worktree: &Path, args: &[&str]) -> Result<std::process::Output, WorktreeError> {
    Command::new("git").args(args).current_dir(worktree).output().await.map_err(WorktreeError::Spawn)
}

/// The CIMerger retry path's rebase mechanics (§4.8): fetch origin, rebase
/// onto `origin/<target_branch>`; on conflict abort and return fatal;
/// otherwise push `--force-with-lease`.
pub async fn rebase_and_force_push(worktree: &Path, target_branch: &str) -> Result<(), WorktreeError> {
    info!(target_branch, worktree = %worktree.display(), "rebasing onto origin");
    run_git(worktree, &["fetch", "origin"]).await?;

    let rebase_output = run_git(worktree, &["rebase", &format!("origin/{target_branch}")]).await?;
    if !rebase_output.status.success() {
        let stderr = String::from_utf8_lossy(&rebase_output.stderr).to_string();
        warn!(%stderr, "rebase failed, aborting");
        run_git(worktree, &["rebase", "--abort"]).await.ok();
        return Err(WorktreeError::RebaseConflict(stderr));
    }

    let push_output = run_git(worktree, &["push", "--force-with-lease"]).await?;
    if !push_output.status.success() {
        let stderr = String::from_utf8_lossy(&push_output.stderr).to_string();
        return Err(WorktreeError::PushFailed(stderr));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn init_repo(dir: &Path) {
        run_git(dir, &["init"]).await.unwrap();
        run_git(dir, &["config", "user.email", "test@test.com"]).await.unwrap();
        run_git(dir, &["config", "user.name", "Test"]).await.unwrap();
        run_git(dir, &["commit", "--allow-empty", "-m", "initial"]).await.unwrap();
    }

    #[tokio::test]
    async fn rebase_without_remote_fails_at_fetch_or_rebase() {
        let dir = tempdir().unwrap();
        init_repo(dir.path()).await;
        let result = rebase_and_force_push(dir.path(), "main").await;
        assert!(result.is_err());
    }
}
