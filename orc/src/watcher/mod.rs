//! FileWatcher (§4.10, ambient): background git-diff poller, grounded in the
//! teacher's `watcher/main_watcher.rs` poll-and-alert idiom.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::events::{EventSink, OrcEvent};

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

/// One changed path observed by a poll tick.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct FileChange {
    path: String,
    status: String,
    additions: u32,
    deletions: u32,
}

fn run_git(worktree: &Path, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new("git").args(args).current_dir(worktree).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

/// `git status --porcelain` for path/status, `git diff --numstat` for
/// additions/deletions on tracked files; combined and sorted so hashing is
/// order-independent (§5).
fn collect_changes(worktree: &Path) -> Vec<FileChange> {
    let porcelain = run_git(worktree, &["status", "--porcelain"]).unwrap_or_default();
    let numstat = run_git(worktree, &["diff", "--numstat"]).unwrap_or_default();

    let mut counts = std::collections::HashMap::new();
    for line in numstat.lines() {
        let mut fields = line.split('\t');
        let (Some(added), Some(deleted), Some(path)) = (fields.next(), fields.next(), fields.next()) else {
            continue;
        };
        counts.insert(path.to_string(), (added.parse().unwrap_or(0), deleted.parse().unwrap_or(0)));
    }

    let mut changes: Vec<FileChange> = porcelain
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let status = line[..2].trim().to_string();
            let path = line[3..].trim().to_string();
            let (additions, deletions) = counts.get(&path).copied().unwrap_or((0, 0));
            FileChange {
                path,
                status,
                additions,
                deletions,
            }
        })
        .collect();

    changes.sort();
    changes
}

fn content_hash(changes: &[FileChange]) -> u64 {
    let mut hasher = DefaultHasher::new();
    changes.hash(&mut hasher);
    hasher.finish()
}

/// Background poller over one task's worktree. Runs independently of the
/// phase loop; stopped via the same cancellation flag the WorkflowExecutor
/// holds for the task.
pub struct FileWatcher {
    worktree: PathBuf,
    task_id: String,
    event_sink: EventSink,
    poll_interval: Duration,
}

impl FileWatcher {
    pub fn new(worktree: impl Into<PathBuf>, task_id: impl Into<String>, event_sink: EventSink) -> Self {
        Self {
            worktree: worktree.into(),
            task_id: task_id.into(),
            event_sink,
            poll_interval: default_poll_interval(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs until `cancelled` is set. Each tick recomputes the change set and
    /// publishes `FilesChanged` only when its content hash differs from the
    /// previous tick's.
    pub async fn run(&self, cancelled: Arc<AtomicBool>) {
        let mut last_hash: Option<u64> = None;
        let mut interval = tokio::time::interval(self.poll_interval);

        while !cancelled.load(Ordering::SeqCst) {
            interval.tick().await;
            if cancelled.load(Ordering::SeqCst) {
                break;
            }

            if !self.worktree.exists() {
                warn!(task_id = %self.task_id, worktree = %self.worktree.display(), "worktree missing, skipping tick");
                continue;
            }

            let changes = collect_changes(&self.worktree);
            let hash = content_hash(&changes);

            match last_hash {
                None => {
                    debug!(task_id = %self.task_id, "initial worktree state observed");
                }
                Some(previous) if previous != hash => {
                    debug!(task_id = %self.task_id, count = changes.len(), "files changed");
                    self.event_sink.publish(OrcEvent::FilesChanged {
                        task_id: self.task_id.clone(),
                        paths: changes.into_iter().map(|change| change.path).collect(),
                    });
                }
                Some(_) => {}
            }
            last_hash = Some(hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo(dir: &Path) {
        std::process::Command::new("git").args(["init"]).current_dir(dir).output().unwrap();
        std::process::Command::new("git").args(["config", "user.email", "test@test.com"]).current_dir(dir).output().unwrap();
        std::process::Command::new("git").args(["config", "user.name", "Test"]).current_dir(dir).output().unwrap();
        std::process::Command::new("git").args(["commit", "--allow-empty", "-m", "initial"]).current_dir(dir).output().unwrap();
    }

    #[test]
    fn hash_is_order_independent() {
        let a = vec![
            FileChange { path: "b.rs".into(), status: "M".into(), additions: 1, deletions: 0 },
            FileChange { path: "a.rs".into(), status: "M".into(), additions: 0, deletions: 2 },
        ];
        let mut b = a.clone();
        b.reverse();
        a.clone().sort();
        let mut sorted_a = a.clone();
        sorted_a.sort();
        b.sort();
        assert_eq!(content_hash(&sorted_a), content_hash(&b));
    }

    #[tokio::test]
    async fn detects_new_untracked_file_on_next_tick() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;

        let cancelled = Arc::new(AtomicBool::new(false));
        let watcher = FileWatcher::new(dir.path(), "TASK-1", EventSink::default()).with_poll_interval(Duration::from_millis(20));
        let mut subscriber = watcher.event_sink.subscribe();

        let cancel_flag = cancelled.clone();
        let handle = tokio::spawn(async move { watcher.run(cancel_flag).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        std::fs::write(dir.path().join("new_file.txt"), "hello").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), subscriber.recv()).await.unwrap().unwrap();
        match event {
            OrcEvent::FilesChanged { task_id, paths } => {
                assert_eq!(task_id, "TASK-1");
                assert!(paths.iter().any(|path| path == "new_file.txt"));
            }
            other => panic!("expected FilesChanged, got {other:?}"),
        }

        cancelled.store(true, Ordering::SeqCst);
        handle.await.unwrap();
    }
}
