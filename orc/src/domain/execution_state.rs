//! Per-task execution state: phase progress and the in-flight retry context.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::retry_context::RetryContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Blocked,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseStatus::Pending => write!(f, "pending"),
            PhaseStatus::Running => write!(f, "running"),
            PhaseStatus::Completed => write!(f, "completed"),
            PhaseStatus::Failed => write!(f, "failed"),
            PhaseStatus::Skipped => write!(f, "skipped"),
            PhaseStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// Tracks phase progress for a single task. Owned exclusively by the
/// workflow executor for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionState {
    phases: HashMap<String, PhaseStatus>,
    pub retry_context: Option<RetryContext>,
    pub last_session_id: Option<String>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, phase: &str) -> PhaseStatus {
        self.phases.get(phase).copied().unwrap_or_default()
    }

    /// Set `phase`'s status. Panics if this would put a second phase into
    /// `running` simultaneously — the invariant the workflow executor relies on.
    pub fn set_status(&mut self, phase: &str, status: PhaseStatus) {
        if status == PhaseStatus::Running {
            if let Some(running) = self.running_phase() {
                if running != phase {
                    panic!("ExecutionState: phase '{running}' is already running; cannot start '{phase}'");
                }
            }
        }
        self.phases.insert(phase.to_string(), status);
    }

    pub fn running_phase(&self) -> Option<&str> {
        self.phases
            .iter()
            .find(|(_, status)| **status == PhaseStatus::Running)
            .map(|(phase, _)| phase.as_str())
    }

    /// Reset `phase` and every phase strictly between it and `up_to` (exclusive
    /// of both endpoints is the caller's responsibility — the range passed in
    /// here is already resolved by the workflow executor) back to `pending`.
    pub fn reset_to_pending(&mut self, phases: impl IntoIterator<Item = String>) {
        for phase in phases {
            self.phases.insert(phase, PhaseStatus::Pending);
        }
    }
}
