//! Task — the unit of work the engine drives through phases.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use orcstore::{IndexValue, Record, now_ms};

/// Relative sizing, set once at creation and never changed; it governs the
/// per-phase iteration budget (see `Weight::max_iterations`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weight {
    Trivial,
    Small,
    Medium,
    Large,
    Greenfield,
}

impl Weight {
    /// Default per-weight max-iterations budget for a phase (§4.2).
    pub fn max_iterations(&self) -> u32 {
        match self {
            Weight::Trivial => 5,
            Weight::Small => 10,
            Weight::Medium => 20,
            Weight::Large => 25,
            Weight::Greenfield => 30,
        }
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Weight::Trivial => write!(f, "trivial"),
            Weight::Small => write!(f, "small"),
            Weight::Medium => write!(f, "medium"),
            Weight::Large => write!(f, "large"),
            Weight::Greenfield => write!(f, "greenfield"),
        }
    }
}

/// Overall task status, distinct from the per-phase [`crate::domain::PhaseStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Blocked,
    Complete,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Blocked => write!(f, "blocked"),
            TaskStatus::Complete => write!(f, "complete"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Pull-request tracking info. `merged` only ever flips false → true.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrInfo {
    pub number: Option<u64>,
    pub branch: Option<String>,
    pub merged: bool,
    pub merge_commit_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub weight: Weight,
    pub status: TaskStatus,
    pub pr: PrInfo,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, description: impl Into<String>, category: impl Into<String>, weight: Weight) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            category: category.into(),
            weight,
            status: TaskStatus::Pending,
            pr: PrInfo::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }

    /// Merge `merged` monotonically: once true, setting false again is a no-op.
    pub fn mark_merged(&mut self, merge_commit_sha: Option<String>) {
        if self.pr.merged {
            return;
        }
        self.pr.merged = true;
        self.pr.merge_commit_sha = merge_commit_sha;
        self.updated_at = now_ms();
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "tasks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("category".to_string(), IndexValue::String(self.category.clone()));
        fields.insert("weight".to_string(), IndexValue::String(self.weight.to_string()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_max_iterations_matches_defaults() {
        assert_eq!(Weight::Trivial.max_iterations(), 5);
        assert_eq!(Weight::Greenfield.max_iterations(), 30);
    }

    #[test]
    fn mark_merged_is_monotonic() {
        let mut task = Task::new("t1", "Add search", "desc", "feature", Weight::Medium);
        task.mark_merged(Some("sha1".into()));
        assert!(task.pr.merged);
        task.mark_merged(Some("sha2".into()));
        // second call must not overwrite the sha of the first successful merge
        assert_eq!(task.pr.merge_commit_sha, Some("sha1".into()));
    }

    #[test]
    fn indexed_fields_cover_status_and_weight() {
        let task = Task::new("t1", "title", "desc", "bugfix", Weight::Small);
        let fields = task.indexed_fields();
        assert_eq!(fields.get("status"), Some(&IndexValue::String("pending".into())));
        assert_eq!(fields.get("weight"), Some(&IndexValue::String("small".into())));
    }
}
