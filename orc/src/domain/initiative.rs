//! Initiative: a group of tasks sharing a branch base.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use orcstore::{IndexValue, Record, now_ms};

use super::task::TaskStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Initiative {
    pub id: String,
    pub title: String,
    pub branch_base: Option<String>,
    pub task_ids: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Initiative {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            title: title.into(),
            branch_base: None,
            task_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_branch_base(mut self, branch_base: impl Into<String>) -> Self {
        self.branch_base = Some(branch_base.into());
        self
    }

    pub fn add_task(&mut self, task_id: impl Into<String>) {
        self.task_ids.push(task_id.into());
        self.updated_at = now_ms();
    }

    /// An initiative is mergeable once every member task has reached a
    /// terminal success state (`complete`).
    pub fn is_mergeable(&self, statuses: &HashMap<String, TaskStatus>) -> bool {
        !self.task_ids.is_empty()
            && self
                .task_ids
                .iter()
                .all(|id| matches!(statuses.get(id), Some(TaskStatus::Complete)))
    }
}

impl Record for Initiative {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "initiatives"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_initiative_is_not_mergeable() {
        let initiative = Initiative::new("i1", "launch");
        assert!(!initiative.is_mergeable(&HashMap::new()));
    }

    #[test]
    fn mergeable_only_once_all_tasks_complete() {
        let mut initiative = Initiative::new("i1", "launch");
        initiative.add_task("t1");
        initiative.add_task("t2");

        let mut statuses = HashMap::new();
        statuses.insert("t1".to_string(), TaskStatus::Complete);
        statuses.insert("t2".to_string(), TaskStatus::Running);
        assert!(!initiative.is_mergeable(&statuses));

        statuses.insert("t2".to_string(), TaskStatus::Complete);
        assert!(initiative.is_mergeable(&statuses));
    }
}
