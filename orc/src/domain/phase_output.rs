//! The current artifact produced by a (task, phase) pair.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use orcstore::{IndexValue, Record, now_ms};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseOutput {
    pub id: String,
    pub task_id: String,
    pub phase: String,
    pub content: String,
    pub source: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PhaseOutput {
    pub fn new(task_id: impl Into<String>, phase: impl Into<String>, content: impl Into<String>, source: impl Into<String>) -> Self {
        let task_id = task_id.into();
        let phase = phase.into();
        let now = now_ms();
        Self {
            id: format!("{task_id}:{phase}"),
            task_id,
            phase,
            content: content.into(),
            source: source.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for PhaseOutput {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "phase_outputs"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("task_id".to_string(), IndexValue::String(self.task_id.clone()));
        fields.insert("phase".to_string(), IndexValue::String(self.phase.clone()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_task_and_phase_composite_so_saves_overwrite() {
        let a = PhaseOutput::new("t1", "research", "findings v1", "agent");
        let b = PhaseOutput::new("t1", "research", "findings v2", "agent");
        assert_eq!(a.id, b.id);
    }
}
