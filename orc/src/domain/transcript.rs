//! Transcript entries: the append-only record of a phase's turns.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orcstore::{IndexValue, Record, now_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptRole {
    User,
    Assistant,
    Chunk,
    Progress,
    Tool,
}

impl std::fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
            TranscriptRole::Chunk => write!(f, "chunk"),
            TranscriptRole::Progress => write!(f, "progress"),
            TranscriptRole::Tool => write!(f, "tool"),
        }
    }
}

/// One line in a task's transcript. Append-only; `message_uuid`, when present,
/// is the de-duplication key alongside `task_id` (a resumed session may
/// re-emit a turn the buffer already flushed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub task_id: String,
    pub phase: String,
    pub iteration: u32,
    pub role: TranscriptRole,
    pub content: String,
    pub timestamp: i64,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub message_uuid: Option<String>,
    pub updated_at: i64,
}

impl TranscriptEntry {
    pub fn new(task_id: impl Into<String>, phase: impl Into<String>, iteration: u32, role: TranscriptRole, content: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::now_v7().to_string(),
            task_id: task_id.into(),
            phase: phase.into(),
            iteration,
            role,
            content: content.into(),
            timestamp: now,
            input_tokens: None,
            output_tokens: None,
            message_uuid: None,
            updated_at: now,
        }
    }

    pub fn with_message_uuid(mut self, message_uuid: impl Into<String>) -> Self {
        self.message_uuid = Some(message_uuid.into());
        self
    }

    pub fn with_tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self
    }

    /// The de-duplication key: (task_id, message_uuid), only meaningful when
    /// `message_uuid` is present.
    pub fn dedup_key(&self) -> Option<(&str, &str)> {
        self.message_uuid.as_deref().map(|m| (self.task_id.as_str(), m))
    }
}

impl Record for TranscriptEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "transcripts"
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
    fn dedup_key_absent_without_message_uuid() {
        let entry = TranscriptEntry::new("t1", "implement", 1, TranscriptRole::Assistant, "hi");
        assert_eq!(entry.dedup_key(), None);
    }

    #[test]
    fn dedup_key_present_with_message_uuid() {
        let entry = TranscriptEntry::new("t1", "implement", 1, TranscriptRole::Assistant, "hi").with_message_uuid("m1");
        assert_eq!(entry.dedup_key(), Some(("t1", "m1")));
    }
}
