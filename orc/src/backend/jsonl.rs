//! JSONL-backed Backend implementation, built directly on the `Record`/
//! `Store`/`Filter` abstraction already used for domain objects elsewhere
//! in this codebase (§4.11).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use orcstore::{Filter, IndexValue, Store};

use crate::domain::{Initiative, PhaseOutput, ReviewFinding, Task, TranscriptEntry};

use super::contract::Backend;
use super::error::BackendError;
use super::project::{ProjectInfo, detect_project};

pub struct JsonlBackend {
    store: Store,
    base_path: PathBuf,
}

impl JsonlBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let base_path = path.as_ref().to_path_buf();
        let store = Store::open(&base_path)?;
        Ok(Self { store, base_path })
    }
}

#[async_trait]
impl Backend for JsonlBackend {
    async fn save_task(&self, task: &Task) -> Result<(), BackendError> {
        self.store.create(task.clone())?;
        Ok(())
    }

    async fn load_task(&self, id: &str) -> Result<Task, BackendError> {
        self.store.get::<Task>(id).map_err(|e| match e {
            orcstore::StoreError::NotFound { .. } => BackendError::TaskNotFound(id.to_string()),
            other => other.into(),
        })
    }

    async fn load_all_tasks(&self) -> Result<Vec<Task>, BackendError> {
        Ok(self.store.list::<Task>(&[])?)
    }

    async fn save_spec(&self, task_id: &str, content: &str, source: &str) -> Result<(), BackendError> {
        let output = PhaseOutput::new(task_id, "spec", content, source);
        self.store.create(output)?;
        Ok(())
    }

    async fn load_spec(&self, task_id: &str) -> Result<PhaseOutput, BackendError> {
        self.store
            .get::<PhaseOutput>(&format!("{task_id}:spec"))
            .map_err(|_| BackendError::SpecNotFound(task_id.to_string()))
    }

    async fn save_phase_output(&self, output: &PhaseOutput) -> Result<(), BackendError> {
        self.store.create(output.clone())?;
        Ok(())
    }

    async fn get_phase_outputs_for_task(&self, task_id: &str) -> Result<Vec<PhaseOutput>, BackendError> {
        Ok(self
            .store
            .list::<PhaseOutput>(&[Filter::eq("task_id", IndexValue::String(task_id.to_string()))])?)
    }

    /// Append-with-dedup: an entry whose `(task_id, message_uuid)` already
    /// exists in the store is skipped (I2 / S6).
    async fn save_transcript_batch(&self, entries: &[TranscriptEntry]) -> Result<(), BackendError> {
        let existing = self
            .get_transcripts(entries.first().map(|e| e.task_id.as_str()).unwrap_or_default())
            .await
            .unwrap_or_default();
        let mut seen: std::collections::HashSet<(String, String)> = existing
            .iter()
            .filter_map(|e| e.dedup_key())
            .map(|(t, m)| (t.to_string(), m.to_string()))
            .collect();

        for entry in entries {
            if let Some((task_id, message_uuid)) = entry.dedup_key() {
                let key = (task_id.to_string(), message_uuid.to_string());
                if seen.contains(&key) {
                    continue;
                }
                seen.insert(key);
            }
            self.store.create(entry.clone())?;
        }
        Ok(())
    }

    async fn get_transcripts(&self, task_id: &str) -> Result<Vec<TranscriptEntry>, BackendError> {
        Ok(self
            .store
            .list::<TranscriptEntry>(&[Filter::eq("task_id", IndexValue::String(task_id.to_string()))])?)
    }

    async fn load_review_findings(&self, task_id: &str, round: u32) -> Result<Option<ReviewFinding>, BackendError> {
        Ok(self.store.get_opt::<ReviewFinding>(&format!("{task_id}:{round}"))?)
    }

    async fn save_review_finding(&self, finding: &ReviewFinding) -> Result<(), BackendError> {
        self.store.create(finding.clone())?;
        Ok(())
    }

    async fn load_initiative(&self, id: &str) -> Result<Initiative, BackendError> {
        Ok(self.store.get::<Initiative>(id)?)
    }

    async fn save_initiative(&self, initiative: &Initiative) -> Result<(), BackendError> {
        self.store.create(initiative.clone())?;
        Ok(())
    }

    async fn load_constitution(&self) -> Result<Option<String>, BackendError> {
        let path = self.base_path.join("CONSTITUTION.md");
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn detect_project(&self, worktree: &Path) -> ProjectInfo {
        detect_project(worktree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TranscriptRole, Weight};
    use tempfile::tempdir;

    fn backend() -> (JsonlBackend, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let backend = JsonlBackend::open(dir.path()).unwrap();
        (backend, dir)
    }

    #[tokio::test]
    async fn save_and_load_task_roundtrip() {
        let (backend, _dir) = backend();
        let task = Task::new("t1", "Add search", "desc", "feature", Weight::Medium);
        backend.save_task(&task).await.unwrap();
        let loaded = backend.load_task("t1").await.unwrap();
        assert_eq!(loaded.title, "Add search");
    }

    #[tokio::test]
    async fn load_missing_task_errors() {
        let (backend, _dir) = backend();
        let err = backend.load_task("missing").await.unwrap_err();
        assert!(matches!(err, BackendError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn save_spec_then_load_returns_same_content() {
        let (backend, _dir) = backend();
        backend.save_spec("t1", "# Spec\ncontent", "agent").await.unwrap();
        let spec = backend.load_spec("t1").await.unwrap();
        assert_eq!(spec.content, "# Spec\ncontent");
    }

    #[tokio::test]
    async fn transcript_batch_dedups_by_message_uuid() {
        let (backend, _dir) = backend();
        let entry = TranscriptEntry::new("t1", "implement", 1, TranscriptRole::Assistant, "hello").with_message_uuid("m1");

        backend.save_transcript_batch(&[entry.clone()]).await.unwrap();
        backend.save_transcript_batch(&[entry]).await.unwrap();

        let transcripts = backend.get_transcripts("t1").await.unwrap();
        assert_eq!(transcripts.len(), 1);
    }

    #[tokio::test]
    async fn transcript_batch_keeps_entries_without_message_uuid() {
        let (backend, _dir) = backend();
        let a = TranscriptEntry::new("t1", "implement", 1, TranscriptRole::Chunk, "a");
        let b = TranscriptEntry::new("t1", "implement", 1, TranscriptRole::Chunk, "b");
        backend.save_transcript_batch(&[a, b]).await.unwrap();
        assert_eq!(backend.get_transcripts("t1").await.unwrap().len(), 2);
    }
}
