//! The Backend contract (§6): the only thing the core depends on for persistence.

use async_trait::async_trait;

use crate::domain::{Initiative, PhaseOutput, ReviewFinding, Task, TranscriptEntry};

use super::error::BackendError;
use super::project::ProjectInfo;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn save_task(&self, task: &Task) -> Result<(), BackendError>;
    async fn load_task(&self, id: &str) -> Result<Task, BackendError>;
    async fn load_all_tasks(&self) -> Result<Vec<Task>, BackendError>;

    async fn save_spec(&self, task_id: &str, content: &str, source: &str) -> Result<(), BackendError>;
    async fn load_spec(&self, task_id: &str) -> Result<PhaseOutput, BackendError>;

    async fn save_phase_output(&self, output: &PhaseOutput) -> Result<(), BackendError>;
    async fn get_phase_outputs_for_task(&self, task_id: &str) -> Result<Vec<PhaseOutput>, BackendError>;

    async fn save_transcript_batch(&self, entries: &[TranscriptEntry]) -> Result<(), BackendError>;
    async fn get_transcripts(&self, task_id: &str) -> Result<Vec<TranscriptEntry>, BackendError>;

    async fn load_review_findings(&self, task_id: &str, round: u32) -> Result<Option<ReviewFinding>, BackendError>;
    async fn save_review_finding(&self, finding: &ReviewFinding) -> Result<(), BackendError>;

    async fn load_initiative(&self, id: &str) -> Result<Initiative, BackendError>;
    async fn save_initiative(&self, initiative: &Initiative) -> Result<(), BackendError>;

    async fn load_constitution(&self) -> Result<Option<String>, BackendError>;

    fn detect_project(&self, worktree: &std::path::Path) -> ProjectInfo;
}
