//! Error taxonomy for the phase/workflow layer (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("content too short: {0} chars (minimum 50)")]
    TooShort(usize),
    #[error("content matches a known noise pattern")]
    NoiseMatch,
    #[error("content is missing a recognized heading")]
    MissingHeading,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("ai gate classifier failed: {0}")]
    ClassifierFailed(String),
}

/// Phase-level failure. Wraps the lower-level taxonomy so the workflow
/// executor can match on kind without losing the underlying cause (§7).
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Turn(#[from] crate::turn::TurnError),
    #[error("phase budget exhausted after {0} iterations")]
    BudgetExhausted(u32),
    #[error("phase timed out")]
    Timeout,
    #[error("blocked: {0}")]
    Blocked(String),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),
}
