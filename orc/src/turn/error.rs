//! TurnExecutor error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("failed to spawn agent process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("agent turn timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("agent process exited with status {0}")]
    NonZeroExit(i32),

    #[error("failed to parse completion schema response: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    #[error("io error communicating with agent process: {0}")]
    Io(#[source] std::io::Error),

    #[cfg(test)]
    #[error("mock turn executor exhausted its queued responses")]
    MockExhausted,
}
