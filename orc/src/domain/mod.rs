//! Core domain types for the orchestration engine.
//!
//! `Task` and `Initiative` are persisted via [`orcstore::Record`]; the rest
//! (`ExecutionState`, `PhaseOutput`, transcript entries, retry context,
//! review findings, CI check results) are either embedded in a task record
//! or persisted through the backend under their own collection.

mod ci;
mod execution_state;
mod initiative;
mod phase_output;
mod retry_context;
mod review;
mod task;
mod transcript;

pub use ci::{CheckConclusion, CheckRun, CheckStatus, CiOverallStatus, CiCheckResult};
pub use execution_state::{ExecutionState, PhaseStatus};
pub use initiative::Initiative;
pub use phase_output::PhaseOutput;
pub use retry_context::RetryContext;
pub use review::{ReviewFinding, ReviewSeverity, Finding};
pub use task::{PrInfo, Task, TaskStatus, Weight};
pub use transcript::{TranscriptEntry, TranscriptRole};

pub use orcstore::{Filter, FilterOp, IndexValue, Record};
