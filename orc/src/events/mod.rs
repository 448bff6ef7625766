//! Event system for live observability.
//!
//! Every significant action in the engine — phase transitions, transcript
//! lines, token accounting, errors, task status changes, worktree file
//! changes — publishes an [`OrcEvent`] through an [`EventSink`]. An
//! [`EventLogger`] mirrors the stream to an append-only JSONL file per task.

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventSink};
pub use logger::{EventLogger, read_task_events, spawn_event_logger};
pub use types::{EventLogEntry, OrcEvent};
