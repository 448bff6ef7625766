//! Event types published by the orchestration engine.
//!
//! Six families, each keyed by task id (§6 EXTERNAL INTERFACES): `phase`
//! (start/complete/failed), `transcript`, `tokens`, `error`, `state`,
//! `files_changed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrcEvent {
    PhaseStarted {
        task_id: String,
        phase: String,
    },
    PhaseCompleted {
        task_id: String,
        phase: String,
    },
    PhaseFailed {
        task_id: String,
        phase: String,
        reason: String,
    },
    Transcript {
        task_id: String,
        phase: String,
        iteration: u32,
        role: String,
        content: String,
    },
    Tokens {
        task_id: String,
        phase: String,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    },
    Error {
        task_id: String,
        context: String,
        message: String,
    },
    StateChanged {
        task_id: String,
        status: String,
    },
    FilesChanged {
        task_id: String,
        paths: Vec<String>,
    },
}

impl OrcEvent {
    pub fn task_id(&self) -> &str {
        match self {
            OrcEvent::PhaseStarted { task_id, .. }
            | OrcEvent::PhaseCompleted { task_id, .. }
            | OrcEvent::PhaseFailed { task_id, .. }
            | OrcEvent::Transcript { task_id, .. }
            | OrcEvent::Tokens { task_id, .. }
            | OrcEvent::Error { task_id, .. }
            | OrcEvent::StateChanged { task_id, .. }
            | OrcEvent::FilesChanged { task_id, .. } => task_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            OrcEvent::PhaseStarted { .. } => "phase",
            OrcEvent::PhaseCompleted { .. } => "phase",
            OrcEvent::PhaseFailed { .. } => "phase",
            OrcEvent::Transcript { .. } => "transcript",
            OrcEvent::Tokens { .. } => "tokens",
            OrcEvent::Error { .. } => "error",
            OrcEvent::StateChanged { .. } => "state",
            OrcEvent::FilesChanged { .. } => "files_changed",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: OrcEvent,
}

impl EventLogEntry {
    pub fn new(event: OrcEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
