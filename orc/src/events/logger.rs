//! EventLogger - mirrors every published event to an append-only JSONL log.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use super::bus::EventSink;
use super::types::{EventLogEntry, OrcEvent};

/// Events are written to `<runs_dir>/{task-id}/events.jsonl`.
pub struct EventLogger {
    runs_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    pub fn new(runs_dir: impl AsRef<Path>) -> Self {
        let runs_dir = runs_dir.as_ref().to_path_buf();
        debug!(?runs_dir, "EventLogger::new");
        Self {
            runs_dir,
            writers: HashMap::new(),
        }
    }

    pub fn with_default_path() -> eyre::Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| eyre::eyre!("could not determine home directory"))?;
        let runs_dir = home.join(".orc").join("runs");
        fs::create_dir_all(&runs_dir)?;
        Ok(Self::new(runs_dir))
    }

    pub fn write_event(&mut self, event: &OrcEvent) -> eyre::Result<()> {
        let task_id = event.task_id();
        debug!(%task_id, event_type = event.event_type(), "EventLogger::write_event");

        let writer = if let Some(w) = self.writers.get_mut(task_id) {
            w
        } else {
            let task_dir = self.runs_dir.join(task_id);
            fs::create_dir_all(&task_dir)?;
            let log_path = task_dir.join("events.jsonl");
            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(task_id.to_string(), BufWriter::new(file));
            self.writers.get_mut(task_id).unwrap()
        };

        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }

    pub fn close_task(&mut self, task_id: &str) {
        debug!(%task_id, "EventLogger::close_task");
        if let Some(mut writer) = self.writers.remove(task_id) {
            let _ = writer.flush();
        }
    }

    /// Run the logger, consuming events from the sink until the channel closes.
    pub async fn run(mut self, sink: EventSink) {
        debug!("EventLogger::run: starting");
        let mut rx = sink.subscribe();

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(task_id = event.task_id(), error = %e, "EventLogger: failed to write event");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        for (task_id, mut writer) in self.writers.drain() {
            debug!(%task_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

pub fn read_task_events(runs_dir: impl AsRef<Path>, task_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = runs_dir.as_ref().join(task_id).join("events.jsonl");
    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line, error = %e, "read_task_events: failed to parse line"),
        }
    }
    Ok(entries)
}

pub fn spawn_event_logger(sink: EventSink) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::with_default_path()?;
    Ok(tokio::spawn(async move {
        logger.run(sink).await;
    }))
}
