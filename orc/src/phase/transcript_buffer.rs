//! TranscriptBuffer (§4.7): a thread-safe sink batching streaming agent
//! output for persistence, with chunk reassembly and a shutdown drain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use crate::backend::Backend;
use crate::domain::{TranscriptEntry, TranscriptRole};

struct BufferState {
    lines: Vec<TranscriptEntry>,
    chunks: HashMap<(String, u32), String>,
}

pub struct TranscriptBuffer {
    backend: Arc<dyn Backend>,
    task_id: String,
    max_buffer: usize,
    state: Mutex<BufferState>,
    closed: AtomicBool,
}

impl TranscriptBuffer {
    pub fn new(backend: Arc<dyn Backend>, task_id: impl Into<String>, max_buffer: usize) -> Self {
        Self {
            backend,
            task_id: task_id.into(),
            max_buffer,
            state: Mutex::new(BufferState {
                lines: Vec::new(),
                chunks: HashMap::new(),
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// Adds a complete transcript entry. Returns whether the line buffer has
    /// reached `max_buffer` and should be flushed by the caller.
    pub fn add(&self, phase: &str, iteration: u32, role: TranscriptRole, content: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.lines.push(TranscriptEntry::new(self.task_id.clone(), phase, iteration, role, content));
        state.lines.len() >= self.max_buffer
    }

    /// Appends a stream chunk. Whenever the accumulator contains a newline,
    /// everything up to and including the rightmost one is flushed as one
    /// `chunk`-role line; the remainder stays buffered for the next chunk.
    pub fn add_chunk(&self, phase: &str, iteration: u32, chunk: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let key = (phase.to_string(), iteration);
        let buf = state.chunks.entry(key).or_default();
        buf.push_str(chunk);

        if let Some(pos) = buf.rfind('\n') {
            let line = buf[..=pos].trim_end_matches('\n').to_string();
            let remainder = buf[pos + 1..].to_string();
            *buf = remainder;
            state.lines.push(TranscriptEntry::new(self.task_id.clone(), phase, iteration, TranscriptRole::Chunk, line));
        }
        state.lines.len() >= self.max_buffer
    }

    /// Finalizes any partial chunk content for (phase, iteration) into a
    /// line. Called at phase end.
    pub async fn flush_chunks(&self, phase: &str, iteration: u32) {
        let pending = {
            let mut state = self.state.lock().unwrap();
            state.chunks.remove(&(phase.to_string(), iteration))
        };
        if let Some(content) = pending {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                let mut state = self.state.lock().unwrap();
                state.lines.push(TranscriptEntry::new(self.task_id.clone(), phase, iteration, TranscriptRole::Chunk, trimmed));
            }
        }
    }

    /// Persists the buffered lines. The buffer is cleared regardless of
    /// persistence success — the caller cannot be blocked by a backend
    /// failure (§4.7 "Persistence failure").
    pub async fn flush(&self) {
        let lines = {
            let mut state = self.state.lock().unwrap();
            std::mem::take(&mut state.lines)
        };
        if lines.is_empty() {
            return;
        }
        if let Err(err) = self.backend.save_transcript_batch(&lines).await {
            warn!(task_id = %self.task_id, error = %err, "transcript flush failed, buffer cleared regardless");
        }
    }

    /// Spawns a background task that flushes on a fixed interval for the
    /// lifetime of the buffer, so a long phase's transcript never sits
    /// entirely in memory until the run finishes or fails (§4.9). Stops once
    /// `close` has run.
    pub fn spawn_periodic_flush(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let buffer = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately, skip it
            loop {
                ticker.tick().await;
                if buffer.closed.load(Ordering::SeqCst) {
                    break;
                }
                buffer.flush().await;
            }
        })
    }

    /// Idempotent: cancels nothing further to cancel here (the periodic
    /// flusher lives outside this type), drains chunk accumulators into
    /// final lines, and performs a last flush. Safe to call multiple times —
    /// every call after the first is a no-op (I5).
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let remaining: Vec<((String, u32), String)> = {
            let mut state = self.state.lock().unwrap();
            state.chunks.drain().collect()
        };
        for ((phase, iteration), content) in remaining {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                let mut state = self.state.lock().unwrap();
                state.lines.push(TranscriptEntry::new(self.task_id.clone(), &phase, iteration, TranscriptRole::Chunk, trimmed));
            }
        }
        self.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JsonlBackend;

    fn backend() -> (Arc<dyn Backend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonlBackend::open(dir.path()).unwrap();
        (Arc::new(backend), dir)
    }

    #[tokio::test]
    async fn add_flushes_at_max_buffer() {
        let (backend, _dir) = backend();
        let buffer = TranscriptBuffer::new(backend.clone(), "t1", 2);
        assert!(!buffer.add("implement", 1, TranscriptRole::Assistant, "a"));
        assert!(buffer.add("implement", 1, TranscriptRole::Assistant, "b"));
    }

    #[tokio::test]
    async fn chunk_flushes_on_newline_and_retains_remainder() {
        let (backend, _dir) = backend();
        let buffer = TranscriptBuffer::new(backend.clone(), "t1", 50);
        buffer.add_chunk("test", 1, "partial line, more to come");
        buffer.add_chunk("test", 1, " done.\nstill buffering");
        buffer.close().await;

        let entries = backend.get_transcripts("t1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "partial line, more to come done.");
        assert_eq!(entries[1].content, "still buffering");
    }

    #[tokio::test]
    async fn close_called_twice_persists_lines_once() {
        let (backend, _dir) = backend();
        let buffer = TranscriptBuffer::new(backend.clone(), "t1", 50);
        buffer.add("spec", 1, TranscriptRole::Assistant, "hello");
        buffer.close().await;
        buffer.close().await;

        let entries = backend.get_transcripts("t1").await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn flush_chunks_finalizes_partial_content() {
        let (backend, _dir) = backend();
        let buffer = TranscriptBuffer::new(backend.clone(), "t1", 50);
        buffer.add_chunk("docs", 1, "no trailing newline yet");
        buffer.flush_chunks("docs", 1).await;
        buffer.flush().await;

        let entries = backend.get_transcripts("t1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "no trailing newline yet");
    }
}
