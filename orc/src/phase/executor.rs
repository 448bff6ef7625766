//! PhaseExecutor (§4.2): drives one phase from `pending` to a terminal status.

use std::time::Duration;

use crate::domain::PhaseStatus;
use crate::events::{EventSink, OrcEvent};
use crate::turn::{CompletionStatus, TokenUsage, TurnConfig, TurnExecutor};

use super::transcript_buffer::TranscriptBuffer;
use crate::domain::TranscriptRole;

#[derive(Debug, Clone)]
pub struct PhaseRunOutcome {
    pub status: PhaseStatus,
    pub iterations: u32,
    pub usage: TokenUsage,
    pub output: Option<String>,
    pub failure_reason: Option<String>,
}

pub struct PhaseExecutor {
    event_sink: EventSink,
}

impl PhaseExecutor {
    pub fn new(event_sink: EventSink) -> Self {
        Self { event_sink }
    }

    /// Runs the iteration loop for one phase (§4.2). `produces_artifact`
    /// controls whether the final response content is returned as an
    /// artifact candidate for the caller to persist.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        turn_executor: &dyn TurnExecutor,
        task_id: &str,
        phase: &str,
        prompt: &str,
        mut turn_config: TurnConfig,
        max_iterations: u32,
        phase_timeout: Duration,
        transcripts: &TranscriptBuffer,
        produces_artifact: bool,
    ) -> PhaseRunOutcome {
        self.event_sink.publish(OrcEvent::PhaseStarted {
            task_id: task_id.to_string(),
            phase: phase.to_string(),
        });
        if transcripts.add(phase, 1, TranscriptRole::User, prompt) {
            transcripts.flush().await;
        }

        let mut usage = TokenUsage::default();
        let mut iterations = 0u32;
        let mut current_prompt = prompt.to_string();
        let mut last_content = String::new();
        let mut status = PhaseStatus::Failed;
        let mut failure_reason = None;

        let loop_future = async {
            loop {
                if iterations >= max_iterations {
                    failure_reason = Some(format!("iteration budget ({max_iterations}) exhausted"));
                    status = PhaseStatus::Failed;
                    break;
                }
                iterations += 1;

                match turn_executor.run_turn(&current_prompt, &turn_config).await {
                    Err(err) => {
                        failure_reason = Some(err.to_string());
                        status = PhaseStatus::Failed;
                        self.event_sink.publish(OrcEvent::Error {
                            task_id: task_id.to_string(),
                            context: phase.to_string(),
                            message: err.to_string(),
                        });
                        break;
                    }
                    Ok(turn) => {
                        let effective_input = turn.usage.effective_input_tokens();
                        usage.input_tokens += effective_input;
                        usage.output_tokens += turn.usage.output_tokens;

                        if transcripts.add(phase, iterations, TranscriptRole::Assistant, &turn.content) {
                            transcripts.flush().await;
                        }
                        self.event_sink.publish(OrcEvent::Tokens {
                            task_id: task_id.to_string(),
                            phase: phase.to_string(),
                            input_tokens: effective_input,
                            output_tokens: turn.usage.output_tokens,
                            cost_usd: turn.cost_usd,
                        });

                        if let Some(session_id) = &turn.session_id {
                            turn_config.session_id = Some(session_id.clone());
                            turn_config.resume = true;
                        }
                        last_content = turn.content.clone();

                        match turn.status() {
                            CompletionStatus::Complete => {
                                status = PhaseStatus::Completed;
                                break;
                            }
                            CompletionStatus::Blocked => {
                                failure_reason = turn
                                    .completion
                                    .as_ref()
                                    .and_then(|c| c.reason.clone())
                                    .or_else(|| Some("blocked".to_string()));
                                status = PhaseStatus::Blocked;
                                break;
                            }
                            CompletionStatus::Continue => {
                                current_prompt = if turn_config.resume {
                                    "continue".to_string()
                                } else {
                                    format!("{current_prompt}\n\n{}", turn.content)
                                };
                            }
                        }
                    }
                }
            }
        };

        if tokio::time::timeout(phase_timeout, loop_future).await.is_err() {
            status = PhaseStatus::Failed;
            failure_reason = Some("timeout".to_string());
        }

        transcripts.flush_chunks(phase, iterations.max(1)).await;

        match status {
            PhaseStatus::Completed => {
                self.event_sink.publish(OrcEvent::PhaseCompleted {
                    task_id: task_id.to_string(),
                    phase: phase.to_string(),
                });
            }
            _ => {
                self.event_sink.publish(OrcEvent::PhaseFailed {
                    task_id: task_id.to_string(),
                    phase: phase.to_string(),
                    reason: failure_reason.clone().unwrap_or_default(),
                });
            }
        }

        PhaseRunOutcome {
            status,
            iterations,
            usage,
            output: if status == PhaseStatus::Completed && produces_artifact {
                Some(last_content)
            } else {
                None
            },
            failure_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JsonlBackend;
    use crate::turn::{CompletionSchema, CompletionStatus as Status, MockTurnExecutor, TurnResult};
    use std::sync::Arc;

    fn transcripts() -> (TranscriptBuffer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonlBackend::open(dir.path()).unwrap();
        (TranscriptBuffer::new(Arc::new(backend), "t1", 50), dir)
    }

    fn completed_result(content: &str) -> TurnResult {
        TurnResult {
            content: content.to_string(),
            turns_consumed: 1,
            cost_usd: 0.01,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                cache_creation_tokens: 0,
                cache_read_tokens: 0,
            },
            session_id: Some("sess-1".to_string()),
            duration: Duration::from_millis(10),
            error: false,
            error_text: None,
            completion: Some(CompletionSchema {
                status: Status::Complete,
                reason: None,
                artifact: Some(content.to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn completes_on_first_complete_response() {
        let turn_executor = MockTurnExecutor::new(vec![completed_result("# Spec\n\nDone.")]);
        let executor = PhaseExecutor::new(EventSink::default());
        let outcome = executor
            .run(
                &turn_executor,
                "t1",
                "spec",
                "write the spec",
                TurnConfig::new("model", "/tmp"),
                5,
                Duration::from_secs(5),
                &transcripts().0,
                true,
            )
            .await;
        assert_eq!(outcome.status, PhaseStatus::Completed);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.output.as_deref(), Some("# Spec\n\nDone."));
        assert_eq!(outcome.usage.input_tokens, 10);
    }

    #[tokio::test]
    async fn exhausting_iteration_budget_fails() {
        let continue_result = TurnResult {
            completion: Some(CompletionSchema {
                status: Status::Continue,
                reason: None,
                artifact: None,
            }),
            ..completed_result("partial")
        };
        let turn_executor = MockTurnExecutor::new(vec![continue_result.clone(), continue_result]);
        let executor = PhaseExecutor::new(EventSink::default());
        let outcome = executor
            .run(
                &turn_executor,
                "t1",
                "implement",
                "do the work",
                TurnConfig::new("model", "/tmp"),
                2,
                Duration::from_secs(5),
                &transcripts().0,
                false,
            )
            .await;
        assert_eq!(outcome.status, PhaseStatus::Failed);
        assert!(outcome.failure_reason.unwrap().contains("iteration budget"));
    }

    #[tokio::test]
    async fn blocked_status_preserves_reason() {
        let blocked_result = TurnResult {
            completion: Some(CompletionSchema {
                status: Status::Blocked,
                reason: Some("needs human input".to_string()),
                artifact: None,
            }),
            ..completed_result("partial")
        };
        let turn_executor = MockTurnExecutor::new(vec![blocked_result]);
        let executor = PhaseExecutor::new(EventSink::default());
        let outcome = executor
            .run(
                &turn_executor,
                "t1",
                "review",
                "review this",
                TurnConfig::new("model", "/tmp"),
                5,
                Duration::from_secs(5),
                &transcripts().0,
                false,
            )
            .await;
        assert_eq!(outcome.status, PhaseStatus::Blocked);
        assert_eq!(outcome.failure_reason.as_deref(), Some("needs human input"));
    }
}
