//! WorkflowExecutor (§4.3): sequences phases, evaluates gates, routes
//! failures via the default retry map.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::backend::Backend;
use crate::config::Config;
use crate::domain::{ExecutionState, PhaseStatus, RetryContext, Task, TaskStatus};
use crate::events::{EventSink, OrcEvent};
use crate::turn::{TurnConfig, TurnExecutor};

use super::artifact_store::ArtifactStore;
use super::detector::PhaseOutputDetector;
use super::error::PhaseError;
use super::executor::PhaseExecutor;
use super::gate::{AiGateClassifier, GateEvaluationResult, GateEvaluator, apply_gate_output_to_vars};
use super::resolution_context::ResolutionContext;
use super::retry_context_builder::{RetryContextBuilder, RetryContextInput};
use super::transcript_buffer::TranscriptBuffer;

/// Forward sequence of phases (§1). Back-edges only happen via retry
/// destinations, never by reordering this list.
pub const PHASE_ORDER: &[&str] = &["spec", "research", "implement", "test", "review", "docs", "validate", "finalize", "ci-merge"];

/// Phases whose completed output is a durable text artifact saved through
/// the ArtifactStore.
const ARTIFACT_PHASES: &[&str] = &["spec", "research", "docs"];

fn default_retry_destination(phase: &str) -> Option<&'static str> {
    match phase {
        "test" | "test_unit" | "test_e2e" | "validate" | "review" => Some("implement"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub task_status: TaskStatus,
    pub failure_reason: Option<String>,
}

pub struct WorkflowExecutor {
    backend: Arc<dyn Backend>,
    turn_executor: Arc<dyn TurnExecutor>,
    event_sink: EventSink,
    config: Config,
    ai_gate: Option<Arc<dyn AiGateClassifier>>,
    model: String,
}

impl WorkflowExecutor {
    pub fn new(backend: Arc<dyn Backend>, turn_executor: Arc<dyn TurnExecutor>, event_sink: EventSink, config: Config) -> Self {
        Self {
            backend,
            turn_executor,
            event_sink,
            config,
            ai_gate: None,
            model: "default".to_string(),
        }
    }

    pub fn with_ai_gate(mut self, classifier: Arc<dyn AiGateClassifier>) -> Self {
        self.ai_gate = Some(classifier);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn run(&self, task_id: &str, working_directory: &Path) -> Result<WorkflowResult, PhaseError> {
        let mut task = self.backend.load_task(task_id).await?;
        let mut state = ExecutionState::new();
        let mut vars: HashMap<String, serde_json::Value> = HashMap::new();
        let mut attempts: HashMap<String, u32> = HashMap::new();

        let transcripts = Arc::new(TranscriptBuffer::new(self.backend.clone(), task_id, self.config.transcript_max_buffer));
        let flush_handle = transcripts.spawn_periodic_flush(self.config.transcript_flush_interval);
        let phase_executor = PhaseExecutor::new(self.event_sink.clone());
        let artifact_store = ArtifactStore::new(self.backend.clone());

        let mut idx = 0usize;
        while idx < PHASE_ORDER.len() {
            let phase = PHASE_ORDER[idx];

            if matches!(state.status(phase), PhaseStatus::Completed | PhaseStatus::Skipped) {
                idx += 1;
                continue;
            }

            let detection = PhaseOutputDetector::detect(self.backend.as_ref(), task_id, phase, task.weight).await;
            if detection.has_output && detection.can_auto_skip {
                state.set_status(phase, PhaseStatus::Skipped);
                info!(task_id, phase, description = %detection.description, "phase auto-skipped");
                self.event_sink.publish(OrcEvent::StateChanged {
                    task_id: task_id.to_string(),
                    status: format!("{phase}:skipped"),
                });
                idx += 1;
                continue;
            }

            state.set_status(phase, PhaseStatus::Running);
            task.set_status(TaskStatus::Running);
            self.backend.save_task(&task).await?;

            let prompt = self.build_prompt(phase, &state, task_id, &task, &vars).await;
            let mut turn_config = TurnConfig::new(&self.model, working_directory.to_path_buf());
            turn_config.timeout = self.config.phase_timeout;
            let max_iterations = self.config.max_iterations_for(task.weight);
            let produces_artifact = ARTIFACT_PHASES.contains(&phase);

            let outcome = phase_executor
                .run(
                    self.turn_executor.as_ref(),
                    task_id,
                    phase,
                    &prompt,
                    turn_config,
                    max_iterations,
                    self.config.phase_timeout,
                    &transcripts,
                    produces_artifact,
                )
                .await;

            state.set_status(phase, outcome.status);

            if outcome.status == PhaseStatus::Completed {
                if let Some(content) = &outcome.output {
                    if let Err(err) = artifact_store.save(task_id, phase, content, "agent", task.weight).await {
                        state.set_status(phase, PhaseStatus::Failed);
                        let reason = err.to_string();
                        if self.route_failure(phase, &reason, None, &reason, &mut state, &mut attempts, &mut idx) {
                            continue;
                        }
                        flush_handle.abort();
                        return self.finish_failed(&mut task, &transcripts, Some(reason)).await;
                    }
                }

                let gate_result = self.evaluate_gate(task_id, phase, &outcome, &state).await;
                if gate_result.approved {
                    apply_gate_output_to_vars(&gate_result, &mut vars);
                    idx += 1;
                } else {
                    let destination = gate_result.retry_phase.clone();
                    let reason = gate_result.reason.clone();
                    if self.route_failure(phase, &reason, destination.as_deref(), &reason, &mut state, &mut attempts, &mut idx) {
                        continue;
                    }
                    flush_handle.abort();
                    return self.finish_failed(&mut task, &transcripts, Some(reason)).await;
                }
            } else {
                let reason = outcome.failure_reason.clone().unwrap_or_else(|| "phase did not complete".to_string());
                if self.route_failure(phase, &reason, None, &reason, &mut state, &mut attempts, &mut idx) {
                    continue;
                }
                flush_handle.abort();
                return self.finish_failed(&mut task, &transcripts, Some(reason)).await;
            }
        }

        task.set_status(TaskStatus::Complete);
        self.backend.save_task(&task).await?;
        transcripts.close().await;
        flush_handle.abort();
        self.event_sink.publish(OrcEvent::StateChanged {
            task_id: task_id.to_string(),
            status: "complete".to_string(),
        });

        Ok(WorkflowResult {
            task_status: TaskStatus::Complete,
            failure_reason: None,
        })
    }

    async fn finish_failed(&self, task: &mut Task, transcripts: &TranscriptBuffer, reason: Option<String>) -> Result<WorkflowResult, PhaseError> {
        task.set_status(TaskStatus::Failed);
        self.backend.save_task(task).await?;
        transcripts.close().await;
        Ok(WorkflowResult {
            task_status: TaskStatus::Failed,
            failure_reason: reason,
        })
    }

    /// Routes a phase failure (or gate rejection) to its retry destination,
    /// bumping the attempt counter and resetting the intervening phases back
    /// to `pending` (§4.3.e/f). Returns `false` when there is no destination
    /// or the attempt cap is exhausted — the caller should treat the task as
    /// terminally failed.
    #[allow(clippy::too_many_arguments)]
    fn route_failure(
        &self,
        phase: &str,
        reason: &str,
        explicit_destination: Option<&str>,
        failure_output: &str,
        state: &mut ExecutionState,
        attempts: &mut HashMap<String, u32>,
        idx: &mut usize,
    ) -> bool {
        let Some(destination) = explicit_destination
            .map(str::to_string)
            .or_else(|| default_retry_destination(phase).map(str::to_string))
        else {
            return false;
        };

        let attempt = attempts.entry(destination.clone()).or_insert(0);
        *attempt += 1;
        if *attempt > self.config.max_retry_attempts() {
            return false;
        }

        let retry_ctx = RetryContext::new(phase, &destination, reason, failure_output, *attempt);
        state.retry_context = Some(retry_ctx);

        let Some(dest_idx) = PHASE_ORDER.iter().position(|p| *p == destination) else {
            return false;
        };
        for reset_idx in dest_idx..=*idx {
            state.set_status(PHASE_ORDER[reset_idx], PhaseStatus::Pending);
        }
        *idx = dest_idx;
        true
    }

    async fn evaluate_gate(&self, task_id: &str, phase: &str, outcome: &super::executor::PhaseRunOutcome, state: &ExecutionState) -> GateEvaluationResult {
        if outcome.status != PhaseStatus::Completed {
            return GateEvaluator::evaluate_auto(false, outcome.failure_reason.clone().unwrap_or_default());
        }

        if phase == "review" {
            if let Some(classifier) = &self.ai_gate {
                let content = outcome.output.clone().unwrap_or_default();
                return GateEvaluator::evaluate_ai(classifier.as_ref(), phase, &content).await;
            }
            let round = match &state.retry_context {
                Some(ctx) if ctx.is_review_round() => ctx.attempt + 1,
                _ => 1,
            };
            if let Ok(Some(finding)) = self.backend.load_review_findings(task_id, round).await {
                if finding.has_blocker() {
                    return GateEvaluationResult {
                        approved: false,
                        reason: "review findings contain a blocker".to_string(),
                        retry_phase: Some("implement".to_string()),
                        output_data: None,
                        output_variable_name: None,
                    };
                }
            }
        }

        GateEvaluator::evaluate_auto(true, "phase completed")
    }

    async fn build_prompt(&self, phase: &str, state: &ExecutionState, task_id: &str, task: &Task, vars: &HashMap<String, serde_json::Value>) -> String {
        let mut ctx = ResolutionContext::new();
        ctx.set("TASK_ID", serde_json::Value::String(task_id.to_string()));
        ctx.set("TASK_TITLE", serde_json::Value::String(task.title.clone()));
        if let Some(branch) = &task.pr.branch {
            ctx.set("TASK_BRANCH", serde_json::Value::String(branch.clone()));
        }
        for (name, value) in vars {
            ctx.set(name.clone(), value.clone());
        }

        let mut prompt = ctx.render(&format!(
            "# Phase: {phase}\n\nTask {{{{TASK_ID}}}}: {{{{TASK_TITLE}}}}\n\n{}\n",
            task.description
        ));

        if let Some(retry_ctx) = &state.retry_context {
            if retry_ctx.to_phase == phase {
                let transcripts = self.backend.get_transcripts(task_id).await.unwrap_or_default();
                let summary = RetryContextBuilder::compress_session_summary(&transcripts);
                let input = RetryContextInput {
                    failed_phase: retry_ctx.from_phase.clone(),
                    failure_reason: retry_ctx.reason.clone(),
                    failure_output: retry_ctx.failure_output.clone(),
                    attempt: retry_ctx.attempt,
                    max_attempts: self.config.max_retry_attempts(),
                    previous_session_summary: Some(summary),
                    gate_analysis: retry_ctx.gate_analysis.clone(),
                    ..Default::default()
                };
                prompt.push_str("\n\n");
                prompt.push_str(&RetryContextBuilder::build(&input));
            }
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JsonlBackend;
    use crate::domain::Weight;
    use crate::turn::{CompletionSchema, CompletionStatus, MockTurnExecutor, TokenUsage, TurnResult};
    use std::time::Duration;

    fn turn_result(status: CompletionStatus, artifact: Option<&str>) -> TurnResult {
        TurnResult {
            content: artifact.unwrap_or("ok").to_string(),
            turns_consumed: 1,
            cost_usd: 0.0,
            usage: TokenUsage::default(),
            session_id: Some("s1".to_string()),
            duration: Duration::from_millis(1),
            error: false,
            error_text: None,
            completion: Some(CompletionSchema {
                status,
                reason: None,
                artifact: artifact.map(str::to_string),
            }),
        }
    }

    fn spec_artifact() -> &'static str {
        "# Spec\n\n## Intent\nBuild search.\n\n## Success Criteria\n- works\n\n## Testing\n- covered"
    }

    #[tokio::test]
    async fn full_happy_path_completes_task() {
        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn Backend> = Arc::new(JsonlBackend::open(dir.path()).unwrap());
        let task = Task::new("t1", "Add search", "desc", "feature", Weight::Trivial);
        backend.save_task(&task).await.unwrap();

        // one `complete` turn per phase in PHASE_ORDER
        let responses: Vec<TurnResult> = PHASE_ORDER
            .iter()
            .map(|phase| {
                if *phase == "spec" {
                    turn_result(CompletionStatus::Complete, Some(spec_artifact()))
                } else {
                    turn_result(CompletionStatus::Complete, Some("output"))
                }
            })
            .collect();
        let turn_executor: Arc<dyn TurnExecutor> = Arc::new(MockTurnExecutor::new(responses));

        let workflow = WorkflowExecutor::new(backend.clone(), turn_executor, EventSink::default(), Config::default());
        let worktree = tempfile::tempdir().unwrap();
        let result = workflow.run("t1", worktree.path()).await.unwrap();

        assert_eq!(result.task_status, TaskStatus::Complete);
        let saved = backend.load_task("t1").await.unwrap();
        assert_eq!(saved.status, TaskStatus::Complete);
    }

    #[tokio::test]
    async fn test_failure_routes_back_to_implement_then_fails_after_budget() {
        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn Backend> = Arc::new(JsonlBackend::open(dir.path()).unwrap());
        let task = Task::new("t1", "Add search", "desc", "feature", Weight::Trivial);
        backend.save_task(&task).await.unwrap();

        // every call returns `continue` until the 5-iteration trivial budget
        // is exhausted on spec, research and implement, then test keeps failing
        let mut responses = Vec::new();
        for _ in 0..5 {
            responses.push(turn_result(CompletionStatus::Complete, Some(spec_artifact())));
        }
        let turn_executor: Arc<dyn TurnExecutor> = Arc::new(MockTurnExecutor::new(responses));

        let mut config = Config::default();
        config.max_retry_attempts = 0; // resets to default (5), but budget is what we're exercising
        let workflow = WorkflowExecutor::new(backend.clone(), turn_executor, EventSink::default(), config);
        let worktree = tempfile::tempdir().unwrap();

        // Only 5 mocked responses are queued (spec/research/implement/test/review would need more);
        // once exhausted the mock returns MockExhausted, which the phase executor treats as a turn error.
        let result = workflow.run("t1", worktree.path()).await.unwrap();
        assert_eq!(result.task_status, TaskStatus::Failed);
    }

    fn completed_outcome() -> crate::phase::executor::PhaseRunOutcome {
        crate::phase::executor::PhaseRunOutcome {
            status: PhaseStatus::Completed,
            iterations: 1,
            usage: TokenUsage::default(),
            output: None,
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn review_gate_reads_round_one_on_first_pass() {
        use crate::domain::{Finding, ReviewFinding, ReviewSeverity};

        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn Backend> = Arc::new(JsonlBackend::open(dir.path()).unwrap());
        let mut finding = ReviewFinding::new("t1", 1, "round one");
        finding.findings.push(Finding {
            severity: ReviewSeverity::Blocker,
            file: None,
            line: None,
            description: "blocking issue".to_string(),
            suggestion: None,
        });
        backend.save_review_finding(&finding).await.unwrap();

        let turn_executor: Arc<dyn TurnExecutor> = Arc::new(MockTurnExecutor::new(vec![]));
        let workflow = WorkflowExecutor::new(backend, turn_executor, EventSink::default(), Config::default());
        let state = ExecutionState::new();

        let result = workflow.evaluate_gate("t1", "review", &completed_outcome(), &state).await;
        assert!(!result.approved);
        assert_eq!(result.retry_phase.as_deref(), Some("implement"));
    }

    #[tokio::test]
    async fn review_gate_reads_round_two_after_a_review_retry() {
        use crate::domain::{Finding, ReviewFinding, ReviewSeverity};

        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn Backend> = Arc::new(JsonlBackend::open(dir.path()).unwrap());

        let mut round_one = ReviewFinding::new("t1", 1, "round one");
        round_one.findings.push(Finding {
            severity: ReviewSeverity::Blocker,
            file: None,
            line: None,
            description: "blocking issue".to_string(),
            suggestion: None,
        });
        backend.save_review_finding(&round_one).await.unwrap();

        let round_two = ReviewFinding::new("t1", 2, "round two, clean");
        backend.save_review_finding(&round_two).await.unwrap();

        let turn_executor: Arc<dyn TurnExecutor> = Arc::new(MockTurnExecutor::new(vec![]));
        let workflow = WorkflowExecutor::new(backend, turn_executor, EventSink::default(), Config::default());

        let mut state = ExecutionState::new();
        state.retry_context = Some(RetryContext::new("review", "implement", "blocker found", "...", 1));

        let result = workflow.evaluate_gate("t1", "review", &completed_outcome(), &state).await;
        assert!(result.approved, "round two should read the clean round-2 finding, not stale round 1");
    }
}
