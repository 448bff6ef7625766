//! RetryContext: the bridge between a failed phase and the retry that follows it.

use serde::{Deserialize, Serialize};

/// Exists only between a phase failure and the retry it triggers; cleared
/// once the destination phase consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryContext {
    pub from_phase: String,
    pub to_phase: String,
    pub reason: String,
    pub failure_output: String,
    pub attempt: u32,
    pub saved_context_file: Option<String>,
    pub gate_analysis: Option<String>,
}

impl RetryContext {
    pub fn new(from_phase: impl Into<String>, to_phase: impl Into<String>, reason: impl Into<String>, failure_output: impl Into<String>, attempt: u32) -> Self {
        Self {
            from_phase: from_phase.into(),
            to_phase: to_phase.into(),
            reason: reason.into(),
            failure_output: failure_output.into(),
            attempt: attempt.max(1),
            saved_context_file: None,
            gate_analysis: None,
        }
    }

    pub fn with_saved_context_file(mut self, path: impl Into<String>) -> Self {
        self.saved_context_file = Some(path.into());
        self
    }

    pub fn with_gate_analysis(mut self, text: impl Into<String>) -> Self {
        self.gate_analysis = Some(text.into());
        self
    }

    /// True when this RetryContext represents a review round (§9 decision:
    /// review round is derived solely from `from_phase == "review"`).
    pub fn is_review_round(&self) -> bool {
        self.from_phase == "review"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_is_floored_at_one() {
        let ctx = RetryContext::new("test", "implement", "build failed", "error[E0382]", 0);
        assert_eq!(ctx.attempt, 1);
    }

    #[test]
    fn review_round_detected_from_from_phase() {
        let ctx = RetryContext::new("review", "implement", "blocker found", "...", 2);
        assert!(ctx.is_review_round());
        let ctx = RetryContext::new("test", "implement", "flaky", "...", 2);
        assert!(!ctx.is_review_round());
    }
}
