//! GateEvaluator (§4.4) and gate-output wiring (§4.5).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    Auto,
    Human,
    Ai,
}

#[derive(Debug, Clone, Default)]
pub struct GateEvaluationResult {
    pub approved: bool,
    pub reason: String,
    pub retry_phase: Option<String>,
    pub output_data: Option<Value>,
    pub output_variable_name: Option<String>,
}

/// An auxiliary LLM call that classifies a completed phase's output. Kept
/// as a trait so the workflow executor can run without one (auto-approval)
/// or plug in a real classifier.
#[async_trait]
pub trait AiGateClassifier: Send + Sync {
    async fn classify(&self, phase: &str, output: &str) -> GateEvaluationResult;
}

pub struct GateEvaluator;

impl GateEvaluator {
    pub fn evaluate_auto(phase_succeeded: bool, reason: impl Into<String>) -> GateEvaluationResult {
        GateEvaluationResult {
            approved: phase_succeeded,
            reason: reason.into(),
            retry_phase: None,
            output_data: None,
            output_variable_name: None,
        }
    }

    pub fn evaluate_human() -> GateEvaluationResult {
        GateEvaluationResult {
            approved: false,
            reason: "awaiting human review".to_string(),
            retry_phase: None,
            output_data: None,
            output_variable_name: None,
        }
    }

    pub async fn evaluate_ai(classifier: &dyn AiGateClassifier, phase: &str, output: &str) -> GateEvaluationResult {
        classifier.classify(phase, output).await
    }
}

/// §4.5 / I3: after any gate evaluation, if `output_data` is present and
/// `output_variable_name` is non-whitespace, serialize and store it,
/// overwriting any prior value. Serialization failure or a whitespace-only
/// name is a no-op (logged).
pub fn apply_gate_output_to_vars(result: &GateEvaluationResult, vars: &mut HashMap<String, Value>) {
    let (Some(data), Some(name)) = (&result.output_data, &result.output_variable_name) else {
        return;
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return;
    }
    if let Err(err) = serde_json::to_string(data) {
        warn!(variable = trimmed, error = %err, "gate output serialization failed, variable not stored");
        return;
    }
    vars.insert(trimmed.to_string(), data.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approved_auto_gate_needs_no_output_data() {
        let result = GateEvaluator::evaluate_auto(true, "phase completed");
        assert!(result.approved);
    }

    #[test]
    fn output_data_stored_when_variable_name_present() {
        let mut vars = HashMap::new();
        let result = GateEvaluationResult {
            approved: true,
            reason: "ok".into(),
            retry_phase: None,
            output_data: Some(serde_json::json!({"score": 9})),
            output_variable_name: Some("review_score".into()),
        };
        apply_gate_output_to_vars(&result, &mut vars);
        assert_eq!(vars.get("review_score"), Some(&serde_json::json!({"score": 9})));
    }

    #[test]
    fn whitespace_only_variable_name_is_treated_as_absent() {
        let mut vars = HashMap::new();
        let result = GateEvaluationResult {
            approved: true,
            reason: "ok".into(),
            retry_phase: None,
            output_data: Some(serde_json::json!({"score": 9})),
            output_variable_name: Some("   ".into()),
        };
        apply_gate_output_to_vars(&result, &mut vars);
        assert!(vars.is_empty());
    }

    #[test]
    fn missing_output_data_stores_nothing() {
        let mut vars = HashMap::new();
        let result = GateEvaluationResult {
            approved: false,
            reason: "rejected".into(),
            retry_phase: Some("implement".into()),
            output_data: None,
            output_variable_name: Some("x".into()),
        };
        apply_gate_output_to_vars(&result, &mut vars);
        assert!(vars.is_empty());
    }

    #[test]
    fn overwrites_prior_value() {
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), serde_json::json!(1));
        let result = GateEvaluationResult {
            approved: true,
            reason: "ok".into(),
            retry_phase: None,
            output_data: Some(serde_json::json!(2)),
            output_variable_name: Some("x".into()),
        };
        apply_gate_output_to_vars(&result, &mut vars);
        assert_eq!(vars.get("x"), Some(&serde_json::json!(2)));
    }
}
