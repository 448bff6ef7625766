//! PhaseOutputDetector (§4.2 step b, S1/S2): a read-only probe deciding
//! whether a phase already has durable output that can be auto-skipped.

use crate::backend::Backend;
use crate::domain::Weight;

use super::artifact_store::validate_spec_content;

/// Phases the workflow executor never auto-skips, regardless of prior output.
pub const NEVER_AUTO_SKIP: &[&str] = &["implement", "test", "validate"];

#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    pub has_output: bool,
    pub can_auto_skip: bool,
    pub outputs: Vec<String>,
    pub description: String,
}

pub struct PhaseOutputDetector;

impl PhaseOutputDetector {
    pub async fn detect(backend: &dyn Backend, task_id: &str, phase: &str, weight: Weight) -> DetectionResult {
        if NEVER_AUTO_SKIP.contains(&phase) {
            return DetectionResult {
                has_output: false,
                can_auto_skip: false,
                outputs: Vec::new(),
                description: format!("phase '{phase}' is never auto-skippable"),
            };
        }

        if phase == "spec" {
            return match backend.load_spec(task_id).await {
                Ok(output) => {
                    // The backend's stored spec always wins over any worktree
                    // spec.md sniff when both are present (§9 decision).
                    match validate_spec_content(&output.content, weight) {
                        Ok(()) => DetectionResult {
                            has_output: true,
                            can_auto_skip: true,
                            outputs: vec!["database:spec".to_string()],
                            description: "spec found in database".to_string(),
                        },
                        Err(err) => DetectionResult {
                            has_output: true,
                            can_auto_skip: false,
                            outputs: vec!["database:spec".to_string()],
                            description: format!("spec exists in database but incomplete: {err}"),
                        },
                    }
                }
                Err(_) => DetectionResult::default(),
            };
        }

        match backend.get_phase_outputs_for_task(task_id).await {
            Ok(outputs) => match outputs.into_iter().find(|o| o.phase == phase) {
                Some(_) => DetectionResult {
                    has_output: true,
                    can_auto_skip: true,
                    outputs: vec![format!("database:{phase}")],
                    description: format!("{phase} found in database"),
                },
                None => DetectionResult::default(),
            },
            Err(_) => DetectionResult::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::JsonlBackend;

    #[tokio::test]
    async fn spec_phase_auto_skips_when_complete_spec_present() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonlBackend::open(dir.path()).unwrap();
        backend
            .save_spec(
                "t1",
                "# Spec\n\n## Intent\nX.\n\n## Success Criteria\n- Y\n\n## Testing\n- Z",
                "agent",
            )
            .await
            .unwrap();

        let result = PhaseOutputDetector::detect(&backend, "t1", "spec", Weight::Trivial).await;
        assert!(result.has_output);
        assert!(result.can_auto_skip);
        assert_eq!(result.outputs, vec!["database:spec".to_string()]);
        assert!(result.description.contains("database"));
    }

    #[tokio::test]
    async fn implement_is_never_auto_skippable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonlBackend::open(dir.path()).unwrap();
        let result = PhaseOutputDetector::detect(&backend, "t1", "implement", Weight::Trivial).await;
        assert!(!result.can_auto_skip);
    }
}
