//! ArtifactStore (§3 Ownership, §4.2 step 3): extracts, validates, and
//! persists per-phase outputs. Spec carries stricter structural rules.

use std::sync::Arc;

use crate::backend::Backend;
use crate::domain::{PhaseOutput, Weight};

use super::error::ArtifactError;

const NOISE_PATTERNS: &[&str] = &[r#"{"status":"complete"#, "as an ai language model", "i cannot assist with that"];

const RECOGNIZED_HEADINGS: &[&str] = &[
    "Intent",
    "Success Criteria",
    "Testing",
    "Approach",
    "Scope",
    "Acceptance Criteria",
    "Requirements",
];

/// Per-weight structural requirements (§3): a heavier task needs a more
/// thoroughly planned spec before work can start. `min_len` is the trimmed
/// length floor; `min_headings` recognized headings are always required
/// once the task is weighty enough to skip the short-content heading
/// exemption.
struct WeightRequirement {
    min_len: usize,
    min_headings: usize,
    always_require_headings: bool,
}

fn requirement_for(weight: Weight) -> WeightRequirement {
    match weight {
        Weight::Trivial | Weight::Small => WeightRequirement {
            min_len: 50,
            min_headings: 1,
            always_require_headings: false,
        },
        Weight::Medium => WeightRequirement {
            min_len: 80,
            min_headings: 1,
            always_require_headings: false,
        },
        Weight::Large => WeightRequirement {
            min_len: 150,
            min_headings: 2,
            always_require_headings: true,
        },
        Weight::Greenfield => WeightRequirement {
            min_len: 200,
            min_headings: 2,
            always_require_headings: true,
        },
    }
}

/// Spec content validation (§6, §3): trimmed length and heading coverage
/// floors scale with the task's weight, no noise-pattern match.
pub fn validate_spec_content(content: &str, weight: Weight) -> Result<(), ArtifactError> {
    let requirement = requirement_for(weight);
    let trimmed = content.trim();
    if trimmed.len() < requirement.min_len {
        return Err(ArtifactError::TooShort(trimmed.len()));
    }
    let lower = trimmed.to_lowercase();
    if NOISE_PATTERNS.iter().any(|pattern| lower.contains(&pattern.to_lowercase())) {
        return Err(ArtifactError::NoiseMatch);
    }
    if requirement.always_require_headings || trimmed.len() < 200 {
        let heading_count = RECOGNIZED_HEADINGS.iter().filter(|heading| trimmed.contains(*heading)).count();
        if heading_count < requirement.min_headings {
            return Err(ArtifactError::MissingHeading);
        }
    }
    Ok(())
}

pub struct ArtifactStore {
    backend: Arc<dyn Backend>,
}

impl ArtifactStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Persists a phase's artifact. The `spec` phase is validated and saved
    /// exclusively through the backend (never as a worktree file, to avoid
    /// merge conflicts); other artifact-producing phases go through the
    /// generic PhaseOutput table.
    pub async fn save(&self, task_id: &str, phase: &str, content: &str, source: &str, weight: Weight) -> Result<(), super::error::PhaseError> {
        if phase == "spec" {
            validate_spec_content(content, weight)?;
            self.backend.save_spec(task_id, content, source).await?;
        } else {
            let output = PhaseOutput::new(task_id, phase, content, source);
            self.backend.save_phase_output(&output).await?;
        }
        Ok(())
    }

    pub async fn load(&self, task_id: &str, phase: &str) -> Result<Option<PhaseOutput>, super::error::PhaseError> {
        if phase == "spec" {
            return match self.backend.load_spec(task_id).await {
                Ok(output) => Ok(Some(output)),
                Err(crate::backend::BackendError::SpecNotFound(_)) => Ok(None),
                Err(err) => Err(err.into()),
            };
        }
        let outputs = self.backend.get_phase_outputs_for_task(task_id).await?;
        Ok(outputs.into_iter().find(|o| o.phase == phase))
    }
}
