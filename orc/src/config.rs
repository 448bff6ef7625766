//! Immutable engine configuration: `serde_yaml` file, `clap` CLI overrides.
//!
//! Resolution order is CLI > file > [`Config::default`] — mirrors §9's
//! "global mutable configuration replaced by an immutable Config passed
//! into constructors" decision.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Weight;

/// Durations are configured in whole seconds in the YAML file.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

fn default_ci_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_phase_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_transcript_flush_interval() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(with = "duration_secs", default = "default_ci_timeout")]
    pub ci_timeout: Duration,
    #[serde(with = "duration_secs", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(default = "Config::default_merge_method")]
    pub merge_method: String,
    #[serde(default = "Config::default_true")]
    pub verify_sha_on_merge: bool,
    #[serde(default)]
    pub wait_for_ci: bool,
    #[serde(default)]
    pub merge_on_ci_pass: bool,
    #[serde(default = "Config::default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "Config::default_max_iterations")]
    pub max_iterations: HashMap<String, u32>,
    #[serde(with = "duration_secs", default = "default_phase_timeout")]
    pub phase_timeout: Duration,
    #[serde(with = "duration_secs", default = "default_transcript_flush_interval")]
    pub transcript_flush_interval: Duration,
    #[serde(default = "Config::default_transcript_max_buffer")]
    pub transcript_max_buffer: usize,
    #[serde(default)]
    pub delete_branch_after_merge: bool,
}

impl Config {
    fn default_merge_method() -> String {
        "squash".to_string()
    }

    fn default_true() -> bool {
        true
    }

    fn default_max_retry_attempts() -> u32 {
        5
    }

    fn default_transcript_max_buffer() -> usize {
        50
    }

    fn default_max_iterations() -> HashMap<String, u32> {
        [
            (Weight::Trivial, 5),
            (Weight::Small, 10),
            (Weight::Medium, 20),
            (Weight::Large, 25),
            (Weight::Greenfield, 30),
        ]
        .into_iter()
        .map(|(weight, n)| (weight.to_string(), n))
        .collect()
    }

    /// Per-§9: a retry cap of zero or negative resets to the default (5).
    pub fn max_retry_attempts(&self) -> u32 {
        if self.max_retry_attempts == 0 {
            Self::default_max_retry_attempts()
        } else {
            self.max_retry_attempts
        }
    }

    pub fn max_iterations_for(&self, weight: Weight) -> u32 {
        self.max_iterations
            .get(&weight.to_string())
            .copied()
            .unwrap_or_else(|| weight.max_iterations())
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ci_timeout: default_ci_timeout(),
            poll_interval: default_poll_interval(),
            merge_method: Self::default_merge_method(),
            verify_sha_on_merge: true,
            wait_for_ci: false,
            merge_on_ci_pass: false,
            max_retry_attempts: Self::default_max_retry_attempts(),
            max_iterations: Self::default_max_iterations(),
            phase_timeout: default_phase_timeout(),
            transcript_flush_interval: default_transcript_flush_interval(),
            transcript_max_buffer: Self::default_transcript_max_buffer(),
            delete_branch_after_merge: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.ci_timeout, Duration::from_secs(600));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.merge_method, "squash");
        assert!(config.verify_sha_on_merge);
        assert!(!config.wait_for_ci);
        assert!(!config.merge_on_ci_pass);
        assert_eq!(config.max_retry_attempts, 5);
        assert_eq!(config.phase_timeout, Duration::from_secs(600));
        assert_eq!(config.transcript_flush_interval, Duration::from_secs(5));
        assert_eq!(config.transcript_max_buffer, 50);
        assert!(!config.delete_branch_after_merge);
    }

    #[test]
    fn max_iterations_follow_weight_defaults() {
        let config = Config::default();
        assert_eq!(config.max_iterations_for(Weight::Trivial), 5);
        assert_eq!(config.max_iterations_for(Weight::Greenfield), 30);
    }

    #[test]
    fn zero_retry_attempts_resets_to_default() {
        let mut config = Config::default();
        config.max_retry_attempts = 0;
        assert_eq!(config.max_retry_attempts(), 5);
    }

    #[test]
    fn loads_partial_yaml_with_defaults_filled_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "merge_method: merge\nwait_for_ci: true\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.merge_method, "merge");
        assert!(config.wait_for_ci);
        assert_eq!(config.max_retry_attempts, 5);
    }
}
