//! CI check results: ephemeral — recomputed on every CIMerger poll tick.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Skipped,
    Cancelled,
    TimedOut,
    ActionRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
}

impl CheckRun {
    /// Classify a single check run per §4.8: completed+{success,neutral,skipped}
    /// passes, completed+anything-else fails, anything else is pending.
    pub fn classify(&self) -> CiCheckOutcome {
        match self.status {
            CheckStatus::Completed => match self.conclusion {
                Some(CheckConclusion::Success | CheckConclusion::Neutral | CheckConclusion::Skipped) => CiCheckOutcome::Pass,
                _ => CiCheckOutcome::Fail,
            },
            CheckStatus::Queued | CheckStatus::InProgress => CiCheckOutcome::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiCheckOutcome {
    Pass,
    Fail,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiOverallStatus {
    Passed,
    Failed,
    Pending,
    NoChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiCheckResult {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub pending: u32,
    pub failed_names: Vec<String>,
    pub pending_names: Vec<String>,
    pub details: Vec<CheckRun>,
    pub overall: CiOverallStatus,
}

impl CiCheckResult {
    /// Aggregate raw check runs per §4.8: any fail → failed; else any pending
    /// → pending; else → passed; zero checks → no_checks.
    pub fn from_check_runs(runs: Vec<CheckRun>) -> Self {
        let mut failed_names = Vec::new();
        let mut pending_names = Vec::new();
        let mut passed = 0u32;

        for run in &runs {
            match run.classify() {
                CiCheckOutcome::Pass => passed += 1,
                CiCheckOutcome::Fail => failed_names.push(run.name.clone()),
                CiCheckOutcome::Pending => pending_names.push(run.name.clone()),
            }
        }

        let overall = if runs.is_empty() {
            CiOverallStatus::NoChecks
        } else if !failed_names.is_empty() {
            CiOverallStatus::Failed
        } else if !pending_names.is_empty() {
            CiOverallStatus::Pending
        } else {
            CiOverallStatus::Passed
        };

        Self {
            total: runs.len() as u32,
            passed,
            failed: failed_names.len() as u32,
            pending: pending_names.len() as u32,
            failed_names,
            pending_names,
            details: runs,
            overall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str, status: CheckStatus, conclusion: Option<CheckConclusion>) -> CheckRun {
        CheckRun {
            name: name.to_string(),
            status,
            conclusion,
        }
    }

    #[test]
    fn zero_checks_is_no_checks() {
        let result = CiCheckResult::from_check_runs(vec![]);
        assert_eq!(result.overall, CiOverallStatus::NoChecks);
    }

    #[test]
    fn any_failure_dominates() {
        let runs = vec![
            run("build", CheckStatus::Completed, Some(CheckConclusion::Success)),
            run("test", CheckStatus::Completed, Some(CheckConclusion::Failure)),
            run("lint", CheckStatus::InProgress, None),
        ];
        let result = CiCheckResult::from_check_runs(runs);
        assert_eq!(result.overall, CiOverallStatus::Failed);
        assert_eq!(result.failed_names, vec!["test".to_string()]);
    }

    #[test]
    fn pending_beats_passed_when_no_failures() {
        let runs = vec![
            run("build", CheckStatus::Completed, Some(CheckConclusion::Success)),
            run("deploy", CheckStatus::Queued, None),
        ];
        let result = CiCheckResult::from_check_runs(runs);
        assert_eq!(result.overall, CiOverallStatus::Pending);
    }

    #[test]
    fn all_passing_or_neutral_is_passed() {
        let runs = vec![
            run("build", CheckStatus::Completed, Some(CheckConclusion::Success)),
            run("docs", CheckStatus::Completed, Some(CheckConclusion::Neutral)),
            run("optional", CheckStatus::Completed, Some(CheckConclusion::Skipped)),
        ];
        let result = CiCheckResult::from_check_runs(runs);
        assert_eq!(result.overall, CiOverallStatus::Passed);
    }
}
