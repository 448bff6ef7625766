//! Review findings: the output of the review phase, one per (task, round).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use orcstore::{IndexValue, Record, now_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSeverity {
    Blocker,
    Issue,
    Suggestion,
    Info,
}

impl std::fmt::Display for ReviewSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewSeverity::Blocker => write!(f, "blocker"),
            ReviewSeverity::Issue => write!(f, "issue"),
            ReviewSeverity::Suggestion => write!(f, "suggestion"),
            ReviewSeverity::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: ReviewSeverity,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub description: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub id: String,
    pub task_id: String,
    pub round: u32,
    pub summary: String,
    pub findings: Vec<Finding>,
    pub positives: Vec<String>,
    pub open_questions: Vec<String>,
    pub updated_at: i64,
}

impl ReviewFinding {
    pub fn new(task_id: impl Into<String>, round: u32, summary: impl Into<String>) -> Self {
        let task_id = task_id.into();
        let round = round.max(1);
        Self {
            id: format!("{task_id}:{round}"),
            task_id,
            round,
            summary: summary.into(),
            findings: Vec::new(),
            positives: Vec::new(),
            open_questions: Vec::new(),
            updated_at: now_ms(),
        }
    }

    pub fn has_blocker(&self) -> bool {
        self.findings.iter().any(|f| f.severity == ReviewSeverity::Blocker)
    }
}

impl Record for ReviewFinding {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "review_findings"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("task_id".to_string(), IndexValue::String(self.task_id.clone()));
        fields.insert("round".to_string(), IndexValue::Int(self.round as i64));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_is_floored_at_one() {
        let review = ReviewFinding::new("t1", 0, "looks fine");
        assert_eq!(review.round, 1);
    }

    #[test]
    fn has_blocker_checks_severity() {
        let mut review = ReviewFinding::new("t1", 1, "summary");
        assert!(!review.has_blocker());
        review.findings.push(Finding {
            severity: ReviewSeverity::Blocker,
            file: Some("src/lib.rs".into()),
            line: Some(10),
            description: "unwrap on user input".into(),
            suggestion: None,
        });
        assert!(review.has_blocker());
    }
}
