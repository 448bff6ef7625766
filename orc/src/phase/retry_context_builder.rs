//! RetryContextBuilder (§4.6): a pure function from failure context to a
//! markdown document the retry destination phase is prompted with.

use std::collections::BTreeMap;

use crate::domain::TranscriptEntry;

/// One review comment to fold into `## Review Comments to Address`.
#[derive(Debug, Clone)]
pub struct ReviewComment {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub severity: String,
    pub description: String,
}

/// One PR comment to fold into `## PR Feedback to Address`.
#[derive(Debug, Clone)]
pub struct PrComment {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct RetryContextInput {
    pub failed_phase: String,
    pub failure_reason: String,
    pub failure_output: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub review_comments: Vec<ReviewComment>,
    pub pr_comments: Vec<PrComment>,
    pub additional_instructions: Option<String>,
    pub previous_session_summary: Option<String>,
    pub gate_analysis: Option<String>,
}

const FAILURE_OUTPUT_BYTE_BUDGET: usize = 4000;

pub struct RetryContextBuilder;

impl RetryContextBuilder {
    /// Build the markdown document. Deterministic: identical inputs produce
    /// byte-identical output (I4); an empty `gate_analysis` yields output
    /// byte-equal to the non-gate variant.
    pub fn build(input: &RetryContextInput) -> String {
        let mut doc = String::new();

        doc.push_str(&format!(
            "# Retry Context\n\nattempt {} of {}\n\n",
            input.attempt, input.max_attempts
        ));

        doc.push_str("## Previous Attempt Summary\n\n");
        doc.push_str(&format!("phase: {}\n", input.failed_phase));
        doc.push_str(&format!("reason: {}\n\n", input.failure_reason));

        if !input.failure_output.trim().is_empty() {
            doc.push_str("### Failure Output\n\n");
            doc.push_str(&truncate_output(&input.failure_output));
            doc.push_str("\n\n");
        }

        if !input.review_comments.is_empty() {
            doc.push_str("## Review Comments to Address\n\n");
            doc.push_str(&format_review_comments(&input.review_comments));
            doc.push('\n');
        }

        if !input.pr_comments.is_empty() {
            doc.push_str("## PR Feedback to Address\n\n");
            doc.push_str(&format_pr_comments(&input.pr_comments));
            doc.push('\n');
        }

        if let Some(instructions) = &input.additional_instructions {
            if !instructions.trim().is_empty() {
                doc.push_str("## Additional Instructions\n\n");
                doc.push_str(instructions);
                doc.push_str("\n\n");
            }
        }

        if let Some(summary) = &input.previous_session_summary {
            if !summary.trim().is_empty() {
                doc.push_str("## Context from Previous Session\n\n");
                doc.push_str(summary);
                doc.push_str("\n\n");
            }
        }

        if let Some(gate_analysis) = &input.gate_analysis {
            if !gate_analysis.trim().is_empty() {
                doc.push_str("## Gate Analysis\n\n");
                doc.push_str(gate_analysis);
                doc.push('\n');
            }
        }

        doc.trim_end().to_string() + "\n"
    }

    /// The compressed previous-session summary algorithm (§4.6): one line
    /// per phase that appears in the transcripts, plus up to 5 distinct
    /// error lines in encounter order.
    pub fn compress_session_summary(transcripts: &[TranscriptEntry]) -> String {
        let mut phases_seen = Vec::new();
        let mut seen_phases = std::collections::HashSet::new();
        for entry in transcripts {
            if seen_phases.insert(entry.phase.clone()) {
                phases_seen.push(entry.phase.clone());
            }
        }

        let mut summary = String::new();
        for phase in &phases_seen {
            summary.push_str(&format!("Phase `{phase}` was executed\n"));
        }

        let mut error_lines = Vec::new();
        let mut seen_lines = std::collections::HashSet::new();
        for entry in transcripts {
            for line in entry.content.lines() {
                if error_lines.len() >= 5 {
                    break;
                }
                if is_error_line(line) && seen_lines.insert(line.to_string()) {
                    error_lines.push(line.to_string());
                }
            }
        }

        if !error_lines.is_empty() {
            summary.push_str("\nKey issues encountered:\n");
            for line in &error_lines {
                summary.push_str(&format!("- {line}\n"));
            }
        }

        summary
    }
}

fn truncate_output(output: &str) -> String {
    if output.len() <= FAILURE_OUTPUT_BYTE_BUDGET {
        return output.to_string();
    }
    let mut end = FAILURE_OUTPUT_BYTE_BUDGET;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!("…(truncated)…\n{}", &output[output.len() - end..])
}

/// Severity normalization (§4.6): blank → `INFO`; else upper-case input.
pub fn normalize_severity(severity: &str) -> String {
    if severity.trim().is_empty() {
        "INFO".to_string()
    } else {
        severity.to_uppercase()
    }
}

fn format_review_comments(comments: &[ReviewComment]) -> String {
    let mut by_file: BTreeMap<String, Vec<&ReviewComment>> = BTreeMap::new();
    let mut general = Vec::new();

    for comment in comments {
        match &comment.file {
            Some(file) => by_file.entry(file.clone()).or_default().push(comment),
            None => general.push(comment),
        }
    }

    let mut out = String::new();
    if !general.is_empty() {
        out.push_str("### General Comments\n\n");
        for comment in &general {
            out.push_str(&format_review_entry(comment));
        }
        out.push('\n');
    }

    for (file, comments) in &by_file {
        out.push_str(&format!("### {file}\n\n"));
        for comment in comments {
            out.push_str(&format_review_entry(comment));
        }
        out.push('\n');
    }

    out.trim_end().to_string() + "\n"
}

fn format_review_entry(comment: &ReviewComment) -> String {
    let severity = normalize_severity(&comment.severity);
    let line = comment.line.map(|l| l.to_string()).unwrap_or_else(|| "?".to_string());
    format!("**Line {line}** [{severity}] {}\n", comment.description)
}

fn format_pr_comments(comments: &[PrComment]) -> String {
    let mut out = String::new();
    for comment in comments {
        let header = match (&comment.file, comment.line) {
            (Some(file), Some(line)) => format!("**{file}:{line}** (@{})", comment.author),
            (Some(file), None) => format!("**{file}** (@{})", comment.author),
            (None, _) => format!("**@{}**", comment.author),
        };
        out.push_str(&header);
        out.push_str(":\n");
        for line in comment.body.lines() {
            out.push_str(&format!("> {line}\n"));
        }
        out.push('\n');
    }
    out.trim_end().to_string() + "\n"
}

/// Error-line classifier (§4.6). Must agree with the positive/negated sets
/// it documents.
pub fn is_error_line(line: &str) -> bool {
    let trimmed = line.trim();
    let lower = trimmed.to_lowercase();

    const NEGATED: &[&str] = &["no error", "no errors", "0 errors", "without error", "zero errors"];
    if NEGATED.iter().any(|n| lower.contains(n)) {
        return false;
    }

    if trimmed.starts_with("ERROR") || trimmed.starts_with("FAILED") || trimmed.starts_with("FATAL") {
        return true;
    }

    const POSITIONAL: &[&str] = &[
        "error:", ": error", "error[", " error ", "failed:", "failure:", "panic:", "fatal:",
    ];
    if POSITIONAL.iter().any(|p| lower.contains(p)) {
        return true;
    }
    if lower.starts_with("error") {
        return true;
    }

    false
}
