//! TurnExecutor input/output types (§4.1).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Collected configuration for a single LLM turn.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub model: String,
    pub working_directory: PathBuf,
    pub session_id: Option<String>,
    pub resume: bool,
    pub mcp_config_path: Option<PathBuf>,
    pub max_turns: u32,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub settings_sources: Vec<PathBuf>,
    pub timeout: Duration,
}

impl TurnConfig {
    pub fn new(model: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            working_directory: working_directory.into(),
            session_id: None,
            resume: false,
            mcp_config_path: None,
            max_turns: 1,
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            settings_sources: Vec::new(),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_resume(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self.resume = true;
        self
    }
}

/// The JSON completion schema (§6): `{status, reason?, artifact?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    Blocked,
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSchema {
    pub status: CompletionStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub artifact: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl TokenUsage {
    /// The accounting rule from §4.2 step 2c: effective input includes cache writes/reads.
    pub fn effective_input_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

/// The fully-typed result of one TurnExecutor call.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub content: String,
    pub turns_consumed: u32,
    pub cost_usd: f64,
    pub usage: TokenUsage,
    pub session_id: Option<String>,
    pub duration: Duration,
    pub error: bool,
    pub error_text: Option<String>,
    pub completion: Option<CompletionSchema>,
}

impl TurnResult {
    pub fn status(&self) -> CompletionStatus {
        self.completion
            .as_ref()
            .map(|c| c.status.clone())
            .unwrap_or(CompletionStatus::Continue)
    }
}
