//! TurnExecutor: send one prompt to the LLM agent, get back a typed result (§4.1).

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::TurnError;
use super::types::{CompletionSchema, TokenUsage, TurnConfig, TurnResult};

#[async_trait]
pub trait TurnExecutor: Send + Sync {
    /// Run one turn: spawn/resume the agent with `prompt`, await completion or
    /// cancellation. Transport/spawn failure sets `error` on the result rather
    /// than returning `Err`; only configuration/IO problems before the process
    /// could run return `Err`.
    async fn run_turn(&self, prompt: &str, config: &TurnConfig) -> Result<TurnResult, TurnError>;
}

/// Invokes an external agent binary as a subprocess, the way the teacher
/// invokes validation and git commands: `tokio::process::Command` under a
/// `tokio::time::timeout`.
pub struct SubprocessTurnExecutor {
    agent_binary: String,
}

impl SubprocessTurnExecutor {
    pub fn new(agent_binary: impl Into<String>) -> Self {
        Self {
            agent_binary: agent_binary.into(),
        }
    }

    fn build_command(&self, config: &TurnConfig) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.agent_binary);
        cmd.current_dir(&config.working_directory);
        cmd.arg("--model").arg(&config.model);
        cmd.arg("--max-turns").arg(config.max_turns.to_string());

        if config.resume {
            if let Some(session_id) = &config.session_id {
                cmd.arg("--resume").arg(session_id);
            }
        }
        if let Some(mcp_config) = &config.mcp_config_path {
            cmd.arg("--mcp-config").arg(mcp_config);
        }
        for tool in &config.allowed_tools {
            cmd.arg("--allow-tool").arg(tool);
        }
        for tool in &config.disallowed_tools {
            cmd.arg("--disallow-tool").arg(tool);
        }
        for source in &config.settings_sources {
            cmd.arg("--settings").arg(source);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl TurnExecutor for SubprocessTurnExecutor {
    async fn run_turn(&self, prompt: &str, config: &TurnConfig) -> Result<TurnResult, TurnError> {
        let start = Instant::now();
        let mut command = self.build_command(config);

        debug!(resume = config.resume, model = %config.model, "SubprocessTurnExecutor::run_turn: spawning");
        let mut child = command.spawn().map_err(TurnError::Spawn)?;

        if !config.resume {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(prompt.as_bytes()).await.map_err(TurnError::Io)?;
            }
        }
        drop(child.stdin.take());

        let output = match tokio::time::timeout(config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(error_result(start, e.to_string()));
            }
            Err(_) => {
                return Err(TurnError::Timeout(config.timeout));
            }
        };

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let mut result = error_result(start, stderr);
            result.content = stdout;
            result.duration = duration;
            return Ok(result);
        }

        let completion = parse_completion(&stdout);

        Ok(TurnResult {
            content: stdout,
            turns_consumed: 1,
            cost_usd: 0.0,
            usage: TokenUsage::default(),
            session_id: config.session_id.clone(),
            duration,
            error: false,
            error_text: None,
            completion,
        })
    }
}

/// Completion detection (§4.1): when the JSON schema is in force, parse the
/// trailing line; otherwise the caller treats the turn as `continue`.
fn parse_completion(stdout: &str) -> Option<CompletionSchema> {
    let last_line = stdout.lines().last()?;
    serde_json::from_str::<CompletionSchema>(last_line).ok()
}

fn error_result(start: Instant, error_text: impl Into<String>) -> TurnResult {
    TurnResult {
        content: String::new(),
        turns_consumed: 0,
        cost_usd: 0.0,
        usage: TokenUsage::default(),
        session_id: None,
        duration: start.elapsed(),
        error: true,
        error_text: Some(error_text.into()),
        completion: None,
    }
}

/// A scripted executor for tests: returns queued results in order, erroring
/// once exhausted. Mirrors the teacher's `MockLlmClient`.
#[cfg(test)]
pub struct MockTurnExecutor {
    responses: std::sync::Mutex<Vec<TurnResult>>,
}

#[cfg(test)]
impl MockTurnExecutor {
    pub fn new(responses: Vec<TurnResult>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().rev().collect()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TurnExecutor for MockTurnExecutor {
    async fn run_turn(&self, _prompt: &str, _config: &TurnConfig) -> Result<TurnResult, TurnError> {
        let mut responses = self.responses.lock().unwrap();
        responses.pop().ok_or(TurnError::MockExhausted)
    }
}
