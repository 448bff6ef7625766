//! Command-line interface (§4.12).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "orc", about = "Task-phase orchestration engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive one task through its phase sequence.
    Run {
        #[arg(long)]
        task_id: String,
        #[arg(long, default_value = "orc.yaml")]
        config: PathBuf,
        /// Backend data directory (JSONL collections live here).
        #[arg(long, default_value = ".orc/data")]
        backend_path: PathBuf,
        /// Worktree the agent runs in.
        #[arg(long, default_value = ".")]
        worktree: PathBuf,
        /// Agent binary invoked once per turn.
        #[arg(long, default_value = "claude")]
        agent_binary: String,
        /// Model passed to the agent on every turn.
        #[arg(long, default_value = "default")]
        model: String,
    },
    /// Build a RetryContextBuilder document standalone, for debugging.
    RetryContext {
        #[arg(long)]
        failed_phase: String,
        #[arg(long)]
        failure_output: PathBuf,
    },
    /// Write a default config file.
    Init {
        #[arg(long, default_value = "orc.yaml")]
        path: PathBuf,
    },
}
