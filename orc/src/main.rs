//! orc - CLI entry point (§4.12).

use clap::Parser;
use orc::cli::{Cli, Command};
use orc::config::Config;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            task_id,
            config,
            backend_path,
            worktree,
            agent_binary,
            model,
        } => {
            let config = if config.exists() {
                Config::load(&config)?
            } else {
                Config::default()
            };
            orc::run_task(&task_id, &config, &backend_path, &worktree, &agent_binary, &model).await?;
        }
        Command::RetryContext {
            failed_phase,
            failure_output,
        } => {
            let failure_output = std::fs::read_to_string(&failure_output)?;
            let doc = orc::phase::RetryContextBuilder::build(&orc::phase::RetryContextInput {
                failed_phase,
                failure_reason: "manual".to_string(),
                failure_output,
                attempt: 1,
                max_attempts: 5,
                review_comments: Vec::new(),
                pr_comments: Vec::new(),
                additional_instructions: None,
                previous_session_summary: None,
                gate_analysis: None,
            });
            println!("{doc}");
        }
        Command::Init { path } => {
            let config = Config::default();
            let yaml = serde_yaml::to_string(&config)?;
            std::fs::write(&path, yaml)?;
            println!("wrote default config to {}", path.display());
        }
    }

    Ok(())
}
