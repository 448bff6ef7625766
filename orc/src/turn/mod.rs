//! TurnExecutor: one call to the external LLM agent per invocation (§4.1).

mod error;
mod executor;
mod types;

pub use error::TurnError;
#[cfg(test)]
pub use executor::MockTurnExecutor;
pub use executor::{SubprocessTurnExecutor, TurnExecutor};
pub use types::{CompletionSchema, CompletionStatus, TokenUsage, TurnConfig, TurnResult};
