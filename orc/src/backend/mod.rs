//! Backend (ambient, §4.11): persistence over `orcstore`.

mod contract;
mod error;
mod jsonl;
mod project;

pub use contract::Backend;
pub use error::BackendError;
pub use jsonl::JsonlBackend;
pub use project::{ProjectInfo, detect_project};
