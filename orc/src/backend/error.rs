//! Backend error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("store error: {0}")]
    Store(#[from] orcstore::StoreError),

    #[error("task '{0}' not found")]
    TaskNotFound(String),

    #[error("spec not found for task '{0}'")]
    SpecNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
