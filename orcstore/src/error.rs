use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`crate::Store`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: &'static str, id: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize record in {collection}: {source}")]
    Serde {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to acquire file lock on {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
