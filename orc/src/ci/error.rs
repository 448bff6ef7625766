//! CI/merge error taxonomy (§7): sentinel errors wrapping their payload,
//! `is`-comparable through wrapping rather than stringly-typed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CiMergeError {
    #[error("CI failed: {0:?}")]
    CiFailed(Vec<String>),

    #[error("CI polling exceeded deadline")]
    CiTimeout,

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("hosting provider request failed: {0}")]
    Provider(#[source] eyre::Error),
}
