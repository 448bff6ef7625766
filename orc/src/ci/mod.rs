//! CIMerger (§4.8): post-finalize, poll check-runs, approve, merge with
//! rebase-on-conflict retry.

mod error;
mod hosting;
mod merger;

pub use error::CiMergeError;
pub use hosting::{CreatePrOptions, GitHubProvider, HostingError, HostingProvider, MergeOptions, MergeOutcome, PullRequest};
pub use merger::CIMerger;
