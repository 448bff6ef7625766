//! Hosting provider abstraction (§6): `GetCheckRuns`, `GetPR`, `CreatePR`,
//! `MergePR`, `DeleteBranch`, `ApprovePR`. One concrete implementation
//! against the GitHub REST API, grounded in the teacher's `reqwest`-client
//! construction idiom (`llm/anthropic.rs`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{CheckConclusion, CheckRun, CheckStatus};

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub method: String,
    pub commit_title: Option<String>,
    pub commit_message: Option<String>,
    pub squash_commit_message: Option<String>,
    pub delete_branch: bool,
    pub sha: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub merged: bool,
    pub merge_commit_sha: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub head_sha: String,
    pub base_branch: String,
    pub head_branch: String,
}

#[derive(Debug, Clone)]
pub struct CreatePrOptions {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
}

/// Distinguishes the three outcomes CIMerger's merge retry logic reacts to
/// (§4.8): retryable (back off, rebase, retry), validation (fatal,
/// no retry), or an opaque other error.
#[derive(Debug)]
pub enum HostingError {
    Retryable(String),
    Validation(String),
    Other(eyre::Error),
}

impl std::fmt::Display for HostingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostingError::Retryable(msg) => write!(f, "retryable: {msg}"),
            HostingError::Validation(msg) => write!(f, "validation: {msg}"),
            HostingError::Other(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for HostingError {}

#[async_trait]
pub trait HostingProvider: Send + Sync {
    async fn get_check_runs(&self, git_ref: &str) -> Result<Vec<CheckRun>, HostingError>;
    async fn get_pr(&self, number: u64) -> Result<PullRequest, HostingError>;
    async fn create_pr(&self, opts: CreatePrOptions) -> Result<PullRequest, HostingError>;
    async fn merge_pr(&self, number: u64, opts: MergeOptions) -> Result<MergeOutcome, HostingError>;
    async fn delete_branch(&self, branch: &str) -> Result<(), HostingError>;
    async fn approve_pr(&self, number: u64) -> Result<(), HostingError>;
}

/// Minimal GitHub REST client: bearer token from the environment, no
/// webhook/GraphQL/app-auth machinery.
pub struct GitHubProvider {
    http: reqwest::Client,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubProvider {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token_env: &str) -> eyre::Result<Self> {
        let token = std::env::var(token_env).map_err(|_| eyre::eyre!("environment variable {token_env} not set"))?;
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            owner: owner.into(),
            repo: repo.into(),
            token,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("https://api.github.com/repos/{}/{}{}", self.owner, self.repo, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.api_url(path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "orc")
    }

    fn classify_status(code: reqwest::StatusCode, body: &str) -> HostingError {
        if code.as_u16() == 405 || body.to_lowercase().contains("base branch was modified") {
            HostingError::Retryable(body.to_string())
        } else if code.as_u16() == 422 {
            HostingError::Validation(body.to_string())
        } else {
            HostingError::Other(eyre::eyre!("github request failed ({code}): {body}"))
        }
    }
}

#[derive(Deserialize)]
struct GhCheckRun {
    name: String,
    status: String,
    conclusion: Option<String>,
}

#[derive(Deserialize)]
struct GhCheckRunsResponse {
    check_runs: Vec<GhCheckRun>,
}

#[derive(Deserialize)]
struct GhPrHead {
    sha: String,
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Deserialize)]
struct GhPrBase {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Deserialize)]
struct GhPr {
    number: u64,
    head: GhPrHead,
    base: GhPrBase,
}

#[derive(Deserialize)]
struct GhMergeResponse {
    merged: bool,
    sha: Option<String>,
}

fn parse_status(status: &str) -> CheckStatus {
    match status {
        "queued" => CheckStatus::Queued,
        "in_progress" => CheckStatus::InProgress,
        _ => CheckStatus::Completed,
    }
}

fn parse_conclusion(conclusion: Option<&str>) -> Option<CheckConclusion> {
    match conclusion? {
        "success" => Some(CheckConclusion::Success),
        "failure" => Some(CheckConclusion::Failure),
        "neutral" => Some(CheckConclusion::Neutral),
        "skipped" => Some(CheckConclusion::Skipped),
        "cancelled" => Some(CheckConclusion::Cancelled),
        "timed_out" => Some(CheckConclusion::TimedOut),
        "action_required" => Some(CheckConclusion::ActionRequired),
        _ => None,
    }
}

#[async_trait]
impl HostingProvider for GitHubProvider {
    async fn get_check_runs(&self, git_ref: &str) -> Result<Vec<CheckRun>, HostingError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/commits/{git_ref}/check-runs"))
            .send()
            .await
            .map_err(|err| HostingError::Other(err.into()))?;
        let status = response.status();
        let body = response.text().await.map_err(|err| HostingError::Other(err.into()))?;
        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }
        let parsed: GhCheckRunsResponse = serde_json::from_str(&body).map_err(|err| HostingError::Other(err.into()))?;
        Ok(parsed
            .check_runs
            .into_iter()
            .map(|run| CheckRun {
                name: run.name,
                status: parse_status(&run.status),
                conclusion: parse_conclusion(run.conclusion.as_deref()),
            })
            .collect())
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest, HostingError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/pulls/{number}"))
            .send()
            .await
            .map_err(|err| HostingError::Other(err.into()))?;
        let status = response.status();
        let body = response.text().await.map_err(|err| HostingError::Other(err.into()))?;
        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }
        let parsed: GhPr = serde_json::from_str(&body).map_err(|err| HostingError::Other(err.into()))?;
        Ok(PullRequest {
            number: parsed.number,
            head_sha: parsed.head.sha,
            head_branch: parsed.head.branch,
            base_branch: parsed.base.branch,
        })
    }

    async fn create_pr(&self, opts: CreatePrOptions) -> Result<PullRequest, HostingError> {
        let response = self
            .request(reqwest::Method::POST, "/pulls")
            .json(&serde_json::json!({
                "title": opts.title,
                "body": opts.body,
                "head": opts.head_branch,
                "base": opts.base_branch,
            }))
            .send()
            .await
            .map_err(|err| HostingError::Other(err.into()))?;
        let status = response.status();
        let body = response.text().await.map_err(|err| HostingError::Other(err.into()))?;
        if !status.is_success() {
            return Err(Self::classify_status(status, &body));
        }
        let parsed: GhPr = serde_json::from_str(&body).map_err(|err| HostingError::Other(err.into()))?;
        Ok(PullRequest {
            number: parsed.number,
            head_sha: parsed.head.sha,
            head_branch: parsed.head.branch,
            base_branch: parsed.base.branch,
        })
    }

    async fn merge_pr(&self, number: u64, opts: MergeOptions) -> Result<MergeOutcome, HostingError> {
        let mut body = serde_json::json!({ "merge_method": opts.method });
        if let Some(title) = opts.commit_title {
            body["commit_title"] = serde_json::Value::String(title);
        }
        if let Some(message) = opts.commit_message.or(opts.squash_commit_message) {
            body["commit_message"] = serde_json::Value::String(message);
        }
        if let Some(sha) = opts.sha {
            body["sha"] = serde_json::Value::String(sha);
        }

        let response = self
            .request(reqwest::Method::PUT, &format!("/pulls/{number}/merge"))
            .json(&body)
            .send()
            .await
            .map_err(|err| HostingError::Other(err.into()))?;
        let status = response.status();
        let text = response.text().await.map_err(|err| HostingError::Other(err.into()))?;
        if !status.is_success() {
            return Err(Self::classify_status(status, &text));
        }
        let parsed: GhMergeResponse = serde_json::from_str(&text).map_err(|err| HostingError::Other(err.into()))?;

        if opts.delete_branch {
            if let Ok(pr) = self.get_pr(number).await {
                let _ = self.delete_branch(&pr.head_branch).await;
            }
        }

        Ok(MergeOutcome {
            merged: parsed.merged,
            merge_commit_sha: parsed.sha,
        })
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), HostingError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/git/refs/heads/{branch}"))
            .send()
            .await
            .map_err(|err| HostingError::Other(err.into()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }
        Ok(())
    }

    async fn approve_pr(&self, number: u64) -> Result<(), HostingError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/pulls/{number}/reviews"))
            .json(&serde_json::json!({ "event": "APPROVE" }))
            .send()
            .await
            .map_err(|err| HostingError::Other(err.into()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }
        Ok(())
    }
}
