//! GitHub REST reads: open pull requests and per-commit verification.
//!
//! Blocking `ureq` agent, one request per call, no retry. A non-success
//! status is surfaced as [`ForgeError::Http`] with the response body.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use contentsync_core::{
    CommitVerification, ForgeTarget, PullRequestCommit, PullRequestState, PullRequestSummary,
    RepoIdentity,
};

use crate::error::ForgeError;
use crate::PAGE_SIZE;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Debug, Deserialize)]
struct RawPull {
    number: u64,
    title: String,
    state: String,
    #[serde(default)]
    merged_at: Option<String>,
    #[serde(default)]
    html_url: String,
    head: RawRef,
    base: RawRef,
}

impl From<RawPull> for PullRequestSummary {
    fn from(raw: RawPull) -> Self {
        let state = match (raw.state.as_str(), raw.merged_at.is_some()) {
            (_, true) => PullRequestState::Merged,
            ("open", false) => PullRequestState::Open,
            _ => PullRequestState::Closed,
        };
        PullRequestSummary {
            number: raw.number,
            title: raw.title,
            head_ref: raw.head.git_ref,
            base_ref: raw.base.git_ref,
            state,
            html_url: raw.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawVerification {
    verified: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    #[serde(default)]
    verification: Option<RawVerification>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

impl From<RawCommit> for PullRequestCommit {
    fn from(raw: RawCommit) -> Self {
        let verification = raw
            .commit
            .verification
            .map(|v| CommitVerification {
                verified: v.verified,
                reason: v.reason,
                payload: v.payload,
            })
            .unwrap_or_else(|| CommitVerification {
                verified: false,
                reason: "missing".to_string(),
                payload: None,
            });
        PullRequestCommit {
            sha: raw.sha,
            verification,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Read-only GitHub REST client scoped to one repository.
pub struct GitHubApi {
    agent: ureq::Agent,
    api_url: String,
    repo: RepoIdentity,
    token: SecretString,
}

impl std::fmt::Debug for GitHubApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubApi")
            .field("api_url", &self.api_url)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl GitHubApi {
    pub fn new(target: &ForgeTarget) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("contentsync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            api_url: target.api_url.trim_end_matches('/').to_string(),
            repo: target.repo.clone(),
            token: SecretString::from(target.credential.expose_secret().to_owned()),
        }
    }

    pub fn pulls_url(&self) -> String {
        format!("{}/repos/{}/pulls", self.api_url, self.repo)
    }

    pub fn commits_url(&self, number: u64) -> String {
        format!("{}/repos/{}/pulls/{number}/commits", self.api_url, self.repo)
    }

    /// `GET /repos/{repo}/pulls?state=open&sort=created&direction=desc`.
    pub fn open_pull_requests(&self, page: u32) -> Result<Vec<PullRequestSummary>, ForgeError> {
        let url = self.pulls_url();
        let page = page.to_string();
        let raw: Vec<RawPull> = self.get_json(
            &url,
            &[
                ("state", "open"),
                ("sort", "created"),
                ("direction", "desc"),
                ("per_page", &PAGE_SIZE.to_string()),
                ("page", &page),
            ],
        )?;
        tracing::debug!(%url, page = %page, count = raw.len(), "listed open pull requests");
        Ok(raw.into_iter().map(Into::into).collect())
    }

    /// `GET /repos/{repo}/pulls/{number}/commits`.
    pub fn pull_request_commits(
        &self,
        number: u64,
        page: u32,
    ) -> Result<Vec<PullRequestCommit>, ForgeError> {
        let url = self.commits_url(number);
        let page = page.to_string();
        let raw: Vec<RawCommit> = self.get_json(
            &url,
            &[("per_page", &PAGE_SIZE.to_string()), ("page", &page)],
        )?;
        tracing::debug!(%url, page = %page, count = raw.len(), "listed pull request commits");
        Ok(raw.into_iter().map(Into::into).collect())
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ForgeError> {
        let mut request = self
            .agent
            .get(url)
            .set("Accept", ACCEPT)
            .set("X-GitHub-Api-Version", API_VERSION);
        let token = self.token.expose_secret();
        if !token.is_empty() {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        for (k, v) in query {
            request = request.query(k, v);
        }

        match request.call() {
            Ok(response) => response.into_json().map_err(|source| ForgeError::Decode {
                url: url.to_string(),
                source,
            }),
            Err(ureq::Error::Status(status, response)) => Err(ForgeError::Http {
                method: "GET",
                url: url.to_string(),
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(err) => Err(ForgeError::Transport {
                method: "GET",
                url: url.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
