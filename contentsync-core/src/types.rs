//! Domain types for a content sync run.
//!
//! Everything here is immutable once a run starts. Paths inside a repository
//! are kept as the operator wrote them (`String`), because a trailing
//! separator on the source subpath changes mirror semantics.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fixed workflow strings
// ---------------------------------------------------------------------------

/// Title of every pull request opened by a sync run.
pub const PR_TITLE: &str = "Update content";

/// Body of every pull request opened by a sync run.
pub const PR_BODY: &str = "Automated content update.";

/// Message of the single commit produced by a sync run.
pub const COMMIT_MESSAGE: &str = "Update content";

/// Prefix shared by every sync branch.
pub const BRANCH_PREFIX: &str = "content-sync-";

/// `chrono` format of the branch timestamp (UTC, second resolution).
pub const BRANCH_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

pub const DEFAULT_BASE_BRANCH: &str = "main";
pub const DEFAULT_BOT_USERNAME: &str = "scientificpythontranslations";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A hosting-platform repository identity in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoIdentity(String);

impl RepoIdentity {
    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(o, _)| o).unwrap_or_default()
    }

    /// Repository name; also the directory name of a default clone.
    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, n)| n).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RepoIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self(trimmed.to_owned()))
            }
            _ => Err(format!("expected 'owner/name', got '{s}'")),
        }
    }
}

impl TryFrom<String> for RepoIdentity {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepoIdentity> for String {
    fn from(r: RepoIdentity) -> Self {
        r.0
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The per-run branch carrying a content update: `content-sync-<timestamp>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncBranch(pub String);

impl SyncBranch {
    /// Branch name for a run started at `started_at`.
    pub fn at(started_at: DateTime<Utc>) -> Self {
        Self(format!(
            "{BRANCH_PREFIX}{}",
            started_at.format(BRANCH_TIMESTAMP_FORMAT)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SyncBranch {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Sync request
// ---------------------------------------------------------------------------

/// One side of a sync: repository, optional ref and subpath in the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoLocation {
    pub repo: RepoIdentity,
    /// Branch to clone; `None` clones the remote's default branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    /// Path relative to the checkout root, exactly as configured.
    pub subpath: String,
}

impl RepoLocation {
    /// A trailing separator means "the contents of this directory".
    pub fn contents_only(&self) -> bool {
        self.subpath.ends_with('/') || self.subpath.ends_with(std::path::MAIN_SEPARATOR)
    }
}

/// The bot account used for commit authorship and as trusted signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub name: String,
    pub email: String,
}

impl BotIdentity {
    /// `Name <email>`, the string a verified signature payload must contain.
    pub fn signer(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// How the source tree is mirrored into the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MirrorBackend {
    /// External `rsync -a --delete`.
    #[default]
    Rsync,
    /// In-process tree walk.
    Native,
}

impl FromStr for MirrorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rsync" => Ok(Self::Rsync),
            "native" => Ok(Self::Native),
            other => Err(format!(
                "unknown mirror backend '{other}'; expected: rsync, native"
            )),
        }
    }
}

impl fmt::Display for MirrorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorBackend::Rsync => write!(f, "rsync"),
            MirrorBackend::Native => write!(f, "native"),
        }
    }
}

/// Where the hosting API lives and which repository it is asked about.
#[derive(Debug)]
pub struct ForgeTarget {
    pub repo: RepoIdentity,
    pub api_url: String,
    pub credential: SecretString,
}

/// Everything one run needs. Built once from configuration, never mutated.
#[derive(Debug)]
pub struct SyncRequest {
    pub source: RepoLocation,
    pub destination: RepoLocation,
    /// Base of the pull request (the destination's integration branch).
    pub base_branch: String,
    pub identity: BotIdentity,
    /// Bot account used in authenticated clone URLs.
    pub username: String,
    pub credential: SecretString,
    pub auto_merge: bool,
    /// Unsigned commits and bypassed trust checks; for testing without keys.
    pub local_mode: bool,
    pub mirror: MirrorBackend,
    pub signing_key: Option<String>,
    /// Clone from `<remote_root>/<owner>/<name>` instead of GitHub.
    pub remote_root: Option<String>,
    pub api_url: String,
}

impl SyncRequest {
    /// Clone URL for `repo`. Never carries the credential; git receives it
    /// per command instead.
    pub fn clone_url(&self, repo: &RepoIdentity) -> String {
        match &self.remote_root {
            Some(root) => format!("{}/{}", root.trim_end_matches('/'), repo),
            None => format!("https://github.com/{repo}.git"),
        }
    }
}

/// Minimal configuration for reviewing an existing pull request.
#[derive(Debug)]
pub struct ReviewRequest {
    pub forge: ForgeTarget,
    pub identity: BotIdentity,
    pub local_mode: bool,
}

// ---------------------------------------------------------------------------
// Hosting-platform records
// ---------------------------------------------------------------------------

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    #[default]
    Open,
    Closed,
    Merged,
}

/// A pull request as listed by the hosting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub head_ref: String,
    pub base_ref: String,
    pub state: PullRequestState,
    pub html_url: String,
}

impl PullRequestSummary {
    /// A pull request belongs to a run only if title AND head branch match.
    pub fn matches(&self, title: &str, head_ref: &str) -> bool {
        self.title == title && self.head_ref == head_ref
    }
}

/// Signature verification facts for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommitVerification {
    pub verified: bool,
    #[serde(default)]
    pub reason: String,
    /// Signed object text; opaque, searched by substring only.
    #[serde(default)]
    pub payload: Option<String>,
}

/// One commit of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestCommit {
    pub sha: String,
    pub verification: CommitVerification,
}

/// Reference to a freshly created pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub head: SyncBranch,
    pub base: String,
    pub title: String,
    /// URL printed by the hosting platform, when it reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn repo_identity_splits_owner_and_name() {
        let repo: RepoIdentity = "scientific-python/scipy.org-translations".parse().unwrap();
        assert_eq!(repo.owner(), "scientific-python");
        assert_eq!(repo.name(), "scipy.org-translations");
        assert_eq!(repo.to_string(), "scientific-python/scipy.org-translations");
    }

    #[test]
    fn repo_identity_rejects_malformed_values() {
        for bad in ["", "owner", "/name", "owner/", "a/b/c"] {
            assert!(bad.parse::<RepoIdentity>().is_err(), "accepted '{bad}'");
        }
    }

    #[test]
    fn sync_branch_uses_utc_second_resolution() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(SyncBranch::at(at).as_str(), "content-sync-2024-03-09-07-05-02");
    }

    #[test]
    fn sync_branches_from_different_seconds_differ() {
        let first = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        let second = first + chrono::Duration::seconds(1);
        assert_ne!(SyncBranch::at(first), SyncBranch::at(second));
    }

    #[test]
    fn signer_formats_name_and_email() {
        let id = BotIdentity {
            name: "Translations Bot".into(),
            email: "bot@example.org".into(),
        };
        assert_eq!(id.signer(), "Translations Bot <bot@example.org>");
    }

    #[test]
    fn trailing_separator_selects_contents_only() {
        let mut loc = RepoLocation {
            repo: "o/r".parse().unwrap(),
            git_ref: None,
            subpath: "content/en/".into(),
        };
        assert!(loc.contents_only());
        loc.subpath = "content/en".into();
        assert!(!loc.contents_only());
    }

    #[test]
    fn pull_request_match_requires_title_and_branch() {
        let pr = PullRequestSummary {
            number: 7,
            title: PR_TITLE.into(),
            head_ref: "content-sync-2024-01-01-00-00-00".into(),
            base_ref: "main".into(),
            state: PullRequestState::Open,
            html_url: String::new(),
        };
        assert!(pr.matches(PR_TITLE, "content-sync-2024-01-01-00-00-00"));
        assert!(!pr.matches(PR_TITLE, "content-sync-2024-01-01-00-00-01"));
        assert!(!pr.matches("Other", "content-sync-2024-01-01-00-00-00"));
    }

    #[test]
    fn mirror_backend_parses_case_insensitively() {
        assert_eq!("RSYNC".parse::<MirrorBackend>().unwrap(), MirrorBackend::Rsync);
        assert_eq!("native".parse::<MirrorBackend>().unwrap(), MirrorBackend::Native);
        assert!("scp".parse::<MirrorBackend>().is_err());
    }

    #[test]
    fn clone_url_never_embeds_the_token() {
        let mut req = crate::config::tests::sample_request();
        let repo: RepoIdentity = "org/site".parse().unwrap();
        assert_eq!(req.clone_url(&repo), "https://github.com/org/site.git");
        req.remote_root = Some("/srv/remotes/".into());
        assert_eq!(req.clone_url(&repo), "/srv/remotes/org/site");
    }
}
