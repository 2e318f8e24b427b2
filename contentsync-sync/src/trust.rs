//! Trust Evaluator: may this run's pull request be merged without review?
//!
//! 1. Page through open pull requests, newest created first, and stop at the
//!    first one whose title AND head branch both equal the expected values.
//!    Recency alone never selects a pull request.
//! 2. Fetch every commit of that pull request.
//! 3. A commit is trusted when it is verified and its verification payload is
//!    attributed to the bot's `Name <email>` by a [`SignerAttribution`].
//! 4. The verdict is the AND over all commits. No commits, or no matching
//!    pull request, is *not* trusted and is logged as an anomaly.
//!
//! In local mode the evaluator returns a bypassed (trusted) verdict without
//! contacting the forge.

use serde::Serialize;

use contentsync_core::{BotIdentity, CommitVerification, PullRequestCommit, PullRequestSummary};
use contentsync_forge::{Forge, PAGE_SIZE};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

/// Decides whether a verified signature belongs to `signer`.
pub trait SignerAttribution {
    fn attributes(&self, verification: &CommitVerification, signer: &str) -> bool;
}

/// The payload text contains `signer` verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadContains;

impl SignerAttribution for PayloadContains {
    fn attributes(&self, verification: &CommitVerification, signer: &str) -> bool {
        verification
            .payload
            .as_deref()
            .is_some_and(|payload| payload.contains(signer))
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Why the verdict came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    AllCommitsTrusted,
    UntrustedCommits,
    /// Anomaly: the matched pull request has no commits.
    NoCommits,
    /// Anomaly: no open pull request matches title and branch.
    PullRequestNotFound,
    /// Local mode; the forge was not consulted.
    Bypassed,
}

impl VerdictReason {
    /// Structurally unexpected, as opposed to a plain refusal.
    pub fn is_anomaly(self) -> bool {
        matches!(self, Self::NoCommits | Self::PullRequestNotFound)
    }
}

/// Per-commit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitCheck {
    pub sha: String,
    pub verified: bool,
    pub attributed: bool,
    pub reason: String,
}

impl CommitCheck {
    pub fn trusted(&self) -> bool {
        self.verified && self.attributed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustVerdict {
    pub trusted: bool,
    pub reason: VerdictReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<u64>,
    pub commits: Vec<CommitCheck>,
}

impl TrustVerdict {
    fn bypassed() -> Self {
        Self {
            trusted: true,
            reason: VerdictReason::Bypassed,
            pull_request: None,
            commits: Vec::new(),
        }
    }

    fn not_found() -> Self {
        Self {
            trusted: false,
            reason: VerdictReason::PullRequestNotFound,
            pull_request: None,
            commits: Vec::new(),
        }
    }

    /// Fold per-commit checks into one verdict. An empty list is never trusted.
    pub fn from_checks(pull_request: Option<u64>, commits: Vec<CommitCheck>) -> Self {
        let (trusted, reason) = if commits.is_empty() {
            (false, VerdictReason::NoCommits)
        } else if commits.iter().all(CommitCheck::trusted) {
            (true, VerdictReason::AllCommitsTrusted)
        } else {
            (false, VerdictReason::UntrustedCommits)
        };
        Self {
            trusted,
            reason,
            pull_request,
            commits,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub struct TrustEvaluator<'f, A = PayloadContains> {
    forge: &'f dyn Forge,
    attribution: A,
    bypass: bool,
}

impl<'f> TrustEvaluator<'f, PayloadContains> {
    pub fn new(forge: &'f dyn Forge) -> Self {
        Self {
            forge,
            attribution: PayloadContains,
            bypass: false,
        }
    }
}

impl<'f, A: SignerAttribution> TrustEvaluator<'f, A> {
    /// Swap the attribution rule without touching the control flow.
    pub fn with_attribution<B: SignerAttribution>(self, attribution: B) -> TrustEvaluator<'f, B> {
        TrustEvaluator {
            forge: self.forge,
            attribution,
            bypass: self.bypass,
        }
    }

    /// Skip verification entirely (local mode).
    pub fn bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    pub fn evaluate(
        &self,
        title: &str,
        branch: &str,
        identity: &BotIdentity,
    ) -> Result<TrustVerdict, SyncError> {
        if self.bypass {
            tracing::info!(%branch, "trust verification bypassed (local mode)");
            return Ok(TrustVerdict::bypassed());
        }

        let Some(pr) = find_pull_request(self.forge, title, branch)? else {
            tracing::warn!(
                %title,
                %branch,
                "anomaly: no open pull request matches title and branch"
            );
            return Ok(TrustVerdict::not_found());
        };

        let signer = identity.signer();
        let checks: Vec<CommitCheck> = all_commits(self.forge, pr.number)?
            .into_iter()
            .map(|commit| self.check(commit, &signer))
            .collect();
        for check in &checks {
            tracing::info!(
                sha = %check.sha,
                verified = check.verified,
                attributed = check.attributed,
                %signer,
                "commit signature check"
            );
        }

        let verdict = TrustVerdict::from_checks(Some(pr.number), checks);
        if verdict.reason.is_anomaly() {
            tracing::warn!(pr = pr.number, %branch, "anomaly: matched pull request has no commits");
        }
        Ok(verdict)
    }

    fn check(&self, commit: PullRequestCommit, signer: &str) -> CommitCheck {
        let v = &commit.verification;
        CommitCheck {
            verified: v.verified,
            attributed: v.verified && self.attribution.attributes(v, signer),
            reason: v.reason.clone(),
            sha: commit.sha,
        }
    }
}

/// Linear search over open pull requests with early exit on the first exact match.
pub fn find_pull_request(
    forge: &dyn Forge,
    title: &str,
    branch: &str,
) -> Result<Option<PullRequestSummary>, SyncError> {
    let mut page = 1;
    loop {
        let prs = forge.open_pull_requests(page)?;
        let last_page = prs.len() < PAGE_SIZE as usize;
        if let Some(pr) = prs.into_iter().find(|pr| pr.matches(title, branch)) {
            tracing::info!(pr = pr.number, %branch, "found pull request");
            return Ok(Some(pr));
        }
        if last_page {
            return Ok(None);
        }
        page += 1;
    }
}

fn all_commits(forge: &dyn Forge, number: u64) -> Result<Vec<PullRequestCommit>, SyncError> {
    let mut commits = Vec::new();
    let mut page = 1;
    loop {
        let batch = forge.pull_request_commits(number, page)?;
        let last_page = batch.len() < PAGE_SIZE as usize;
        commits.extend(batch);
        if last_page {
            return Ok(commits);
        }
        page += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
