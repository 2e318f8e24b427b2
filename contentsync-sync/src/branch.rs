//! Branch & Commit Manager.
//!
//! One branch per run, named from the run's start time; zero or one commit,
//! never more. The caller gates [`commit_staged`] on the change detector.

use chrono::{DateTime, Utc};
use serde::Serialize;

use contentsync_core::{types::COMMIT_MESSAGE, BotIdentity, SyncBranch, SyncRequest};

use crate::error::SyncError;
use crate::git::{Signing, WorkingTree};

/// Create and check out `content-sync-<timestamp>` off the current HEAD.
pub fn create_branch(
    tree: &WorkingTree<'_>,
    started_at: DateTime<Utc>,
) -> Result<SyncBranch, SyncError> {
    let branch = SyncBranch::at(started_at);
    tree.checkout_new_branch(&branch)?;
    tracing::info!(%branch, tree = %tree.path().display(), "created sync branch");
    Ok(branch)
}

/// Signing policy for a request: signed unless running in local mode.
pub fn signing_for(request: &SyncRequest) -> Signing {
    if request.local_mode {
        Signing::Unsigned
    } else {
        Signing::Signed {
            key: request.signing_key.clone(),
        }
    }
}

/// The commit a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub sha: String,
    pub signed: bool,
}

/// Commit everything staged as the bot identity, with the fixed message.
pub fn commit_staged(
    tree: &WorkingTree<'_>,
    identity: &BotIdentity,
    signing: &Signing,
) -> Result<CommitRecord, SyncError> {
    let key = match signing {
        Signing::Signed { key } => key.as_deref(),
        Signing::Unsigned => None,
    };
    tree.configure_identity(identity, key)?;
    let sha = tree.commit(COMMIT_MESSAGE, signing)?;
    let signed = matches!(signing, Signing::Signed { .. });
    tracing::info!(%sha, signed, "committed content update");
    Ok(CommitRecord { sha, signed })
}
