//! Publication Manager: push the sync branch, open exactly one pull request.
//!
//! No retry. When the push succeeds but the pull request cannot be opened,
//! the branch stays on the remote for manual recovery.

use contentsync_core::{
    types::{PR_BODY, PR_TITLE},
    PullRequestRef, SyncBranch,
};
use contentsync_forge::{Forge, NewPullRequest};

use crate::error::SyncError;
use crate::git::WorkingTree;

pub fn publish(
    tree: &WorkingTree<'_>,
    branch: &SyncBranch,
    base: &str,
    forge: &dyn Forge,
) -> Result<PullRequestRef, SyncError> {
    tree.trace_remotes()?;
    tree.push_upstream(branch)?;
    tracing::info!(%branch, "pushed sync branch");

    let pr = forge.create_pull_request(&NewPullRequest {
        title: PR_TITLE,
        body: PR_BODY,
        head: branch,
        base,
    })?;
    Ok(pr)
}
