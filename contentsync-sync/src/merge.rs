//! Merge Decision: auto-merge only when requested AND trusted.

use serde::Serialize;

use contentsync_core::SyncBranch;
use contentsync_forge::Forge;

use crate::error::SyncError;
use crate::trust::TrustVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDecision {
    /// Auto-merge not requested; manual review.
    Skip,
    /// Requested and trusted.
    Request,
    /// Requested but not trusted. A safe outcome, not an error.
    Refuse,
}

pub fn decide(auto_merge_requested: bool, trusted: bool) -> MergeDecision {
    match (auto_merge_requested, trusted) {
        (false, _) => MergeDecision::Skip,
        (true, true) => MergeDecision::Request,
        (true, false) => MergeDecision::Refuse,
    }
}

/// What happened to the pull request after publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "merge", rename_all = "snake_case")]
pub enum MergeOutcome {
    NotRequested,
    Requested { verdict: TrustVerdict },
    Refused { verdict: TrustVerdict },
}

/// Carry out `decide(true, verdict.trusted)`: at most one merge request.
pub fn apply(
    forge: &dyn Forge,
    branch: &SyncBranch,
    verdict: TrustVerdict,
) -> Result<MergeOutcome, SyncError> {
    match decide(true, verdict.trusted) {
        MergeDecision::Request => {
            forge.enable_auto_merge(branch)?;
            tracing::info!(%branch, "all commits trusted; auto-merge requested");
            Ok(MergeOutcome::Requested { verdict })
        }
        _ => {
            if verdict.reason.is_anomaly() {
                tracing::warn!(
                    %branch,
                    reason = ?verdict.reason,
                    "auto-merge refused: anomalous pull request"
                );
            } else {
                tracing::info!(
                    %branch,
                    reason = ?verdict.reason,
                    "auto-merge refused: untrusted commits"
                );
            }
            Ok(MergeOutcome::Refused { verdict })
        }
    }
}
