//! # contentsync-sync
//!
//! Mirror, commit and publish orchestration.
//!
//! Call [`pipeline::run`] to clone both repositories, mirror the source
//! folder into the destination checkout, and publish any change as one
//! commit on a fresh branch with one pull request. With auto-merge
//! requested, [`trust`] decides whether the pull request may be merged.

pub mod branch;
pub mod error;
pub mod git;
pub mod merge;
pub mod mirror;
pub mod pipeline;
pub mod publish;
pub mod trust;
pub mod workspace;

pub use error::SyncError;
pub use git::{CloneOptions, GitCredentials, Signing, WorkingTree};
pub use merge::{MergeDecision, MergeOutcome};
pub use mirror::{Mirror, MirrorSpec, MirrorStats, NativeMirror, RsyncMirror};
pub use pipeline::{run, Collaborators, RunOptions, SyncOutcome, SyncReport, SyncState};
pub use trust::{TrustEvaluator, TrustVerdict, VerdictReason};
pub use workspace::RunDirectory;
