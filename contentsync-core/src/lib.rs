//! contentsync core: the types and seams every other crate builds on.
//!
//! - [`types`]: repository identities, sync request, pull-request records
//! - [`config`]: layered [`Settings`] resolved into a [`SyncRequest`]
//! - [`exec`]: the [`CommandRunner`] seam used for every external tool
//! - [`error`]: [`ConfigError`], [`ExecError`]

pub mod config;
pub mod error;
pub mod exec;
pub mod types;

pub use config::Settings;
pub use error::{ConfigError, ExecError};
pub use exec::{CommandOutput, CommandRunner, CommandSpec, Redactor, SystemRunner};
pub use types::{
    BotIdentity, CommitVerification, ForgeTarget, MirrorBackend, PullRequestCommit,
    PullRequestRef, PullRequestState, PullRequestSummary, RepoIdentity, RepoLocation,
    ReviewRequest, SyncBranch, SyncRequest,
};
