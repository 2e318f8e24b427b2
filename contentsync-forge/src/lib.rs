//! # contentsync-forge
//!
//! Access to the hosting platform behind one trait, [`Forge`].
//!
//! - [`github::GitHubApi`] reads pull requests and commit verification over
//!   the REST API.
//! - [`gh_cli::GhCli`] creates pull requests and requests auto-merge through
//!   the `gh` CLI, passing the credential in the child environment only.
//! - [`GitHubForge`] combines both.
//! - [`memory::MemoryForge`] is an in-process forge for tests and rehearsals.

pub mod error;
pub mod gh_cli;
pub mod github;
pub mod memory;

use contentsync_core::{
    CommandRunner, PullRequestCommit, PullRequestRef, PullRequestSummary, SyncBranch,
};

pub use error::ForgeError;
pub use gh_cli::GhCli;
pub use github::GitHubApi;
pub use memory::MemoryForge;

/// Items requested per page from list endpoints. A shorter page is the last.
pub const PAGE_SIZE: u32 = 100;

/// Parameters of a pull request to open.
#[derive(Debug, Clone, Copy)]
pub struct NewPullRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a SyncBranch,
    pub base: &'a str,
}

/// Operations this workflow needs from the hosting platform.
///
/// Pages are 1-based and hold at most [`PAGE_SIZE`] items.
pub trait Forge {
    /// Open one pull request.
    fn create_pull_request(&self, new: &NewPullRequest<'_>) -> Result<PullRequestRef, ForgeError>;

    /// Open pull requests, newest created first.
    fn open_pull_requests(&self, page: u32) -> Result<Vec<PullRequestSummary>, ForgeError>;

    /// Commits of pull request `number`, oldest first.
    fn pull_request_commits(
        &self,
        number: u64,
        page: u32,
    ) -> Result<Vec<PullRequestCommit>, ForgeError>;

    /// Ask the platform to squash-merge the pull request for `head` once its
    /// checks pass. Returns as soon as the request is accepted.
    fn enable_auto_merge(&self, head: &SyncBranch) -> Result<(), ForgeError>;
}

impl<F: Forge + ?Sized> Forge for &F {
    fn create_pull_request(&self, new: &NewPullRequest<'_>) -> Result<PullRequestRef, ForgeError> {
        (**self).create_pull_request(new)
    }

    fn open_pull_requests(&self, page: u32) -> Result<Vec<PullRequestSummary>, ForgeError> {
        (**self).open_pull_requests(page)
    }

    fn pull_request_commits(
        &self,
        number: u64,
        page: u32,
    ) -> Result<Vec<PullRequestCommit>, ForgeError> {
        (**self).pull_request_commits(number, page)
    }

    fn enable_auto_merge(&self, head: &SyncBranch) -> Result<(), ForgeError> {
        (**self).enable_auto_merge(head)
    }
}

/// GitHub: REST API for reads, `gh` for writes.
#[derive(Debug)]
pub struct GitHubForge<R> {
    api: GitHubApi,
    cli: GhCli<R>,
}

impl<R: CommandRunner> GitHubForge<R> {
    pub fn new(api: GitHubApi, cli: GhCli<R>) -> Self {
        Self { api, cli }
    }
}

impl<R: CommandRunner> Forge for GitHubForge<R> {
    fn create_pull_request(&self, new: &NewPullRequest<'_>) -> Result<PullRequestRef, ForgeError> {
        self.cli.create_pull_request(new)
    }

    fn open_pull_requests(&self, page: u32) -> Result<Vec<PullRequestSummary>, ForgeError> {
        self.api.open_pull_requests(page)
    }

    fn pull_request_commits(
        &self,
        number: u64,
        page: u32,
    ) -> Result<Vec<PullRequestCommit>, ForgeError> {
        self.api.pull_request_commits(number, page)
    }

    fn enable_auto_merge(&self, head: &SyncBranch) -> Result<(), ForgeError> {
        self.cli.enable_auto_merge(head)
    }
}
