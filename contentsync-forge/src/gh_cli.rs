//! Pull-request writes through the GitHub CLI (`gh`).
//!
//! The credential reaches `gh` as `GH_TOKEN` in the child's environment only.
//! The parent process environment is never modified, so there is nothing to
//! restore on any exit path. `GH_TOKEN` is always set (possibly empty) so an
//! ambient token from the invoking environment is never picked up.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use contentsync_core::{CommandRunner, CommandSpec, PullRequestRef, RepoIdentity, SyncBranch};

use crate::error::ForgeError;
use crate::NewPullRequest;

/// `gh` wrapper bound to one repository and one credential.
pub struct GhCli<R> {
    runner: R,
    repo: RepoIdentity,
    token: SecretString,
    workdir: Option<PathBuf>,
}

impl<R> std::fmt::Debug for GhCli<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhCli")
            .field("repo", &self.repo)
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}

impl<R: CommandRunner> GhCli<R> {
    pub fn new(runner: R, repo: RepoIdentity, token: &SecretString) -> Self {
        Self {
            runner,
            repo,
            token: SecretString::from(token.expose_secret().to_owned()),
            workdir: None,
        }
    }

    /// Run `gh` from inside a checkout of the repository.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    fn command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("gh")
            .env("GH_TOKEN", self.token.expose_secret())
            .env("GH_PROMPT_DISABLED", "1")
            .env("GH_NO_UPDATE_NOTIFIER", "1")
            .env("NO_COLOR", "1");
        if let Some(dir) = &self.workdir {
            spec = spec.current_dir(dir);
        }
        spec
    }

    /// Arguments of `gh pr create` for `new`.
    pub fn create_spec(&self, new: &NewPullRequest<'_>) -> CommandSpec {
        self.command().args([
            "pr",
            "create",
            "--repo",
            self.repo.as_str(),
            "--base",
            new.base,
            "--head",
            new.head.as_str(),
            "--title",
            new.title,
            "--body",
            new.body,
        ])
    }

    /// Arguments of `gh pr merge` requesting a squash auto-merge.
    pub fn merge_spec(&self, head: &SyncBranch) -> CommandSpec {
        self.command().args([
            "pr",
            "merge",
            head.as_str(),
            "--repo",
            self.repo.as_str(),
            "--auto",
            "--squash",
            "--delete-branch",
        ])
    }

    /// `gh pr create`. Fatal on non-zero exit. `gh` prints the new URL on stdout.
    pub fn create_pull_request(
        &self,
        new: &NewPullRequest<'_>,
    ) -> Result<PullRequestRef, ForgeError> {
        let output = self.runner.checked(&self.create_spec(new))?;
        let url = output
            .stdout_lossy()
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("http"))
            .last()
            .map(str::to_string);
        tracing::info!(repo = %self.repo, head = %new.head, url = ?url, "pull request created");
        Ok(PullRequestRef {
            head: new.head.clone(),
            base: new.base.to_string(),
            title: new.title.to_string(),
            url,
        })
    }

    /// `gh pr merge --auto --squash`. Does not wait for the merge itself.
    pub fn enable_auto_merge(&self, head: &SyncBranch) -> Result<(), ForgeError> {
        self.runner.checked(&self.merge_spec(head))?;
        tracing::info!(repo = %self.repo, %head, "auto-merge requested");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
