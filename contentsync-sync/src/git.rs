//! A checkout owned by one run, driven through the `git` CLI.
//!
//! Every command runs with the checkout as working directory and
//! `GIT_TERMINAL_PROMPT=0` so a missing credential fails instead of hanging.
//! Identity is written to the checkout's own config, never `--global`, so
//! concurrent runs in other checkouts cannot race on it.
//!
//! Remote URLs carry no credentials. Commands that talk to the remote (clone
//! and push) get [`GitCredentials`] through their own environment, so nothing
//! secret lands in `.git/config` or on the command line.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

use contentsync_core::exec::excerpt;
use contentsync_core::{
    BotIdentity, CommandOutput, CommandRunner, CommandSpec, ExecError, SyncBranch,
};

use crate::error::SyncError;

/// Answers `git credential fill` from `CONTENTSYNC_GIT_USERNAME` and
/// `CONTENTSYNC_GIT_TOKEN`; store and erase are ignored.
const CREDENTIAL_HELPER: &str = concat!(
    "!f() { test \"$1\" = get && printf 'username=%s\\npassword=%s\\n' ",
    "\"$CONTENTSYNC_GIT_USERNAME\" \"$CONTENTSYNC_GIT_TOKEN\"; }; f"
);

/// HTTPS username and token for one run.
pub struct GitCredentials {
    username: String,
    token: SecretString,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl GitCredentials {
    pub fn new(username: impl Into<String>, token: &SecretString) -> Self {
        Self {
            username: username.into(),
            token: SecretString::from(token.expose_secret().to_owned()),
        }
    }

    /// Install a one-shot credential helper in `spec`'s environment.
    ///
    /// The empty first value clears helpers from system and user config so a
    /// stale cached credential cannot win.
    pub fn authorize(&self, spec: CommandSpec) -> CommandSpec {
        spec.env("GIT_CONFIG_COUNT", "2")
            .env("GIT_CONFIG_KEY_0", "credential.helper")
            .env("GIT_CONFIG_VALUE_0", "")
            .env("GIT_CONFIG_KEY_1", "credential.helper")
            .env("GIT_CONFIG_VALUE_1", CREDENTIAL_HELPER)
            .env("CONTENTSYNC_GIT_USERNAME", self.username.as_str())
            .env("CONTENTSYNC_GIT_TOKEN", self.token.expose_secret())
    }
}

/// Options for [`WorkingTree::clone_from`].
#[derive(Debug, Clone, Default)]
pub struct CloneOptions<'c> {
    /// Branch to check out; `None` takes the remote default.
    pub git_ref: Option<String>,
    /// Fetch only `git_ref` (ignored without a ref).
    pub single_branch: bool,
    /// Used for the clone and kept for later pushes.
    pub credentials: Option<&'c GitCredentials>,
}

/// Whether the content commit is signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signing {
    /// `git commit -S`, optionally pinning `user.signingkey`.
    Signed { key: Option<String> },
    /// Local mode only: no signing infrastructure required.
    Unsigned,
}

pub struct WorkingTree<'r> {
    runner: &'r dyn CommandRunner,
    path: PathBuf,
    credentials: Option<&'r GitCredentials>,
}

impl std::fmt::Debug for WorkingTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingTree").field("path", &self.path).finish()
    }
}

fn git() -> CommandSpec {
    CommandSpec::new("git").env("GIT_TERMINAL_PROMPT", "0")
}

impl<'r> WorkingTree<'r> {
    /// Bind to an existing checkout.
    pub fn open(runner: &'r dyn CommandRunner, path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            path: path.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<&'r GitCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// `git clone [--single-branch] [-b <ref>] <url> <dest>`. Fatal on failure.
    pub fn clone_from(
        runner: &'r dyn CommandRunner,
        url: &str,
        dest: &Path,
        opts: &CloneOptions<'r>,
    ) -> Result<Self, SyncError> {
        let mut spec = git().arg("clone");
        if let Some(git_ref) = &opts.git_ref {
            if opts.single_branch {
                spec = spec.arg("--single-branch");
            }
            spec = spec.args(["-b", git_ref.as_str()]);
        }
        spec = spec.arg(url).arg(dest.to_string_lossy());
        if let Some(credentials) = opts.credentials {
            spec = credentials.authorize(spec);
        }
        runner.checked(&spec)?;
        Ok(Self::open(runner, dest).with_credentials(opts.credentials))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn spec<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        git().args(args).current_dir(&self.path)
    }

    fn checked<I, S>(&self, args: I) -> Result<CommandOutput, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.runner.checked(&self.spec(args))?)
    }

    /// `git checkout -b <branch>` off the current HEAD.
    pub fn checkout_new_branch(&self, branch: &SyncBranch) -> Result<(), SyncError> {
        self.checked(["checkout", "-b", branch.as_str()])?;
        Ok(())
    }

    /// Stage every addition, modification and deletion in the tree.
    pub fn stage_all(&self) -> Result<(), SyncError> {
        self.checked(["add", "--all"])?;
        Ok(())
    }

    /// `git diff --staged --quiet`: exit 0 ⇒ no change, exit 1 ⇒ change.
    ///
    /// Any other exit code is a failure of git itself and is raised.
    pub fn has_staged_changes(&self) -> Result<bool, SyncError> {
        let spec = self.spec(["diff", "--staged", "--quiet"]);
        let output = self.runner.execute(&spec)?;
        match output.exit_code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            exit_code => Err(ExecError::UnexpectedExit {
                command: self.runner.redact(&spec.command_line()),
                exit_code,
                stderr: self.runner.redact(&excerpt(&output.stderr_lossy())),
            }
            .into()),
        }
    }

    /// Write author/committer identity into this checkout's config.
    pub fn configure_identity(
        &self,
        identity: &BotIdentity,
        signing_key: Option<&str>,
    ) -> Result<(), SyncError> {
        self.checked(["config", "--local", "user.name", identity.name.as_str()])?;
        self.checked(["config", "--local", "user.email", identity.email.as_str()])?;
        if let Some(key) = signing_key {
            self.checked(["config", "--local", "user.signingkey", key])?;
        }
        Ok(())
    }

    /// Commit what is staged and return the new HEAD.
    ///
    /// `Unsigned` passes `--no-gpg-sign` so an ambient `commit.gpgsign` is
    /// overridden.
    pub fn commit(&self, message: &str, signing: &Signing) -> Result<String, SyncError> {
        let mut args = vec!["commit"];
        args.push(match signing {
            Signing::Signed { .. } => "-S",
            Signing::Unsigned => "--no-gpg-sign",
        });
        args.extend(["-m", message]);
        self.checked(args)?;
        self.head()
    }

    /// `git rev-parse HEAD`.
    pub fn head(&self) -> Result<String, SyncError> {
        let output = self.checked(["rev-parse", "HEAD"])?;
        Ok(output.stdout_lossy().trim().to_string())
    }

    /// `git push -u origin <branch>`. Never forced.
    pub fn push_upstream(&self, branch: &SyncBranch) -> Result<(), SyncError> {
        let mut spec = self.spec(["push", "-u", "origin", branch.as_str()]);
        if let Some(credentials) = self.credentials {
            spec = credentials.authorize(spec);
        }
        self.runner.checked(&spec)?;
        Ok(())
    }

    /// `git status`, traced for diagnostics only.
    pub fn trace_status(&self) -> Result<(), SyncError> {
        self.runner.execute(&self.spec(["status", "--short"]))?;
        Ok(())
    }

    /// `git remote -v`, traced for diagnostics only.
    pub fn trace_remotes(&self) -> Result<(), SyncError> {
        self.runner.execute(&self.spec(["remote", "-v"]))?;
        Ok(())
    }
}
