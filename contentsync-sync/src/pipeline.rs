//! The sync-commit-review state machine.
//!
//! ```text
//! Start ─▶ Branched ─▶ Staged ─┬─▶ NoOp                      (terminal)
//!                              └─▶ Committing ─▶ Committed ─▶ Published ─▶ Reviewed
//! ```
//!
//! - Start → Branched: both checkouts cloned, sync branch created.
//! - Branched → Staged: mirror done, every change staged.
//! - Staged → NoOp: nothing staged; no commit, push or pull request.
//! - Staged → Committing: identity configured, commit under way.
//! - Committing → Committed: exactly one commit, HEAD recorded.
//! - Committed → Published: branch pushed, one pull request opened.
//! - Published → Reviewed: trust evaluated and merge decided (auto-merge only).
//!
//! A dry run stops in `Staged`. Any failure aborts the run where it happens;
//! nothing is retried or rolled back.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use contentsync_core::{
    types::PR_TITLE, CommandRunner, PullRequestRef, SyncBranch, SyncRequest,
};
use contentsync_forge::Forge;

use crate::branch::{self, CommitRecord};
use crate::error::SyncError;
use crate::git::{CloneOptions, GitCredentials, WorkingTree};
use crate::merge::{self, MergeOutcome};
use crate::mirror::{Mirror, MirrorSpec};
use crate::publish;
use crate::trust::TrustEvaluator;
use crate::workspace::RunDirectory;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Start,
    Branched,
    Staged,
    NoOp,
    Committing,
    Committed,
    Published,
    Reviewed,
}

impl SyncState {
    pub fn can_advance_to(self, next: SyncState) -> bool {
        use SyncState::*;
        matches!(
            (self, next),
            (Start, Branched)
                | (Branched, Staged)
                | (Staged, NoOp)
                | (Staged, Committing)
                | (Committing, Committed)
                | (Committed, Published)
                | (Published, Reviewed)
        )
    }
}

/// Current state plus the path taken to reach it.
#[derive(Debug, Clone)]
pub struct StateMachine {
    trail: Vec<SyncState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            trail: vec![SyncState::Start],
        }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        *self.trail.last().unwrap_or(&SyncState::Start)
    }

    pub fn advance(&mut self, next: SyncState) -> Result<(), SyncError> {
        let from = self.state();
        if !from.can_advance_to(next) {
            return Err(SyncError::InvalidTransition { from, to: next });
        }
        tracing::debug!(?from, to = ?next, "sync state transition");
        self.trail.push(next);
        Ok(())
    }

    pub fn trail(&self) -> &[SyncState] {
        &self.trail
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Destination already matched the source.
    NoChanges,
    /// Changes exist; the dry run stopped before committing.
    WouldPublish,
    Published {
        commit: CommitRecord,
        pull_request: PullRequestRef,
        merge: MergeOutcome,
    },
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub branch: SyncBranch,
    pub run_dir: PathBuf,
    pub trail: Vec<SyncState>,
    pub outcome: SyncOutcome,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// External collaborators of a run.
pub struct Collaborators<'a> {
    pub runner: &'a dyn CommandRunner,
    pub forge: &'a dyn Forge,
    pub mirror: &'a dyn Mirror,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Parent of the per-run directory.
    pub workdir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
}

/// Run the whole workflow once.
pub fn run(
    request: &SyncRequest,
    deps: &Collaborators<'_>,
    opts: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let timer = Instant::now();
    let credentials = GitCredentials::new(request.username.as_str(), &request.credential);
    let run_dir = RunDirectory::create(&opts.workdir, opts.started_at)?;
    tracing::info!(
        run_dir = %run_dir.path().display(),
        source = %request.source.repo,
        destination = %request.destination.repo,
        "starting content sync"
    );

    let source = WorkingTree::clone_from(
        deps.runner,
        &request.clone_url(&request.source.repo),
        &run_dir.source_checkout(&request.source.repo),
        &CloneOptions {
            git_ref: request.source.git_ref.clone(),
            single_branch: true,
            credentials: Some(&credentials),
        },
    )?;
    let destination = WorkingTree::clone_from(
        deps.runner,
        &request.clone_url(&request.destination.repo),
        &run_dir.destination_checkout(&request.destination.repo),
        &CloneOptions {
            git_ref: request.destination.git_ref.clone(),
            single_branch: false,
            credentials: Some(&credentials),
        },
    )?;

    let (branch, machine, outcome) =
        sync_trees(request, deps, source.path(), &destination, opts)?;

    Ok(SyncReport {
        branch,
        run_dir: run_dir.path().to_path_buf(),
        trail: machine.trail().to_vec(),
        outcome,
        duration_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

/// Everything after cloning: branch, mirror, detect, commit, publish, review.
pub fn sync_trees(
    request: &SyncRequest,
    deps: &Collaborators<'_>,
    source_root: &Path,
    destination: &WorkingTree<'_>,
    opts: &RunOptions,
) -> Result<(SyncBranch, StateMachine, SyncOutcome), SyncError> {
    let mut machine = StateMachine::new();

    let branch = branch::create_branch(destination, opts.started_at)?;
    machine.advance(SyncState::Branched)?;

    let spec = MirrorSpec::for_request(request, source_root, destination.path());
    let target = spec.confined_target(source_root, destination.path())?;
    tracing::debug!(target = %target.display(), "mirror target confined to checkout");
    deps.mirror.mirror(&spec)?;
    destination.trace_status()?;
    destination.stage_all()?;
    machine.advance(SyncState::Staged)?;

    if !destination.has_staged_changes()? {
        tracing::info!(%branch, "no changes to commit");
        machine.advance(SyncState::NoOp)?;
        return Ok((branch, machine, SyncOutcome::NoChanges));
    }
    if opts.dry_run {
        tracing::info!(%branch, "[dry-run] changes staged; stopping before commit");
        return Ok((branch, machine, SyncOutcome::WouldPublish));
    }

    machine.advance(SyncState::Committing)?;
    let commit = branch::commit_staged(
        destination,
        &request.identity,
        &branch::signing_for(request),
    )?;
    machine.advance(SyncState::Committed)?;

    let pull_request = publish::publish(destination, &branch, &request.base_branch, deps.forge)?;
    machine.advance(SyncState::Published)?;

    let merge = if request.auto_merge {
        let verdict = TrustEvaluator::new(deps.forge)
            .bypass(request.local_mode)
            .evaluate(PR_TITLE, branch.as_str(), &request.identity)?;
        let outcome = merge::apply(deps.forge, &branch, verdict)?;
        machine.advance(SyncState::Reviewed)?;
        outcome
    } else {
        tracing::info!(%branch, "auto-merge not requested; leaving pull request for review");
        MergeOutcome::NotRequested
    };

    Ok((
        branch,
        machine,
        SyncOutcome::Published {
            commit,
            pull_request,
            merge,
        },
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
