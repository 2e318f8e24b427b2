//! `contentsync verify`: trust verdict for an existing sync pull request.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use contentsync_core::types::PR_TITLE;
use contentsync_sync::{TrustEvaluator, TrustVerdict};

use super::{github_forge, load_settings, runner_for};

/// Arguments for `contentsync verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Head branch of the pull request.
    #[arg(long)]
    pub branch: String,

    /// Title the pull request must carry.
    #[arg(long, default_value = PR_TITLE)]
    pub title: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct CommitRow {
    #[tabled(rename = "commit")]
    sha: String,
    #[tabled(rename = "verified")]
    verified: &'static str,
    #[tabled(rename = "bot signer")]
    attributed: &'static str,
    #[tabled(rename = "reason")]
    reason: String,
}

impl VerifyArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let review = load_settings(config)?
            .resolve_review()
            .context("invalid configuration")?;

        let runner = runner_for(&review.forge.credential);
        let forge = github_forge(
            &runner,
            &review.forge.repo,
            &review.forge.api_url,
            &review.forge.credential,
        );
        let verdict = TrustEvaluator::new(&forge)
            .bypass(review.local_mode)
            .evaluate(&self.title, &self.branch, &review.identity)
            .with_context(|| format!("trust evaluation failed for '{}'", self.branch))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        } else {
            print_verdict(&self.branch, &verdict);
        }
        Ok(())
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn print_verdict(branch: &str, verdict: &TrustVerdict) {
    if !verdict.commits.is_empty() {
        let rows: Vec<CommitRow> = verdict
            .commits
            .iter()
            .map(|c| CommitRow {
                sha: c.sha.get(..12).unwrap_or(&c.sha).to_string(),
                verified: yes_no(c.verified),
                attributed: yes_no(c.attributed),
                reason: c.reason.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    let pr = verdict
        .pull_request
        .map(|n| format!("#{n}"))
        .unwrap_or_else(|| "no pull request".to_string());
    if verdict.trusted {
        println!("{} '{branch}' ({pr}) trusted: {:?}", "✓".green(), verdict.reason);
    } else {
        println!("{} '{branch}' ({pr}) not trusted: {:?}", "✗".red(), verdict.reason);
    }
}
