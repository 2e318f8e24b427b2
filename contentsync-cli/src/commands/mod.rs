pub mod mirror;
pub mod run;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

use contentsync_core::{ForgeTarget, Redactor, RepoIdentity, Settings, SystemRunner};
use contentsync_forge::{GhCli, GitHubApi, GitHubForge};

/// File layer (when given) overlaid by the process environment.
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let file = match config {
        Some(path) => Settings::load_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Settings::default(),
    };
    let env = Settings::from_env(|key| std::env::var(key).ok())
        .context("invalid environment settings")?;
    Ok(file.merge(env))
}

/// Runner that masks `credential` in everything it traces or reports.
pub fn runner_for(credential: &SecretString) -> SystemRunner {
    SystemRunner::new(Redactor::new().with_secret(credential.expose_secret()))
}

/// GitHub access for `repo`: REST reads plus `gh` writes through `runner`.
pub fn github_forge<'r>(
    runner: &'r SystemRunner,
    repo: &RepoIdentity,
    api_url: &str,
    credential: &SecretString,
) -> GitHubForge<&'r SystemRunner> {
    let api = GitHubApi::new(&ForgeTarget {
        repo: repo.clone(),
        api_url: api_url.to_string(),
        credential: SecretString::from(credential.expose_secret().to_string()),
    });
    GitHubForge::new(api, GhCli::new(runner, repo.clone(), credential))
}
