use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

/// The binary with an empty environment, run from `cwd` so no stray `.env`
/// file is picked up.
fn contentsync(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("contentsync").expect("contentsync binary");
    cmd.env_clear().current_dir(cwd);
    cmd
}

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn help_lists_subcommands() {
    let tmp = TempDir::new().unwrap();
    contentsync(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("run").and(contains("verify")).and(contains("mirror")));
}

#[test]
fn run_without_configuration_names_missing_setting() {
    let tmp = TempDir::new().unwrap();
    contentsync(tmp.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("invalid configuration").and(contains("INPUT_SOURCE-REPO")));
}

#[test]
fn run_rejects_unknown_keys_in_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("contentsync.yaml");
    write(&config, "source_repo: org/site\nsurprise: true\n");
    contentsync(tmp.path())
        .args(["--config", config.to_str().unwrap(), "run"])
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn run_reports_missing_token_after_file_and_env_layers() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("contentsync.yaml");
    write(
        &config,
        "source_repo: org/site\nsource_folder: content/\ntranslations_repo: org/site-translations\n\
         translations_folder: content\nbot_name: Sync Bot\n",
    );
    contentsync(tmp.path())
        .args(["--config", config.to_str().unwrap(), "run"])
        .env("GPG_EMAIL", "bot@example.com")
        .assert()
        .failure()
        .stderr(contains("TOKEN"));
}

#[test]
fn invalid_boolean_in_environment_is_rejected() {
    let tmp = TempDir::new().unwrap();
    contentsync(tmp.path())
        .arg("run")
        .env("INPUT_AUTO-MERGE", "sometimes")
        .assert()
        .failure()
        .stderr(contains("INPUT_AUTO-MERGE"));
}

#[test]
fn native_mirror_copies_contents_and_removes_extras() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    write(&src.join("a.txt"), "a\n");
    write(&src.join("nested/b.txt"), "b\n");
    write(&dst.join("stale.txt"), "old\n");

    contentsync(tmp.path())
        .args(["mirror", &format!("{}/", src.display()), dst.to_str().unwrap(), "--native"])
        .assert()
        .success()
        .stdout(contains("2 copied").and(contains("1 removed")));

    assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "a\n");
    assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "b\n");
    assert!(!dst.join("stale.txt").exists());
}

#[test]
fn native_mirror_without_trailing_separator_places_directory_beside_destination() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("content");
    let dst = tmp.path().join("out/anything");
    write(&src.join("a.txt"), "a\n");

    contentsync(tmp.path())
        .args(["mirror", src.to_str().unwrap(), dst.to_str().unwrap(), "--native"])
        .assert()
        .success();

    assert!(tmp.path().join("out/content/a.txt").is_file());
    assert!(!dst.exists());
}

#[test]
fn native_mirror_second_pass_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    write(&src.join("a.txt"), "a\n");
    let args = [
        "mirror".to_string(),
        format!("{}/", src.display()),
        dst.display().to_string(),
        "--native".to_string(),
    ];

    contentsync(tmp.path()).args(&args).assert().success();
    contentsync(tmp.path())
        .args(&args)
        .assert()
        .success()
        .stdout(contains("0 copied, 1 unchanged, 0 removed"));
}

#[test]
fn mirror_of_missing_source_fails() {
    let tmp = TempDir::new().unwrap();
    contentsync(tmp.path())
        .args(["mirror", "nope/", "dst", "--native"])
        .assert()
        .failure()
        .stderr(contains("not a directory"));
}

#[test]
fn verify_in_local_mode_is_bypassed_without_network() {
    let tmp = TempDir::new().unwrap();
    let assert = contentsync(tmp.path())
        .args(["verify", "--branch", "content-sync-2026-10-19-08-30-00", "--json"])
        .env("INPUT_LOCAL-MODE", "true")
        .env("INPUT_TRANSLATIONS-REPO", "org/site-translations")
        .env("GPG_NAME", "Sync Bot")
        .env("GPG_EMAIL", "bot@example.com")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let verdict: serde_json::Value = serde_json::from_str(&stdout).expect("json verdict");
    assert_eq!(verdict["trusted"], true);
    assert_eq!(verdict["reason"], "bypassed");
}
