//! `RsyncMirror` against the real `rsync`. Every test returns early when
//! `rsync` is not on PATH.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use contentsync_core::{BotIdentity, Redactor, SystemRunner};
use contentsync_sync::{Mirror, MirrorSpec, RsyncMirror, Signing, WorkingTree};

fn rsync_available() -> bool {
    Command::new("rsync")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! require_rsync {
    () => {
        if !rsync_available() {
            eprintln!("skipping: rsync not on PATH");
            return;
        }
    };
}

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn spec(source: PathBuf, destination: PathBuf, contents_only: bool) -> MirrorSpec {
    MirrorSpec {
        source,
        destination,
        contents_only,
    }
}

/// Relative paths of every file under `root`, sorted.
fn listing(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().display().to_string());
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

#[test]
fn contents_only_fills_destination_itself() {
    require_rsync!();
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src/content/en");
    write(&src.join("a.md"), "a\n");
    write(&src.join("guide/b.md"), "b\n");
    let dst = tmp.path().join("dst/docs/fr");
    let runner = SystemRunner::new(Redactor::new());

    RsyncMirror::new(&runner)
        .mirror(&spec(src, dst.clone(), true))
        .unwrap();

    assert_eq!(listing(&dst), ["a.md", "guide/b.md"]);
    assert!(!tmp.path().join("dst/docs/en").exists());
}

#[test]
fn directory_itself_lands_beside_destination_under_source_name() {
    require_rsync!();
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src/content/en");
    write(&src.join("a.md"), "a\n");
    let dst = tmp.path().join("dst/docs/fr");
    let runner = SystemRunner::new(Redactor::new());

    let s = spec(src, dst.clone(), false);
    RsyncMirror::new(&runner).mirror(&s).unwrap();

    assert_eq!(s.target().unwrap(), tmp.path().join("dst/docs/en"));
    assert_eq!(listing(&tmp.path().join("dst/docs/en")), ["a.md"]);
    assert!(!dst.exists());
}

#[test]
fn entries_missing_from_source_are_deleted() {
    require_rsync!();
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src/en");
    write(&src.join("keep.md"), "new\n");
    let dst = tmp.path().join("dst/en");
    write(&dst.join("keep.md"), "old\n");
    write(&dst.join("stale.md"), "s\n");
    write(&dst.join("stale_dir/x.md"), "x\n");
    write(&tmp.path().join("dst/outside.md"), "untouched\n");
    let runner = SystemRunner::new(Redactor::new());

    RsyncMirror::new(&runner)
        .mirror(&spec(src, dst.clone(), true))
        .unwrap();

    assert_eq!(listing(&dst), ["keep.md"]);
    assert_eq!(fs::read_to_string(dst.join("keep.md")).unwrap(), "new\n");
    assert!(tmp.path().join("dst/outside.md").is_file());
}

#[test]
fn second_pass_stages_nothing() {
    require_rsync!();
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src/content");
    write(&src.join("index.md"), "hello\n");
    write(&src.join("nested/deep.md"), "deep\n");

    let repo = tmp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    let status = Command::new("git")
        .args(["init", "--quiet"])
        .current_dir(&repo)
        .status()
        .unwrap();
    assert!(status.success());

    let runner = SystemRunner::new(Redactor::new());
    let tree = WorkingTree::open(&runner, &repo);
    let mirror = RsyncMirror::new(&runner);
    let s = spec(src, repo.join("content"), true);

    mirror.mirror(&s).unwrap();
    tree.stage_all().unwrap();
    assert!(tree.has_staged_changes().unwrap());
    tree.configure_identity(
        &BotIdentity {
            name: "Sync Bot".into(),
            email: "bot@example.com".into(),
        },
        None,
    )
    .unwrap();
    tree.commit("first pass", &Signing::Unsigned).unwrap();

    mirror.mirror(&s).unwrap();
    tree.stage_all().unwrap();
    assert!(!tree.has_staged_changes().unwrap(), "second pass is a no-op");
}
