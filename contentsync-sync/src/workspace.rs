//! Per-run scratch directory holding the two checkouts.
//!
//! ```text
//! <workdir>/
//!   content-sync-<timestamp>-<pid>/
//!     source/<repo name>/
//!     destination/<repo name>/
//! ```
//!
//! The run directory is created with `create_dir` (not `create_dir_all`) so an
//! existing directory is an error instead of a silently shared checkout.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use contentsync_core::{types::BRANCH_PREFIX, types::BRANCH_TIMESTAMP_FORMAT, RepoIdentity};

use crate::error::{io_err, SyncError};

#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create `<workdir>/content-sync-<timestamp>-<pid>`.
    pub fn create(workdir: &Path, started_at: DateTime<Utc>) -> Result<Self, SyncError> {
        let name = format!(
            "{BRANCH_PREFIX}{}-{}",
            started_at.format(BRANCH_TIMESTAMP_FORMAT),
            std::process::id()
        );
        Self::create_named(workdir, &name)
    }

    pub(crate) fn create_named(workdir: &Path, name: &str) -> Result<Self, SyncError> {
        std::fs::create_dir_all(workdir).map_err(|e| io_err(workdir, e))?;
        let path = workdir.join(name);
        match std::fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SyncError::RunDirectoryExists { path });
            }
            Err(e) => return Err(io_err(&path, e)),
        }
        tracing::debug!(path = %path.display(), "created run directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_checkout(&self, repo: &RepoIdentity) -> PathBuf {
        self.path.join("source").join(repo.name())
    }

    pub fn destination_checkout(&self, repo: &RepoIdentity) -> PathBuf {
        self.path.join("destination").join(repo.name())
    }

    /// Delete the run directory and both checkouts.
    pub fn remove(self) -> Result<(), SyncError> {
        std::fs::remove_dir_all(&self.path).map_err(|e| io_err(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn creates_timestamped_directory() {
        let root = TempDir::new().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let dir = RunDirectory::create(root.path(), at).unwrap();
        let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("content-sync-2024-02-03-04-05-06-"), "{name}");
        assert!(dir.path().is_dir());
    }

    #[test]
    fn refuses_existing_directory() {
        let root = TempDir::new().unwrap();
        RunDirectory::create_named(root.path(), "run").unwrap();
        let err = RunDirectory::create_named(root.path(), "run").unwrap_err();
        assert!(matches!(err, SyncError::RunDirectoryExists { .. }), "got: {err}");
    }

    #[test]
    fn same_repo_name_on_both_sides_does_not_collide() {
        let root = TempDir::new().unwrap();
        let dir = RunDirectory::create_named(root.path(), "run").unwrap();
        let a: RepoIdentity = "upstream/site".parse().unwrap();
        let b: RepoIdentity = "fork/site".parse().unwrap();
        assert_ne!(dir.source_checkout(&a), dir.destination_checkout(&b));
    }

    #[test]
    fn remove_deletes_everything() {
        let root = TempDir::new().unwrap();
        let dir = RunDirectory::create_named(root.path(), "run").unwrap();
        std::fs::write(dir.path().join("f"), "x").unwrap();
        let path = dir.path().to_path_buf();
        dir.remove().unwrap();
        assert!(!path.exists());
    }
}
