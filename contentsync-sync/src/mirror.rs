//! Mirror Operation: make a destination tree an exact copy of a source tree.
//!
//! ## Trailing-separator semantics (rsync's)
//!
//! - `contents_only = true` (source written with a trailing `/`): the
//!   *contents* of `source` are mirrored into `destination`.
//! - `contents_only = false`: `source` itself is mirrored as a child of
//!   `destination`'s parent, i.e. into `destination.parent()/<source name>`.
//!
//! Additions, modifications and deletions are all mirrored. `destination`'s
//! parent directories are created when absent. Any failure aborts the run.
//!
//! Two backends: [`RsyncMirror`] shells out to `rsync -a --delete`;
//! [`NativeMirror`] walks the trees in-process and only rewrites files whose
//! SHA-256 differs.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use contentsync_core::{CommandRunner, CommandSpec, SyncRequest};

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// MirrorSpec
// ---------------------------------------------------------------------------

/// What to mirror where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSpec {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub contents_only: bool,
}

impl MirrorSpec {
    /// Build the spec for a run from the two checkout roots.
    ///
    /// `contents_only` follows the configured *source* subpath.
    pub fn for_request(request: &SyncRequest, source_root: &Path, destination_root: &Path) -> Self {
        Self {
            source: source_root.join(request.source.subpath.trim_end_matches('/')),
            destination: destination_root
                .join(request.destination.subpath.trim_end_matches('/')),
            contents_only: request.source.contents_only(),
        }
    }

    /// Directory whose content must equal `source`'s after mirroring.
    pub fn target(&self) -> Result<PathBuf, SyncError> {
        if self.contents_only {
            return Ok(self.destination.clone());
        }
        let name = self
            .source
            .file_name()
            .ok_or_else(|| SyncError::InvalidMirrorTarget {
                path: self.source.clone(),
                reason: "source has no final component",
            })?;
        Ok(self.parent()?.join(name))
    }

    /// [`Self::target`], checked against the two checkout roots before
    /// anything is deleted.
    ///
    /// `source` must stay within `source_root`. The target must lie strictly
    /// inside `destination_root` and must not be, or sit under, `.git`. Both
    /// checks are lexical: `..`, absolute and prefix components are refused
    /// outright rather than resolved.
    pub fn confined_target(
        &self,
        source_root: &Path,
        destination_root: &Path,
    ) -> Result<PathBuf, SyncError> {
        if relative_within(&self.source, source_root).is_none() {
            return Err(SyncError::InvalidMirrorTarget {
                path: self.source.clone(),
                reason: "source escapes the source checkout",
            });
        }
        let target = self.target()?;
        let rest = relative_within(&target, destination_root).ok_or_else(|| {
            SyncError::InvalidMirrorTarget {
                path: target.clone(),
                reason: "mirror target escapes the destination checkout",
            }
        })?;
        if rest.as_os_str().is_empty() {
            return Err(SyncError::InvalidMirrorTarget {
                path: target,
                reason: "mirror target is the checkout root",
            });
        }
        if rest.components().any(|c| c.as_os_str() == ".git") {
            return Err(SyncError::InvalidMirrorTarget {
                path: target,
                reason: "mirror target is inside .git",
            });
        }
        Ok(destination_root.join(rest))
    }

    fn parent(&self) -> Result<&Path, SyncError> {
        self.destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| SyncError::InvalidMirrorTarget {
                path: self.destination.clone(),
                reason: "destination has no parent directory",
            })
    }

    fn ensure_parent(&self) -> Result<(), SyncError> {
        let parent = self.parent()?;
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))
    }

    fn require_source(&self) -> Result<(), SyncError> {
        if self.source.is_dir() {
            Ok(())
        } else {
            Err(SyncError::MirrorSourceMissing {
                path: self.source.clone(),
            })
        }
    }
}

/// `path` relative to `root`, with `.` dropped. `None` when `path` is not
/// under `root` or the remainder has a `..`, root or prefix component.
fn relative_within(path: &Path, root: &Path) -> Option<PathBuf> {
    let rest = path.strip_prefix(root).ok()?;
    let mut out = PathBuf::new();
    for component in rest.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// The Mirror Operation seam.
pub trait Mirror {
    fn mirror(&self, spec: &MirrorSpec) -> Result<(), SyncError>;
}

// ---------------------------------------------------------------------------
// rsync backend
// ---------------------------------------------------------------------------

/// `rsync -a --delete`, arguments shaped so rsync applies the same
/// trailing-separator rule as [`MirrorSpec`].
pub struct RsyncMirror<'r> {
    runner: &'r dyn CommandRunner,
}

impl<'r> RsyncMirror<'r> {
    pub fn new(runner: &'r dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn command(spec: &MirrorSpec) -> Result<CommandSpec, SyncError> {
        let source = spec.source.to_string_lossy();
        let source = source.trim_end_matches('/');
        let (from, to) = if spec.contents_only {
            (format!("{source}/"), spec.destination.to_string_lossy().into_owned())
        } else {
            (
                source.to_string(),
                format!("{}/", spec.parent()?.to_string_lossy().trim_end_matches('/')),
            )
        };
        Ok(CommandSpec::new("rsync").args(["-a", "--delete", from.as_str(), to.as_str()]))
    }
}

impl Mirror for RsyncMirror<'_> {
    fn mirror(&self, spec: &MirrorSpec) -> Result<(), SyncError> {
        spec.require_source()?;
        spec.ensure_parent()?;
        self.runner.checked(&Self::command(spec)?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Native backend
// ---------------------------------------------------------------------------

/// Counts from a native mirror pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub copied: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// In-process mirror. Files are replaced via a temporary sibling + rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeMirror;

impl NativeMirror {
    pub fn run(&self, spec: &MirrorSpec) -> Result<MirrorStats, SyncError> {
        spec.require_source()?;
        spec.ensure_parent()?;
        let target = spec.target()?;
        let mut stats = MirrorStats::default();
        mirror_dir(&spec.source, &target, &mut stats)?;
        tracing::info!(
            source = %spec.source.display(),
            target = %target.display(),
            copied = stats.copied,
            unchanged = stats.unchanged,
            removed = stats.removed,
            "mirror complete"
        );
        Ok(stats)
    }
}

impl Mirror for NativeMirror {
    fn mirror(&self, spec: &MirrorSpec) -> Result<(), SyncError> {
        self.run(spec).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Dir,
    File,
    Symlink,
}

fn kind_of(path: &Path) -> io::Result<Option<Kind>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            let ft = meta.file_type();
            Ok(Some(if ft.is_symlink() {
                Kind::Symlink
            } else if ft.is_dir() {
                Kind::Dir
            } else {
                Kind::File
            }))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn list_dir(dir: &Path) -> Result<BTreeMap<std::ffi::OsString, Kind>, SyncError> {
    let mut entries = BTreeMap::new();
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if let Some(kind) = kind_of(&path).map_err(|e| io_err(&path, e))? {
            entries.insert(entry.file_name(), kind);
        }
    }
    Ok(entries)
}

fn remove_entry(path: &Path, kind: Kind) -> Result<(), SyncError> {
    let result = match kind {
        Kind::Dir => fs::remove_dir_all(path),
        Kind::File | Kind::Symlink => fs::remove_file(path),
    };
    result.map_err(|e| io_err(path, e))
}

fn mirror_dir(src: &Path, dst: &Path, stats: &mut MirrorStats) -> Result<(), SyncError> {
    match kind_of(dst).map_err(|e| io_err(dst, e))? {
        Some(Kind::Dir) => {}
        Some(other) => {
            remove_entry(dst, other)?;
            fs::create_dir(dst).map_err(|e| io_err(dst, e))?;
        }
        None => fs::create_dir(dst).map_err(|e| io_err(dst, e))?,
    }

    let wanted = list_dir(src)?;
    for (name, kind) in list_dir(dst)? {
        if !wanted.contains_key(&name) {
            let path = dst.join(&name);
            tracing::debug!(path = %path.display(), "removing extraneous entry");
            remove_entry(&path, kind)?;
            stats.removed += 1;
        }
    }

    for (name, kind) in wanted {
        let from = src.join(&name);
        let to = dst.join(&name);
        match kind {
            Kind::Dir => mirror_dir(&from, &to, stats)?,
            Kind::File => mirror_file(&from, &to, stats)?,
            Kind::Symlink => mirror_symlink(&from, &to, stats)?,
        }
    }

    copy_permissions(src, dst)
}

fn digest(path: &Path) -> Result<String, SyncError> {
    let mut file = fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

fn same_content(a: &Path, b: &Path) -> Result<bool, SyncError> {
    let len_a = fs::metadata(a).map_err(|e| io_err(a, e))?.len();
    let len_b = fs::metadata(b).map_err(|e| io_err(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }
    Ok(digest(a)? == digest(b)?)
}

fn mirror_file(src: &Path, dst: &Path, stats: &mut MirrorStats) -> Result<(), SyncError> {
    match kind_of(dst).map_err(|e| io_err(dst, e))? {
        Some(Kind::File) if same_content(src, dst)? => {
            stats.unchanged += 1;
            return copy_permissions(src, dst);
        }
        Some(Kind::File) | None => {}
        Some(other) => remove_entry(dst, other)?,
    }

    let tmp = tmp_sibling(dst);
    if let Err(e) = fs::copy(src, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(src, e));
    }
    if let Err(e) = fs::rename(&tmp, dst) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(dst, e));
    }
    stats.copied += 1;
    tracing::debug!(path = %dst.display(), "copied");
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.contentsync.tmp"))
}

#[cfg(unix)]
fn mirror_symlink(src: &Path, dst: &Path, stats: &mut MirrorStats) -> Result<(), SyncError> {
    let link = fs::read_link(src).map_err(|e| io_err(src, e))?;
    match kind_of(dst).map_err(|e| io_err(dst, e))? {
        Some(Kind::Symlink) if fs::read_link(dst).ok().as_deref() == Some(link.as_path()) => {
            stats.unchanged += 1;
            return Ok(());
        }
        Some(other) => remove_entry(dst, other)?,
        None => {}
    }
    std::os::unix::fs::symlink(&link, dst).map_err(|e| io_err(dst, e))?;
    stats.copied += 1;
    Ok(())
}

#[cfg(not(unix))]
fn mirror_symlink(src: &Path, dst: &Path, stats: &mut MirrorStats) -> Result<(), SyncError> {
    let _ = (src, dst, stats);
    tracing::warn!(path = %src.display(), "symlinks are not mirrored on this platform");
    Ok(())
}

fn copy_permissions(src: &Path, dst: &Path) -> Result<(), SyncError> {
    let wanted = fs::metadata(src).map_err(|e| io_err(src, e))?.permissions();
    let current = fs::metadata(dst).map_err(|e| io_err(dst, e))?.permissions();
    if wanted != current {
        fs::set_permissions(dst, wanted).map_err(|e| io_err(dst, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
