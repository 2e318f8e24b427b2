//! Error types for contentsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use contentsync_core::ExecError;
use contentsync_forge::ForgeError;

use crate::pipeline::SyncState;

/// All errors that can abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An external command failed or could not be started.
    #[error("command error: {0}")]
    Exec(#[from] ExecError),

    /// The hosting platform rejected or failed a request.
    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The mirror source does not exist or is not a directory.
    #[error("mirror source {path} is not a directory")]
    MirrorSourceMissing { path: PathBuf },

    /// The mirror destination cannot be derived from the configured paths.
    #[error("invalid mirror destination {path}: {reason}")]
    InvalidMirrorTarget { path: PathBuf, reason: &'static str },

    /// The per-run directory was already present.
    #[error("run directory {path} already exists")]
    RunDirectoryExists { path: PathBuf },

    /// The run state machine was driven out of order.
    #[error("invalid sync transition {from:?} -> {to:?}")]
    InvalidTransition { from: SyncState, to: SyncState },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
