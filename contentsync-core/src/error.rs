//! Error types for contentsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling a [`crate::SyncRequest`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was absent or empty in every source.
    #[error("missing required setting {key}")]
    Missing { key: &'static str },

    /// A setting was present but could not be interpreted.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    /// The config file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`crate::Settings`].
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from running an external command.
///
/// A non-zero exit is only an error when the caller asked for a checked run;
/// [`crate::exec::CommandRunner::execute`] reports it as data.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program could not be started at all.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("`{command}` failed with exit code {}:\n{stderr}", display_code(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The command exited with a code outside its documented contract.
    #[error("`{command}` exited with unexpected code {}:\n{stderr}", display_code(.exit_code))]
    UnexpectedExit {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "<signal>".to_string(), |c| c.to_string())
}
