//! Error types for contentsync-forge.

use thiserror::Error;

use contentsync_core::ExecError;

/// All errors that can arise from talking to the hosting platform.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The API answered with a non-success status.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Http {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    /// The request never got an HTTP answer (DNS, TLS or timeout).
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },

    /// The response body was not the JSON shape we expect.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// A `gh` invocation failed.
    #[error("gh CLI error: {0}")]
    Exec(#[from] ExecError),
}
