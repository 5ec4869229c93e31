//! Error types for the recording client.
//!
//! Every client primitive returns these as typed results. Whether a failure
//! is fatal or merely logged is decided by the caller: the [`Session`]
//! facade logs local persistence and delivery failures and keeps going.
//!
//! [`Session`]: crate::session::Session

use std::path::PathBuf;

use eventline_types::Channel;

/// Errors that can occur in the recording client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A local state file could not be read or written.
    #[error("{context} {}: {source}", path.display())]
    Storage {
        /// What the client was doing.
        context: &'static str,
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Local storage rejected a write (quota or unavailable).
    #[error("local storage unavailable for key {0}")]
    StorageUnavailable(String),

    /// Local state or a server response could not be (de)serialized.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The request never produced a response (connect, timeout, body).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The event message was empty or whitespace.
    #[error("message is required")]
    EmptyMessage,

    /// The delivery worker for a channel is gone.
    #[error("{0} delivery queue is closed")]
    QueueClosed(Channel),
}

/// Build a [`ClientError::Storage`] for a failed file operation.
pub(crate) fn storage(
    context: &'static str,
    path: impl Into<PathBuf>,
    source: std::io::Error,
) -> ClientError {
    ClientError::Storage {
        context,
        path: path.into(),
        source,
    }
}
