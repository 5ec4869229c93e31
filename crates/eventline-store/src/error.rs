//! Error types for the append logs.
//!
//! All errors are propagated via [`StoreError`], which records which file
//! and which step of the operation failed.

use std::path::PathBuf;

use eventline_types::Channel;

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("{context} at {}: {source}", .path.display())]
    Io {
        /// What the log was doing when the error occurred.
        context: &'static str,
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized to a log line.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The writer task for a channel is no longer running.
    #[error("{0} log writer has shut down")]
    WriterClosed(Channel),
}

impl StoreError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
