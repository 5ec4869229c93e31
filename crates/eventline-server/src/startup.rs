//! Background startup helper for embedding the ingest server.
//!
//! Provides [`spawn_server`], which launches the server on a background
//! Tokio task over an already-bound listener. Binding first lets callers
//! (tests, embedding binaries) use an ephemeral port and learn the real
//! address before any request is sent.
//!
//! # Usage
//!
//! ```rust,ignore
//! use eventline_server::startup::spawn_server;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! let addr = listener.local_addr()?;
//! let handle = spawn_server(listener, state);
//! // Requests to `http://{addr}/api/...` are now served.
//! ```

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::state::AppState;

/// Spawn the ingest server on a background Tokio task.
///
/// The server runs until the runtime shuts down or the returned handle is
/// aborted. Serve errors are logged, not returned.
pub fn spawn_server(listener: TcpListener, state: Arc<AppState>) -> JoinHandle<()> {
    let addr = listener.local_addr().ok();
    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::serve(listener, state).await {
            tracing::error!(error = %e, "Ingest server exited with error");
        }
    });

    tracing::info!(?addr, "Ingest server spawned on background task");

    handle
}
