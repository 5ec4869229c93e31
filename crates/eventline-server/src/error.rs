//! Error types for the ingest API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body has the shape `{"error": <reason>, "status": <code>}`.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use eventline_store::StoreError;
use tracing::error;

use crate::ingest::IngestError;

/// Methods advertised for unknown paths under `/api`.
pub const API_ALLOW: &str = "GET, POST, DELETE";

/// Errors that can occur in the ingest API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The payload failed validation and nothing was written.
    #[error(transparent)]
    Validation(#[from] IngestError),

    /// The request body was not valid JSON.
    #[error("Invalid JSON payload")]
    InvalidJson,

    /// The request body exceeded the configured size limit.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// The request body could not be read.
    #[error("failed to read request body: {0}")]
    Body(String),

    /// A durable write or truncation failed; in-memory state is unchanged.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// No route under `/api` matches the request.
    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::InvalidJson => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            Self::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, self.to_string()),
            Self::Body(_) | Self::Storage(_) => {
                error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("Internal server error"),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        if matches!(self, Self::MethodNotAllowed) {
            return (status, [(header::ALLOW, API_ALLOW)], axum::Json(body)).into_response();
        }
        (status, axum::Json(body)).into_response()
    }
}
