//! Request body extractor with the API's size and parse rules.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// A JSON request body read under the router's body limit.
///
/// An empty body reads as `{}`. A body over the limit is rejected with
/// [`ApiError::PayloadTooLarge`] before any parsing; a body that is not
/// JSON is rejected with [`ApiError::InvalidJson`].
#[derive(Debug, Clone)]
pub struct JsonPayload(pub Value);

impl<S> FromRequest<S> for JsonPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge
            } else {
                ApiError::Body(rejection.body_text())
            }
        })?;

        if bytes.is_empty() {
            return Ok(Self(Value::Object(Map::new())));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|_parse| ApiError::InvalidJson)
    }
}
