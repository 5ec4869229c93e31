//! HTTP client for the ingest API.
//!
//! Thin wrapper over `reqwest` that knows the endpoint paths and response
//! shapes. Any non-2xx status is returned as [`ClientError::Status`].

use std::time::Duration;

use eventline_types::{BatchId, BatchPayload, EventsSnapshot, InstantPayload, InstantRecord};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// Server acknowledgement of a stored batch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAck {
    /// Id shared by every record of the batch.
    pub batch_id: BatchId,
    /// Number of records stored.
    pub stored: usize,
}

#[derive(Debug, Deserialize)]
struct InstantAck {
    event: InstantRecord,
}

/// Client for the ingest server's `/api` endpoints.
#[derive(Debug, Clone)]
pub struct EventsClient {
    client: reqwest::Client,
    base_url: String,
}

impl EventsClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }

    /// `POST /api/instant-events`, returning the stored record.
    pub async fn post_instant(&self, payload: &InstantPayload) -> Result<InstantRecord, ClientError> {
        let response = self
            .client
            .post(self.url("/instant-events"))
            .json(payload)
            .send()
            .await?;
        let ack: InstantAck = read_json(response).await?;
        Ok(ack.event)
    }

    /// `POST /api/batch-events`.
    pub async fn post_batch(&self, payload: &BatchPayload) -> Result<BatchAck, ClientError> {
        let response = self
            .client
            .post(self.url("/batch-events"))
            .json(payload)
            .send()
            .await?;
        read_json(response).await
    }

    /// `GET /api/events`.
    pub async fn fetch_events(&self) -> Result<EventsSnapshot, ClientError> {
        let response = self.client.get(self.url("/events")).send().await?;
        read_json(response).await
    }

    /// `DELETE /api/events`.
    pub async fn clear(&self) -> Result<(), ClientError> {
        let response = self.client.delete(self.url("/events")).send().await?;
        check_status(response).await.map(drop)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_unreadable| "unable to read error body".to_owned());
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let bytes = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
