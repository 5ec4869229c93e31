//! Configuration for the recording client.
//!
//! All configuration is loaded from environment variables. The client needs
//! to know where the ingest server lives, where to keep its local state, and
//! how long a single request may take.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;

/// Default ingest server base URL.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Default directory for the local journal and counters.
pub const DEFAULT_STATE_DIR: &str = ".eventline";

/// Default per-request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the ingest server, without the `/api` prefix.
    pub server_url: String,
    /// Directory holding the local state files.
    pub state_dir: PathBuf,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional variables:
    /// - `EVENTLINE_SERVER_URL` -- ingest server base URL (default `http://127.0.0.1:3000`)
    /// - `EVENTLINE_STATE_DIR` -- local state directory (default `.eventline`)
    /// - `EVENTLINE_REQUEST_TIMEOUT_MS` -- request timeout in milliseconds (default 10000)
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let mut config = Self::default();

        if let Some(url) = lookup("EVENTLINE_SERVER_URL") {
            config.server_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(dir) = lookup("EVENTLINE_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("EVENTLINE_REQUEST_TIMEOUT_MS") {
            let ms: u64 = raw.parse().map_err(|e| {
                ClientError::Config(format!("invalid EVENTLINE_REQUEST_TIMEOUT_MS: {e}"))
            })?;
            config.request_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn variables_override_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("EVENTLINE_SERVER_URL", "http://events.local:8080/"),
            ("EVENTLINE_STATE_DIR", "/tmp/eventline"),
            ("EVENTLINE_REQUEST_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.server_url, "http://events.local:8080");
        assert_eq!(config.state_dir, PathBuf::from("/tmp/eventline"));
        assert_eq!(config.request_timeout, Duration::from_millis(250));
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = ClientConfig::from_lookup(lookup(&[("EVENTLINE_REQUEST_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
