//! Configuration loading for the ingest server.
//!
//! Settings come from an optional YAML file (path in `EVENTLINE_CONFIG`,
//! default `eventline.yaml`), then environment variables override
//! individual fields:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `HOST` | `host` | `0.0.0.0` |
//! | `PORT` | `port` | `3000` |
//! | `APP_TZ` | `timezone` | `Europe/Kyiv` |
//! | `DATA_DIR` | `data_dir` | `data` |
//! | `PUBLIC_DIR` | `public_dir` | `public` |
//! | `MAX_BODY_BYTES` | `max_body_bytes` | `2097152` |
//! | `MAX_BATCH_EVENTS` | `max_batch_events` | `5000` |

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::ingest::IngestLimits;

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_VAR: &str = "EVENTLINE_CONFIG";

/// Config file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "eventline.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// IANA zone used for `serverTimeLocal`.
    pub timezone: String,
    /// Directory holding the two channel logs.
    pub data_dir: PathBuf,
    /// Directory served for non-API paths.
    pub public_dir: PathBuf,
    /// Request bodies above this many bytes are rejected with 413.
    pub max_body_bytes: usize,
    /// Batches with more items than this are rejected with 400.
    pub max_batch_events: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = IngestLimits::default();
        Self {
            host: String::from("0.0.0.0"),
            port: 3000,
            timezone: String::from("Europe/Kyiv"),
            data_dir: PathBuf::from("data"),
            public_dir: PathBuf::from("public"),
            max_body_bytes: limits.max_body_bytes,
            max_batch_events: limits.max_batch_events,
        }
    }
}

impl ServerConfig {
    /// Load configuration the way the server binary does.
    ///
    /// Reads the YAML file named by `EVENTLINE_CONFIG` (or
    /// `eventline.yaml`), falling back to defaults when the file does not
    /// exist, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed, or if an override is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_unset| DEFAULT_CONFIG_PATH.to_owned());
        let path = Path::new(&path);
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string. Missing fields keep defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a numeric variable does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a numeric variable does not parse.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            self.port = port;
        }
        if let Some(timezone) = lookup("APP_TZ") {
            self.timezone = timezone;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("PUBLIC_DIR") {
            self.public_dir = PathBuf::from(dir);
        }
        if let Some(bytes) = parse_var(&lookup, "MAX_BODY_BYTES")? {
            self.max_body_bytes = bytes;
        }
        if let Some(events) = parse_var(&lookup, "MAX_BATCH_EVENTS")? {
            self.max_batch_events = events;
        }
        Ok(())
    }

    /// Request limits derived from this configuration.
    pub const fn limits(&self) -> IngestLimits {
        IngestLimits {
            max_body_bytes: self.max_body_bytes,
            max_batch_events: self.max_batch_events,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_invalid| ConfigError::InvalidEnv { var, value })
        })
        .transpose()
}
