//! Capture configuration.
//!
//! One JSON file holds the ingestion endpoint, delivery tuning, retention and
//! the fixture being recorded. `GRASSROOTS_*` environment variables override
//! the delivery settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Fixture, RetentionPolicy};
use crate::util::{is_http_url, normalize_text_option};

pub const CONFIG_FILE_NAME: &str = "config.json";

const CONFIG_VERSION: u32 = 1;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BATCH_SIZE: usize = 50;

pub const ENDPOINT_ENV: &str = "GRASSROOTS_ENDPOINT";
pub const POLL_INTERVAL_ENV: &str = "GRASSROOTS_POLL_INTERVAL_SECS";
pub const REQUEST_TIMEOUT_ENV: &str = "GRASSROOTS_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    /// Ingestion endpoint. Without one, events stay in the outbox.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub fixture: Fixture,
}

const fn default_config_version() -> u32 {
    CONFIG_VERSION
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            endpoint: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            retention: RetentionPolicy::default(),
            fixture: Fixture::default(),
        }
    }
}

impl CaptureConfig {
    /// Load and validate the config at `path`. A missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Apply `GRASSROOTS_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = normalize_text_option(lookup(ENDPOINT_ENV)) {
            self.endpoint = Some(endpoint);
        }
        if let Some(raw) = normalize_text_option(lookup(POLL_INTERVAL_ENV)) {
            self.poll_interval_secs = parse_secs(POLL_INTERVAL_ENV, &raw)?;
        }
        if let Some(raw) = normalize_text_option(lookup(REQUEST_TIMEOUT_ENV)) {
            self.request_timeout_secs = parse_secs(REQUEST_TIMEOUT_ENV, &raw)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(Error::Config(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        if let Some(endpoint) = self.endpoint.as_deref() {
            if !is_http_url(endpoint) {
                return Err(Error::Config(
                    "endpoint must include http:// or https://".to_string(),
                ));
            }
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        self.fixture.validate()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn normalize(&mut self) {
        self.endpoint = normalize_text_option(self.endpoint.take())
            .map(|endpoint| endpoint.trim_end_matches('/').to_string());
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|error| Error::Config(format!("{key} must be a whole number of seconds: {error}")))
}
