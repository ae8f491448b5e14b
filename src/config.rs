//! Configuration types for asset-scraper

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Default asset delivery endpoint (id + version lookups)
pub const DEFAULT_ASSET_DELIVERY_URL: &str = "https://assetdelivery.roblox.com/v1/asset/";

/// Default content store endpoint (hash lookups)
pub const DEFAULT_CONTENT_STORE_URL: &str = "https://contentstore.roblox.com/v1/content";

/// What a run persists for each successful item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Write one file per asset (default)
    #[default]
    FilesOnly,
    /// Only write `index.txt`
    IndexOnly,
    /// Write files and `index.txt`
    FilesAndIndex,
}

impl OutputMode {
    /// Whether asset content is written to disk
    pub fn writes_files(&self) -> bool {
        matches!(self, OutputMode::FilesOnly | OutputMode::FilesAndIndex)
    }

    /// Whether index lines are collected
    pub fn writes_index(&self) -> bool {
        matches!(self, OutputMode::IndexOnly | OutputMode::FilesAndIndex)
    }
}

impl FromStr for OutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "filesonly" => Ok(OutputMode::FilesOnly),
            "indexonly" => Ok(OutputMode::IndexOnly),
            "filesandindex" => Ok(OutputMode::FilesAndIndex),
            _ => Err(Error::config(
                format!("unknown output type '{s}' (expected FilesOnly, IndexOnly or FilesAndIndex)"),
                "mode",
            )),
        }
    }
}

/// Compression applied to written asset files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Store content as received (default)
    #[default]
    None,
    /// gzip, `.gz` suffix
    GZip,
    /// bzip2, `.bz2` suffix
    BZip2,
}

impl Compression {
    /// File suffix appended after the configured extension
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::GZip => Some("gz"),
            Compression::BZip2 => Some("bz2"),
        }
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::GZip),
            "bzip2" | "bz2" => Ok(Compression::BZip2),
            _ => Err(Error::config(
                format!("unknown compression '{s}' (expected None, GZip or BZip2)"),
                "compression",
            )),
        }
    }
}

/// Output settings (destination, naming, compression)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory (None = derived from the input by the scrape strategy)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Extension appended to every written asset file, without the leading dot
    #[serde(default)]
    pub extension: Option<String>,

    /// What to persist
    #[serde(default)]
    pub mode: OutputMode,

    /// Compression applied to asset files
    #[serde(default)]
    pub compression: Compression,
}

/// Remote endpoints used by the resolver
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Asset delivery endpoint, queried with `id` and `version`
    #[serde(default = "default_asset_delivery_url")]
    pub asset_delivery_url: String,

    /// Content store endpoint, queried with `hash`
    #[serde(default = "default_content_store_url")]
    pub content_store_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            asset_delivery_url: default_asset_delivery_url(),
            content_store_url: default_content_store_url(),
        }
    }
}

/// HTTP behaviour (concurrency, timeouts, credentials)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Maximum resolutions in flight at once (default: 1)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Overall timeout for each HTTP request (default: 180 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Session token sent as a cookie, needed for locked assets owned by the account
    #[serde(default)]
    pub auth_token: Option<String>,

    /// User agent for all requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Remote endpoints
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            request_timeout: default_request_timeout(),
            auth_token: None,
            user_agent: default_user_agent(),
            endpoints: EndpointConfig::default(),
        }
    }
}

/// Retry behaviour for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 0, i.e. one attempt total)
    #[serde(default)]
    pub max_retries: u32,

    /// Delay before the first retry (default: none)
    #[serde(default, with = "millis_serde")]
    pub initial_delay: Duration,

    /// Upper bound on any single retry delay (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for a scrape run
///
/// Built once and passed by value into the [`Scraper`](crate::scraper::Scraper);
/// it is never mutated while a run is in progress.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output settings
    #[serde(flatten)]
    pub output: OutputConfig,

    /// HTTP settings
    #[serde(flatten)]
    pub network: NetworkConfig,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.network.max_concurrent_requests == 0 {
            return Err(Error::config(
                "max_concurrent_requests must be at least 1",
                "max_concurrent_requests",
            ));
        }

        if let Some(ext) = &self.output.extension {
            if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
                return Err(Error::config(
                    format!("extension '{ext}' must be a bare suffix like 'rbxm'"),
                    "extension",
                ));
            }
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff_multiplier must be at least 1.0",
                "retry.backoff_multiplier",
            ));
        }

        for (key, value) in [
            (
                "endpoints.asset_delivery_url",
                &self.network.endpoints.asset_delivery_url,
            ),
            (
                "endpoints.content_store_url",
                &self.network.endpoints.content_store_url,
            ),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(format!("invalid URL '{value}': {e}"), key))?;
        }

        Ok(())
    }

    /// Load a configuration from a JSON document, applying defaults for missing keys
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_asset_delivery_url() -> String {
    DEFAULT_ASSET_DELIVERY_URL.to_string()
}

fn default_content_store_url() -> String {
    DEFAULT_CONTENT_STORE_URL.to_string()
}

fn default_max_concurrent() -> usize {
    1
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Retry delays are short, so they are stored in milliseconds
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
