//! Configuration loading
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `FXQUOTE_*` environment variables. Command-line flags are applied last by
//! the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::default_database_path;
use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::quote::BucketGranularity;

/// Full application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub client: ClientConfig,
    pub mock: MockConfig,
    pub logging: LoggingConfig,
}

/// Where quotes come from
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>`; may be empty
    pub token: String,
    /// Budget for one upstream fetch
    pub request_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8181/mock".into(),
            token: String::new(),
            request_timeout_ms: 200,
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Inbound HTTP listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// End-to-end bound for one inbound request
    pub deadline_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            deadline_ms: 1000,
        }
    }
}

impl ServerConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Quote cache store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Database file; the platform data directory when unset
    pub database: Option<PathBuf>,
    pub bucket: BucketGranularity,
    pub lookup_timeout_ms: u64,
    pub persist_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database: None,
            bucket: BucketGranularity::Day,
            lookup_timeout_ms: 50,
            persist_timeout_ms: 10,
        }
    }
}

impl CacheConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(default_database_path)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}

/// The bounded `fetch` client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub timeout_ms: u64,
    /// File the client appends `<timestamp>\t<bidPrice>` lines to
    pub output: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/quote".into(),
            timeout_ms: 300,
            output: PathBuf::from("quotes.txt"),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The mock upstream
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub port: u16,
    pub delay_ms: u64,
    pub bid_price: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            port: 8181,
            delay_ms: 500,
            bid_price: "5.2097".into(),
        }
    }
}

impl MockConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Loads configuration from `path`, then applies environment overrides
    ///
    /// A missing file is only an error when it was named explicitly; without
    /// `path`, `fxquote.toml` in the working directory is used if present.
    /// The result is not validated; callers apply command-line flags first
    /// and then call [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new("fxquote.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Parses a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::from_toml(&content)
    }

    /// Overrides fields from `FXQUOTE_*` variables looked up through `var`
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("FXQUOTE_UPSTREAM_URL") {
            self.upstream.url = url;
        }
        if let Some(token) = var("FXQUOTE_UPSTREAM_TOKEN") {
            self.upstream.token = token;
        }
        if let Some(ms) = var("FXQUOTE_REQUEST_TIMEOUT_MS") {
            self.upstream.request_timeout_ms = parse_number("FXQUOTE_REQUEST_TIMEOUT_MS", &ms)?;
        }
        if let Some(port) = var("FXQUOTE_PORT") {
            self.server.port = parse_number("FXQUOTE_PORT", &port)?;
        }
        if let Some(ms) = var("FXQUOTE_DEADLINE_MS") {
            self.server.deadline_ms = parse_number("FXQUOTE_DEADLINE_MS", &ms)?;
        }
        if let Some(path) = var("FXQUOTE_DATABASE") {
            self.cache.database = Some(PathBuf::from(path));
        }
        if let Some(bucket) = var("FXQUOTE_BUCKET") {
            self.cache.bucket =
                BucketGranularity::from_str(&bucket).map_err(|e| ConfigError::InvalidValue {
                    field: "FXQUOTE_BUCKET",
                    reason: e.to_string(),
                })?;
        }
        if let Some(ms) = var("FXQUOTE_LOOKUP_TIMEOUT_MS") {
            self.cache.lookup_timeout_ms = parse_number("FXQUOTE_LOOKUP_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = var("FXQUOTE_PERSIST_TIMEOUT_MS") {
            self.cache.persist_timeout_ms = parse_number("FXQUOTE_PERSIST_TIMEOUT_MS", &ms)?;
        }
        if let Some(level) = var("FXQUOTE_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Checks values that would make the server misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.url.is_empty() {
            return Err(invalid("upstream.url", "cannot be empty"));
        }
        if self.client.url.is_empty() {
            return Err(invalid("client.url", "cannot be empty"));
        }

        let timeouts = [
            ("upstream.request_timeout_ms", self.upstream.request_timeout_ms),
            ("server.deadline_ms", self.server.deadline_ms),
            ("cache.lookup_timeout_ms", self.cache.lookup_timeout_ms),
            ("cache.persist_timeout_ms", self.cache.persist_timeout_ms),
            ("client.timeout_ms", self.client.timeout_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("'{}' is not a number", raw),
    })
}
