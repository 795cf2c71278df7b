//! Client configuration.
//!
//! Supports YAML files and `GAPIC__*` environment overrides. The resulting
//! [`ClientConfig`] is immutable and handed to [`Client`](crate::Client) at
//! construction; nothing here is process-global.

use std::time::Duration;

use serde::Deserialize;
use tonic::Code;

use crate::error::{Error, Result};
use crate::retry::{parse_code, Backoff, RetryPolicy};

/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "GAPIC_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "GAPIC";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "GAPIC_LOG";
/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "gapic";

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service endpoint: `http(s)://host:port`, `unix:///path` or a socket path.
    pub endpoint: String,
    /// Listing page-size hint used when the caller passes zero or less.
    pub page_size: i32,
    /// Skip the per-method default deadlines.
    pub disable_deadlines: bool,
    pub timeouts: TimeoutConfig,
    pub retry: RetryConfig,
    pub polling: PollingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50051".to_string(),
            page_size: 100,
            disable_deadlines: false,
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

/// Default deadlines applied when the caller sets none.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Plain unary calls.
    pub call_secs: u64,
    /// Calls that start a long-running operation.
    pub submit_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_secs: 3600,
            submit_secs: 60,
        }
    }
}

/// Backoff parameters and retryable codes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    /// Canonical gRPC code names, e.g. `UNAVAILABLE`.
    pub codes: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            max_ms: 10000,
            multiplier: 1.3,
            codes: vec!["UNAVAILABLE".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between polls while waiting on an operation.
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl ClientConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `gapic.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, `__` separated
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config: ClientConfig = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document; unspecified fields keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ClientConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would produce a nonsensical runtime policy.
    pub fn validate(&self) -> Result<()> {
        if self.retry.initial_ms == 0 {
            return Err(Error::Config("retry.initial_ms must be positive".into()));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(Error::Config(format!(
                "retry.multiplier must be at least 1.0, got {}",
                self.retry.multiplier
            )));
        }
        if self.polling.interval_secs == 0 {
            return Err(Error::Config("polling.interval_secs must be positive".into()));
        }
        self.retry_codes().map(|_| ())
    }

    fn retry_codes(&self) -> Result<Vec<Code>> {
        self.retry
            .codes
            .iter()
            .map(|name| {
                parse_code(name)
                    .ok_or_else(|| Error::Config(format!("unknown status code in retry.codes: {name}")))
            })
            .collect()
    }

    /// The retry policy described by the `retry` section.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let backoff = Backoff::new(
            Duration::from_millis(self.retry.initial_ms),
            Duration::from_millis(self.retry.max_ms),
            self.retry.multiplier,
        );
        Ok(RetryPolicy::on_codes(&self.retry_codes()?, backoff))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    /// Default deadline for plain calls, unless deadlines are disabled.
    pub fn call_timeout(&self) -> Option<Duration> {
        (!self.disable_deadlines).then(|| Duration::from_secs(self.timeouts.call_secs))
    }

    /// Default deadline for operation-starting calls, unless deadlines are
    /// disabled.
    pub fn submit_timeout(&self) -> Option<Duration> {
        (!self.disable_deadlines).then(|| Duration::from_secs(self.timeouts.submit_secs))
    }
}
