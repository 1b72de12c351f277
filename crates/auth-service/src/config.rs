//! Configuration for the auth service.

use crate::code::CodeGenerator;
use anyhow::{ensure, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Postgres configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Code cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Token and code settings
    pub auth: AuthConfig,

    /// Stale registration reaper
    #[serde(default)]
    pub reaper: ReaperConfig,

    /// Code request throttling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request deadline
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL. Users and sessions are kept in memory when unset.
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    /// Redis URL. Codes are kept in memory when unset.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: SecretString,

    #[serde(default = "default_access_ttl", with = "humantime_serde")]
    pub access_ttl: Duration,

    #[serde(default = "default_refresh_ttl", with = "humantime_serde")]
    pub refresh_ttl: Duration,

    /// Lifetime of a pending one-time code
    #[serde(default = "default_code_ttl", with = "humantime_serde")]
    pub code_ttl: Duration,

    /// Digits per one-time code
    #[serde(default = "default_code_length")]
    pub code_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    #[serde(default = "default_reaper_period", with = "humantime_serde")]
    pub period: Duration,

    /// Age after which an unconfirmed registration is deleted
    #[serde(default = "default_retention", with = "humantime_serde")]
    pub retention: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Register/login requests per phonenumber per minute
    #[serde(default = "default_codes_per_minute")]
    pub codes_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Append logs to this file instead of stdout
    pub file: Option<PathBuf>,
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Human-readable text
    Pretty,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            period: default_reaper_period(),
            retention: default_retention(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            codes_per_minute: default_codes_per_minute(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_access_ttl() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_refresh_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_code_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_code_length() -> usize {
    4
}

fn default_reaper_period() -> Duration {
    Duration::from_secs(60)
}

fn default_retention() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_codes_per_minute() -> u32 {
    crate::api::DEFAULT_CODES_PER_MINUTE
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let builder = config::Config::builder().add_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(false),
        );

        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.auth.jwt_secret.expose_secret().is_empty(),
            "auth.jwt_secret must not be empty"
        );
        ensure!(!self.auth.access_ttl.is_zero(), "auth.access_ttl must be positive");
        ensure!(!self.auth.refresh_ttl.is_zero(), "auth.refresh_ttl must be positive");
        ensure!(!self.auth.code_ttl.is_zero(), "auth.code_ttl must be positive");
        ensure!(!self.reaper.period.is_zero(), "reaper.period must be positive");
        ensure!(
            self.rate_limit.codes_per_minute > 0,
            "rate_limit.codes_per_minute must be positive"
        );
        self.code_generator()?;
        Ok(())
    }

    pub fn code_generator(&self) -> Result<CodeGenerator> {
        Ok(CodeGenerator::new(self.auth.code_length)?)
    }
}
