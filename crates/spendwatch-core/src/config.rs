//! `SpendWatch` configuration module.
//!
//! Configuration file support via `spendwatch.toml`, environment
//! variables, and programmatic overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`SPENDWATCH_*`)
//! 2. Configuration file (`spendwatch.toml`)
//! 3. Default values
//!
//! The database credentials have no usable defaults: [`SpendwatchConfig::validate`]
//! rejects any configuration that does not name a host, database, user and
//! password, and the server refuses to start on an invalid configuration.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Vertica endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database host. Required.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name. Required.
    pub database: String,
    /// Login user. Required.
    pub user: String,
    /// Login password. Required.
    pub password: String,
    /// TCP connect + handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5433,
            database: String::new(),
            user: String::new(),
            password: String::new(),
            connect_timeout_ms: 10_000,
        }
    }
}

impl DatabaseConfig {
    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Connection pool sizing and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Target minimum number of live connections. Maintained by the
    /// eviction sweep, not a hard floor at all times.
    pub min: usize,
    /// Hard maximum number of live connections.
    pub max: usize,
    /// How long an `acquire` waits for a free connection before failing.
    pub acquire_timeout_ms: u64,
    /// Idle connections older than this are destroyed.
    pub idle_timeout_ms: u64,
    /// Idle connections older than this are probe-validated before reuse.
    pub soft_idle_timeout_ms: u64,
    /// Interval of the background eviction sweep.
    pub eviction_interval_ms: u64,
    /// Hard ceiling on a single query round-trip.
    pub query_timeout_ms: u64,
    /// Timeout of the `SELECT 1` validation probe.
    pub validation_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min: 1,
            max: 10,
            acquire_timeout_ms: 10_000,
            idle_timeout_ms: 300_000,
            soft_idle_timeout_ms: 120_000,
            eviction_interval_ms: 60_000,
            query_timeout_ms: 120_000,
            validation_timeout_ms: 10_000,
        }
    }
}

impl PoolSettings {
    /// Acquire timeout as a [`Duration`].
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Idle timeout as a [`Duration`].
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Soft idle threshold as a [`Duration`].
    #[must_use]
    pub const fn soft_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.soft_idle_timeout_ms)
    }

    /// Eviction interval as a [`Duration`].
    #[must_use]
    pub const fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    /// Query timeout as a [`Duration`].
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Validation probe timeout as a [`Duration`].
    #[must_use]
    pub const fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }
}

/// Response cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL applied when a route does not specify one, in seconds.
    pub default_ttl_secs: u64,
    /// Maximum number of cached keys.
    pub max_keys: usize,
    /// Interval of the background expiry sweep, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            max_keys: 100,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheSettings {
    /// Default TTL as a [`Duration`].
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Sweep interval as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable permissive CORS (the dashboard front-end is served separately).
    pub cors_enabled: bool,
    /// Development mode: error responses include diagnostic detail.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4400,
            cors_enabled: true,
            dev_mode: false,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main `SpendWatch` configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SpendwatchConfig {
    /// Vertica endpoint and credentials.
    pub database: DatabaseConfig,
    /// Connection pool settings.
    pub pool: PoolSettings,
    /// Response cache settings.
    pub cache: CacheSettings,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl SpendwatchConfig {
    /// Loads configuration from default sources (`spendwatch.toml` + env).
    pub fn load() -> Result<Self> {
        Self::load_from_path("spendwatch.toml")
    }

    /// Loads configuration from a specific file path, layered under
    /// `SPENDWATCH_*` environment variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SPENDWATCH_").split("_").lowercase(false));

        figment
            .extract()
            .map_err(|e| Error::ConfigInvalid(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| Error::ConfigInvalid(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// The process must not serve traffic with a half-configured pool:
    /// every required credential must be present and every numeric must be
    /// in range, or this returns `ConfigInvalid`.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("database.host", &self.database.host),
            ("database.database", &self.database.database),
            ("database.user", &self.database.user),
            ("database.password", &self.database.password),
        ] {
            if value.trim().is_empty() {
                return Err(Error::ConfigInvalid(format!("'{key}' is required")));
            }
        }

        if self.database.port == 0 {
            return Err(Error::ConfigInvalid(
                "'database.port' must be non-zero".to_string(),
            ));
        }

        if self.pool.max == 0 {
            return Err(Error::ConfigInvalid(
                "'pool.max' must be at least 1".to_string(),
            ));
        }

        if self.pool.min > self.pool.max {
            return Err(Error::ConfigInvalid(format!(
                "'pool.min' ({}) must not exceed 'pool.max' ({})",
                self.pool.min, self.pool.max
            )));
        }

        if self.pool.acquire_timeout_ms == 0 || self.pool.query_timeout_ms == 0 {
            return Err(Error::ConfigInvalid(
                "pool timeouts must be non-zero".to_string(),
            ));
        }

        if self.cache.max_keys == 0 {
            return Err(Error::ConfigInvalid(
                "'cache.max_keys' must be at least 1".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(Error::ConfigInvalid(format!(
                "'logging.level' value '{}' is invalid, expected one of: {valid_levels:?}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
