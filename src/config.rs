use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::db::{ConnectionManagerError, PgConnectionConfig};

/// Main configuration structure for the prediction API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    /// Problems found while reading plain environment variables. Logged
    /// once tracing is installed.
    #[serde(skip)]
    pub warnings: Vec<String>,
}

/// PostgreSQL connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: u16,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_secs: u64,
}

/// Connection pool sizing and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_size: u32,
    pub max_size: u32,
    /// Upper bound on how long a request waits for a free connection
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Request limits for the predictions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub default_limit: i64,
    /// Hard ceiling on `limit`; zero or negative disables the cap
    pub max_limit: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 5432,
            name: None,
            user: None,
            password: None,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 5,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_limit: 500,
            max_limit: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(), // pretty, compact, json
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl DatabaseConfig {
    /// Names of the settings that are unset or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("host", &self.host),
            ("name", &self.name),
            ("user", &self.user),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(field, _)| field)
        .collect()
    }

    /// Resolve into connection settings. Host, database name and user are
    /// required; the password is optional.
    pub fn to_connection_config(&self) -> Result<PgConnectionConfig, ConnectionManagerError> {
        let required = |value: &Option<String>, field: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    ConnectionManagerError::Configuration(format!("database {} is not set", field))
                })
        };

        let host = required(&self.host, "host")?;
        let name = required(&self.name, "name")?;
        let user = required(&self.user, "user")?;

        let mut config = PgConnectionConfig::new(host, self.port, name, user)
            .with_timeout(self.connect_timeout_secs);
        if let Some(password) = self.password.clone().filter(|p| !p.is_empty()) {
            config = config.with_password(password);
        }
        Ok(config)
    }
}

impl PoolConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_size == 0 {
            return Err("pool max_size must be at least 1".to_string());
        }
        if self.min_size > self.max_size {
            return Err(format!(
                "pool min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            ));
        }
        if self.acquire_timeout_secs == 0 {
            return Err("pool acquire_timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// `None` when set to zero: idle connections are kept indefinitely.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// `None` when set to zero: connections are never recycled by age.
    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.max_lifetime_secs > 0).then(|| Duration::from_secs(self.max_lifetime_secs))
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. config.toml file (if exists)
    /// 3. Environment variables (BIKE_<SECTION>__<KEY>)
    /// 4. Plain DB_* variables
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&std::env::current_dir()?)
    }

    /// Load configuration from a specific directory
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_file = dir.join("config.toml");
        if config_file.exists() {
            builder = builder.add_source(File::from(config_file));
        }

        builder = builder.add_source(
            Environment::with_prefix("BIKE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.merge_env_vars();

        Ok(config)
    }

    /// Apply the plain DB_* variables used by existing deployments.
    ///
    /// Unparseable numbers keep the current value and record a warning.
    fn merge_env_vars(&mut self) {
        if let Ok(host) = std::env::var("DB_HOST") {
            self.database.host = Some(host);
        }
        if let Ok(port) = std::env::var("DB_PORT") {
            match port.trim().parse() {
                Ok(port) => self.database.port = port,
                Err(_) => self.warnings.push(format!(
                    "Invalid DB_PORT {:?}; falling back to {}",
                    port, self.database.port
                )),
            }
        }
        if let Ok(name) = std::env::var("DB_NAME") {
            self.database.name = Some(name);
        }
        if let Ok(user) = std::env::var("DB_USER") {
            self.database.user = Some(user);
        }
        if let Ok(password) = std::env::var("DB_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Ok(min) = std::env::var("DB_MINCONN") {
            match min.trim().parse() {
                Ok(min) => self.pool.min_size = min,
                Err(_) => self.warnings.push(format!(
                    "Invalid DB_MINCONN {:?}; keeping {}",
                    min, self.pool.min_size
                )),
            }
        }
        if let Ok(max) = std::env::var("DB_MAXCONN") {
            match max.trim().parse() {
                Ok(max) => self.pool.max_size = max,
                Err(_) => self.warnings.push(format!(
                    "Invalid DB_MAXCONN {:?}; keeping {}",
                    max, self.pool.max_size
                )),
            }
        }
    }
}
