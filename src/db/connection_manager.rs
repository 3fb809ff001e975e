//! PostgreSQL connection manager for bb8 pool
//!
//! Implements the bb8::ManageConnection trait so the pool can create and
//! validate `sqlx::PgConnection`s.

use async_trait::async_trait;
use bb8::ManageConnection;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors that can occur during connection management
#[derive(Error, Debug)]
pub enum ConnectionManagerError {
    #[error("Failed to create PostgreSQL connection: {0}")]
    ConnectionCreation(#[from] sqlx::Error),

    #[error("Connection attempt timed out after {0}s")]
    Timeout(u64),

    #[error("Connection validation failed: {0}")]
    ValidationFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Resolved connection settings for a single PostgreSQL server
#[derive(Clone)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub connect_timeout_secs: u64,
}

impl PgConnectionConfig {
    /// Create a new configuration
    pub fn new(host: String, port: u16, database: String, user: String) -> Self {
        Self {
            host,
            port,
            database,
            user,
            password: None,
            connect_timeout_secs: 5,
        }
    }

    pub fn with_password(mut self, password: String) -> Self {
        self.password = Some(password);
        self
    }

    /// Set connection timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.connect_timeout_secs = timeout_secs;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .application_name(env!("CARGO_PKG_NAME"));

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }

    /// Open a single connection outside of any pool.
    pub async fn connect(&self) -> Result<PgConnection, ConnectionManagerError> {
        match tokio::time::timeout(self.connect_timeout(), self.connect_options().connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(ConnectionManagerError::ConnectionCreation(e)),
            Err(_) => Err(ConnectionManagerError::Timeout(self.connect_timeout_secs)),
        }
    }
}

// Hand-written so the password never reaches logs
impl fmt::Debug for PgConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Connection manager for PostgreSQL that implements bb8::ManageConnection
#[derive(Debug, Clone)]
pub struct PgConnectionManager {
    config: PgConnectionConfig,
}

impl PgConnectionManager {
    pub fn new(config: PgConnectionConfig) -> Self {
        debug!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Creating PostgreSQL connection manager"
        );
        Self { config }
    }
}

#[async_trait]
impl ManageConnection for PgConnectionManager {
    type Connection = PgConnection;
    type Error = ConnectionManagerError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        debug!("Creating new PostgreSQL connection");

        let connection = self.config.connect().await.map_err(|e| {
            error!("Failed to create PostgreSQL connection: {}", e);
            e
        })?;

        debug!("Successfully created PostgreSQL connection");
        Ok(connection)
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.ping().await.map_err(|e| {
            warn!("Connection validation failed: {}", e);
            ConnectionManagerError::ValidationFailed(e.to_string())
        })
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        // Broken sockets surface through is_valid on the next check-out
        false
    }
}

impl fmt::Display for PgConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PgConnectionManager(host={}, port={}, database={})",
            self.config.host, self.config.port, self.config.database
        )
    }
}
