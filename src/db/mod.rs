//! Database connection pooling module
//!
//! Connection pooling for PostgreSQL using the bb8 connection pool library,
//! plus the SQL the service runs.

pub mod connection_manager;
pub mod pool;
pub mod queries;

pub use connection_manager::{ConnectionManagerError, PgConnectionConfig, PgConnectionManager};
pub use pool::{ConnectionPool, PoolError, PoolState, PoolStats, PooledHandle};
pub use queries::PredictionStore;

use crate::config::{DatabaseConfig, PoolConfig};
use bb8::ManageConnection;
use tracing::warn;

/// Any bb8 manager whose connections can serve prediction queries.
pub trait StoreManager:
    ManageConnection<Connection: PredictionStore, Error: std::error::Error>
{
}

impl<M> StoreManager for M where
    M: ManageConnection<Connection: PredictionStore, Error: std::error::Error>
{
}

/// Build the process-wide PostgreSQL pool.
///
/// Never fails: configuration or connection problems leave the pool
/// `Degraded`, and the server still starts.
pub async fn bootstrap_pool(
    database: &DatabaseConfig,
    pool_config: &PoolConfig,
) -> ConnectionPool<PgConnectionManager> {
    let pool = ConnectionPool::new(pool_config.clone());

    let missing = database.missing_fields();
    if !missing.is_empty() {
        warn!(missing = ?missing, "One or more database settings are missing; check .env or config.toml");
    }

    let outcome = match database.to_connection_config() {
        Ok(connection_config) => pool.initialize(PgConnectionManager::new(connection_config)).await,
        Err(e) => {
            let err = PoolError::Configuration(e.to_string());
            // The pool was created just above, so this transition cannot be rejected
            let _ = pool.fail_initialization(err.to_string()).await;
            Err(err)
        }
    };

    if let Err(e) = outcome {
        warn!("Starting without a database: {}", e);
    }

    pool
}
