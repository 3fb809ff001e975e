//! Connection pool wrapper
//!
//! Wraps a bb8 pool in an explicit lifecycle:
//! `Uninitialized -> Ready | Degraded -> Closed`.
//! Borrowed connections go back to the pool when the handle is dropped.

use crate::config::PoolConfig;
use crate::db::{PredictionStore, StoreManager};
use bb8::{Pool, PooledConnection, RunError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Errors that can occur with the connection pool
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to initialize connection pool: {0}")]
    Init(String),

    #[error("Connection pool is not available (state: {0})")]
    Unavailable(PoolState),

    #[error("Timed out waiting for a pooled connection")]
    Exhausted,

    #[error("Failed to get connection from pool: {0}")]
    Connection(String),

    #[error("Pool configuration error: {0}")]
    Configuration(String),

    #[error("Pool cannot be initialized from state {0}")]
    InvalidTransition(PoolState),
}

/// Lifecycle state of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Uninitialized,
    Ready,
    Degraded,
    Closed,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PoolState::Uninitialized => "uninitialized",
            PoolState::Ready => "ready",
            PoolState::Degraded => "degraded",
            PoolState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Connection pool statistics for monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub state: PoolState,
    /// Current number of connections in pool
    pub size: u32,
    pub idle_connections: u32,
    /// Connections currently borrowed by callers
    pub active_connections: u32,
    pub min_size: u32,
    pub max_size: u32,
}

enum Slot<M: StoreManager> {
    Uninitialized,
    Ready(Pool<M>),
    Degraded(String),
    Closed,
}

impl<M: StoreManager> Slot<M> {
    fn state(&self) -> PoolState {
        match self {
            Slot::Uninitialized => PoolState::Uninitialized,
            Slot::Ready(_) => PoolState::Ready,
            Slot::Degraded(_) => PoolState::Degraded,
            Slot::Closed => PoolState::Closed,
        }
    }
}

/// A borrowed connection. Dropping it releases the connection.
pub type PooledHandle<M> = PooledConnection<'static, M>;

/// Bounded pool of database connections with an explicit lifecycle
pub struct ConnectionPool<M: StoreManager> {
    slot: RwLock<Slot<M>>,
    config: PoolConfig,
}

impl<M: StoreManager> fmt::Debug for ConnectionPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("pool", &"bb8::Pool<..>")
            .field("config", &self.config)
            .finish()
    }
}

impl<M: StoreManager> ConnectionPool<M> {
    /// Create an uninitialized pool. No connections are opened until
    /// [`ConnectionPool::initialize`] is called.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            slot: RwLock::new(Slot::Uninitialized),
            config,
        }
    }

    /// Open the pool, eagerly establishing `min_size` connections.
    ///
    /// On failure the pool moves to `Degraded` and every later
    /// [`acquire`](Self::acquire) fails fast with [`PoolError::Unavailable`].
    #[instrument(skip(self, manager), fields(min_size = self.config.min_size, max_size = self.config.max_size))]
    pub async fn initialize(&self, manager: M) -> Result<(), PoolError> {
        let mut slot = self.slot.write().await;
        if !matches!(*slot, Slot::Uninitialized) {
            return Err(PoolError::InvalidTransition(slot.state()));
        }

        info!("Initializing connection pool");

        match self.build(manager).await {
            Ok(pool) => {
                let state = pool.state();
                info!(
                    connections = state.connections,
                    idle = state.idle_connections,
                    "Connection pool initialized"
                );
                *slot = Slot::Ready(pool);
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize connection pool: {}", e);
                *slot = Slot::Degraded(e.to_string());
                Err(e)
            }
        }
    }

    /// Record that the pool could not even be attempted (e.g. missing
    /// credentials). Moves `Uninitialized` to `Degraded`.
    pub async fn fail_initialization(&self, reason: impl Into<String>) -> Result<(), PoolError> {
        let mut slot = self.slot.write().await;
        if !matches!(*slot, Slot::Uninitialized) {
            return Err(PoolError::InvalidTransition(slot.state()));
        }

        let reason = reason.into();
        warn!(reason = %reason, "Connection pool marked degraded");
        *slot = Slot::Degraded(reason);
        Ok(())
    }

    async fn build(&self, manager: M) -> Result<Pool<M>, PoolError> {
        self.config.validate().map_err(PoolError::Init)?;

        let pool = Pool::builder()
            .max_size(self.config.max_size)
            .min_idle(Some(self.config.min_size))
            .connection_timeout(self.config.acquire_timeout())
            .idle_timeout(self.config.idle_timeout())
            .max_lifetime(self.config.max_lifetime())
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| PoolError::Init(e.to_string()))?;

        // bb8 opens nothing eagerly when min_size is 0, so reach the store once here
        if self.config.min_size == 0 {
            pool.get()
                .await
                .map_err(|e| PoolError::Init(format!("initial connection failed: {}", e)))?;
        }

        Ok(pool)
    }

    /// Borrow a connection, waiting at most the configured acquire timeout.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<PooledHandle<M>, PoolError> {
        let pool = match &*self.slot.read().await {
            Slot::Ready(pool) => pool.clone(),
            other => {
                debug!(state = %other.state(), "Rejecting acquire on unavailable pool");
                return Err(PoolError::Unavailable(other.state()));
            }
        };

        match pool.get_owned().await {
            Ok(conn) => {
                debug!("Acquired connection from pool");
                Ok(conn)
            }
            Err(RunError::TimedOut) => {
                let state = pool.state();
                warn!(
                    connections = state.connections,
                    max_size = self.config.max_size,
                    "{}",
                    timeout_cause(state.connections, self.config.max_size)
                );
                Err(PoolError::Exhausted)
            }
            Err(RunError::User(e)) => {
                error!("Connection manager error: {}", e);
                Err(PoolError::Connection(e.to_string()))
            }
        }
    }

    /// Return a borrowed connection. Equivalent to dropping the handle.
    pub fn release(&self, conn: PooledHandle<M>) {
        drop(conn);
    }

    /// Close all pooled connections. Safe to call repeatedly and from any state.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut slot = self.slot.write().await;
        match std::mem::replace(&mut *slot, Slot::Closed) {
            Slot::Ready(pool) => {
                let state = pool.state();
                info!(
                    connections = state.connections,
                    idle = state.idle_connections,
                    "Shutting down connection pool"
                );
                // Idle connections close now; borrowed ones close when released
                drop(pool);
                info!("Connection pool shutdown complete");
            }
            Slot::Closed => debug!("Connection pool already closed"),
            previous => info!(state = %previous.state(), "Closing connection pool that never became ready"),
        }
    }

    pub async fn state(&self) -> PoolState {
        self.slot.read().await.state()
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == PoolState::Ready
    }

    /// Why initialization failed, when the pool is degraded.
    pub async fn failure_reason(&self) -> Option<String> {
        match &*self.slot.read().await {
            Slot::Degraded(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    pub async fn stats(&self) -> PoolStats {
        let slot = self.slot.read().await;
        let (size, idle) = match &*slot {
            Slot::Ready(pool) => {
                let state = pool.state();
                (state.connections, state.idle_connections)
            }
            _ => (0, 0),
        };

        PoolStats {
            state: slot.state(),
            size,
            idle_connections: idle,
            active_connections: size.saturating_sub(idle),
            min_size: self.config.min_size,
            max_size: self.config.max_size,
        }
    }

    /// Acquire a connection and run the store's probe query.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<bool, PoolError> {
        let mut conn = self.acquire().await?;
        match conn.probe().await {
            Ok(()) => {
                debug!("Connection pool health check passed");
                Ok(true)
            }
            Err(e) => {
                warn!("Connection pool health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

/// bb8 retries failed connects until the acquire timeout, so a database
/// outage surfaces as a timeout too. A pool below `max_size` had room to
/// connect and could not.
fn timeout_cause(connections: u32, max_size: u32) -> &'static str {
    if connections < max_size {
        "Timed out opening a database connection - the database may be unreachable"
    } else {
        "Connection pool timeout - consider increasing pool size or timeout"
    }
}
