//! Health check and monitoring module
//!
//! Liveness and detailed status for the service, derived from the
//! connection pool state and a probe query.

use crate::db::{ConnectionPool, PoolState, PoolStats, StoreManager};
use crate::{PredictorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Latency above which a dependency is reported degraded
const SLOW_PROBE_MS: u64 = 1000;
/// Pool utilization above which the database is reported degraded
const HIGH_UTILIZATION: f64 = 0.8;

/// Overall health status of the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All dependencies are healthy
    Healthy,
    /// Reachable but slow or close to capacity
    Degraded,
    /// Critical dependencies are failing
    Unhealthy,
}

/// Individual dependency health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
    pub last_checked: i64, // Unix timestamp
}

/// Connection pool health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolHealth {
    pub state: PoolState,
    pub active: u32,
    pub idle: u32,
    pub max: u32,
    pub utilization_percent: f64,
}

/// Database specific health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub connection_pool: ConnectionPoolHealth,
    pub message: Option<String>,
}

/// Comprehensive service status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: DatabaseHealth,
    pub timestamp: i64, // Unix timestamp
}

/// Trait for checking health of individual dependencies
#[async_trait]
pub trait HealthChecker {
    async fn check_health(&self) -> DependencyHealth;

    fn dependency_name(&self) -> &'static str;
}

impl From<&PoolStats> for ConnectionPoolHealth {
    fn from(stats: &PoolStats) -> Self {
        Self {
            state: stats.state,
            active: stats.active_connections,
            idle: stats.idle_connections,
            max: stats.max_size,
            utilization_percent: if stats.max_size > 0 {
                (stats.active_connections as f64 / stats.max_size as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}

/// Health checker for the PostgreSQL pool
pub struct DatabaseHealthChecker<M: StoreManager> {
    pool: Arc<ConnectionPool<M>>,
}

impl<M: StoreManager> DatabaseHealthChecker<M> {
    pub fn new(pool: Arc<ConnectionPool<M>>) -> Self {
        Self { pool }
    }

    /// Check database health with connection pool information
    #[instrument(skip(self))]
    pub async fn check_detailed_health(&self) -> DatabaseHealth {
        let start = Instant::now();
        let probe = self.probe().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let stats = self.pool.stats().await;
        let connection_pool = ConnectionPoolHealth::from(&stats);

        let (status, message) = match probe {
            Ok(()) => {
                if latency_ms > SLOW_PROBE_MS {
                    (HealthStatus::Degraded, Some("High latency".to_string()))
                } else if connection_pool.utilization_percent > HIGH_UTILIZATION * 100.0 {
                    (HealthStatus::Degraded, Some("High connection pool utilization".to_string()))
                } else {
                    (HealthStatus::Healthy, None)
                }
            }
            Err(e) => (HealthStatus::Unhealthy, Some(self.describe_failure(e).await)),
        };

        DatabaseHealth {
            status,
            latency_ms,
            connection_pool,
            message,
        }
    }

    async fn probe(&self) -> Result<()> {
        match self.pool.health_check().await {
            Ok(true) => {
                debug!("Database health check passed");
                Ok(())
            }
            Ok(false) => {
                warn!("Database health check failed");
                Err(PredictorError::Query("Health check query failed".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // Keeps the degraded-startup reason visible on /status
    async fn describe_failure(&self, err: PredictorError) -> String {
        match self.pool.failure_reason().await {
            Some(reason) => format!("{} ({})", err, reason),
            None => err.to_string(),
        }
    }
}

#[async_trait]
impl<M: StoreManager> HealthChecker for DatabaseHealthChecker<M> {
    async fn check_health(&self) -> DependencyHealth {
        let start = Instant::now();
        let last_checked = chrono::Utc::now().timestamp();

        match self.probe().await {
            Ok(()) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                DependencyHealth {
                    status: if latency_ms > SLOW_PROBE_MS {
                        HealthStatus::Degraded
                    } else {
                        HealthStatus::Healthy
                    },
                    latency_ms: Some(latency_ms),
                    message: None,
                    last_checked,
                }
            }
            Err(e) => DependencyHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                message: Some(format!("Connection failed: {}", e)),
                last_checked,
            },
        }
    }

    fn dependency_name(&self) -> &'static str {
        "postgres"
    }
}

/// Coordinates health checks for the HTTP endpoints
pub struct HealthService<M: StoreManager> {
    database: DatabaseHealthChecker<M>,
    start_time: Instant,
}

impl<M: StoreManager> HealthService<M> {
    pub fn new(pool: Arc<ConnectionPool<M>>) -> Self {
        Self {
            database: DatabaseHealthChecker::new(pool),
            start_time: Instant::now(),
        }
    }

    /// Simple health check for load balancers: `OK` when the database answers.
    #[instrument(skip(self))]
    pub async fn check_health(&self) -> Result<String> {
        let health = self.database.check_health().await;
        match health.status {
            HealthStatus::Unhealthy => {
                let message = health.message.unwrap_or_else(|| "unhealthy".to_string());
                warn!(dependency = self.database.dependency_name(), "Health check failed: {}", message);
                Err(PredictorError::ServiceUnavailable(message))
            }
            _ => Ok("OK".to_string()),
        }
    }

    /// Detailed status for dashboards
    #[instrument(skip(self))]
    pub async fn get_detailed_status(&self) -> ServiceStatus {
        let database = self.database.check_detailed_health().await;

        ServiceStatus {
            status: database.status.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            database,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
