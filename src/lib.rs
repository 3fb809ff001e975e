pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod logging;
pub mod models;
pub mod server;
pub mod service;

pub use config::{ApiConfig, Config, DatabaseConfig, LoggingConfig, PoolConfig, ServerConfig};
pub use db::{
    ConnectionPool, PgConnectionConfig, PgConnectionManager, PoolError, PoolState, PoolStats,
    PredictionStore, StoreManager,
};
pub use error::{PredictorError, Result};
pub use health::{HealthService, HealthStatus, ServiceStatus};
pub use models::{BikePrediction, PredictionRow};
pub use server::{create_router, start_server, AppState};
pub use service::PredictionService;
