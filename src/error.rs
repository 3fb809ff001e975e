use thiserror::Error;

use crate::db::PoolError;

pub type Result<T> = std::result::Result<T, PredictorError>;

#[derive(Error, Debug)]
pub enum PredictorError {
    // Pool never reached the ready state, or has been shut down
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timed out waiting for a database connection")]
    PoolExhausted,

    // Storage errors, dropped connections and malformed limits alike
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<PoolError> for PredictorError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Unavailable(_) => PredictorError::ServiceUnavailable(err.to_string()),
            PoolError::Exhausted => PredictorError::PoolExhausted,
            PoolError::Connection(msg) => PredictorError::Query(msg),
            PoolError::Configuration(msg) => PredictorError::Configuration(msg),
            PoolError::Init(_) | PoolError::InvalidTransition(_) => {
                PredictorError::Internal(err.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for PredictorError {
    fn from(err: sqlx::Error) -> Self {
        PredictorError::Query(err.to_string())
    }
}
