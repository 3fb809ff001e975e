//! Prediction query service
//!
//! Borrows one pooled connection per call, runs the top-N query and turns
//! raw rows into sanitized response records.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::config::ApiConfig;
use crate::db::{ConnectionPool, PredictionStore, StoreManager};
use crate::models::{BikePrediction, PredictionRow};
use crate::{PredictorError, Result};

pub struct PredictionService<M: StoreManager> {
    pool: Arc<ConnectionPool<M>>,
    default_limit: i64,
    max_limit: i64,
}

impl<M: StoreManager> PredictionService<M> {
    pub fn new(pool: Arc<ConnectionPool<M>>, api: &ApiConfig) -> Self {
        Self {
            pool,
            default_limit: api.default_limit,
            max_limit: api.max_limit,
        }
    }

    /// Top `limit` predictions by failure probability, highest first.
    ///
    /// `None` uses the configured default. The connection is returned to the
    /// pool before any error propagates.
    #[instrument(skip(self))]
    pub async fn list_predictions(&self, limit: Option<i64>) -> Result<Vec<BikePrediction>> {
        let limit = resolve_limit(limit, self.default_limit, self.max_limit)?;

        let rows = {
            let mut conn = self.pool.acquire().await?;
            conn.top_predictions(limit).await.map_err(|e| {
                error!(limit, "Error fetching predictions: {}", e);
                PredictorError::from(e)
            })?
        };

        Ok(shape_predictions(rows))
    }
}

/// Validate a requested limit and apply the ceiling.
pub fn resolve_limit(requested: Option<i64>, default_limit: i64, max_limit: i64) -> Result<i64> {
    let limit = requested.unwrap_or(default_limit);
    if limit < 1 {
        return Err(PredictorError::Query(format!(
            "invalid limit: must be a positive integer, got {}",
            limit
        )));
    }

    if max_limit > 0 && limit > max_limit {
        debug!(requested = limit, max_limit, "Clamping limit");
        return Ok(max_limit);
    }

    Ok(limit)
}

/// Sanitize rows and order them by failure probability, descending.
///
/// The sort is stable, so ties keep the order storage returned them in.
pub fn shape_predictions(rows: Vec<PredictionRow>) -> Vec<BikePrediction> {
    let mut predictions: Vec<BikePrediction> = rows.into_iter().map(BikePrediction::from).collect();
    predictions.sort_by(|a, b| descending(a.failure_probability, b.failure_probability));
    predictions
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
