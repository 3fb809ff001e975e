pub mod error_response;

pub use error_response::ErrorResponse;

use crate::config::{ApiConfig, Config};
use crate::db::{ConnectionPool, StoreManager};
use crate::health::{HealthService, ServiceStatus};
use crate::models::BikePrediction;
use crate::service::PredictionService;
use crate::{PredictorError, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handler state
pub struct AppState<M: StoreManager> {
    pub predictions: Arc<PredictionService<M>>,
    pub health: Arc<HealthService<M>>,
}

// Manual impl: deriving would require `M: Clone`
impl<M: StoreManager> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            predictions: Arc::clone(&self.predictions),
            health: Arc::clone(&self.health),
        }
    }
}

impl<M: StoreManager> AppState<M> {
    pub fn new(pool: Arc<ConnectionPool<M>>, api: &ApiConfig) -> Self {
        Self {
            predictions: Arc::new(PredictionService::new(Arc::clone(&pool), api)),
            health: Arc::new(HealthService::new(pool)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictionsQuery {
    pub limit: Option<i64>,
}

pub fn create_router<M: StoreManager>(state: AppState<M>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/predictions", get(handle_predictions::<M>))
        .route("/health", get(handle_health::<M>))
        .route("/status", get(handle_status::<M>))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the configured origins. Methods and headers are
/// mirrored from the preflight since wildcards cannot be combined with
/// credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            if origin.trim() == "*" {
                warn!("Ignoring wildcard CORS origin; credentialed CORS needs explicit origins");
                return None;
            }
            match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Bind the listener and serve until Ctrl+C or SIGTERM, then close the pool.
pub async fn start_server<M: StoreManager>(pool: Arc<ConnectionPool<M>>, config: &Config) -> Result<()> {
    let state = AppState::new(Arc::clone(&pool), &config.api);
    let app = create_router(state, &config.server.cors_origins);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, pool_state = %pool.state().await, "Bike prediction API listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pool.shutdown().await;
    info!("Server shutdown complete");

    served.map_err(PredictorError::Io)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown"),
        _ = terminate => info!("Received SIGTERM, starting shutdown"),
    }
}

async fn handle_root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to Bike Management API".to_string(),
    })
}

async fn handle_predictions<M: StoreManager>(
    State(state): State<AppState<M>>,
    query: std::result::Result<Query<PredictionsQuery>, QueryRejection>,
) -> Result<Json<Vec<BikePrediction>>> {
    let Query(params) = query
        .map_err(|rejection| PredictorError::Query(format!("invalid limit: {}", rejection.body_text())))?;
    let predictions = state.predictions.list_predictions(params.limit).await?;
    Ok(Json(predictions))
}

async fn handle_health<M: StoreManager>(State(state): State<AppState<M>>) -> Response {
    match state.health.check_health().await {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE").into_response(),
    }
}

async fn handle_status<M: StoreManager>(State(state): State<AppState<M>>) -> Json<ServiceStatus> {
    Json(state.health.get_detailed_status().await)
}
