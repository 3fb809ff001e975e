//! End-to-end tests of the HTTP surface against the mock store

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use bike_predictor::server::ErrorResponse;
use bike_predictor::{create_router, ApiConfig, AppState, BikePrediction, ConnectionPool};
use common::{pool_config, ready_pool, sample_rows, MockManager, MockStore};
use serde_json::Value;
use std::sync::Arc;

fn test_server(pool: Arc<ConnectionPool<MockManager>>) -> TestServer {
    let state = AppState::new(pool, &ApiConfig::default());
    let app = create_router(state, &["http://localhost:3000".to_string()]);
    TestServer::new(app).unwrap()
}

async fn seeded_server() -> (TestServer, Arc<MockStore>) {
    let store = MockStore::with_rows(sample_rows());
    let pool = ready_pool(&store, 1, 2).await;
    (test_server(pool), store)
}

async fn degraded_server() -> TestServer {
    let pool: ConnectionPool<MockManager> = ConnectionPool::new(pool_config(1, 2));
    pool.fail_initialization("password authentication failed").await.unwrap();
    test_server(Arc::new(pool))
}

#[tokio::test]
async fn test_root_returns_welcome_message() {
    let server = degraded_server().await;

    let response = server.get("/").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let json: Value = response.json();
    assert_eq!(json["message"], "Welcome to Bike Management API");
}

#[tokio::test]
async fn test_predictions_with_limit() {
    let (server, _store) = seeded_server().await;

    let response = server.get("/predictions?limit=3").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let predictions: Vec<BikePrediction> = response.json();
    let ids: Vec<_> = predictions.iter().map(|p| p.bike_id.as_str()).collect();
    assert_eq!(ids, vec!["B001", "B005", "B003"]);
}

#[tokio::test]
async fn test_predictions_default_limit() {
    let (server, _store) = seeded_server().await;

    let response = server.get("/predictions").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let json: Value = response.json();
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 5);

    let first = &items[0];
    assert_eq!(first["bike_id"], "B001");
    assert_eq!(first["latitude"], 12.9716);
    assert_eq!(first["longitude"], 77.5946);
    assert_eq!(first["failure_probability"], 0.85);
}

#[tokio::test]
async fn test_predictions_empty_table() {
    let store = MockStore::new();
    let server = test_server(ready_pool(&store, 1, 2).await);

    let response = server.get("/predictions?limit=10").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "[]");
}

#[tokio::test]
async fn test_predictions_on_degraded_pool_is_generic_500() {
    let server = degraded_server().await;

    let response = server.get("/predictions").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = response.json();
    assert_eq!(body.message, "Database not initialized");
    assert_eq!(body.error_code, 500);
    assert!(!body.request_id.is_empty());
    assert!(!response.text().contains("password"));
}

#[tokio::test]
async fn test_predictions_query_failure_is_generic_500() {
    let (server, store) = seeded_server().await;
    store.set_fail_query(true);

    let response = server.get("/predictions?limit=3").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = response.json();
    assert_eq!(body.message, "Failed to fetch predictions");
    assert!(!response.text().contains("bike_predictions"));
}

#[tokio::test]
async fn test_predictions_bad_limit_is_500() {
    let (server, store) = seeded_server().await;

    for path in ["/predictions?limit=0", "/predictions?limit=-5", "/predictions?limit=abc"] {
        let response = server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR, "{}", path);
    }
    assert_eq!(store.queries_run(), 0);
}

#[tokio::test]
async fn test_each_error_gets_its_own_request_id() {
    let server = degraded_server().await;

    let first: ErrorResponse = server.get("/predictions").await.json();
    let second: ErrorResponse = server.get("/predictions").await.json();

    assert_ne!(first.request_id, second.request_id);
}
