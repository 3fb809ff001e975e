//! Integration tests against a real PostgreSQL server
//!
//! Run with: cargo test --test integration_postgres -- --ignored
//! Requires BIKE_TEST_DB_HOST, BIKE_TEST_DB_NAME, BIKE_TEST_DB_USER and
//! optionally BIKE_TEST_DB_PASSWORD / BIKE_TEST_DB_PORT.

use bike_predictor::db::{self, queries};
use bike_predictor::models::sample_predictions;
use bike_predictor::{ApiConfig, DatabaseConfig, PoolConfig, PoolState, PredictionService};
use std::sync::Arc;

fn test_database_config() -> Option<DatabaseConfig> {
    let host = std::env::var("BIKE_TEST_DB_HOST").ok()?;
    Some(DatabaseConfig {
        host: Some(host),
        port: std::env::var("BIKE_TEST_DB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432),
        name: std::env::var("BIKE_TEST_DB_NAME").ok(),
        user: std::env::var("BIKE_TEST_DB_USER").ok(),
        password: std::env::var("BIKE_TEST_DB_PASSWORD").ok(),
        connect_timeout_secs: 5,
    })
}

#[tokio::test]
#[ignore] // Run only with --ignored when PostgreSQL is available
async fn test_seed_then_query_through_pool() {
    let Some(database) = test_database_config() else {
        println!("Skipping integration test - BIKE_TEST_DB_HOST not set");
        return;
    };

    let mut conn = database.to_connection_config().unwrap().connect().await.unwrap();
    queries::create_table(&mut conn).await.unwrap();
    queries::upsert_predictions(&mut conn, &sample_predictions()).await.unwrap();
    assert!(queries::count_predictions(&mut conn).await.unwrap() >= 5);

    let tables = queries::list_user_tables(&mut conn).await.unwrap();
    assert!(tables.iter().any(|(_, table)| table == "bike_predictions"));

    let pool = Arc::new(db::bootstrap_pool(&database, &PoolConfig::default()).await);
    assert_eq!(pool.state().await, PoolState::Ready);
    assert!(pool.health_check().await.unwrap());

    let service = PredictionService::new(Arc::clone(&pool), &ApiConfig::default());
    let predictions = service.list_predictions(Some(3)).await.unwrap();
    assert!(predictions.len() <= 3);
    assert!(predictions
        .windows(2)
        .all(|pair| pair[0].failure_probability >= pair[1].failure_probability));

    pool.shutdown().await;
    assert_eq!(pool.state().await, PoolState::Closed);
}

#[tokio::test]
#[ignore]
async fn test_unreachable_server_degrades_pool() {
    let database = DatabaseConfig {
        host: Some("127.0.0.1".to_string()),
        port: 1,
        name: Some("bikes".to_string()),
        user: Some("nobody".to_string()),
        password: None,
        connect_timeout_secs: 1,
    };
    let pool_config = PoolConfig {
        acquire_timeout_secs: 1,
        ..PoolConfig::default()
    };

    let pool = db::bootstrap_pool(&database, &pool_config).await;

    assert_eq!(pool.state().await, PoolState::Degraded);
    assert!(pool.failure_reason().await.is_some());
}
