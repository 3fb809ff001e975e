//! In-memory stand-in for PostgreSQL so pool and service behaviour can be
//! exercised without a database.

#![allow(dead_code)]

use async_trait::async_trait;
use bb8::ManageConnection;
use bike_predictor::{ConnectionPool, PoolConfig, PredictionRow, PredictionStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockError {
    #[error("connection refused")]
    Refused,
}

/// Shared knobs and counters behind every mock connection.
#[derive(Default)]
pub struct MockStore {
    rows: Mutex<Vec<PredictionRow>>,
    fail_connect: AtomicBool,
    fail_query: AtomicBool,
    query_delay_ms: AtomicUsize,
    created: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    queries: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_rows(rows: Vec<PredictionRow>) -> Arc<Self> {
        let store = Self::new();
        store.set_rows(rows);
        store
    }

    pub fn set_rows(&self, rows: Vec<PredictionRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_query(&self, fail: bool) {
        self.fail_query.store(fail, Ordering::SeqCst);
    }

    pub fn set_query_delay(&self, delay: Duration) {
        self.query_delay_ms.store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn connections_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn queries_run(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Mirrors `ORDER BY failure_probability DESC NULLS LAST LIMIT $1`.
    fn top(&self, limit: i64) -> Vec<PredictionRow> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| match (a.failure_probability, b.failure_probability) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        rows.truncate(limit.max(0) as usize);
        rows
    }
}

pub struct MockConnection {
    store: Arc<MockStore>,
}

#[async_trait]
impl PredictionStore for MockConnection {
    async fn probe(&mut self) -> Result<(), sqlx::Error> {
        if self.store.fail_query.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("probe failed".to_string()));
        }
        Ok(())
    }

    async fn top_predictions(&mut self, limit: i64) -> Result<Vec<PredictionRow>, sqlx::Error> {
        let store = &self.store;
        let current = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        store.queries.fetch_add(1, Ordering::SeqCst);

        let delay = store.query_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        let result = if store.fail_query.load(Ordering::SeqCst) {
            Err(sqlx::Error::Protocol("relation \"bike_predictions\" does not exist".to_string()))
        } else {
            Ok(store.top(limit))
        };

        store.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub struct MockManager {
    store: Arc<MockStore>,
}

impl MockManager {
    pub fn new(store: Arc<MockStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ManageConnection for MockManager {
    type Connection = MockConnection;
    type Error = MockError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        if self.store.fail_connect.load(Ordering::SeqCst) {
            return Err(MockError::Refused);
        }
        self.store.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            store: Arc::clone(&self.store),
        })
    }

    async fn is_valid(&self, _conn: &mut Self::Connection) -> Result<(), Self::Error> {
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub fn pool_config(min_size: u32, max_size: u32) -> PoolConfig {
    PoolConfig {
        min_size,
        max_size,
        acquire_timeout_secs: 1,
        idle_timeout_secs: 60,
        max_lifetime_secs: 300,
    }
}

/// A pool over `store` that has completed initialization.
pub async fn ready_pool(store: &Arc<MockStore>, min_size: u32, max_size: u32) -> Arc<ConnectionPool<MockManager>> {
    let pool = ConnectionPool::new(pool_config(min_size, max_size));
    pool.initialize(MockManager::new(Arc::clone(store)))
        .await
        .expect("mock pool should initialize");
    Arc::new(pool)
}

/// Five-bike fixture matching the seed data.
pub fn sample_rows() -> Vec<PredictionRow> {
    vec![
        PredictionRow::new("B001", 12.9716, 77.5946, 0.85),
        PredictionRow::new("B002", 28.7041, 77.1025, 0.12),
        PredictionRow::new("B003", 19.0760, 72.8777, 0.46),
        PredictionRow::new("B004", 13.0827, 80.2707, 0.02),
        PredictionRow::new("B005", 22.5726, 88.3639, 0.66),
    ]
}
