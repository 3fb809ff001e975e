//! SQL for the `bike_predictions` table.

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row};
use tracing::{debug, instrument};

use crate::models::{BikePrediction, PredictionRow};

/// Top-N read, highest failure probability first.
///
/// NULL probabilities sort last so they never crowd out real scores.
pub const TOP_PREDICTIONS_SQL: &str = "
    SELECT bike_id, latitude, longitude, failure_probability
    FROM bike_predictions
    ORDER BY failure_probability DESC NULLS LAST
    LIMIT $1
";

pub const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS public.bike_predictions (
        bike_id TEXT PRIMARY KEY,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        failure_probability DOUBLE PRECISION
    )
";

pub const UPSERT_PREDICTION_SQL: &str = "
    INSERT INTO public.bike_predictions (bike_id, latitude, longitude, failure_probability)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (bike_id) DO UPDATE SET
        latitude = EXCLUDED.latitude,
        longitude = EXCLUDED.longitude,
        failure_probability = EXCLUDED.failure_probability
";

/// Read operations the query service needs from a pooled connection.
#[async_trait]
pub trait PredictionStore: Send {
    /// Cheap round trip used by health checks.
    async fn probe(&mut self) -> Result<(), sqlx::Error>;

    /// Fetch at most `limit` rows ordered by failure probability, descending.
    async fn top_predictions(&mut self, limit: i64) -> Result<Vec<PredictionRow>, sqlx::Error>;
}

#[async_trait]
impl PredictionStore for PgConnection {
    async fn probe(&mut self) -> Result<(), sqlx::Error> {
        <PgConnection as Connection>::ping(self).await
    }

    #[instrument(skip(self))]
    async fn top_predictions(&mut self, limit: i64) -> Result<Vec<PredictionRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PredictionRow>(TOP_PREDICTIONS_SQL)
            .bind(limit)
            .fetch_all(&mut *self)
            .await?;

        debug!(rows = rows.len(), "Fetched predictions");
        Ok(rows)
    }
}

pub async fn create_table(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_TABLE_SQL).execute(&mut *conn).await?;
    Ok(())
}

/// Insert-or-replace every prediction in a single transaction.
pub async fn upsert_predictions(
    conn: &mut PgConnection,
    predictions: &[BikePrediction],
) -> Result<u64, sqlx::Error> {
    let mut tx = conn.begin().await?;
    let mut affected = 0;

    for prediction in predictions {
        let result = sqlx::query(UPSERT_PREDICTION_SQL)
            .bind(&prediction.bike_id)
            .bind(prediction.latitude)
            .bind(prediction.longitude)
            .bind(prediction.failure_probability)
            .execute(&mut *tx)
            .await?;
        affected += result.rows_affected();
    }

    tx.commit().await?;
    Ok(affected)
}

pub async fn fetch_all_predictions(conn: &mut PgConnection) -> Result<Vec<PredictionRow>, sqlx::Error> {
    sqlx::query_as::<_, PredictionRow>(
        "SELECT bike_id, latitude, longitude, failure_probability
         FROM public.bike_predictions
         ORDER BY bike_id",
    )
    .fetch_all(&mut *conn)
    .await
}

pub async fn server_version(conn: &mut PgConnection) -> Result<String, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT version()")
        .fetch_one(&mut *conn)
        .await
}

/// `(schema, table)` pairs outside the system catalogs.
pub async fn list_user_tables(conn: &mut PgConnection) -> Result<Vec<(String, String)>, sqlx::Error> {
    // information_schema columns are sql_identifier; cast so they decode as String
    let rows = sqlx::query(
        "SELECT table_schema::text AS table_schema, table_name::text AS table_name
         FROM information_schema.tables
         WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
         ORDER BY table_schema, table_name",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("table_schema"), row.get("table_name")))
        .collect())
}

pub async fn count_predictions(conn: &mut PgConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM public.bike_predictions")
        .fetch_one(&mut *conn)
        .await
}
