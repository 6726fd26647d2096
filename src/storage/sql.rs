//! SQL storage backend implementation
//!
//! Durable, transactional storage on top of a sqlx SQLite pool. The
//! database is the sole source of truth; no in-process cache is kept.
//!
//! ## Merge semantics
//!
//! Both kinds are written as a single atomic upsert. The counter
//! upsert performs its addition inside the statement
//! (`delta = delta + excluded.delta`), so concurrent writers cannot
//! lose updates to a read-modify-write race.
//!
//! ## Failure handling
//!
//! Single-item writes run through the fixed retry schedule in
//! `retry.rs`, but only for connection-level faults. Batches run in
//! one transaction: either every item commits or the whole batch rolls
//! back.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::retry::with_retries;
use crate::{MetricKind, MetricPayload, MetricValue};

/// SQL storage backend
///
/// Owns the connection pool for the process lifetime; `close` must be
/// called on shutdown.
pub struct SqlBackend {
    pool: Pool<Sqlite>,
}

impl SqlBackend {
    /// Connect to the database named by `dsn` and create the metric
    /// tables if they do not exist yet.
    #[instrument(skip_all)]
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        info!("initializing SQL backend");

        let options = SqliteConnectOptions::from_str(dsn)
            .map_err(|e| StorageError::Permanent(format!("invalid DSN: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gauges (
                name TEXT PRIMARY KEY,
                value DOUBLE PRECISION NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                delta BIGINT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("SQL backend ready");
        Ok(Self { pool })
    }

    /// Close the connection pool. Call once on shutdown.
    pub async fn close(&self) {
        info!("closing SQL backend");
        self.pool.close().await;
    }

    async fn upsert(&self, name: &str, value: MetricValue) -> StorageResult<()> {
        match value {
            MetricValue::Gauge(v) => {
                sqlx::query(
                    r#"
                    INSERT INTO gauges (name, value)
                    VALUES (?, ?)
                    ON CONFLICT (name) DO UPDATE SET value = excluded.value
                    "#,
                )
                .bind(name)
                .bind(v)
                .execute(&self.pool)
                .await?;
            }
            MetricValue::Counter(d) => {
                sqlx::query(
                    r#"
                    INSERT INTO counters (name, delta)
                    VALUES (?, ?)
                    ON CONFLICT (name) DO UPDATE SET delta = delta + excluded.delta
                    "#,
                )
                .bind(name)
                .bind(d)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqlBackend {
    #[instrument(skip(self, raw), fields(kind = %kind, name = name))]
    async fn add(&self, kind: MetricKind, name: &str, raw: &str) -> StorageResult<()> {
        // Validation runs before the first attempt; a malformed value
        // must never reach the retry loop.
        let value = MetricValue::parse(kind, raw)?;

        with_retries(|| self.upsert(name, value)).await
    }

    #[instrument(skip(self), fields(kind = %kind, name = name))]
    async fn get(&self, kind: MetricKind, name: &str) -> StorageResult<String> {
        match kind {
            MetricKind::Gauge => {
                let value: Option<f64> =
                    sqlx::query_scalar("SELECT value FROM gauges WHERE name = ?")
                        .bind(name)
                        .fetch_optional(&self.pool)
                        .await?;
                value
                    .map(|v| MetricValue::Gauge(v).format())
                    .ok_or_else(|| StorageError::NotFound(name.to_string()))
            }
            MetricKind::Counter => {
                let delta: Option<i64> =
                    sqlx::query_scalar("SELECT delta FROM counters WHERE name = ?")
                        .bind(name)
                        .fetch_optional(&self.pool)
                        .await?;
                delta
                    .map(|d| MetricValue::Counter(d).format())
                    .ok_or_else(|| StorageError::NotFound(name.to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> StorageResult<HashMap<String, String>> {
        let gauges: Vec<(String, f64)> = sqlx::query_as("SELECT name, value FROM gauges")
            .fetch_all(&self.pool)
            .await?;
        let counters: Vec<(String, i64)> = sqlx::query_as("SELECT name, delta FROM counters")
            .fetch_all(&self.pool)
            .await?;

        let mut result = HashMap::with_capacity(gauges.len() + counters.len());
        for (name, v) in gauges {
            result.insert(name, MetricValue::Gauge(v).format());
        }
        for (name, d) in counters {
            result.insert(name, MetricValue::Counter(d).format());
        }
        Ok(result)
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// All-or-nothing batch: every item is validated up front, then
    /// applied inside a single transaction. Any failure rolls the
    /// whole batch back.
    #[instrument(skip(self, metrics), fields(count = metrics.len()))]
    async fn add_batch(&self, metrics: &[MetricPayload]) -> StorageResult<()> {
        if metrics.is_empty() {
            return Ok(());
        }

        // Validation before the transaction: a bad item means nothing
        // is written at all.
        let mut items = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let raw = metric.raw_value()?;
            let value = MetricValue::parse(metric.kind, &raw)?;
            items.push((metric.id.as_str(), value));
        }

        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for (name, value) in items {
            let result = match value {
                MetricValue::Gauge(v) => {
                    sqlx::query(
                        r#"
                        INSERT INTO gauges (name, value)
                        VALUES (?, ?)
                        ON CONFLICT (name) DO UPDATE SET value = excluded.value
                        "#,
                    )
                    .bind(name)
                    .bind(v)
                    .execute(&mut *tx)
                    .await
                }
                MetricValue::Counter(d) => {
                    sqlx::query(
                        r#"
                        INSERT INTO counters (name, delta)
                        VALUES (?, ?)
                        ON CONFLICT (name) DO UPDATE SET delta = delta + excluded.delta
                        "#,
                    )
                    .bind(name)
                    .bind(d)
                    .execute(&mut *tx)
                    .await
                }
            };

            if let Err(err) = result {
                // Dropping tx rolls the transaction back.
                return Err(StorageError::BatchAborted(err.to_string()));
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::BatchAborted(e.to_string()))?;

        debug!("batch of {} metrics committed", metrics.len());
        Ok(())
    }
}
