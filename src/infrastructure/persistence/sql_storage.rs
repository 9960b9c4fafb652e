use crate::domain::errors::{MetricsError, MetricsResult};
use crate::domain::metric::{Metric, MetricKind, MetricValue};
use crate::domain::repositories::MetricStorage;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use std::str::FromStr;

/// Relational backend; counter merges happen inside the upsert statement.
pub struct SqlStorage {
    pool: SqlitePool,
}

impl SqlStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert_with<'e, E>(executor: E, metric: &Metric) -> MetricsResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let (value, delta) = match metric.value {
            MetricValue::Gauge(v) => (Some(v), None),
            MetricValue::Counter(d) => (None, Some(d)),
        };

        sqlx::query(
            r#"
            INSERT INTO metrics (id, type, value, delta)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id, type) DO UPDATE SET
                value = excluded.value,
                delta = metrics.delta + excluded.delta
            "#,
        )
        .bind(&metric.id)
        .bind(metric.kind().as_str())
        .bind(value)
        .bind(delta)
        .execute(executor)
        .await
        .map_err(|e| Self::map_overflow(e, metric))?;

        Ok(())
    }

    /// SQLite promotes an overflowing integer sum to REAL; the schema refuses it.
    fn map_overflow(e: sqlx::Error, metric: &Metric) -> MetricsError {
        if let sqlx::Error::Database(db) = &e
            && db.is_check_violation()
            && db.message().contains("delta_is_integer")
        {
            return MetricsError::validation(format!("counter {} overflows", metric.id));
        }
        e.into()
    }

    fn row_to_metric(id: String, kind: MetricKind, row: &SqliteRow) -> MetricsResult<Metric> {
        match kind {
            MetricKind::Gauge => {
                let value: Option<f64> = row.try_get("value")?;
                value
                    .map(|v| Metric::gauge(&id, v))
                    .ok_or_else(|| MetricsError::storage(format!("gauge {} has no value", id)))
            }
            MetricKind::Counter => {
                let delta: Option<i64> = row.try_get("delta")?;
                delta
                    .map(|d| Metric::counter(&id, d))
                    .ok_or_else(|| MetricsError::storage(format!("counter {} has no delta", id)))
            }
        }
    }
}

#[async_trait]
impl MetricStorage for SqlStorage {
    async fn upsert(&self, metric: &Metric) -> MetricsResult<()> {
        Self::upsert_with(&self.pool, metric).await
    }

    async fn find(&self, id: &str, kind: MetricKind) -> MetricsResult<Metric> {
        let row = sqlx::query("SELECT value, delta FROM metrics WHERE id = ? AND type = ?")
            .bind(id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_metric(id.to_string(), kind, &row),
            None => Err(MetricsError::not_found(id, kind)),
        }
    }

    async fn export_all(&self) -> MetricsResult<Vec<Metric>> {
        let rows = sqlx::query("SELECT id, type, value, delta FROM metrics")
            .fetch_all(&self.pool)
            .await?;

        let mut metrics = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let kind_str: String = row.try_get("type")?;
            let kind = MetricKind::from_str(&kind_str)
                .map_err(|e| MetricsError::storage(e.to_string()))?;
            metrics.push(Self::row_to_metric(id, kind, &row)?);
        }
        Ok(metrics)
    }

    async fn import_batch(&self, metrics: &[Metric]) -> MetricsResult<()> {
        let mut tx = self.pool.begin().await?;
        for metric in metrics {
            // Dropping `tx` on error rolls the whole batch back.
            Self::upsert_with(&mut *tx, metric).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> MetricsResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sql"
    }
}
