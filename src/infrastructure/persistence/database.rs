use crate::domain::errors::MetricsResult;
use crate::infrastructure::core::retry::RetryPolicy;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared SQLite pool with the metrics schema applied
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Connect to `dsn`, retrying per `retry`, and initialise the schema.
    ///
    /// A bare path is treated as `sqlite://<path>`.
    pub async fn connect(dsn: &str, retry: RetryPolicy) -> MetricsResult<Self> {
        let db_url = if dsn.starts_with("sqlite:") {
            dsn.to_string()
        } else {
            format!("sqlite://{}", dsn)
        };

        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = retry
            .connect(&db_url, || {
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options.clone())
            })
            .await?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> MetricsResult<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id TEXT NOT NULL CHECK (id <> ''),
                type TEXT NOT NULL CHECK (type IN ('gauge', 'counter')),
                value REAL,
                delta INTEGER CONSTRAINT delta_is_integer
                    CHECK (delta IS NULL OR typeof(delta) = 'integer'),
                PRIMARY KEY (id, type)
            );
            "#,
        )
        .execute(&mut *conn)
        .await?;

        info!("Database schema initialized.");
        Ok(())
    }
}
