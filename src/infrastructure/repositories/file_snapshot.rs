//! File-snapshot storage
//!
//! Wraps [`InMemoryStorage`] and mirrors the whole metric set to a single JSON
//! array on disk. The file is truncated and rewritten in place on every
//! `flush`; a crash mid-write can leave it corrupt.

use super::in_memory::InMemoryStorage;
use crate::domain::errors::{MetricsError, MetricsResult};
use crate::domain::metric::{Metric, MetricKind};
use crate::domain::repositories::MetricStorage;
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct FileSnapshotStorage {
    inner: InMemoryStorage,
    path: PathBuf,
    file: Mutex<File>,
    sync_writes: bool,
}

impl FileSnapshotStorage {
    /// Open the snapshot file, replaying its contents first when `restore` is set.
    ///
    /// With `sync_writes` every successful mutation is followed by a flush.
    pub async fn open(
        path: impl AsRef<Path>,
        restore: bool,
        sync_writes: bool,
    ) -> MetricsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = InMemoryStorage::new();

        if restore {
            let restored = Self::restore_into(&inner, &path).await?;
            info!(path = %path.display(), restored, "Restored metrics from snapshot");
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;

        let storage = Self {
            inner,
            path,
            file: Mutex::new(file),
            sync_writes,
        };
        // The handle was opened truncating; put restored state back straight away.
        storage.flush().await?;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn restore_into(inner: &InMemoryStorage, path: &Path) -> MetricsResult<usize> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "Snapshot file not found, starting empty");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(0);
        }

        let records: Vec<Metric> = serde_json::from_str(&raw).map_err(|e| {
            MetricsError::storage(format!("corrupt snapshot {}: {}", path.display(), e))
        })?;

        let mut restored = 0;
        for record in &records {
            if inner.contains(&record.id, record.kind()).await {
                debug!(metric = %record.id, "Skipping duplicate snapshot record");
                continue;
            }
            inner.upsert(record).await?;
            restored += 1;
        }
        Ok(restored)
    }

    async fn after_write(&self) -> MetricsResult<()> {
        if self.sync_writes {
            self.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MetricStorage for FileSnapshotStorage {
    async fn upsert(&self, metric: &Metric) -> MetricsResult<()> {
        self.inner.upsert(metric).await?;
        self.after_write().await
    }

    async fn find(&self, id: &str, kind: MetricKind) -> MetricsResult<Metric> {
        self.inner.find(id, kind).await
    }

    async fn export_all(&self) -> MetricsResult<Vec<Metric>> {
        self.inner.export_all().await
    }

    async fn import_batch(&self, metrics: &[Metric]) -> MetricsResult<()> {
        let applied = self.inner.import_batch(metrics).await;
        // Entries applied before a failure stay applied, so mirror them too.
        self.after_write().await?;
        applied
    }

    async fn ping(&self) -> MetricsResult<()> {
        Ok(())
    }

    async fn flush(&self) -> MetricsResult<()> {
        // Export under the file lock so the last writer also holds the newest state.
        let mut file = self.file.lock().await;
        let metrics = self.inner.export_all().await?;
        let bytes = serde_json::to_vec(&metrics)
            .map_err(|e| MetricsError::storage(format!("snapshot encoding failed: {}", e)))?;

        file.set_len(0).await?;
        file.seek(SeekFrom::Start(0)).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_data().await?;

        debug!(path = %self.path.display(), count = metrics.len(), "Snapshot written");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}
