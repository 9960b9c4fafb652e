use metricflow::domain::errors::MetricsError;
use metricflow::domain::metric::{Metric, MetricKind, MetricValue};
use metricflow::domain::repositories::MetricStorage;
use metricflow::infrastructure::core::RetryPolicy;
use metricflow::infrastructure::persistence::Database;
use metricflow::infrastructure::repositories::InMemoryKeyValueStore;
use metricflow::infrastructure::{FileSnapshotStorage, InMemoryStorage, KeyValueStorage, SqlStorage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn sql_storage(dir: &Path) -> SqlStorage {
    let db = Database::connect(
        &dir.join("metrics.db").to_string_lossy(),
        RetryPolicy::new(1, Duration::from_millis(1)),
    )
    .await
    .unwrap();
    SqlStorage::new(db.pool)
}

/// One fresh instance of every backend, each rooted in its own directory.
async fn every_backend(dir: &Path) -> Vec<Arc<dyn MetricStorage>> {
    let file_dir = dir.join("file");
    let sql_dir = dir.join("sql");
    std::fs::create_dir_all(&sql_dir).unwrap();

    vec![
        Arc::new(InMemoryStorage::new()),
        Arc::new(
            FileSnapshotStorage::open(file_dir.join("metrics.json"), false, false)
                .await
                .unwrap(),
        ),
        Arc::new(sql_storage(&sql_dir).await),
        Arc::new(KeyValueStorage::new(InMemoryKeyValueStore::new())),
    ]
}

#[tokio::test]
async fn test_counter_upserts_accumulate_on_every_backend() {
    let dir = TempDir::new().unwrap();
    for storage in every_backend(dir.path()).await {
        storage.upsert(&Metric::counter("hits", 5)).await.unwrap();
        storage.upsert(&Metric::counter("hits", 5)).await.unwrap();

        let hits = storage.find("hits", MetricKind::Counter).await.unwrap();
        assert_eq!(hits.value, MetricValue::Counter(10), "{}", storage.backend());
    }
}

#[tokio::test]
async fn test_gauge_last_write_wins_on_every_backend() {
    let dir = TempDir::new().unwrap();
    for storage in every_backend(dir.path()).await {
        storage.upsert(&Metric::gauge("temp", 36.6)).await.unwrap();
        storage.upsert(&Metric::gauge("temp", 37.1)).await.unwrap();

        let temp = storage.find("temp", MetricKind::Gauge).await.unwrap();
        assert_eq!(temp.value, MetricValue::Gauge(37.1), "{}", storage.backend());
    }
}

#[tokio::test]
async fn test_batch_duplicates_merge_on_every_backend() {
    let dir = TempDir::new().unwrap();
    for storage in every_backend(dir.path()).await {
        storage
            .import_batch(&[Metric::counter("a", 3), Metric::counter("a", 4)])
            .await
            .unwrap();

        let a = storage.find("a", MetricKind::Counter).await.unwrap();
        assert_eq!(a.value, MetricValue::Counter(7), "{}", storage.backend());
    }
}

#[tokio::test]
async fn test_missing_metric_is_not_found_on_every_backend() {
    let dir = TempDir::new().unwrap();
    for storage in every_backend(dir.path()).await {
        storage.upsert(&Metric::gauge("x", 1.0)).await.unwrap();
        let err = storage.find("x", MetricKind::Counter).await.unwrap_err();
        assert!(
            matches!(err, MetricsError::NotFound { .. }),
            "{}: {:?}",
            storage.backend(),
            err
        );
    }
}

#[tokio::test]
async fn test_export_import_round_trip_on_every_backend() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let sources = every_backend(source_dir.path()).await;
    let targets = every_backend(target_dir.path()).await;

    for (source, target) in sources.into_iter().zip(targets) {
        source
            .import_batch(&[
                Metric::gauge("temp", 36.6),
                Metric::counter("hits", 12),
                Metric::gauge("hits", 0.5),
            ])
            .await
            .unwrap();

        target
            .import_batch(&source.export_all().await.unwrap())
            .await
            .unwrap();

        let mut expected = source.export_all().await.unwrap();
        let mut actual = target.export_all().await.unwrap();
        let by_key = |a: &Metric, b: &Metric| a.key().cmp(&b.key());
        expected.sort_by(by_key);
        actual.sort_by(by_key);
        assert_eq!(actual, expected, "{}", source.backend());
    }
}

#[tokio::test]
async fn test_file_snapshot_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");

    let before = {
        let storage = FileSnapshotStorage::open(&path, true, false).await.unwrap();
        storage
            .import_batch(&[Metric::gauge("temp", 36.6), Metric::counter("hits", 3)])
            .await
            .unwrap();
        storage.flush().await.unwrap();
        let mut all = storage.export_all().await.unwrap();
        all.sort_by(|a, b| a.key().cmp(&b.key()));
        all
    };

    let reopened = FileSnapshotStorage::open(&path, true, false).await.unwrap();
    let mut after = reopened.export_all().await.unwrap();
    after.sort_by(|a, b| a.key().cmp(&b.key()));
    assert_eq!(after, before);
}

/// 20 writers each add 1 five times to the same counter.
async fn increment_concurrently(storage: Arc<dyn MetricStorage>) -> MetricValue {
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let storage = storage.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..5 {
                storage.upsert(&Metric::counter("hits", 1)).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    storage.find("hits", MetricKind::Counter).await.unwrap().value
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sql_concurrent_increments_converge_to_exact_sum() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(sql_storage(dir.path()).await);
    assert_eq!(increment_concurrently(storage).await, MetricValue::Counter(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_memory_concurrent_increments_converge_to_exact_sum() {
    let storage = Arc::new(InMemoryStorage::new());
    assert_eq!(increment_concurrently(storage).await, MetricValue::Counter(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_concurrent_increments_converge_to_exact_sum() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");
    let storage = Arc::new(FileSnapshotStorage::open(&path, false, true).await.unwrap());
    assert_eq!(increment_concurrently(storage).await, MetricValue::Counter(100));

    // Every synchronous write left a complete snapshot behind.
    let reopened = FileSnapshotStorage::open(&path, true, false).await.unwrap();
    let hits = reopened.find("hits", MetricKind::Counter).await.unwrap();
    assert_eq!(hits.value, MetricValue::Counter(100));
}

#[tokio::test]
async fn test_key_value_concurrent_increments_can_lose_updates() {
    let storage = KeyValueStorage::new(InMemoryKeyValueStore::with_latency(Duration::from_millis(20)));

    let first = Metric::counter("hits", 5);
    let second = Metric::counter("hits", 5);
    let (a, b) = tokio::join!(storage.upsert(&first), storage.upsert(&second));
    a.unwrap();
    b.unwrap();

    let MetricValue::Counter(total) = storage.find("hits", MetricKind::Counter).await.unwrap().value
    else {
        panic!("counter expected");
    };
    assert!(total < 10, "read-modify-write race did not occur: {}", total);
}
