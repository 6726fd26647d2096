//! File-snapshot storage backend
//!
//! Wraps the in-memory backend with a durable JSON snapshot of the
//! full state. The snapshot is written to a temp path and renamed into
//! place, so a crash mid-save leaves either the old or the new file
//! intact, never a torn one.
//!
//! Save triggers:
//! - `sync_save = true` (store interval 0): every successful `add`
//!   writes a snapshot before returning
//! - otherwise: the server binary drives periodic saves and one final
//!   save on shutdown

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::backend::StorageBackend;
use super::error::StorageResult;
use super::memory::MemoryBackend;
use crate::{MetricKind, MetricPayload};

/// On-disk snapshot format.
///
/// Values are stored as native JSON numbers; serde_json renders f64
/// with the shortest round-tripping decimal, so a load after save
/// reproduces the exact numeric state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// In-memory backend with on-demand durable snapshots
pub struct FileBackend {
    inner: MemoryBackend,
    path: PathBuf,
    sync_save: bool,
}

impl FileBackend {
    /// Create a file-snapshot backend writing to `path`.
    ///
    /// With `sync_save` set, every successful `add` also writes a
    /// snapshot before returning, trading latency for durability.
    pub fn new(path: impl Into<PathBuf>, sync_save: bool) -> Self {
        Self {
            inner: MemoryBackend::new(),
            path: path.into(),
            sync_save,
        }
    }

    /// Serialize the full current state to the snapshot file.
    ///
    /// Writes to `<path>.tmp` first, then renames over the target.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn save_to_file(&self) -> StorageResult<()> {
        let (gauges, counters) = self.inner.export().await;
        let snapshot = Snapshot { gauges, counters };
        let data = serde_json::to_vec(&snapshot)?;

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &data).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!("snapshot written ({} bytes)", data.len());
        Ok(())
    }

    /// Load a snapshot and merge it into the in-memory maps.
    ///
    /// Intended for startup only. A missing file is not an error: the
    /// backend just starts empty.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load_from_file(&self) -> StorageResult<()> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no snapshot file, starting empty");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&data)?;
        let restored = snapshot.gauges.len() + snapshot.counters.len();
        self.inner.import(snapshot.gauges, snapshot.counters).await;

        info!("restored {} metrics from snapshot", restored);
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn add(&self, kind: MetricKind, name: &str, raw: &str) -> StorageResult<()> {
        self.inner.add(kind, name, raw).await?;
        if self.sync_save {
            self.save_to_file().await?;
        }
        Ok(())
    }

    async fn get(&self, kind: MetricKind, name: &str) -> StorageResult<String> {
        self.inner.get(kind, name).await
    }

    async fn get_all(&self) -> StorageResult<HashMap<String, String>> {
        self.inner.get_all().await
    }

    /// Same best-effort semantics as the in-memory batch; one snapshot
    /// is written after the whole batch when sync saving is on.
    async fn add_batch(&self, metrics: &[MetricPayload]) -> StorageResult<()> {
        self.inner.add_batch(metrics).await?;
        if self.sync_save {
            self.save_to_file().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn snapshot_round_trip_reproduces_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let backend = FileBackend::new(&path, false);
        backend
            .add(MetricKind::Gauge, "Heap", "123.45")
            .await
            .unwrap();
        backend
            .add(MetricKind::Gauge, "Frac", "0.000003814697265625")
            .await
            .unwrap();
        backend.add(MetricKind::Counter, "Poll", "41").await.unwrap();
        backend.add(MetricKind::Counter, "Poll", "1").await.unwrap();
        backend.save_to_file().await.unwrap();

        let restored = FileBackend::new(&path, false);
        restored.load_from_file().await.unwrap();

        assert_eq!(
            restored.get_all().await.unwrap(),
            backend.get_all().await.unwrap()
        );
        assert_eq!(
            restored.get(MetricKind::Counter, "Poll").await.unwrap(),
            "42"
        );
    }

    #[tokio::test]
    async fn missing_snapshot_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("absent.json"), false);

        backend.load_from_file().await.unwrap();
        assert!(backend.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_save_writes_after_every_add() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let backend = FileBackend::new(&path, true);
        backend
            .add(MetricKind::Gauge, "Heap", "1.5")
            .await
            .unwrap();

        // A fresh backend sees the value without an explicit save.
        let restored = FileBackend::new(&path, false);
        restored.load_from_file().await.unwrap();
        assert_eq!(restored.get(MetricKind::Gauge, "Heap").await.unwrap(), "1.5");
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let backend = FileBackend::new(&path, false);
        backend.add(MetricKind::Gauge, "Heap", "1").await.unwrap();
        backend.save_to_file().await.unwrap();
        backend.add(MetricKind::Gauge, "Heap", "2").await.unwrap();
        backend.save_to_file().await.unwrap();

        let restored = FileBackend::new(&path, false);
        restored.load_from_file().await.unwrap();
        assert_eq!(restored.get(MetricKind::Gauge, "Heap").await.unwrap(), "2");

        // No stray temp file left behind.
        assert!(!path.with_extension("tmp").exists());
    }
}
