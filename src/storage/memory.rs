//! In-memory storage backend (no persistence)
//!
//! Two maps (gauge name → float, counter name → integer) behind a
//! single lock. All data is lost on restart; the file-snapshot backend
//! wraps this one to add durability.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use crate::{MetricKind, MetricPayload, MetricValue};

#[derive(Debug, Default)]
struct Maps {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// In-memory storage backend
///
/// Every operation takes the same lock for the duration of its map
/// access; `get_all` copies the full state under the lock so callers
/// never observe partial concurrent mutation.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<Maps>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out the raw numeric state (used by the snapshot backend).
    pub(crate) async fn export(&self) -> (HashMap<String, f64>, HashMap<String, i64>) {
        let state = self.state.lock().await;
        (state.gauges.clone(), state.counters.clone())
    }

    /// Merge raw numeric state into the maps (used on snapshot restore).
    pub(crate) async fn import(&self, gauges: HashMap<String, f64>, counters: HashMap<String, i64>) {
        let mut state = self.state.lock().await;
        state.gauges.extend(gauges);
        state.counters.extend(counters);
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn add(&self, kind: MetricKind, name: &str, raw: &str) -> StorageResult<()> {
        let value = MetricValue::parse(kind, raw)?;

        let mut state = self.state.lock().await;
        match value {
            MetricValue::Gauge(v) => {
                state.gauges.insert(name.to_string(), v);
            }
            MetricValue::Counter(d) => {
                *state.counters.entry(name.to_string()).or_insert(0) += d;
            }
        }
        Ok(())
    }

    async fn get(&self, kind: MetricKind, name: &str) -> StorageResult<String> {
        let state = self.state.lock().await;
        match kind {
            MetricKind::Gauge => state
                .gauges
                .get(name)
                .map(|v| MetricValue::Gauge(*v).format())
                .ok_or_else(|| StorageError::NotFound(name.to_string())),
            MetricKind::Counter => state
                .counters
                .get(name)
                .map(|d| MetricValue::Counter(*d).format())
                .ok_or_else(|| StorageError::NotFound(name.to_string())),
        }
    }

    async fn get_all(&self) -> StorageResult<HashMap<String, String>> {
        let state = self.state.lock().await;

        let mut result = HashMap::with_capacity(state.gauges.len() + state.counters.len());
        for (name, v) in &state.gauges {
            result.insert(name.clone(), MetricValue::Gauge(*v).format());
        }
        for (name, d) in &state.counters {
            result.insert(name.clone(), MetricValue::Counter(*d).format());
        }
        Ok(result)
    }

    /// Best-effort batch: items are applied one by one and the first
    /// failure aborts the loop, leaving earlier items applied. Weaker
    /// than the SQL backend's transactional batch.
    async fn add_batch(&self, metrics: &[MetricPayload]) -> StorageResult<()> {
        for metric in metrics {
            let raw = metric.raw_value()?;
            self.add(metric.kind, &metric.id, &raw).await?;
        }
        debug!("applied batch of {} metrics in memory", metrics.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_accumulates_deltas() {
        let backend = MemoryBackend::new();

        backend.add(MetricKind::Counter, "Poll", "1").await.unwrap();
        backend.add(MetricKind::Counter, "Poll", "1").await.unwrap();

        assert_eq!(backend.get(MetricKind::Counter, "Poll").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn gauge_keeps_last_value() {
        let backend = MemoryBackend::new();

        backend
            .add(MetricKind::Gauge, "Heap", "1.5")
            .await
            .unwrap();
        backend
            .add(MetricKind::Gauge, "Heap", "123.45")
            .await
            .unwrap();

        assert_eq!(
            backend.get(MetricKind::Gauge, "Heap").await.unwrap(),
            "123.45"
        );
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let backend = MemoryBackend::new();

        let err = backend
            .get(MetricKind::Gauge, "Missing")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn kinds_have_separate_name_spaces() {
        let backend = MemoryBackend::new();

        backend.add(MetricKind::Gauge, "X", "1.5").await.unwrap();
        backend.add(MetricKind::Counter, "X", "2").await.unwrap();

        assert_eq!(backend.get(MetricKind::Gauge, "X").await.unwrap(), "1.5");
        assert_eq!(backend.get(MetricKind::Counter, "X").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn invalid_value_leaves_state_untouched() {
        let backend = MemoryBackend::new();

        let err = backend
            .add(MetricKind::Counter, "Poll", "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidValue(_)));
        assert!(backend.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_applies_partially_on_failure() {
        let backend = MemoryBackend::new();

        let batch = vec![
            MetricPayload::counter("Poll", 1),
            MetricPayload {
                id: "Broken".to_string(),
                kind: MetricKind::Gauge,
                value: None,
                delta: None,
            },
            MetricPayload::counter("Never", 1),
        ];

        let err = backend.add_batch(&batch).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidValue(_)));

        // Item before the failure stays applied, items after never run.
        assert_eq!(backend.get(MetricKind::Counter, "Poll").await.unwrap(), "1");
        assert!(backend.get(MetricKind::Counter, "Never").await.is_err());
    }

    #[tokio::test]
    async fn get_all_formats_both_kinds() {
        let backend = MemoryBackend::new();

        backend
            .add(MetricKind::Gauge, "Heap", "123.45")
            .await
            .unwrap();
        backend.add(MetricKind::Counter, "Poll", "7").await.unwrap();

        let all = backend.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["Heap"], "123.45");
        assert_eq!(all["Poll"], "7");
    }
}
