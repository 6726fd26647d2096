//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::{MetricKind, MetricPayload};

/// Trait for metric storage backends
///
/// All backends (in-memory, file-snapshot, SQL) implement this trait
/// and expose identical merge semantics:
///
/// - **Gauge**: each write replaces the stored value
/// - **Counter**: each write adds its delta to the stored total
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; a single instance is shared
/// by every request-handling task for the process lifetime.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>`. Validation errors
/// (`UnsupportedKind`, `InvalidValue`) are raised before any backend
/// state is touched.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Apply a single metric update.
    ///
    /// `raw` is parsed according to `kind` before the write: a float
    /// for gauges, a signed integer for counters. Transient storage
    /// faults are retried internally by backends with an external
    /// dependency; only an exhausted retry schedule surfaces as
    /// `Unavailable`.
    async fn add(&self, kind: MetricKind, name: &str, raw: &str) -> StorageResult<()>;

    /// Fetch the current value for a key, formatted as a canonical
    /// decimal string.
    ///
    /// Returns `NotFound` if the key has never been written.
    async fn get(&self, kind: MetricKind, name: &str) -> StorageResult<String>;

    /// Full snapshot of the current state as name → formatted value.
    ///
    /// The snapshot is consistent enough for listing purposes; it is
    /// not required to be linearizable with concurrent writers.
    async fn get_all(&self) -> StorageResult<HashMap<String, String>>;

    /// Liveness probe.
    ///
    /// Backends without an external dependency report success
    /// trivially.
    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Apply an ordered sequence of metric updates.
    ///
    /// Atomicity is backend-specific: the SQL backend commits the
    /// whole batch in one transaction or rolls it all back, while the
    /// in-memory path applies items one by one and stops at the first
    /// failure, leaving earlier items applied. Callers must not assume
    /// all-or-nothing behavior unless they know the active backend.
    async fn add_batch(&self, metrics: &[MetricPayload]) -> StorageResult<()>;
}
