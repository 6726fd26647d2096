//! Storage backends for metric persistence
//!
//! This module provides a trait-based abstraction for storing gauge
//! and counter metrics to interchangeable backends.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` lets the server swap
//!   implementations behind one contract
//! - **Async**: all operations are async for compatibility with Tokio
//! - **Identical semantics**: merge rules and validation behave the
//!   same regardless of backend
//!
//! ## Backends
//!
//! - **In-memory**: lock-guarded maps, process-lifetime only
//! - **File-snapshot**: in-memory plus periodic/on-demand JSON
//!   snapshots with restore at startup
//! - **SQL**: sqlx-backed tables with atomic upserts, transactional
//!   batches, and bounded retry on transient connection faults
//!
//! Exactly one backend is active per process, selected once at
//! startup: SQL if a DSN is configured, else file-snapshot if a path
//! is configured, else in-memory.

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;
mod retry;
pub mod sql;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use sql::SqlBackend;
