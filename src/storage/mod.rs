//! Storage layer abstractions for DocSearch.
//!
//! This module provides a trait-based abstraction over the storage engine,
//! allowing different backends to be used (e.g., redb on disk, redb in
//! memory for tests).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SearchEngine                             │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │   StorageEngine     │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                         ▲                                    │
//! │                         │                                    │
//! │                 ┌───────┴───────┐                            │
//! │                 │  RedbStorage  │                            │
//! │                 └───────────────┘                            │
//! │                (file or in-memory)                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Documents and embeddings are the source of truth. The graph snapshot
//! is an accelerator: when it is missing or stale the engine rebuilds the
//! graph from the stored embeddings.

pub mod redb;
pub mod schema;

pub use self::redb::RedbStorage;
pub use schema::{DocumentRecord, IndexMetadata, SCHEMA_VERSION};

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::types::DocumentId;
use crate::vector::{DistanceMetric, GraphSnapshot};

/// Storage engine trait for DocSearch.
///
/// A storage instance is bound to one index (name and key prefix come
/// from [`Config`]). Every write commits its own transaction.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. The engine serializes writers
/// itself; readers may run concurrently.
pub trait StorageEngine: Send + Sync {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates the index metadata if absent, otherwise checks it.
    ///
    /// Runs as a single write transaction, so concurrent callers cannot
    /// both create the index.
    ///
    /// # Errors
    ///
    /// - `ConfigConflict` if the stored dimension, metric or key prefix
    ///   differs from the requested one
    /// - `SchemaVersionMismatch` if the index was written by another schema
    fn create_or_open(&self, dimension: usize, metric: DistanceMetric) -> Result<IndexMetadata>;

    /// Returns the index metadata, or `None` if the index was never created.
    fn metadata(&self) -> Result<Option<IndexMetadata>>;

    /// Closes the storage engine, flushing any pending writes.
    fn close(self: Box<Self>) -> Result<()>;

    /// Returns the path to the database file, if applicable.
    fn path(&self) -> Option<&Path>;

    // =========================================================================
    // Documents
    // =========================================================================

    /// Writes a document and its embedding, and records `record.seq` as the
    /// index's store version. One transaction.
    fn put_document(&self, record: &DocumentRecord, vector: &[f32]) -> Result<()>;

    /// Removes a document and its embedding, recording `store_version`.
    ///
    /// Returns `false` if the document did not exist.
    fn delete_document(&self, id: &DocumentId, store_version: u64) -> Result<bool>;

    /// Reads one document and its embedding.
    fn get_document(&self, id: &DocumentId) -> Result<Option<(DocumentRecord, Vec<f32>)>>;

    /// Reads every document of the index, ordered by `seq`.
    fn load_documents(&self) -> Result<Vec<(DocumentRecord, Vec<f32>)>>;

    // =========================================================================
    // Graph
    // =========================================================================

    /// Writes a graph snapshot and records its store version.
    fn save_graph(&self, snapshot: &GraphSnapshot) -> Result<()>;

    /// Reads the graph snapshot.
    ///
    /// An undecodable snapshot reads as `None`; the graph can always be
    /// rebuilt.
    fn load_graph(&self) -> Result<Option<GraphSnapshot>>;
}

/// Opens a storage engine at the given path.
///
/// This is a convenience function that creates a [`RedbStorage`] instance.
/// For more control, use `RedbStorage::open()` directly.
///
/// # Errors
///
/// Returns an error if:
/// - The database file is corrupted
/// - The database is locked by another process
pub fn open_storage(path: impl AsRef<Path>, config: &Config) -> Result<Box<dyn StorageEngine>> {
    let storage = RedbStorage::open(path, config)?;
    Ok(Box::new(storage))
}
