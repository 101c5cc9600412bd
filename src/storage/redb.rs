//! redb storage engine implementation.
//!
//! This module provides the primary storage backend for DocSearch using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Features
//!
//! - ACID transactions with MVCC
//! - Single-writer, multiple-reader concurrency
//! - Automatic crash recovery
//! - File-backed or in-memory
//!
//! # File Layout
//!
//! When you open a database at `./docs.db`, redb creates a single file.
//! Several indexes can share one file as long as their names and key
//! prefixes differ.

use std::path::{Path, PathBuf};

use ::redb::backends::InMemoryBackend;
use ::redb::{Database, DatabaseError, Durability, ReadableTable, WriteTransaction};
use tracing::{debug, info, instrument, warn};

use super::schema::{
    decode_embedding, document_key, encode_embedding, DocumentRecord, IndexMetadata,
    DOCUMENTS_TABLE, EMBEDDINGS_TABLE, GRAPH_TABLE, METADATA_TABLE, SCHEMA_VERSION,
};
use super::StorageEngine;
use crate::config::{Config, SyncMode};
use crate::error::{DocSearchError, NotFoundError, Result, StorageError};
use crate::types::DocumentId;
use crate::vector::{DistanceMetric, GraphSnapshot};

/// redb storage engine wrapper.
///
/// Holds the database handle and the identity of the index it serves.
///
/// # Thread Safety
///
/// `RedbStorage` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers.
#[derive(Debug)]
pub struct RedbStorage {
    /// The redb database handle.
    db: Database,

    /// Path to the database file (`None` when in memory).
    path: Option<PathBuf>,

    /// Index this storage reads and writes.
    index_name: String,

    /// Prefix of document keys.
    key_prefix: String,

    /// Durability applied to every write transaction.
    sync_mode: SyncMode,
}

impl RedbStorage {
    /// Opens or creates a database at the given path.
    ///
    /// Only opens the file and makes sure the tables exist. The index
    /// itself is created or validated by [`StorageEngine::create_or_open`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is corrupted
    /// - The database is locked by another process
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use docsearch::{Config, storage::RedbStorage};
    ///
    /// let storage = RedbStorage::open("./docs.db", &Config::default())?;
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        debug!(db_exists = path.exists(), "Opening storage engine");

        let db = Database::builder().create(path).map_err(|e| match e {
            DatabaseError::DatabaseAlreadyOpen => StorageError::DatabaseLocked,
            other => StorageError::Redb(other.to_string()),
        })?;

        Self::init(db, Some(path.to_path_buf()), config)
    }

    /// Creates a storage engine backed by memory only.
    ///
    /// Nothing survives the process; useful for tests and ephemeral indexes.
    pub fn in_memory(config: &Config) -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(StorageError::from)?;
        Self::init(db, None, config)
    }

    fn init(db: Database, path: Option<PathBuf>, config: &Config) -> Result<Self> {
        let storage = Self {
            db,
            path,
            index_name: config.index_name.clone(),
            key_prefix: config.key_prefix.clone(),
            sync_mode: config.sync_mode,
        };

        // Tables are created on first open inside a write transaction
        let write_txn = storage.begin_write()?;
        {
            let _ = write_txn.open_table(METADATA_TABLE)?;
            let _ = write_txn.open_table(DOCUMENTS_TABLE)?;
            let _ = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let _ = write_txn.open_table(GRAPH_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(index = %storage.index_name, "Storage engine ready");
        Ok(storage)
    }

    /// Returns a reference to the underlying redb database.
    #[inline]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    /// Begins a write transaction with the configured durability.
    fn begin_write(&self) -> Result<WriteTransaction> {
        let mut txn = self.db.begin_write().map_err(StorageError::from)?;
        txn.set_durability(match self.sync_mode {
            SyncMode::Normal => Durability::Immediate,
            SyncMode::Fast => Durability::Eventual,
            SyncMode::Paranoid => Durability::Paranoid,
        });
        Ok(txn)
    }

    fn key(&self, id: &str) -> String {
        document_key(&self.key_prefix, id)
    }

    /// Reads and decodes this index's metadata from an open table.
    fn read_metadata<T>(&self, table: &T) -> Result<Option<IndexMetadata>>
    where
        T: ReadableTable<&'static str, &'static [u8]>,
    {
        match table.get(self.index_name.as_str())? {
            Some(bytes) => {
                let metadata = bincode::deserialize::<IndexMetadata>(bytes.value()).map_err(|e| {
                    StorageError::corrupted(format!("Invalid metadata format: {}", e))
                })?;
                Ok(Some(metadata))
            }
            None => Ok(None),
        }
    }

    /// Sets `store_version` on the index metadata inside `txn`.
    fn record_version(&self, txn: &WriteTransaction, store_version: u64) -> Result<()> {
        let mut table = txn.open_table(METADATA_TABLE)?;
        let mut metadata = self
            .read_metadata(&table)?
            .ok_or_else(|| NotFoundError::index(&self.index_name))?;
        metadata.store_version = store_version;
        let bytes = bincode::serialize(&metadata)?;
        table.insert(self.index_name.as_str(), bytes.as_slice())?;
        Ok(())
    }
}

impl StorageEngine for RedbStorage {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[instrument(skip(self), fields(index = %self.index_name))]
    fn create_or_open(&self, dimension: usize, metric: DistanceMetric) -> Result<IndexMetadata> {
        let write_txn = self.begin_write()?;
        let metadata = {
            let mut table = write_txn.open_table(METADATA_TABLE)?;
            let metadata = match self.read_metadata(&table)? {
                Some(mut existing) => {
                    if !existing.is_compatible() {
                        warn!(
                            expected = SCHEMA_VERSION,
                            found = existing.schema_version,
                            "Schema version mismatch"
                        );
                        return Err(StorageError::SchemaVersionMismatch {
                            expected: SCHEMA_VERSION,
                            found: existing.schema_version,
                        }
                        .into());
                    }
                    if existing.dimension as usize != dimension {
                        warn!(stored = existing.dimension, requested = dimension, "Dimension conflict");
                        return Err(DocSearchError::config_conflict(
                            "dimension",
                            existing.dimension,
                            dimension,
                        ));
                    }
                    if existing.metric != metric {
                        warn!(stored = %existing.metric, requested = %metric, "Metric conflict");
                        return Err(DocSearchError::config_conflict(
                            "metric",
                            existing.metric,
                            metric,
                        ));
                    }
                    if existing.key_prefix != self.key_prefix {
                        return Err(DocSearchError::config_conflict(
                            "key_prefix",
                            &existing.key_prefix,
                            &self.key_prefix,
                        ));
                    }
                    existing.touch();
                    info!(
                        dimension,
                        metric = %metric,
                        store_version = existing.store_version,
                        "Opened existing index"
                    );
                    existing
                }
                None => {
                    info!(dimension, metric = %metric, "Creating index");
                    IndexMetadata::new(&self.index_name, dimension, metric, &self.key_prefix)
                }
            };
            let bytes = bincode::serialize(&metadata)?;
            table.insert(self.index_name.as_str(), bytes.as_slice())?;
            metadata
        };
        write_txn.commit().map_err(StorageError::from)?;
        Ok(metadata)
    }

    fn metadata(&self) -> Result<Option<IndexMetadata>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(METADATA_TABLE)?;
        self.read_metadata(&table)
    }

    #[instrument(skip(self))]
    fn close(self: Box<Self>) -> Result<()> {
        info!("Closing storage engine");

        // Eventual commits only become durable behind an immediate one
        if self.sync_mode.is_fast() {
            let mut txn = self.db.begin_write().map_err(StorageError::from)?;
            txn.set_durability(Durability::Immediate);
            txn.commit().map_err(StorageError::from)?;
        }

        drop(self.db);

        info!("Storage engine closed");
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Documents
    // =========================================================================

    fn put_document(&self, record: &DocumentRecord, vector: &[f32]) -> Result<()> {
        let key = self.key(record.id.as_str());
        let record_bytes = bincode::serialize(record)?;
        let vector_bytes = encode_embedding(vector);

        let write_txn = self.begin_write()?;
        {
            let mut docs = write_txn.open_table(DOCUMENTS_TABLE)?;
            docs.insert(key.as_str(), record_bytes.as_slice())?;
        }
        {
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.insert(key.as_str(), vector_bytes.as_slice())?;
        }
        self.record_version(&write_txn, record.seq)?;
        write_txn.commit().map_err(StorageError::from)?;

        debug!(id = %record.id, seq = record.seq, "Document saved");
        Ok(())
    }

    fn delete_document(&self, id: &DocumentId, store_version: u64) -> Result<bool> {
        let key = self.key(id.as_str());

        let write_txn = self.begin_write()?;
        let existed = {
            let mut docs = write_txn.open_table(DOCUMENTS_TABLE)?;
            let existed = docs.remove(key.as_str())?.is_some();
            existed
        };
        {
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.remove(key.as_str())?;
        }
        if existed {
            self.record_version(&write_txn, store_version)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(id = %id, existed, "Document deleted");
        Ok(existed)
    }

    fn get_document(&self, id: &DocumentId) -> Result<Option<(DocumentRecord, Vec<f32>)>> {
        let key = self.key(id.as_str());
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let docs = read_txn.open_table(DOCUMENTS_TABLE)?;
        let embeddings = read_txn.open_table(EMBEDDINGS_TABLE)?;

        let Some(record) = docs.get(key.as_str())? else {
            return Ok(None);
        };
        let record: DocumentRecord = bincode::deserialize(record.value())?;
        let vector = match embeddings.get(key.as_str())? {
            Some(bytes) => decode_embedding(bytes.value())?,
            None => {
                return Err(
                    StorageError::corrupted(format!("Missing embedding for '{}'", id)).into(),
                )
            }
        };
        Ok(Some((record, vector)))
    }

    #[instrument(skip(self), fields(index = %self.index_name))]
    fn load_documents(&self) -> Result<Vec<(DocumentRecord, Vec<f32>)>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let docs = read_txn.open_table(DOCUMENTS_TABLE)?;
        let embeddings = read_txn.open_table(EMBEDDINGS_TABLE)?;

        let mut loaded = Vec::new();
        for entry in docs.range(self.key_prefix.as_str()..)? {
            let (key, value) = entry.map_err(StorageError::from)?;
            let key = key.value();
            if !key.starts_with(self.key_prefix.as_str()) {
                break;
            }

            let record: DocumentRecord = bincode::deserialize(value.value()).map_err(|e| {
                StorageError::corrupted(format!("Invalid document record '{}': {}", key, e))
            })?;
            let vector = match embeddings.get(key)? {
                Some(bytes) => decode_embedding(bytes.value())?,
                None => {
                    return Err(StorageError::corrupted(format!(
                        "Missing embedding for '{}'",
                        key
                    ))
                    .into())
                }
            };
            loaded.push((record, vector));
        }

        loaded.sort_by_key(|(record, _)| record.seq);
        debug!(count = loaded.len(), "Documents loaded");
        Ok(loaded)
    }

    // =========================================================================
    // Graph
    // =========================================================================

    fn save_graph(&self, snapshot: &GraphSnapshot) -> Result<()> {
        let bytes = bincode::serialize(snapshot)?;

        let write_txn = self.begin_write()?;
        {
            let mut graph = write_txn.open_table(GRAPH_TABLE)?;
            graph.insert(self.index_name.as_str(), bytes.as_slice())?;
        }
        self.record_version(&write_txn, snapshot.store_version)?;
        write_txn.commit().map_err(StorageError::from)?;

        debug!(
            nodes = snapshot.nodes.len(),
            store_version = snapshot.store_version,
            bytes = bytes.len(),
            "Graph snapshot saved"
        );
        Ok(())
    }

    fn load_graph(&self) -> Result<Option<GraphSnapshot>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let graph = read_txn.open_table(GRAPH_TABLE)?;

        let Some(bytes) = graph.get(self.index_name.as_str())? else {
            return Ok(None);
        };
        match bincode::deserialize::<GraphSnapshot>(bytes.value()) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(error = %e, "Undecodable graph snapshot, ignoring");
                Ok(None)
            }
        }
    }
}
