//! SearchEngine: the document index and its lifecycle.
//!
//! The [`SearchEngine`] struct is the primary interface. It owns the three
//! in-memory structures and the storage engine that backs them:
//!
//! - [`VectorStore`]: records and vectors, addressed by slot
//! - [`HnswIndex`]: the graph over those slots
//! - [`TagFilter`]: tag to document ids
//!
//! # Quick Start
//!
//! ```rust
//! use docsearch::{Config, DistanceMetric, DocumentId, NewDocument, Payload, SearchEngine};
//!
//! let engine = SearchEngine::open_in_memory(Config::with_index(3, DistanceMetric::Cosine))?;
//!
//! engine.add_document(NewDocument {
//!     id: DocumentId::parse("a")?,
//!     vector: vec![1.0, 0.0, 0.0],
//!     tag: "ST".into(),
//!     payload: Payload::with_content("first"),
//! })?;
//!
//! let hits = engine.search(&[0.9, 0.1, 0.0], Some("ST"), 3)?;
//! assert_eq!(hits[0].id.as_str(), "a");
//!
//! engine.close()?;
//! # Ok::<(), docsearch::DocSearchError>(())
//! ```
//!
//! # Thread Safety
//!
//! `SearchEngine` is `Send + Sync` and can be shared across threads using
//! `Arc`. Each structure sits behind its own `RwLock`. Locks are always
//! taken in the order store, graph, tags. Writes hold all three write
//! locks and persist before mutating memory, so a failed write leaves
//! both sides unchanged.

use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::document::validation::{validate_new_document, validate_vector};
use crate::document::{Document, NewDocument};
use crate::error::{DocSearchError, Result, ValidationError};
use crate::search::{SearchHit, SearchRequest, TagFilter};
use crate::storage::{open_storage, DocumentRecord, IndexMetadata, RedbStorage, StorageEngine};
use crate::vector::{DistanceMetric, GraphSnapshot, HnswIndex, VectorStore};

/// Point-in-time counters of an engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineStats {
    /// Live documents.
    pub documents: usize,
    /// Distinct tags with at least one document.
    pub tags: usize,
    /// Graph nodes, including tombstones.
    pub nodes: usize,
    /// Tombstoned graph nodes awaiting compaction.
    pub tombstones: usize,
    /// `tombstones / nodes`.
    pub tombstone_ratio: f32,
    /// Mutation counter of the store.
    pub store_version: u64,
    /// Embedding dimension.
    pub dimension: usize,
    /// Similarity metric.
    pub metric: DistanceMetric,
    /// Highest graph layer.
    pub top_layer: usize,
}

struct ReadGuards<'a> {
    store: RwLockReadGuard<'a, VectorStore>,
    index: RwLockReadGuard<'a, HnswIndex>,
    filter: RwLockReadGuard<'a, TagFilter>,
}

struct WriteGuards<'a> {
    store: RwLockWriteGuard<'a, VectorStore>,
    index: RwLockWriteGuard<'a, HnswIndex>,
    filter: RwLockWriteGuard<'a, TagFilter>,
}

/// An embedded, persistent ANN document index.
///
/// Create one with [`SearchEngine::open()`] (file) or
/// [`SearchEngine::open_in_memory()`], and release it with
/// [`SearchEngine::close()`], which writes a final graph snapshot.
pub struct SearchEngine {
    storage: Box<dyn StorageEngine>,
    store: RwLock<VectorStore>,
    index: RwLock<HnswIndex>,
    filter: RwLock<TagFilter>,
    config: Config,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("config", &self.config)
            .field("path", &self.storage.path())
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens or creates an index in the database file at `path`.
    ///
    /// A new index records the configured dimension and metric. An existing
    /// one must match them; its documents are loaded in insertion order and
    /// the graph is restored from its snapshot, or rebuilt when the
    /// snapshot is missing or stale.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid (see [`Config::validate`])
    /// - The database is locked or corrupted
    /// - The stored dimension or metric differs (`ConfigConflict`)
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;
        info!("Opening search engine");
        let storage = open_storage(path, &config)?;
        Self::with_storage(storage, config)
    }

    /// Opens an index backed by memory only.
    pub fn open_in_memory(config: Config) -> Result<Self> {
        config.validate()?;
        let storage = RedbStorage::in_memory(&config)?;
        Self::with_storage(Box::new(storage), config)
    }

    /// Opens an index on an already opened storage engine.
    pub fn with_storage(storage: Box<dyn StorageEngine>, config: Config) -> Result<Self> {
        config.validate()?;
        let dimension = config.dimension();
        let metadata = storage.create_or_open(dimension, config.metric)?;

        let mut store = VectorStore::new(dimension);
        let mut filter = TagFilter::new();
        for (record, vector) in storage.load_documents()? {
            let DocumentRecord {
                id, tag, payload, ..
            } = record;
            filter.add(&tag, id.clone());
            store.put(id, vector, tag, payload)?;
        }
        store.set_version(metadata.store_version.max(store.version()));

        let index = restore_graph(storage.as_ref(), &config, &metadata, &store)?;

        info!(
            documents = store.len(),
            tags = filter.len(),
            dimension,
            metric = %config.metric,
            sync_mode = ?config.sync_mode,
            "Search engine opened"
        );

        Ok(Self {
            storage,
            store: RwLock::new(store),
            index: RwLock::new(index),
            filter: RwLock::new(filter),
            config,
        })
    }

    /// Ensures the index exists with this dimension and metric.
    ///
    /// Idempotent. The engine already called this on open, so it only
    /// fails if the arguments differ from the stored index.
    ///
    /// # Errors
    ///
    /// `ConfigConflict` if the index exists with another dimension or metric.
    pub fn create_or_open(&self, dimension: usize, metric: DistanceMetric) -> Result<()> {
        self.storage.create_or_open(dimension, metric)?;
        Ok(())
    }

    /// Persists a graph snapshot, compacting first if there are tombstones.
    #[instrument(skip(self))]
    pub fn flush(&self) -> Result<()> {
        let mut g = self.write_all()?;
        if g.store.tombstone_count() > 0 {
            self.compact_locked(&mut g)?;
        } else {
            self.save_graph(&g)?;
        }
        Ok(())
    }

    /// Flushes and closes the engine.
    ///
    /// Consumes the engine; the final graph snapshot makes the next open
    /// skip the rebuild.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!("Closing search engine");
        self.flush()?;

        let Self { storage, .. } = self;
        storage.close()?;

        info!("Search engine closed");
        Ok(())
    }

    /// Configuration the engine was opened with.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Persisted index metadata.
    pub fn metadata(&self) -> Result<Option<IndexMetadata>> {
        self.storage.metadata()
    }

    /// Path of the database file, `None` in memory.
    pub fn path(&self) -> Option<&Path> {
        self.storage.path()
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Adds a document, replacing any document with the same id.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if the vector length differs from the index
    /// - `Validation` for an empty tag, non-finite values or oversized payload
    /// - `Storage` if the write fails; memory is left unchanged
    #[instrument(skip(self, doc), fields(id = %doc.id, tag = %doc.tag))]
    pub fn add_document(&self, doc: NewDocument) -> Result<()> {
        validate_new_document(&doc, self.config.dimension())?;

        let mut g = self.write_all()?;
        let record = DocumentRecord {
            seq: g.store.next_version(),
            id: doc.id,
            tag: doc.tag,
            payload: doc.payload,
        };
        self.storage.put_document(&record, &doc.vector)?;

        let DocumentRecord {
            id, tag, payload, ..
        } = record;
        let outcome = g.store.put(id.clone(), doc.vector, tag.clone(), payload)?;
        if let Some(old) = outcome.replaced {
            g.index.delete(old);
            if let Some(old_tag) = g.store.tag_at(old) {
                let old_tag = old_tag.to_string();
                g.filter.remove(&old_tag, &id);
            }
        }
        g.index.insert(outcome.slot, &*g.store)?;
        g.filter.add(&tag, id);

        debug!(slot = outcome.slot, replaced = outcome.replaced.is_some(), "Document added");

        if outcome.replaced.is_some() {
            self.maybe_compact(&mut g)?;
        }
        Ok(())
    }

    /// Deletes a document. Returns false if no such document exists.
    ///
    /// Compacts the graph when the tombstone ratio passes
    /// `compaction_threshold`.
    #[instrument(skip(self))]
    pub fn delete_document(&self, id: &str) -> Result<bool> {
        let mut g = self.write_all()?;
        let Some(slot) = g.store.slot_of(id) else {
            return Ok(false);
        };
        let Some(doc_id) = g.store.id_at(slot).cloned() else {
            return Ok(false);
        };

        self.storage.delete_document(&doc_id, g.store.next_version())?;

        g.store.delete(id);
        g.index.delete(slot);
        if let Some(tag) = g.store.tag_at(slot) {
            let tag = tag.to_string();
            g.filter.remove(&tag, &doc_id);
        }
        debug!(slot, "Document deleted");

        self.maybe_compact(&mut g)?;
        Ok(true)
    }

    /// Returns the live document with this id.
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let store = self
            .store
            .read()
            .map_err(|_| DocSearchError::vector("Vector store lock poisoned"))?;
        Ok(store.get(id))
    }

    /// Number of live documents.
    pub fn len(&self) -> Result<usize> {
        let store = self
            .store
            .read()
            .map_err(|_| DocSearchError::vector("Vector store lock poisoned"))?;
        Ok(store.len())
    }

    /// Returns true if the index holds no documents.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Tags currently carried by at least one document, sorted.
    pub fn tags(&self) -> Result<Vec<String>> {
        let filter = self
            .filter
            .read()
            .map_err(|_| DocSearchError::vector("Tag filter lock poisoned"))?;
        Ok(filter.tags())
    }

    /// Counters describing the engine's current state.
    pub fn stats(&self) -> Result<EngineStats> {
        let g = self.read_all()?;
        Ok(EngineStats {
            documents: g.store.len(),
            tags: g.filter.len(),
            nodes: g.index.node_count(),
            tombstones: g.index.node_count() - g.index.len(),
            tombstone_ratio: g.index.tombstone_ratio(),
            store_version: g.store.version(),
            dimension: g.store.dimension(),
            metric: g.index.metric(),
            top_layer: g.index.top_layer(),
        })
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Returns the `k` documents closest to `query`, optionally within a tag.
    ///
    /// Shorthand for [`search_with`](Self::search_with) with default beam
    /// width and all payload fields.
    pub fn search(&self, query: &[f32], tag: Option<&str>, k: usize) -> Result<Vec<SearchHit>> {
        let mut request = SearchRequest::new(query.to_vec(), k);
        if let Some(tag) = tag {
            request = request.with_tag(tag);
        }
        self.search_with(request)
    }

    /// Runs a similarity search.
    ///
    /// Hits are ordered by similarity, best first; equal distances keep
    /// insertion order. A tag no document carries yields no hits.
    ///
    /// # Errors
    ///
    /// - `InvalidField` if `k` is 0
    /// - `DimensionMismatch` if the query length differs from the index
    pub fn search_with(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        if request.k == 0 {
            return Err(ValidationError::invalid_field("k", "must be at least 1").into());
        }
        validate_vector(&request.vector, self.config.dimension())?;

        let g = self.read_all()?;
        let store = &*g.store;
        // No partition returns more than every live document.
        let k = request.k.min(store.len().max(1));
        let ef = request.ef_search.unwrap_or(self.config.hnsw.ef_search);
        let threshold = self.config.exact_search_threshold;

        let (found, exact) = match request.tag.as_deref() {
            None if store.len() <= threshold => {
                let slots = (0..store.slot_count()).filter(|&s| store.is_live(s));
                (g.index.exact_search(&request.vector, k, slots, store)?, true)
            }
            None => (g.index.search(&request.vector, k, ef, None, store)?, false),
            Some(tag) => {
                let Some(members) = g.filter.members(tag) else {
                    debug!(tag, "No documents carry tag");
                    return Ok(Vec::new());
                };
                if members.len() <= threshold {
                    let slots = members.iter().filter_map(|id| store.slot_of(id.as_str()));
                    (g.index.exact_search(&request.vector, k, slots, store)?, true)
                } else {
                    let accept: &dyn Fn(usize) -> bool = &|slot| {
                        store
                            .id_at(slot)
                            .is_some_and(|id| members.contains(id.as_str()))
                    };
                    (
                        g.index.search(&request.vector, k, ef, Some(accept), store)?,
                        false,
                    )
                }
            }
        };

        let metric = g.index.metric();
        let hits: Vec<SearchHit> = found
            .into_iter()
            .filter_map(|(slot, distance)| {
                Some(SearchHit {
                    id: store.id_at(slot)?.clone(),
                    score: metric.score(distance),
                    distance,
                    tag: store.tag_at(slot)?.to_string(),
                    payload: store.payload_at(slot)?.project(&request.return_fields),
                })
            })
            .collect();

        debug!(k, ef, exact, results = hits.len(), "Search complete");
        Ok(hits)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Removes tombstoned nodes now, regardless of the threshold.
    ///
    /// Returns the number of slots reclaimed.
    #[instrument(skip(self))]
    pub fn compact(&self) -> Result<usize> {
        let mut g = self.write_all()?;
        let reclaimed = g.store.tombstone_count();
        if reclaimed > 0 {
            self.compact_locked(&mut g)?;
        }
        Ok(reclaimed)
    }

    fn maybe_compact(&self, g: &mut WriteGuards<'_>) -> Result<()> {
        let ratio = g.index.tombstone_ratio();
        if ratio > self.config.compaction_threshold {
            debug!(ratio, threshold = self.config.compaction_threshold, "Auto-compacting");
            self.compact_locked(g)?;
        }
        Ok(())
    }

    fn compact_locked(&self, g: &mut WriteGuards<'_>) -> Result<()> {
        let before = g.store.slot_count();
        let remap = g.store.compact();
        g.index.compact(&remap, &*g.store)?;
        info!(before, after = g.store.slot_count(), "Index compacted");
        self.save_graph(g)
    }

    fn save_graph(&self, g: &WriteGuards<'_>) -> Result<()> {
        let snapshot = g.index.snapshot(g.store.version());
        self.storage.save_graph(&snapshot)
    }

    fn read_all(&self) -> Result<ReadGuards<'_>> {
        Ok(ReadGuards {
            store: self
                .store
                .read()
                .map_err(|_| DocSearchError::vector("Vector store lock poisoned"))?,
            index: self
                .index
                .read()
                .map_err(|_| DocSearchError::vector("Graph lock poisoned"))?,
            filter: self
                .filter
                .read()
                .map_err(|_| DocSearchError::vector("Tag filter lock poisoned"))?,
        })
    }

    fn write_all(&self) -> Result<WriteGuards<'_>> {
        Ok(WriteGuards {
            store: self
                .store
                .write()
                .map_err(|_| DocSearchError::vector("Vector store lock poisoned"))?,
            index: self
                .index
                .write()
                .map_err(|_| DocSearchError::vector("Graph lock poisoned"))?,
            filter: self
                .filter
                .write()
                .map_err(|_| DocSearchError::vector("Tag filter lock poisoned"))?,
        })
    }
}

/// Restores the graph from its snapshot, or rebuilds it from the store.
///
/// A snapshot is used only when it was taken at the persisted store version
/// over exactly the loaded documents with the same metric and `m`.
fn restore_graph(
    storage: &dyn StorageEngine,
    config: &Config,
    metadata: &IndexMetadata,
    store: &VectorStore,
) -> Result<HnswIndex> {
    match storage.load_graph()? {
        Some(snapshot) if snapshot_matches(&snapshot, config, metadata, store) => {
            match HnswIndex::from_snapshot(snapshot) {
                Ok(index) => {
                    debug!(nodes = index.node_count(), "Graph restored from snapshot");
                    return Ok(index);
                }
                Err(e) => warn!(error = %e, "Unusable graph snapshot, rebuilding"),
            }
        }
        Some(snapshot) => warn!(
            snapshot_version = snapshot.store_version,
            store_version = metadata.store_version,
            snapshot_nodes = snapshot.nodes.len(),
            documents = store.len(),
            "Stale graph snapshot, rebuilding"
        ),
        None if !store.is_empty() => warn!("No graph snapshot, rebuilding"),
        None => {}
    }

    let index = HnswIndex::build(config.metric, config.hnsw.clone(), store, |slot| {
        store.is_live(slot)
    })?;
    if !store.is_empty() {
        info!(nodes = index.node_count(), "Graph rebuilt");
        storage.save_graph(&index.snapshot(store.version()))?;
    }
    Ok(index)
}

fn snapshot_matches(
    snapshot: &GraphSnapshot,
    config: &Config,
    metadata: &IndexMetadata,
    store: &VectorStore,
) -> bool {
    snapshot.store_version == metadata.store_version
        && snapshot.nodes.len() == store.slot_count()
        && snapshot.metric == config.metric
        && snapshot.config.m == config.hnsw.m
}
