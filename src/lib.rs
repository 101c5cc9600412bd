//! # DocSearch
//!
//! Embedded document store with tag-filtered approximate nearest neighbor
//! search.
//!
//! DocSearch keeps `(id, vector, tag, payload)` records in a redb file,
//! indexes the vectors in an HNSW graph, and answers top-K similarity
//! queries, optionally restricted to one tag.
//!
//! ## Quick Start
//!
//! ```rust
//! use docsearch::{Config, DistanceMetric, DocumentId, NewDocument, Payload, SearchEngine};
//!
//! let engine = SearchEngine::open_in_memory(Config::with_index(3, DistanceMetric::Cosine))?;
//!
//! engine.add_document(NewDocument {
//!     id: DocumentId::parse("a")?,
//!     vector: vec![1.0, 0.0, 0.0],
//!     tag: "t".into(),
//!     payload: Payload::with_content("first document"),
//! })?;
//! engine.add_document(NewDocument {
//!     id: DocumentId::parse("b")?,
//!     vector: vec![0.0, 1.0, 0.0],
//!     tag: "t".into(),
//!     payload: Payload::default(),
//! })?;
//!
//! let hits = engine.search(&[0.9, 0.1, 0.0], Some("t"), 1)?;
//! assert_eq!(hits[0].id.as_str(), "a");
//! assert!(hits[0].score > 0.99);
//! # Ok::<(), docsearch::DocSearchError>(())
//! ```
//!
//! ## Key Concepts
//!
//! ### Tags
//!
//! Every document carries one tag. A search with a tag only returns
//! documents carrying it; a tag nobody carries returns nothing. Pass
//! `None` to search everything.
//!
//! ### Deletion
//!
//! Deleting or replacing a document tombstones its graph node. Tombstones
//! still route searches but are never returned, and are reclaimed by
//! compaction once they pass `Config::compaction_threshold`.
//!
//! ### Embedding Providers
//!
//! - **External** (default): callers supply vectors
//! - **Hashing**: a deterministic bag-of-words embedder, no model needed
//!
//! ## Features
//!
//! - `http` - axum router and the `docsearch-server` binary
//!
//! ## Thread Safety
//!
//! `SearchEngine` is `Send + Sync` and can be shared across threads using
//! `Arc`. Searches run concurrently; writes are exclusive.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod engine;
mod error;
mod types;

pub mod api;
pub mod document;
pub mod embedding;
pub mod extract;
pub mod search;
pub mod storage;

/// Vector storage and HNSW approximate nearest neighbor search.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main engine interface
pub use engine::{EngineStats, SearchEngine};

// Configuration
pub use config::{Config, EmbeddingDimension, EmbeddingProvider, HnswConfig, SyncMode};

// Error handling
pub use error::{DocSearchError, NotFoundError, Result, StorageError, ValidationError};

// Core types
pub use types::{DocumentId, Embedding, Timestamp, MAX_ID_LENGTH};

// Documents
pub use document::{Document, NewDocument, Payload, ReturnFields, SourceRef};

// Search
pub use search::{SearchHit, SearchRequest, TagFilter, DEFAULT_K};

// Vector index
pub use vector::{DistanceMetric, HnswIndex, VectorStore};

// Storage (for advanced users)
pub use storage::IndexMetadata;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common DocSearch usage.
///
/// ```rust
/// use docsearch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, EmbeddingDimension, SyncMode};
    pub use crate::document::{NewDocument, Payload, ReturnFields};
    pub use crate::engine::SearchEngine;
    pub use crate::error::{DocSearchError, Result};
    pub use crate::search::{SearchHit, SearchRequest};
    pub use crate::types::DocumentId;
    pub use crate::vector::DistanceMetric;
}
