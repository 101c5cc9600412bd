//! Database schema definitions and versioning.
//!
//! This module defines the table structure for the redb storage engine.
//! All table definitions are compile-time constants to ensure consistency.
//!
//! # Schema Versioning
//!
//! Every index records the schema version it was written with. Opening an
//! index written by a different version fails; there is no migration.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str (index name)                                     │
//! │   Value: &[u8] (bincode IndexMetadata)                       │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ DOCUMENTS_TABLE                                              │
//! │   Key: &str (key prefix + document id, e.g. "doc:a/b.txt")   │
//! │   Value: &[u8] (bincode DocumentRecord)                      │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ EMBEDDINGS_TABLE                                             │
//! │   Key: &str (same key as DOCUMENTS_TABLE)                    │
//! │   Value: &[u8] (raw little-endian f32, dimension * 4 bytes)  │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ GRAPH_TABLE                                                  │
//! │   Key: &str (index name)                                     │
//! │   Value: &[u8] (bincode GraphSnapshot)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::document::Payload;
use crate::error::StorageError;
use crate::types::{DocumentId, Timestamp};
use crate::vector::DistanceMetric;

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// An index will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum stored content size in bytes (4 MiB).
pub const MAX_CONTENT_SIZE: usize = 4 * 1024 * 1024;

/// Maximum length of a tag.
pub const MAX_TAG_LENGTH: usize = 100;

/// Maximum number of extra payload fields per document.
pub const MAX_EXTRA_FIELDS: usize = 64;

/// Maximum length of an extra payload field name.
pub const MAX_FIELD_NAME_LENGTH: usize = 128;

// ============================================================================
// Table Definitions
// ============================================================================

/// Index metadata, one entry per index name.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Document records (everything but the vector).
pub const DOCUMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// Embedding vectors.
///
/// Stored separately from documents to keep the main table compact.
pub const EMBEDDINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("embeddings");

/// HNSW graph snapshots, one per index name.
pub const GRAPH_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("graph");

// ============================================================================
// Records
// ============================================================================

/// Index metadata stored in the metadata table.
///
/// Presence of this record is what makes an index "created". Dimension,
/// metric and key prefix are fixed from then on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Name of the index.
    pub index_name: String,

    /// Embedding dimension.
    pub dimension: u32,

    /// Similarity metric.
    pub metric: DistanceMetric,

    /// Prefix of document keys.
    pub key_prefix: String,

    /// Timestamp when the index was created.
    pub created_at: Timestamp,

    /// Last time the index was opened (updated on each open).
    pub last_opened_at: Timestamp,

    /// Version of the in-memory store after the last persisted mutation.
    pub store_version: u64,
}

impl IndexMetadata {
    /// Creates metadata for a fresh index.
    pub fn new(
        index_name: impl Into<String>,
        dimension: usize,
        metric: DistanceMetric,
        key_prefix: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            index_name: index_name.into(),
            dimension: dimension as u32,
            metric,
            key_prefix: key_prefix.into(),
            created_at: now,
            last_opened_at: now,
            store_version: 0,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

/// A persisted document, minus its vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Store version at insertion; orders documents on reload.
    pub seq: u64,

    /// Document id.
    pub id: DocumentId,

    /// Tag.
    pub tag: String,

    /// Stored fields.
    pub payload: Payload,
}

// ============================================================================
// Encoding Helpers
// ============================================================================

/// Builds the storage key of a document.
#[inline]
pub fn document_key(prefix: &str, id: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + id.len());
    key.push_str(prefix);
    key.push_str(id);
    key
}

/// Encodes an embedding as little-endian f32 bytes.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decodes little-endian f32 bytes.
///
/// # Errors
/// `Corrupted` if the byte length is not a multiple of 4.
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, StorageError> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::corrupted(format!(
            "embedding length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }

    #[test]
    fn test_index_metadata_new() {
        let meta = IndexMetadata::new("docs", 384, DistanceMetric::Cosine, "doc:");
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert_eq!(meta.dimension, 384);
        assert_eq!(meta.store_version, 0);
        assert!(meta.is_compatible());
    }

    #[test]
    fn test_index_metadata_touch() {
        let mut meta = IndexMetadata::new("docs", 3, DistanceMetric::L2, "doc:");
        let original = meta.last_opened_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        meta.touch();
        assert!(meta.last_opened_at > original);
    }

    #[test]
    fn test_index_metadata_serialization() {
        let meta = IndexMetadata::new("docs", 768, DistanceMetric::Dot, "doc:");
        let bytes = bincode::serialize(&meta).unwrap();
        let restored: IndexMetadata = bincode::deserialize(&bytes).unwrap();
        assert_eq!(meta, restored);
    }

    #[test]
    fn test_document_key() {
        assert_eq!(document_key("doc:", "bucket/a.txt"), "doc:bucket/a.txt");
    }

    #[test]
    fn test_embedding_encoding() {
        let v = vec![1.5f32, -0.25, 0.0, f32::MAX];
        let bytes = encode_embedding(&v);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..4], &1.5f32.to_le_bytes());
        assert_eq!(decode_embedding(&bytes).unwrap(), v);
    }

    #[test]
    fn test_decode_embedding_rejects_ragged_bytes() {
        assert!(decode_embedding(&[0u8; 7]).is_err());
    }
}
