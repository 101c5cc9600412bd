//! Error types for DocSearch.
//!
//! DocSearch uses a hierarchical error system:
//! - `DocSearchError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`) provide detail
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use docsearch::{SearchEngine, Config, Result};
//!
//! fn example() -> Result<()> {
//!     let engine = SearchEngine::open("./docs.db", Config::default())?;
//!     // ... operations that may fail ...
//!     engine.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # Taxonomy
//!
//! | Kind | Variant | Surfaced as |
//! |------|---------|-------------|
//! | malformed request | [`ValidationError`] | 4xx, never retried |
//! | wrong embedding length | [`ValidationError::DimensionMismatch`] | 4xx |
//! | index metadata mismatch | [`DocSearchError::ConfigConflict`] | fatal at startup |
//! | empty extraction | [`DocSearchError::Extraction`] | 4xx |
//! | missing entity | [`NotFoundError`] | 404 (search returns empty instead) |

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for DocSearch operations.
pub type Result<T> = std::result::Result<T, DocSearchError>;

/// Top-level error enum for all DocSearch operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum DocSearchError {
    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Persisted index metadata disagrees with the requested configuration.
    ///
    /// Never resolved by reindexing; the operator must pick the matching
    /// configuration or a fresh index.
    #[error("Index configuration conflict on '{field}': stored {stored}, requested {requested}")]
    ConfigConflict {
        /// Which setting differs (`dimension` or `metric`).
        field: String,
        /// Value recorded when the index was created.
        stored: String,
        /// Value the caller asked for.
        requested: String,
    },

    /// Requested entity not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding generation/validation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Text extraction produced nothing usable.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Vector index error (HNSW operations, lock poisoning).
    #[error("Vector index error: {0}")]
    Vector(String),
}

impl DocSearchError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a configuration conflict error.
    pub fn config_conflict(
        field: impl Into<String>,
        stored: impl ToString,
        requested: impl ToString,
    ) -> Self {
        Self::ConfigConflict {
            field: field.into(),
            stored: stored.to_string(),
            requested: requested.to_string(),
        }
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates an extraction error with the given message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Creates a vector index error with the given message.
    pub fn vector(msg: impl Into<String>) -> Self {
        Self::Vector(msg.into())
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an embedding dimension mismatch.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(
            self,
            Self::Validation(ValidationError::DimensionMismatch { .. })
        )
    }

    /// Returns true if this is an index configuration conflict.
    pub fn is_config_conflict(&self) -> bool {
        matches!(self, Self::ConfigConflict { .. })
    }

    /// Returns true if this is an extraction failure.
    pub fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a vector index error.
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    /// HTTP status code the API layer reports for this error.
    ///
    /// Caller mistakes map to 4xx; everything that points at the
    /// deployment itself maps to 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Extraction(_) => 400,
            Self::NotFound(_) => 404,
            Self::ConfigConflict { .. } => 409,
            Self::Storage(_)
            | Self::Config { .. }
            | Self::Io(_)
            | Self::Embedding(_)
            | Self::Vector(_) => 500,
        }
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database file not found at expected path.
    #[error("Database not found: {0}")]
    DatabaseNotFound(PathBuf),

    /// Database is locked by another process.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a redb error with the given message.
    pub fn redb(msg: impl Into<String>) -> Self {
        Self::Redb(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<redb::Error> for DocSearchError {
    fn from(err: redb::Error) -> Self {
        DocSearchError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for DocSearchError {
    fn from(err: redb::DatabaseError) -> Self {
        DocSearchError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for DocSearchError {
    fn from(err: redb::TransactionError) -> Self {
        DocSearchError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for DocSearchError {
    fn from(err: redb::CommitError) -> Self {
        DocSearchError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for DocSearchError {
    fn from(err: redb::TableError) -> Self {
        DocSearchError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for DocSearchError {
    fn from(err: redb::StorageError) -> Self {
        DocSearchError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for DocSearchError {
    fn from(err: bincode::Error) -> Self {
        DocSearchError::Storage(StorageError::from(err))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the index's configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension from index metadata.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// Content exceeds maximum allowed size.
    #[error("Content too large: {size} bytes (max: {max} bytes)")]
    ContentTooLarge {
        /// Actual content size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a content too large error.
    pub fn content_too_large(size: usize, max: usize) -> Self {
        Self::ContentTooLarge { size, max }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Index with given name not found in the database.
    #[error("Index not found: {0}")]
    Index(String),
}

impl NotFoundError {
    /// Creates an index not found error.
    pub fn index(name: impl ToString) -> Self {
        Self::Index(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocSearchError::config("Invalid dimension");
        assert_eq!(err.to_string(), "Configuration error: Invalid dimension");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::SchemaVersionMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Schema version mismatch: expected 2, found 1"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::dimension_mismatch(384, 768);
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 384, got 768"
        );
    }

    #[test]
    fn test_config_conflict_display() {
        let err = DocSearchError::config_conflict("dimension", 3, 4);
        assert_eq!(
            err.to_string(),
            "Index configuration conflict on 'dimension': stored 3, requested 4"
        );
        assert!(err.is_config_conflict());
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_not_found_error_display() {
        let err = NotFoundError::index("docs");
        assert_eq!(err.to_string(), "Index not found: docs");
    }

    #[test]
    fn test_is_not_found() {
        let err: DocSearchError = NotFoundError::index("test").into();
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_dimension_mismatch_is_validation() {
        let err: DocSearchError = ValidationError::dimension_mismatch(3, 2).into();
        assert!(err.is_validation());
        assert!(err.is_dimension_mismatch());
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(DocSearchError::extraction("empty").status_code(), 400);
        assert_eq!(
            DocSearchError::from(NotFoundError::index("x")).status_code(),
            404
        );
        assert_eq!(DocSearchError::vector("poisoned").status_code(), 500);
        assert_eq!(
            DocSearchError::from(StorageError::DatabaseLocked).status_code(),
            500
        );
    }

    #[test]
    fn test_vector_error_display() {
        let err = DocSearchError::vector("HNSW insert failed");
        assert_eq!(err.to_string(), "Vector index error: HNSW insert failed");
        assert!(err.is_vector());
        assert!(!err.is_storage());
    }

    #[test]
    fn test_error_conversion_chain() {
        fn inner() -> Result<()> {
            Err(StorageError::corrupted("test corruption"))?
        }

        let result = inner();
        assert!(result.is_err());
        assert!(result.unwrap_err().is_storage());
    }
}
