//! Core type definitions for DocSearch identifiers and timestamps.
//!
//! Document ids are caller-chosen strings (for uploads, `bucket/object`),
//! so unlike generated ids they are validated on construction.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::ValidationError;

/// Maximum length of a document id in bytes.
pub const MAX_ID_LENGTH: usize = 512;

/// Document identifier.
///
/// Unique within an index. Adding a document under an existing id
/// replaces the previous document.
///
/// # Example
/// ```
/// use docsearch::DocumentId;
///
/// let id = DocumentId::parse("reports/q3.txt").unwrap();
/// assert_eq!(id.as_str(), "reports/q3.txt");
///
/// assert!(DocumentId::parse("").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a DocumentId after checking it is non-empty and within
    /// [`MAX_ID_LENGTH`].
    pub fn parse(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::required_field("id"));
        }
        if id.len() > MAX_ID_LENGTH {
            return Err(ValidationError::invalid_field(
                "id",
                format!("must be at most {} bytes, got {}", MAX_ID_LENGTH, id.len()),
            ));
        }
        Ok(Self(id))
    }

    /// Builds the id used for uploaded objects: `bucket/object`.
    pub fn for_object(bucket: &str, object: &str) -> Result<Self, ValidationError> {
        Self::parse(format!("{}/{}", bucket, object))
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for DocumentId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch, returns 0 rather
    /// than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Embedding vector type alias.
///
/// Embeddings are f32 vectors of fixed dimension (typically 384 or 768).
pub type Embedding = Vec<f32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_parse() {
        let id = DocumentId::parse("doc-1").unwrap();
        assert_eq!(id.as_str(), "doc-1");
        assert_eq!(format!("{}", id), "doc-1");
    }

    #[test]
    fn test_document_id_rejects_empty() {
        let err = DocumentId::parse("").unwrap_err();
        assert!(matches!(err, ValidationError::RequiredField { .. }));
    }

    #[test]
    fn test_document_id_length_boundary() {
        assert!(DocumentId::parse("a".repeat(MAX_ID_LENGTH)).is_ok());
        let err = DocumentId::parse("a".repeat(MAX_ID_LENGTH + 1)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { .. }));
    }

    #[test]
    fn test_document_id_for_object() {
        let id = DocumentId::for_object("bucket", "path/file.txt").unwrap();
        assert_eq!(id.as_str(), "bucket/path/file.txt");
    }

    #[test]
    fn test_document_id_borrow_lookup() {
        let mut set = std::collections::HashSet::new();
        set.insert(DocumentId::parse("x").unwrap());
        assert!(set.contains("x"));
    }

    #[test]
    fn test_document_id_serialization() {
        let id = DocumentId::parse("doc-1").unwrap();
        let bytes = bincode::serialize(&id).unwrap();
        let restored: DocumentId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_millis(1000);
        let t2 = Timestamp::from_millis(2000);
        assert!(t1 < t2);
        assert_eq!(t2.as_millis(), 2000);
    }

    #[test]
    fn test_timestamp_now_is_positive() {
        assert!(Timestamp::now().as_millis() > 0);
    }
}
