//! Input validation for documents.
//!
//! Validates [`NewDocument`] fields before they reach the storage layer.
//! All size/count constraints are defined as constants in
//! [`crate::storage::schema`].
//!
//! # Validation Layers
//!
//! ```text
//! SearchEngine::add_document()
//!     ├── validate_new_document()   ← vector, tag, payload
//!     └── storage.put_document()    ← only reached if valid
//! ```

use crate::document::types::{NewDocument, Payload, RESERVED_FIELDS};
use crate::error::{DocSearchError, ValidationError};
use crate::storage::schema::{
    MAX_CONTENT_SIZE, MAX_EXTRA_FIELDS, MAX_FIELD_NAME_LENGTH, MAX_TAG_LENGTH,
};

/// Validates a [`NewDocument`] before storage.
///
/// # Rules
///
/// | Field | Constraint |
/// |-------|------------|
/// | `vector` | Length equals the index dimension; all values finite |
/// | `tag` | Non-empty, max 100 bytes |
/// | `payload.content` | Max 4 MiB |
/// | `payload.extra` | Max 64 keys, non-empty, not a reserved name, max 128 bytes |
pub(crate) fn validate_new_document(
    doc: &NewDocument,
    dimension: usize,
) -> Result<(), DocSearchError> {
    validate_vector(&doc.vector, dimension)?;
    validate_tag(&doc.tag)?;
    validate_payload(&doc.payload)?;
    Ok(())
}

/// Validates an embedding (document or query) against the index dimension.
pub(crate) fn validate_vector(vector: &[f32], dimension: usize) -> Result<(), DocSearchError> {
    if vector.len() != dimension {
        return Err(ValidationError::dimension_mismatch(dimension, vector.len()).into());
    }

    if let Some(i) = vector.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::invalid_field(
            "vector",
            format!("element {} is not a finite number", i),
        )
        .into());
    }

    Ok(())
}

/// Validates a tag used for storage or filtering.
pub(crate) fn validate_tag(tag: &str) -> Result<(), DocSearchError> {
    if tag.is_empty() {
        return Err(ValidationError::required_field("tag").into());
    }

    if tag.len() > MAX_TAG_LENGTH {
        return Err(ValidationError::invalid_field(
            "tag",
            format!("must be at most {} bytes, got {}", MAX_TAG_LENGTH, tag.len()),
        )
        .into());
    }

    Ok(())
}

fn validate_payload(payload: &Payload) -> Result<(), DocSearchError> {
    if let Some(content) = &payload.content {
        if content.len() > MAX_CONTENT_SIZE {
            return Err(ValidationError::content_too_large(content.len(), MAX_CONTENT_SIZE).into());
        }
    }

    if payload.extra.len() > MAX_EXTRA_FIELDS {
        return Err(ValidationError::invalid_field(
            "payload",
            format!(
                "at most {} extra fields allowed, got {}",
                MAX_EXTRA_FIELDS,
                payload.extra.len()
            ),
        )
        .into());
    }

    for key in payload.extra.keys() {
        if key.is_empty() || key.len() > MAX_FIELD_NAME_LENGTH {
            return Err(ValidationError::invalid_field(
                "payload",
                format!("field name must be 1..={} bytes", MAX_FIELD_NAME_LENGTH),
            )
            .into());
        }
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return Err(ValidationError::invalid_field(
                "payload",
                format!("'{}' is a reserved field name", key),
            )
            .into());
        }
    }

    Ok(())
}
