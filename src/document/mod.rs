//! Document types and validation.
//!
//! A document is the unit of ingestion: an id, an embedding, a tag used to
//! partition searches, and a [`Payload`] of stored fields.

mod types;
pub(crate) mod validation;

pub use types::{Document, NewDocument, Payload, ReturnFields, SourceRef, RESERVED_FIELDS};
