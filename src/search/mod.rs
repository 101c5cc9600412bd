//! Search requests, results and tag filtering.
//!
//! A search resolves its tag through the [`TagFilter`], then runs either a
//! filtered graph search or, for small partitions, an exact scan.

mod filter;

pub use filter::TagFilter;

use serde::Serialize;

use crate::document::{Payload, ReturnFields};
use crate::types::{DocumentId, Embedding};

/// Default number of results when the caller does not ask for a count.
pub const DEFAULT_K: usize = 3;

/// Parameters of a similarity search.
///
/// # Example
///
/// ```rust
/// use docsearch::{ReturnFields, SearchRequest};
///
/// let request = SearchRequest::new(vec![0.1, 0.2, 0.3], 5)
///     .with_tag("ST")
///     .with_ef_search(128)
///     .with_fields(ReturnFields::only(["content"]));
/// assert_eq!(request.k, 5);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
    /// Query embedding.
    pub vector: Embedding,

    /// Restrict results to documents with this tag. `None` searches everything.
    pub tag: Option<String>,

    /// Maximum number of results. Must be at least 1.
    pub k: usize,

    /// Beam width override; defaults to the index's `ef_search`.
    pub ef_search: Option<usize>,

    /// Payload fields to return with each hit.
    pub return_fields: ReturnFields,
}

impl SearchRequest {
    /// Creates an unfiltered request for `k` results.
    pub fn new(vector: Embedding, k: usize) -> Self {
        Self {
            vector,
            tag: None,
            k,
            ef_search: None,
            return_fields: ReturnFields::All,
        }
    }

    /// Restricts the search to one tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Overrides the beam width.
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = Some(ef_search);
        self
    }

    /// Selects which payload fields come back.
    pub fn with_fields(mut self, fields: ReturnFields) -> Self {
        self.return_fields = fields;
        self
    }
}

/// A single search result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    /// Matching document.
    pub id: DocumentId,

    /// Similarity, higher is closer (see [`DistanceMetric::score`](crate::DistanceMetric::score)).
    pub score: f32,

    /// Raw metric distance, lower is closer.
    pub distance: f32,

    /// Tag of the document.
    pub tag: String,

    /// Projected payload.
    pub payload: Payload,
}
