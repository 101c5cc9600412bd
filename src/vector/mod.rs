//! Vector storage and approximate nearest neighbor search.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  slot   ┌──────────────────┐
//! │   VectorStore    │◄────────│    HnswIndex     │
//! │ (records, norms) │         │ (topology only)  │
//! └──────────────────┘         └──────────────────┘
//! ```
//!
//! The graph never owns vectors. It reads them through [`VectorSource`],
//! which the store implements, and both sides agree that node `i` is the
//! record in slot `i`. Stored embeddings in redb are the source of truth;
//! the graph is derived and can always be rebuilt from them.

mod distance;
mod hnsw;
mod node;
mod store;

pub use distance::{dot, norm, DistanceMetric};
pub use hnsw::{GraphSnapshot, HnswIndex};
pub use node::Node;
pub use store::{PutOutcome, VectorStore};

/// Read access to an arena of vectors addressed by slot.
///
/// Implementations must keep slot numbering stable between calls; the
/// graph caches slots in its neighbor lists.
pub trait VectorSource {
    /// Length of every vector.
    fn dimension(&self) -> usize;

    /// Number of addressable slots (including tombstoned ones).
    fn count(&self) -> usize;

    /// Vector in `slot`. Panics if `slot >= count()`.
    fn vector(&self, slot: usize) -> &[f32];

    /// Cached L2 norm of the vector in `slot`.
    fn norm(&self, slot: usize) -> f32;
}
