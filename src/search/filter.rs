//! Tag partitioning for filtered search.
//!
//! [`TagFilter`] is an inverted index from tag to the ids carrying it. The
//! engine resolves a tag to its member set before searching and hands the
//! graph a membership predicate, so filtering happens during traversal
//! rather than as a post-filter.

use std::collections::{HashMap, HashSet};

use crate::types::DocumentId;

/// Inverted index `tag -> {document ids}`.
///
/// Empty member sets are removed, so [`tags`](Self::tags) only lists tags
/// that currently match something.
///
/// # Example
///
/// ```rust
/// use docsearch::{DocumentId, TagFilter};
///
/// let mut filter = TagFilter::new();
/// let id = DocumentId::parse("doc-1").unwrap();
/// filter.add("ST", id.clone());
/// assert!(filter.contains("ST", "doc-1"));
/// assert!(filter.members("other").is_none());
///
/// filter.remove("ST", &id);
/// assert!(filter.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct TagFilter {
    tags: HashMap<String, HashSet<DocumentId>>,
}

impl TagFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `id` carries `tag`.
    pub fn add(&mut self, tag: &str, id: DocumentId) {
        self.tags.entry(tag.to_string()).or_default().insert(id);
    }

    /// Forgets that `id` carries `tag`. Returns false if it did not.
    pub fn remove(&mut self, tag: &str, id: &DocumentId) -> bool {
        let Some(members) = self.tags.get_mut(tag) else {
            return false;
        };
        let removed = members.remove(id);
        if members.is_empty() {
            self.tags.remove(tag);
        }
        removed
    }

    /// Ids carrying `tag`, or `None` if no document does.
    pub fn members(&self, tag: &str) -> Option<&HashSet<DocumentId>> {
        self.tags.get(tag)
    }

    /// Returns true if `id` carries `tag`.
    pub fn contains(&self, tag: &str, id: &str) -> bool {
        self.tags.get(tag).is_some_and(|m| m.contains(id))
    }

    /// Number of documents carrying `tag`.
    pub fn count(&self, tag: &str) -> usize {
        self.tags.get(tag).map_or(0, HashSet::len)
    }

    /// All tags with at least one member, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.tags.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true if no tag has members.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
