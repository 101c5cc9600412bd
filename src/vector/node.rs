//! Node representation in the HNSW graph.

use serde::{Deserialize, Serialize};

/// A node in the HNSW graph.
///
/// A node's position in the graph arena equals the [`VectorStore`](super::VectorStore)
/// slot holding its vector, so it stores no id of its own. Layer 0 contains
/// every node; higher layers contain progressively fewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Neighbor slots per layer; `layers[0]` is the base layer.
    pub layers: Vec<Vec<usize>>,

    /// Logically deleted. Still traversed, never returned.
    pub deleted: bool,
}

impl Node {
    /// Creates a node present on layers `0..=top_layer`.
    pub fn new(top_layer: usize) -> Self {
        Self {
            layers: vec![Vec::new(); top_layer + 1],
            deleted: false,
        }
    }

    /// Highest layer this node exists on.
    pub fn top_layer(&self) -> usize {
        self.layers.len().saturating_sub(1)
    }

    /// Neighbors at `layer` (empty above the node's top layer).
    pub fn neighbors(&self, layer: usize) -> &[usize] {
        self.layers.get(layer).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Adds a neighbor at `layer`, ignoring duplicates.
    pub fn add_neighbor(&mut self, layer: usize, neighbor: usize) {
        if let Some(neighbors) = self.layers.get_mut(layer) {
            if !neighbors.contains(&neighbor) {
                neighbors.push(neighbor);
            }
        }
    }

    /// Replaces the neighbor list at `layer`.
    pub fn set_neighbors(&mut self, layer: usize, neighbors: Vec<usize>) {
        if let Some(slot) = self.layers.get_mut(layer) {
            *slot = neighbors;
        }
    }
}
