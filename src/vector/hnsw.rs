//! HNSW graph over a [`VectorSource`] arena.
//!
//! The graph stores only topology. Vectors live in the arena and are
//! addressed by slot, so a node's index in the graph is the slot of its
//! vector. Both grow append-only; [`HnswIndex::compact`] is the only
//! operation that renumbers them.
//!
//! # Algorithm Overview
//!
//! **Insert**: sample a layer `l`, greedily descend from the entry point to
//! `l + 1`, then on layers `min(l, top)..=0` run a beam search of width
//! `ef_construction`, link to neighbors picked by the diversity heuristic
//! and add reverse edges, pruning lists that overflow.
//!
//! **Search**: greedy descent to layer 1, then a beam search of width
//! `max(ef, k)` on layer 0. Tombstoned and filtered-out nodes are expanded
//! like any other node but never enter the result set.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::HnswConfig;
use crate::error::{DocSearchError, Result, StorageError, ValidationError};

use super::distance::{norm, DistanceMetric};
use super::node::Node;
use super::VectorSource;

/// Orders `(slot, distance)` pairs closest first, ties by slot.
#[inline]
fn by_distance(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

/// Min-heap entry: pops the closest candidate first.
#[derive(Clone, Copy)]
struct Nearest {
    slot: usize,
    distance: f32,
}

impl PartialEq for Nearest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Nearest {}

impl Ord for Nearest {
    fn cmp(&self, other: &Self) -> Ordering {
        by_distance(&(other.slot, other.distance), &(self.slot, self.distance))
    }
}

impl PartialOrd for Nearest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap entry: pops the worst kept result first.
#[derive(Clone, Copy)]
struct Farthest {
    slot: usize,
    distance: f32,
}

impl PartialEq for Farthest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Farthest {}

impl Ord for Farthest {
    fn cmp(&self, other: &Self) -> Ordering {
        by_distance(&(self.slot, self.distance), &(other.slot, other.distance))
    }
}

impl PartialOrd for Farthest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Query vector with its norm computed once.
struct Query<'a> {
    vector: &'a [f32],
    norm: f32,
}

/// Serializable graph state, stamped with the store version it matches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// `VectorStore::version()` at the time of the snapshot.
    pub store_version: u64,
    /// Metric the graph was built with.
    pub metric: DistanceMetric,
    /// Parameters the graph was built with.
    pub config: HnswConfig,
    /// Entry point slot.
    pub entry_point: Option<usize>,
    /// Highest layer in the graph.
    pub top_layer: usize,
    /// Node arena.
    pub nodes: Vec<Node>,
}

/// Hierarchical navigable small world graph.
#[derive(Debug)]
pub struct HnswIndex {
    nodes: Vec<Node>,
    entry_point: Option<usize>,
    top_layer: usize,
    tombstones: usize,
    metric: DistanceMetric,
    config: HnswConfig,
    ml: f64,
    rng: StdRng,
}

impl HnswIndex {
    /// Creates an empty graph.
    ///
    /// Layer sampling is seeded from `config.seed` when set, so two graphs
    /// built from the same inserts are identical.
    pub fn new(metric: DistanceMetric, config: HnswConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            nodes: Vec::new(),
            entry_point: None,
            top_layer: 0,
            tombstones: 0,
            metric,
            ml: config.level_multiplier(),
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Rebuilds a graph by inserting every slot of `vectors` in order.
    ///
    /// Slots for which `live` returns false are inserted and tombstoned so
    /// the graph stays aligned with the arena.
    pub fn build<V, F>(
        metric: DistanceMetric,
        config: HnswConfig,
        vectors: &V,
        live: F,
    ) -> Result<Self>
    where
        V: VectorSource + ?Sized,
        F: Fn(usize) -> bool,
    {
        let mut index = Self::new(metric, config);
        for slot in 0..vectors.count() {
            index.insert(slot, vectors)?;
            if !live(slot) {
                index.delete(slot);
            }
        }
        Ok(index)
    }

    /// Inserts the vector stored at `slot`.
    ///
    /// Slots must be inserted in arena order: `slot` has to equal the
    /// current node count.
    pub fn insert<V: VectorSource + ?Sized>(&mut self, slot: usize, vectors: &V) -> Result<()> {
        if slot != self.nodes.len() {
            return Err(DocSearchError::vector(format!(
                "out-of-order insert: expected slot {}, got {}",
                self.nodes.len(),
                slot
            )));
        }
        if slot >= vectors.count() {
            return Err(DocSearchError::vector(format!(
                "slot {} has no stored vector",
                slot
            )));
        }

        let query = Query {
            vector: vectors.vector(slot),
            norm: vectors.norm(slot),
        };
        let level = self.random_layer();

        let Some(entry) = self.entry_point else {
            self.nodes.push(Node::new(level));
            self.entry_point = Some(slot);
            self.top_layer = level;
            return Ok(());
        };

        let mut current = entry;
        for layer in (level + 1..=self.top_layer).rev() {
            let nearest = self.search_layer(&query, &[current], 1, layer, vectors, |_| true);
            if let Some(&(n, _)) = nearest.first() {
                current = n;
            }
        }

        let mut plan: Vec<(usize, Vec<usize>)> = Vec::new();
        for layer in (0..=level.min(self.top_layer)).rev() {
            let ef = self.config.ef_construction;
            let mut found =
                self.search_layer(&query, &[current], ef, layer, vectors, |s| !self.nodes[s].deleted);
            if found.is_empty() {
                // Only tombstones reachable: link to them so the node stays reachable
                found = self.search_layer(&query, &[current], ef, layer, vectors, |_| true);
            }
            let neighbors = self.select_neighbors(&found, self.config.capacity(layer), vectors);
            if let Some(&(n, _)) = found.first() {
                current = n;
            }
            plan.push((layer, neighbors));
        }

        let mut node = Node::new(level);
        for (layer, neighbors) in &plan {
            node.set_neighbors(*layer, neighbors.clone());
        }
        self.nodes.push(node);

        for (layer, neighbors) in plan {
            for neighbor in neighbors {
                self.link(neighbor, slot, layer, vectors);
            }
        }

        if level > self.top_layer {
            self.top_layer = level;
            self.entry_point = Some(slot);
        }

        Ok(())
    }

    /// Finds the `k` nearest nodes to `query`.
    ///
    /// Returns `(slot, distance)` pairs, closest first, ties by slot.
    /// `filter` restricts which slots may be returned without restricting
    /// traversal.
    ///
    /// # Errors
    /// `DimensionMismatch` if `query` has the wrong length.
    pub fn search<V: VectorSource + ?Sized>(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        filter: Option<&dyn Fn(usize) -> bool>,
        vectors: &V,
    ) -> Result<Vec<(usize, f32)>> {
        if query.len() != vectors.dimension() {
            return Err(ValidationError::dimension_mismatch(vectors.dimension(), query.len()).into());
        }
        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = Query {
            vector: query,
            norm: norm(query),
        };

        let mut current = entry;
        for layer in (1..=self.top_layer).rev() {
            let nearest = self.search_layer(&query, &[current], 1, layer, vectors, |_| true);
            if let Some(&(n, _)) = nearest.first() {
                current = n;
            }
        }

        let accept = |slot: usize| !self.nodes[slot].deleted && filter.map_or(true, |f| f(slot));
        let mut found = self.search_layer(&query, &[current], ef_search.max(k), 0, vectors, accept);
        found.truncate(k);
        Ok(found)
    }

    /// Scores every listed slot against `query` and keeps the best `k`.
    ///
    /// Used instead of graph search when the candidate set is small.
    /// Tombstoned and unknown slots are skipped.
    pub fn exact_search<V, I>(
        &self,
        query: &[f32],
        k: usize,
        slots: I,
        vectors: &V,
    ) -> Result<Vec<(usize, f32)>>
    where
        V: VectorSource + ?Sized,
        I: IntoIterator<Item = usize>,
    {
        if query.len() != vectors.dimension() {
            return Err(ValidationError::dimension_mismatch(vectors.dimension(), query.len()).into());
        }

        let query = Query {
            vector: query,
            norm: norm(query),
        };
        let mut scored: Vec<(usize, f32)> = slots
            .into_iter()
            .filter(|&s| self.nodes.get(s).is_some_and(|n| !n.deleted))
            .map(|s| (s, self.query_distance(&query, s, vectors)))
            .collect();
        scored.sort_by(by_distance);
        scored.truncate(k);
        Ok(scored)
    }

    /// Tombstones `slot`. Returns false if it was already deleted or unknown.
    pub fn delete(&mut self, slot: usize) -> bool {
        match self.nodes.get_mut(slot) {
            Some(node) if !node.deleted => {
                node.deleted = true;
                self.tombstones += 1;
                true
            }
            _ => false,
        }
    }

    /// Returns true if `slot` is tombstoned.
    pub fn is_deleted(&self, slot: usize) -> bool {
        self.nodes.get(slot).is_some_and(|n| n.deleted)
    }

    /// Fraction of nodes that are tombstoned.
    pub fn tombstone_ratio(&self) -> f32 {
        if self.nodes.is_empty() {
            0.0
        } else {
            self.tombstones as f32 / self.nodes.len() as f32
        }
    }

    /// Removes tombstoned nodes and repairs the edges they held.
    ///
    /// `remap` comes from [`VectorStore::compact`](super::VectorStore::compact)
    /// and `vectors` is the already-compacted arena. A node that lost a
    /// neighbor re-selects from its surviving neighbors plus the removed
    /// neighbors' surviving neighbors.
    pub fn compact<V: VectorSource + ?Sized>(
        &mut self,
        remap: &[Option<usize>],
        vectors: &V,
    ) -> Result<()> {
        if remap.len() != self.nodes.len() {
            return Err(DocSearchError::vector(format!(
                "compaction remap covers {} slots, graph has {}",
                remap.len(),
                self.nodes.len()
            )));
        }
        let survivors = remap.iter().filter(|r| r.is_some()).count();
        if survivors != vectors.count() {
            return Err(DocSearchError::vector(format!(
                "compaction keeps {} nodes but arena holds {}",
                survivors,
                vectors.count()
            )));
        }

        let old_nodes = std::mem::take(&mut self.nodes);
        let mut nodes = Vec::with_capacity(survivors);

        for (old, node) in old_nodes.iter().enumerate() {
            let Some(new) = remap[old] else {
                continue;
            };
            let mut fresh = Node::new(node.top_layer());
            fresh.deleted = node.deleted;

            for layer in 0..=node.top_layer() {
                let neighbors = node.neighbors(layer);
                if neighbors.iter().all(|&n| remap[n].is_some()) {
                    fresh.set_neighbors(layer, neighbors.iter().filter_map(|&n| remap[n]).collect());
                    continue;
                }

                let mut seen = HashSet::new();
                let mut pool = Vec::new();
                for &n in neighbors {
                    match remap[n] {
                        Some(m) => pool.push(m),
                        None => pool.extend(
                            old_nodes[n].neighbors(layer).iter().filter_map(|&nn| remap[nn]),
                        ),
                    }
                }
                let mut candidates: Vec<(usize, f32)> = pool
                    .into_iter()
                    .filter(|&m| m != new && seen.insert(m))
                    .map(|m| (m, self.slot_distance(new, m, vectors)))
                    .collect();
                candidates.sort_by(by_distance);
                let repaired =
                    self.select_neighbors(&candidates, self.config.capacity(layer), vectors);
                fresh.set_neighbors(layer, repaired);
            }

            nodes.push(fresh);
        }

        self.entry_point = match self.entry_point.and_then(|e| remap[e]) {
            Some(e) => Some(e),
            None => nodes
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| a.top_layer().cmp(&b.top_layer()).then(ib.cmp(ia)))
                .map(|(i, _)| i),
        };
        self.top_layer = self.entry_point.map_or(0, |e| nodes[e].top_layer());
        self.tombstones = nodes.iter().filter(|n| n.deleted).count();
        self.nodes = nodes;
        Ok(())
    }

    /// Captures the graph for persistence.
    pub fn snapshot(&self, store_version: u64) -> GraphSnapshot {
        GraphSnapshot {
            store_version,
            metric: self.metric,
            config: self.config.clone(),
            entry_point: self.entry_point,
            top_layer: self.top_layer,
            nodes: self.nodes.clone(),
        }
    }

    /// Restores a graph from a snapshot, checking its structure.
    ///
    /// # Errors
    /// `StorageError::Corrupted` if an edge or the entry point points
    /// outside the arena.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let len = snapshot.nodes.len();
        match snapshot.entry_point {
            None if len > 0 => {
                return Err(StorageError::corrupted("graph snapshot has nodes but no entry point").into())
            }
            Some(e) if e >= len => {
                return Err(StorageError::corrupted(format!(
                    "graph entry point {} outside {} nodes",
                    e, len
                ))
                .into())
            }
            Some(e) if snapshot.nodes[e].top_layer() != snapshot.top_layer => {
                return Err(StorageError::corrupted("graph entry point is not on the top layer").into())
            }
            _ => {}
        }
        for (slot, node) in snapshot.nodes.iter().enumerate() {
            if node.layers.is_empty() || node.layers.iter().flatten().any(|&n| n >= len) {
                return Err(StorageError::corrupted(format!(
                    "graph node {} has an edge outside {} nodes",
                    slot, len
                ))
                .into());
            }
        }

        let mut index = Self::new(snapshot.metric, snapshot.config);
        index.tombstones = snapshot.nodes.iter().filter(|n| n.deleted).count();
        index.entry_point = snapshot.entry_point;
        index.top_layer = snapshot.top_layer;
        index.nodes = snapshot.nodes;
        Ok(index)
    }

    /// Number of non-tombstoned nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.tombstones
    }

    /// Returns true if there are no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of nodes including tombstones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node at `slot`.
    pub fn node(&self, slot: usize) -> Option<&Node> {
        self.nodes.get(slot)
    }

    /// Current entry point.
    pub fn entry_point(&self) -> Option<usize> {
        self.entry_point
    }

    /// Highest layer currently in the graph.
    pub fn top_layer(&self) -> usize {
        self.top_layer
    }

    /// Metric the graph orders by.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Graph parameters.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    fn random_layer(&mut self) -> usize {
        // gen() is in [0, 1); flip it so ln never sees 0
        let u = 1.0 - self.rng.gen::<f64>();
        let level = (-u.ln() * self.ml).floor() as usize;
        level.min(self.config.max_layer)
    }

    #[inline]
    fn query_distance<V: VectorSource + ?Sized>(
        &self,
        query: &Query<'_>,
        slot: usize,
        vectors: &V,
    ) -> f32 {
        self.metric
            .distance_with_norms(query.vector, query.norm, vectors.vector(slot), vectors.norm(slot))
    }

    #[inline]
    fn slot_distance<V: VectorSource + ?Sized>(&self, a: usize, b: usize, vectors: &V) -> f32 {
        self.metric.distance_with_norms(
            vectors.vector(a),
            vectors.norm(a),
            vectors.vector(b),
            vectors.norm(b),
        )
    }

    /// Beam search on one layer. Only slots passing `accept` are kept as
    /// results; every reached slot is expanded.
    fn search_layer<V, F>(
        &self,
        query: &Query<'_>,
        entry_points: &[usize],
        ef: usize,
        layer: usize,
        vectors: &V,
        accept: F,
    ) -> Vec<(usize, f32)>
    where
        V: VectorSource + ?Sized,
        F: Fn(usize) -> bool,
    {
        let mut visited = vec![false; self.nodes.len()];
        let bound = ef.min(self.nodes.len());
        let mut candidates: BinaryHeap<Nearest> = BinaryHeap::with_capacity(bound);
        let mut results: BinaryHeap<Farthest> = BinaryHeap::with_capacity(bound.saturating_add(1));

        for &ep in entry_points {
            if visited[ep] {
                continue;
            }
            visited[ep] = true;
            let distance = self.query_distance(query, ep, vectors);
            candidates.push(Nearest { slot: ep, distance });
            if accept(ep) {
                results.push(Farthest { slot: ep, distance });
            }
        }

        while let Some(current) = candidates.pop() {
            if results.len() >= ef && results.peek().is_some_and(|w| current.distance > w.distance)
            {
                break;
            }

            for &neighbor in self.nodes[current.slot].neighbors(layer) {
                if visited[neighbor] {
                    continue;
                }
                visited[neighbor] = true;

                let distance = self.query_distance(query, neighbor, vectors);
                let dominated =
                    results.len() >= ef && results.peek().is_some_and(|w| distance > w.distance);
                if dominated {
                    continue;
                }

                candidates.push(Nearest {
                    slot: neighbor,
                    distance,
                });
                if accept(neighbor) {
                    results.push(Farthest {
                        slot: neighbor,
                        distance,
                    });
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<(usize, f32)> = results.into_iter().map(|r| (r.slot, r.distance)).collect();
        out.sort_by(by_distance);
        out
    }

    /// Diversity heuristic over `candidates` (sorted closest first).
    ///
    /// A candidate is kept only if it is closer to the base than to every
    /// already kept neighbor. Remaining room is filled with the closest
    /// rejected candidates.
    fn select_neighbors<V: VectorSource + ?Sized>(
        &self,
        candidates: &[(usize, f32)],
        m: usize,
        vectors: &V,
    ) -> Vec<usize> {
        let mut selected: Vec<usize> = Vec::with_capacity(m);

        for &(candidate, distance) in candidates {
            if selected.len() >= m {
                break;
            }
            let diverse = selected
                .iter()
                .all(|&kept| self.slot_distance(candidate, kept, vectors) >= distance);
            if diverse {
                selected.push(candidate);
            }
        }

        if selected.len() < m {
            for &(candidate, _) in candidates {
                if selected.len() >= m {
                    break;
                }
                if !selected.contains(&candidate) {
                    selected.push(candidate);
                }
            }
        }

        selected
    }

    /// Adds the edge `from -> to` on `layer`, pruning `from` if it overflows.
    fn link<V: VectorSource + ?Sized>(&mut self, from: usize, to: usize, layer: usize, vectors: &V) {
        let cap = self.config.capacity(layer);
        self.nodes[from].add_neighbor(layer, to);

        let current = self.nodes[from].neighbors(layer);
        if current.len() <= cap {
            return;
        }

        let mut candidates: Vec<(usize, f32)> = current
            .iter()
            .filter(|&&n| !self.nodes[n].deleted)
            .map(|&n| (n, self.slot_distance(from, n, vectors)))
            .collect();
        candidates.sort_by(by_distance);
        let kept = self.select_neighbors(&candidates, cap, vectors);
        self.nodes[from].set_neighbors(layer, kept);
    }
}
