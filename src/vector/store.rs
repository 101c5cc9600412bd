//! Append-only record arena backing the HNSW graph.
//!
//! Every stored document occupies one slot. Slots are never reused:
//! replacing or deleting a document tombstones its slot, and the only
//! way slots move is [`VectorStore::compact`], which hands back the
//! old-to-new remap so the graph can follow.

use std::collections::HashMap;

use crate::document::{Document, Payload};
use crate::error::{Result, ValidationError};
use crate::types::DocumentId;

use super::distance::norm;
use super::VectorSource;

/// One stored record.
#[derive(Clone, Debug)]
struct Slot {
    id: DocumentId,
    vector: Vec<f32>,
    norm: f32,
    tag: String,
    payload: Payload,
    deleted: bool,
}

/// Result of [`VectorStore::put`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PutOutcome {
    /// Slot the new record landed in.
    pub slot: usize,
    /// Previously live slot for the same id, now tombstoned.
    pub replaced: Option<usize>,
}

/// Arena of `(id, vector, tag, payload)` records.
///
/// Lookups by id go through a map of live slots; the graph addresses
/// records by slot.
#[derive(Debug)]
pub struct VectorStore {
    dimension: usize,
    slots: Vec<Slot>,
    live: HashMap<DocumentId, usize>,
    tombstones: usize,
    version: u64,
}

impl VectorStore {
    /// Creates an empty store for vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            slots: Vec::new(),
            live: HashMap::new(),
            tombstones: 0,
            version: 0,
        }
    }

    /// Stores a record, tombstoning any live record with the same id.
    ///
    /// # Errors
    /// `DimensionMismatch` if the vector length differs from the store's
    /// dimension. Nothing is modified on error.
    pub fn put(
        &mut self,
        id: DocumentId,
        vector: Vec<f32>,
        tag: String,
        payload: Payload,
    ) -> Result<PutOutcome> {
        if vector.len() != self.dimension {
            return Err(ValidationError::dimension_mismatch(self.dimension, vector.len()).into());
        }

        let replaced = self.live.get(&id).copied();
        if let Some(old) = replaced {
            self.slots[old].deleted = true;
            self.tombstones += 1;
        }

        let slot = self.slots.len();
        self.slots.push(Slot {
            id: id.clone(),
            norm: norm(&vector),
            vector,
            tag,
            payload,
            deleted: false,
        });
        self.live.insert(id, slot);
        self.version += 1;

        Ok(PutOutcome { slot, replaced })
    }

    /// Returns a copy of the live document with this id.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.live.get(id).map(|&slot| self.document_at(slot))
    }

    /// Tombstones the live record with this id, returning its slot.
    pub fn delete(&mut self, id: &str) -> Option<usize> {
        let slot = self.live.remove(id)?;
        self.slots[slot].deleted = true;
        self.tombstones += 1;
        self.version += 1;
        Some(slot)
    }

    /// Drops tombstoned slots, preserving the order of the rest.
    ///
    /// Returns `remap[old_slot]`: the new slot, or `None` if removed.
    pub fn compact(&mut self) -> Vec<Option<usize>> {
        let mut remap = Vec::with_capacity(self.slots.len());
        let mut kept = Vec::with_capacity(self.live.len());

        for slot in std::mem::take(&mut self.slots) {
            if slot.deleted {
                remap.push(None);
            } else {
                remap.push(Some(kept.len()));
                kept.push(slot);
            }
        }

        self.live = kept
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        self.slots = kept;
        self.tombstones = 0;
        self.version += 1;
        remap
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Monotonic mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The version the next mutation will produce.
    pub fn next_version(&self) -> u64 {
        self.version + 1
    }

    /// Overrides the version counter (used when restoring from disk).
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if no document is live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of slots, live or tombstoned.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of tombstoned slots.
    pub fn tombstone_count(&self) -> usize {
        self.tombstones
    }

    /// Live slot of `id`.
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.live.get(id).copied()
    }

    /// Returns true if `slot` holds a live record.
    pub fn is_live(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| !s.deleted)
    }

    /// Document id stored in `slot`.
    pub fn id_at(&self, slot: usize) -> Option<&DocumentId> {
        self.slots.get(slot).map(|s| &s.id)
    }

    /// Tag stored in `slot`.
    pub fn tag_at(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).map(|s| s.tag.as_str())
    }

    /// Payload stored in `slot`.
    pub fn payload_at(&self, slot: usize) -> Option<&Payload> {
        self.slots.get(slot).map(|s| &s.payload)
    }

    /// Iterates live documents in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Document> + '_ {
        (0..self.slots.len())
            .filter(|&slot| !self.slots[slot].deleted)
            .map(|slot| self.document_at(slot))
    }

    fn document_at(&self, slot: usize) -> Document {
        let s = &self.slots[slot];
        Document {
            id: s.id.clone(),
            vector: s.vector.clone(),
            tag: s.tag.clone(),
            payload: s.payload.clone(),
        }
    }
}

impl VectorSource for VectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn count(&self) -> usize {
        self.slots.len()
    }

    fn vector(&self, slot: usize) -> &[f32] {
        &self.slots[slot].vector
    }

    fn norm(&self, slot: usize) -> f32 {
        self.slots[slot].norm
    }
}
