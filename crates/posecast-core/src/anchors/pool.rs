//! Bounded pool of anchored scene objects
//!
//! Records are kept in creation order. When admitting a record would exceed
//! capacity, the oldest record is evicted first, regardless of where it is
//! or whether it is visible.

use std::collections::VecDeque;

use crate::xr::{AnchorId, NodeId};

/// Default number of anchored objects kept alive at once
pub const MAX_ANCHORED_OBJECTS: usize = 30;

/// One anchor and the scene object bound to it
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorRecord {
    pub anchor: AnchorId,
    pub node: NodeId,
    /// Monotonic creation order within the pool
    pub created_seq: u64,
    /// Whether the node is currently part of the scene
    pub attached: bool,
    pub visible: bool,
}

#[derive(Debug)]
pub struct AnchorPool {
    records: VecDeque<AnchorRecord>,
    capacity: usize,
    next_seq: u64,
}

impl Default for AnchorPool {
    fn default() -> Self {
        Self::new(MAX_ANCHORED_OBJECTS)
    }
}

impl AnchorPool {
    /// Create a pool holding at most `capacity` records (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            capacity,
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a freshly attached record for `anchor`.
    ///
    /// Returns the evicted record if the pool was full. The caller owns the
    /// evicted record's cleanup (scene removal, handle release).
    pub fn admit(&mut self, anchor: AnchorId, node: NodeId) -> Option<AnchorRecord> {
        let record = AnchorRecord {
            anchor,
            node,
            created_seq: self.next_seq,
            attached: true,
            visible: true,
        };
        self.next_seq += 1;
        self.records.push_back(record);

        if self.records.len() > self.capacity {
            self.records.pop_front()
        } else {
            None
        }
    }

    pub fn contains(&self, anchor: AnchorId) -> bool {
        self.records.iter().any(|r| r.anchor == anchor)
    }

    pub fn get(&self, anchor: AnchorId) -> Option<&AnchorRecord> {
        self.records.iter().find(|r| r.anchor == anchor)
    }

    pub fn get_mut(&mut self, anchor: AnchorId) -> Option<&mut AnchorRecord> {
        self.records.iter_mut().find(|r| r.anchor == anchor)
    }

    pub fn remove(&mut self, anchor: AnchorId) -> Option<AnchorRecord> {
        let index = self.records.iter().position(|r| r.anchor == anchor)?;
        self.records.remove(index)
    }

    /// The record that the next eviction would remove
    pub fn oldest(&self) -> Option<&AnchorRecord> {
        self.records.front()
    }

    /// Records in creation order
    pub fn iter(&self) -> impl Iterator<Item = &AnchorRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AnchorRecord> {
        self.records.iter_mut()
    }

    /// Remove and return every record, oldest first
    pub fn drain(&mut self) -> Vec<AnchorRecord> {
        self.records.drain(..).collect()
    }

    pub fn attached_count(&self) -> usize {
        self.records.iter().filter(|r| r.attached).count()
    }

    /// Records whose node is both in the scene and shown
    pub fn visible_count(&self) -> usize {
        self.records.iter().filter(|r| r.attached && r.visible).count()
    }
}
