//! Open set for A*.
//!
//! Entries are ordered by estimated total cost (lowest first), then by
//! insertion order with the most recent entry first. Among equally promising
//! vertices the one just discovered is expanded next, which biases the search
//! toward directional progress.
//!
//! Improving a vertex pushes a new entry instead of re-keying the old one.
//! The old entry stays in the heap and is recognized as stale when popped,
//! by comparing its sequence number with the one stored for the vertex.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::VertexId;

/// A vertex waiting in the open set.
#[derive(Debug, Clone, Copy)]
pub struct OpenEntry {
    /// Cost from start plus heuristic estimate.
    pub key: f32,
    pub vertex: VertexId,
    /// Insertion sequence number, unique within one open set.
    pub seq: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap:
        // 1. Lower key first (reversed)
        // 2. Higher sequence first (LIFO within a key)
        match other.key.total_cmp(&self.key) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            ordering => ordering,
        }
    }
}

/// Min-heap of [`OpenEntry`] with LIFO tie-break.
#[derive(Debug, Default)]
pub struct OpenSet {
    heap: BinaryHeap<OpenEntry>,
    next_seq: u64,
}

impl OpenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a vertex and returns the sequence number of its entry.
    pub fn push(&mut self, vertex: VertexId, key: f32) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.heap.push(OpenEntry { key, vertex, seq });
        seq
    }

    /// Removes and returns the most promising entry.
    pub fn pop(&mut self) -> Option<OpenEntry> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&OpenEntry> {
        self.heap.peek()
    }

    /// Number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every entry. Sequence numbers keep increasing.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
