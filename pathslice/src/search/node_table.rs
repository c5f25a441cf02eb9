//! Per-search vertex state, reset in O(1) by epoch stamping.
//!
//! Each slot carries the epoch it was last written in. Starting a new search
//! bumps the table epoch, which makes every existing slot read as untouched
//! without clearing the arrays. Slots are grouped per tile and allocated the
//! first time the search reaches that tile.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::graph::{TileId, VertexId};

/// Status of a vertex within the current search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum VertexStatus {
    /// Not reached yet.
    #[default]
    New,
    /// Reached, waiting in the open set.
    Open,
    /// Expanded.
    Closed,
}

impl VertexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VertexStatus::New => "new",
            VertexStatus::Open => "open",
            VertexStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for VertexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of one vertex in one search.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchNode {
    epoch: u32,
    /// Best known cost from the start.
    pub cost: f32,
    /// Heuristic estimate to the goal, computed once per search.
    pub estimate: f32,
    /// Vertex this one was reached from.
    pub predecessor: Option<VertexId>,
    pub status: VertexStatus,
    /// Sequence number of the vertex's live open-set entry.
    pub open_seq: u64,
    /// Set the first time the vertex is closed, kept across reopenings.
    pub ever_closed: bool,
}

impl SearchNode {
    const UNTOUCHED: SearchNode = SearchNode {
        epoch: 0,
        cost: f32::INFINITY,
        estimate: 0.0,
        predecessor: None,
        status: VertexStatus::New,
        open_seq: 0,
        ever_closed: false,
    };
}

/// Vertex state table owned by a single search.
#[derive(Debug)]
pub struct SearchNodeTable {
    epoch: u32,
    tiles: HashMap<TileId, Vec<SearchNode>>,
    touched: usize,
}

impl Default for SearchNodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchNodeTable {
    pub fn new() -> Self {
        Self {
            epoch: 1,
            tiles: HashMap::new(),
            touched: 0,
        }
    }

    /// Invalidates every slot. Allocations are kept for the next search.
    pub fn begin_epoch(&mut self) {
        self.touched = 0;
        if self.epoch == u32::MAX {
            for slots in self.tiles.values_mut() {
                slots.fill(SearchNode::UNTOUCHED);
            }
            self.epoch = 1;
        } else {
            self.epoch += 1;
        }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Number of distinct vertices touched in the current epoch.
    pub fn touched(&self) -> usize {
        self.touched
    }

    /// Number of slots allocated across all tiles.
    pub fn capacity(&self) -> usize {
        self.tiles.values().map(Vec::len).sum()
    }

    /// Returns the slot for `vertex` if it was touched in the current epoch.
    pub(crate) fn get(&self, vertex: VertexId) -> Option<&SearchNode> {
        self.tiles
            .get(&vertex.tile)
            .and_then(|slots| slots.get(vertex.index as usize))
            .filter(|node| node.epoch == self.epoch)
    }

    pub(crate) fn get_mut(&mut self, vertex: VertexId) -> Option<&mut SearchNode> {
        let epoch = self.epoch;
        self.tiles
            .get_mut(&vertex.tile)
            .and_then(|slots| slots.get_mut(vertex.index as usize))
            .filter(|node| node.epoch == epoch)
    }

    /// Returns the slot for `vertex`, resetting it first if it is stale.
    ///
    /// `tile_len` sizes the tile's slot array on first use.
    pub(crate) fn touch(&mut self, vertex: VertexId, tile_len: usize) -> &mut SearchNode {
        let epoch = self.epoch;
        let slots = self.tiles.entry(vertex.tile).or_default();
        let index = vertex.index as usize;
        if slots.len() <= index {
            slots.resize(tile_len.max(index + 1), SearchNode::UNTOUCHED);
        }

        let node = &mut slots[index];
        if node.epoch != epoch {
            *node = SearchNode {
                epoch,
                ..SearchNode::UNTOUCHED
            };
            self.touched += 1;
        }
        node
    }

    pub fn status(&self, vertex: VertexId) -> VertexStatus {
        self.get(vertex).map_or(VertexStatus::New, |node| node.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(index: u32) -> VertexId {
        VertexId::new(TileId(0), index)
    }

    #[test]
    fn test_untouched_vertex_is_new() {
        let table = SearchNodeTable::new();
        assert!(table.get(v(3)).is_none());
        assert_eq!(table.status(v(3)), VertexStatus::New);
    }

    #[test]
    fn test_touch_allocates_tile() {
        let mut table = SearchNodeTable::new();
        let node = table.touch(v(2), 10);
        node.cost = 4.0;
        node.status = VertexStatus::Open;

        assert_eq!(table.capacity(), 10);
        assert_eq!(table.touched(), 1);
        assert_eq!(table.get(v(2)).map(|n| n.cost), Some(4.0));
        assert_eq!(table.status(v(2)), VertexStatus::Open);
    }

    #[test]
    fn test_touch_twice_counts_once() {
        let mut table = SearchNodeTable::new();
        table.touch(v(1), 4).cost = 1.0;
        let node = table.touch(v(1), 4);
        assert_eq!(node.cost, 1.0);
        assert_eq!(table.touched(), 1);
    }

    #[test]
    fn test_begin_epoch_invalidates_without_freeing() {
        let mut table = SearchNodeTable::new();
        table.touch(v(0), 8).status = VertexStatus::Closed;
        let capacity = table.capacity();

        table.begin_epoch();

        assert!(table.get(v(0)).is_none());
        assert_eq!(table.touched(), 0);
        assert_eq!(table.capacity(), capacity);

        let node = table.touch(v(0), 8);
        assert_eq!(node.status, VertexStatus::New);
        assert!(node.cost.is_infinite());
    }

    #[test]
    fn test_epoch_wraparound_clears_slots() {
        let mut table = SearchNodeTable::new();
        table.epoch = u32::MAX;
        table.touch(v(0), 2).status = VertexStatus::Closed;

        table.begin_epoch();

        assert_eq!(table.epoch(), 1);
        assert!(table.get(v(0)).is_none());
    }

    #[test]
    fn test_grows_for_out_of_range_index() {
        let mut table = SearchNodeTable::new();
        table.touch(v(5), 2);
        assert!(table.capacity() >= 6);
    }
}
