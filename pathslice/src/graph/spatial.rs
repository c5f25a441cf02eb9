//! The loaded navigation graph.
//!
//! [`SpatialGraph`] is the set of currently loaded tiles. It is read-only for
//! searches: tiles are only loaded or unloaded between frames, through
//! `&mut self`, so no search step can observe a half-applied change.

use std::collections::HashMap;

use tracing::debug;

use super::error::GraphError;
use super::tile::Tile;
use super::types::{Edge, TileId, Vertex, VertexId};

/// Set of loaded tiles with vertex lookup and neighbour iteration.
#[derive(Debug, Default)]
pub struct SpatialGraph {
    tiles: HashMap<TileId, Tile>,
    /// Last load stamp handed out. Starts at zero so every loaded tile has a
    /// non-zero version.
    last_version: u64,
}

impl SpatialGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a tile and returns the version stamp assigned to it.
    pub fn load_tile(&mut self, mut tile: Tile) -> Result<u64, GraphError> {
        let id = tile.id();
        if self.tiles.contains_key(&id) {
            return Err(GraphError::DuplicateTile(id));
        }

        self.last_version += 1;
        tile.set_version(self.last_version);

        debug!(
            tile = %id,
            version = self.last_version,
            vertices = tile.vertex_count(),
            edges = tile.edge_count(),
            "Tile loaded"
        );

        self.tiles.insert(id, tile);
        Ok(self.last_version)
    }

    /// Unloads a tile, returning it so it can be loaded again later.
    pub fn unload_tile(&mut self, id: TileId) -> Option<Tile> {
        let tile = self.tiles.remove(&id)?;
        debug!(tile = %id, version = tile.version(), "Tile unloaded");
        Some(tile)
    }

    pub fn is_tile_loaded(&self, id: TileId) -> bool {
        self.tiles.contains_key(&id)
    }

    /// Returns true if the vertex exists in a loaded tile.
    pub fn is_loaded(&self, vertex: VertexId) -> bool {
        self.tiles
            .get(&vertex.tile)
            .is_some_and(|tile| (vertex.index as usize) < tile.vertex_count())
    }

    /// Version stamp of a loaded tile.
    pub fn tile_version(&self, id: TileId) -> Option<u64> {
        self.tiles.get(&id).map(Tile::version)
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(&id)
    }

    /// Ids of all loaded tiles, sorted.
    pub fn tile_ids(&self) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self.tiles.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Total number of vertices across loaded tiles.
    pub fn vertex_count(&self) -> usize {
        self.tiles.values().map(Tile::vertex_count).sum()
    }

    /// Looks up a vertex (position and terrain).
    pub fn vertex(&self, id: VertexId) -> Result<&Vertex, GraphError> {
        let tile = self.tiles.get(&id.tile).ok_or(GraphError::NotLoaded(id))?;
        tile.vertex(id.index).ok_or(GraphError::UnknownVertex(id))
    }

    /// Outgoing edges of a vertex as a slice.
    ///
    /// Fails with [`GraphError::NotLoaded`] when the vertex's tile is not
    /// loaded. Edges in the slice may still lead into unloaded tiles; check
    /// [`is_loaded`](Self::is_loaded) on the destination before traversing.
    pub fn out_edges(&self, id: VertexId) -> Result<&[Edge], GraphError> {
        let tile = self.tiles.get(&id.tile).ok_or(GraphError::NotLoaded(id))?;
        tile.out_edges(id.index).ok_or(GraphError::UnknownVertex(id))
    }

    /// Lazy, restartable iterator over the outgoing edges of a vertex.
    pub fn neighbors(
        &self,
        id: VertexId,
    ) -> Result<impl Iterator<Item = &Edge> + Clone + '_, GraphError> {
        Ok(self.out_edges(id)?.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tile::TileBuilder;
    use crate::graph::types::{TerrainType, Vec3};

    fn two_vertex_tile(id: u32) -> Tile {
        let mut builder = TileBuilder::new(TileId(id));
        let a = builder.add_vertex(Vec3::new(0.0, 0.0, 0.0), TerrainType::GROUND);
        let b = builder.add_vertex(Vec3::new(1.0, 0.0, 0.0), TerrainType::GROUND);
        builder.connect(a, b, TerrainType::GROUND).unwrap();
        builder.build()
    }

    #[test]
    fn test_load_assigns_increasing_versions() {
        let mut graph = SpatialGraph::new();
        let v1 = graph.load_tile(two_vertex_tile(0)).unwrap();
        let v2 = graph.load_tile(two_vertex_tile(1)).unwrap();
        assert!(v1 > 0);
        assert!(v2 > v1);
        assert_eq!(graph.tile_version(TileId(1)), Some(v2));
    }

    #[test]
    fn test_duplicate_tile_rejected() {
        let mut graph = SpatialGraph::new();
        graph.load_tile(two_vertex_tile(0)).unwrap();
        let err = graph.load_tile(two_vertex_tile(0)).unwrap_err();
        assert_eq!(err, GraphError::DuplicateTile(TileId(0)));
    }

    #[test]
    fn test_reload_gets_new_version() {
        let mut graph = SpatialGraph::new();
        let first = graph.load_tile(two_vertex_tile(0)).unwrap();
        let tile = graph.unload_tile(TileId(0)).unwrap();
        assert!(!graph.is_tile_loaded(TileId(0)));
        let second = graph.load_tile(tile).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_unloaded_vertex_reports_not_loaded() {
        let mut graph = SpatialGraph::new();
        graph.load_tile(two_vertex_tile(0)).unwrap();
        let missing = VertexId::new(TileId(5), 0);

        assert!(!graph.is_loaded(missing));
        assert_eq!(
            graph.out_edges(missing).unwrap_err(),
            GraphError::NotLoaded(missing)
        );
        assert!(graph.neighbors(missing).is_err());
    }

    #[test]
    fn test_unknown_index_in_loaded_tile() {
        let mut graph = SpatialGraph::new();
        graph.load_tile(two_vertex_tile(0)).unwrap();
        let bogus = VertexId::new(TileId(0), 10);
        assert!(!graph.is_loaded(bogus));
        assert_eq!(graph.vertex(bogus).unwrap_err(), GraphError::UnknownVertex(bogus));
    }

    #[test]
    fn test_neighbors_is_restartable() {
        let mut graph = SpatialGraph::new();
        graph.load_tile(two_vertex_tile(0)).unwrap();
        let a = VertexId::new(TileId(0), 0);

        let iter = graph.neighbors(a).unwrap();
        let first: Vec<_> = iter.clone().map(|e| e.to).collect();
        let second: Vec<_> = iter.map(|e| e.to).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![VertexId::new(TileId(0), 1)]);
    }

    #[test]
    fn test_vertex_count_spans_tiles() {
        let mut graph = SpatialGraph::new();
        graph.load_tile(two_vertex_tile(0)).unwrap();
        graph.load_tile(two_vertex_tile(1)).unwrap();
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.tile_ids(), vec![TileId(0), TileId(1)]);
    }
}
