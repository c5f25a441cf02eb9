//! Tiles: the unit of graph streaming.
//!
//! A [`Tile`] stores its vertices plus their outgoing edges in compressed
//! adjacency form (edges sorted by source, one offset per vertex), so the
//! neighbours of a vertex are a contiguous slice.

use super::error::GraphError;
use super::types::{Edge, TerrainType, TileId, Vec3, Vertex, VertexId};

/// An immutable chunk of the navigation graph.
#[derive(Debug, Clone)]
pub struct Tile {
    id: TileId,
    /// Load stamp assigned by the graph; zero while the tile is not loaded.
    version: u64,
    vertices: Vec<Vertex>,
    /// `edges[edge_offsets[i]..edge_offsets[i + 1]]` are the out-edges of vertex `i`.
    edge_offsets: Vec<u32>,
    edges: Vec<Edge>,
}

impl Tile {
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Load stamp of this copy of the tile. Every (re)load gets a fresh value.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, index: u32) -> Option<&Vertex> {
        self.vertices.get(index as usize)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Outgoing edges of the vertex at `index`.
    pub fn out_edges(&self, index: u32) -> Option<&[Edge]> {
        let i = index as usize;
        if i >= self.vertices.len() {
            return None;
        }
        let start = self.edge_offsets[i] as usize;
        let end = self.edge_offsets[i + 1] as usize;
        Some(&self.edges[start..end])
    }
}

/// Incremental builder for a [`Tile`].
///
/// Vertices get consecutive indices in insertion order. Edges may target
/// vertices of other tiles; those are validated only for their source side,
/// since the destination tile may not exist yet.
#[derive(Debug)]
pub struct TileBuilder {
    id: TileId,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl TileBuilder {
    pub fn new(id: TileId) -> Self {
        Self {
            id,
            vertices: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Adds a vertex and returns its id.
    pub fn add_vertex(&mut self, position: Vec3, terrain: TerrainType) -> VertexId {
        let id = VertexId::new(self.id, self.vertices.len() as u32);
        self.vertices.push(Vertex {
            id,
            position,
            terrain,
        });
        id
    }

    /// Position of a vertex already added to this builder.
    pub fn position(&self, index: u32) -> Option<Vec3> {
        self.vertices.get(index as usize).map(|v| v.position)
    }

    /// Adds a directed edge from a vertex of this tile.
    pub fn add_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        length: f32,
        terrain: TerrainType,
    ) -> Result<(), GraphError> {
        let invalid = |reason: &str| GraphError::InvalidEdge {
            from,
            to,
            reason: reason.to_string(),
        };

        if from.tile != self.id {
            return Err(invalid("source vertex belongs to another tile"));
        }
        if from.index as usize >= self.vertices.len() {
            return Err(invalid("source vertex does not exist"));
        }
        if to.tile == self.id && to.index as usize >= self.vertices.len() {
            return Err(invalid("destination vertex does not exist"));
        }
        if !length.is_finite() || length < 0.0 {
            return Err(invalid("length must be finite and non-negative"));
        }

        self.edges.push(Edge {
            from,
            to,
            length,
            terrain,
        });
        Ok(())
    }

    /// Adds edges in both directions between two vertices of this tile,
    /// using their straight-line distance as length.
    pub fn connect(
        &mut self,
        a: VertexId,
        b: VertexId,
        terrain: TerrainType,
    ) -> Result<(), GraphError> {
        let (pa, pb) = match (self.position(a.index), self.position(b.index)) {
            (Some(pa), Some(pb)) if a.tile == self.id && b.tile == self.id => (pa, pb),
            _ => {
                return Err(GraphError::InvalidEdge {
                    from: a,
                    to: b,
                    reason: "both endpoints must be vertices of this tile".to_string(),
                })
            }
        };
        let length = pa.distance(&pb);
        self.add_edge(a, b, length, terrain)?;
        self.add_edge(b, a, length, terrain)
    }

    /// Finalizes the tile. The result is not loaded (version zero).
    pub fn build(mut self) -> Tile {
        // Stable sort keeps per-vertex insertion order of edges.
        self.edges.sort_by_key(|e| e.from.index);

        let mut edge_offsets = vec![0u32; self.vertices.len() + 1];
        for edge in &self.edges {
            edge_offsets[edge.from.index as usize + 1] += 1;
        }
        for i in 1..edge_offsets.len() {
            edge_offsets[i] += edge_offsets[i - 1];
        }

        Tile {
            id: self.id,
            version: 0,
            vertices: self.vertices,
            edge_offsets,
            edges: self.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_tile() -> Tile {
        let mut builder = TileBuilder::new(TileId(0));
        let a = builder.add_vertex(Vec3::new(0.0, 0.0, 0.0), TerrainType::GROUND);
        let b = builder.add_vertex(Vec3::new(1.0, 0.0, 0.0), TerrainType::GROUND);
        let c = builder.add_vertex(Vec3::new(3.0, 0.0, 0.0), TerrainType::GROUND);
        builder.connect(b, c, TerrainType::GROUND).unwrap();
        builder.connect(a, b, TerrainType::GROUND).unwrap();
        builder.build()
    }

    #[test]
    fn test_out_edges_are_grouped_by_source() {
        let tile = line_tile();
        assert_eq!(tile.vertex_count(), 3);
        assert_eq!(tile.edge_count(), 4);

        let from_a = tile.out_edges(0).unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].to.index, 1);

        let from_b: Vec<u32> = tile.out_edges(1).unwrap().iter().map(|e| e.to.index).collect();
        assert_eq!(from_b, vec![2, 0]);

        let from_c = tile.out_edges(2).unwrap();
        assert_eq!(from_c.len(), 1);
        assert_eq!(from_c[0].length, 2.0);
    }

    #[test]
    fn test_out_edges_unknown_index() {
        let tile = line_tile();
        assert!(tile.out_edges(3).is_none());
        assert!(tile.vertex(3).is_none());
    }

    #[test]
    fn test_new_tile_is_unversioned() {
        assert_eq!(line_tile().version(), 0);
    }

    #[test]
    fn test_add_edge_rejects_foreign_source() {
        let mut builder = TileBuilder::new(TileId(1));
        builder.add_vertex(Vec3::ZERO, TerrainType::GROUND);
        let foreign = VertexId::new(TileId(2), 0);
        let err = builder
            .add_edge(foreign, VertexId::new(TileId(1), 0), 1.0, TerrainType::GROUND)
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidEdge { .. }));
    }

    #[test]
    fn test_add_edge_rejects_negative_length() {
        let mut builder = TileBuilder::new(TileId(1));
        let a = builder.add_vertex(Vec3::ZERO, TerrainType::GROUND);
        let b = builder.add_vertex(Vec3::ZERO, TerrainType::GROUND);
        assert!(builder.add_edge(a, b, -1.0, TerrainType::GROUND).is_err());
        assert!(builder.add_edge(a, b, f32::NAN, TerrainType::GROUND).is_err());
    }

    #[test]
    fn test_cross_tile_edge_destination_not_validated() {
        let mut builder = TileBuilder::new(TileId(1));
        let a = builder.add_vertex(Vec3::ZERO, TerrainType::GROUND);
        let remote = VertexId::new(TileId(7), 99);
        builder.add_edge(a, remote, 1.0, TerrainType::GROUND).unwrap();
        let tile = builder.build();
        assert!(tile.out_edges(0).unwrap()[0].is_cross_tile());
    }
}
