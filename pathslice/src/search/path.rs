//! Reconstructed paths.

use serde::Serialize;

use crate::graph::{GraphError, SpatialGraph, Vec3, VertexId};

/// One vertex along a path with the cumulative cost to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathNode {
    pub vertex: VertexId,
    pub cost: f32,
}

/// A path from a start vertex to a target vertex.
///
/// Always contains at least one node. A path whose start is its target has a
/// single node and zero cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    nodes: Vec<PathNode>,
}

impl Path {
    pub(crate) fn from_nodes(nodes: Vec<PathNode>) -> Option<Self> {
        (!nodes.is_empty()).then_some(Self { nodes })
    }

    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn start(&self) -> VertexId {
        self.nodes[0].vertex
    }

    pub fn target(&self) -> VertexId {
        self.nodes[self.nodes.len() - 1].vertex
    }

    /// Total traversal cost under the constraint that produced the path.
    pub fn cost(&self) -> f32 {
        self.nodes[self.nodes.len() - 1].cost
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true for a constructed path.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.nodes.iter().map(|n| n.vertex)
    }

    /// World positions of the path's vertices.
    ///
    /// Fails if a tile along the path has been unloaded since.
    pub fn positions(&self, graph: &SpatialGraph) -> Result<Vec<Vec3>, GraphError> {
        self.vertices()
            .map(|id| graph.vertex(id).map(|v| v.position))
            .collect()
    }

    /// Geometric length of the path, independent of edge costs.
    pub fn length(&self, graph: &SpatialGraph) -> Result<f32, GraphError> {
        let positions = self.positions(graph)?;
        Ok(positions.windows(2).map(|w| w[0].distance(&w[1])).sum())
    }
}
