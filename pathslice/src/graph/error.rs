//! Error types for graph access and construction.

use thiserror::Error;

use super::types::{TileId, VertexId};

/// Errors raised by [`SpatialGraph`](super::SpatialGraph) and tile construction.
///
/// `NotLoaded` is an expected runtime condition while tiles stream in and out;
/// search code treats it as "no outgoing edges". The other variants indicate
/// malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The tile containing the vertex is not loaded.
    #[error("vertex {0} is in a tile that is not loaded")]
    NotLoaded(VertexId),

    /// The tile is loaded but has no vertex with this index.
    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),

    /// A tile with this id is already loaded.
    #[error("tile {0} is already loaded")]
    DuplicateTile(TileId),

    /// An edge failed validation while building a tile.
    #[error("invalid edge {from} -> {to}: {reason}")]
    InvalidEdge {
        from: VertexId,
        to: VertexId,
        reason: String,
    },

    /// Grid dimensions or tile size are unusable.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_display() {
        let v = VertexId::new(TileId(2), 5);
        assert_eq!(
            GraphError::NotLoaded(v).to_string(),
            "vertex t2:5 is in a tile that is not loaded"
        );
        assert_eq!(
            GraphError::DuplicateTile(TileId(9)).to_string(),
            "tile t9 is already loaded"
        );
    }
}
