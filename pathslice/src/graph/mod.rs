//! Tiled navigation graph.
//!
//! The graph is a set of independently streamed [`Tile`]s. Each tile owns its
//! vertices and their outgoing edges; edges may point into other tiles, and
//! are only traversable while the destination tile is loaded.
//!
//! ```text
//! SpatialGraph
//! ├── Tile t0 (version 1) ── vertices + CSR out-edges
//! ├── Tile t1 (version 2)
//! └── ...            (load/unload only between frames)
//! ```
//!
//! Searches never hold references into the graph across frames. Instead they
//! remember the version of every tile they explored and compare on resume,
//! so an unload or reload is detected in O(tiles explored).

mod error;
mod grid;
mod spatial;
mod tile;
mod types;

pub use error::GraphError;
pub use grid::{GridCell, GridGraphBuilder, DEFAULT_GRID_SPACING, DEFAULT_GRID_TILE_SIZE};
pub use spatial::SpatialGraph;
pub use tile::{Tile, TileBuilder};
pub use types::{
    Edge, TerrainMask, TerrainType, TileId, Vec3, Vertex, VertexId, MAX_TERRAIN_TYPES,
};
