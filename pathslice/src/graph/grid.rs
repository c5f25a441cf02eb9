//! Tiled grid graphs.
//!
//! Builds a `width × height` 4-connected grid, split into square tiles of
//! `tile_size × tile_size` cells. Useful as a test fixture and as the world
//! of the CLI harness.
//!
//! Cells are addressed by `(x, y)` with `(0, 0)` in the corner. Vertex
//! positions are `(x * spacing, y * spacing, 0)`.

use std::collections::HashMap;

use super::error::GraphError;
use super::spatial::SpatialGraph;
use super::tile::{Tile, TileBuilder};
use super::types::{TerrainType, TileId, Vec3, VertexId};

/// Default number of cells along each side of a tile.
pub const DEFAULT_GRID_TILE_SIZE: u32 = 16;

/// Default distance between neighbouring cells.
pub const DEFAULT_GRID_SPACING: f32 = 1.0;

/// Cell coordinates `(x, y)`.
pub type GridCell = (u32, u32);

/// Builder for tiled grid graphs.
#[derive(Debug, Clone)]
pub struct GridGraphBuilder {
    width: u32,
    height: u32,
    tile_size: u32,
    spacing: f32,
    terrain: TerrainType,
    /// Terrain overrides keyed by the unordered cell pair.
    overrides: HashMap<(GridCell, GridCell), TerrainType>,
}

impl GridGraphBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tile_size: DEFAULT_GRID_TILE_SIZE,
            spacing: DEFAULT_GRID_SPACING,
            terrain: TerrainType::GROUND,
            overrides: HashMap::new(),
        }
    }

    pub fn tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    /// Terrain used for every edge without an override.
    pub fn default_terrain(mut self, terrain: TerrainType) -> Self {
        self.terrain = terrain;
        self
    }

    /// Overrides the terrain of both edges between two adjacent cells.
    pub fn terrain_between(mut self, a: GridCell, b: GridCell, terrain: TerrainType) -> Self {
        self.overrides.insert(Self::pair_key(a, b), terrain);
        self
    }

    /// Tags every edge crossing the vertical line between column `x - 1`
    /// and column `x` with `terrain`.
    pub fn vertical_wall(mut self, x: u32, terrain: TerrainType) -> Self {
        if x == 0 || x >= self.width {
            return self;
        }
        for y in 0..self.height {
            self.overrides
                .insert(Self::pair_key((x - 1, y), (x, y)), terrain);
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of tiles along x and y.
    pub fn tile_counts(&self) -> (u32, u32) {
        let ts = self.tile_size.max(1);
        (self.width.div_ceil(ts), self.height.div_ceil(ts))
    }

    /// Vertex id of cell `(x, y)`, or `None` outside the grid.
    pub fn vertex_id(&self, x: u32, y: u32) -> Option<VertexId> {
        if x >= self.width || y >= self.height || self.tile_size == 0 {
            return None;
        }
        let ts = self.tile_size;
        let (tiles_x, _) = self.tile_counts();
        let (tx, ty) = (x / ts, y / ts);
        let local_width = self.local_width(tx);
        let index = (y % ts) * local_width + (x % ts);
        Some(VertexId::new(TileId(ty * tiles_x + tx), index))
    }

    /// Inverse of [`vertex_id`](Self::vertex_id).
    pub fn cell_of(&self, id: VertexId) -> Option<GridCell> {
        if self.tile_size == 0 {
            return None;
        }
        let (tiles_x, tiles_y) = self.tile_counts();
        let (tx, ty) = (id.tile.0 % tiles_x, id.tile.0 / tiles_x);
        if ty >= tiles_y {
            return None;
        }
        let local_width = self.local_width(tx);
        let (lx, ly) = (id.index % local_width, id.index / local_width);
        let (x, y) = (tx * self.tile_size + lx, ty * self.tile_size + ly);
        (x < self.width && y < self.height).then_some((x, y))
    }

    /// World position of cell `(x, y)`.
    pub fn position(&self, x: u32, y: u32) -> Vec3 {
        Vec3::new(x as f32 * self.spacing, y as f32 * self.spacing, 0.0)
    }

    /// Builds every tile without loading them.
    pub fn build_tiles(&self) -> Result<Vec<Tile>, GraphError> {
        self.validate()?;

        let (tiles_x, tiles_y) = self.tile_counts();
        let mut tiles = Vec::with_capacity((tiles_x * tiles_y) as usize);

        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                tiles.push(self.build_tile(tx, ty)?);
            }
        }
        Ok(tiles)
    }

    /// Builds and loads every tile.
    pub fn build(&self) -> Result<SpatialGraph, GraphError> {
        let mut graph = SpatialGraph::new();
        for tile in self.build_tiles()? {
            graph.load_tile(tile)?;
        }
        Ok(graph)
    }

    fn validate(&self) -> Result<(), GraphError> {
        if self.width == 0 || self.height == 0 {
            return Err(GraphError::InvalidGrid(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.tile_size == 0 {
            return Err(GraphError::InvalidGrid("tile size must be non-zero".into()));
        }
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return Err(GraphError::InvalidGrid(format!(
                "spacing must be positive, got {}",
                self.spacing
            )));
        }
        Ok(())
    }

    fn build_tile(&self, tx: u32, ty: u32) -> Result<Tile, GraphError> {
        let ts = self.tile_size;
        let (tiles_x, _) = self.tile_counts();
        let id = TileId(ty * tiles_x + tx);
        let x0 = tx * ts;
        let y0 = ty * ts;
        let x1 = (x0 + ts).min(self.width);
        let y1 = (y0 + ts).min(self.height);

        let mut builder = TileBuilder::new(id);
        for y in y0..y1 {
            for x in x0..x1 {
                builder.add_vertex(self.position(x, y), self.terrain);
            }
        }

        for y in y0..y1 {
            for x in x0..x1 {
                let from = self.cell_id((x, y));
                for to_cell in self.adjacent((x, y)) {
                    let terrain = self
                        .overrides
                        .get(&Self::pair_key((x, y), to_cell))
                        .copied()
                        .unwrap_or(self.terrain);
                    builder.add_edge(from, self.cell_id(to_cell), self.spacing, terrain)?;
                }
            }
        }

        Ok(builder.build())
    }

    fn adjacent(&self, (x, y): GridCell) -> impl Iterator<Item = GridCell> {
        let (w, h) = (self.width, self.height);
        [
            (x + 1 < w).then(|| (x + 1, y)),
            (x > 0).then(|| (x - 1, y)),
            (y + 1 < h).then(|| (x, y + 1)),
            (y > 0).then(|| (x, y - 1)),
        ]
        .into_iter()
        .flatten()
    }

    /// Vertex id for coordinates already known to be inside the grid.
    fn cell_id(&self, (x, y): GridCell) -> VertexId {
        let ts = self.tile_size;
        let (tiles_x, _) = self.tile_counts();
        let (tx, ty) = (x / ts, y / ts);
        let index = (y % ts) * self.local_width(tx) + (x % ts);
        VertexId::new(TileId(ty * tiles_x + tx), index)
    }

    fn local_width(&self, tx: u32) -> u32 {
        let x0 = tx * self.tile_size;
        (x0 + self.tile_size).min(self.width) - x0
    }

    fn pair_key(a: GridCell, b: GridCell) -> (GridCell, GridCell) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
