//! Identifiers and value types shared by every layer of the navigation graph.
//!
//! All types here are small `Copy` values. Vertices and edges are immutable
//! once their tile has been loaded; search code only ever holds ids and copies.

use std::fmt;

use serde::Serialize;

/// Maximum number of distinct terrain types (one bit each in a [`TerrainMask`]).
pub const MAX_TERRAIN_TYPES: u8 = 32;

/// Identifier of a tile: a spatially bounded chunk of the graph that is
/// loaded and unloaded as a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Stable identity of a vertex: its tile plus its index inside that tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VertexId {
    /// Tile that owns the vertex.
    pub tile: TileId,
    /// Index of the vertex within its tile.
    pub index: u32,
}

impl VertexId {
    /// Creates a vertex id.
    pub const fn new(tile: TileId, index: u32) -> Self {
        Self { tile, index }
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tile, self.index)
    }
}

/// A position in world space.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Creates a new position.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared straight-line distance to `other`.
    #[inline]
    pub fn distance_squared(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Straight-line distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Vec3) -> f32 {
        self.distance_squared(other).sqrt()
    }
}

/// Terrain/traversal tag carried by vertices and edges.
///
/// Values are in `0..MAX_TERRAIN_TYPES`; the tag has no meaning to the graph
/// itself, only to the cost models that interpret it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct TerrainType(pub u8);

impl TerrainType {
    /// Plain walkable ground.
    pub const GROUND: TerrainType = TerrainType(0);

    /// Returns the single-bit mask for this terrain type.
    ///
    /// Tags outside the supported range map to an empty mask, so they are
    /// never contained in any mask.
    pub fn mask(self) -> TerrainMask {
        if self.0 < MAX_TERRAIN_TYPES {
            TerrainMask(1u32 << self.0)
        } else {
            TerrainMask::NONE
        }
    }
}

/// Set of terrain types, one bit per [`TerrainType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
pub struct TerrainMask(pub u32);

impl TerrainMask {
    /// No terrain type.
    pub const NONE: TerrainMask = TerrainMask(0);
    /// Every terrain type.
    pub const ALL: TerrainMask = TerrainMask(u32::MAX);

    /// Returns true if `terrain` is in the mask.
    #[inline]
    pub fn contains(self, terrain: TerrainType) -> bool {
        self.0 & terrain.mask().0 != 0
    }

    /// Returns a copy of the mask with `terrain` added.
    pub fn with(self, terrain: TerrainType) -> Self {
        TerrainMask(self.0 | terrain.mask().0)
    }

    /// Returns a copy of the mask with `terrain` removed.
    pub fn without(self, terrain: TerrainType) -> Self {
        TerrainMask(self.0 & !terrain.mask().0)
    }
}

impl FromIterator<TerrainType> for TerrainMask {
    fn from_iter<I: IntoIterator<Item = TerrainType>>(iter: I) -> Self {
        iter.into_iter().fold(TerrainMask::NONE, TerrainMask::with)
    }
}

/// A graph vertex. Owned by its tile; never mutated after load.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Vertex {
    pub id: VertexId,
    pub position: Vec3,
    pub terrain: TerrainType,
}

/// A directed edge, stored once per direction in the tile of its source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
    /// Static geometric length.
    pub length: f32,
    pub terrain: TerrainType,
}

impl Edge {
    /// Returns true if the edge leads into another tile.
    ///
    /// Such edges are only traversable while the destination tile is loaded.
    #[inline]
    pub fn is_cross_tile(&self) -> bool {
        self.from.tile != self.to.tile
    }
}
