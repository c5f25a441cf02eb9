//! Built-in constraints.

use super::traits::{Constraint, SearchLifecycle};
use crate::graph::{Edge, TerrainMask, TerrainType, Vec3, Vertex, MAX_TERRAIN_TYPES};
use crate::scheduler::RequesterId;

/// Cost equal to the edge length, scaled by a per-terrain multiplier.
///
/// Multipliers are clamped to at least `1.0`, so the cost of an edge is
/// never below its length and [`EuclideanHeuristic`](super::EuclideanHeuristic)
/// stays admissible.
#[derive(Debug, Clone)]
pub struct ShortestPathConstraint {
    multipliers: [f32; MAX_TERRAIN_TYPES as usize],
    forbidden: TerrainMask,
}

impl Default for ShortestPathConstraint {
    fn default() -> Self {
        Self {
            multipliers: [1.0; MAX_TERRAIN_TYPES as usize],
            forbidden: TerrainMask::NONE,
        }
    }
}

impl ShortestPathConstraint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cost multiplier for edges of `terrain`.
    pub fn with_terrain_cost(mut self, terrain: TerrainType, multiplier: f32) -> Self {
        if let Some(slot) = self.multipliers.get_mut(terrain.0 as usize) {
            *slot = if multiplier.is_finite() {
                multiplier.max(1.0)
            } else {
                1.0
            };
        }
        self
    }

    /// Forbids every edge whose terrain is in `mask`.
    pub fn with_forbidden(mut self, mask: TerrainMask) -> Self {
        self.forbidden = mask;
        self
    }

    pub fn terrain_cost(&self, terrain: TerrainType) -> f32 {
        self.multipliers
            .get(terrain.0 as usize)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn forbidden(&self) -> TerrainMask {
        self.forbidden
    }
}

impl SearchLifecycle for ShortestPathConstraint {}

impl Constraint for ShortestPathConstraint {
    fn name(&self) -> &str {
        "shortest_path"
    }

    fn cost(
        &self,
        _requester: RequesterId,
        edge: &Edge,
        _from: &Vertex,
        _to: &Vertex,
    ) -> Option<f32> {
        if self.forbidden.contains(edge.terrain) {
            return None;
        }
        Some(edge.length * self.terrain_cost(edge.terrain))
    }
}

/// Forbids edges (and destination vertices) whose terrain is not allowed.
///
/// Allowed edges cost their length.
#[derive(Debug, Clone, Copy)]
pub struct TerrainMaskConstraint {
    allowed: TerrainMask,
}

impl TerrainMaskConstraint {
    pub fn new(allowed: TerrainMask) -> Self {
        Self { allowed }
    }

    pub fn allowed(&self) -> TerrainMask {
        self.allowed
    }
}

impl SearchLifecycle for TerrainMaskConstraint {}

impl Constraint for TerrainMaskConstraint {
    fn name(&self) -> &str {
        "terrain_mask"
    }

    fn cost(
        &self,
        _requester: RequesterId,
        edge: &Edge,
        _from: &Vertex,
        to: &Vertex,
    ) -> Option<f32> {
        if self.allowed.contains(edge.terrain) && self.allowed.contains(to.terrain) {
            Some(edge.length)
        } else {
            None
        }
    }
}

/// Forbids every edge that does not lie entirely inside a sphere.
///
/// Edges inside the sphere are costed by an inner
/// [`ShortestPathConstraint`]. Bounding the search this way makes it fail
/// quickly when the goal is unreachable from nearby.
#[derive(Debug, Clone)]
pub struct SphereConstraint {
    center: Vec3,
    radius: f32,
    inner: ShortestPathConstraint,
}

impl SphereConstraint {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius,
            inner: ShortestPathConstraint::default(),
        }
    }

    pub fn with_inner(mut self, inner: ShortestPathConstraint) -> Self {
        self.inner = inner;
        self
    }

    pub fn set_sphere(&mut self, center: Vec3, radius: f32) {
        self.center = center;
        self.radius = radius;
    }

    pub fn sphere(&self) -> (Vec3, f32) {
        (self.center, self.radius)
    }

    fn contains(&self, position: &Vec3) -> bool {
        self.center.distance_squared(position) <= self.radius * self.radius
    }
}

impl SearchLifecycle for SphereConstraint {}

impl Constraint for SphereConstraint {
    fn name(&self) -> &str {
        "sphere"
    }

    fn cost(
        &self,
        requester: RequesterId,
        edge: &Edge,
        from: &Vertex,
        to: &Vertex,
    ) -> Option<f32> {
        if !self.contains(&from.position) || !self.contains(&to.position) {
            return None;
        }
        self.inner.cost(requester, edge, from, to)
    }
}
