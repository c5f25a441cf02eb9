//! Built-in heuristics.

use super::traits::{Heuristic, SearchLifecycle};
use crate::graph::{Vertex, VertexId};
use crate::scheduler::RequesterId;

/// Straight-line distance to the goal.
///
/// Admissible for any constraint that never costs an edge below its length.
#[derive(Debug, Default, Clone, Copy)]
pub struct EuclideanHeuristic;

impl SearchLifecycle for EuclideanHeuristic {}

impl Heuristic for EuclideanHeuristic {
    fn name(&self) -> &str {
        "euclidean"
    }

    fn estimate(&self, _requester: RequesterId, from: &Vertex, goal: &Vertex) -> Option<f32> {
        Some(from.position.distance(&goal.position))
    }
}

/// Always zero. The search expands uniformly in every direction.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroHeuristic;

impl SearchLifecycle for ZeroHeuristic {}

impl Heuristic for ZeroHeuristic {
    fn name(&self) -> &str {
        "zero"
    }

    fn estimate(&self, _requester: RequesterId, _from: &Vertex, _goal: &Vertex) -> Option<f32> {
        Some(0.0)
    }
}

/// Scales another heuristic by a constant weight.
///
/// A weight above `1.0` makes the estimate inadmissible: the search
/// converges faster and may return a longer path.
pub struct WeightedHeuristic<H> {
    inner: H,
    weight: f32,
}

impl<H: Heuristic> WeightedHeuristic<H> {
    pub fn new(inner: H, weight: f32) -> Self {
        Self { inner, weight }
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: Heuristic> SearchLifecycle for WeightedHeuristic<H> {
    fn on_start(&mut self, start: VertexId, goal: VertexId) {
        self.inner.on_start(start, goal);
    }

    fn on_pause(&mut self, start: VertexId, goal: VertexId) {
        self.inner.on_pause(start, goal);
    }

    fn on_resume(&mut self, start: VertexId, goal: VertexId) {
        self.inner.on_resume(start, goal);
    }

    fn on_finish(&mut self, start: VertexId, goal: VertexId) {
        self.inner.on_finish(start, goal);
    }
}

impl<H: Heuristic> Heuristic for WeightedHeuristic<H> {
    fn name(&self) -> &str {
        "weighted"
    }

    fn estimate(&self, requester: RequesterId, from: &Vertex, goal: &Vertex) -> Option<f32> {
        self.inner
            .estimate(requester, from, goal)
            .map(|h| h * self.weight)
    }
}

impl<H> std::fmt::Debug for WeightedHeuristic<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedHeuristic")
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{TerrainType, TileId, Vec3};
    use std::cell::Cell;

    fn vertex(index: u32, position: Vec3) -> Vertex {
        Vertex {
            id: VertexId::new(TileId(0), index),
            position,
            terrain: TerrainType::GROUND,
        }
    }

    #[derive(Default)]
    struct CountingHeuristic {
        starts: Cell<u32>,
        finishes: Cell<u32>,
    }

    impl SearchLifecycle for CountingHeuristic {
        fn on_start(&mut self, _start: VertexId, _goal: VertexId) {
            self.starts.set(self.starts.get() + 1);
        }

        fn on_finish(&mut self, _start: VertexId, _goal: VertexId) {
            self.finishes.set(self.finishes.get() + 1);
        }
    }

    impl Heuristic for CountingHeuristic {
        fn name(&self) -> &str {
            "counting"
        }

        fn estimate(&self, _r: RequesterId, _from: &Vertex, _goal: &Vertex) -> Option<f32> {
            Some(1.0)
        }
    }

    #[test]
    fn test_euclidean_distance() {
        let a = vertex(0, Vec3::new(0.0, 0.0, 0.0));
        let b = vertex(1, Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(EuclideanHeuristic.estimate(RequesterId(0), &a, &b), Some(5.0));
    }

    #[test]
    fn test_zero_heuristic() {
        let a = vertex(0, Vec3::new(0.0, 0.0, 0.0));
        let b = vertex(1, Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(ZeroHeuristic.estimate(RequesterId(0), &a, &b), Some(0.0));
    }

    #[test]
    fn test_weighted_scales_inner() {
        let a = vertex(0, Vec3::new(0.0, 0.0, 0.0));
        let b = vertex(1, Vec3::new(3.0, 4.0, 0.0));
        let h = WeightedHeuristic::new(EuclideanHeuristic, 2.0);
        assert_eq!(h.estimate(RequesterId(0), &a, &b), Some(10.0));
    }

    #[test]
    fn test_weighted_forwards_lifecycle() {
        let mut h = WeightedHeuristic::new(CountingHeuristic::default(), 1.5);
        let (s, g) = (VertexId::new(TileId(0), 0), VertexId::new(TileId(0), 1));
        h.on_start(s, g);
        h.on_pause(s, g);
        h.on_finish(s, g);
        assert_eq!(h.inner().starts.get(), 1);
        assert_eq!(h.inner().finishes.get(), 1);
    }
}
