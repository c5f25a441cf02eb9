//! Cost model abstraction.
//!
//! A search is parameterized by two strategy objects:
//!
//! - a [`Constraint`] gives the exact cost of traversing an edge, or forbids it
//! - a [`Heuristic`] gives a fast estimate of the remaining cost to the goal
//!
//! Both receive the [`RequesterId`] of the searching agent, so one model
//! instance can serve agents with different capabilities.
//!
//! # Lifecycle
//!
//! Stateful models synchronize with the search through [`SearchLifecycle`].
//! The search calls `on_start` when it begins (or restarts), `on_pause` and
//! `on_resume` at frame boundaries, and `on_finish` when it terminates or is
//! abandoned. After `on_pause` the next call is either `on_resume` or, when
//! the search decided to restart, `on_finish` followed by `on_start`.

use crate::graph::{Edge, Vertex, VertexId};
use crate::scheduler::RequesterId;

/// Hooks invoked at the search's own state boundaries.
///
/// Every hook has a no-op default, so stateless models implement nothing.
pub trait SearchLifecycle {
    fn on_start(&mut self, _start: VertexId, _goal: VertexId) {}

    fn on_pause(&mut self, _start: VertexId, _goal: VertexId) {}

    fn on_resume(&mut self, _start: VertexId, _goal: VertexId) {}

    fn on_finish(&mut self, _start: VertexId, _goal: VertexId) {}
}

/// Exact traversal cost of an edge.
///
/// # Implementors
///
/// - `ShortestPathConstraint` - edge length scaled per terrain type
/// - `TerrainMaskConstraint` - forbids terrain types the agent cannot cross
/// - `SphereConstraint` - forbids leaving a sphere around a point
pub trait Constraint: SearchLifecycle + Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns the cost of moving along `edge` from `from` to `to`, or `None`
    /// if the edge is forbidden for `requester`.
    ///
    /// A forbidden edge is skipped entirely by the search, it is never just
    /// penalized. Returned costs must be finite and non-negative.
    fn cost(
        &self,
        requester: RequesterId,
        edge: &Edge,
        from: &Vertex,
        to: &Vertex,
    ) -> Option<f32>;
}

/// Estimate of the remaining cost from a vertex to the goal.
///
/// The estimate orders the open set only and is never added to path costs.
/// It may overestimate: an inadmissible heuristic trades optimality for
/// faster convergence.
///
/// # Implementors
///
/// - `EuclideanHeuristic` - straight-line distance (admissible)
/// - `ZeroHeuristic` - always zero, degrades A* to Dijkstra
/// - `WeightedHeuristic` - scales another heuristic
pub trait Heuristic: SearchLifecycle + Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns the estimated cost from `from` to `goal`, or `None` if the
    /// vertex should not be considered at all.
    fn estimate(&self, requester: RequesterId, from: &Vertex, goal: &Vertex) -> Option<f32>;
}

impl<T: SearchLifecycle + ?Sized> SearchLifecycle for Box<T> {
    fn on_start(&mut self, start: VertexId, goal: VertexId) {
        (**self).on_start(start, goal)
    }

    fn on_pause(&mut self, start: VertexId, goal: VertexId) {
        (**self).on_pause(start, goal)
    }

    fn on_resume(&mut self, start: VertexId, goal: VertexId) {
        (**self).on_resume(start, goal)
    }

    fn on_finish(&mut self, start: VertexId, goal: VertexId) {
        (**self).on_finish(start, goal)
    }
}

impl<T: Constraint + ?Sized> Constraint for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn cost(
        &self,
        requester: RequesterId,
        edge: &Edge,
        from: &Vertex,
        to: &Vertex,
    ) -> Option<f32> {
        (**self).cost(requester, edge, from, to)
    }
}

impl<T: Heuristic + ?Sized> Heuristic for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn estimate(&self, requester: RequesterId, from: &Vertex, goal: &Vertex) -> Option<f32> {
        (**self).estimate(requester, from, goal)
    }
}
