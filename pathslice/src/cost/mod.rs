//! Pluggable cost models: constraints and heuristics.

mod constraint;
mod heuristic;
mod traits;

pub use constraint::{ShortestPathConstraint, SphereConstraint, TerrainMaskConstraint};
pub use heuristic::{EuclideanHeuristic, WeightedHeuristic, ZeroHeuristic};
pub use traits::{Constraint, Heuristic, SearchLifecycle};
