//! Time-sliceable A* search.
//!
//! [`AstarSearch`] expands one vertex per [`step`](AstarSearch::step) and can
//! be paused between any two steps, so a caller can spread one search over
//! many frames. Each search owns its [`SearchNodeTable`] and [`OpenSet`];
//! nothing is shared between searches.

mod astar;
mod error;
mod node_table;
mod open_set;
mod path;

pub use astar::{
    AstarSearch, FailureReason, SearchLimits, SearchState, SearchStats, StepOutcome,
};
pub use error::SearchError;
pub use node_table::{SearchNodeTable, VertexStatus};
pub use open_set::{OpenEntry, OpenSet};
pub use path::{Path, PathNode};
