//! Frame-sliced path queries and the simulation that drives them.

mod config;
mod path_query;
mod simulation;

pub use config::{
    QueryConfig, DEFAULT_ITERATIONS_PER_SLICE, DEFAULT_MAX_STALE_RESTARTS,
    DEFAULT_TIME_CHECK_INTERVAL,
};
pub use path_query::{PathQuery, QueryStats, QueryStatus};
pub use simulation::{AgentHandle, Simulation, SimulationStats, PATHFIND_TASK};
