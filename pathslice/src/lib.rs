//! pathslice - time-sliced A* pathfinding for frame-based simulations
//!
//! Many agents search a tiled navigation graph at once, but a frame only has
//! a few milliseconds to spare. This crate splits every search into single
//! vertex expansions and hands out the frame's CPU time with a priority
//! scheduler, so each agent makes progress without any frame exceeding its
//! budget on average.
//!
//! # Layout
//!
//! - [`graph`] - tiles of vertices and edges that stream in and out
//! - [`cost`] - pluggable edge constraints and heuristics
//! - [`search`] - the pausable A* search
//! - [`scheduler`] - per-frame time budget and requester priorities
//! - [`query`] - path queries driven by the scheduler, and the [`Simulation`]
//!   owning it all
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pathslice::graph::GridGraphBuilder;
//! use pathslice::query::{QueryStatus, Simulation};
//! use pathslice::scheduler::{RequesterKind, SchedulerConfig, SystemClock, TimeBudgetScheduler};
//!
//! let grid = GridGraphBuilder::new(32, 32).tile_size(8);
//! let scheduler = TimeBudgetScheduler::new(SchedulerConfig::default(), Arc::new(SystemClock::new()));
//! let mut sim = Simulation::new(grid.build()?, scheduler)?;
//!
//! let agent = sim.spawn_agent(RequesterKind::Bot);
//! let start = grid.vertex_id(0, 0).unwrap();
//! let goal = grid.vertex_id(31, 31).unwrap();
//! sim.request_path(agent, start, goal)?;
//!
//! while sim.query_status(agent) == Some(QueryStatus::Computing) {
//!     sim.update(Duration::from_millis(16))?;
//! }
//! assert_eq!(sim.path(agent).unwrap().edge_count(), 62);
//! # Ok::<(), pathslice::Error>(())
//! ```

pub mod config;
pub mod cost;
pub mod error;
pub mod graph;
pub mod logging;
pub mod query;
pub mod scheduler;
pub mod search;

pub use config::{ConfigError, NavConfig};
pub use error::{Error, Result};
pub use logging::{init_logging, LoggingConfig, LoggingError};
pub use query::{AgentHandle, PathQuery, QueryStatus, Simulation, SimulationStats};
