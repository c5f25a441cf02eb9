//! Owner of the navigation world and the per-frame driver.
//!
//! A [`Simulation`] holds the graph, the scheduler and every agent's path
//! query. The host calls [`Simulation::update`] once per frame; tiles are
//! loaded and unloaded between frames through `&mut self`, so a search never
//! observes the graph changing under a running step.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use super::config::QueryConfig;
use super::path_query::{PathQuery, QueryStatus};
use crate::cost::{Constraint, EuclideanHeuristic, Heuristic, ShortestPathConstraint};
use crate::error::Error;
use crate::graph::{SpatialGraph, Tile, TileId, VertexId};
use crate::scheduler::{
    FrameReport, RequesterId, RequesterKind, SchedulerError, TaskId, TimeBudgetScheduler,
};
use crate::search::{Path, SearchLimits};

/// Name of the aperiodic task path queries are sliced under.
pub const PATHFIND_TASK: &str = "pathfind";

/// Handle to an agent spawned in a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentHandle(RequesterId);

impl AgentHandle {
    /// The scheduler requester backing this agent.
    pub fn requester(&self) -> RequesterId {
        self.0
    }
}

impl fmt::Display for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent:{}", self.0)
    }
}

/// Totals over the lifetime of a simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationStats {
    pub frames: u64,
    pub agents_spawned: u64,
    pub queries_started: u64,
    pub paths_found: u64,
    pub paths_failed: u64,
    pub queries_abandoned: u64,
    /// Pathfinding slices granted.
    pub granted_slices: u64,
    /// Pathfinding requests denied.
    pub denied_slices: u64,
    /// Search steps of finished queries.
    pub search_steps: u64,
    pub stale_restarts: u64,
    /// Time charged to the pathfinding task, all frames.
    pub consumed_ms: f64,
    /// Largest single-frame consumption.
    pub max_frame_ms: f64,
    /// Frames that ended with debt carried forward.
    pub overrun_frames: u64,
}

#[derive(Debug)]
struct Agent {
    kind: RequesterKind,
    query: Option<PathQuery>,
}

/// A navigation world: graph, scheduler and agents.
#[derive(Debug)]
pub struct Simulation {
    graph: SpatialGraph,
    scheduler: TimeBudgetScheduler,
    pathfind_task: TaskId,
    query_config: QueryConfig,
    search_limits: SearchLimits,
    agents: BTreeMap<RequesterId, Agent>,
    stats: SimulationStats,
}

impl Simulation {
    /// Creates a simulation. Registers the [`PATHFIND_TASK`] task unless the
    /// scheduler already has it.
    pub fn new(graph: SpatialGraph, mut scheduler: TimeBudgetScheduler) -> Result<Self, Error> {
        let pathfind_task = match scheduler.task_by_name(PATHFIND_TASK) {
            Some(task) => task,
            None => scheduler.register_aperiodic_task(PATHFIND_TASK)?,
        };
        Ok(Self {
            graph,
            scheduler,
            pathfind_task,
            query_config: QueryConfig::default(),
            search_limits: SearchLimits::default(),
            agents: BTreeMap::new(),
            stats: SimulationStats::default(),
        })
    }

    /// Slicing parameters for queries started from now on.
    pub fn with_query_config(mut self, config: QueryConfig) -> Self {
        self.query_config = config;
        self
    }

    /// Search limits for queries started from now on.
    pub fn with_search_limits(mut self, limits: SearchLimits) -> Self {
        self.search_limits = limits;
        self
    }

    pub fn graph(&self) -> &SpatialGraph {
        &self.graph
    }

    pub fn scheduler(&self) -> &TimeBudgetScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TimeBudgetScheduler {
        &mut self.scheduler
    }

    pub fn pathfind_task(&self) -> TaskId {
        self.pathfind_task
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    // -------------------------------------------------------------------------
    // Tiles
    // -------------------------------------------------------------------------

    /// Loads a tile. Paused searches that explored an older copy of it go
    /// stale at their next slice.
    pub fn load_tile(&mut self, tile: Tile) -> Result<u64, Error> {
        Ok(self.graph.load_tile(tile)?)
    }

    pub fn unload_tile(&mut self, id: TileId) -> Option<Tile> {
        self.graph.unload_tile(id)
    }

    // -------------------------------------------------------------------------
    // Agents
    // -------------------------------------------------------------------------

    pub fn spawn_agent(&mut self, kind: RequesterKind) -> AgentHandle {
        let id = self.scheduler.add_requester(kind);
        self.agents.insert(id, Agent { kind, query: None });
        self.stats.agents_spawned += 1;
        AgentHandle(id)
    }

    /// Removes an agent, abandoning its query.
    pub fn despawn_agent(&mut self, agent: AgentHandle) -> Result<(), Error> {
        let mut removed = self
            .agents
            .remove(&agent.0)
            .ok_or(SchedulerError::UnknownRequester(agent.0))?;
        if let Some(query) = removed.query.as_mut() {
            if query.cancel() {
                self.stats.queries_abandoned += 1;
            }
        }
        self.scheduler.remove_requester(agent.0)?;
        Ok(())
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> impl Iterator<Item = AgentHandle> + '_ {
        self.agents.keys().map(|&id| AgentHandle(id))
    }

    pub fn agent_kind(&self, agent: AgentHandle) -> Option<RequesterKind> {
        self.agents.get(&agent.0).map(|a| a.kind)
    }

    /// Agents whose requester has been idle longer than the scheduler's
    /// configured `stale_requester_after`.
    pub fn stale_agents(&self) -> Vec<AgentHandle> {
        let max_idle = self.scheduler.config().stale_requester_after;
        self.scheduler
            .collect_stale_requesters(max_idle)
            .into_iter()
            .filter(|id| self.agents.contains_key(id))
            .map(AgentHandle)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Requests a shortest path for `agent`, replacing any query it has.
    pub fn request_path(
        &mut self,
        agent: AgentHandle,
        start: VertexId,
        goal: VertexId,
    ) -> Result<QueryStatus, Error> {
        self.request_path_with(
            agent,
            start,
            goal,
            Box::new(ShortestPathConstraint::new()),
            Box::new(EuclideanHeuristic),
        )
    }

    /// Requests a path with explicit cost models.
    pub fn request_path_with(
        &mut self,
        agent: AgentHandle,
        start: VertexId,
        goal: VertexId,
        constraint: Box<dyn Constraint>,
        heuristic: Box<dyn Heuristic>,
    ) -> Result<QueryStatus, Error> {
        let entry = self
            .agents
            .get_mut(&agent.0)
            .ok_or(SchedulerError::UnknownRequester(agent.0))?;

        if let Some(previous) = entry.query.as_mut() {
            if previous.cancel() {
                self.stats.queries_abandoned += 1;
            }
        }

        let search = crate::search::AstarSearch::new(agent.0, constraint, heuristic)
            .with_limits(self.search_limits);
        let mut query = PathQuery::new(search, self.pathfind_task, self.query_config);
        let status = query.start(&self.graph, start, goal)?;
        self.stats.queries_started += 1;
        if status.is_terminal() {
            Self::record_finished(&mut self.stats, &query);
        }
        entry.query = Some(query);

        debug!(agent = %agent, start = %start, goal = %goal, status = %status, "Path requested");
        Ok(status)
    }

    /// Abandons the agent's query. Returns false if it had none in progress.
    pub fn cancel_path(&mut self, agent: AgentHandle) -> Result<bool, Error> {
        let entry = self
            .agents
            .get_mut(&agent.0)
            .ok_or(SchedulerError::UnknownRequester(agent.0))?;
        let cancelled = entry.query.as_mut().is_some_and(|q| q.cancel());
        if cancelled {
            self.stats.queries_abandoned += 1;
        }
        Ok(cancelled)
    }

    pub fn query(&self, agent: AgentHandle) -> Option<&PathQuery> {
        self.agents.get(&agent.0)?.query.as_ref()
    }

    /// Mutable access, e.g. to replace a query's cost models mid-search.
    pub fn query_mut(&mut self, agent: AgentHandle) -> Option<&mut PathQuery> {
        self.agents.get_mut(&agent.0)?.query.as_mut()
    }

    pub fn query_status(&self, agent: AgentHandle) -> Option<QueryStatus> {
        self.query(agent).map(|q| q.status())
    }

    pub fn path(&self, agent: AgentHandle) -> Option<&Path> {
        self.query(agent)?.path()
    }

    /// Number of queries still computing.
    pub fn pending_queries(&self) -> usize {
        self.agents
            .values()
            .filter_map(|a| a.query.as_ref())
            .filter(|q| !q.status().is_terminal())
            .count()
    }

    // -------------------------------------------------------------------------
    // Frame driver
    // -------------------------------------------------------------------------

    /// Runs one frame: begins it, lets every agent with a pending query ask
    /// for a slice in priority order, then ends it.
    pub fn update(&mut self, delta: Duration) -> Result<FrameReport, Error> {
        self.scheduler.begin_frame(delta);
        let ticked = self.tick_agents();
        let report = self.scheduler.end_frame();
        ticked?;

        self.stats.frames += 1;
        if let Some(task) = report.task(PATHFIND_TASK) {
            self.stats.granted_slices += u64::from(task.grants);
            self.stats.denied_slices += u64::from(task.denials);
        }
        self.stats.consumed_ms += report.consumed_ms;
        self.stats.max_frame_ms = self.stats.max_frame_ms.max(report.consumed_ms);
        if report.debt_out_ms > 0.0 {
            self.stats.overrun_frames += 1;
        }
        Ok(report)
    }

    fn tick_agents(&mut self) -> Result<(), Error> {
        let order = self.scheduler.requesters_by_priority().to_vec();
        for id in order {
            let Some(query) = self.agents.get_mut(&id).and_then(|a| a.query.as_mut()) else {
                continue;
            };
            if query.status().is_terminal() {
                continue;
            }
            let status = query.tick(&self.graph, &mut self.scheduler)?;
            if status.is_terminal() {
                Self::record_finished(&mut self.stats, query);
            }
        }
        Ok(())
    }

    fn record_finished(stats: &mut SimulationStats, query: &PathQuery) {
        match query.status() {
            QueryStatus::Found => stats.paths_found += 1,
            QueryStatus::NoPath(_) => stats.paths_failed += 1,
            QueryStatus::Computing | QueryStatus::Abandoned => return,
        }
        let query_stats = query.stats();
        stats.search_steps += query_stats.total_steps;
        stats.stale_restarts += u64::from(query_stats.restarts);
        info!(
            requester = %query.requester(),
            status = %query.status(),
            steps = query_stats.total_steps,
            slices = query_stats.granted_slices,
            "Path query complete"
        );
    }
}
