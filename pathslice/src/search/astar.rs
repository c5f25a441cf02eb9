//! Incremental, pausable A* search.
//!
//! # State machine
//!
//! ```text
//!            start()            step()
//!   Idle ─────────────▶ Running ─────▶ Succeeded | Failed(reason) | Stale
//!    ▲                   │   ▲
//!    │ abandon()  pause()│   │resume()
//!    │                   ▼   │
//!    └──────────────── Paused
//! ```
//!
//! One [`AstarSearch::step`] expands at most one vertex. The search holds no
//! reference into the graph between calls: every call that reads the graph
//! takes it as a parameter, and the search remembers the load version of
//! every tile it explored. On resume, a changed version means the graph was
//! modified underneath the paused search and the search becomes `Stale`.
//!
//! The cost models are notified of every boundary through their
//! [`SearchLifecycle`](crate::cost::SearchLifecycle) hooks. Every `on_start`
//! is matched by exactly one `on_finish`.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use super::error::SearchError;
use super::node_table::{SearchNodeTable, VertexStatus};
use super::open_set::OpenSet;
use super::path::{Path, PathNode};
use crate::cost::{Constraint, Heuristic};
use crate::graph::{SpatialGraph, Tile, TileId, Vertex, VertexId};
use crate::scheduler::RequesterId;

// =============================================================================
// States and Outcomes
// =============================================================================

/// Why a search ended without a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// The open set emptied: no path exists under the current constraint.
    Exhausted,
    /// The start or goal vertex is not in a loaded tile.
    EndpointNotLoaded,
    /// The search touched more vertices than `SearchLimits::max_visited`.
    VisitLimit,
    /// The graph kept changing under the search. Reported by
    /// [`PathQuery`](crate::query::PathQuery) once its restart is spent.
    StaleGraph,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Exhausted => "exhausted",
            FailureReason::EndpointNotLoaded => "endpoint not loaded",
            FailureReason::VisitLimit => "visit limit",
            FailureReason::StaleGraph => "stale graph",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of an [`AstarSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchState {
    Idle,
    Running,
    Paused,
    Succeeded,
    Failed(FailureReason),
    /// The graph changed under the search; it must be restarted.
    Stale,
}

impl SearchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchState::Idle => "idle",
            SearchState::Running => "running",
            SearchState::Paused => "paused",
            SearchState::Succeeded => "succeeded",
            SearchState::Failed(_) => "failed",
            SearchState::Stale => "stale",
        }
    }

    /// True once the search can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchState::Succeeded | SearchState::Failed(_) | SearchState::Stale
        )
    }

    /// True while the search holds open/closed state worth resuming.
    pub fn is_active(&self) -> bool {
        matches!(self, SearchState::Running | SearchState::Paused)
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchState::Failed(reason) => write!(f, "failed ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Result of a single [`AstarSearch::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// More work remains.
    Continue,
    Succeeded,
    Failed(FailureReason),
    Stale,
}

impl StepOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepOutcome::Continue)
    }
}

// =============================================================================
// Limits and Statistics
// =============================================================================

/// Optional ceilings that bound a search in open terrain.
///
/// `max_cost` and `max_distance` prune single branches: a vertex beyond them
/// is closed without being expanded. `max_visited` fails the whole search.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SearchLimits {
    /// Maximum cost from the start of an expanded vertex.
    pub max_cost: Option<f32>,
    /// Maximum straight-line distance from the start of an expanded vertex.
    pub max_distance: Option<f32>,
    /// Maximum number of distinct vertices touched.
    pub max_visited: Option<usize>,
}

impl SearchLimits {
    /// No limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_cost(mut self, max_cost: f32) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    pub fn with_max_visited(mut self, max_visited: usize) -> Self {
        self.max_visited = Some(max_visited);
        self
    }
}

/// Counters for the current (or last) run of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Calls to `step` that did work.
    pub steps: u64,
    /// Vertices whose edges were examined.
    pub expansions: u64,
    /// Distinct vertices closed.
    pub closed_vertices: u64,
    /// Open-set insertions.
    pub pushes: u64,
    /// Closed vertices reopened by a cheaper path.
    pub reopened: u64,
    /// Vertices closed without expansion because of a limit.
    pub pruned: u64,
    /// Edges rejected by the constraint.
    pub forbidden: u64,
}

// =============================================================================
// Search
// =============================================================================

/// A* search over a [`SpatialGraph`] that can be paused between steps.
pub struct AstarSearch {
    requester: RequesterId,
    constraint: Box<dyn Constraint>,
    heuristic: Box<dyn Heuristic>,
    limits: SearchLimits,

    nodes: SearchNodeTable,
    open: OpenSet,
    state: SearchState,
    endpoints: Option<(VertexId, VertexId)>,
    start_vertex: Option<Vertex>,
    goal_vertex: Option<Vertex>,
    /// Load version of every tile the search has read.
    explored_tiles: HashMap<TileId, u64>,

    /// Models received `on_start` and not yet `on_finish`.
    models_active: bool,
    /// Models were replaced during an active search.
    restart_pending: bool,

    stats: SearchStats,
    path: Option<Path>,
}

impl AstarSearch {
    /// Creates an idle search for `requester`.
    pub fn new(
        requester: RequesterId,
        constraint: Box<dyn Constraint>,
        heuristic: Box<dyn Heuristic>,
    ) -> Self {
        Self {
            requester,
            constraint,
            heuristic,
            limits: SearchLimits::default(),
            nodes: SearchNodeTable::new(),
            open: OpenSet::new(),
            state: SearchState::Idle,
            endpoints: None,
            start_vertex: None,
            goal_vertex: None,
            explored_tiles: HashMap::new(),
            models_active: false,
            restart_pending: false,
            stats: SearchStats::default(),
            path: None,
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the limits. Applies from the next step.
    pub fn set_limits(&mut self, limits: SearchLimits) {
        self.limits = limits;
    }

    pub fn requester(&self) -> RequesterId {
        self.requester
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    /// `(start, goal)` of the current or last search.
    pub fn endpoints(&self) -> Option<(VertexId, VertexId)> {
        self.endpoints
    }

    /// The path found, once the search has succeeded.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn constraint(&self) -> &dyn Constraint {
        self.constraint.as_ref()
    }

    pub fn heuristic(&self) -> &dyn Heuristic {
        self.heuristic.as_ref()
    }

    /// Entries in the open set, stale ones included.
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    /// Distinct vertices touched by the current search.
    pub fn visited(&self) -> usize {
        self.nodes.touched()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// True if the models were replaced and the next resume or step restarts.
    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Best known cost from the start to `vertex`.
    pub fn cost_from_start(&self, vertex: VertexId) -> Option<f32> {
        self.nodes.get(vertex).map(|n| n.cost)
    }

    /// Heuristic estimate from `vertex` to the goal.
    pub fn estimated_cost_to_goal(&self, vertex: VertexId) -> Option<f32> {
        self.nodes.get(vertex).map(|n| n.estimate)
    }

    pub fn vertex_status(&self, vertex: VertexId) -> VertexStatus {
        self.nodes.status(vertex)
    }

    /// Vertex on the best known path just before `vertex`.
    pub fn predecessor(&self, vertex: VertexId) -> Option<VertexId> {
        self.nodes.get(vertex).and_then(|n| n.predecessor)
    }

    /// Best known path from the start to a closed vertex.
    pub fn path_to(&self, vertex: VertexId) -> Option<Path> {
        if self.nodes.status(vertex) != VertexStatus::Closed {
            return None;
        }
        self.reconstruct(vertex)
    }

    // -------------------------------------------------------------------------
    // Model replacement
    // -------------------------------------------------------------------------

    /// Replaces the constraint.
    ///
    /// An active search is restarted at the next `resume` or `step`; it never
    /// continues with costs computed by the old model.
    pub fn set_constraint(&mut self, constraint: Box<dyn Constraint>) {
        self.invalidate_models();
        self.constraint = constraint;
    }

    /// Replaces the heuristic. Same restart rule as
    /// [`set_constraint`](Self::set_constraint).
    pub fn set_heuristic(&mut self, heuristic: Box<dyn Heuristic>) {
        self.invalidate_models();
        self.heuristic = heuristic;
    }

    fn invalidate_models(&mut self) {
        if self.state.is_active() {
            self.finish_models();
            self.restart_pending = true;
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Starts a new search, abandoning any search in progress.
    ///
    /// Returns `Running`, or `Failed(EndpointNotLoaded)` if either endpoint
    /// is not loaded.
    pub fn start(&mut self, graph: &SpatialGraph, start: VertexId, goal: VertexId) -> SearchState {
        self.finish_models();
        self.endpoints = Some((start, goal));
        self.begin(graph, start, goal)
    }

    /// Starts the last search again from scratch.
    pub fn restart(&mut self, graph: &SpatialGraph) -> Result<SearchState, SearchError> {
        let (start, goal) = self.endpoints.ok_or(SearchError::NotStarted)?;
        self.finish_models();
        Ok(self.begin(graph, start, goal))
    }

    /// Suspends a running search at the current step boundary.
    ///
    /// Pausing a paused search does nothing.
    pub fn pause(&mut self) -> Result<(), SearchError> {
        match self.state {
            SearchState::Running => {}
            SearchState::Paused => return Ok(()),
            SearchState::Idle => return Err(SearchError::NotStarted),
            state => {
                return Err(SearchError::InvalidState {
                    operation: "pause",
                    state,
                })
            }
        }

        self.state = SearchState::Paused;
        if self.models_active {
            if let Some((start, goal)) = self.endpoints {
                self.constraint.on_pause(start, goal);
                self.heuristic.on_pause(start, goal);
            }
        }
        trace!(requester = %self.requester, open = self.open.len(), "Search paused");
        Ok(())
    }

    /// Continues a paused search.
    ///
    /// Restarts instead if the models were replaced, and turns `Stale` if a
    /// tile the search explored was unloaded or reloaded meanwhile.
    pub fn resume(&mut self, graph: &SpatialGraph) -> Result<SearchState, SearchError> {
        match self.state {
            SearchState::Paused => {}
            SearchState::Running => return Ok(SearchState::Running),
            SearchState::Idle => return Err(SearchError::NotStarted),
            state => {
                return Err(SearchError::InvalidState {
                    operation: "resume",
                    state,
                })
            }
        }
        let (start, goal) = self.endpoints.ok_or(SearchError::NotStarted)?;

        if self.restart_pending {
            debug!(requester = %self.requester, "Cost models replaced, restarting search");
            return Ok(self.begin(graph, start, goal));
        }

        if let Some(tile) = self.first_changed_tile(graph) {
            debug!(requester = %self.requester, tile = %tile, "Explored tile changed while paused");
            self.mark_stale();
            return Ok(self.state);
        }

        self.state = SearchState::Running;
        self.constraint.on_resume(start, goal);
        self.heuristic.on_resume(start, goal);
        trace!(requester = %self.requester, "Search resumed");
        Ok(self.state)
    }

    /// Abandons a running or paused search, returning it to `Idle`.
    ///
    /// The node table is kept for reuse by the next search. Returns false if
    /// there was nothing to abandon.
    pub fn abandon(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        self.finish_models();
        self.open.clear();
        self.restart_pending = false;
        self.state = SearchState::Idle;
        debug!(requester = %self.requester, steps = self.stats.steps, "Search abandoned");
        true
    }

    /// Steps until the search reaches a terminal state.
    pub fn run_to_completion(&mut self, graph: &SpatialGraph) -> Result<SearchState, SearchError> {
        while !self.step(graph)?.is_terminal() {}
        Ok(self.state)
    }

    // -------------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------------

    /// Expands at most one vertex.
    ///
    /// Calling `step` on a terminal search returns its outcome again without
    /// doing anything.
    pub fn step(&mut self, graph: &SpatialGraph) -> Result<StepOutcome, SearchError> {
        match self.state {
            SearchState::Running => {}
            SearchState::Idle => return Err(SearchError::NotStarted),
            SearchState::Paused => {
                return Err(SearchError::InvalidState {
                    operation: "step",
                    state: self.state,
                })
            }
            _ => return Ok(self.outcome()),
        }
        let (start, goal) = self.endpoints.ok_or(SearchError::NotStarted)?;

        if self.restart_pending {
            self.begin(graph, start, goal);
            if self.state.is_terminal() {
                return Ok(self.outcome());
            }
        }

        self.stats.steps += 1;

        let Some(current) = self.pop_open() else {
            self.fail(FailureReason::Exhausted);
            return Ok(self.outcome());
        };

        if current == goal {
            self.close(current);
            self.path = self.reconstruct(goal);
            self.state = SearchState::Succeeded;
            self.finish_models();
            debug!(
                requester = %self.requester,
                start = %start,
                goal = %goal,
                cost = format!("{:.3}", self.path.as_ref().map_or(0.0, Path::cost)),
                steps = self.stats.steps,
                expansions = self.stats.expansions,
                "Path found"
            );
            return Ok(StepOutcome::Succeeded);
        }

        let from = match graph.vertex(current) {
            Ok(vertex) if !self.tile_changed(graph, current.tile) => *vertex,
            _ => {
                self.mark_stale();
                return Ok(StepOutcome::Stale);
            }
        };

        let cost = self.close(current);

        if self.beyond_limits(cost, &from) {
            self.stats.pruned += 1;
            trace!(vertex = %current, cost = format!("{:.3}", cost), "Pruned vertex beyond limits");
            return Ok(StepOutcome::Continue);
        }

        self.stats.expansions += 1;
        trace!(
            vertex = %current,
            cost = format!("{:.3}", cost),
            open = self.open.len(),
            "Expanding vertex"
        );

        let edges = match graph.out_edges(current) {
            Ok(edges) => edges,
            Err(_) => {
                self.mark_stale();
                return Ok(StepOutcome::Stale);
            }
        };
        let goal_vertex = match self.goal_vertex {
            Some(vertex) => vertex,
            None => return Err(SearchError::NotStarted),
        };

        for edge in edges {
            // Edges into tiles that are not loaded are not traversable.
            let Ok(to) = graph.vertex(edge.to) else {
                continue;
            };

            let Some(edge_cost) = self
                .constraint
                .cost(self.requester, edge, &from, to)
                .filter(|c| c.is_finite() && *c >= 0.0)
            else {
                self.stats.forbidden += 1;
                continue;
            };
            let tentative = cost + edge_cost;

            if let Some(node) = self.nodes.get_mut(edge.to) {
                if tentative >= node.cost {
                    continue;
                }
                let reopened = node.status == VertexStatus::Closed;
                node.cost = tentative;
                node.predecessor = Some(current);
                node.status = VertexStatus::Open;
                node.open_seq = self.open.push(edge.to, tentative + node.estimate);
                self.stats.pushes += 1;
                if reopened {
                    self.stats.reopened += 1;
                }
                continue;
            }

            if self
                .limits
                .max_visited
                .is_some_and(|max| self.nodes.touched() >= max)
            {
                self.fail(FailureReason::VisitLimit);
                return Ok(self.outcome());
            }

            let Some(estimate) = self.heuristic.estimate(self.requester, to, &goal_vertex) else {
                continue;
            };

            self.record_tile(graph, edge.to.tile);
            let tile_len = graph.tile(edge.to.tile).map_or(0, Tile::vertex_count);
            let seq = self.open.push(edge.to, tentative + estimate);
            let node = self.nodes.touch(edge.to, tile_len);
            node.cost = tentative;
            node.estimate = estimate;
            node.predecessor = Some(current);
            node.status = VertexStatus::Open;
            node.open_seq = seq;
            self.stats.pushes += 1;
        }

        Ok(StepOutcome::Continue)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn begin(&mut self, graph: &SpatialGraph, start: VertexId, goal: VertexId) -> SearchState {
        self.nodes.begin_epoch();
        self.open.clear();
        self.explored_tiles.clear();
        self.stats = SearchStats::default();
        self.path = None;
        self.restart_pending = false;
        self.start_vertex = None;
        self.goal_vertex = None;

        self.constraint.on_start(start, goal);
        self.heuristic.on_start(start, goal);
        self.models_active = true;

        let (start_vertex, goal_vertex) = match (graph.vertex(start), graph.vertex(goal)) {
            (Ok(s), Ok(g)) => (*s, *g),
            _ => {
                self.fail(FailureReason::EndpointNotLoaded);
                return self.state;
            }
        };
        self.start_vertex = Some(start_vertex);
        self.goal_vertex = Some(goal_vertex);
        self.record_tile(graph, start.tile);
        self.record_tile(graph, goal.tile);

        let estimate = self
            .heuristic
            .estimate(self.requester, &start_vertex, &goal_vertex)
            .unwrap_or(0.0);
        let tile_len = graph.tile(start.tile).map_or(0, Tile::vertex_count);
        let seq = self.open.push(start, estimate);
        let node = self.nodes.touch(start, tile_len);
        node.cost = 0.0;
        node.estimate = estimate;
        node.status = VertexStatus::Open;
        node.open_seq = seq;
        self.stats.pushes += 1;

        self.state = SearchState::Running;
        debug!(
            requester = %self.requester,
            start = %start,
            goal = %goal,
            constraint = self.constraint.name(),
            heuristic = self.heuristic.name(),
            "Search started"
        );
        self.state
    }

    /// Pops the best live entry, discarding superseded ones.
    fn pop_open(&mut self) -> Option<VertexId> {
        while let Some(entry) = self.open.pop() {
            let live = self
                .nodes
                .get(entry.vertex)
                .is_some_and(|n| n.status == VertexStatus::Open && n.open_seq == entry.seq);
            if live {
                return Some(entry.vertex);
            }
        }
        None
    }

    /// Marks a popped vertex closed and returns its cost from start.
    fn close(&mut self, vertex: VertexId) -> f32 {
        let Some(node) = self.nodes.get_mut(vertex) else {
            return f32::INFINITY;
        };
        node.status = VertexStatus::Closed;
        if !node.ever_closed {
            node.ever_closed = true;
            self.stats.closed_vertices += 1;
        }
        node.cost
    }

    fn beyond_limits(&self, cost: f32, vertex: &Vertex) -> bool {
        if self.limits.max_cost.is_some_and(|max| cost > max) {
            return true;
        }
        match (self.limits.max_distance, self.start_vertex) {
            (Some(max), Some(start)) => start.position.distance(&vertex.position) > max,
            _ => false,
        }
    }

    fn reconstruct(&self, target: VertexId) -> Option<Path> {
        let mut nodes = Vec::new();
        let mut cursor = Some(target);
        while let Some(vertex) = cursor {
            let node = self.nodes.get(vertex)?;
            nodes.push(PathNode {
                vertex,
                cost: node.cost,
            });
            if nodes.len() > self.nodes.touched() {
                return None;
            }
            cursor = node.predecessor;
        }
        nodes.reverse();
        Path::from_nodes(nodes)
    }

    fn record_tile(&mut self, graph: &SpatialGraph, tile: TileId) {
        if let Some(version) = graph.tile_version(tile) {
            self.explored_tiles.entry(tile).or_insert(version);
        }
    }

    fn tile_changed(&self, graph: &SpatialGraph, tile: TileId) -> bool {
        self.explored_tiles
            .get(&tile)
            .is_some_and(|&version| graph.tile_version(tile) != Some(version))
    }

    fn first_changed_tile(&self, graph: &SpatialGraph) -> Option<TileId> {
        self.explored_tiles
            .iter()
            .find(|&(&tile, &version)| graph.tile_version(tile) != Some(version))
            .map(|(&tile, _)| tile)
    }

    fn fail(&mut self, reason: FailureReason) {
        self.state = SearchState::Failed(reason);
        self.open.clear();
        self.finish_models();
        debug!(
            requester = %self.requester,
            reason = %reason,
            steps = self.stats.steps,
            closed = self.stats.closed_vertices,
            "Search failed"
        );
    }

    fn mark_stale(&mut self) {
        self.state = SearchState::Stale;
        self.open.clear();
        self.finish_models();
        debug!(requester = %self.requester, steps = self.stats.steps, "Search stale");
    }

    fn finish_models(&mut self) {
        if !self.models_active {
            return;
        }
        if let Some((start, goal)) = self.endpoints {
            self.constraint.on_finish(start, goal);
            self.heuristic.on_finish(start, goal);
        }
        self.models_active = false;
    }

    fn outcome(&self) -> StepOutcome {
        match self.state {
            SearchState::Succeeded => StepOutcome::Succeeded,
            SearchState::Failed(reason) => StepOutcome::Failed(reason),
            SearchState::Stale => StepOutcome::Stale,
            SearchState::Idle | SearchState::Running | SearchState::Paused => StepOutcome::Continue,
        }
    }
}

impl Drop for AstarSearch {
    fn drop(&mut self) {
        self.finish_models();
    }
}

impl fmt::Debug for AstarSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstarSearch")
            .field("requester", &self.requester)
            .field("constraint", &self.constraint.name())
            .field("heuristic", &self.heuristic.name())
            .field("state", &self.state)
            .field("endpoints", &self.endpoints)
            .field("stats", &self.stats)
            .finish()
    }
}
