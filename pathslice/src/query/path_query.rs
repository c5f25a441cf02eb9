//! A path request driven across frames.
//!
//! Each frame the owner calls [`PathQuery::tick`]. The query asks the
//! scheduler for a slice of the pathfinding task; when granted it resumes its
//! search, steps it until the iteration cap or the slice's time is spent,
//! pauses it again and reports the elapsed time back to the scheduler.
//!
//! A search that goes stale because tiles changed is restarted
//! automatically, up to `QueryConfig::max_stale_restarts` times.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use super::config::QueryConfig;
use crate::cost::{Constraint, Heuristic};
use crate::error::Error;
use crate::graph::{SpatialGraph, VertexId};
use crate::scheduler::{RequesterId, TaskId, TimeBudgetScheduler};
use crate::search::{AstarSearch, FailureReason, Path, SearchState, SearchStats, StepOutcome};

/// Caller-facing state of a [`PathQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryStatus {
    /// Still searching, or waiting for time.
    Computing,
    /// A path is available.
    Found,
    /// Definitive failure.
    NoPath(FailureReason),
    /// Cancelled by the caller.
    Abandoned,
}

impl QueryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryStatus::Computing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Computing => "computing",
            QueryStatus::Found => "found",
            QueryStatus::NoPath(_) => "no path",
            QueryStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatus::NoPath(reason) => write!(f, "no path ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Counters of one query across all its restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Frames in which the scheduler granted a slice.
    pub granted_slices: u64,
    /// Frames in which the request was denied.
    pub denied_frames: u64,
    /// Automatic restarts after stale searches.
    pub restarts: u32,
    /// Search steps, summed over restarts.
    pub total_steps: u64,
}

/// One agent's path request, time-sliced by the scheduler.
#[derive(Debug)]
pub struct PathQuery {
    search: AstarSearch,
    task: TaskId,
    config: QueryConfig,
    status: QueryStatus,
    stats: QueryStats,
}

impl PathQuery {
    /// Wraps an idle search. `task` is the scheduler task slices are
    /// requested from.
    pub fn new(search: AstarSearch, task: TaskId, config: QueryConfig) -> Self {
        Self {
            search,
            task,
            config,
            status: QueryStatus::Computing,
            stats: QueryStats::default(),
        }
    }

    /// Starts a query between two vertices. The search does not step until
    /// the first granted tick.
    pub fn start(
        &mut self,
        graph: &SpatialGraph,
        start: VertexId,
        goal: VertexId,
    ) -> Result<QueryStatus, Error> {
        self.stats = QueryStats::default();
        self.status = QueryStatus::Computing;

        let state = self.search.start(graph, start, goal);
        if state == SearchState::Running {
            self.search.pause()?;
        }
        self.sync_status(state);
        Ok(self.status)
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats {
            total_steps: self.stats.total_steps + self.search.stats().steps,
            ..self.stats
        }
    }

    /// Counters of the current search run only.
    pub fn search_stats(&self) -> &SearchStats {
        self.search.stats()
    }

    pub fn search(&self) -> &AstarSearch {
        &self.search
    }

    pub fn requester(&self) -> RequesterId {
        self.search.requester()
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn endpoints(&self) -> Option<(VertexId, VertexId)> {
        self.search.endpoints()
    }

    /// The path, once found.
    pub fn path(&self) -> Option<&Path> {
        match self.status {
            QueryStatus::Found => self.search.path(),
            _ => None,
        }
    }

    /// Replaces the constraint. An unfinished search restarts at its next slice.
    pub fn set_constraint(&mut self, constraint: Box<dyn Constraint>) {
        self.search.set_constraint(constraint);
    }

    /// Replaces the heuristic. An unfinished search restarts at its next slice.
    pub fn set_heuristic(&mut self, heuristic: Box<dyn Heuristic>) {
        self.search.set_heuristic(heuristic);
    }

    /// Abandons the query. Returns false if it had already finished.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.search.abandon();
        self.status = QueryStatus::Abandoned;
        debug!(requester = %self.requester(), "Path query cancelled");
        true
    }

    /// Runs this frame's share of the query.
    ///
    /// Does nothing once the query is terminal. A denied request leaves the
    /// search paused; the scheduler has already raised the requester's
    /// priority for the next frame.
    pub fn tick(
        &mut self,
        graph: &SpatialGraph,
        scheduler: &mut TimeBudgetScheduler,
    ) -> Result<QueryStatus, Error> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        let requester = self.requester();
        if !scheduler.request_aperiodic(self.task, requester)? {
            self.stats.denied_frames += 1;
            return Ok(self.status);
        }
        self.stats.granted_slices += 1;

        let slice = self.run_slice(graph, scheduler);
        scheduler.process_feedback(self.task, requester)?;
        slice?;

        Ok(self.status)
    }

    fn run_slice(
        &mut self,
        graph: &SpatialGraph,
        scheduler: &TimeBudgetScheduler,
    ) -> Result<(), Error> {
        let slice_start = scheduler.now();
        let allowed = scheduler.available_time(self.task)?;
        let interval = self.config.time_check_interval.max(1);
        let max_iterations = self.config.iterations_per_slice.max(1);

        if self.search.state() == SearchState::Paused {
            let state = self.search.resume(graph)?;
            if state.is_terminal() && !self.handle_terminal(graph, state)? {
                return Ok(());
            }
        }

        let mut iteration = 0;
        while iteration < max_iterations {
            if iteration > 0
                && iteration % interval == 0
                && scheduler.now().saturating_sub(slice_start) >= allowed
            {
                break;
            }
            iteration += 1;

            match self.search.step(graph)? {
                StepOutcome::Continue => {}
                _ => {
                    let state = self.search.state();
                    if !self.handle_terminal(graph, state)? {
                        return Ok(());
                    }
                }
            }
        }

        if self.search.state() == SearchState::Running {
            self.search.pause()?;
        }
        Ok(())
    }

    /// Applies a terminal search state. Returns true if the search was
    /// restarted and the slice may continue.
    fn handle_terminal(&mut self, graph: &SpatialGraph, state: SearchState) -> Result<bool, Error> {
        if state != SearchState::Stale {
            self.sync_status(state);
            return Ok(false);
        }

        let requester = self.requester();
        if self.stats.restarts >= self.config.max_stale_restarts {
            warn!(
                requester = %requester,
                restarts = self.stats.restarts,
                "Search stale again, giving up"
            );
            self.status = QueryStatus::NoPath(FailureReason::StaleGraph);
            return Ok(false);
        }

        self.stats.restarts += 1;
        self.stats.total_steps += self.search.stats().steps;
        debug!(requester = %requester, restart = self.stats.restarts, "Restarting stale search");

        let state = self.search.restart(graph)?;
        if state.is_terminal() {
            self.sync_status(state);
            return Ok(false);
        }
        Ok(true)
    }

    fn sync_status(&mut self, state: SearchState) {
        self.status = match state {
            SearchState::Succeeded => QueryStatus::Found,
            SearchState::Failed(reason) => QueryStatus::NoPath(reason),
            SearchState::Stale => QueryStatus::NoPath(FailureReason::StaleGraph),
            SearchState::Idle | SearchState::Running | SearchState::Paused => QueryStatus::Computing,
        };
        if self.status.is_terminal() {
            debug!(
                requester = %self.requester(),
                status = %self.status,
                slices = self.stats.granted_slices,
                denied = self.stats.denied_frames,
                "Path query finished"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{EuclideanHeuristic, ShortestPathConstraint};
    use crate::graph::GridGraphBuilder;
    use crate::scheduler::{ManualClock, RequesterKind, SchedulerConfig};
    use std::sync::Arc;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(16);

    struct Fixture {
        builder: GridGraphBuilder,
        graph: SpatialGraph,
        scheduler: TimeBudgetScheduler,
        task: TaskId,
        requester: RequesterId,
    }

    fn fixture() -> Fixture {
        let builder = GridGraphBuilder::new(10, 10).tile_size(5);
        let graph = builder.build().unwrap();
        let clock = Arc::new(ManualClock::new());
        let mut scheduler = TimeBudgetScheduler::new(
            SchedulerConfig::new().with_frame_budget(Duration::from_millis(5)),
            clock,
        );
        let task = scheduler.register_aperiodic_task("pathfind").unwrap();
        let requester = scheduler.add_requester(RequesterKind::Bot);
        Fixture {
            builder,
            graph,
            scheduler,
            task,
            requester,
        }
    }

    fn query(f: &Fixture, config: QueryConfig) -> PathQuery {
        let search = AstarSearch::new(
            f.requester,
            Box::new(ShortestPathConstraint::new()),
            Box::new(EuclideanHeuristic),
        );
        PathQuery::new(search, f.task, config)
    }

    fn run_frames(f: &mut Fixture, q: &mut PathQuery, frames: usize) -> QueryStatus {
        for _ in 0..frames {
            f.scheduler.begin_frame(FRAME);
            q.tick(&f.graph, &mut f.scheduler).unwrap();
            f.scheduler.end_frame();
            if q.status().is_terminal() {
                break;
            }
        }
        q.status()
    }

    #[test]
    fn test_query_spans_frames() {
        let mut f = fixture();
        let mut q = query(&f, QueryConfig::new().with_iterations_per_slice(4));
        let start = f.builder.vertex_id(0, 0).unwrap();
        let goal = f.builder.vertex_id(9, 9).unwrap();
        assert_eq!(q.start(&f.graph, start, goal).unwrap(), QueryStatus::Computing);

        assert_eq!(run_frames(&mut f, &mut q, 1), QueryStatus::Computing);
        assert_eq!(q.search().state(), SearchState::Paused);
        assert_eq!(q.search().stats().steps, 4);

        assert_eq!(run_frames(&mut f, &mut q, 100), QueryStatus::Found);
        let path = q.path().unwrap();
        assert_eq!(path.edge_count(), 18);
        assert!(q.stats().granted_slices > 1);
    }

    #[test]
    fn test_zero_iterations_still_steps_once() {
        let mut f = fixture();
        let mut q = query(&f, QueryConfig::new().with_iterations_per_slice(0));
        let start = f.builder.vertex_id(0, 0).unwrap();
        let goal = f.builder.vertex_id(3, 3).unwrap();
        q.start(&f.graph, start, goal).unwrap();

        run_frames(&mut f, &mut q, 1);
        assert_eq!(q.search().stats().steps, 1);
        assert_eq!(run_frames(&mut f, &mut q, 1_000), QueryStatus::Found);
        assert_eq!(q.path().unwrap().edge_count(), 6);
    }

    #[test]
    fn test_denied_tick_does_not_step() {
        let mut f = fixture();
        let mut q = query(&f, QueryConfig::default());
        q.start(
            &f.graph,
            f.builder.vertex_id(0, 0).unwrap(),
            f.builder.vertex_id(9, 9).unwrap(),
        )
        .unwrap();

        f.scheduler.begin_frame(FRAME);
        f.scheduler.forbid_task(f.task).unwrap();
        assert_eq!(q.tick(&f.graph, &mut f.scheduler).unwrap(), QueryStatus::Computing);
        f.scheduler.end_frame();

        assert_eq!(q.stats().denied_frames, 1);
        assert_eq!(q.stats().granted_slices, 0);
        assert_eq!(q.search().stats().steps, 0);
        assert!(!f.scheduler.is_running(f.task, f.requester).unwrap());
    }

    #[test]
    fn test_no_path_reported() {
        let mut f = fixture();
        let mut q = query(&f, QueryConfig::default());
        let goal = f.builder.vertex_id(9, 9).unwrap();
        f.graph.unload_tile(goal.tile).unwrap();

        let status = q
            .start(&f.graph, f.builder.vertex_id(0, 0).unwrap(), goal)
            .unwrap();
        assert_eq!(status, QueryStatus::NoPath(FailureReason::EndpointNotLoaded));
        assert_eq!(run_frames(&mut f, &mut q, 3), status);
        assert_eq!(q.stats().granted_slices, 0);
    }

    #[test]
    fn test_stale_search_restarts_once() {
        let mut f = fixture();
        let mut q = query(&f, QueryConfig::new().with_iterations_per_slice(2));
        let start = f.builder.vertex_id(0, 0).unwrap();
        q.start(&f.graph, start, f.builder.vertex_id(9, 9).unwrap())
            .unwrap();
        run_frames(&mut f, &mut q, 1);

        let tile = f.graph.unload_tile(start.tile).unwrap();
        f.graph.load_tile(tile).unwrap();

        assert_eq!(run_frames(&mut f, &mut q, 1), QueryStatus::Computing);
        assert_eq!(q.stats().restarts, 1);

        let tile = f.graph.unload_tile(start.tile).unwrap();
        f.graph.load_tile(tile).unwrap();

        assert_eq!(
            run_frames(&mut f, &mut q, 1),
            QueryStatus::NoPath(FailureReason::StaleGraph)
        );
        assert!(q.path().is_none());
    }

    #[test]
    fn test_cancel() {
        let mut f = fixture();
        let mut q = query(&f, QueryConfig::new().with_iterations_per_slice(1));
        q.start(
            &f.graph,
            f.builder.vertex_id(0, 0).unwrap(),
            f.builder.vertex_id(9, 9).unwrap(),
        )
        .unwrap();
        run_frames(&mut f, &mut q, 2);

        assert!(q.cancel());
        assert_eq!(q.status(), QueryStatus::Abandoned);
        assert_eq!(q.search().state(), SearchState::Idle);
        assert!(!q.cancel());

        let steps = q.search().stats().steps;
        run_frames(&mut f, &mut q, 2);
        assert_eq!(q.search().stats().steps, steps);
    }

    #[test]
    fn test_replaced_model_restarts_search() {
        let mut f = fixture();
        let mut q = query(&f, QueryConfig::new().with_iterations_per_slice(3));
        q.start(
            &f.graph,
            f.builder.vertex_id(0, 0).unwrap(),
            f.builder.vertex_id(9, 9).unwrap(),
        )
        .unwrap();
        run_frames(&mut f, &mut q, 1);
        assert_eq!(q.search().stats().steps, 3);

        q.set_heuristic(Box::new(crate::cost::ZeroHeuristic));
        run_frames(&mut f, &mut q, 1);
        assert_eq!(q.search().stats().steps, 3);
        assert_eq!(q.search().heuristic().name(), "zero");
        assert_eq!(q.stats().restarts, 0);
    }

    #[test]
    fn test_zero_frame_budget_denies() {
        let mut f = fixture();
        f.scheduler.set_frame_budget(Duration::ZERO);
        let mut q = query(&f, QueryConfig::default());
        q.start(
            &f.graph,
            f.builder.vertex_id(0, 0).unwrap(),
            f.builder.vertex_id(9, 9).unwrap(),
        )
        .unwrap();

        assert_eq!(run_frames(&mut f, &mut q, 3), QueryStatus::Computing);
        assert_eq!(q.stats().denied_frames, 3);
        assert_eq!(q.search().stats().steps, 0);
    }

    /// Advances the shared clock on every estimate.
    struct TickingHeuristic(Arc<ManualClock>);

    impl crate::cost::SearchLifecycle for TickingHeuristic {}

    impl Heuristic for TickingHeuristic {
        fn name(&self) -> &str {
            "ticking"
        }

        fn estimate(
            &self,
            _requester: RequesterId,
            from: &crate::graph::Vertex,
            goal: &crate::graph::Vertex,
        ) -> Option<f32> {
            self.0.advance(Duration::from_millis(1));
            Some(from.position.distance(&goal.position))
        }
    }

    #[test]
    fn test_slice_stops_when_time_is_spent() {
        let builder = GridGraphBuilder::new(10, 10).tile_size(5);
        let graph = builder.build().unwrap();
        let clock = Arc::new(ManualClock::new());
        let mut scheduler = TimeBudgetScheduler::new(
            SchedulerConfig::new().with_frame_budget(Duration::from_millis(5)),
            clock.clone(),
        );
        let task = scheduler.register_aperiodic_task("pathfind").unwrap();
        let requester = scheduler.add_requester(RequesterKind::Bot);
        let search = AstarSearch::new(
            requester,
            Box::new(ShortestPathConstraint::new()),
            Box::new(TickingHeuristic(clock.clone())),
        );
        let config = QueryConfig::new()
            .with_iterations_per_slice(64)
            .with_time_check_interval(1);
        let mut q = PathQuery::new(search, task, config);
        q.start(
            &graph,
            builder.vertex_id(0, 0).unwrap(),
            builder.vertex_id(9, 9).unwrap(),
        )
        .unwrap();

        scheduler.begin_frame(FRAME);
        assert_eq!(q.tick(&graph, &mut scheduler).unwrap(), QueryStatus::Computing);
        let report = scheduler.end_frame();

        let steps = q.search().stats().steps;
        assert!(steps > 0 && steps < 64, "steps = {}", steps);
        assert!(report.consumed_ms >= 5.0);
        assert_eq!(q.search().state(), SearchState::Paused);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(QueryStatus::Found.to_string(), "found");
        assert_eq!(
            QueryStatus::NoPath(FailureReason::Exhausted).to_string(),
            "no path (exhausted)"
        );
    }
}
