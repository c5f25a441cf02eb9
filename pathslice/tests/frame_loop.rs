//! Integration tests for the full frame loop.
//!
//! These tests drive a [`Simulation`] the way a host engine would:
//! - many agents requesting paths at once under one frame budget
//! - tiles streaming out and back in while searches are paused
//! - configuration loaded from an INI file
//!
//! Run with: `cargo test --test frame_loop`

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use pathslice::cost::{Constraint, EuclideanHeuristic, SearchLifecycle, ShortestPathConstraint};
use pathslice::graph::{Edge, GridGraphBuilder, TerrainType, Vertex, VertexId};
use pathslice::query::{QueryConfig, QueryStatus, Simulation, PATHFIND_TASK};
use pathslice::scheduler::{ManualClock, RequesterId, RequesterKind, SchedulerConfig, TimeBudgetScheduler};
use pathslice::search::{AstarSearch, SearchState};
use pathslice::NavConfig;

const FRAME: Duration = Duration::from_millis(16);
const SWAMP: TerrainType = TerrainType(5);

// ============================================================================
// Helper Functions
// ============================================================================

/// Shortest-path constraint that also costs wall-clock time on the shared
/// manual clock, so slices consume the frame budget deterministically.
struct ClockedConstraint {
    inner: ShortestPathConstraint,
    clock: Arc<ManualClock>,
    per_call: Duration,
}

impl SearchLifecycle for ClockedConstraint {}

impl Constraint for ClockedConstraint {
    fn name(&self) -> &str {
        "clocked"
    }

    fn cost(&self, requester: RequesterId, edge: &Edge, from: &Vertex, to: &Vertex) -> Option<f32> {
        self.clock.advance(self.per_call);
        self.inner.cost(requester, edge, from, to)
    }
}

/// Crossing the swamp column costs three times the distance.
fn swamp_costs() -> ShortestPathConstraint {
    ShortestPathConstraint::new().with_terrain_cost(SWAMP, 3.0)
}

fn random_cell(rng: &mut StdRng, builder: &GridGraphBuilder) -> VertexId {
    let x = rng.random_range(0..builder.width());
    let y = rng.random_range(0..builder.height());
    builder.vertex_id(x, y).unwrap()
}

/// Cost of the optimal path, computed without slicing.
fn reference_cost(builder: &GridGraphBuilder, start: VertexId, goal: VertexId) -> Option<f32> {
    let graph = builder.build().unwrap();
    let mut search = AstarSearch::new(
        RequesterId(0),
        Box::new(swamp_costs()),
        Box::new(EuclideanHeuristic),
    );
    search.start(&graph, start, goal);
    match search.run_to_completion(&graph).unwrap() {
        SearchState::Succeeded => search.path().map(|p| p.cost()),
        _ => None,
    }
}

fn run_until_done(sim: &mut Simulation, max_frames: usize) -> usize {
    for frame in 1..=max_frames {
        sim.update(FRAME).unwrap();
        if sim.pending_queries() == 0 {
            return frame;
        }
    }
    panic!("queries still pending after {} frames", max_frames);
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Many agents share one budget and every one of them gets its optimal path.
#[test]
fn test_many_agents_find_optimal_paths() {
    let builder = GridGraphBuilder::new(24, 24)
        .tile_size(8)
        .vertical_wall(12, SWAMP);
    let clock = Arc::new(ManualClock::new());
    let scheduler = TimeBudgetScheduler::new(
        SchedulerConfig::new().with_frame_budget(Duration::from_millis(1)),
        clock.clone(),
    );
    let mut sim = Simulation::new(builder.build().unwrap(), scheduler)
        .unwrap()
        .with_query_config(QueryConfig::new().with_time_check_interval(1));

    let mut rng = StdRng::seed_from_u64(7);
    let mut requests = Vec::new();
    for _ in 0..12 {
        let agent = sim.spawn_agent(RequesterKind::Bot);
        let (start, goal) = (random_cell(&mut rng, &builder), random_cell(&mut rng, &builder));
        let constraint = ClockedConstraint {
            inner: swamp_costs(),
            clock: clock.clone(),
            per_call: Duration::from_micros(20),
        };
        sim.request_path_with(agent, start, goal, Box::new(constraint), Box::new(EuclideanHeuristic))
            .unwrap();
        requests.push((agent, start, goal));
    }

    let frames = run_until_done(&mut sim, 5_000);

    for (agent, start, goal) in requests {
        assert_eq!(sim.query_status(agent), Some(QueryStatus::Found));
        let path = sim.path(agent).unwrap();
        let expected = reference_cost(&builder, start, goal).unwrap();
        assert!((path.cost() - expected).abs() < 1e-3, "{} vs {}", path.cost(), expected);
    }

    let stats = sim.stats();
    assert_eq!(stats.paths_found, 12);
    assert!(stats.denied_slices > 0, "a 1 ms budget should not fit everyone");
    // Overruns are carried as debt, so the average stays near the budget.
    assert!(stats.consumed_ms <= (frames as f64 + 1.0) * 1.0 + 1e-6);
}

/// A tile reloaded under paused searches restarts them once; they still
/// find their paths.
#[test]
fn test_streaming_tiles_restart_searches() {
    let builder = GridGraphBuilder::new(16, 16).tile_size(4);
    let scheduler = TimeBudgetScheduler::new(SchedulerConfig::new(), Arc::new(ManualClock::new()));
    let mut sim = Simulation::new(builder.build().unwrap(), scheduler)
        .unwrap()
        .with_query_config(QueryConfig::new().with_iterations_per_slice(4));

    let start = builder.vertex_id(0, 0).unwrap();
    let goal = builder.vertex_id(15, 15).unwrap();
    let agents: Vec<_> = (0..4).map(|_| sim.spawn_agent(RequesterKind::Team)).collect();
    for &agent in &agents {
        sim.request_path(agent, start, goal).unwrap();
    }
    sim.update(FRAME).unwrap();

    let tile = sim.unload_tile(start.tile).unwrap();
    sim.load_tile(tile).unwrap();
    run_until_done(&mut sim, 1_000);

    for &agent in &agents {
        assert_eq!(sim.query_status(agent), Some(QueryStatus::Found));
        assert_eq!(sim.path(agent).unwrap().edge_count(), 30);
    }
    assert_eq!(sim.stats().stale_restarts, 4);
}

/// A goal behind a tile that never streams in is reported, not retried.
#[test]
fn test_unreachable_goal_tile() {
    let builder = GridGraphBuilder::new(16, 4).tile_size(4);
    let scheduler = TimeBudgetScheduler::new(SchedulerConfig::new(), Arc::new(ManualClock::new()));
    let mut sim = Simulation::new(builder.build().unwrap(), scheduler).unwrap();

    let start = builder.vertex_id(0, 0).unwrap();
    let goal = builder.vertex_id(15, 3).unwrap();
    let middle = builder.vertex_id(9, 0).unwrap();
    sim.unload_tile(middle.tile).unwrap();

    let agent = sim.spawn_agent(RequesterKind::Bot);
    sim.request_path(agent, start, goal).unwrap();
    run_until_done(&mut sim, 100);

    assert!(matches!(sim.query_status(agent), Some(QueryStatus::NoPath(_))));
    assert_eq!(sim.stats().paths_failed, 1);
}

/// Configuration file drives the scheduler and the query slicing.
#[test]
fn test_configured_simulation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pathslice.ini");
    std::fs::write(
        &path,
        "[scheduler]\nframe_budget_ms = 2\n\n[task.pathfind]\nmax_calls = 1\n\n[query]\niterations_per_slice = 1000\n",
    )
    .unwrap();

    let config = NavConfig::load(&path).unwrap();
    let scheduler = config
        .build_scheduler(Arc::new(ManualClock::new()))
        .unwrap();
    let builder = GridGraphBuilder::new(8, 8);
    let mut sim = Simulation::new(builder.build().unwrap(), scheduler)
        .unwrap()
        .with_query_config(config.query)
        .with_search_limits(config.search);

    assert_eq!(
        sim.scheduler().task_by_name(PATHFIND_TASK),
        Some(sim.pathfind_task())
    );

    let start = builder.vertex_id(0, 0).unwrap();
    let goal = builder.vertex_id(7, 7).unwrap();
    let agents: Vec<_> = (0..3).map(|_| sim.spawn_agent(RequesterKind::Bot)).collect();
    for &agent in &agents {
        sim.request_path(agent, start, goal).unwrap();
    }

    // One grant per frame, each query finishes within its slice.
    assert_eq!(run_until_done(&mut sim, 10), 3);
    assert_eq!(sim.stats().granted_slices, 3);
}
