//! Simulate command - drive a grid world for a number of frames.
//!
//! Agents are placed on a walled grid and ask for a new random destination
//! every time their previous query finishes. With `--step-cost-us` the run
//! uses a manual clock charged per edge evaluation, which makes the whole
//! run, timings included, reproducible from the seed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::info;

use pathslice::cost::{Constraint, EuclideanHeuristic, SearchLifecycle, ShortestPathConstraint};
use pathslice::graph::{Edge, GridGraphBuilder, TerrainType, Vertex, VertexId};
use pathslice::query::{AgentHandle, QueryStatus, Simulation};
use pathslice::scheduler::{Clock, ManualClock, RequesterId, RequesterKind, SystemClock};
use pathslice::NavConfig;

use crate::error::CliError;

/// Terrain of wall edges; always forbidden.
const WALL: TerrainType = TerrainType(9);

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Grid width in cells
    #[arg(long, default_value_t = 64)]
    pub width: u32,

    /// Grid height in cells
    #[arg(long, default_value_t = 64)]
    pub height: u32,

    /// Cells along each side of a tile
    #[arg(long, default_value_t = 16)]
    pub tile_size: u32,

    /// Number of agents
    #[arg(long, default_value_t = 16)]
    pub agents: u32,

    /// Number of frames to run
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Frame budget in milliseconds, overrides the config file
    #[arg(long)]
    pub budget_ms: Option<f64>,

    /// Frame delta passed to the scheduler, in milliseconds
    #[arg(long, default_value_t = 16.0)]
    pub frame_ms: f64,

    /// Seed for the world layout and agent destinations
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Number of vertical walls, each with one gap
    #[arg(long, default_value_t = 4)]
    pub walls: u32,

    /// Simulated cost of one edge evaluation in microseconds (manual clock)
    #[arg(long)]
    pub step_cost_us: Option<u64>,

    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Edge costs that also charge simulated CPU time to a manual clock.
struct MeteredConstraint {
    inner: ShortestPathConstraint,
    clock: Arc<ManualClock>,
    per_call: Duration,
}

impl SearchLifecycle for MeteredConstraint {}

impl Constraint for MeteredConstraint {
    fn name(&self) -> &str {
        "metered"
    }

    fn cost(&self, requester: RequesterId, edge: &Edge, from: &Vertex, to: &Vertex) -> Option<f32> {
        self.clock.advance(self.per_call);
        self.inner.cost(requester, edge, from, to)
    }
}

/// Builds the per-query constraint for the chosen clock mode.
struct ConstraintFactory {
    manual: Option<(Arc<ManualClock>, Duration)>,
}

impl ConstraintFactory {
    fn make(&self) -> Box<dyn Constraint> {
        let inner = ShortestPathConstraint::new().with_forbidden(WALL.mask());
        match &self.manual {
            Some((clock, per_call)) => Box::new(MeteredConstraint {
                inner,
                clock: Arc::clone(clock),
                per_call: *per_call,
            }),
            None => Box::new(inner),
        }
    }
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, mut config: NavConfig) -> Result<(), CliError> {
    validate(&args)?;
    if let Some(budget_ms) = args.budget_ms {
        config.scheduler.frame_budget = millis("budget", budget_ms)?;
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let builder = build_world(&args, &mut rng);

    let manual = args
        .step_cost_us
        .map(|us| (Arc::new(ManualClock::new()), Duration::from_micros(us)));
    let clock: Arc<dyn Clock> = match &manual {
        Some((clock, _)) => Arc::clone(clock) as Arc<dyn Clock>,
        None => Arc::new(SystemClock::new()),
    };
    let clock_mode = if manual.is_some() { "manual" } else { "system" };
    let factory = ConstraintFactory { manual };

    let scheduler = config.build_scheduler(clock)?;
    let graph = builder.build().map_err(pathslice::Error::from)?;
    let mut sim = Simulation::new(graph, scheduler)?
        .with_query_config(config.query)
        .with_search_limits(config.search);

    let agents: Vec<AgentHandle> = (0..args.agents)
        .map(|i| {
            let kind = if i % 4 == 3 {
                RequesterKind::Team
            } else {
                RequesterKind::Bot
            };
            sim.spawn_agent(kind)
        })
        .collect();

    info!(
        width = args.width,
        height = args.height,
        tiles = sim.graph().tile_count(),
        agents = args.agents,
        frames = args.frames,
        budget_ms = format!("{:.3}", config.scheduler.frame_budget.as_secs_f64() * 1000.0),
        "Simulation starting"
    );

    let delta = millis("frame delta", args.frame_ms)?;
    let started = Instant::now();
    let mut peak_pending = 0;

    for _ in 0..args.frames {
        for &agent in &agents {
            let idle = sim
                .query_status(agent)
                .map_or(true, |status| status.is_terminal());
            if !idle {
                continue;
            }
            let start = random_cell(&mut rng, &builder);
            let goal = random_cell(&mut rng, &builder);
            if let (Some(start), Some(goal)) = (start, goal) {
                sim.request_path_with(agent, start, goal, factory.make(), Box::new(EuclideanHeuristic))?;
            }
        }
        peak_pending = peak_pending.max(sim.pending_queries());
        sim.update(delta)?;
    }

    let wall_time = started.elapsed();
    let stats = sim.stats();
    let frames = stats.frames.max(1) as f64;
    let pending_at_end = agents
        .iter()
        .filter(|&&a| sim.query_status(a) == Some(QueryStatus::Computing))
        .count();

    if args.json {
        let output = json!({
            "world": {
                "width": args.width,
                "height": args.height,
                "tile_size": args.tile_size,
                "tiles": sim.graph().tile_count(),
                "walls": args.walls,
                "seed": args.seed,
            },
            "budget_ms": config.scheduler.frame_budget.as_secs_f64() * 1000.0,
            "clock": clock_mode,
            "stats": stats,
            "avg_frame_ms": stats.consumed_ms / frames,
            "peak_pending": peak_pending,
            "pending_at_end": pending_at_end,
            "wall_time_ms": wall_time.as_secs_f64() * 1000.0,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Simulation");
        println!("==========");
        println!(
            "  World:            {}x{} cells, {} tiles, {} walls (seed {})",
            args.width,
            args.height,
            sim.graph().tile_count(),
            args.walls,
            args.seed
        );
        println!(
            "  Budget:           {:.3} ms/frame ({} clock)",
            config.scheduler.frame_budget.as_secs_f64() * 1000.0,
            clock_mode
        );
        println!("  Frames:           {}", stats.frames);
        println!("  Queries started:  {}", stats.queries_started);
        println!("  Paths found:      {}", stats.paths_found);
        println!("  No path:          {}", stats.paths_failed);
        println!("  Abandoned:        {}", stats.queries_abandoned);
        println!("  Still computing:  {}", pending_at_end);
        println!(
            "  Slices:           {} granted, {} denied",
            stats.granted_slices, stats.denied_slices
        );
        println!("  Search steps:     {}", stats.search_steps);
        println!(
            "  Frame time:       {:.3} ms avg, {:.3} ms max, {} frames over budget",
            stats.consumed_ms / frames,
            stats.max_frame_ms,
            stats.overrun_frames
        );
        println!("  Wall time:        {:.1} ms", wall_time.as_secs_f64() * 1000.0);
    }

    Ok(())
}

fn validate(args: &SimulateArgs) -> Result<(), CliError> {
    if args.width == 0 || args.height == 0 || args.tile_size == 0 {
        return Err(CliError::InvalidArgument(
            "width, height and tile size must be positive".to_string(),
        ));
    }
    if let Some(budget) = args.budget_ms {
        millis("budget", budget)?;
    }
    millis("frame delta", args.frame_ms)?;
    Ok(())
}

/// Converts a millisecond argument, rejecting values a `Duration` cannot hold.
fn millis(what: &str, ms: f64) -> Result<Duration, CliError> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(CliError::InvalidArgument(format!(
            "{} must be a non-negative number of milliseconds, got {}",
            what, ms
        )));
    }
    Duration::try_from_secs_f64(ms / 1000.0)
        .map_err(|e| CliError::InvalidArgument(format!("{} of {} ms: {}", what, ms, e)))
}

/// Grid with `walls` vertical walls at random columns. Each wall leaves a
/// gap of a few cells so most of the world stays connected.
fn build_world(args: &SimulateArgs, rng: &mut StdRng) -> GridGraphBuilder {
    let mut builder = GridGraphBuilder::new(args.width, args.height).tile_size(args.tile_size);
    if args.width < 2 {
        return builder;
    }

    let gap = (args.height / 8).max(1);
    for _ in 0..args.walls {
        let x = rng.random_range(1..args.width);
        let gap_start = rng.random_range(0..args.height);
        for y in 0..args.height {
            if y >= gap_start && y < gap_start + gap {
                continue;
            }
            builder = builder.terrain_between((x - 1, y), (x, y), WALL);
        }
    }
    builder
}

fn random_cell(rng: &mut StdRng, builder: &GridGraphBuilder) -> Option<VertexId> {
    let x = rng.random_range(0..builder.width());
    let y = rng.random_range(0..builder.height());
    builder.vertex_id(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use proptest::prelude::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SimulateArgs,
    }

    fn parse(argv: &[&str]) -> SimulateArgs {
        let mut full = vec!["simulate"];
        full.extend_from_slice(argv);
        TestCli::parse_from(full).args
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.width, 64);
        assert_eq!(args.tile_size, 16);
        assert_eq!(args.frames, 600);
        assert!(args.budget_ms.is_none());
        assert!(!args.json);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(validate(&parse(&["--width", "0"])).is_err());
        assert!(validate(&parse(&["--budget-ms=-1"])).is_err());
        assert!(validate(&parse(&["--budget-ms", "2.5"])).is_ok());
    }

    #[test]
    fn test_validate_rejects_huge_durations() {
        assert!(matches!(
            validate(&parse(&["--budget-ms", "1e30"])),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(validate(&parse(&["--frame-ms", "1e30"])).is_err());
        assert_eq!(millis("budget", 2.5).unwrap(), Duration::from_micros(2500));
    }

    #[test]
    fn test_random_cell_inside_grid() {
        let builder = GridGraphBuilder::new(5, 3).tile_size(2);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert!(random_cell(&mut rng, &builder).is_some());
        }
    }

    proptest! {
        #[test]
        fn test_validate_accepts_representable_durations(budget in -10.0f64..1e25, frame in 0.0f64..1e25) {
            let budget_arg = format!("--budget-ms={}", budget);
            let frame_arg = format!("--frame-ms={}", frame);
            let args = parse(&[budget_arg.as_str(), frame_arg.as_str()]);
            let fits = |ms: f64| ms >= 0.0 && ms / 1000.0 < u64::MAX as f64;
            prop_assert_eq!(validate(&args).is_ok(), fits(budget) && fits(frame));
        }

        #[test]
        fn test_walls_keep_grid_shape(
            width in 2u32..24,
            height in 1u32..24,
            walls in 0u32..6,
            seed in any::<u64>(),
        ) {
            let args = parse(&[
                "--width", &width.to_string(),
                "--height", &height.to_string(),
                "--tile-size", "4",
                "--walls", &walls.to_string(),
            ]);
            let builder = build_world(&args, &mut StdRng::seed_from_u64(seed));
            let graph = builder.build().unwrap();
            prop_assert_eq!(graph.vertex_count(), (width * height) as usize);
        }
    }

    #[test]
    fn test_world_is_reproducible() {
        let args = parse(&["--width", "20", "--height", "20", "--walls", "3"]);
        let a = build_world(&args, &mut StdRng::seed_from_u64(5)).build().unwrap();
        let b = build_world(&args, &mut StdRng::seed_from_u64(5)).build().unwrap();

        for id in a.tile_ids() {
            let (ta, tb) = (a.tile(id).unwrap(), b.tile(id).unwrap());
            assert_eq!(ta.vertices(), tb.vertices());
            for index in 0..ta.vertex_count() as u32 {
                assert_eq!(ta.out_edges(index), tb.out_edges(index));
            }
        }
    }

    #[test]
    fn test_manual_clock_run_completes() {
        let args = parse(&[
            "--width", "24", "--height", "24", "--tile-size", "8", "--agents", "4",
            "--frames", "30", "--step-cost-us", "5", "--json",
        ]);
        run(args, NavConfig::default()).unwrap();
    }
}
