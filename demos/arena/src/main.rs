//! arena: a small walled field exercising every movement generator.
//!
//! ```text
//! cargo run -p arena [-- path/to/manager_config.json]
//! RUST_LOG=bm_manager=debug cargo run -p arena
//! ```
//!
//! A runner crosses the field around a central wall with a follower on its
//! heels, a squad patrols in wedge formation, a hunter chases a fleeing
//! prey, one agent wanders and one starts snagged so stuck recovery kicks
//! in.  Metrics, agent states and generator results go to `output/arena/`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bm_core::{Aabb, AgentId, AgentSnapshot, FormationType, GameClock, Position, SandboxWorld, TerrainKind, TerrainZone};
use bm_manager::{ManagerConfig, MovementManagerBuilder, MovementObserver};
use bm_navmesh::NavMeshInterface;
use bm_output::{CsvWriter, MovementOutputObserver};
use bm_validation::DangerZone;

// ── Constants ─────────────────────────────────────────────────────────────────

const TICK_MS:    u32   = 250;
const RUN_SECS:   u64   = 60;
const MESH_CELL:  f32   = 2.0;
const OUTPUT_DIR: &str  = "output/arena";
/// The snagged agent is released after this long.
const UNPIN_MS:   u64   = 6_000;

const RUNNER:   AgentId = AgentId(1);
const SHADOW:   AgentId = AgentId(2);
const LEADER:   AgentId = AgentId(3);
const WING_L:   AgentId = AgentId(4);
const WING_R:   AgentId = AgentId(5);
const HUNTER:   AgentId = AgentId(6);
const PREY:     AgentId = AgentId(7);
const WANDERER: AgentId = AgentId(8);
const SNAGGED:  AgentId = AgentId(9);

fn p(x: f32, y: f32) -> Position {
    Position::at(x, y, 0.0)
}

// ── World ─────────────────────────────────────────────────────────────────────

fn build_world(bounds: Aabb) -> SandboxWorld {
    let mut world = SandboxWorld::new(bounds);
    world.add_wall(Aabb::new(-2.0, -18.0, 2.0, 18.0));
    world.add_wall(Aabb::new(24.0, 20.0, 40.0, 24.0));
    world.add_zone(TerrainZone::new(20.0, -12.0, 6.0, TerrainKind::Lava));
    world.add_zone(TerrainZone::new(-30.0, 20.0, 8.0, TerrainKind::Water));
    world
}

/// Flat grid over the walkable part of `world`; cells touching a wall (plus a
/// one-unit margin) or lava are left out.
fn build_mesh(world: &SandboxWorld, bounds: Aabb) -> NavMeshInterface {
    let walls: Vec<Aabb> = world
        .walls()
        .iter()
        .map(|w| Aabb::new(w.min_x - 1.0, w.min_y - 1.0, w.max_x + 1.0, w.max_y + 1.0))
        .collect();
    let mesh = NavMeshInterface::flat_world_grid(bounds, MESH_CELL, 0.0, |c| {
        if walls.iter().any(|w| w.contains(c.x, c.y)) {
            return None;
        }
        match bm_core::WorldQuery::terrain_at(world, c) {
            TerrainKind::Lava => None,
            kind => Some(kind),
        }
    });
    NavMeshInterface::with_mesh(mesh)
}

fn spawn(world: &SandboxWorld, id: AgentId, at: Position, tweak: impl FnOnce(&mut AgentSnapshot)) {
    let mut snap = AgentSnapshot::new(id, at);
    tweak(&mut snap);
    world.spawn(snap);
}

// ── Observer wrapper to count rows ────────────────────────────────────────────

struct CountingObserver<W: bm_output::OutputWriter> {
    inner:     MovementOutputObserver<W>,
    snapshots: usize,
    results:   usize,
}

impl<W: bm_output::OutputWriter> MovementObserver for CountingObserver<W> {
    fn on_result(
        &mut self,
        now:    bm_core::GameTime,
        agent:  AgentId,
        kind:   bm_behavior::GeneratorKind,
        result: bm_behavior::MovementResult,
    ) {
        self.results += 1;
        info!(%now, agent = %agent, %kind, %result, "generator ended");
        self.inner.on_result(now, agent, kind, result);
    }

    fn on_snapshot(
        &mut self,
        now:     bm_core::GameTime,
        metrics: &bm_manager::MovementMetrics,
        states:  &[(AgentId, bm_manager::MovementState)],
    ) {
        self.snapshots += 1;
        self.inner.on_snapshot(now, metrics, states);
    }

    fn on_shutdown(&mut self, now: bm_core::GameTime) {
        self.inner.on_shutdown(now);
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // 1. Configuration: defaults, or a JSON file whose missing fields default.
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str::<ManagerConfig>(&text).with_context(|| format!("parsing {path}"))?
        }
        None => ManagerConfig::default(),
    };

    // 2. World and navigation mesh.
    let bounds = Aabb::new(-60.0, -40.0, 60.0, 40.0);
    let world = build_world(bounds);
    let navmesh = build_mesh(&world, bounds);
    let world = Arc::new(world);

    // 3. Manager.
    let manager = MovementManagerBuilder::new(Arc::clone(&world))
        .config(config)
        .navmesh(navmesh)
        .build()?;
    manager.planner().shared_validator().add_danger_zone(DangerZone::new(p(-45.0, -30.0), 5.0));

    // 4. Agents.
    spawn(&world, RUNNER, p(-40.0, 0.0), |_| {});
    spawn(&world, SHADOW, p(-44.0, 2.0), |_| {});
    spawn(&world, LEADER, p(-30.0, -30.0), |s| s.speeds.run = 5.0);
    spawn(&world, WING_L, p(-33.0, -27.0), |_| {});
    spawn(&world, WING_R, p(-33.0, -33.0), |_| {});
    spawn(&world, HUNTER, p(30.0, 0.0), |s| {
        s.speeds.run = 9.0;
        s.in_combat = true;
    });
    spawn(&world, PREY, p(40.0, 5.0), |_| {});
    spawn(&world, WANDERER, p(10.0, 30.0), |_| {});
    spawn(&world, SNAGGED, p(-20.0, 30.0), |_| {});
    for id in world.agent_ids() {
        manager.add_agent(id)?;
    }
    world.pin(SNAGGED, true);

    // 5. Commands.
    let mut clock = GameClock::new();
    let now = clock.now();
    let route = vec![p(-30.0, -30.0), p(-10.0, -30.0), p(-10.0, -22.0), p(-30.0, -22.0)];
    let issued = [
        (RUNNER, manager.move_to_point(RUNNER, p(40.0, 0.0), None, now)),
        (SHADOW, manager.follow(SHADOW, RUNNER, 3.0, 6.0, None, now)),
        (LEADER, manager.patrol(LEADER, route, true, now)),
        (HUNTER, manager.chase(HUNTER, PREY, None, None, now)),
        (PREY, manager.flee(PREY, HUNTER, 25.0, now)),
        (WANDERER, manager.wander(WANDERER, 12.0, None, now)),
        (SNAGGED, manager.move_to_point(SNAGGED, p(-20.0, -10.0), None, now)),
    ];
    for (id, result) in &issued {
        info!(agent = %id, ?result, "command issued");
    }
    for (id, result) in manager.set_group_formation(LEADER, &[WING_L, WING_R], FormationType::Wedge, now) {
        info!(agent = %id, ?result, "formation slot assigned");
    }

    // 6. Output.
    let writer = CsvWriter::new(Path::new(OUTPUT_DIR))?;
    let mut obs = CountingObserver { inner: MovementOutputObserver::new(writer), snapshots: 0, results: 0 };

    // 7. Run.
    println!("=== arena: {} agents, {RUN_SECS} s at {TICK_MS} ms ticks ===", manager.agent_count());
    let t0 = Instant::now();
    let total_ticks = RUN_SECS * 1_000 / u64::from(TICK_MS);
    for _ in 0..total_ticks {
        let now = clock.now();
        manager.update_all(now, &mut obs);
        if let Some(pos) = world.position(RUNNER) {
            manager.notify_target_moved(RUNNER, pos);
        }
        if now.0 == UNPIN_MS {
            world.pin(SNAGGED, false);
            info!(agent = %SNAGGED, "released");
        }
        world.step(TICK_MS);
        clock.advance(TICK_MS);
    }
    let elapsed = t0.elapsed();
    manager.shutdown(clock.now(), &mut obs);
    if let Some(e) = obs.inner.take_error() {
        eprintln!("output error: {e}");
    }

    // 8. Summary.
    let m = manager.metrics(clock.now());
    println!("Run complete in {:.3} s ({})", elapsed.as_secs_f64(), clock);
    println!(
        "  commands: {} accepted, {} queued, {} rejected; {} generator switches",
        m.commands_accepted, m.commands_queued, m.commands_rejected, m.generator_switches
    );
    println!(
        "  updates:  {} run, {} skipped, {:.1} us average, {} over budget",
        m.updates_run, m.updates_skipped, m.average_update_us, m.budget_overruns
    );
    println!(
        "  paths:    {} generated, {} direct, {} no-path; cache {} hits / {} misses",
        m.paths.paths_generated, m.paths.direct_paths, m.paths.no_path, m.paths.cache.hits, m.paths.cache.misses
    );
    println!(
        "  stuck:    {} detections, {} recoveries, {} exhausted",
        m.validation.stuck_detections, m.validation.recoveries, m.validation.recoveries_exhausted
    );
    println!("  {OUTPUT_DIR}: {} snapshots, {} generator results", obs.snapshots, obs.results);
    println!();

    println!("{:<7} {:<10} {:<20} {:<20}", "Agent", "Generator", "Last result", "Position");
    println!("{}", "-".repeat(60));
    for (id, state) in manager.states() {
        println!(
            "{:<7} {:<10} {:<20} {:<20}",
            id.to_string(),
            state.generator.to_string(),
            state.last_result.to_string(),
            state.position.to_string(),
        );
    }

    Ok(())
}
