//! Unit tests for bm-pathing.

use std::sync::Arc;

use bm_core::{Aabb, AgentId, AgentSnapshot, GameTime, Position, SandboxWorld, TerrainKind};
use bm_navmesh::NavMeshInterface;
use bm_validation::MovementValidator;

use crate::{MovementPath, PathNode, PathType, PathfindingAdapter};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn p(x: f32, y: f32) -> Position {
    Position::at(x, y, 0.0)
}

fn path_through(points: &[(f32, f32)]) -> MovementPath {
    let nodes = points.iter().map(|&(x, y)| PathNode::new(p(x, y), 7.0, TerrainKind::Ground)).collect();
    MovementPath::from_nodes(nodes, PathType::Normal)
}

/// 120×20 open field with a matching single-floor mesh.
fn open_field() -> (SandboxWorld, PathfindingAdapter) {
    let bounds = Aabb::new(-10.0, -10.0, 110.0, 10.0);
    let world = SandboxWorld::new(bounds);
    let mesh = NavMeshInterface::flat_world_grid(bounds, 2.0, 0.0, |_| Some(TerrainKind::Ground));
    let adapter = PathfindingAdapter::new(NavMeshInterface::with_mesh(mesh), Arc::new(MovementValidator::default()));
    (world, adapter)
}

/// Like `open_field`, but 10 units taller and with a wall across
/// x = 48..52 for y < 4, cut out of the mesh as well.
fn walled_field() -> (SandboxWorld, PathfindingAdapter) {
    let bounds = Aabb::new(-10.0, -10.0, 110.0, 20.0);
    let mut world = SandboxWorld::new(bounds);
    world.add_wall(Aabb::new(48.0, -10.0, 52.0, 4.0));
    let mesh = NavMeshInterface::flat_world_grid(bounds, 2.0, 0.0, |c| {
        let in_wall = (48.0..52.0).contains(&c.x) && c.y < 4.0;
        (!in_wall).then_some(TerrainKind::Ground)
    });
    let adapter = PathfindingAdapter::new(NavMeshInterface::with_mesh(mesh), Arc::new(MovementValidator::default()));
    (world, adapter)
}

fn agent_at(x: f32, y: f32) -> AgentSnapshot {
    AgentSnapshot::new(AgentId(1), p(x, y))
}

// ── MovementPath ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod movement_path {
    use super::*;
    use crate::polyline_length;

    #[test]
    fn validity() {
        assert!(!MovementPath::no_path().is_valid());
        let direct = MovementPath::direct(p(0.0, 0.0), p(3.0, 4.0), 7.0, TerrainKind::Ground);
        assert!(direct.is_valid());
        assert_eq!(direct.len(), 1);
        assert_eq!(direct.total_length, 5.0);
        let empty = MovementPath::from_nodes(Vec::new(), PathType::Normal);
        assert!(!empty.is_valid());
    }

    #[test]
    fn length_follows_nodes() {
        let path = path_through(&[(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)]);
        assert!((path.total_length - 11.0).abs() < 1e-5);
        assert_eq!(polyline_length([p(1.0, 1.0)]), 0.0);
        assert_eq!(path.first(), Some(p(0.0, 0.0)));
        assert_eq!(path.destination(), Some(p(3.0, 10.0)));
    }

    #[test]
    fn rejoin_drops_legs_already_walked() {
        let mut path = path_through(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)]);
        assert!(path.rejoin(p(10.5, 5.0)));
        assert_eq!(path.points(), vec![p(10.5, 5.0), p(10.0, 10.0), p(20.0, 10.0)]);
        assert!((path.total_length - (25.25f32.sqrt() + 10.0)).abs() < 1e-4);
        assert!(!path.nodes[0].is_smoothed);

        // Standing on node 0 leaves the path alone.
        let before = path.clone();
        assert!(!path.rejoin(p(10.5, 5.01)));
        assert_eq!(path, before);

        // Behind the start: a lead-in leg is added, nothing is dropped.
        let mut path = path_through(&[(0.0, 0.0), (10.0, 0.0)]);
        assert!(path.rejoin(p(-5.0, 0.0)));
        assert_eq!(path.points(), vec![p(-5.0, 0.0), p(0.0, 0.0), p(10.0, 0.0)]);
        assert!(!MovementPath::no_path().rejoin(p(1.0, 1.0)));
    }
}

// ── Optimizer ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod optimizer {
    use super::*;
    use bm_core::segment_distance;
    use crate::optimizer::{catmull_rom, douglas_peucker};
    use crate::{OptimizationLevel, OptimizeOutcome, OptimizerParams, PathOptimizer, PathPreset, SmoothingMode};

    fn open(_: Position, _: Position) -> bool {
        true
    }

    /// Blocks anything passing within one unit of (6, 5).
    fn pillar(a: Position, b: Position) -> bool {
        segment_distance(p(6.0, 5.0), a, b) > 1.0
    }

    fn basic() -> PathOptimizer {
        PathOptimizer::new(OptimizerParams::default().with_level(OptimizationLevel::Basic))
    }

    #[test]
    fn basic_removes_a_clear_corner() {
        let mut path = path_through(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert_eq!(basic().optimize(&mut path, &open), OptimizeOutcome::Applied);
        assert_eq!(path.points(), vec![p(0.0, 0.0), p(10.0, 10.0)]);
        assert!((path.total_length - 200f32.sqrt()).abs() < 1e-4);
        assert!(path.is_optimized);
    }

    #[test]
    fn sharp_turns_and_blocked_shortcuts_survive() {
        let mut hairpin = path_through(&[(0.0, 0.0), (10.0, 0.0), (0.0, 1.0)]);
        basic().optimize(&mut hairpin, &open);
        assert_eq!(hairpin.len(), 3);

        let mut corner = path_through(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        basic().optimize(&mut corner, &pillar);
        assert_eq!(corner.len(), 3);
    }

    #[test]
    fn full_cuts_and_smooths_around_an_obstacle() {
        let original = path_through(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let mut path = original.clone();
        let opt = PathOptimizer::preset(PathPreset::Standard);
        assert_eq!(opt.optimize(&mut path, &pillar), OptimizeOutcome::Applied);

        assert_eq!(path.len(), 3);
        assert!(path.nodes[1].is_smoothed);
        assert!(path.total_length < original.total_length);
        assert_eq!(path.first(), original.first());
        assert_eq!(path.destination(), original.destination());
        for w in path.nodes.windows(2) {
            assert!(pillar(w[0].position, w[1].position));
        }
    }

    #[test]
    fn length_guard_reverts() {
        let params = OptimizerParams {
            level: OptimizationLevel::Full,
            smoothing: SmoothingMode::CatmullRom,
            corner_threshold_deg: 180.0,
            max_waypoint_distance: 0.1,
            max_length_ratio: 1.0,
            ..OptimizerParams::default()
        };
        assert!(params.validate().is_ok());
        let original = path_through(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)]);
        let mut path = original.clone();
        assert_eq!(PathOptimizer::new(params).optimize(&mut path, &open), OptimizeOutcome::Reverted);
        assert_eq!(path, original);
        assert!(!path.is_optimized);
    }

    #[test]
    fn short_or_disabled_paths_are_skipped() {
        let mut two = path_through(&[(0.0, 0.0), (10.0, 0.0)]);
        assert_eq!(basic().optimize(&mut two, &open), OptimizeOutcome::Skipped);
        let none = PathOptimizer::new(OptimizerParams::default().with_level(OptimizationLevel::None));
        let mut three = path_through(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert_eq!(none.optimize(&mut three, &open), OptimizeOutcome::Skipped);
        assert_eq!(three.len(), 3);
    }

    #[test]
    fn douglas_peucker_respects_tolerance_and_clearance() {
        let wiggle = [(0.0, 0.0), (1.0, 0.1), (2.0, -0.1), (3.0, 0.05), (4.0, 0.0)];

        let mut nodes = path_through(&wiggle).nodes;
        assert_eq!(douglas_peucker(&mut nodes, 0.75, &open), 3);
        assert_eq!(nodes.len(), 2);

        // Chords longer than 3.5 are "blocked": the span must be split once.
        let short = |a: Position, b: Position| a.distance(b) < 3.5;
        let mut nodes = path_through(&wiggle).nodes;
        douglas_peucker(&mut nodes, 0.75, &short);
        assert_eq!(nodes.len(), 3);
        for w in nodes.windows(2) {
            assert!(short(w[0].position, w[1].position));
        }
    }

    #[test]
    fn catmull_rom_interpolates_its_control_points() {
        let (a, b, c, d) = (p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(20.0, 10.0));
        assert!(catmull_rom(a, b, c, d, 0.0).approx_eq(b, 1e-5));
        assert!(catmull_rom(a, b, c, d, 1.0).approx_eq(c, 1e-5));
    }

    #[test]
    fn no_preset_lengthens_or_moves_endpoints() {
        let routes: [&[(f32, f32)]; 3] = [
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)],
            &[(0.0, 0.0), (5.0, 1.0), (10.0, -1.0), (15.0, 1.0), (20.0, 0.0)],
            &[(0.0, 0.0), (30.0, 0.0), (30.0, 30.0), (0.0, 30.0), (0.0, 5.0)],
        ];
        let presets = [
            PathPreset::Standard,
            PathPreset::Chase,
            PathPreset::Flee,
            PathPreset::Formation,
            PathPreset::Patrol,
        ];
        for route in routes {
            for preset in presets {
                let original = path_through(route);
                let mut path = original.clone();
                PathOptimizer::preset(preset).optimize(&mut path, &open);
                assert!(path.total_length <= original.total_length * 1.1 + 1e-3, "{preset:?}");
                assert!(path.first().unwrap().approx_eq(original.first().unwrap(), 0.01));
                assert!(path.destination().unwrap().approx_eq(original.destination().unwrap(), 0.01));
            }
        }
    }

    #[test]
    fn presets_are_valid() {
        for preset in [PathPreset::Standard, PathPreset::Chase, PathPreset::Flee, PathPreset::Formation, PathPreset::Patrol] {
            assert!(OptimizerParams::preset(preset).validate().is_ok(), "{preset:?}");
        }
        let bad = OptimizerParams { smoothing_factor: 1.5, ..OptimizerParams::default() };
        assert!(bad.validate().is_err());
    }
}

// ── Cache ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod cache {
    use super::*;
    use crate::{CacheConfig, PathCache};

    fn sample() -> MovementPath {
        MovementPath::direct(p(0.0, 0.0), p(10.0, 0.0), 7.0, TerrainKind::Ground)
    }

    const A: AgentId = AgentId(1);

    #[test]
    fn hits_within_the_quantization_cell() {
        let cache = PathCache::default();
        cache.insert(A, p(10.0, 10.0), &sample(), GameTime(0));
        assert!(cache.get(A, p(11.5, 10.9), GameTime(10)).is_some());
        assert!(cache.get(A, p(12.1, 10.0), GameTime(10)).is_none());
        assert!(cache.get(AgentId(2), p(10.0, 10.0), GameTime(10)).is_none());
        // A different floor never shares an entry.
        assert!(cache.get(A, Position::at(10.0, 10.0, 8.0), GameTime(10)).is_none());
        assert_eq!(cache.hit_count(A, p(10.0, 10.0)), Some(1));
        let s = cache.stats();
        assert_eq!((s.hits, s.misses, s.entries), (1, 3, 1));
    }

    #[test]
    fn refused_entries_count_as_misses() {
        let cache = PathCache::default();
        cache.insert(A, p(10.0, 10.0), &sample(), GameTime(0));
        assert!(cache.get_with(A, p(10.0, 10.0), GameTime(10), |_| None).is_none());
        let shifted = cache.get_with(A, p(10.0, 10.0), GameTime(20), |path| {
            let mut path = path.clone();
            path.rejoin(p(5.0, 0.0));
            Some(path)
        });
        assert_eq!(shifted.unwrap().points(), vec![p(5.0, 0.0), p(10.0, 0.0)]);
        let s = cache.stats();
        assert_eq!((s.hits, s.misses), (1, 1));
        assert_eq!(cache.hit_count(A, p(10.0, 10.0)), Some(1));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = PathCache::default();
        cache.insert(A, p(0.0, 0.0), &sample(), GameTime(1_000));
        assert!(cache.get(A, p(0.0, 0.0), GameTime(30_999)).is_some());
        assert!(cache.get(A, p(0.0, 0.0), GameTime(31_000)).is_none());
        // Still physically present until a sweep runs.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep(GameTime(4_000)), 0);
        assert_eq!(cache.sweep(GameTime(31_000)), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn capacity_evicts_oldest_insertion() {
        let cache = PathCache::new(CacheConfig { capacity: 2, ..CacheConfig::default() });
        let (a, b, c) = (p(0.0, 0.0), p(20.0, 0.0), p(40.0, 0.0));
        cache.insert(A, a, &sample(), GameTime(0));
        cache.insert(A, b, &sample(), GameTime(1));
        // Re-inserting `a` makes `b` the oldest.
        cache.insert(A, a, &sample(), GameTime(2));
        cache.insert(A, c, &sample(), GameTime(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(A, a, GameTime(4)).is_some());
        assert!(cache.get(A, b, GameTime(4)).is_none());
        assert!(cache.get(A, c, GameTime(4)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn invalid_entries_and_paths() {
        let cache = PathCache::default();
        cache.insert(A, p(0.0, 0.0), &MovementPath::no_path(), GameTime(0));
        assert!(cache.is_empty());

        cache.insert(A, p(0.0, 0.0), &sample(), GameTime(0));
        assert!(cache.invalidate(A, p(0.0, 0.0)));
        assert!(cache.get(A, p(0.0, 0.0), GameTime(1)).is_none());
        assert_eq!(cache.sweep(GameTime(5_000)), 1);
    }

    #[test]
    fn agent_removal_and_reconfiguration() {
        let cache = PathCache::default();
        cache.insert(A, p(0.0, 0.0), &sample(), GameTime(0));
        cache.insert(A, p(20.0, 0.0), &sample(), GameTime(0));
        cache.insert(AgentId(2), p(0.0, 0.0), &sample(), GameTime(0));
        assert_eq!(cache.remove_agent(A), 2);
        assert_eq!(cache.len(), 1);

        cache.set_config(CacheConfig { grid_xy: 5.0, ..CacheConfig::default() }).unwrap();
        assert!(cache.is_empty());
        assert!(cache.set_config(CacheConfig { capacity: 0, ..CacheConfig::default() }).is_err());

        cache.set_config(CacheConfig { enabled: false, ..CacheConfig::default() }).unwrap();
        cache.insert(A, p(0.0, 0.0), &sample(), GameTime(0));
        assert!(cache.get(A, p(0.0, 0.0), GameTime(0)).is_none());
    }
}

// ── Adapter ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod adapter {
    use super::*;
    use bm_core::{AgentRng, FormationType, calculate_formation_position};
    use bm_validation::DangerZone;
    use crate::{PathOptions, PathPlanner, PathingError};

    #[test]
    fn straight_line_across_open_ground() {
        let (world, adapter) = open_field();
        let agent = agent_at(0.0, 0.0);
        let path = adapter.calculate(&world, &agent, p(100.0, 0.0), &PathOptions::default(), GameTime(0));
        assert_eq!(path.path_type, PathType::Normal);
        assert!((path.total_length - 100.0).abs() < 0.1);
        assert!(path.destination().unwrap().approx_eq(p(100.0, 0.0), 0.01));
        assert!(path.first().unwrap().approx_eq(p(0.0, 0.0), 0.01));
        let m = adapter.metrics();
        assert_eq!(m.paths_generated, 1);
        assert!((m.average_length - 100.0).abs() < 0.1);
    }

    #[test]
    fn detour_stays_valid() {
        let (world, adapter) = walled_field();
        let agent = agent_at(0.0, 0.0);
        let path = adapter.calculate(&world, &agent, p(100.0, 0.0), &PathOptions::default(), GameTime(0));
        assert_eq!(path.path_type, PathType::Normal);
        assert!(path.total_length > 100.0);
        assert!(path.destination().unwrap().approx_eq(p(100.0, 0.0), 0.01));
        let validator = adapter.shared_validator();
        for w in path.nodes.windows(2) {
            assert!(validator.validate_segment(&world, &agent, w[0].position, w[1].position).is_ok());
        }
    }

    #[test]
    fn short_and_forced_paths_skip_the_search() {
        let (world, adapter) = open_field();
        let agent = agent_at(0.0, 0.0);
        let short = adapter.calculate(&world, &agent, p(3.0, 0.0), &PathOptions::default(), GameTime(0));
        assert_eq!(short.path_type, PathType::Shortcut);
        assert_eq!(short.points(), vec![p(3.0, 0.0)]);

        let forced = adapter.calculate(&world, &agent, p(100.0, 0.0), &PathOptions::direct(), GameTime(0));
        assert_eq!(forced.path_type, PathType::Shortcut);
        assert_eq!(forced.len(), 1);
        assert_eq!(forced.total_length, 100.0);
        assert_eq!(adapter.metrics().direct_paths, 2);
        assert!(adapter.cache().is_empty());
    }

    #[test]
    fn repeated_requests_hit_the_cache() {
        let (world, adapter) = open_field();
        let agent = agent_at(0.0, 0.0);
        let opts = PathOptions::default();
        let first = adapter.calculate(&world, &agent, p(100.0, 0.0), &opts, GameTime(0));
        let second = adapter.calculate(&world, &agent, p(100.5, 0.5), &opts, GameTime(500));
        assert_eq!(first, second);
        let m = adapter.metrics();
        assert_eq!((m.paths_generated, m.cache.hits), (1, 1));

        let uncached = adapter.calculate(&world, &agent, p(100.0, 0.0), &opts.uncached(), GameTime(600));
        assert!(uncached.is_valid());
        assert_eq!(adapter.metrics().paths_generated, 2);

        adapter.forget_agent(agent.id);
        assert!(adapter.cache().is_empty());
    }

    #[test]
    fn cached_paths_start_where_the_agent_is_now() {
        let (world, adapter) = walled_field();
        let opts = PathOptions::default();
        let dest = p(60.0, -5.0);
        let first = adapter.calculate(&world, &agent_at(40.0, -5.0), dest, &opts, GameTime(0));
        assert_eq!(first.path_type, PathType::Normal);

        // Part of the way toward the gap over the wall.
        let moved = agent_at(44.0, 1.0);
        let second = adapter.calculate(&world, &moved, dest, &opts, GameTime(500));
        let m = adapter.metrics();
        assert_eq!((m.paths_generated, m.cache.hits), (1, 1));
        assert!(second.first().unwrap().approx_eq(moved.position, 0.01));
        assert!(second.destination().unwrap().approx_eq(dest, 0.01));
        assert!(second.total_length < first.total_length);
        let validator = adapter.shared_validator();
        for w in second.nodes.windows(2) {
            assert!(validator.validate_segment(&world, &moved, w[0].position, w[1].position).is_ok());
        }
        // No leg of the reused path leads back toward the old start.
        for n in &second.nodes[1..] {
            assert!(n.position.distance_2d(p(40.0, -5.0)) > moved.position.distance_2d(p(40.0, -5.0)));
        }
    }

    #[test]
    fn failures_are_no_path() {
        let (world, adapter) = open_field();
        let agent = agent_at(0.0, 0.0);
        let off_mesh = adapter.calculate(&world, &agent, p(300.0, 0.0), &PathOptions::default(), GameTime(0));
        assert_eq!(off_mesh.path_type, PathType::NoPath);
        assert!(!off_mesh.is_valid());

        let unloaded = PathfindingAdapter::new(NavMeshInterface::unloaded(), Arc::new(MovementValidator::default()));
        let path = unloaded.calculate(&world, &agent, p(50.0, 0.0), &PathOptions::default(), GameTime(0));
        assert_eq!(path.path_type, PathType::NoPath);
        assert_eq!(unloaded.metrics().no_path, 1);
    }

    #[test]
    fn validation_rejects_paths_through_danger() {
        let (world, adapter) = open_field();
        adapter.shared_validator().add_danger_zone(DangerZone::new(p(50.0, 0.0), 3.0));
        let agent = agent_at(0.0, 0.0);
        let path = adapter.calculate(&world, &agent, p(100.0, 0.0), &PathOptions::default(), GameTime(0));
        assert_eq!(path.path_type, PathType::NoPath);
        assert_eq!(adapter.metrics().validation_failures, 1);
    }

    #[test]
    fn derived_destinations() {
        let (world, adapter) = open_field();
        world.spawn_at(AgentId(2), p(30.0, 0.0));
        world.spawn_at(AgentId(3), p(20.0, 0.0));
        let agent = agent_at(0.0, 0.0);
        let opts = PathOptions::default();

        let to_unit = adapter
            .calculate_path_to_unit(&world, &agent, AgentId(2), 5.0, None, &opts, GameTime(0))
            .unwrap();
        assert!(to_unit.destination().unwrap().approx_eq(p(25.0, 0.0), 0.01));

        let missing = adapter.calculate_path_to_unit(&world, &agent, AgentId(9), 5.0, None, &opts, GameTime(0));
        assert_eq!(missing, Err(PathingError::AgentNotFound(AgentId(9))));

        let slot = calculate_formation_position(FormationType::Column, 0, 3, 3.0);
        let follower = agent_at(5.0, 0.0);
        let formation = adapter
            .calculate_formation_path(&world, &follower, AgentId(3), &slot, &opts, GameTime(0))
            .unwrap();
        assert!(formation.destination().unwrap().approx_eq(p(17.0, 0.0), 0.01));
    }

    #[test]
    fn flee_points_away_or_fails_cleanly() {
        let (world, adapter) = open_field();
        let opts = PathOptions::default();

        let agent = agent_at(50.0, 0.0);
        let threat = p(45.0, 0.0);
        let path = adapter.calculate_flee_path(&world, &agent, threat, 10.0, &opts, GameTime(0)).unwrap();
        assert!(path.destination().unwrap().distance_2d(threat) >= 10.0);

        // Cornered against the east edge: every probe leaves the map.
        let cornered = agent_at(105.0, 0.0);
        let out = adapter.calculate_flee_path(&world, &cornered, p(100.0, 0.0), 10.0, &opts, GameTime(0));
        assert_eq!(out, Err(PathingError::NoFleeDirection));
    }

    #[test]
    fn random_points_stay_near_the_centre() {
        let (world, adapter) = open_field();
        let mut rng = AgentRng::new(7, AgentId(1));
        for _ in 0..20 {
            let q = adapter.random_point(&world, p(50.0, 0.0), 5.0, &mut rng).unwrap();
            assert!(q.distance_2d(p(50.0, 0.0)) <= 5.0 + 1e-3);
        }
    }

    #[test]
    fn flee_fan_alternates() {
        let fan: Vec<f32> = crate::flee_fan().map(f32::to_degrees).collect();
        assert_eq!(fan.len(), 9);
        assert!(fan[0].abs() < 1e-4);
        assert!((fan[1] - 30.0).abs() < 1e-3 && (fan[2] + 30.0).abs() < 1e-3);
        assert!((fan[8] + 120.0).abs() < 1e-3);
    }
}
