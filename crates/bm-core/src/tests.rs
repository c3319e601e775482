//! Unit tests for bm-core primitives.

#[cfg(test)]
mod ids {
    use crate::{AgentId, PolyRef};

    #[test]
    fn index_roundtrip() {
        let id = AgentId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(AgentId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(AgentId::INVALID.0, u32::MAX);
        assert_eq!(PolyRef::INVALID.0, u32::MAX);
        assert!(!AgentId::default().is_valid());
        assert!(PolyRef(0).is_valid());
    }

    #[test]
    fn display() {
        assert_eq!(AgentId(7).to_string(), "AgentId(7)");
    }
}

#[cfg(test)]
mod position {
    use std::f32::consts::{FRAC_PI_2, PI, TAU};

    use crate::{Position, angle_difference, normalize_orientation, segment_distance};

    #[test]
    fn orientation_is_normalized() {
        let p = Position::new(0.0, 0.0, 0.0, -FRAC_PI_2);
        assert!((p.o - 3.0 * FRAC_PI_2).abs() < 1e-5);
        assert!(normalize_orientation(TAU) < 1e-6);
        assert!(normalize_orientation(-1e-9) < TAU);
    }

    #[test]
    fn distances() {
        let a = Position::at(0.0, 0.0, 0.0);
        let b = Position::at(3.0, 4.0, 12.0);
        assert!((a.distance_2d(b) - 5.0).abs() < 1e-5);
        assert!((a.distance(b) - 13.0).abs() < 1e-5);
    }

    #[test]
    fn offset_and_bearing_agree() {
        let a = Position::at(10.0, 10.0, 0.0);
        let b = a.offset(5.0, FRAC_PI_2);
        assert!((b.y - 15.0).abs() < 1e-4);
        assert!((a.angle_to(b) - FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn angle_difference_wraps() {
        assert!((angle_difference(0.1, TAU - 0.1) + 0.2).abs() < 1e-5);
        assert!((angle_difference(0.0, PI).abs() - PI).abs() < 1e-5);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Position::at(0.0, 0.0, 0.0);
        let b = Position::at(10.0, 0.0, 0.0);
        assert!((segment_distance(Position::at(5.0, 3.0, 0.0), a, b) - 3.0).abs() < 1e-5);
        assert!((segment_distance(Position::at(-4.0, 3.0, 0.0), a, b) - 5.0).abs() < 1e-5);
        assert!((segment_distance(Position::at(1.0, 1.0, 0.0), a, a) - 2f32.sqrt()).abs() < 1e-5);
    }
}

#[cfg(test)]
mod time {
    use crate::{GameClock, GameTime};

    #[test]
    fn clock_advances() {
        let mut c = GameClock::new();
        assert_eq!(c.advance(100), GameTime(100));
        assert_eq!(c.advance(250), GameTime(350));
        assert_eq!(c.ticks(), 2);
        assert_eq!(c.to_string(), "tick 2 (0.350s)");
    }

    #[test]
    fn since_saturates() {
        assert_eq!(GameTime(5).since(GameTime(10)), 0);
        assert_eq!(GameTime(1_500) - GameTime(500), 1_000);
    }
}

#[cfg(test)]
mod rng {
    use crate::{AgentId, AgentRng};

    #[test]
    fn same_seed_same_stream() {
        let mut a = AgentRng::new(99, AgentId(3));
        let mut b = AgentRng::new(99, AgentId(3));
        for _ in 0..16 {
            assert_eq!(a.unit().to_bits(), b.unit().to_bits());
        }
    }

    #[test]
    fn agents_get_distinct_streams() {
        let mut a = AgentRng::new(99, AgentId(3));
        let mut b = AgentRng::new(99, AgentId(4));
        let sa: Vec<u32> = (0..8).map(|_| a.unit().to_bits()).collect();
        let sb: Vec<u32> = (0..8).map(|_| b.unit().to_bits()).collect();
        assert_ne!(sa, sb);
    }

    #[test]
    fn distance_respects_bounds() {
        let mut r = AgentRng::new(1, AgentId(0));
        for _ in 0..100 {
            let d = r.distance(3.0, 10.0);
            assert!((3.0..10.0).contains(&d));
        }
        assert_eq!(r.distance(5.0, 5.0), 5.0);
    }
}

#[cfg(test)]
mod formation {
    use std::f32::consts::TAU;

    use crate::{FormationType, Position, calculate_formation_position};

    #[test]
    fn circle_slots_equal_radius_and_spacing() {
        let n = 7;
        let slots: Vec<_> = (0..n)
            .map(|i| calculate_formation_position(FormationType::Circle, i, n, 3.0))
            .collect();
        let r0 = slots[0].follow_distance;
        for s in &slots {
            assert!((s.follow_distance - r0).abs() < 1e-4, "radius {} vs {r0}", s.follow_distance);
        }
        let step = TAU / n as f32;
        for i in 0..n {
            let a = slots[i].relative_y.atan2(slots[i].relative_x);
            let b = slots[(i + 1) % n].relative_y.atan2(slots[(i + 1) % n].relative_x);
            let gap = (b - a).rem_euclid(TAU);
            assert!((gap - step).abs() < 1e-4, "gap {gap} at slot {i}");
        }
    }

    #[test]
    fn line_is_flat_and_symmetric() {
        let n = 5;
        let xs: Vec<f32> = (0..n)
            .map(|i| {
                let p = calculate_formation_position(FormationType::Line, i, n, 2.0);
                assert_eq!(p.relative_y, 0.0);
                p.relative_x
            })
            .collect();
        for i in 0..n {
            assert!((xs[i] + xs[n - 1 - i]).abs() < 1e-5);
        }
        assert_eq!(xs[2], 0.0);
    }

    #[test]
    fn column_trails_leader() {
        let p = calculate_formation_position(FormationType::Column, 2, 4, 2.5);
        assert_eq!(p.relative_x, 0.0);
        assert!((p.relative_y + 7.5).abs() < 1e-5);
    }

    #[test]
    fn slot_out_of_range_is_clamped() {
        let a = calculate_formation_position(FormationType::Wedge, 99, 3, 2.0);
        let b = calculate_formation_position(FormationType::Wedge, 2, 3, 2.0);
        assert_eq!(a, b);
        let _ = calculate_formation_position(FormationType::Square, 0, 0, 2.0);
    }

    #[test]
    fn world_point_rotates_with_leader() {
        let slot = calculate_formation_position(FormationType::Column, 0, 1, 4.0);
        // Leader facing +x: slot is 4 units behind on the x axis.
        let p = slot.world_point(Position::new(10.0, 0.0, 0.0, 0.0));
        assert!((p.x - 6.0).abs() < 1e-4 && p.y.abs() < 1e-4);
        // Leader facing +y: slot is 4 units behind on the y axis.
        let q = slot.world_point(Position::new(10.0, 0.0, 0.0, std::f32::consts::FRAC_PI_2));
        assert!((q.x - 10.0).abs() < 1e-4 && (q.y + 4.0).abs() < 1e-4);
    }

    #[test]
    fn right_hand_slot_is_right_of_leader() {
        // Line slot 1 of 2 sits at +x in the leader frame (to the right).
        let slot = calculate_formation_position(FormationType::Line, 1, 2, 2.0);
        assert!(slot.relative_x > 0.0);
        let p = slot.world_point(Position::new(0.0, 0.0, 0.0, 0.0));
        // Facing +x, the right-hand side is -y.
        assert!(p.y < 0.0);
    }
}

#[cfg(test)]
mod sandbox {
    use crate::{
        Aabb, AgentId, MovementHost, Position, SandboxWorld, TerrainKind, TerrainZone, WorldQuery,
    };

    fn world() -> SandboxWorld {
        let mut w = SandboxWorld::new(Aabb::new(-50.0, -50.0, 50.0, 50.0));
        w.add_wall(Aabb::new(10.0, -5.0, 12.0, 5.0));
        w.add_zone(TerrainZone::new(-20.0, -20.0, 5.0, TerrainKind::Lava));
        w.add_platform(Aabb::new(30.0, 30.0, 40.0, 40.0), 25.0);
        w
    }

    #[test]
    fn ground_and_void() {
        let w = world();
        assert_eq!(w.ground_height(0.0, 0.0, 1.0, 20.0), Some(0.0));
        assert_eq!(w.ground_height(80.0, 0.0, 1.0, 20.0), None);
        // Platform top is 25 below the probe: outside a 20-unit search.
        assert_eq!(w.ground_height(35.0, 35.0, 50.0, 20.0), None);
        assert_eq!(w.terrain_at(Position::at(80.0, 0.0, 0.0)), TerrainKind::Void);
    }

    #[test]
    fn zones_classify_terrain() {
        let w = world();
        assert_eq!(w.terrain_at(Position::at(-20.0, -18.0, 0.0)), TerrainKind::Lava);
        assert_eq!(w.terrain_at(Position::at(0.0, 0.0, 0.0)), TerrainKind::Ground);
    }

    #[test]
    fn walls_block_sight_and_motion() {
        let w = world();
        let a = Position::at(0.0, 0.0, 0.0);
        let b = Position::at(20.0, 0.0, 0.0);
        assert!(!w.line_of_sight(a, b));
        assert!(w.is_blocked(a, b));
        let c = Position::at(20.0, 10.0, 0.0);
        assert!(!w.is_blocked(Position::at(0.0, 10.0, 0.0), c));
    }

    #[test]
    fn step_moves_toward_target_and_arrives() {
        let w = world();
        let id = AgentId(1);
        w.spawn_at(id, Position::at(0.0, 20.0, 0.0));
        w.move_to(id, Position::at(10.0, 20.0, 0.0), 5.0, None);
        w.step(1_000);
        let p = w.position(id).unwrap();
        assert!((p.x - 5.0).abs() < 1e-3);
        assert!(w.snapshot(id).unwrap().is_moving);
        w.step(1_000);
        let s = w.snapshot(id).unwrap();
        assert!(s.position.approx_eq(Position::at(10.0, 20.0, 0.0), 1e-3));
        assert!(!s.is_moving);
        assert!(w.move_target(id).is_none());
    }

    #[test]
    fn blocked_agent_keeps_moving_flag() {
        let w = world();
        let id = AgentId(2);
        w.spawn_at(id, Position::at(9.0, 0.0, 0.0));
        w.move_to(id, Position::at(20.0, 0.0, 0.0), 7.0, None);
        w.step(500);
        let s = w.snapshot(id).unwrap();
        assert!(s.is_moving);
        assert!((s.position.x - 9.0).abs() < 1e-4);
    }

    #[test]
    fn pinned_agent_does_not_advance() {
        let w = world();
        let id = AgentId(3);
        w.spawn_at(id, Position::at(0.0, 0.0, 0.0));
        w.pin(id, true);
        w.move_to(id, Position::at(0.0, 30.0, 0.0), 7.0, None);
        w.step(1_000);
        assert_eq!(w.position(id).unwrap().y, 0.0);
        w.pin(id, false);
        w.step(1_000);
        assert!(w.position(id).unwrap().y > 6.0);
    }

    #[test]
    fn teleport_and_stop_clear_orders() {
        let w = world();
        let id = AgentId(4);
        w.spawn_at(id, Position::at(0.0, 0.0, 0.0));
        w.move_to(id, Position::at(0.0, 30.0, 0.0), 7.0, None);
        w.stop(id);
        assert!(!w.snapshot(id).unwrap().is_moving);
        w.move_to(id, Position::at(0.0, 30.0, 0.0), 7.0, None);
        w.teleport(id, Position::at(-5.0, -5.0, 0.0));
        assert!(w.move_target(id).is_none());
        assert_eq!(w.order_count(id), 2);
        assert!(w.despawn(id));
        assert!(w.snapshot(id).is_none());
    }
}
