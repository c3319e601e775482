//! Unit tests for bm-validation.
//!
//! Every test runs against a small `SandboxWorld`.

#[cfg(test)]
mod helpers {
    use bm_core::{Aabb, SandboxWorld, TerrainKind, TerrainZone};

    /// 100×100 map: a wall at x = 10..12, lava at (-20, -20), deep water at
    /// (20, -20), a 25-unit platform over (30..40, 30..40).
    pub fn world() -> SandboxWorld {
        let mut w = SandboxWorld::new(Aabb::new(-50.0, -50.0, 50.0, 50.0));
        w.add_wall(Aabb::new(10.0, -5.0, 12.0, 5.0));
        w.add_zone(TerrainZone::new(-20.0, -20.0, 5.0, TerrainKind::Lava));
        w.add_zone(TerrainZone::new(20.0, -20.0, 5.0, TerrainKind::DeepWater));
        w.add_platform(Aabb::new(30.0, 30.0, 40.0, 40.0), 25.0);
        w
    }

    /// Open map with four walls boxing in the origin.
    pub fn pen() -> SandboxWorld {
        let mut w = SandboxWorld::new(Aabb::new(-50.0, -50.0, 50.0, 50.0));
        w.add_wall(Aabb::new(-1.5, -1.5, -1.0, 1.5));
        w.add_wall(Aabb::new(1.0, -1.5, 1.5, 1.5));
        w.add_wall(Aabb::new(-1.5, -1.5, 1.5, -1.0));
        w.add_wall(Aabb::new(-1.5, 1.0, 1.5, 1.5));
        w
    }
}

// ── Destinations ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod destination {
    use bm_core::{AgentId, AgentSnapshot, Position, TerrainKind};
    use crate::{DangerZone, MovementValidator, ValidationError};

    fn walker(at: Position) -> AgentSnapshot {
        AgentSnapshot::new(AgentId(1), at)
    }

    #[test]
    fn open_ground_is_valid() {
        let w = super::helpers::world();
        let v = MovementValidator::default();
        let a = walker(Position::at(0.0, 0.0, 0.0));
        assert!(v.validate_destination(&w, &a, a.position, Position::at(5.0, 20.0, 0.0)).is_ok());
    }

    #[test]
    fn void_and_walls_are_rejected() {
        let w = super::helpers::world();
        let v = MovementValidator::default();
        let a = walker(Position::at(0.0, 0.0, 0.0));
        assert_eq!(
            v.validate_destination(&w, &a, a.position, Position::at(80.0, 0.0, 0.0)),
            Err(ValidationError::Void)
        );
        // Inside the wall box: nothing clear straight down.
        assert_eq!(
            v.validate_destination(&w, &a, a.position, Position::at(11.0, 0.0, 0.0)),
            Err(ValidationError::Void)
        );
    }

    #[test]
    fn hazards_and_swimming() {
        let w = super::helpers::world();
        let v = MovementValidator::default();
        let mut a = walker(Position::at(0.0, 0.0, 0.0));
        assert_eq!(
            v.validate_destination(&w, &a, a.position, Position::at(-20.0, -20.0, 0.0)),
            Err(ValidationError::Hazardous(TerrainKind::Lava))
        );
        assert!(v.validate_destination(&w, &a, a.position, Position::at(20.0, -20.0, 0.0)).is_ok());
        a.can_swim = false;
        assert_eq!(
            v.validate_destination(&w, &a, a.position, Position::at(20.0, -20.0, 0.0)),
            Err(ValidationError::RequiresSwimming)
        );
    }

    #[test]
    fn danger_zones_can_be_cleared() {
        let w = super::helpers::world();
        let v = MovementValidator::default();
        let a = walker(Position::at(0.0, 0.0, 0.0));
        let dest = Position::at(0.0, 20.0, 0.0);
        v.add_danger_zone(DangerZone::new(Position::at(0.0, 22.0, 0.0), 4.0));
        assert_eq!(v.danger_zone_count(), 1);
        assert_eq!(v.validate_destination(&w, &a, a.position, dest), Err(ValidationError::DangerZone));
        v.clear_danger_zones();
        assert!(v.validate_destination(&w, &a, a.position, dest).is_ok());
    }

    #[test]
    fn flight_required_unless_flyer() {
        let w = super::helpers::world();
        let v = MovementValidator::default();
        let mut a = walker(Position::at(0.0, 0.0, 0.0));
        let high = Position::at(0.0, 20.0, 10.0);
        assert!(matches!(
            v.validate_destination(&w, &a, a.position, high),
            Err(ValidationError::RequiresFlight { .. })
        ));
        a.can_fly = true;
        assert!(v.validate_destination(&w, &a, a.position, high).is_ok());
    }

    #[test]
    fn long_drops_are_unsafe_without_buffs() {
        let w = super::helpers::world();
        let v = MovementValidator::default();
        let mut a = walker(Position::at(35.0, 35.0, 25.0));
        let below = Position::at(20.0, 35.0, 0.0);
        assert!(matches!(
            v.validate_destination(&w, &a, a.position, below),
            Err(ValidationError::UnsafeFall { .. })
        ));
        a.safe_fall_bonus = 15.0;
        assert!(v.validate_destination(&w, &a, a.position, below).is_ok());
    }

    #[test]
    fn counters_track_failures() {
        let w = super::helpers::world();
        let v = MovementValidator::default();
        let a = walker(Position::at(0.0, 0.0, 0.0));
        let _ = v.validate_destination(&w, &a, a.position, Position::at(80.0, 0.0, 0.0));
        let _ = v.validate_destination(&w, &a, a.position, Position::at(1.0, 1.0, 0.0));
        let s = v.stats();
        assert_eq!(s.destinations_checked, 2);
        assert_eq!(s.destinations_failed, 1);
    }
}

// ── Segments & paths ──────────────────────────────────────────────────────────

#[cfg(test)]
mod paths {
    use bm_core::{AgentId, AgentSnapshot, Position, TerrainKind};
    use crate::{MovementValidator, ValidationError, ValidatorConfig};

    #[test]
    fn segments_collide_and_sample_terrain() {
        let w = super::helpers::world();
        let v = MovementValidator::default();
        let a = AgentSnapshot::new(AgentId(1), Position::at(0.0, 0.0, 0.0));
        assert_eq!(
            v.validate_segment(&w, &a, Position::at(0.0, 0.0, 0.0), Position::at(20.0, 0.0, 0.0)),
            Err(ValidationError::Blocked)
        );
        assert_eq!(
            v.validate_segment(&w, &a, Position::at(-30.0, -20.0, 0.0), Position::at(-10.0, -20.0, 0.0)),
            Err(ValidationError::Hazardous(TerrainKind::Lava))
        );
        assert!(v.validate_segment(&w, &a, Position::at(0.0, 10.0, 0.0), Position::at(20.0, 10.0, 0.0)).is_ok());
    }

    #[test]
    fn path_length_and_emptiness() {
        let w = super::helpers::world();
        let v = MovementValidator::new(
            ValidatorConfig { max_path_length: 50.0, ..ValidatorConfig::default() },
            Default::default(),
        );
        let a = AgentSnapshot::new(AgentId(1), Position::at(0.0, 10.0, 0.0));
        let long = [Position::at(0.0, 10.0, 0.0), Position::at(30.0, 10.0, 0.0), Position::at(0.0, 10.0, 0.0)];
        assert!(matches!(v.validate_path(&w, &a, &long), Err(ValidationError::PathTooLong { .. })));
        assert_eq!(v.validate_path(&w, &a, &[]), Err(ValidationError::EmptyPath));
        assert!(v.validate_path(&w, &a, &long[..2]).is_ok());
        assert!(v.validate_path(&w, &a, &long[..1]).is_ok());
        assert_eq!(v.stats().paths_failed, 2);
    }

    #[test]
    fn bad_config_is_refused() {
        let v = MovementValidator::default();
        let bad = ValidatorConfig { sample_interval: 0.0, ..ValidatorConfig::default() };
        assert!(v.set_config(bad).is_err());
        assert_eq!(v.config(), ValidatorConfig::default());
    }
}

// ── Stuck detection & recovery ────────────────────────────────────────────────

#[cfg(test)]
mod stuck {
    use bm_core::{Aabb, AgentId, AgentRng, GameTime, MovementHost, Position, SandboxWorld};
    use crate::{MovementValidator, RecoveryAction, RecoveryOutcome, StuckConfig, StuckStatus};

    fn wall_ahead() -> SandboxWorld {
        let mut w = SandboxWorld::new(Aabb::new(-50.0, -50.0, 50.0, 50.0));
        w.add_wall(Aabb::new(1.0, -5.0, 3.0, 5.0));
        w
    }

    #[test]
    fn blocked_agent_becomes_stuck_then_recovers() {
        let w = wall_ahead();
        let v = MovementValidator::default();
        let id = AgentId(1);
        w.spawn_at(id, Position::at(0.0, 0.0, 0.0));
        w.move_to(id, Position::at(10.0, 0.0, 0.0), 7.0, None);

        let mut statuses = Vec::new();
        for t in 0..4u64 {
            w.step(1_000);
            statuses.push(v.check_stuck(&w.snapshot(id).unwrap(), GameTime(t * 1_000)));
        }
        assert_eq!(
            statuses,
            vec![StuckStatus::Clear, StuckStatus::Suspect(1), StuckStatus::Suspect(2), StuckStatus::Stuck]
        );
        assert!(v.is_stuck(id));
        assert_eq!(v.stats().stuck_detections, 1);

        let mut rng = AgentRng::new(1, id);
        let out = v.attempt_recovery(&w, &w.snapshot(id).unwrap(), &mut rng);
        let RecoveryOutcome::Recovered { attempt, action: RecoveryAction::MoveBackward(dest) } = out else {
            panic!("unexpected outcome {out:?}");
        };
        assert_eq!(attempt, 1);
        assert!(dest.approx_eq(Position::at(-2.0, 0.0, 0.0), 1e-3));
        assert!(!v.is_stuck(id));
        assert!(w.move_target(id).unwrap().approx_eq(dest, 1e-3));

        // Moving away clears the escalation level.
        w.step(1_000);
        assert_eq!(v.check_stuck(&w.snapshot(id).unwrap(), GameTime(4_000)), StuckStatus::Clear);
        assert_eq!(v.stuck_record(id).unwrap().unstuck_attempts, 0);
    }

    #[test]
    fn idle_agent_is_never_stuck() {
        let w = wall_ahead();
        let v = MovementValidator::default();
        let id = AgentId(2);
        w.spawn_at(id, Position::at(-10.0, 0.0, 0.0));
        for t in 0..10u64 {
            assert_eq!(v.check_stuck(&w.snapshot(id).unwrap(), GameTime(t * 1_000)), StuckStatus::Clear);
        }
    }

    #[test]
    fn samples_respect_interval() {
        let w = wall_ahead();
        let v = MovementValidator::default();
        let id = AgentId(3);
        w.spawn_at(id, Position::at(0.0, 0.0, 0.0));
        w.pin(id, true);
        w.move_to(id, Position::at(0.0, 20.0, 0.0), 7.0, None);
        let s = w.snapshot(id).unwrap();
        v.check_stuck(&s, GameTime(0));
        for t in [100u64, 200, 900] {
            assert_eq!(v.check_stuck(&s, GameTime(t)), StuckStatus::Clear);
        }
        assert_eq!(v.check_stuck(&s, GameTime(1_000)), StuckStatus::Suspect(1));
    }

    #[test]
    fn enclosed_agent_exhausts_recovery() {
        let w = super::helpers::pen();
        let v = MovementValidator::default();
        let id = AgentId(4);
        w.spawn_at(id, Position::at(0.0, 0.0, 0.0));
        w.pin(id, true);
        w.move_to(id, Position::at(20.0, 0.0, 0.0), 7.0, None);
        for t in 0..4u64 {
            v.check_stuck(&w.snapshot(id).unwrap(), GameTime(t * 1_000));
        }
        assert!(v.is_stuck(id));

        let mut rng = AgentRng::new(9, id);
        let snap = w.snapshot(id).unwrap();
        assert_eq!(v.attempt_recovery(&w, &snap, &mut rng), RecoveryOutcome::Exhausted { attempts: 10 });
        // Further calls stay terminal.
        assert_eq!(v.attempt_recovery(&w, &snap, &mut rng), RecoveryOutcome::Exhausted { attempts: 10 });
        assert_eq!(v.stats().recoveries_exhausted, 2);
    }

    #[test]
    fn late_attempts_teleport_to_last_valid_position() {
        let w = super::helpers::pen();
        let cfg = StuckConfig { movement_threshold: 30.0, ..StuckConfig::default() };
        let v = MovementValidator::new(Default::default(), cfg);
        let id = AgentId(5);
        let home = Position::at(20.0, 20.0, 0.0);
        w.spawn_at(id, home);
        w.pin(id, true);
        w.move_to(id, Position::at(20.0, 40.0, 0.0), 7.0, None);
        v.check_stuck(&w.snapshot(id).unwrap(), GameTime(0));

        // Displaced into the pen by something outside the movement system.
        w.update_agent(id, |s| s.position = Position::at(0.0, 0.0, 0.0));
        for t in 1..4u64 {
            v.check_stuck(&w.snapshot(id).unwrap(), GameTime(t * 1_000));
        }
        assert!(v.is_stuck(id));

        let mut rng = AgentRng::new(3, id);
        let out = v.attempt_recovery(&w, &w.snapshot(id).unwrap(), &mut rng);
        assert_eq!(out, RecoveryOutcome::Recovered { attempt: 7, action: RecoveryAction::Teleport(home) });
        assert_eq!(w.position(id), Some(home));
        assert!(!v.is_stuck(id));
    }

    #[test]
    fn not_stuck_means_nothing_to_do() {
        let w = wall_ahead();
        let v = MovementValidator::default();
        let id = AgentId(6);
        w.spawn_at(id, Position::at(0.0, 0.0, 0.0));
        let mut rng = AgentRng::new(1, id);
        assert_eq!(v.attempt_recovery(&w, &w.snapshot(id).unwrap(), &mut rng), RecoveryOutcome::NotStuck);
        v.check_stuck(&w.snapshot(id).unwrap(), GameTime(0));
        assert_eq!(v.tracked_agents(), 1);
        v.remove_agent(id);
        assert_eq!(v.tracked_agents(), 0);
    }
}
