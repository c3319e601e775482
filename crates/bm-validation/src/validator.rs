//! Destination, segment and path validation.
//!
//! All checks are stateless per call: they read the current configuration,
//! the danger-zone list and the host world, and return a
//! [`ValidationResult`].  Per-agent state lives only in the stuck table (see
//! [`stuck`](crate::stuck)).

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use bm_core::sync::{read, write};
use bm_core::{AgentId, AgentSnapshot, BmError, BmResult, Position, TerrainKind, WorldQuery};

use crate::stuck::{StuckConfig, StuckRecord};
use crate::{ValidationError, ValidationResult};

#[cfg(feature = "fx-hash")]
pub(crate) type Map<K, V> = rustc_hash::FxHashMap<K, V>;
#[cfg(not(feature = "fx-hash"))]
pub(crate) type Map<K, V> = std::collections::HashMap<K, V>;

/// Height above a point from which the straight-down sight check starts.
const DOWN_PROBE: f32 = 0.5;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Validation thresholds.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ValidatorConfig {
    /// How far below a point to look for ground.
    pub ground_search:    f32,
    /// Spacing of terrain samples along a segment.
    pub sample_interval:  f32,
    pub max_path_length:  f32,
    /// Fall distance survivable without buffs.
    pub base_safe_fall:   f32,
    /// Height above ground beyond which a point counts as airborne.
    pub flight_clearance: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            ground_search:    20.0,
            sample_interval:  2.0,
            max_path_length:  1_000.0,
            base_safe_fall:   14.5,
            flight_clearance: 3.0,
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> BmResult<()> {
        if !(self.ground_search > 0.0) {
            return Err(BmError::config("ground_search must be positive"));
        }
        if !(self.sample_interval > 0.0) {
            return Err(BmError::config("sample_interval must be positive"));
        }
        if !(self.max_path_length > 0.0) {
            return Err(BmError::config("max_path_length must be positive"));
        }
        if self.base_safe_fall < 0.0 || self.flight_clearance < 0.0 {
            return Err(BmError::config("fall and flight limits must be non-negative"));
        }
        Ok(())
    }
}

// ── Danger zones ──────────────────────────────────────────────────────────────

/// A circular area agents must not path into (e.g. a telegraphed attack).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DangerZone {
    pub center: Position,
    pub radius: f32,
}

impl DangerZone {
    pub fn new(center: Position, radius: f32) -> Self {
        Self { center, radius }
    }

    #[inline]
    pub fn contains(&self, p: Position) -> bool {
        self.center.distance_2d(p) <= self.radius
    }
}

// ── Statistics ────────────────────────────────────────────────────────────────

/// Point-in-time copy of the validator's counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationStats {
    pub destinations_checked: u64,
    pub destinations_failed:  u64,
    pub segments_checked:     u64,
    pub segments_failed:      u64,
    pub paths_checked:        u64,
    pub paths_failed:         u64,
    pub stuck_detections:     u64,
    pub recoveries:           u64,
    pub recoveries_exhausted: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub destinations_checked: AtomicU64,
    pub destinations_failed:  AtomicU64,
    pub segments_checked:     AtomicU64,
    pub segments_failed:      AtomicU64,
    pub paths_checked:        AtomicU64,
    pub paths_failed:         AtomicU64,
    pub stuck_detections:     AtomicU64,
    pub recoveries:           AtomicU64,
    pub recoveries_exhausted: AtomicU64,
}

#[inline]
pub(crate) fn bump(c: &AtomicU64) {
    c.fetch_add(1, Ordering::Relaxed);
}

// ── MovementValidator ─────────────────────────────────────────────────────────

/// Terrain/path validation plus per-agent stuck tracking.
///
/// # Locking
///
/// Configuration and the danger-zone list are read far more often than
/// written and sit behind `RwLock`s; every public method copies what it
/// needs out of them before touching the world.  The stuck table has its own
/// `RwLock` and is never held while another lock is taken.
pub struct MovementValidator {
    pub(crate) config:       RwLock<ValidatorConfig>,
    pub(crate) stuck_config: RwLock<StuckConfig>,
    danger_zones:            RwLock<Vec<DangerZone>>,
    pub(crate) stuck:        RwLock<Map<AgentId, StuckRecord>>,
    pub(crate) counters:     Counters,
}

impl Default for MovementValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default(), StuckConfig::default())
    }
}

impl MovementValidator {
    pub fn new(config: ValidatorConfig, stuck_config: StuckConfig) -> Self {
        Self {
            config:       RwLock::new(config),
            stuck_config: RwLock::new(stuck_config),
            danger_zones: RwLock::new(Vec::new()),
            stuck:        RwLock::new(Map::default()),
            counters:     Counters::default(),
        }
    }

    // ── Configuration ─────────────────────────────────────────────────────

    pub fn config(&self) -> ValidatorConfig {
        *read(&self.config)
    }

    /// Replace the validation thresholds.
    ///
    /// # Errors
    ///
    /// [`BmError::Config`] if the new values are out of range; the old
    /// configuration stays in effect.
    pub fn set_config(&self, config: ValidatorConfig) -> BmResult<()> {
        config.validate()?;
        *write(&self.config) = config;
        Ok(())
    }

    pub fn stuck_config(&self) -> StuckConfig {
        *read(&self.stuck_config)
    }

    pub fn set_stuck_config(&self, config: StuckConfig) -> BmResult<()> {
        config.validate()?;
        *write(&self.stuck_config) = config;
        Ok(())
    }

    // ── Danger zones ──────────────────────────────────────────────────────

    pub fn add_danger_zone(&self, zone: DangerZone) {
        write(&self.danger_zones).push(zone);
    }

    pub fn clear_danger_zones(&self) {
        write(&self.danger_zones).clear();
    }

    pub fn danger_zone_count(&self) -> usize {
        read(&self.danger_zones).len()
    }

    pub fn in_danger_zone(&self, p: Position) -> bool {
        read(&self.danger_zones).iter().any(|z| z.contains(p))
    }

    // ── Statistics ────────────────────────────────────────────────────────

    pub fn stats(&self) -> ValidationStats {
        let c = &self.counters;
        let get = |a: &AtomicU64| a.load(Ordering::Relaxed);
        ValidationStats {
            destinations_checked: get(&c.destinations_checked),
            destinations_failed:  get(&c.destinations_failed),
            segments_checked:     get(&c.segments_checked),
            segments_failed:      get(&c.segments_failed),
            paths_checked:        get(&c.paths_checked),
            paths_failed:         get(&c.paths_failed),
            stuck_detections:     get(&c.stuck_detections),
            recoveries:           get(&c.recoveries),
            recoveries_exhausted: get(&c.recoveries_exhausted),
        }
    }

    // ── Point checks ──────────────────────────────────────────────────────

    /// Checks shared by destinations and segment samples: finite, not void,
    /// ground present (unless the agent flies), no hazard, no danger zone.
    /// Returns the ground height, if any.
    fn check_point<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        agent: &AgentSnapshot,
        p:     Position,
        cfg:   &ValidatorConfig,
    ) -> ValidationResult<Option<f32>> {
        if !p.is_finite() {
            return Err(ValidationError::NonFinite);
        }
        let terrain = world.terrain_at(p);
        if terrain == TerrainKind::Void {
            return Err(ValidationError::Void);
        }
        let ground = world.ground_height(p.x, p.y, p.z, cfg.ground_search);
        if ground.is_none() && !agent.can_fly {
            return Err(ValidationError::Void);
        }
        if terrain.is_hazardous() {
            return Err(ValidationError::Hazardous(terrain));
        }
        if terrain.requires_swimming() && !agent.can_swim {
            return Err(ValidationError::RequiresSwimming);
        }
        if self.in_danger_zone(p) {
            return Err(ValidationError::DangerZone);
        }
        Ok(ground)
    }

    /// Is `dest` somewhere `agent`, currently at `from`, may go?
    ///
    /// Rejects void (no ground within the search distance, or no clear line
    /// straight down to it), hazardous terrain and danger zones, points that
    /// would need flight the agent lacks, and drops longer than the agent's
    /// safe-fall distance.
    pub fn validate_destination<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        agent: &AgentSnapshot,
        from:  Position,
        dest:  Position,
    ) -> ValidationResult<()> {
        bump(&self.counters.destinations_checked);
        let cfg = self.config();
        let result = self.destination_inner(world, agent, from, dest, &cfg);
        if let Err(e) = &result {
            bump(&self.counters.destinations_failed);
            trace!(agent = %agent.id, %dest, reason = %e, "destination rejected");
        }
        result
    }

    fn destination_inner<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        agent: &AgentSnapshot,
        from:  Position,
        dest:  Position,
        cfg:   &ValidatorConfig,
    ) -> ValidationResult<()> {
        let Some(ground) = self.check_point(world, agent, dest, cfg)? else {
            // Airborne destination for a flyer.
            return Ok(());
        };

        let above = dest.z.max(ground) + DOWN_PROBE;
        if !world.line_of_sight(dest.with_z(above), dest.with_z(ground)) {
            return Err(ValidationError::Void);
        }

        let height = dest.z - ground;
        if height > cfg.flight_clearance && !agent.can_fly {
            return Err(ValidationError::RequiresFlight { height });
        }

        let fall = from.z - ground;
        let limit = cfg.base_safe_fall + agent.safe_fall_bonus;
        if fall > limit && !agent.can_fly {
            return Err(ValidationError::UnsafeFall { fall, limit });
        }
        Ok(())
    }

    /// Collision check between the endpoints plus terrain samples every
    /// `sample_interval` units (the start point itself is not sampled).
    pub fn validate_segment<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        agent: &AgentSnapshot,
        a:     Position,
        b:     Position,
    ) -> ValidationResult<()> {
        bump(&self.counters.segments_checked);
        let cfg = self.config();
        let result = self.segment_inner(world, agent, a, b, &cfg);
        if result.is_err() {
            bump(&self.counters.segments_failed);
        }
        result
    }

    fn segment_inner<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        agent: &AgentSnapshot,
        a:     Position,
        b:     Position,
        cfg:   &ValidatorConfig,
    ) -> ValidationResult<()> {
        if !a.is_finite() || !b.is_finite() {
            return Err(ValidationError::NonFinite);
        }
        if world.is_blocked(a, b) {
            return Err(ValidationError::Blocked);
        }
        let len = a.distance(b);
        let samples = (len / cfg.sample_interval).ceil().max(1.0) as usize;
        for i in 1..=samples {
            let p = a.lerp(b, i as f32 / samples as f32);
            self.check_point(world, agent, p, cfg)?;
        }
        Ok(())
    }

    /// Validate every segment of a point list and its total length.
    pub fn validate_path<W: WorldQuery + ?Sized>(
        &self,
        world:  &W,
        agent:  &AgentSnapshot,
        points: &[Position],
    ) -> ValidationResult<()> {
        bump(&self.counters.paths_checked);
        let cfg = self.config();
        let result = (|| {
            if points.is_empty() {
                return Err(ValidationError::EmptyPath);
            }
            let length: f32 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
            if length > cfg.max_path_length {
                return Err(ValidationError::PathTooLong { length, max: cfg.max_path_length });
            }
            for w in points.windows(2) {
                self.segment_inner(world, agent, w[0], w[1], &cfg)?;
            }
            Ok(())
        })();
        if result.is_err() {
            bump(&self.counters.paths_failed);
        }
        result
    }

    /// Ground height under `p` within the configured search distance.
    pub fn ground_under<W: WorldQuery + ?Sized>(&self, world: &W, p: Position) -> Option<f32> {
        let search = read(&self.config).ground_search;
        world.ground_height(p.x, p.y, p.z, search)
    }
}
