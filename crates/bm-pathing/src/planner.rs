//! The object-safe planning seam used by movement generators.

use std::f32::consts::PI;

use bm_core::{AgentId, AgentRng, AgentSnapshot, FormationPosition, GameTime, MovementHost, Position};
use bm_validation::MovementValidator;

use crate::metrics::PathMetrics;
use crate::optimizer::PathPreset;
use crate::path::{MovementPath, PathType};
use crate::{PathingError, PathingResult};

/// Flee candidates are probed at this angular step on alternating sides of
/// the ideal bearing.
const FLEE_FAN_STEP_DEG: f32 = 30.0;
/// Ideal bearing plus four steps either side (±120°).
const FLEE_FAN_PROBES: u32 = 9;
/// Flee points are placed this much beyond the requested distance.
const FLEE_MARGIN: f32 = 2.0;
/// Height above a derived point from which ground is searched.
const GROUND_PROBE_UP: f32 = 2.0;

/// Per-call knobs for [`PathPlanner::calculate_path`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathOptions {
    /// Skip the search and return a single-node straight line.
    pub force_direct: bool,
    pub optimize:     bool,
    pub use_cache:    bool,
    pub preset:       PathPreset,
    /// Node speed; `None` uses the agent's run speed.
    pub speed:        Option<f32>,
    /// Search-node budget; `None` uses the planner's configured default.
    pub max_nodes:    Option<usize>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            force_direct: false,
            optimize:     true,
            use_cache:    true,
            preset:       PathPreset::Standard,
            speed:        None,
            max_nodes:    None,
        }
    }
}

impl PathOptions {
    pub fn direct() -> Self {
        Self { force_direct: true, ..Self::default() }
    }

    pub fn with_preset(self, preset: PathPreset) -> Self {
        Self { preset, ..self }
    }

    pub fn with_speed(self, speed: Option<f32>) -> Self {
        Self { speed, ..self }
    }

    pub fn with_max_nodes(self, max_nodes: usize) -> Self {
        Self { max_nodes: Some(max_nodes), ..self }
    }

    pub fn uncached(self) -> Self {
        Self { use_cache: false, ..self }
    }

    pub fn unoptimized(self) -> Self {
        Self { optimize: false, ..self }
    }
}

/// Path computation as seen by generators.
///
/// Implemented by [`PathfindingAdapter`](crate::PathfindingAdapter); the
/// trait exists so generators can hold a `&dyn PathPlanner` without becoming
/// generic over the search engine.  The three `calculate_*` wrappers derive a
/// destination and delegate to [`calculate_path`](Self::calculate_path).
pub trait PathPlanner: Send + Sync {
    /// Path from `agent`'s current position to `dest`.  Never fails: a
    /// failure is a path of type [`PathType::NoPath`].
    fn calculate_path(
        &self,
        host:  &dyn MovementHost,
        agent: &AgentSnapshot,
        dest:  Position,
        opts:  &PathOptions,
        now:   GameTime,
    ) -> MovementPath;

    fn validator(&self) -> &MovementValidator;

    /// A reachable random point within `radius` of `centre`.
    fn random_point(
        &self,
        host:   &dyn MovementHost,
        centre: Position,
        radius: f32,
        rng:    &mut AgentRng,
    ) -> Option<Position>;

    /// Drop everything cached for `agent`.
    fn forget_agent(&self, agent: AgentId);

    /// Periodic housekeeping (cache sweep).
    fn maintain(&self, now: GameTime);

    fn metrics(&self) -> PathMetrics;

    // ── Derived destinations ──────────────────────────────────────────────

    /// Path to a point `range` away from `target`.
    ///
    /// With `angle`, the point lies at that bearing relative to the target's
    /// facing; otherwise on the line from the target toward the agent.
    fn calculate_path_to_unit(
        &self,
        host:   &dyn MovementHost,
        agent:  &AgentSnapshot,
        target: AgentId,
        range:  f32,
        angle:  Option<f32>,
        opts:   &PathOptions,
        now:    GameTime,
    ) -> PathingResult<MovementPath> {
        let t = host.snapshot(target).ok_or(PathingError::AgentNotFound(target))?;
        let bearing = match angle {
            Some(a) => t.position.o + a,
            None => t.position.angle_to(agent.position),
        };
        let dest = ground_point(host, self.validator(), t.position.offset(range, bearing));
        Ok(self.calculate_path(host, agent, dest, opts, now))
    }

    /// Path to `slot`'s current world position behind `leader`.
    fn calculate_formation_path(
        &self,
        host:   &dyn MovementHost,
        agent:  &AgentSnapshot,
        leader: AgentId,
        slot:   &FormationPosition,
        opts:   &PathOptions,
        now:    GameTime,
    ) -> PathingResult<MovementPath> {
        let l = host.snapshot(leader).ok_or(PathingError::AgentNotFound(leader))?;
        let dest = ground_point(host, self.validator(), slot.world_point(l.position));
        Ok(self.calculate_path(host, agent, dest, opts, now))
    }

    /// Path to a point at least `distance` from `threat`, away from it.
    ///
    /// Probes the ideal bearing first, then alternates sides of it in fixed
    /// steps, returning the first candidate that validates and yields a
    /// complete path.
    fn calculate_flee_path(
        &self,
        host:     &dyn MovementHost,
        agent:    &AgentSnapshot,
        threat:   Position,
        distance: f32,
        opts:     &PathOptions,
        now:      GameTime,
    ) -> PathingResult<MovementPath> {
        let away = if threat.distance_2d(agent.position) <= f32::EPSILON {
            agent.position.o + PI
        } else {
            threat.angle_to(agent.position)
        };
        for offset in flee_fan() {
            let candidate = ground_point(host, self.validator(), threat.offset(distance + FLEE_MARGIN, away + offset));
            if self.validator().validate_destination(host, agent, agent.position, candidate).is_err() {
                continue;
            }
            let path = self.calculate_path(host, agent, candidate, opts, now);
            if path.is_valid() && path.path_type != PathType::Incomplete {
                return Ok(path);
            }
        }
        Err(PathingError::NoFleeDirection)
    }
}

/// Offsets (radians) from the ideal flee bearing: 0, +s, -s, +2s, -2s, ...
pub fn flee_fan() -> impl Iterator<Item = f32> {
    let step = FLEE_FAN_STEP_DEG.to_radians();
    (0..FLEE_FAN_PROBES).map(move |i| {
        let k = i.div_ceil(2) as f32;
        if i % 2 == 1 { k * step } else { -k * step }
    })
}

/// `p` dropped onto the ground below it, or unchanged if there is none.
pub fn ground_point<H: MovementHost + ?Sized>(host: &H, validator: &MovementValidator, p: Position) -> Position {
    validator
        .ground_under(host, p.with_z(p.z + GROUND_PROBE_UP))
        .map_or(p, |z| p.with_z(z))
}
