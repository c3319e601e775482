//! The narrow interface to the host world.
//!
//! The movement subsystem never owns agents, terrain, or physics.  Everything
//! it needs from the host goes through two traits:
//!
//! - [`WorldQuery`]: stateless spatial questions (ground height, line of
//!   sight, terrain classification, collision between two points).
//! - [`MovementHost`]: entity lookup by id plus the motion primitives that
//!   actually displace an agent.
//!
//! All methods take `&self`; hosts that mutate on `move_to`/`stop` use
//! interior mutability.  Both traits are `Send + Sync` so the manager can
//! update a bounded batch of agents in parallel.

use crate::{AgentId, Position};

// ── Terrain ───────────────────────────────────────────────────────────────────

/// Liquid/terrain classification at a point.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerrainKind {
    /// Walkable solid ground (default).
    #[default]
    Ground,
    /// Shallow water, walkable.
    Water,
    /// Water deep enough to require swimming.
    DeepWater,
    Lava,
    Slime,
    /// Outside the world or above a bottomless drop.
    Void,
}

impl TerrainKind {
    /// Terrain that damages anything standing in it.
    #[inline]
    pub fn is_hazardous(self) -> bool {
        matches!(self, TerrainKind::Lava | TerrainKind::Slime)
    }

    #[inline]
    pub fn requires_swimming(self) -> bool {
        matches!(self, TerrainKind::DeepWater)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TerrainKind::Ground    => "ground",
            TerrainKind::Water     => "water",
            TerrainKind::DeepWater => "deep_water",
            TerrainKind::Lava      => "lava",
            TerrainKind::Slime     => "slime",
            TerrainKind::Void      => "void",
        }
    }
}

impl std::fmt::Display for TerrainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Kinematics ────────────────────────────────────────────────────────────────

/// Movement mode used to pick a speed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MoveMode {
    Walk,
    #[default]
    Run,
    Swim,
    Fly,
}

/// Per-mode speeds in world units per second.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveSpeeds {
    pub walk:   f32,
    pub run:    f32,
    pub swim:   f32,
    pub flight: f32,
}

impl Default for MoveSpeeds {
    fn default() -> Self {
        Self { walk: 2.5, run: 7.0, swim: 4.7, flight: 7.0 }
    }
}

impl MoveSpeeds {
    #[inline]
    pub fn get(&self, mode: MoveMode) -> f32 {
        match mode {
            MoveMode::Walk => self.walk,
            MoveMode::Run  => self.run,
            MoveMode::Swim => self.swim,
            MoveMode::Fly  => self.flight,
        }
    }
}

/// Everything the movement subsystem reads about one live entity in a tick.
///
/// Snapshots are cheap copies taken at the start of an update; nothing holds
/// on to them across ticks.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct AgentSnapshot {
    pub id:              AgentId,
    pub position:        Position,
    pub speeds:          MoveSpeeds,
    /// The host reports the entity as currently in motion.
    pub is_moving:       bool,
    pub can_fly:         bool,
    pub can_swim:        bool,
    pub in_combat:       bool,
    /// Melee reach used to derive chase range.
    pub combat_reach:    f32,
    /// Extra safe-fall distance granted by buffs.
    pub safe_fall_bonus: f32,
}

impl AgentSnapshot {
    /// A grounded, non-flying, out-of-combat entity at `position`.
    pub fn new(id: AgentId, position: Position) -> Self {
        Self {
            id,
            position,
            speeds:          MoveSpeeds::default(),
            is_moving:       false,
            can_fly:         false,
            can_swim:        true,
            in_combat:       false,
            combat_reach:    1.5,
            safe_fall_bonus: 0.0,
        }
    }

    /// Speed for `mode`.
    #[inline]
    pub fn speed(&self, mode: MoveMode) -> f32 {
        self.speeds.get(mode)
    }
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// Spatial queries against the host world.
pub trait WorldQuery: Send + Sync {
    /// Height of the ground under `(x, y)`, searching at most `max_search`
    /// units below (and slightly above) `z`.  `None` means no ground: void.
    fn ground_height(&self, x: f32, y: f32, z: f32, max_search: f32) -> Option<f32>;

    /// `true` if nothing blocks sight between the two points.
    fn line_of_sight(&self, from: Position, to: Position) -> bool;

    /// Liquid/terrain classification at `pos`.
    fn terrain_at(&self, pos: Position) -> TerrainKind;

    /// `true` if an agent moving in a straight line from `from` to `to` would
    /// collide with world geometry.
    fn is_blocked(&self, from: Position, to: Position) -> bool;
}

/// Entity lookup plus the motion primitives the generators drive.
pub trait MovementHost: WorldQuery {
    /// Resolve a live entity by id.  `None` once the entity is gone.
    fn snapshot(&self, agent: AgentId) -> Option<AgentSnapshot>;

    /// Start (or retarget) motion toward `dest` at `speed` units/s, ending
    /// with `facing` if given.  Idempotent for an unchanged destination.
    fn move_to(&self, agent: AgentId, dest: Position, speed: f32, facing: Option<f32>);

    /// Hard stop of any in-flight motion.
    fn stop(&self, agent: AgentId);

    /// Turn in place.
    fn face(&self, agent: AgentId, orientation: f32);

    /// Instant relocation; used only as a last-resort unstuck step.
    fn teleport(&self, agent: AgentId, dest: Position);
}
