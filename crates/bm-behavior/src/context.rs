//! Everything a generator may touch during one update.

use bm_core::{AgentId, AgentSnapshot, GameTime, MovementHost, Position};
use bm_pathing::{PathPlanner, ground_point};
use bm_validation::{MovementValidator, StuckStatus};

/// Borrowed collaborators for one generator call.
///
/// Built by the movement manager per agent update; the agent's snapshot and
/// RNG are passed alongside rather than stored here, so one context can be
/// shared by every call in a batch.
#[derive(Copy, Clone)]
pub struct GeneratorContext<'a> {
    pub host:    &'a dyn MovementHost,
    pub planner: &'a dyn PathPlanner,
    /// Current game time.
    pub now:     GameTime,
    /// Game time elapsed since this agent's previous update.
    pub dt_ms:   u32,
}

impl<'a> GeneratorContext<'a> {
    #[inline]
    pub fn new(host: &'a dyn MovementHost, planner: &'a dyn PathPlanner, now: GameTime, dt_ms: u32) -> Self {
        Self { host, planner, now, dt_ms }
    }

    #[inline]
    pub fn validator(&self) -> &'a MovementValidator {
        self.planner.validator()
    }

    /// Live snapshot of another agent (a follow/chase/flee target).
    #[inline]
    pub fn lookup(&self, agent: AgentId) -> Option<AgentSnapshot> {
        self.host.snapshot(agent)
    }

    /// Sample stuck detection for `agent`; `true` once it is flagged.
    pub fn is_stuck(&self, agent: &AgentSnapshot) -> bool {
        self.validator().check_stuck(agent, self.now) == StuckStatus::Stuck
    }

    /// `p` dropped onto the ground below it.
    pub fn grounded(&self, p: Position) -> Position {
        ground_point(self.host, self.validator(), p)
    }
}
