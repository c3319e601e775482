//! Leader-relative formation slots.

use tracing::{debug, trace};

use bm_core::{AgentId, AgentRng, AgentSnapshot, FormationPosition, Position};
use bm_pathing::PathOptions;

use crate::follower::{REPLAN_DISTANCE, Seek, hold_facing};
use crate::{GeneratorContext, GeneratorKind, MovementGenerator, MovementPriority, MovementResult};

/// Distance from the slot point that counts as "in formation".
pub const FORMATION_EPSILON: f32 = 1.0;

/// Hold a slot relative to a leader's live position and facing.
///
/// Persistent and never really done: every update recomputes the slot point
/// and either holds or moves toward it.
#[derive(Clone, Debug)]
pub struct FormationGenerator {
    leader:   AgentId,
    slot:     FormationPosition,
    priority: MovementPriority,
    seek:     Seek,
}

impl FormationGenerator {
    pub fn new(leader: AgentId, slot: FormationPosition, opts: PathOptions) -> Self {
        Self {
            leader,
            slot,
            priority: GeneratorKind::Formation.default_priority(),
            seek: Seek::new(opts),
        }
    }

    pub fn with_priority(self, priority: MovementPriority) -> Self {
        Self { priority, ..self }
    }

    pub fn slot(&self) -> &FormationPosition {
        &self.slot
    }
}

impl MovementGenerator for FormationGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Formation
    }

    fn priority(&self) -> MovementPriority {
        self.priority
    }

    fn initialize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>) -> Result<(), MovementResult> {
        if self.leader == agent.id || ctx.lookup(self.leader).is_none() {
            debug!(agent = %agent.id, leader = %self.leader, "formation leader unavailable");
            return Err(MovementResult::Failed);
        }
        Ok(())
    }

    fn reset(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>) {
        self.seek.reset();
    }

    fn update(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, _rng: &mut AgentRng) -> MovementResult {
        let Some(leader) = ctx.lookup(self.leader) else {
            self.seek.halt(agent, ctx.host);
            return MovementResult::Failed;
        };
        let point = ctx.grounded(self.slot.world_point(leader.position));
        if agent.position.distance_2d(point) <= FORMATION_EPSILON {
            self.seek.invalidate();
            // Face where the leader faces.
            hold_facing(agent, ctx.host, agent.position.offset(1.0, leader.position.o));
            return MovementResult::Success;
        }

        let (id, slot) = (self.leader, self.slot);
        let status = self.seek.step(agent, ctx, point, REPLAN_DISTANCE, |opts| {
            ctx.planner
                .calculate_formation_path(ctx.host, agent, id, &slot, opts, ctx.now)
                .ok()
        });
        match status.into_result() {
            MovementResult::Success => {
                self.seek.invalidate();
                MovementResult::InProgress
            }
            other => other,
        }
    }

    fn finalize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, _interrupted: bool) {
        self.seek.halt(agent, ctx.host);
    }

    fn target(&self) -> Option<AgentId> {
        Some(self.leader)
    }

    fn destination(&self) -> Option<Position> {
        self.seek.destination()
    }

    fn speed(&self) -> Option<f32> {
        self.seek.speed()
    }

    fn set_formation_slot(&mut self, slot: FormationPosition) -> bool {
        trace!(leader = %self.leader, slot = slot.slot, "formation slot replaced");
        self.slot = slot;
        self.seek.invalidate();
        true
    }
}
