use tracing::debug;

use bm_core::{AgentId, AgentRng, AgentSnapshot, Position};
use bm_pathing::PathOptions;

use crate::follower::{REACH_EPSILON, REPLAN_DISTANCE, Seek, hold_facing};
use crate::{GeneratorContext, GeneratorKind, MovementGenerator, MovementPriority, MovementResult};

/// Close to within attack range of a target and keep it there.
///
/// The effective range is both agents' combat reach plus the requested
/// range; the path aims half a unit inside it.
#[derive(Clone, Debug)]
pub struct ChaseGenerator {
    target:   AgentId,
    range:    f32,
    angle:    Option<f32>,
    priority: MovementPriority,
    seek:     Seek,
}

impl ChaseGenerator {
    pub fn new(target: AgentId, range: Option<f32>, angle: Option<f32>, opts: PathOptions) -> Self {
        Self {
            target,
            range: range.unwrap_or(0.0),
            angle,
            priority: GeneratorKind::Chase.default_priority(),
            seek: Seek::new(opts),
        }
    }

    pub fn with_priority(self, priority: MovementPriority) -> Self {
        Self { priority, ..self }
    }

    pub fn effective_range(&self, agent: &AgentSnapshot, target: &AgentSnapshot) -> f32 {
        agent.combat_reach + target.combat_reach + self.range
    }
}

impl MovementGenerator for ChaseGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Chase
    }

    fn priority(&self) -> MovementPriority {
        self.priority
    }

    fn initialize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>) -> Result<(), MovementResult> {
        if self.target == agent.id || ctx.lookup(self.target).is_none() {
            debug!(agent = %agent.id, target = %self.target, "chase target unavailable");
            return Err(MovementResult::Failed);
        }
        Ok(())
    }

    fn reset(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>) {
        self.seek.reset();
    }

    fn update(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, _rng: &mut AgentRng) -> MovementResult {
        let Some(target) = ctx.lookup(self.target) else {
            self.seek.halt(agent, ctx.host);
            return MovementResult::Failed;
        };
        let effective = self.effective_range(agent, &target);
        if agent.position.distance(target.position) <= effective {
            self.seek.invalidate();
            hold_facing(agent, ctx.host, target.position);
            return MovementResult::Success;
        }

        let (id, range, angle) = (self.target, (effective - REACH_EPSILON).max(0.0), self.angle);
        let status = self.seek.step(agent, ctx, target.position, REPLAN_DISTANCE, |opts| {
            ctx.planner
                .calculate_path_to_unit(ctx.host, agent, id, range, angle, opts, ctx.now)
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

    fn on_target_moved(&mut self, _agent: &AgentSnapshot, new_position: Position) {
        if self.seek.anchor().is_some_and(|a| a.distance_2d(new_position) > REPLAN_DISTANCE) {
            self.seek.invalidate();
        }
    }

    fn target(&self) -> Option<AgentId> {
        Some(self.target)
    }

    fn destination(&self) -> Option<Position> {
        self.seek.destination()
    }

    fn speed(&self) -> Option<f32> {
        self.seek.speed()
    }
}
