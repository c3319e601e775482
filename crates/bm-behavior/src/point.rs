//! Fixed-point moves.

use tracing::debug;

use bm_core::{AgentRng, AgentSnapshot, GameTime, Position};
use bm_pathing::PathOptions;

use crate::follower::{REACH_EPSILON, REPLAN_DISTANCE, Seek};
use crate::{GeneratorContext, GeneratorKind, MovementGenerator, MovementPriority, MovementResult};

/// Move to a fixed point, then finish.
///
/// A forced point move refuses every interruption; commands that outrank
/// it wait as pending until it ends.
#[derive(Clone, Debug)]
pub struct PointGenerator {
    dest:     Position,
    priority: MovementPriority,
    forced:   bool,
    seek:     Seek,
    started:  GameTime,
}

impl PointGenerator {
    pub fn new(dest: Position, opts: PathOptions) -> Self {
        Self {
            dest,
            priority: GeneratorKind::Point.default_priority(),
            forced: false,
            seek: Seek::new(opts),
            started: GameTime::ZERO,
        }
    }

    pub fn with_priority(self, priority: MovementPriority) -> Self {
        Self { priority, ..self }
    }

    pub fn forced(self) -> Self {
        Self { forced: true, ..self }
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }
}

impl MovementGenerator for PointGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Point
    }

    fn priority(&self) -> MovementPriority {
        self.priority
    }

    fn initialize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>) -> Result<(), MovementResult> {
        if let Err(e) = ctx.validator().validate_destination(ctx.host, agent, agent.position, self.dest) {
            debug!(agent = %agent.id, dest = %self.dest, reason = %e, "point destination rejected");
            return Err(MovementResult::InvalidDestination);
        }
        self.started = ctx.now;
        Ok(())
    }

    fn reset(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>) {
        self.seek.reset();
    }

    fn update(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, _rng: &mut AgentRng) -> MovementResult {
        if agent.position.distance_2d(self.dest) <= REACH_EPSILON {
            return MovementResult::Success;
        }
        let dest = self.dest;
        self.seek
            .step(agent, ctx, dest, REPLAN_DISTANCE, |opts| {
                Some(ctx.planner.calculate_path(ctx.host, agent, dest, opts, ctx.now))
            })
            .into_result()
    }

    fn finalize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, interrupted: bool) {
        debug!(
            agent = %agent.id,
            dest = %self.dest,
            interrupted,
            elapsed_ms = ctx.now.since(self.started),
            "point move finalized",
        );
        self.seek.halt(agent, ctx.host);
    }

    fn can_be_interrupted(&self, new_kind: GeneratorKind, new_priority: MovementPriority) -> bool {
        !self.forced && crate::preempts(new_kind, new_priority, self.kind(), self.priority)
    }

    fn destination(&self) -> Option<Position> {
        Some(self.dest)
    }

    fn speed(&self) -> Option<f32> {
        self.seek.speed()
    }
}
