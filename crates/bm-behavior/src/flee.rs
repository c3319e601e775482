use tracing::debug;

use bm_core::{AgentId, AgentRng, AgentSnapshot, Position};
use bm_pathing::PathOptions;

use crate::follower::{REPLAN_DISTANCE, Seek};
use crate::{GeneratorContext, GeneratorKind, MovementGenerator, MovementPriority, MovementResult};

/// Run until at least `distance` from a threat.
///
/// One-shot.  A threat that disappears counts as escaped.
#[derive(Clone, Debug)]
pub struct FleeGenerator {
    threat:   AgentId,
    distance: f32,
    priority: MovementPriority,
    seek:     Seek,
}

impl FleeGenerator {
    pub fn new(threat: AgentId, distance: f32, opts: PathOptions) -> Self {
        Self {
            threat,
            distance,
            priority: GeneratorKind::Flee.default_priority(),
            seek: Seek::new(opts),
        }
    }

    pub fn with_priority(self, priority: MovementPriority) -> Self {
        Self { priority, ..self }
    }
}

impl MovementGenerator for FleeGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Flee
    }

    fn priority(&self) -> MovementPriority {
        self.priority
    }

    fn initialize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>) -> Result<(), MovementResult> {
        if self.threat == agent.id || ctx.lookup(self.threat).is_none() {
            debug!(agent = %agent.id, threat = %self.threat, "flee threat unavailable");
            return Err(MovementResult::Failed);
        }
        Ok(())
    }

    fn reset(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>) {
        self.seek.reset();
    }

    fn update(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, _rng: &mut AgentRng) -> MovementResult {
        let Some(threat) = ctx.lookup(self.threat) else {
            self.seek.halt(agent, ctx.host);
            return MovementResult::Success;
        };
        if agent.position.distance(threat.position) >= self.distance {
            self.seek.halt(agent, ctx.host);
            return MovementResult::Success;
        }

        let distance = self.distance;
        let status = self.seek.step(agent, ctx, threat.position, REPLAN_DISTANCE, |opts| {
            match ctx.planner.calculate_flee_path(ctx.host, agent, threat.position, distance, opts, ctx.now) {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(agent = %agent.id, threat = %threat.id, error = %e, "no flee path");
                    None
                }
            }
        });
        match status.into_result() {
            // Reached the flee point with the threat still close: pick another.
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
        Some(self.threat)
    }

    fn destination(&self) -> Option<Position> {
        self.seek.destination()
    }

    fn speed(&self) -> Option<f32> {
        self.seek.speed()
    }
}
