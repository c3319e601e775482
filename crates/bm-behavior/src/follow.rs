use tracing::debug;

use bm_core::{AgentId, AgentRng, AgentSnapshot, Position};
use bm_pathing::PathOptions;

use crate::follower::{REPLAN_DISTANCE, Seek, hold_facing};
use crate::{GeneratorContext, GeneratorKind, MovementGenerator, MovementPriority, MovementResult};

/// Extra distance inside the band the follow point aims for, so small target
/// drift does not immediately push the agent back out.
const BAND_MARGIN: f32 = 0.25;

/// Keep within `[min_distance, max_distance]` of a moving target.
///
/// Persistent: `Success` means "in band, holding" and the generator stays
/// installed.  A vanished target fails the generator.
#[derive(Clone, Debug)]
pub struct FollowGenerator {
    target:       AgentId,
    min_distance: f32,
    max_distance: f32,
    /// Bearing relative to the target's facing; `None` follows from the side
    /// the agent is already on.
    angle:        Option<f32>,
    priority:     MovementPriority,
    seek:         Seek,
}

impl FollowGenerator {
    pub fn new(target: AgentId, min_distance: f32, max_distance: f32, angle: Option<f32>, opts: PathOptions) -> Self {
        Self {
            target,
            min_distance,
            max_distance,
            angle,
            priority: GeneratorKind::Follow.default_priority(),
            seek: Seek::new(opts),
        }
    }

    pub fn with_priority(self, priority: MovementPriority) -> Self {
        Self { priority, ..self }
    }

    /// Distance from the target the follow point is placed at.
    pub fn follow_distance(&self) -> f32 {
        self.min_distance + BAND_MARGIN.min((self.max_distance - self.min_distance) / 2.0)
    }

    pub fn in_band(&self, distance: f32) -> bool {
        distance >= self.min_distance && distance <= self.max_distance
    }
}

impl MovementGenerator for FollowGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Follow
    }

    fn priority(&self) -> MovementPriority {
        self.priority
    }

    fn initialize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>) -> Result<(), MovementResult> {
        if self.target == agent.id || ctx.lookup(self.target).is_none() {
            debug!(agent = %agent.id, target = %self.target, "follow target unavailable");
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
        if self.in_band(agent.position.distance(target.position)) {
            self.seek.invalidate();
            hold_facing(agent, ctx.host, target.position);
            return MovementResult::Success;
        }

        let (id, range, angle) = (self.target, self.follow_distance(), self.angle);
        let status = self.seek.step(agent, ctx, target.position, REPLAN_DISTANCE, |opts| {
            ctx.planner
                .calculate_path_to_unit(ctx.host, agent, id, range, angle, opts, ctx.now)
                .ok()
        });
        match status.into_result() {
            // End of a path but the target moved out of band meanwhile.
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
