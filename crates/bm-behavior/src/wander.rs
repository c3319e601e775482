//! Random roaming around a centre.

use tracing::{debug, trace};

use bm_core::{AgentRng, AgentSnapshot, GameTime, Position};
use bm_pathing::PathOptions;

use crate::follower::{REACH_EPSILON, REPLAN_DISTANCE, Seek};
use crate::{GeneratorContext, GeneratorKind, MovementGenerator, MovementPriority, MovementResult};

/// Random points tried per pick before giving up for this update.
const PICK_ATTEMPTS: u32 = 5;
/// Consecutive legs that failed to plan before the generator gives up.
const MAX_FAILED_LEGS: u32 = 3;

/// Roam between random points within `radius` of a fixed centre.
///
/// With a duration the generator succeeds once it elapses; without one it
/// wanders until replaced.  Random picks draw from the agent's own RNG
/// stream, so a seeded run repeats exactly.
#[derive(Clone, Debug)]
pub struct WanderGenerator {
    centre:      Option<Position>,
    radius:      f32,
    duration_ms: Option<u64>,
    priority:    MovementPriority,
    seek:        Seek,
    origin:      Position,
    goal:        Option<Position>,
    started:     GameTime,
    failed_legs: u32,
}

impl WanderGenerator {
    /// `centre` of `None` wanders around wherever the agent stands when the
    /// generator is initialized.
    pub fn new(centre: Option<Position>, radius: f32, duration_ms: Option<u64>, opts: PathOptions) -> Self {
        Self {
            centre,
            radius,
            duration_ms,
            priority: GeneratorKind::Wander.default_priority(),
            seek: Seek::new(opts),
            origin: Position::default(),
            goal: None,
            started: GameTime::ZERO,
            failed_legs: 0,
        }
    }

    pub fn with_priority(self, priority: MovementPriority) -> Self {
        Self { priority, ..self }
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    fn pick_goal(&self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, rng: &mut AgentRng) -> Option<Position> {
        (0..PICK_ATTEMPTS).find_map(|_| {
            let p = ctx.planner.random_point(ctx.host, self.origin, self.radius, rng)?;
            let ok = p.distance_2d(agent.position) > REACH_EPSILON
                && ctx.validator().validate_destination(ctx.host, agent, agent.position, p).is_ok();
            ok.then_some(p)
        })
    }

    fn leg_failed(&mut self, result: MovementResult) -> MovementResult {
        self.goal = None;
        self.seek.reset();
        self.failed_legs += 1;
        if self.failed_legs >= MAX_FAILED_LEGS { result } else { MovementResult::InProgress }
    }
}

impl MovementGenerator for WanderGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Wander
    }

    fn priority(&self) -> MovementPriority {
        self.priority
    }

    fn initialize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>) -> Result<(), MovementResult> {
        self.origin = self.centre.unwrap_or(agent.position);
        self.started = ctx.now;
        self.goal = None;
        self.failed_legs = 0;
        Ok(())
    }

    fn reset(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>) {
        self.goal = None;
        self.seek.reset();
    }

    fn update(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, rng: &mut AgentRng) -> MovementResult {
        if self.duration_ms.is_some_and(|d| ctx.now.since(self.started) >= d) {
            debug!(agent = %agent.id, "wander duration elapsed");
            self.seek.halt(agent, ctx.host);
            return MovementResult::Success;
        }

        let goal = match self.goal {
            Some(g) if agent.position.distance_2d(g) > REACH_EPSILON => g,
            _ => match self.pick_goal(agent, ctx, rng) {
                Some(g) => {
                    trace!(agent = %agent.id, goal = %g, "wander leg");
                    self.seek.reset();
                    self.goal = Some(g);
                    g
                }
                None => return self.leg_failed(MovementResult::NoPath),
            },
        };

        let status = self.seek.step(agent, ctx, goal, REPLAN_DISTANCE, |opts| {
            Some(ctx.planner.calculate_path(ctx.host, agent, goal, opts, ctx.now))
        });
        match status.into_result() {
            MovementResult::Success => {
                self.goal = None;
                self.failed_legs = 0;
                MovementResult::InProgress
            }
            MovementResult::InProgress => {
                self.failed_legs = 0;
                MovementResult::InProgress
            }
            MovementResult::Stuck => MovementResult::Stuck,
            other => self.leg_failed(other),
        }
    }

    fn finalize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, _interrupted: bool) {
        self.seek.halt(agent, ctx.host);
    }

    fn destination(&self) -> Option<Position> {
        self.goal
    }

    fn speed(&self) -> Option<f32> {
        self.seek.speed()
    }
}
