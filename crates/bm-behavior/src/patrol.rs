//! Waypoint patrols.

use tracing::debug;

use bm_core::{AgentRng, AgentSnapshot, Position};
use bm_pathing::PathOptions;

use crate::follower::{REACH_EPSILON, REPLAN_DISTANCE, Seek};
use crate::{GeneratorContext, GeneratorKind, MovementGenerator, MovementPriority, MovementResult};

/// Visit a fixed list of waypoints in order.
///
/// Cyclic patrols wrap around forever; one-shot patrols succeed at the last
/// waypoint.
#[derive(Clone, Debug)]
pub struct PatrolGenerator {
    waypoints: Vec<Position>,
    cyclic:    bool,
    index:     usize,
    laps:      u32,
    priority:  MovementPriority,
    seek:      Seek,
}

impl PatrolGenerator {
    pub fn new(waypoints: Vec<Position>, cyclic: bool, opts: PathOptions) -> Self {
        Self {
            waypoints,
            cyclic,
            index: 0,
            laps: 0,
            priority: GeneratorKind::Patrol.default_priority(),
            seek: Seek::new(opts),
        }
    }

    pub fn with_priority(self, priority: MovementPriority) -> Self {
        Self { priority, ..self }
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Completed cycles of a cyclic patrol.
    pub fn laps(&self) -> u32 {
        self.laps
    }

    /// Move on to the next waypoint; `false` once a one-shot patrol is done.
    fn advance(&mut self) -> bool {
        self.seek.reset();
        if self.index + 1 < self.waypoints.len() {
            self.index += 1;
            return true;
        }
        if !self.cyclic {
            return false;
        }
        self.index = 0;
        self.laps += 1;
        true
    }
}

impl MovementGenerator for PatrolGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Patrol
    }

    fn priority(&self) -> MovementPriority {
        self.priority
    }

    fn initialize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>) -> Result<(), MovementResult> {
        if self.waypoints.is_empty() {
            return Err(MovementResult::InvalidDestination);
        }
        // Each leg is validated from the previous waypoint, the first from
        // where the agent stands.
        let mut from = agent.position;
        for (i, &wp) in self.waypoints.iter().enumerate() {
            if let Err(e) = ctx.validator().validate_destination(ctx.host, agent, from, wp) {
                debug!(agent = %agent.id, waypoint = i, position = %wp, reason = %e, "patrol waypoint rejected");
                return Err(MovementResult::InvalidDestination);
            }
            from = wp;
        }
        self.index = 0;
        self.laps = 0;
        Ok(())
    }

    fn reset(&mut self, _agent: &AgentSnapshot, _ctx: &GeneratorContext<'_>) {
        self.seek.reset();
    }

    fn update(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, _rng: &mut AgentRng) -> MovementResult {
        let Some(&wp) = self.waypoints.get(self.index) else {
            return MovementResult::Failed;
        };
        if agent.position.distance_2d(wp) <= REACH_EPSILON {
            if !self.advance() {
                return MovementResult::Success;
            }
            if self.waypoints.len() == 1 {
                return MovementResult::InProgress;
            }
        }

        let wp = self.waypoints[self.index];
        let status = self.seek.step(agent, ctx, wp, REPLAN_DISTANCE, |opts| {
            Some(ctx.planner.calculate_path(ctx.host, agent, wp, opts, ctx.now))
        });
        match status.into_result() {
            // The path ended short of the waypoint (snapped onto the mesh).
            MovementResult::Success => {
                if self.advance() { MovementResult::InProgress } else { MovementResult::Success }
            }
            other => other,
        }
    }

    fn finalize(&mut self, agent: &AgentSnapshot, ctx: &GeneratorContext<'_>, _interrupted: bool) {
        self.seek.halt(agent, ctx.host);
    }

    fn destination(&self) -> Option<Position> {
        self.waypoints.get(self.index).copied()
    }

    fn speed(&self) -> Option<f32> {
        self.seek.speed()
    }
}
