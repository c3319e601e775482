//! Waypoint driving shared by every path-following generator.
//!
//! [`PathFollower`] walks one [`MovementPath`] node by node; [`Seek`] wraps a
//! follower with replanning against a moving anchor (a target, a leader's
//! slot, a fixed point) and with the stuck and unreachable bookkeeping.

use tracing::trace;

use bm_core::{AgentSnapshot, GameTime, MovementHost, Position, angle_difference};
use bm_pathing::{MovementPath, PathOptions, PathType};

use crate::{GeneratorContext, MovementResult};

/// A waypoint counts as reached within this 2D distance.
pub const REACH_EPSILON: f32 = 0.5;
/// Anchor drift that forces a new path.
pub const REPLAN_DISTANCE: f32 = 2.0;
/// Ends of incomplete paths reached before giving up.
pub const MAX_INCOMPLETE_ARRIVALS: u32 = 3;
/// Facing error tolerated while holding position.
const FACING_TOLERANCE: f32 = 0.1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FollowStep {
    Moving,
    /// Holding at a node with a delay.
    Waiting,
    Finished,
}

/// Drives an agent along a path by issuing one `move_to` per waypoint.
#[derive(Clone, Debug)]
pub struct PathFollower {
    path:       MovementPath,
    index:      usize,
    issued:     Option<usize>,
    wait_until: Option<GameTime>,
}

impl PathFollower {
    pub fn new(path: MovementPath) -> Self {
        Self { path, index: 0, issued: None, wait_until: None }
    }

    pub fn path(&self) -> &MovementPath {
        &self.path
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.path.len()
    }

    /// Speed sent with the most recent move order.
    pub fn speed(&self) -> Option<f32> {
        self.issued.and_then(|i| self.path.nodes.get(i)).map(|n| n.speed)
    }

    /// Skip reached waypoints and make sure the agent is heading for the
    /// current one.  An order is only re-issued when the waypoint changes or
    /// the agent has stopped.
    pub fn advance(&mut self, agent: &AgentSnapshot, host: &dyn MovementHost, now: GameTime) -> FollowStep {
        if let Some(until) = self.wait_until {
            if now < until {
                return FollowStep::Waiting;
            }
            self.wait_until = None;
        }

        while let Some(node) = self.path.nodes.get(self.index) {
            if agent.position.distance_2d(node.position) > REACH_EPSILON {
                break;
            }
            self.index += 1;
            if node.delay > 0 && self.index < self.path.len() {
                self.wait_until = Some(now + u64::from(node.delay));
                host.stop(agent.id);
                return FollowStep::Waiting;
            }
        }

        let Some(node) = self.path.nodes.get(self.index) else {
            return FollowStep::Finished;
        };
        if self.issued != Some(self.index) || !agent.is_moving {
            trace!(agent = %agent.id, waypoint = self.index, dest = %node.position, "move order");
            host.move_to(agent.id, node.position, node.speed, None);
            self.issued = Some(self.index);
        }
        FollowStep::Moving
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeekStatus {
    Moving,
    /// The end of a complete path was reached.
    Arrived,
    NoPath,
    /// Incomplete paths ended short of the goal too many times.
    Unreachable,
    Stuck,
}

impl SeekStatus {
    /// The generator result for this status, with `Arrived` as `Success`.
    pub fn into_result(self) -> MovementResult {
        match self {
            SeekStatus::Moving => MovementResult::InProgress,
            SeekStatus::Arrived => MovementResult::Success,
            SeekStatus::NoPath => MovementResult::NoPath,
            SeekStatus::Unreachable => MovementResult::Unreachable,
            SeekStatus::Stuck => MovementResult::Stuck,
        }
    }
}

/// Stop the agent if needed and turn it toward `look_at`.
pub fn hold_facing(agent: &AgentSnapshot, host: &dyn MovementHost, look_at: Position) {
    if agent.is_moving {
        host.stop(agent.id);
    }
    if agent.position.distance_2d(look_at) > f32::EPSILON {
        let bearing = agent.position.angle_to(look_at);
        if angle_difference(agent.position.o, bearing).abs() > FACING_TOLERANCE {
            host.face(agent.id, bearing);
        }
    }
}

/// Path following toward an anchor that may move.
#[derive(Clone, Debug)]
pub struct Seek {
    opts:       PathOptions,
    follower:   Option<PathFollower>,
    anchor:     Option<Position>,
    incomplete: u32,
}

impl Seek {
    pub fn new(opts: PathOptions) -> Self {
        Self { opts, follower: None, anchor: None, incomplete: 0 }
    }

    pub fn options(&self) -> &PathOptions {
        &self.opts
    }

    pub fn path(&self) -> Option<&MovementPath> {
        self.follower.as_ref().map(PathFollower::path)
    }

    pub fn destination(&self) -> Option<Position> {
        self.path().and_then(MovementPath::destination)
    }

    pub fn speed(&self) -> Option<f32> {
        self.follower.as_ref().and_then(PathFollower::speed)
    }

    /// Where the current path was planned toward.
    pub fn anchor(&self) -> Option<Position> {
        self.anchor
    }

    pub fn is_active(&self) -> bool {
        self.follower.is_some()
    }

    /// Drop the current path; the next [`step`](Self::step) plans again.
    pub fn invalidate(&mut self) {
        self.follower = None;
        self.anchor = None;
    }

    /// Invalidate and also forget incomplete arrivals.
    pub fn reset(&mut self) {
        self.invalidate();
        self.incomplete = 0;
    }

    /// Invalidate, stopping the agent if it was being driven.
    pub fn halt(&mut self, agent: &AgentSnapshot, host: &dyn MovementHost) {
        if self.follower.is_some() && agent.is_moving {
            host.stop(agent.id);
        }
        self.invalidate();
    }

    /// One update toward `anchor`.
    ///
    /// A new path is requested from `plan` when there is none, when the
    /// anchor drifted more than `replan_distance` from where the current
    /// path was planned, or when an incomplete path ran out.
    pub fn step<F>(
        &mut self,
        agent:           &AgentSnapshot,
        ctx:             &GeneratorContext<'_>,
        anchor:          Position,
        replan_distance: f32,
        plan:            F,
    ) -> SeekStatus
    where
        F: FnOnce(&PathOptions) -> Option<MovementPath>,
    {
        if ctx.is_stuck(agent) {
            return SeekStatus::Stuck;
        }

        let drifted = self.anchor.is_none_or(|a| a.distance_2d(anchor) > replan_distance);
        if !drifted {
            if let Some(follower) = self.follower.as_mut() {
                match follower.advance(agent, ctx.host, ctx.now) {
                    FollowStep::Moving | FollowStep::Waiting => return SeekStatus::Moving,
                    FollowStep::Finished => {
                        if let Some(status) = self.arrival() {
                            return status;
                        }
                    }
                }
            }
        }

        let Some(path) = plan(&self.opts).filter(MovementPath::is_valid) else {
            self.invalidate();
            return SeekStatus::NoPath;
        };
        trace!(agent = %agent.id, kind = ?path.path_type, nodes = path.len(), "seek planned");
        self.anchor = Some(anchor);
        let mut follower = PathFollower::new(path);
        let step = follower.advance(agent, ctx.host, ctx.now);
        self.follower = Some(follower);
        match step {
            FollowStep::Finished => self.arrival().unwrap_or(SeekStatus::Moving),
            _ => SeekStatus::Moving,
        }
    }

    /// Bookkeeping for a finished follower.  `None` means "plan again".
    fn arrival(&mut self) -> Option<SeekStatus> {
        let incomplete = self.path().is_some_and(|p| p.path_type == PathType::Incomplete);
        if !incomplete {
            return Some(SeekStatus::Arrived);
        }
        self.incomplete += 1;
        self.invalidate();
        (self.incomplete >= MAX_INCOMPLETE_ARRIVALS).then_some(SeekStatus::Unreachable)
    }
}
