//! Movement requests: the validated description of a command, turned into a
//! boxed generator by [`MovementRequest::into_generator`].

use bm_core::{AgentId, FormationPosition, Position};
use bm_pathing::{PathOptions, PathPreset};

use crate::chase::ChaseGenerator;
use crate::flee::FleeGenerator;
use crate::follow::FollowGenerator;
use crate::formation::FormationGenerator;
use crate::idle::IdleGenerator;
use crate::patrol::PatrolGenerator;
use crate::point::PointGenerator;
use crate::wander::WanderGenerator;
use crate::{BehaviorError, BehaviorResult, GeneratorKind, MovementGenerator, MovementPriority};

/// What to do, independent of how fast or how urgently.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeneratorSpec {
    Idle,
    Point {
        dest: Position,
    },
    Follow {
        target:       AgentId,
        min_distance: f32,
        max_distance: f32,
        angle:        Option<f32>,
    },
    Flee {
        threat:   AgentId,
        distance: f32,
    },
    Chase {
        target: AgentId,
        range:  Option<f32>,
        angle:  Option<f32>,
    },
    Formation {
        leader: AgentId,
        slot:   FormationPosition,
    },
    Patrol {
        waypoints: Vec<Position>,
        cyclic:    bool,
    },
    Wander {
        centre:      Option<Position>,
        radius:      f32,
        duration_ms: Option<u64>,
    },
}

impl GeneratorSpec {
    pub fn kind(&self) -> GeneratorKind {
        match self {
            GeneratorSpec::Idle => GeneratorKind::Idle,
            GeneratorSpec::Point { .. } => GeneratorKind::Point,
            GeneratorSpec::Follow { .. } => GeneratorKind::Follow,
            GeneratorSpec::Flee { .. } => GeneratorKind::Flee,
            GeneratorSpec::Chase { .. } => GeneratorKind::Chase,
            GeneratorSpec::Formation { .. } => GeneratorKind::Formation,
            GeneratorSpec::Patrol { .. } => GeneratorKind::Patrol,
            GeneratorSpec::Wander { .. } => GeneratorKind::Wander,
        }
    }

    /// Optimizer tuning for paths planned by this kind of generator.
    pub fn preset(&self) -> PathPreset {
        match self {
            GeneratorSpec::Chase { .. } => PathPreset::Chase,
            GeneratorSpec::Flee { .. } => PathPreset::Flee,
            GeneratorSpec::Formation { .. } => PathPreset::Formation,
            GeneratorSpec::Patrol { .. } | GeneratorSpec::Wander { .. } => PathPreset::Patrol,
            _ => PathPreset::Standard,
        }
    }
}

/// A movement command for one agent.
///
/// Transient: built by the caller (or the manager's command methods),
/// validated, and consumed when the generator is created.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementRequest {
    pub spec:      GeneratorSpec,
    /// Travel speed; `None` uses the agent's run speed.
    pub speed:     Option<f32>,
    /// `None` uses the kind's default priority.
    pub priority:  Option<MovementPriority>,
    /// Search-node budget for this request's paths.
    pub max_nodes: Option<usize>,
    /// Point moves only: refuse every interruption.
    pub forced:    bool,
}

impl From<GeneratorSpec> for MovementRequest {
    fn from(spec: GeneratorSpec) -> Self {
        Self { spec, speed: None, priority: None, max_nodes: None, forced: false }
    }
}

impl MovementRequest {
    pub fn idle() -> Self {
        GeneratorSpec::Idle.into()
    }

    pub fn point(dest: Position) -> Self {
        GeneratorSpec::Point { dest }.into()
    }

    pub fn follow(target: AgentId, min_distance: f32, max_distance: f32, angle: Option<f32>) -> Self {
        GeneratorSpec::Follow { target, min_distance, max_distance, angle }.into()
    }

    pub fn flee(threat: AgentId, distance: f32) -> Self {
        GeneratorSpec::Flee { threat, distance }.into()
    }

    pub fn chase(target: AgentId, range: Option<f32>, angle: Option<f32>) -> Self {
        GeneratorSpec::Chase { target, range, angle }.into()
    }

    pub fn formation(leader: AgentId, slot: FormationPosition) -> Self {
        GeneratorSpec::Formation { leader, slot }.into()
    }

    pub fn patrol(waypoints: Vec<Position>, cyclic: bool) -> Self {
        GeneratorSpec::Patrol { waypoints, cyclic }.into()
    }

    pub fn wander(centre: Option<Position>, radius: f32, duration_ms: Option<u64>) -> Self {
        GeneratorSpec::Wander { centre, radius, duration_ms }.into()
    }

    pub fn with_speed(self, speed: f32) -> Self {
        Self { speed: Some(speed), ..self }
    }

    pub fn with_priority(self, priority: MovementPriority) -> Self {
        Self { priority: Some(priority), ..self }
    }

    pub fn with_max_nodes(self, max_nodes: usize) -> Self {
        Self { max_nodes: Some(max_nodes), ..self }
    }

    pub fn forced(self) -> Self {
        Self { forced: true, ..self }
    }

    pub fn kind(&self) -> GeneratorKind {
        self.spec.kind()
    }

    pub fn priority(&self) -> MovementPriority {
        self.priority.unwrap_or_else(|| self.kind().default_priority())
    }

    /// Path options carrying this request's speed, node budget and preset.
    pub fn path_options(&self) -> PathOptions {
        let mut opts = PathOptions::default().with_preset(self.spec.preset()).with_speed(self.speed);
        if let Some(n) = self.max_nodes {
            opts = opts.with_max_nodes(n);
        }
        opts
    }

    /// Reject malformed parameters.  World-dependent checks (is the
    /// destination walkable, does the target exist) happen when the
    /// generator initializes.
    pub fn validate(&self) -> BehaviorResult<()> {
        if self.speed.is_some_and(|s| !(s > 0.0) || !s.is_finite()) {
            return Err(BehaviorError::invalid("speed must be positive"));
        }
        if self.max_nodes == Some(0) {
            return Err(BehaviorError::invalid("max_nodes must be >= 1"));
        }
        if self.forced && self.kind() != GeneratorKind::Point {
            return Err(BehaviorError::invalid("only point moves can be forced"));
        }
        let finite_angle = |a: &Option<f32>| a.is_none_or(f32::is_finite);
        match &self.spec {
            GeneratorSpec::Idle => {}
            GeneratorSpec::Point { dest } => {
                if !dest.is_finite() {
                    return Err(BehaviorError::invalid("destination is not finite"));
                }
            }
            GeneratorSpec::Follow { min_distance, max_distance, angle, .. } => {
                if !(*min_distance >= 0.0) || !(max_distance >= min_distance) || !max_distance.is_finite() {
                    return Err(BehaviorError::invalid("follow band must satisfy 0 <= min <= max"));
                }
                if !finite_angle(angle) {
                    return Err(BehaviorError::invalid("follow angle is not finite"));
                }
            }
            GeneratorSpec::Flee { distance, .. } => {
                if !(*distance > 0.0) || !distance.is_finite() {
                    return Err(BehaviorError::invalid("flee distance must be positive"));
                }
            }
            GeneratorSpec::Chase { range, angle, .. } => {
                if range.is_some_and(|r| !(r >= 0.0) || !r.is_finite()) {
                    return Err(BehaviorError::invalid("chase range must be non-negative"));
                }
                if !finite_angle(angle) {
                    return Err(BehaviorError::invalid("chase angle is not finite"));
                }
            }
            GeneratorSpec::Formation { slot, .. } => {
                if !slot.relative_x.is_finite() || !slot.relative_y.is_finite() {
                    return Err(BehaviorError::invalid("formation slot offset is not finite"));
                }
            }
            GeneratorSpec::Patrol { waypoints, .. } => {
                if waypoints.is_empty() {
                    return Err(BehaviorError::invalid("patrol needs at least one waypoint"));
                }
                if !waypoints.iter().all(|w| w.is_finite()) {
                    return Err(BehaviorError::invalid("patrol waypoint is not finite"));
                }
            }
            GeneratorSpec::Wander { centre, radius, duration_ms } => {
                if !(*radius > 0.0) || !radius.is_finite() {
                    return Err(BehaviorError::invalid("wander radius must be positive"));
                }
                if centre.is_some_and(|c| !c.is_finite()) {
                    return Err(BehaviorError::invalid("wander centre is not finite"));
                }
                if *duration_ms == Some(0) {
                    return Err(BehaviorError::invalid("wander duration must be > 0"));
                }
            }
        }
        Ok(())
    }

    /// Validate and build the generator.
    pub fn into_generator(self) -> BehaviorResult<Box<dyn MovementGenerator>> {
        self.validate()?;
        let opts = self.path_options();
        let priority = self.priority();
        let generator: Box<dyn MovementGenerator> = match self.spec {
            GeneratorSpec::Idle => Box::new(IdleGenerator::new()),
            GeneratorSpec::Point { dest } => {
                let g = PointGenerator::new(dest, opts).with_priority(priority);
                if self.forced { Box::new(g.forced()) } else { Box::new(g) }
            }
            GeneratorSpec::Follow { target, min_distance, max_distance, angle } => Box::new(
                FollowGenerator::new(target, min_distance, max_distance, angle, opts).with_priority(priority),
            ),
            GeneratorSpec::Flee { threat, distance } => {
                Box::new(FleeGenerator::new(threat, distance, opts).with_priority(priority))
            }
            GeneratorSpec::Chase { target, range, angle } => {
                Box::new(ChaseGenerator::new(target, range, angle, opts).with_priority(priority))
            }
            GeneratorSpec::Formation { leader, slot } => {
                Box::new(FormationGenerator::new(leader, slot, opts).with_priority(priority))
            }
            GeneratorSpec::Patrol { waypoints, cyclic } => {
                Box::new(PatrolGenerator::new(waypoints, cyclic, opts).with_priority(priority))
            }
            GeneratorSpec::Wander { centre, radius, duration_ms } => {
                Box::new(WanderGenerator::new(centre, radius, duration_ms, opts).with_priority(priority))
            }
        };
        Ok(generator)
    }
}
