//! Per-agent live status, overwritten on every update.

use bm_behavior::{GeneratorKind, MovementPriority, MovementResult};
use bm_core::{AgentId, Position};

#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementState {
    pub generator:           GeneratorKind,
    pub priority:            MovementPriority,
    pub last_result:         MovementResult,
    pub position:            Position,
    /// Where the active generator is heading, if it knows.
    pub target_position:     Option<Position>,
    /// Agent the active generator tracks, if any.
    pub target:              Option<AgentId>,
    /// Speed of the current motion; zero while standing.
    pub speed:               f32,
    pub stuck_counter:       u32,
    pub is_moving:           bool,
    /// Set by commands and target notifications; forces the next update
    /// regardless of the interval.
    pub needs_recalculation: bool,
}

impl MovementState {
    pub fn new(position: Position) -> Self {
        Self { position, ..Self::default() }
    }
}
