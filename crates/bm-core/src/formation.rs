//! Formation slot geometry.
//!
//! Offsets are expressed in the leader's frame: `relative_x` to the leader's
//! right, `relative_y` forward (negative = behind).  [`FormationPosition::
//! world_point`] rotates the offset by the leader's live orientation, so the
//! same `FormationPosition` is reused every tick while the leader turns.

use std::f32::consts::TAU;

use crate::{Position, normalize_orientation};

/// Shape of a group formation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormationType {
    /// Abreast, centred on the leader.
    Line,
    /// Single file behind the leader.
    #[default]
    Column,
    /// Alternating left/right, each row one step further back.
    Wedge,
    /// Equally spaced ring around the leader.
    Circle,
    /// Square grid behind the leader.
    Square,
}

/// One slot's offset relative to the formation leader.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormationPosition {
    pub relative_x:      f32,
    pub relative_y:      f32,
    /// Facing relative to the leader's facing.
    pub relative_angle:  f32,
    /// Distance from the leader.
    pub follow_distance: f32,
    /// Bearing of the slot in the leader's frame (0 = straight ahead).
    pub follow_angle:    f32,
    pub slot:            usize,
}

impl FormationPosition {
    fn from_offset(relative_x: f32, relative_y: f32, relative_angle: f32, slot: usize) -> Self {
        Self {
            relative_x,
            relative_y,
            relative_angle,
            follow_distance: relative_x.hypot(relative_y),
            // Bearing measured counter-clockwise, so a slot on the right is negative.
            follow_angle:    normalize_orientation((-relative_x).atan2(relative_y)),
            slot,
        }
    }

    /// The slot's world position for a leader standing at `leader`.
    pub fn world_point(&self, leader: Position) -> Position {
        let (sin, cos) = leader.o.sin_cos();
        // forward = (cos, sin); right = (sin, -cos)
        Position::new(
            leader.x + sin * self.relative_x + cos * self.relative_y,
            leader.y - cos * self.relative_x + sin * self.relative_y,
            leader.z,
            leader.o + self.relative_angle,
        )
    }
}

/// Compute the leader-relative offset of `slot` in a formation of `total`
/// slots spaced `spacing` units apart.  Pure function of its inputs.
///
/// `slot` is clamped into `0..total`; `total == 0` is treated as one slot.
pub fn calculate_formation_position(
    kind:    FormationType,
    slot:    usize,
    total:   usize,
    spacing: f32,
) -> FormationPosition {
    let total = total.max(1);
    let slot = slot.min(total - 1);
    let s = slot as f32;

    match kind {
        FormationType::Line => {
            let centre = (total as f32 - 1.0) * 0.5;
            FormationPosition::from_offset((s - centre) * spacing, 0.0, 0.0, slot)
        }
        FormationType::Column => {
            FormationPosition::from_offset(0.0, -(s + 1.0) * spacing, 0.0, slot)
        }
        FormationType::Wedge => {
            let row = (slot / 2 + 1) as f32;
            let side = if slot % 2 == 0 { -1.0 } else { 1.0 };
            FormationPosition::from_offset(side * row * spacing, -row * spacing, 0.0, slot)
        }
        FormationType::Circle => {
            // Radius grows so neighbouring slots stay at least `spacing` apart.
            let radius = spacing.max(total as f32 * spacing / TAU);
            let theta = s * TAU / total as f32;
            let (sin, cos) = theta.sin_cos();
            // Each member faces outward from the centre.
            let facing = normalize_orientation(sin.atan2(cos) - std::f32::consts::FRAC_PI_2);
            FormationPosition::from_offset(radius * cos, radius * sin, facing, slot)
        }
        FormationType::Square => {
            let side = (total as f32).sqrt().ceil().max(1.0) as usize;
            let row = (slot / side) as f32;
            let col = (slot % side) as f32;
            let centre = (side as f32 - 1.0) * 0.5;
            FormationPosition::from_offset((col - centre) * spacing, -(row + 1.0) * spacing, 0.0, slot)
        }
    }
}
