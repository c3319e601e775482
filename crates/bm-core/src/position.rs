//! World-space position type and planar geometry helpers.
//!
//! World space is the host's coordinate system: `x`/`y` horizontal, `z` up,
//! orientation measured counter-clockwise from the +x axis in radians.
//! Navigation-mesh space is a different axis order and never leaks out of
//! `bm-navmesh`.

use std::f32::consts::{PI, TAU};
use std::fmt;

/// A point in world space plus a facing.
///
/// `o` is kept normalized to `[0, 2π)` by every constructor and mutator in
/// this module; code that writes the field directly must call
/// [`normalize_orientation`] itself.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub o: f32,
}

impl Position {
    #[inline]
    pub fn new(x: f32, y: f32, z: f32, o: f32) -> Self {
        Self { x, y, z, o: normalize_orientation(o) }
    }

    /// A position facing +x.
    #[inline]
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, o: 0.0 }
    }

    #[inline]
    pub fn with_orientation(self, o: f32) -> Self {
        Self { o: normalize_orientation(o), ..self }
    }

    #[inline]
    pub fn with_z(self, z: f32) -> Self {
        Self { z, ..self }
    }

    /// Euclidean distance in all three axes.
    #[inline]
    pub fn distance(self, other: Position) -> f32 {
        self.distance_sq(other).sqrt()
    }

    #[inline]
    pub fn distance_sq(self, other: Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Horizontal distance, ignoring `z`.
    #[inline]
    pub fn distance_2d(self, other: Position) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Bearing from `self` to `other`, in `[0, 2π)`.
    #[inline]
    pub fn angle_to(self, other: Position) -> f32 {
        normalize_orientation((other.y - self.y).atan2(other.x - self.x))
    }

    /// The point `dist` units away along bearing `angle`, at the same height.
    /// Orientation is carried over unchanged.
    #[inline]
    pub fn offset(self, dist: f32, angle: f32) -> Position {
        Position {
            x: self.x + angle.cos() * dist,
            y: self.y + angle.sin() * dist,
            ..self
        }
    }

    /// Linear interpolation of the coordinates; orientation is taken from `self`.
    #[inline]
    pub fn lerp(self, other: Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
            o: self.o,
        }
    }

    #[inline]
    pub fn midpoint(self, other: Position) -> Position {
        self.lerp(other, 0.5)
    }

    /// `true` if the two positions are within `eps` of each other (3-D).
    #[inline]
    pub fn approx_eq(self, other: Position, eps: f32) -> bool {
        self.distance_sq(other) <= eps * eps
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.o.is_finite()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2} @ {:.2})", self.x, self.y, self.z, self.o)
    }
}

/// Wrap an angle into `[0, 2π)`.
#[inline]
pub fn normalize_orientation(o: f32) -> f32 {
    let r = o.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if r >= TAU { 0.0 } else { r }
}

/// Signed smallest difference `b - a`, in `[-π, π]`.
#[inline]
pub fn angle_difference(a: f32, b: f32) -> f32 {
    let mut d = (b - a).rem_euclid(TAU);
    if d > PI {
        d -= TAU;
    }
    d
}

/// Shortest 3-D distance from `p` to the segment `a`–`b`.
pub fn segment_distance(p: Position, a: Position, b: Position) -> f32 {
    let (abx, aby, abz) = (b.x - a.x, b.y - a.y, b.z - a.z);
    let len_sq = abx * abx + aby * aby + abz * abz;
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby + (p.z - a.z) * abz) / len_sq).clamp(0.0, 1.0);
    p.distance(a.lerp(b, t))
}
