//! Validation failure reasons.
//!
//! These never escape a tick as `Err`: generators turn them into
//! `InvalidDestination` / `NoPath` result codes and log the reason.

use thiserror::Error;

use bm_core::TerrainKind;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("position is not finite")]
    NonFinite,

    #[error("no ground within search distance")]
    Void,

    #[error("hazardous terrain: {0}")]
    Hazardous(TerrainKind),

    #[error("inside a registered danger zone")]
    DangerZone,

    #[error("destination requires swimming")]
    RequiresSwimming,

    #[error("destination is {height:.1} above ground and requires flight")]
    RequiresFlight { height: f32 },

    #[error("fall of {fall:.1} exceeds safe distance {limit:.1}")]
    UnsafeFall { fall: f32, limit: f32 },

    #[error("segment collides with world geometry")]
    Blocked,

    #[error("path length {length:.1} exceeds maximum {max:.1}")]
    PathTooLong { length: f32, max: f32 },

    #[error("path has no nodes")]
    EmptyPath,
}

pub type ValidationResult<T> = Result<T, ValidationError>;
