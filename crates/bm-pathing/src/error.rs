//! Pathing error type.
//!
//! Plain path failures are reported in-band as [`PathType::NoPath`]; `Err`
//! is for the convenience wrappers, which can fail before any search runs.
//!
//! [`PathType::NoPath`]: crate::PathType::NoPath

use thiserror::Error;

use bm_core::AgentId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathingError {
    #[error("agent {0} not found in the host world")]
    AgentNotFound(AgentId),

    #[error("no walkable flee direction within the probe fan")]
    NoFleeDirection,
}

pub type PathingResult<T> = Result<T, PathingError>;
