use thiserror::Error;

/// Errors raised while turning a request into a generator.  Failures during
/// an update are [`MovementResult`](crate::MovementResult) codes instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BehaviorError {
    #[error("invalid movement request: {0}")]
    InvalidRequest(String),
}

impl BehaviorError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        BehaviorError::InvalidRequest(msg.into())
    }
}

pub type BehaviorResult<T> = Result<T, BehaviorError>;
