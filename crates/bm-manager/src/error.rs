use bm_behavior::BehaviorError;
use bm_core::{AgentId, BmError};
use thiserror::Error;

/// Construction, configuration and registration errors.  Commands never
/// return these: they answer with a [`CommandResult`](crate::CommandResult).
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("manager configuration error: {0}")]
    Config(#[from] BmError),

    #[error("agent {0} is not known to the host")]
    UnknownAgent(AgentId),

    #[error("agent {0} is already registered")]
    AlreadyRegistered(AgentId),

    #[error(transparent)]
    Behavior(#[from] BehaviorError),
}

pub type ManagerResult<T> = Result<T, ManagerError>;
