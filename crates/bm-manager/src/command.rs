//! Command acceptance codes.

use std::fmt;

use bm_behavior::MovementResult;

/// Immediate answer to a movement command.  The command's outcome is
/// observed later through state queries.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandResult {
    /// Installed as the agent's active generator.
    Accepted,
    /// The active generator refused interruption but the new one outranks
    /// it; it is retried on every update until it can be installed.
    Queued,
    Rejected(RejectReason),
}

impl CommandResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandResult::Accepted)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, CommandResult::Rejected(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    /// Not registered with the manager, or gone from the host.
    UnknownAgent,
    /// Malformed parameters.
    InvalidRequest(String),
    /// The active generator refused and the new one does not outrank it.
    LowerPriority,
    /// The generator refused to initialize, with its failure code.
    Initialization(MovementResult),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownAgent => f.write_str("unknown agent"),
            RejectReason::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            RejectReason::LowerPriority => f.write_str("lower priority than the active generator"),
            RejectReason::Initialization(code) => write!(f, "initialization failed: {code}"),
        }
    }
}
