//! Per-update outcome codes.

use std::fmt;

/// What one [`MovementGenerator::update`](crate::MovementGenerator::update)
/// call achieved.
///
/// | Code                 | Manager policy                                   |
/// |----------------------|--------------------------------------------------|
/// | `Success`            | one-shot: finalize; persistent: keep, holding    |
/// | `InProgress`         | keep                                             |
/// | `Stuck`              | escalate through stuck recovery                  |
/// | `Cancelled`          | finalize, never retried                          |
/// | everything else      | finalize and fall back to idle                   |
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MovementResult {
    Success,
    #[default]
    InProgress,
    Failed,
    Cancelled,
    Unreachable,
    InvalidDestination,
    NoPath,
    Stuck,
}

impl MovementResult {
    /// Hard failures: the generator is discarded with no automatic retry.
    #[inline]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            MovementResult::Failed
                | MovementResult::Unreachable
                | MovementResult::InvalidDestination
                | MovementResult::NoPath
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementResult::Success => "success",
            MovementResult::InProgress => "in_progress",
            MovementResult::Failed => "failed",
            MovementResult::Cancelled => "cancelled",
            MovementResult::Unreachable => "unreachable",
            MovementResult::InvalidDestination => "invalid_destination",
            MovementResult::NoPath => "no_path",
            MovementResult::Stuck => "stuck",
        }
    }
}

impl fmt::Display for MovementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
