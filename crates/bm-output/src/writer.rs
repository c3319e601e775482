//! The `OutputWriter` trait implemented by recording backends.

use crate::{AgentStateRow, MetricsRow, OutputResult, ResultRow};

/// A sink for movement recordings.
///
/// Errors are returned to the caller; [`MovementOutputObserver`](crate::MovementOutputObserver)
/// keeps the first one for [`take_error`](crate::MovementOutputObserver::take_error).
pub trait OutputWriter {
    fn write_metrics(&mut self, row: &MetricsRow) -> OutputResult<()>;

    /// Write a batch of agent states from one snapshot.
    fn write_states(&mut self, rows: &[AgentStateRow]) -> OutputResult<()>;

    fn write_result(&mut self, row: &ResultRow) -> OutputResult<()>;

    /// Flush and close all underlying file handles.  Idempotent.
    fn finish(&mut self) -> OutputResult<()>;
}
