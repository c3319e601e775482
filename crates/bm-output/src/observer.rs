//! `MovementOutputObserver<W>`: bridges `MovementObserver` to an `OutputWriter`.

use tracing::warn;

use bm_behavior::{GeneratorKind, MovementResult};
use bm_core::{AgentId, GameTime};
use bm_manager::{MovementMetrics, MovementObserver, MovementState};

use crate::row::{AgentStateRow, MetricsRow, ResultRow};
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`MovementObserver`] that records metrics snapshots, agent states and
/// generator results to any [`OutputWriter`].
///
/// Observer methods have no return value, so writer errors are stored; the
/// first one is kept and the rest are dropped.  Check
/// [`take_error`][Self::take_error] after the run.
pub struct MovementOutputObserver<W: OutputWriter> {
    writer:        W,
    record_states: bool,
    last_error:    Option<OutputError>,
}

impl<W: OutputWriter> MovementOutputObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, record_states: true, last_error: None }
    }

    /// Skip the per-agent state rows; metrics and results are still written.
    pub fn without_states(mut self) -> Self {
        self.record_states = false;
        self
    }

    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Flush the writer now, for runs that never call `shutdown`.
    pub fn finish(&mut self) -> OutputResult<()> {
        self.writer.finish()
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            if self.last_error.is_none() {
                warn!(error = %e, "movement output write failed");
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> MovementObserver for MovementOutputObserver<W> {
    fn on_result(&mut self, now: GameTime, agent: AgentId, kind: GeneratorKind, result: MovementResult) {
        let row = ResultRow { at_ms: now.0, agent_id: agent.0, generator: kind, result };
        let result = self.writer.write_result(&row);
        self.store_err(result);
    }

    fn on_snapshot(&mut self, now: GameTime, metrics: &MovementMetrics, states: &[(AgentId, MovementState)]) {
        let result = self.writer.write_metrics(&MetricsRow::from(metrics));
        self.store_err(result);

        if self.record_states && !states.is_empty() {
            let rows: Vec<AgentStateRow> =
                states.iter().map(|(id, state)| AgentStateRow::new(now, *id, state)).collect();
            let result = self.writer.write_states(&rows);
            self.store_err(result);
        }
    }

    fn on_shutdown(&mut self, _now: GameTime) {
        let result = self.writer.finish();
        self.store_err(result);
    }
}
