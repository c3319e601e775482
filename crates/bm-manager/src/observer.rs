//! Observer hooks for progress reporting and data collection.

use bm_behavior::{GeneratorKind, MovementResult};
use bm_core::{AgentId, GameTime};

use crate::{MovementMetrics, MovementState};

/// Callbacks invoked by [`MovementManager::update_all`][crate::MovementManager::update_all].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
pub trait MovementObserver {
    fn on_tick_start(&mut self, _now: GameTime) {}

    /// `updated` is the number of agents whose generator actually ran.
    fn on_tick_end(&mut self, _now: GameTime, _updated: usize) {}

    /// A generator ended (success of a one-shot generator, any failure, or
    /// an exhausted stuck recovery).
    fn on_result(&mut self, _now: GameTime, _agent: AgentId, _kind: GeneratorKind, _result: MovementResult) {}

    /// Called every `metrics_interval_ms` with the metrics and every agent's
    /// state, in ascending agent order.
    fn on_snapshot(&mut self, _now: GameTime, _metrics: &MovementMetrics, _states: &[(AgentId, MovementState)]) {}

    /// Called once by [`MovementManager::shutdown`][crate::MovementManager::shutdown].
    fn on_shutdown(&mut self, _now: GameTime) {}
}

/// A [`MovementObserver`] that does nothing.
pub struct NoopObserver;

impl MovementObserver for NoopObserver {}
