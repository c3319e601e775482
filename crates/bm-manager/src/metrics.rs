//! Manager counters and the periodic metrics snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use bm_core::GameTime;
use bm_pathing::PathMetrics;
use bm_validation::ValidationStats;

/// Point-in-time view over the manager, the planner and the validator.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementMetrics {
    pub at:                 GameTime,
    pub agents:             usize,
    pub moving_agents:      usize,
    /// Agents whose update interval is currently stretched by throttling.
    pub throttled_agents:   usize,
    pub commands_accepted:  u64,
    pub commands_queued:    u64,
    pub commands_rejected:  u64,
    pub generator_switches: u64,
    pub updates_run:        u64,
    pub updates_skipped:    u64,
    pub budget_overruns:    u64,
    pub average_update_us:  f32,
    pub paths:              PathMetrics,
    pub validation:         ValidationStats,
}

#[derive(Default)]
pub(crate) struct ManagerCounters {
    pub commands_accepted:  AtomicU64,
    pub commands_queued:    AtomicU64,
    pub commands_rejected:  AtomicU64,
    pub generator_switches: AtomicU64,
    pub updates_run:        AtomicU64,
    pub updates_skipped:    AtomicU64,
    pub budget_overruns:    AtomicU64,
    pub update_us:          AtomicU64,
    /// Game time of the last metrics snapshot, plus one; zero means never.
    pub last_snapshot:      AtomicU64,
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl ManagerCounters {
    /// Fill the manager-owned fields of `m`.
    pub fn fill(&self, m: &mut MovementMetrics) {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        m.commands_accepted = load(&self.commands_accepted);
        m.commands_queued = load(&self.commands_queued);
        m.commands_rejected = load(&self.commands_rejected);
        m.generator_switches = load(&self.generator_switches);
        m.updates_run = load(&self.updates_run);
        m.updates_skipped = load(&self.updates_skipped);
        m.budget_overruns = load(&self.budget_overruns);
        m.average_update_us = if m.updates_run == 0 {
            0.0
        } else {
            load(&self.update_us) as f32 / m.updates_run as f32
        };
    }

    /// `true` (and the mark moves to `now`) when a snapshot is due.
    pub fn snapshot_due(&self, now: GameTime, interval_ms: u64) -> bool {
        let last = self.last_snapshot.load(Ordering::Relaxed);
        if last != 0 && now.since(GameTime(last - 1)) < interval_ms {
            return false;
        }
        self.last_snapshot.store(now.0 + 1, Ordering::Relaxed);
        true
    }
}
