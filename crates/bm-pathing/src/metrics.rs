//! Atomic counters for the pathfinding adapter.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::CacheStats;

/// Snapshot of [`PathCounters`] plus the cache statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathMetrics {
    /// Paths produced by a search or a direct line (cache hits excluded).
    pub paths_generated:        u64,
    pub direct_paths:           u64,
    pub incomplete_paths:       u64,
    pub no_path:                u64,
    pub validation_failures:    u64,
    pub optimizations_applied:  u64,
    pub optimizations_reverted: u64,
    pub cache:                  CacheStats,
    pub average_length:         f32,
    pub average_cost_us:        f32,
}

/// Counters incremented on every calculation; read only for snapshots.
#[derive(Default)]
pub(crate) struct PathCounters {
    pub paths_generated:        AtomicU64,
    pub direct_paths:           AtomicU64,
    pub incomplete_paths:       AtomicU64,
    pub no_path:                AtomicU64,
    pub validation_failures:    AtomicU64,
    pub optimizations_applied:  AtomicU64,
    pub optimizations_reverted: AtomicU64,
    /// Sum of generated path lengths, in millimetres.
    pub length_mm:              AtomicU64,
    pub cost_us:                AtomicU64,
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PathCounters {
    pub fn record_generated(&self, length: f32, cost_us: u64) {
        bump(&self.paths_generated);
        self.length_mm.fetch_add((length.max(0.0) * 1000.0) as u64, Ordering::Relaxed);
        self.cost_us.fetch_add(cost_us, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cache: CacheStats) -> PathMetrics {
        let get = |a: &AtomicU64| a.load(Ordering::Relaxed);
        let generated = get(&self.paths_generated);
        let avg = |total: u64| if generated == 0 { 0.0 } else { total as f32 / generated as f32 };
        PathMetrics {
            paths_generated:        generated,
            direct_paths:           get(&self.direct_paths),
            incomplete_paths:       get(&self.incomplete_paths),
            no_path:                get(&self.no_path),
            validation_failures:    get(&self.validation_failures),
            optimizations_applied:  get(&self.optimizations_applied),
            optimizations_reverted: get(&self.optimizations_reverted),
            cache,
            average_length:         avg(get(&self.length_mm)) / 1000.0,
            average_cost_us:        avg(get(&self.cost_us)),
        }
    }
}
