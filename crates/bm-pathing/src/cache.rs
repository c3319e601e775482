//! Per-agent path cache keyed by quantized destination.
//!
//! # Key
//!
//! `(agent, ⌊x / grid_xy⌋, ⌊y / grid_xy⌋, ⌊z / grid_z⌋)`.  Height takes part in
//! the key on a coarser grid, so stacked floors never share an entry while
//! slope noise of a unit or two still hits.
//!
//! # Eviction
//!
//! - **Capacity**: at capacity the least recently *inserted* entry goes.
//! - **TTL**: a lookup never returns an entry older than `ttl_ms`; expired
//!   entries are physically dropped by [`PathCache::sweep`], which runs at
//!   most once per `sweep_interval_ms`.
//!
//! Lookups take the read lock only; hit counts are per-entry atomics.  The
//! cache stores owned copies, so eviction never touches a path a generator
//! is already following.

use std::collections::VecDeque;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tracing::{debug, trace};

use bm_core::sync::{read, write};
use bm_core::{AgentId, BmError, BmResult, GameTime, Position};

use crate::path::MovementPath;

#[cfg(feature = "fx-hash")]
type Map<K, V> = rustc_hash::FxHashMap<K, V>;
#[cfg(not(feature = "fx-hash"))]
type Map<K, V> = std::collections::HashMap<K, V>;

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
    pub enabled:           bool,
    pub capacity:          usize,
    pub ttl_ms:            u64,
    pub sweep_interval_ms: u64,
    pub grid_xy:           f32,
    pub grid_z:            f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled:           true,
            capacity:          1_000,
            ttl_ms:            30_000,
            sweep_interval_ms: 5_000,
            grid_xy:           2.0,
            grid_z:            4.0,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> BmResult<()> {
        if self.capacity == 0 {
            return Err(BmError::config("cache capacity must be >= 1"));
        }
        if !(self.grid_xy > 0.0) || !(self.grid_z > 0.0) {
            return Err(BmError::config("cache grid sizes must be positive"));
        }
        if self.ttl_ms == 0 {
            return Err(BmError::config("cache ttl_ms must be > 0"));
        }
        Ok(())
    }
}

/// Quantized destination key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub agent: AgentId,
    pub qx:    i32,
    pub qy:    i32,
    pub qz:    i32,
}

impl CacheKey {
    pub fn new(agent: AgentId, dest: Position, config: &CacheConfig) -> Self {
        let q = |v: f32, cell: f32| (v / cell).floor() as i32;
        Self {
            agent,
            qx: q(dest.x, config.grid_xy),
            qy: q(dest.y, config.grid_xy),
            qz: q(dest.z, config.grid_z),
        }
    }
}

struct Entry {
    path:     MovementPath,
    inserted: GameTime,
    /// Insertion sequence number; matches the entry's slot in `order`.
    seq:      u64,
    hits:     AtomicU32,
    valid:    bool,
}

#[derive(Default)]
struct Table {
    map:      Map<CacheKey, Entry>,
    /// Insertion order.  Re-inserted keys leave stale records behind; those
    /// are skipped on eviction by comparing sequence numbers.
    order:    VecDeque<(CacheKey, u64)>,
    next_seq: u64,
}

/// Point-in-time cache statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    pub entries:   usize,
    pub hits:      u64,
    pub misses:    u64,
    pub evictions: u64,
    pub expired:   u64,
}

pub struct PathCache {
    config:     RwLock<CacheConfig>,
    table:      RwLock<Table>,
    last_sweep: AtomicU64,
    hits:       AtomicU64,
    misses:     AtomicU64,
    evictions:  AtomicU64,
    expired:    AtomicU64,
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl PathCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config:     RwLock::new(config),
            table:      RwLock::new(Table::default()),
            last_sweep: AtomicU64::new(0),
            hits:       AtomicU64::new(0),
            misses:     AtomicU64::new(0),
            evictions:  AtomicU64::new(0),
            expired:    AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> CacheConfig {
        *read(&self.config)
    }

    /// Replace the configuration.  Shrinking the capacity evicts the oldest
    /// entries immediately; changing the grid clears the cache, since
    /// existing keys no longer line up.
    pub fn set_config(&self, config: CacheConfig) -> BmResult<()> {
        config.validate()?;
        let old = std::mem::replace(&mut *write(&self.config), config);
        if old.grid_xy != config.grid_xy || old.grid_z != config.grid_z || !config.enabled {
            self.clear();
        } else {
            let mut table = write(&self.table);
            let evicted = evict_over(&mut table, config.capacity);
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        read(&self.table).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the cached path for `agent` near `dest`, if one is present,
    /// valid, and younger than the TTL.
    pub fn get(&self, agent: AgentId, dest: Position, now: GameTime) -> Option<MovementPath> {
        self.get_with(agent, dest, now, |path| Some(path.clone()))
    }

    /// Like [`get`](Self::get), but `accept` adapts the cached path and may
    /// refuse it.  A refused entry counts as a miss.
    pub fn get_with<F>(&self, agent: AgentId, dest: Position, now: GameTime, accept: F) -> Option<MovementPath>
    where
        F: FnOnce(&MovementPath) -> Option<MovementPath>,
    {
        let cfg = self.config();
        if !cfg.enabled {
            return None;
        }
        let key = CacheKey::new(agent, dest, &cfg);
        let table = read(&self.table);
        let found = table
            .map
            .get(&key)
            .filter(|e| e.valid && now.since(e.inserted) < cfg.ttl_ms)
            .and_then(|e| accept(&e.path).map(|path| (e, path)));
        match found {
            Some((e, path)) => {
                e.hits.fetch_add(1, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(agent = %agent, %dest, "path cache hit");
                Some(path)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a copy of `path`.  Only valid paths are accepted.
    pub fn insert(&self, agent: AgentId, dest: Position, path: &MovementPath, now: GameTime) {
        let cfg = self.config();
        if !cfg.enabled || !path.is_valid() {
            return;
        }
        let key = CacheKey::new(agent, dest, &cfg);
        let mut table = write(&self.table);
        let seq = table.next_seq;
        table.next_seq += 1;

        let entry = Entry { path: path.clone(), inserted: now, seq, hits: AtomicU32::new(0), valid: true };
        if table.map.insert(key, entry).is_none() {
            // The new key's order record is not queued yet, so it cannot be
            // the one evicted.
            let evicted = evict_over(&mut table, cfg.capacity);
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        table.order.push_back((key, seq));
        if table.order.len() > table.map.len() * 2 + 16 {
            compact_order(&mut table);
        }
    }

    /// Mark the entry for `agent` near `dest` unusable; lookups miss until it
    /// is replaced or swept.
    pub fn invalidate(&self, agent: AgentId, dest: Position) -> bool {
        let key = CacheKey::new(agent, dest, &self.config());
        match write(&self.table).map.get_mut(&key) {
            Some(e) => {
                e.valid = false;
                true
            }
            None => false,
        }
    }

    /// Number of lookups that returned the entry for `agent` near `dest`.
    pub fn hit_count(&self, agent: AgentId, dest: Position) -> Option<u32> {
        let key = CacheKey::new(agent, dest, &self.config());
        read(&self.table).map.get(&key).map(|e| e.hits.load(Ordering::Relaxed))
    }

    /// Drop every entry belonging to `agent`.
    pub fn remove_agent(&self, agent: AgentId) -> usize {
        let mut table = write(&self.table);
        let before = table.map.len();
        table.map.retain(|k, _| k.agent != agent);
        table.order.retain(|(k, _)| k.agent != agent);
        before - table.map.len()
    }

    pub fn clear(&self) {
        let mut table = write(&self.table);
        table.map.clear();
        table.order.clear();
    }

    /// Drop expired and invalidated entries if a sweep is due.  Returns the
    /// number of entries removed.
    pub fn sweep(&self, now: GameTime) -> usize {
        let cfg = self.config();
        let last = GameTime(self.last_sweep.load(Ordering::Relaxed));
        if now.since(last) < cfg.sweep_interval_ms {
            return 0;
        }
        self.last_sweep.store(now.0, Ordering::Relaxed);
        self.purge_expired(now, cfg.ttl_ms)
    }

    fn purge_expired(&self, now: GameTime, ttl_ms: u64) -> usize {
        let mut table = write(&self.table);
        let before = table.map.len();
        table.map.retain(|_, e| e.valid && now.since(e.inserted) < ttl_ms);
        let removed = before - table.map.len();
        if removed > 0 {
            compact_order(&mut table);
            self.expired.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = table.map.len(), "path cache sweep");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries:   self.len(),
            hits:      self.hits.load(Ordering::Relaxed),
            misses:    self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired:   self.expired.load(Ordering::Relaxed),
        }
    }
}

/// Evict oldest-inserted entries until at most `capacity` remain.
fn evict_over(table: &mut Table, capacity: usize) -> u64 {
    let mut evicted = 0;
    while table.map.len() > capacity {
        let Some((key, seq)) = table.order.pop_front() else { break };
        if table.map.get(&key).is_some_and(|e| e.seq == seq) {
            table.map.remove(&key);
            evicted += 1;
        }
    }
    evicted
}

fn compact_order(table: &mut Table) {
    let Table { map, order, .. } = table;
    order.retain(|(k, seq)| map.get(k).is_some_and(|e| e.seq == *seq));
}
