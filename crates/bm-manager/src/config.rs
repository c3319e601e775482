//! Scheduler and aggregate manager configuration.

use bm_core::{BmError, BmResult};
use bm_pathing::{CacheConfig, PathfindingConfig};
use bm_validation::{StuckConfig, ValidatorConfig};

/// Update cadence, per-tick quota and CPU-budget throttling.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Minimum interval between updates of an agent in combat.
    pub combat_interval_ms:  u64,
    pub normal_interval_ms:  u64,
    /// Used while the agent's active generator is idle.
    pub idle_interval_ms:    u64,
    /// Agents updated per `update_all` call; the rest wait their turn.
    pub max_agents_per_tick: usize,
    /// Soft CPU budget for one agent update.
    pub cpu_budget_us:       u64,
    /// Interval added per budget overrun.
    pub throttle_step_ms:    u64,
    pub throttle_max_ms:     u64,
    /// Throttle removed per update that stays within budget.
    pub throttle_decay_ms:   u64,
    /// Finished generators remembered per agent.
    pub history_len:         usize,
    pub metrics_interval_ms: u64,
    /// Generator updates are held this long after a stuck recovery so the
    /// recovery move can play out.
    pub recovery_grace_ms:   u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            combat_interval_ms:  100,
            normal_interval_ms:  250,
            idle_interval_ms:    1_000,
            max_agents_per_tick: 256,
            cpu_budget_us:       2_000,
            throttle_step_ms:    50,
            throttle_max_ms:     1_000,
            throttle_decay_ms:   10,
            history_len:         8,
            metrics_interval_ms: 1_000,
            recovery_grace_ms:   1_000,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> BmResult<()> {
        if self.max_agents_per_tick == 0 {
            return Err(BmError::config("max_agents_per_tick must be >= 1"));
        }
        if self.combat_interval_ms > self.normal_interval_ms || self.normal_interval_ms > self.idle_interval_ms {
            return Err(BmError::config("intervals must satisfy combat <= normal <= idle"));
        }
        if self.cpu_budget_us == 0 {
            return Err(BmError::config("cpu_budget_us must be > 0"));
        }
        if self.metrics_interval_ms == 0 {
            return Err(BmError::config("metrics_interval_ms must be > 0"));
        }
        Ok(())
    }
}

/// Everything needed to build a [`MovementManager`](crate::MovementManager).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ManagerConfig {
    /// Global seed; each agent's RNG stream is derived from it.
    pub seed:              u64,
    /// Distance between neighbouring formation slots.
    pub formation_spacing: f32,
    pub scheduler:         SchedulerConfig,
    pub pathfinding:       PathfindingConfig,
    pub cache:             CacheConfig,
    pub validator:         ValidatorConfig,
    pub stuck:             StuckConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            seed:              0x5EED,
            formation_spacing: 3.0,
            scheduler:         SchedulerConfig::default(),
            pathfinding:       PathfindingConfig::default(),
            cache:             CacheConfig::default(),
            validator:         ValidatorConfig::default(),
            stuck:             StuckConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> BmResult<()> {
        if !(self.formation_spacing > 0.0) {
            return Err(BmError::config("formation_spacing must be positive"));
        }
        self.scheduler.validate()?;
        self.pathfinding.validate()?;
        self.cache.validate()?;
        self.validator.validate()?;
        self.stuck.validate()
    }
}
