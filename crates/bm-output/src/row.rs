//! Plain data row types written by output backends.

use bm_behavior::{GeneratorKind, MovementResult};
use bm_core::{AgentId, GameTime};
use bm_manager::{MovementMetrics, MovementState};

/// One metrics snapshot, flattened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsRow {
    pub at_ms:              u64,
    pub agents:             u64,
    pub moving_agents:      u64,
    pub throttled_agents:   u64,
    pub commands_accepted:  u64,
    pub commands_queued:    u64,
    pub commands_rejected:  u64,
    pub generator_switches: u64,
    pub updates_run:        u64,
    pub updates_skipped:    u64,
    pub budget_overruns:    u64,
    pub average_update_us:  f32,
    pub paths_generated:    u64,
    pub direct_paths:       u64,
    pub no_path:            u64,
    pub cache_hits:         u64,
    pub cache_misses:       u64,
    pub cache_evictions:    u64,
    pub average_path_len:   f32,
    pub stuck_detections:   u64,
    pub recoveries:         u64,
    pub recoveries_failed:  u64,
}

impl From<&MovementMetrics> for MetricsRow {
    fn from(m: &MovementMetrics) -> Self {
        Self {
            at_ms:              m.at.0,
            agents:             m.agents as u64,
            moving_agents:      m.moving_agents as u64,
            throttled_agents:   m.throttled_agents as u64,
            commands_accepted:  m.commands_accepted,
            commands_queued:    m.commands_queued,
            commands_rejected:  m.commands_rejected,
            generator_switches: m.generator_switches,
            updates_run:        m.updates_run,
            updates_skipped:    m.updates_skipped,
            budget_overruns:    m.budget_overruns,
            average_update_us:  m.average_update_us,
            paths_generated:    m.paths.paths_generated,
            direct_paths:       m.paths.direct_paths,
            no_path:            m.paths.no_path,
            cache_hits:         m.paths.cache.hits,
            cache_misses:       m.paths.cache.misses,
            cache_evictions:    m.paths.cache.evictions,
            average_path_len:   m.paths.average_length,
            stuck_detections:   m.validation.stuck_detections,
            recoveries:         m.validation.recoveries,
            recoveries_failed:  m.validation.recoveries_exhausted,
        }
    }
}

/// One agent's [`MovementState`] at a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentStateRow {
    pub agent_id:      u32,
    pub at_ms:         u64,
    pub generator:     GeneratorKind,
    pub last_result:   MovementResult,
    pub x:             f32,
    pub y:             f32,
    pub z:             f32,
    pub is_moving:     bool,
    pub speed:         f32,
    pub stuck_counter: u32,
    /// `u32::MAX` when the generator tracks no agent.
    pub target:        u32,
}

impl AgentStateRow {
    pub fn new(at: GameTime, agent: AgentId, state: &MovementState) -> Self {
        Self {
            agent_id:      agent.0,
            at_ms:         at.0,
            generator:     state.generator,
            last_result:   state.last_result,
            x:             state.position.x,
            y:             state.position.y,
            z:             state.position.z,
            is_moving:     state.is_moving,
            speed:         state.speed,
            stuck_counter: state.stuck_counter,
            target:        state.target.map_or(u32::MAX, |t| t.0),
        }
    }
}

/// A generator that ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultRow {
    pub at_ms:     u64,
    pub agent_id:  u32,
    pub generator: GeneratorKind,
    pub result:    MovementResult,
}
