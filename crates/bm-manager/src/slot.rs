//! The per-agent record owned by the manager.

use std::collections::VecDeque;

use bm_behavior::{GeneratorKind, IdleGenerator, MovementGenerator};
use bm_core::{AgentRng, GameTime};

use crate::{MovementState, SchedulerConfig};

/// One agent's generators, RNG stream, schedule and live state.
///
/// Always behind its own `Mutex`.  Lock order is slot, then shared tables:
/// while a slot is held, generator updates and state refreshes take the
/// stuck table, the path cache and the host's own locks.  The manager's
/// agent and group tables are never held while a slot is locked, and no two
/// slot locks are held at once.
pub(crate) struct AgentSlot {
    pub active:      Box<dyn MovementGenerator>,
    pub pending:     Option<Box<dyn MovementGenerator>>,
    pub history:     VecDeque<GeneratorKind>,
    pub state:       MovementState,
    pub rng:         AgentRng,
    pub last_update: Option<GameTime>,
    /// Extra interval from CPU-budget overruns.
    pub throttle_ms: u64,
    /// Generator updates are suspended until then (stuck-recovery grace).
    pub hold_until:  Option<GameTime>,
    pub in_combat:   bool,
}

impl AgentSlot {
    pub fn new(rng: AgentRng, state: MovementState) -> Self {
        Self {
            active: Box::new(IdleGenerator::new()),
            pending: None,
            history: VecDeque::new(),
            state,
            rng,
            last_update: None,
            throttle_ms: 0,
            hold_until: None,
            in_combat: false,
        }
    }

    /// Interval between updates for this agent right now.
    ///
    /// Combat (the agent's flag or a combat generator) is tightest, idle is
    /// loosest; throttling stretches all of them.
    pub fn required_interval(&self, cfg: &SchedulerConfig) -> u64 {
        let kind = self.active.kind();
        let base = if self.in_combat || kind.is_combat() {
            cfg.combat_interval_ms
        } else if kind == GeneratorKind::Idle && self.pending.is_none() {
            cfg.idle_interval_ms
        } else {
            cfg.normal_interval_ms
        };
        base + self.throttle_ms
    }

    pub fn is_due(&self, now: GameTime, cfg: &SchedulerConfig) -> bool {
        if self.state.needs_recalculation {
            return true;
        }
        match self.last_update {
            None => true,
            Some(last) => now.since(last) >= self.required_interval(cfg),
        }
    }

    pub fn push_history(&mut self, kind: GeneratorKind, cap: usize) {
        if cap == 0 {
            return;
        }
        while self.history.len() >= cap {
            self.history.pop_front();
        }
        self.history.push_back(kind);
    }

    /// Grow or decay the throttle after an update that cost `cost_us`.
    /// Returns `true` on an overrun.
    pub fn account(&mut self, cost_us: u64, cfg: &SchedulerConfig) -> bool {
        if cost_us > cfg.cpu_budget_us {
            self.throttle_ms = (self.throttle_ms + cfg.throttle_step_ms).min(cfg.throttle_max_ms);
            true
        } else {
            self.throttle_ms = self.throttle_ms.saturating_sub(cfg.throttle_decay_ms);
            false
        }
    }
}
