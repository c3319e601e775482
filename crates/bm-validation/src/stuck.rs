//! Stuck detection and escalating recovery.
//!
//! # State machine
//!
//! ```text
//!            moved < threshold while moving         counter >= limit
//!  Moving ──────────────────────────────────▶ Suspect ───────────────▶ Stuck
//!    ▲           (counter += 1 per sample)       │                       │
//!    │  moved >= 2 × threshold                   │ otherwise             │ attempt_recovery
//!    └───────────────────────────────────────────┴── counter decays      ▼
//!                                                          Recovered | Exhausted
//! ```
//!
//! Samples are taken at most once per `check_interval_ms` of game time.
//! Recovery escalates by the agent's cumulative attempt count, which only
//! resets once the agent demonstrably moves again:
//!
//! | Attempts | Action                                                     |
//! |----------|------------------------------------------------------------|
//! | 1–3      | step straight back from the current facing, 2/4/6 units    |
//! | 4–6      | up to `random_probes` random directions at 3–10 units      |
//! | 7–10     | teleport to the last position recorded while not stuck     |
//! | > 10     | exhausted: the caller abandons the movement                |

use std::f32::consts::PI;

use tracing::{debug, warn};

use bm_core::sync::{read, write};
use bm_core::{AgentId, AgentRng, AgentSnapshot, BmError, BmResult, GameTime, MoveMode, MovementHost, Position};

use crate::validator::{MovementValidator, bump};

/// A teleport target closer than this to the agent would not free it.
const MIN_TELEPORT_DISTANCE: f32 = 1.0;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StuckConfig {
    /// Minimum game time between position samples.
    pub check_interval_ms:  u64,
    /// Movement below this per sample counts as no progress.
    pub movement_threshold: f32,
    /// Consecutive no-progress samples before the agent is flagged.
    pub counter_threshold:  u32,
    /// Hard cap on cumulative recovery attempts.
    pub max_attempts:       u32,
    /// Backward step per attempt in the first tier (2, 4, 6 units).
    pub backward_step:      f32,
    pub random_probes:      u32,
    pub random_min:         f32,
    pub random_max:         f32,
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self {
            check_interval_ms:  1_000,
            movement_threshold: 0.5,
            counter_threshold:  3,
            max_attempts:       10,
            backward_step:      2.0,
            random_probes:      8,
            random_min:         3.0,
            random_max:         10.0,
        }
    }
}

impl StuckConfig {
    pub fn validate(&self) -> BmResult<()> {
        if self.check_interval_ms == 0 {
            return Err(BmError::config("stuck check_interval_ms must be > 0"));
        }
        if !(self.movement_threshold > 0.0) {
            return Err(BmError::config("stuck movement_threshold must be positive"));
        }
        if self.counter_threshold == 0 {
            return Err(BmError::config("stuck counter_threshold must be >= 1"));
        }
        if self.random_min > self.random_max || self.random_min < 0.0 {
            return Err(BmError::config("stuck random probe range is empty or negative"));
        }
        Ok(())
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// Per-agent stuck-tracking state.
///
/// Created on the first [`MovementValidator::check_stuck`] call for an agent
/// and discarded by [`MovementValidator::remove_agent`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StuckRecord {
    pub last_position:       Position,
    /// Last position sampled while the agent was making progress.
    pub last_valid_position: Position,
    pub last_check:          GameTime,
    pub stuck_counter:       u32,
    pub unstuck_attempts:    u32,
    pub total_distance:      f32,
    pub is_stuck:            bool,
}

impl StuckRecord {
    fn new(pos: Position, now: GameTime) -> Self {
        Self {
            last_position:       pos,
            last_valid_position: pos,
            last_check:          now,
            stuck_counter:       0,
            unstuck_attempts:    0,
            total_distance:      0.0,
            is_stuck:            false,
        }
    }
}

/// Result of one stuck sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StuckStatus {
    /// Making progress (or standing still on purpose).
    Clear,
    /// No progress for `counter` consecutive samples, below the threshold.
    Suspect(u32),
    Stuck,
}

/// What a recovery attempt ordered.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RecoveryAction {
    MoveBackward(Position),
    RandomMove(Position),
    Teleport(Position),
}

impl RecoveryAction {
    pub fn destination(self) -> Position {
        match self {
            RecoveryAction::MoveBackward(p) | RecoveryAction::RandomMove(p) | RecoveryAction::Teleport(p) => p,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RecoveryOutcome {
    /// The agent was not flagged as stuck; nothing to do.
    NotStuck,
    /// An action was issued; the stuck flag and counter are cleared.
    Recovered { attempt: u32, action: RecoveryAction },
    /// The attempt cap was reached without a usable action.
    Exhausted { attempts: u32 },
}

// ── Stuck API ─────────────────────────────────────────────────────────────────

impl MovementValidator {
    /// Sample `agent`'s progress at `now`.
    ///
    /// Does nothing (beyond reporting the current status) until
    /// `check_interval_ms` has elapsed since the previous sample.
    pub fn check_stuck(&self, agent: &AgentSnapshot, now: GameTime) -> StuckStatus {
        let cfg = self.stuck_config();
        let pos = agent.position;

        let mut table = write(&self.stuck);
        let rec = table.entry(agent.id).or_insert_with(|| StuckRecord::new(pos, now));

        if now.since(rec.last_check) < cfg.check_interval_ms {
            return status_of(rec);
        }

        let moved = pos.distance(rec.last_position);
        rec.total_distance += moved;
        rec.last_position = pos;
        rec.last_check = now;

        if moved >= cfg.movement_threshold * 2.0 {
            // Real progress clears everything, including the escalation level.
            rec.stuck_counter = 0;
            rec.unstuck_attempts = 0;
            rec.is_stuck = false;
            rec.last_valid_position = pos;
        } else if agent.is_moving && moved < cfg.movement_threshold {
            rec.stuck_counter += 1;
            if rec.stuck_counter >= cfg.counter_threshold && !rec.is_stuck {
                rec.is_stuck = true;
                bump(&self.counters.stuck_detections);
                warn!(agent = %agent.id, position = %pos, samples = rec.stuck_counter, "agent stuck");
            }
        } else {
            rec.stuck_counter = rec.stuck_counter.saturating_sub(1);
            if !rec.is_stuck && moved >= cfg.movement_threshold {
                rec.last_valid_position = pos;
            }
        }
        status_of(rec)
    }

    pub fn is_stuck(&self, agent: AgentId) -> bool {
        read(&self.stuck).get(&agent).is_some_and(|r| r.is_stuck)
    }

    pub fn stuck_record(&self, agent: AgentId) -> Option<StuckRecord> {
        read(&self.stuck).get(&agent).copied()
    }

    /// Drop the stuck flag and counter (escalation level is kept).
    pub fn clear_stuck(&self, agent: AgentId) {
        if let Some(r) = write(&self.stuck).get_mut(&agent) {
            r.is_stuck = false;
            r.stuck_counter = 0;
        }
    }

    /// Forget an agent entirely.
    pub fn remove_agent(&self, agent: AgentId) {
        write(&self.stuck).remove(&agent);
    }

    pub fn tracked_agents(&self) -> usize {
        read(&self.stuck).len()
    }

    /// Try to free a stuck agent.
    ///
    /// Escalates through the attempt tiers starting after the agent's
    /// previous attempt until one produces a destination that validates, or
    /// the cap is reached.  Never loops more than `max_attempts` times.
    pub fn attempt_recovery<H: MovementHost + ?Sized>(
        &self,
        host:  &H,
        agent: &AgentSnapshot,
        rng:   &mut AgentRng,
    ) -> RecoveryOutcome {
        let cfg = self.stuck_config();
        let Some(rec) = self.stuck_record(agent.id) else {
            return RecoveryOutcome::NotStuck;
        };
        if !rec.is_stuck {
            return RecoveryOutcome::NotStuck;
        }

        let mut attempt = rec.unstuck_attempts;
        let mut issued = None;
        while attempt < cfg.max_attempts {
            attempt += 1;
            if let Some(action) = self.plan_recovery(host, agent, &rec, attempt, &cfg, rng) {
                issued = Some(action);
                break;
            }
            debug!(agent = %agent.id, attempt, "recovery attempt found no usable position");
        }

        let Some(action) = issued else {
            if let Some(r) = write(&self.stuck).get_mut(&agent.id) {
                r.unstuck_attempts = attempt;
            }
            bump(&self.counters.recoveries_exhausted);
            warn!(agent = %agent.id, attempts = attempt, "stuck recovery exhausted");
            return RecoveryOutcome::Exhausted { attempts: attempt };
        };

        // Issue the order without holding the stuck table.
        let speed = agent.speed(MoveMode::Run);
        match action {
            RecoveryAction::Teleport(p) => host.teleport(agent.id, p),
            RecoveryAction::MoveBackward(p) | RecoveryAction::RandomMove(p) => {
                host.move_to(agent.id, p, speed, Some(agent.position.o))
            }
        }

        if let Some(r) = write(&self.stuck).get_mut(&agent.id) {
            r.unstuck_attempts = attempt;
            r.is_stuck = false;
            r.stuck_counter = 0;
            if let RecoveryAction::Teleport(p) = action {
                r.last_position = p;
            }
        }
        bump(&self.counters.recoveries);
        debug!(agent = %agent.id, attempt, ?action, "stuck recovery issued");
        RecoveryOutcome::Recovered { attempt, action }
    }

    /// One attempt of the given tier; `None` if it found nothing usable.
    fn plan_recovery<H: MovementHost + ?Sized>(
        &self,
        host:    &H,
        agent:   &AgentSnapshot,
        rec:     &StuckRecord,
        attempt: u32,
        cfg:     &StuckConfig,
        rng:     &mut AgentRng,
    ) -> Option<RecoveryAction> {
        let pos = agent.position;
        let usable = |dest: Position| {
            self.validate_destination(host, agent, pos, dest).is_ok()
                && self.validate_segment(host, agent, pos, dest).is_ok()
        };
        let grounded = |p: Position| {
            let probe = p.with_z(pos.z + 2.0);
            self.ground_under(host, probe).map(|z| p.with_z(z))
        };

        match attempt {
            1..=3 => {
                let dist = cfg.backward_step * attempt as f32;
                let dest = grounded(pos.offset(dist, pos.o + PI))?;
                usable(dest).then_some(RecoveryAction::MoveBackward(dest))
            }
            4..=6 => (0..cfg.random_probes).find_map(|_| {
                let angle = rng.angle();
                let dist = rng.distance(cfg.random_min, cfg.random_max);
                let dest = grounded(pos.offset(dist, angle))?;
                usable(dest).then_some(RecoveryAction::RandomMove(dest))
            }),
            _ => {
                let dest = rec.last_valid_position;
                let far_enough = dest.distance(pos) >= MIN_TELEPORT_DISTANCE;
                let ok = far_enough && self.validate_destination(host, agent, pos, dest).is_ok();
                ok.then_some(RecoveryAction::Teleport(dest))
            }
        }
    }
}

fn status_of(rec: &StuckRecord) -> StuckStatus {
    if rec.is_stuck {
        StuckStatus::Stuck
    } else if rec.stuck_counter > 0 {
        StuckStatus::Suspect(rec.stuck_counter)
    } else {
        StuckStatus::Clear
    }
}
