//! `MovementManager`: per-agent generator ownership, the command API and the
//! scheduled update loop.
//!
//! # Update flow for one agent
//!
//! ```text
//! due? ──no──▶ skipped
//!  │yes
//!  ▼
//! retry pending ─▶ recovery grace? ──yes──▶ InProgress
//!                        │no
//!                        ▼
//!                  active.update ─┬─ InProgress / persistent Success ─▶ keep
//!                                 ├─ Stuck ─▶ attempt_recovery ─┬─ Recovered ─▶ reset + grace
//!                                 │                             ├─ NotStuck  ─▶ reset
//!                                 │                             └─ Exhausted ─▶ finish
//!                                 └─ anything else ─▶ finish (pending or Idle takes over)
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use bm_behavior::{GeneratorContext, GeneratorKind, IdleGenerator, MovementGenerator, MovementRequest, MovementResult};
use bm_core::sync::{lock, read, write};
use bm_core::{
    AgentId, AgentRng, AgentSnapshot, FormationPosition, FormationType, GameTime, MoveMode, MovementHost, Position,
    calculate_formation_position,
};
use bm_navmesh::PathEngine;
use bm_pathing::{CacheConfig, OptimizationLevel, PathPlanner, PathfindingAdapter, PathfindingConfig};
use bm_validation::{RecoveryOutcome, StuckConfig, ValidatorConfig};

use crate::metrics::{ManagerCounters, bump};
use crate::slot::AgentSlot;
use crate::{
    CommandResult, ManagerConfig, ManagerError, ManagerResult, MovementMetrics, MovementObserver, MovementState,
    RejectReason, SchedulerConfig,
};

#[cfg(feature = "fx-hash")]
type Map<K, V> = rustc_hash::FxHashMap<K, V>;
#[cfg(not(feature = "fx-hash"))]
type Map<K, V> = std::collections::HashMap<K, V>;

type SlotRef = Arc<Mutex<AgentSlot>>;

/// Followers of one leader and the shape they hold.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    /// In slot order; never contains the leader.
    pub members:   Vec<AgentId>,
    pub formation: FormationType,
}

/// What one agent update produced.
#[derive(Copy, Clone, Debug)]
struct UpdateOutcome {
    result: MovementResult,
    /// Kind of the generator that ended during this update, if one did.
    ended:  Option<GeneratorKind>,
}

impl UpdateOutcome {
    fn kept(result: MovementResult) -> Self {
        Self { result, ended: None }
    }
}

/// Owns every registered agent's generators and drives them on a schedule.
///
/// All methods take `&self`; the agent table, the group table and each agent
/// record sit behind their own locks, so commands may be issued from any
/// thread while a tick is running.
///
/// # Type parameters
///
/// * `H`: the game-side host; positions and move orders go through it.
/// * `P`: the path planner shared by every generator.
pub struct MovementManager<H: MovementHost, P: PathPlanner = PathfindingAdapter> {
    host:              Arc<H>,
    planner:           P,
    scheduler:         RwLock<SchedulerConfig>,
    seed:              u64,
    formation_spacing: f32,
    agents:            RwLock<Map<AgentId, SlotRef>>,
    groups:            RwLock<Map<AgentId, Group>>,
    /// Round-robin position for ticks that cannot update every agent.
    cursor:            AtomicUsize,
    counters:          ManagerCounters,
}

impl<H: MovementHost, P: PathPlanner> MovementManager<H, P> {
    pub(crate) fn from_parts(host: Arc<H>, planner: P, config: &ManagerConfig) -> Self {
        Self {
            host,
            planner,
            scheduler: RwLock::new(config.scheduler),
            seed: config.seed,
            formation_spacing: config.formation_spacing,
            agents: RwLock::new(Map::default()),
            groups: RwLock::new(Map::default()),
            cursor: AtomicUsize::new(0),
            counters: ManagerCounters::default(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        *read(&self.scheduler)
    }

    pub fn formation_spacing(&self) -> f32 {
        self.formation_spacing
    }

    pub fn agent_count(&self) -> usize {
        read(&self.agents).len()
    }

    /// Registered agents in ascending id order.
    pub fn agents(&self) -> Vec<AgentId> {
        self.slots_sorted().into_iter().map(|(id, _)| id).collect()
    }

    fn slot(&self, agent: AgentId) -> Option<SlotRef> {
        read(&self.agents).get(&agent).cloned()
    }

    fn slots_sorted(&self) -> Vec<(AgentId, SlotRef)> {
        let mut all: Vec<_> = read(&self.agents).iter().map(|(id, s)| (*id, Arc::clone(s))).collect();
        all.sort_unstable_by_key(|(id, _)| *id);
        all
    }

    fn ctx(&self, now: GameTime, dt_ms: u32) -> GeneratorContext<'_> {
        GeneratorContext::new(&*self.host, &self.planner, now, dt_ms)
    }

    // ── Registration ─────────────────────────────────────────────────────

    /// Register `agent` with an idle generator.  The host must know it.
    pub fn add_agent(&self, agent: AgentId) -> ManagerResult<()> {
        let snap = self.host.snapshot(agent).ok_or(ManagerError::UnknownAgent(agent))?;
        let mut table = write(&self.agents);
        if table.contains_key(&agent) {
            return Err(ManagerError::AlreadyRegistered(agent));
        }
        let slot = AgentSlot::new(AgentRng::new(self.seed, agent), MovementState::new(snap.position));
        table.insert(agent, Arc::new(Mutex::new(slot)));
        debug!(agent = %agent, position = %snap.position, "agent registered");
        Ok(())
    }

    /// Unregister `agent`, finalizing its generator and dropping its stuck
    /// record, cached paths and group memberships.  `false` if unknown.
    pub fn remove_agent(&self, agent: AgentId, now: GameTime) -> bool {
        let Some(slot) = write(&self.agents).remove(&agent) else {
            return false;
        };
        {
            let mut guard = lock(&slot);
            if let Some(snap) = self.host.snapshot(agent) {
                let ctx = self.ctx(now, 0);
                guard.active.finalize(&snap, &ctx, true);
            }
            guard.pending = None;
        }
        self.planner.validator().remove_agent(agent);
        self.planner.forget_agent(agent);

        let mut groups = write(&self.groups);
        groups.remove(&agent);
        for group in groups.values_mut() {
            group.members.retain(|m| *m != agent);
        }
        debug!(agent = %agent, "agent unregistered");
        true
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Apply one movement request to `agent`.
    ///
    /// The new generator initializes first; a refusal rejects the command and
    /// leaves the active generator untouched.  It then replaces the active
    /// generator if that one allows the interruption, is queued if it
    /// outranks a generator that refuses, and is rejected otherwise.
    pub fn issue(&self, agent: AgentId, request: MovementRequest, now: GameTime) -> CommandResult {
        let kind = request.kind();
        let result = self.issue_inner(agent, request, now);
        match &result {
            CommandResult::Accepted => bump(&self.counters.commands_accepted),
            CommandResult::Queued => bump(&self.counters.commands_queued),
            CommandResult::Rejected(reason) => {
                bump(&self.counters.commands_rejected);
                debug!(agent = %agent, %kind, %reason, "command rejected");
            }
        }
        result
    }

    fn issue_inner(&self, agent: AgentId, request: MovementRequest, now: GameTime) -> CommandResult {
        let Some(slot) = self.slot(agent) else {
            return CommandResult::Rejected(RejectReason::UnknownAgent);
        };
        let Some(snap) = self.host.snapshot(agent) else {
            return CommandResult::Rejected(RejectReason::UnknownAgent);
        };
        let generator = match request.into_generator() {
            Ok(g) => g,
            Err(e) => return CommandResult::Rejected(RejectReason::InvalidRequest(e.to_string())),
        };
        let mut guard = lock(&slot);
        self.install(agent, &mut guard, &snap, generator, now)
    }

    /// The switch itself; shared by commands and pending retries.
    fn install(
        &self,
        agent: AgentId,
        slot:  &mut AgentSlot,
        snap:  &AgentSnapshot,
        mut new: Box<dyn MovementGenerator>,
        now:   GameTime,
    ) -> CommandResult {
        let (kind, priority) = (new.kind(), new.priority());
        let ctx = self.ctx(now, 0);
        if let Err(code) = new.initialize(snap, &ctx) {
            return CommandResult::Rejected(RejectReason::Initialization(code));
        }

        if !slot.active.can_be_interrupted(kind, priority) {
            if priority > slot.active.priority() {
                debug!(agent = %agent, active = %slot.active.kind(), queued = %kind, "command queued");
                slot.pending = Some(new);
                slot.state.needs_recalculation = true;
                return CommandResult::Queued;
            }
            return CommandResult::Rejected(RejectReason::LowerPriority);
        }

        let mut old = std::mem::replace(&mut slot.active, new);
        old.on_interrupted(snap, kind);
        old.finalize(snap, &ctx, true);
        self.retire(agent, slot, old.kind(), kind);
        slot.hold_until = None;
        slot.state.last_result = MovementResult::InProgress;
        slot.state.needs_recalculation = true;
        self.refresh_state(agent, slot, snap);
        CommandResult::Accepted
    }

    fn retire(&self, agent: AgentId, slot: &mut AgentSlot, from: GeneratorKind, to: GeneratorKind) {
        slot.push_history(from, self.scheduler_config().history_len);
        bump(&self.counters.generator_switches);
        debug!(agent = %agent, %from, %to, "generator switch");
    }

    pub fn move_to_point(&self, agent: AgentId, dest: Position, speed: Option<f32>, now: GameTime) -> CommandResult {
        let mut request = MovementRequest::point(dest);
        if let Some(speed) = speed {
            request = request.with_speed(speed);
        }
        self.issue(agent, request, now)
    }

    pub fn follow(
        &self,
        agent:        AgentId,
        target:       AgentId,
        min_distance: f32,
        max_distance: f32,
        angle:        Option<f32>,
        now:          GameTime,
    ) -> CommandResult {
        self.issue(agent, MovementRequest::follow(target, min_distance, max_distance, angle), now)
    }

    pub fn flee(&self, agent: AgentId, threat: AgentId, distance: f32, now: GameTime) -> CommandResult {
        self.issue(agent, MovementRequest::flee(threat, distance), now)
    }

    pub fn chase(
        &self,
        agent:  AgentId,
        target: AgentId,
        range:  Option<f32>,
        angle:  Option<f32>,
        now:    GameTime,
    ) -> CommandResult {
        self.issue(agent, MovementRequest::chase(target, range, angle), now)
    }

    /// Wander around the agent's current position.
    pub fn wander(&self, agent: AgentId, radius: f32, duration_ms: Option<u64>, now: GameTime) -> CommandResult {
        self.issue(agent, MovementRequest::wander(None, radius, duration_ms), now)
    }

    /// Hold `slot` of a `formation` led by `leader`.  The slot count comes
    /// from the leader's group when it has one.
    pub fn move_in_formation(
        &self,
        agent:     AgentId,
        leader:    AgentId,
        formation: FormationType,
        slot:      usize,
        now:       GameTime,
    ) -> CommandResult {
        let total = read(&self.groups)
            .get(&leader)
            .map_or(slot + 1, |g| g.members.len().max(slot + 1));
        let position = calculate_formation_position(formation, slot, total, self.formation_spacing);
        self.issue(agent, MovementRequest::formation(leader, position), now)
    }

    pub fn patrol(&self, agent: AgentId, waypoints: Vec<Position>, cyclic: bool, now: GameTime) -> CommandResult {
        self.issue(agent, MovementRequest::patrol(waypoints, cyclic), now)
    }

    /// Stop the agent and fall back to idle, overriding any priority.
    /// `clear_all` also drops the pending generator and the history.
    pub fn stop_movement(&self, agent: AgentId, clear_all: bool, now: GameTime) -> CommandResult {
        let Some(slot) = self.slot(agent) else {
            return CommandResult::Rejected(RejectReason::UnknownAgent);
        };
        let mut guard = lock(&slot);
        let slot = &mut *guard;

        let mut old = std::mem::replace(&mut slot.active, Box::new(IdleGenerator::new()));
        if let Some(snap) = self.host.snapshot(agent) {
            let ctx = self.ctx(now, 0);
            old.on_interrupted(&snap, GeneratorKind::Idle);
            old.finalize(&snap, &ctx, true);
        }
        self.host.stop(agent);
        if old.kind() != GeneratorKind::Idle {
            self.retire(agent, slot, old.kind(), GeneratorKind::Idle);
        }
        if clear_all {
            slot.pending = None;
            slot.history.clear();
        }
        slot.hold_until = None;
        slot.state.last_result = MovementResult::Cancelled;
        if let Some(snap) = self.host.snapshot(agent) {
            self.refresh_state(agent, slot, &snap);
        }
        bump(&self.counters.commands_accepted);
        CommandResult::Accepted
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// As of the agent's last update or command.
    pub fn is_moving(&self, agent: AgentId) -> bool {
        self.slot(agent).is_some_and(|s| lock(&s).state.is_moving)
    }

    pub fn movement_state(&self, agent: AgentId) -> Option<MovementState> {
        self.slot(agent).map(|s| lock(&s).state)
    }

    pub fn current_generator(&self, agent: AgentId) -> Option<GeneratorKind> {
        self.slot(agent).map(|s| lock(&s).active.kind())
    }

    pub fn pending_generator(&self, agent: AgentId) -> Option<GeneratorKind> {
        self.slot(agent).and_then(|s| lock(&s).pending.as_ref().map(|g| g.kind()))
    }

    /// Previously active generator kinds, oldest first.
    pub fn history(&self, agent: AgentId) -> Vec<GeneratorKind> {
        self.slot(agent).map_or_else(Vec::new, |s| lock(&s).history.iter().copied().collect())
    }

    /// Every agent's state in ascending agent order.
    pub fn states(&self) -> Vec<(AgentId, MovementState)> {
        self.slots_sorted().into_iter().map(|(id, s)| (id, lock(&s).state)).collect()
    }

    // ── Updates ──────────────────────────────────────────────────────────

    /// Update one agent if its interval has elapsed.  `None` when skipped or
    /// unknown.
    pub fn update_movement(&self, agent: AgentId, now: GameTime) -> Option<MovementResult> {
        let slot = self.slot(agent)?;
        let mut guard = lock(&slot);
        self.update_slot(agent, &mut guard, now, false).map(|o| o.result)
    }

    /// One scheduler tick: update up to `max_agents_per_tick` due agents in
    /// round-robin order, run planner maintenance and, when due, emit a
    /// metrics snapshot.  Returns the number of agents actually updated.
    pub fn update_all<O: MovementObserver>(&self, now: GameTime, observer: &mut O) -> usize {
        observer.on_tick_start(now);
        let cfg = self.scheduler_config();
        let batch = self.next_batch(self.slots_sorted(), cfg.max_agents_per_tick);
        let outcomes = self.run_batch(&batch, now);

        let mut updated = 0;
        for (agent, outcome) in outcomes {
            let Some(outcome) = outcome else { continue };
            updated += 1;
            if let Some(kind) = outcome.ended {
                observer.on_result(now, agent, kind, outcome.result);
            }
        }

        self.planner.maintain(now);

        if self.counters.snapshot_due(now, cfg.metrics_interval_ms) {
            let (states, throttled) = self.collect();
            let metrics = self.assemble_metrics(now, &states, throttled);
            trace!(
                at = %now,
                agents = metrics.agents,
                moving = metrics.moving_agents,
                throttled = metrics.throttled_agents,
                avg_update_us = metrics.average_update_us,
                "metrics snapshot",
            );
            observer.on_snapshot(now, &metrics, &states);
        }

        observer.on_tick_end(now, updated);
        updated
    }

    /// The slice of `all` this tick covers.
    fn next_batch(&self, all: Vec<(AgentId, SlotRef)>, quota: usize) -> Vec<(AgentId, SlotRef)> {
        let len = all.len();
        if len <= quota {
            return all;
        }
        let start = self.cursor.load(Ordering::Relaxed) % len;
        self.cursor.store((start + quota) % len, Ordering::Relaxed);
        all.into_iter().cycle().skip(start).take(quota).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn run_batch(&self, batch: &[(AgentId, SlotRef)], now: GameTime) -> Vec<(AgentId, Option<UpdateOutcome>)> {
        batch
            .iter()
            .map(|(id, slot)| (*id, self.update_slot(*id, &mut lock(slot), now, false)))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn run_batch(&self, batch: &[(AgentId, SlotRef)], now: GameTime) -> Vec<(AgentId, Option<UpdateOutcome>)> {
        use rayon::prelude::*;
        batch
            .par_iter()
            .map(|(id, slot)| (*id, self.update_slot(*id, &mut lock(slot), now, false)))
            .collect()
    }

    /// Everything one agent update does.  `force` ignores the interval.
    fn update_slot(&self, agent: AgentId, slot: &mut AgentSlot, now: GameTime, force: bool) -> Option<UpdateOutcome> {
        let cfg = self.scheduler_config();
        if !force && !slot.is_due(now, &cfg) {
            bump(&self.counters.updates_skipped);
            return None;
        }
        let Some(snap) = self.host.snapshot(agent) else {
            bump(&self.counters.updates_skipped);
            return None;
        };

        let started = Instant::now();
        let dt_ms = slot.last_update.map_or(0, |t| u32::try_from(now.since(t)).unwrap_or(u32::MAX));
        slot.last_update = Some(now);
        slot.state.needs_recalculation = false;
        slot.in_combat = snap.in_combat;
        let ctx = self.ctx(now, dt_ms);

        self.retry_pending(agent, slot, &snap, now);

        let outcome = if slot.hold_until.is_some_and(|t| now < t) {
            trace!(agent = %agent, "holding for stuck recovery");
            UpdateOutcome::kept(MovementResult::InProgress)
        } else {
            slot.hold_until = None;
            let result = slot.active.update(&snap, &ctx, &mut slot.rng);
            self.handle_result(agent, slot, &snap, &ctx, &cfg, result)
        };

        let cost_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.counters.update_us.fetch_add(cost_us, Ordering::Relaxed);
        bump(&self.counters.updates_run);
        if slot.account(cost_us, &cfg) {
            bump(&self.counters.budget_overruns);
            warn!(agent = %agent, cost_us, throttle_ms = slot.throttle_ms, "update over cpu budget");
        }

        slot.state.last_result = outcome.result;
        let after = self.host.snapshot(agent).unwrap_or(snap);
        self.refresh_state(agent, slot, &after);
        Some(outcome)
    }

    fn handle_result(
        &self,
        agent:  AgentId,
        slot:   &mut AgentSlot,
        snap:   &AgentSnapshot,
        ctx:    &GeneratorContext<'_>,
        cfg:    &SchedulerConfig,
        result: MovementResult,
    ) -> UpdateOutcome {
        match result {
            MovementResult::InProgress => UpdateOutcome::kept(result),
            MovementResult::Success if slot.active.kind().is_persistent() => UpdateOutcome::kept(result),
            MovementResult::Stuck => self.recover(agent, slot, snap, ctx, cfg),
            _ => {
                let kind = self.finish(agent, slot, snap, ctx, result);
                UpdateOutcome { result, ended: Some(kind) }
            }
        }
    }

    fn recover(
        &self,
        agent: AgentId,
        slot:  &mut AgentSlot,
        snap:  &AgentSnapshot,
        ctx:   &GeneratorContext<'_>,
        cfg:   &SchedulerConfig,
    ) -> UpdateOutcome {
        let validator = self.planner.validator();
        match validator.attempt_recovery(&*self.host, snap, &mut slot.rng) {
            RecoveryOutcome::Recovered { attempt, action } => {
                info!(agent = %agent, kind = %slot.active.kind(), attempt, ?action, "agent unstuck");
                slot.active.reset(snap, ctx);
                slot.hold_until = Some(ctx.now + cfg.recovery_grace_ms);
                UpdateOutcome::kept(MovementResult::Stuck)
            }
            RecoveryOutcome::NotStuck => {
                slot.active.reset(snap, ctx);
                UpdateOutcome::kept(MovementResult::InProgress)
            }
            RecoveryOutcome::Exhausted { attempts } => {
                warn!(agent = %agent, kind = %slot.active.kind(), attempts, "abandoning generator after failed recovery");
                validator.remove_agent(agent);
                let kind = self.finish(agent, slot, snap, ctx, MovementResult::Stuck);
                UpdateOutcome { result: MovementResult::Stuck, ended: Some(kind) }
            }
        }
    }

    /// End the active generator; the pending one (if it initializes) or an
    /// idle generator takes its place.
    fn finish(
        &self,
        agent:  AgentId,
        slot:   &mut AgentSlot,
        snap:   &AgentSnapshot,
        ctx:    &GeneratorContext<'_>,
        result: MovementResult,
    ) -> GeneratorKind {
        let mut old = std::mem::replace(&mut slot.active, Box::new(IdleGenerator::new()));
        old.finalize(snap, ctx, false);
        let kind = old.kind();
        slot.push_history(kind, self.scheduler_config().history_len);
        slot.hold_until = None;
        debug!(agent = %agent, %kind, %result, "generator finished");
        self.retry_pending(agent, slot, snap, ctx.now);
        kind
    }

    fn retry_pending(&self, agent: AgentId, slot: &mut AgentSlot, snap: &AgentSnapshot, now: GameTime) {
        let Some(pending) = slot.pending.take() else {
            return;
        };
        match self.install(agent, slot, snap, pending, now) {
            CommandResult::Accepted => debug!(agent = %agent, kind = %slot.active.kind(), "pending generator installed"),
            CommandResult::Queued => {}
            CommandResult::Rejected(reason) => debug!(agent = %agent, %reason, "pending generator dropped"),
        }
    }

    fn refresh_state(&self, agent: AgentId, slot: &mut AgentSlot, snap: &AgentSnapshot) {
        let stuck_counter = self.planner.validator().stuck_record(agent).map_or(0, |r| r.stuck_counter);
        let active = &slot.active;
        let state = &mut slot.state;
        state.generator = active.kind();
        state.priority = active.priority();
        state.target = active.target();
        state.target_position = active.destination();
        state.position = snap.position;
        state.is_moving = snap.is_moving;
        state.speed = if snap.is_moving {
            active.speed().unwrap_or_else(|| snap.speed(MoveMode::Run))
        } else {
            0.0
        };
        state.stuck_counter = stuck_counter;
    }

    /// Tell generators tracking `target` where it is now.  Returns how many
    /// agents were notified; each is updated on the next tick regardless of
    /// its interval.
    pub fn notify_target_moved(&self, target: AgentId, new_position: Position) -> usize {
        let mut notified = 0;
        for (id, slot) in self.slots_sorted() {
            if id == target {
                continue;
            }
            let mut guard = lock(&slot);
            if guard.active.target() != Some(target) {
                continue;
            }
            if let Some(snap) = self.host.snapshot(id) {
                guard.active.on_target_moved(&snap, new_position);
            }
            guard.state.needs_recalculation = true;
            notified += 1;
        }
        trace!(target = %target, notified, "target moved");
        notified
    }

    // ── Groups ───────────────────────────────────────────────────────────

    pub fn group(&self, leader: AgentId) -> Option<Group> {
        read(&self.groups).get(&leader).cloned()
    }

    /// Forget `leader`'s group.  Members keep their current generators.
    pub fn clear_group(&self, leader: AgentId) -> bool {
        write(&self.groups).remove(&leader).is_some()
    }

    /// Make `members` (the leader is skipped if listed) a formation behind
    /// `leader`.  Members already holding a slot for this leader are moved
    /// to their new slot in place; the rest get a formation command.
    pub fn set_group_formation(
        &self,
        leader:    AgentId,
        members:   &[AgentId],
        formation: FormationType,
        now:       GameTime,
    ) -> Vec<(AgentId, CommandResult)> {
        let mut followers: Vec<AgentId> = Vec::with_capacity(members.len());
        for &m in members {
            if m != leader && !followers.contains(&m) {
                followers.push(m);
            }
        }
        write(&self.groups).insert(leader, Group { members: followers.clone(), formation });
        info!(leader = %leader, members = followers.len(), ?formation, "group formation set");

        let total = followers.len();
        followers
            .iter()
            .enumerate()
            .map(|(i, &member)| {
                let slot = calculate_formation_position(formation, i, total, self.formation_spacing);
                (member, self.assign_slot(member, leader, slot, now))
            })
            .collect()
    }

    fn assign_slot(
        &self,
        member: AgentId,
        leader: AgentId,
        slot:   FormationPosition,
        now:    GameTime,
    ) -> CommandResult {
        if let Some(s) = self.slot(member) {
            let mut guard = lock(&s);
            if guard.active.kind() == GeneratorKind::Formation
                && guard.active.target() == Some(leader)
                && guard.active.set_formation_slot(slot)
            {
                guard.state.needs_recalculation = true;
                return CommandResult::Accepted;
            }
        }
        self.issue(member, MovementRequest::formation(leader, slot), now)
    }

    /// Update the leader and then `members` immediately, ignoring their
    /// intervals, so followers plan against the leader's latest position.
    /// Returns the number of agents updated.
    pub fn update_group_movement(&self, leader: AgentId, members: &[AgentId], now: GameTime) -> usize {
        let mut updated = 0;
        if let Some(slot) = self.slot(leader) {
            let mut guard = lock(&slot);
            updated += usize::from(self.update_slot(leader, &mut guard, now, true).is_some());
        }
        let Some(lead) = self.host.snapshot(leader) else {
            return updated;
        };
        for &member in members.iter().filter(|m| **m != leader) {
            let Some(slot) = self.slot(member) else { continue };
            let mut guard = lock(&slot);
            if guard.active.target() == Some(leader) {
                if let Some(snap) = self.host.snapshot(member) {
                    guard.active.on_target_moved(&snap, lead.position);
                }
            }
            updated += usize::from(self.update_slot(member, &mut guard, now, true).is_some());
        }
        updated
    }

    /// Send a group to `dest`.
    ///
    /// With `maintain_formation` the first member walks to `dest` and the
    /// rest fall in behind it using its group's formation (column if it has
    /// none).  Without it every member gets its own point around `dest`.
    pub fn move_group_to_position(
        &self,
        members:            &[AgentId],
        dest:               Position,
        maintain_formation: bool,
        now:                GameTime,
    ) -> Vec<(AgentId, CommandResult)> {
        let Some((&leader, rest)) = members.split_first() else {
            return Vec::new();
        };
        if maintain_formation {
            let formation = read(&self.groups).get(&leader).map_or_else(FormationType::default, |g| g.formation);
            let mut results = vec![(leader, self.move_to_point(leader, dest, None, now))];
            results.extend(self.set_group_formation(leader, rest, formation, now));
            return results;
        }

        let total = members.len();
        members
            .iter()
            .enumerate()
            .map(|(i, &member)| {
                let spot = if total == 1 {
                    dest
                } else {
                    calculate_formation_position(FormationType::Circle, i, total, self.formation_spacing)
                        .world_point(dest)
                };
                (member, self.move_to_point(member, spot, None, now))
            })
            .collect()
    }

    // ── Configuration ────────────────────────────────────────────────────

    pub fn set_scheduler_config(&self, config: SchedulerConfig) -> ManagerResult<()> {
        config.validate()?;
        *write(&self.scheduler) = config;
        Ok(())
    }

    pub fn set_max_agents_per_tick(&self, max: usize) -> ManagerResult<()> {
        let config = SchedulerConfig { max_agents_per_tick: max, ..self.scheduler_config() };
        self.set_scheduler_config(config)
    }

    pub fn set_validator_config(&self, config: ValidatorConfig) -> ManagerResult<()> {
        Ok(self.planner.validator().set_config(config)?)
    }

    pub fn set_stuck_config(&self, config: StuckConfig) -> ManagerResult<()> {
        Ok(self.planner.validator().set_stuck_config(config)?)
    }

    // ── Metrics and shutdown ─────────────────────────────────────────────

    fn collect(&self) -> (Vec<(AgentId, MovementState)>, usize) {
        let mut throttled = 0;
        let states = self
            .slots_sorted()
            .into_iter()
            .map(|(id, s)| {
                let guard = lock(&s);
                throttled += usize::from(guard.throttle_ms > 0);
                (id, guard.state)
            })
            .collect();
        (states, throttled)
    }

    fn assemble_metrics(&self, now: GameTime, states: &[(AgentId, MovementState)], throttled: usize) -> MovementMetrics {
        let mut m = MovementMetrics {
            at: now,
            agents: states.len(),
            moving_agents: states.iter().filter(|(_, s)| s.is_moving).count(),
            throttled_agents: throttled,
            paths: self.planner.metrics(),
            validation: self.planner.validator().stats(),
            ..MovementMetrics::default()
        };
        self.counters.fill(&mut m);
        m
    }

    pub fn metrics(&self, now: GameTime) -> MovementMetrics {
        let (states, throttled) = self.collect();
        self.assemble_metrics(now, &states, throttled)
    }

    /// Interrupt every generator, stop every agent and tell the observer.
    /// Agents stay registered (idle).
    pub fn shutdown<O: MovementObserver>(&self, now: GameTime, observer: &mut O) {
        let ctx = self.ctx(now, 0);
        for (id, slot) in self.slots_sorted() {
            let mut guard = lock(&slot);
            let mut old = std::mem::replace(&mut guard.active, Box::new(IdleGenerator::new()));
            if let Some(snap) = self.host.snapshot(id) {
                old.on_interrupted(&snap, GeneratorKind::Idle);
                old.finalize(&snap, &ctx, true);
            }
            guard.pending = None;
            guard.hold_until = None;
            self.host.stop(id);
            guard.state.generator = GeneratorKind::Idle;
            guard.state.is_moving = false;
            guard.state.speed = 0.0;
        }
        let m = self.metrics(now);
        info!(
            at = %now,
            agents = m.agents,
            accepted = m.commands_accepted,
            rejected = m.commands_rejected,
            updates = m.updates_run,
            paths = m.paths.paths_generated,
            "movement manager shut down",
        );
        observer.on_shutdown(now);
    }
}

impl<H: MovementHost, E: PathEngine> MovementManager<H, PathfindingAdapter<E>> {
    pub fn set_pathfinding_config(&self, config: PathfindingConfig) -> ManagerResult<()> {
        Ok(self.planner.set_config(config)?)
    }

    pub fn set_cache_config(&self, config: CacheConfig) -> ManagerResult<()> {
        Ok(self.planner.cache().set_config(config)?)
    }

    /// Override every preset's optimization level; `None` restores presets.
    pub fn set_optimization_level(&self, level: Option<OptimizationLevel>) -> ManagerResult<()> {
        let config = PathfindingConfig { optimization_level: level, ..self.planner.config() };
        self.set_pathfinding_config(config)
    }
}
