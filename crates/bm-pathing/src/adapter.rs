//! `PathfindingAdapter`: cache, search, validation and optimization glued
//! into one call.
//!
//! # `calculate_path` flow
//!
//! ```text
//! force_direct ───────────────────────────────────────────▶ [dest] (Shortcut)
//! distance < short threshold and segment clear ──────────▶ [dest] (Shortcut)
//! cache hit ─▶ rejoin at the agent ─▶ validate first leg ─▶ copy of cached path
//! corridor search ─▶ classify ─▶ validate ─▶ optimize ─▶ cache (Normal/Shortcut)
//!        │ error                    │ invalid
//!        └──────────────────────────┴───────────────────▶ NoPath
//! ```

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, trace};

use bm_core::sync::{read, write};
use bm_core::{AgentId, AgentRng, AgentSnapshot, BmError, BmResult, GameTime, MoveMode, MovementHost, Position};
use bm_navmesh::{AStarEngine, CorridorStatus, NavMeshInterface, PathEngine};
use bm_validation::MovementValidator;

use crate::cache::{CacheConfig, PathCache};
use crate::metrics::{PathCounters, PathMetrics, bump};
use crate::optimizer::{OptimizationLevel, OptimizeOutcome, OptimizerParams, PathOptimizer};
use crate::path::{MovementPath, PathNode, PathType};
use crate::planner::{PathOptions, PathPlanner};

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathfindingConfig {
    /// Destinations closer than this get a direct path when the straight
    /// segment validates.
    pub short_path_threshold: f32,
    /// Default search-node budget.
    pub max_search_nodes:     usize,
    /// Overrides every preset's optimization level when set.
    pub optimization_level:   Option<OptimizationLevel>,
    /// Run the validator over searched paths before accepting them.
    pub validate_paths:       bool,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            short_path_threshold: 4.0,
            max_search_nodes:     2_048,
            optimization_level:   None,
            validate_paths:       true,
        }
    }
}

impl PathfindingConfig {
    pub fn validate(&self) -> BmResult<()> {
        if !(self.short_path_threshold >= 0.0) {
            return Err(BmError::config("short_path_threshold must be non-negative"));
        }
        if self.max_search_nodes == 0 {
            return Err(BmError::config("max_search_nodes must be >= 1"));
        }
        Ok(())
    }
}

/// Path computation over a navigation mesh.
///
/// # Type parameter
///
/// `E` is the corridor search used by the wrapped [`NavMeshInterface`].
pub struct PathfindingAdapter<E: PathEngine = AStarEngine> {
    navmesh:   NavMeshInterface<E>,
    validator: Arc<MovementValidator>,
    cache:     PathCache,
    config:    RwLock<PathfindingConfig>,
    counters:  PathCounters,
}

impl<E: PathEngine> PathfindingAdapter<E> {
    pub fn new(navmesh: NavMeshInterface<E>, validator: Arc<MovementValidator>) -> Self {
        Self {
            navmesh,
            validator,
            cache: PathCache::default(),
            config: RwLock::new(PathfindingConfig::default()),
            counters: PathCounters::default(),
        }
    }

    pub fn with_config(self, config: PathfindingConfig) -> BmResult<Self> {
        self.set_config(config)?;
        Ok(self)
    }

    pub fn with_cache_config(self, config: CacheConfig) -> BmResult<Self> {
        self.cache.set_config(config)?;
        Ok(self)
    }

    pub fn config(&self) -> PathfindingConfig {
        *read(&self.config)
    }

    pub fn set_config(&self, config: PathfindingConfig) -> BmResult<()> {
        config.validate()?;
        *write(&self.config) = config;
        Ok(())
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn navmesh(&self) -> &NavMeshInterface<E> {
        &self.navmesh
    }

    pub fn shared_validator(&self) -> &Arc<MovementValidator> {
        &self.validator
    }

    /// See the module docs for the flow.  `host` may be any host type; the
    /// [`PathPlanner`] impl forwards here with a `&dyn MovementHost`.
    pub fn calculate<H: MovementHost + ?Sized>(
        &self,
        host:  &H,
        agent: &AgentSnapshot,
        dest:  Position,
        opts:  &PathOptions,
        now:   GameTime,
    ) -> MovementPath {
        let started = Instant::now();
        let cfg = self.config();
        let from = agent.position;
        let speed = opts.speed.unwrap_or_else(|| agent.speed(MoveMode::Run));

        if !dest.is_finite() {
            bump(&self.counters.no_path);
            return MovementPath::no_path();
        }

        let short = from.distance(dest) < cfg.short_path_threshold;
        if opts.force_direct || (short && self.validator.validate_segment(host, agent, from, dest).is_ok()) {
            let mut path = MovementPath::direct(from, dest, speed, host.terrain_at(dest));
            path.generation_cost_us = elapsed_us(started);
            bump(&self.counters.direct_paths);
            self.counters.record_generated(path.total_length, path.generation_cost_us);
            trace!(agent = %agent.id, %dest, forced = opts.force_direct, "direct path");
            return path;
        }

        if opts.use_cache {
            let rejoined = self.cache.get_with(agent.id, dest, now, |cached| {
                let mut path = cached.clone();
                if path.rejoin(from) {
                    let lead = path.nodes.get(1)?.position;
                    if let Err(e) = self.validator.validate_segment(host, agent, from, lead) {
                        debug!(agent = %agent.id, %dest, reason = %e, "cached path unreachable from here");
                        return None;
                    }
                }
                Some(path)
            });
            if let Some(path) = rejoined {
                debug!(agent = %agent.id, %dest, nodes = path.len(), "path cache hit");
                return path;
            }
            self.cache.sweep(now);
        }

        let mut path = match self.search(host, from, dest, speed, opts.max_nodes.unwrap_or(cfg.max_search_nodes)) {
            Some(p) => p,
            None => {
                bump(&self.counters.no_path);
                return failed(started);
            }
        };

        if cfg.validate_paths {
            if let Err(e) = self.validator.validate_path(host, agent, &path.points()) {
                bump(&self.counters.validation_failures);
                bump(&self.counters.no_path);
                debug!(agent = %agent.id, %dest, reason = %e, "searched path failed validation");
                return failed(started);
            }
        }

        if opts.optimize {
            let mut params = OptimizerParams::preset(opts.preset);
            if let Some(level) = cfg.optimization_level {
                params = params.with_level(level);
            }
            let check = |a: Position, b: Position| self.validator.validate_segment(host, agent, a, b).is_ok();
            match PathOptimizer::new(params).optimize(&mut path, &check) {
                OptimizeOutcome::Applied => bump(&self.counters.optimizations_applied),
                OptimizeOutcome::Reverted => bump(&self.counters.optimizations_reverted),
                OptimizeOutcome::Skipped => {}
            }
        }

        path.generation_cost_us = elapsed_us(started);
        self.counters.record_generated(path.total_length, path.generation_cost_us);
        if path.path_type == PathType::Incomplete {
            bump(&self.counters.incomplete_paths);
        }
        if opts.use_cache && matches!(path.path_type, PathType::Normal | PathType::Shortcut) {
            self.cache.insert(agent.id, dest, &path, now);
        }

        debug!(
            agent = %agent.id,
            %dest,
            kind = ?path.path_type,
            nodes = path.len(),
            length = path.total_length,
            cost_us = path.generation_cost_us,
            "path generated",
        );
        path
    }

    /// Corridor search converted to nodes; `None` on any search error.
    fn search<H: MovementHost + ?Sized>(
        &self,
        host:      &H,
        from:      Position,
        dest:      Position,
        speed:     f32,
        max_nodes: usize,
    ) -> Option<MovementPath> {
        let found = match self.navmesh.find_path(from, dest, max_nodes) {
            Ok(found) => found,
            Err(e) => {
                debug!(%from, %dest, error = %e, "corridor search failed");
                return None;
            }
        };
        if found.points.is_empty() {
            return None;
        }
        let path_type = match found.status {
            CorridorStatus::Complete if found.corridor_len <= 1 => PathType::Shortcut,
            CorridorStatus::Complete => PathType::Normal,
            CorridorStatus::Partial => PathType::Incomplete,
        };
        let nodes = found
            .points
            .into_iter()
            .map(|p| PathNode::new(p, speed, host.terrain_at(p)))
            .collect();
        Some(MovementPath::from_nodes(nodes, path_type))
    }
}

fn elapsed_us(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}

fn failed(started: Instant) -> MovementPath {
    MovementPath { generation_cost_us: elapsed_us(started), ..MovementPath::no_path() }
}

impl<E: PathEngine> PathPlanner for PathfindingAdapter<E> {
    fn calculate_path(
        &self,
        host:  &dyn MovementHost,
        agent: &AgentSnapshot,
        dest:  Position,
        opts:  &PathOptions,
        now:   GameTime,
    ) -> MovementPath {
        self.calculate(host, agent, dest, opts, now)
    }

    fn validator(&self) -> &MovementValidator {
        &self.validator
    }

    fn random_point(
        &self,
        host:   &dyn MovementHost,
        centre: Position,
        radius: f32,
        rng:    &mut AgentRng,
    ) -> Option<Position> {
        let p = self.navmesh.random_point(centre, radius, rng.inner())?;
        // The mesh height may sit slightly off the host's ground.
        Some(crate::planner::ground_point(host, &self.validator, p))
    }

    fn forget_agent(&self, agent: AgentId) {
        let removed = self.cache.remove_agent(agent);
        trace!(agent = %agent, removed, "cache entries dropped");
    }

    fn maintain(&self, now: GameTime) {
        self.cache.sweep(now);
    }

    fn metrics(&self) -> PathMetrics {
        self.counters.snapshot(self.cache.stats())
    }
}
