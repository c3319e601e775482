//! Fluent builder for constructing a [`MovementManager`].

use std::sync::Arc;

use tracing::{info, warn};

use bm_core::MovementHost;
use bm_navmesh::NavMeshInterface;
use bm_pathing::{PathPlanner, PathfindingAdapter};
use bm_validation::MovementValidator;

use crate::{ManagerConfig, ManagerResult, MovementManager};

/// Fluent builder for [`MovementManager<H, P>`].
///
/// # Required inputs
///
/// - `Arc<H>` where `H: MovementHost`: the world the agents live in
///
/// # Optional inputs (have defaults)
///
/// | Method          | Default                                   |
/// |-----------------|-------------------------------------------|
/// | `.config(c)`    | `ManagerConfig::default()`                |
/// | `.seed(s)`      | `config.seed`                             |
/// | `.navmesh(m)`   | unloaded mesh (every search fails)        |
///
/// # Example
///
/// ```rust,ignore
/// let manager = MovementManagerBuilder::new(Arc::clone(&world))
///     .config(config)
///     .navmesh(NavMeshInterface::with_mesh(mesh))
///     .build()?;
/// manager.add_agent(id)?;
/// manager.move_to_point(id, dest, None, now);
/// ```
pub struct MovementManagerBuilder<H: MovementHost> {
    host:    Arc<H>,
    config:  ManagerConfig,
    navmesh: Option<NavMeshInterface>,
}

impl<H: MovementHost> MovementManagerBuilder<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self { host, config: ManagerConfig::default(), navmesh: None }
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Global seed for every agent's RNG stream.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn navmesh(mut self, navmesh: NavMeshInterface) -> Self {
        self.navmesh = Some(navmesh);
        self
    }

    /// Validate the configuration and build a manager over the default
    /// [`PathfindingAdapter`].
    ///
    /// # Errors
    ///
    /// [`ManagerError::Config`](crate::ManagerError::Config) if any part of
    /// the configuration is out of range.
    pub fn build(self) -> ManagerResult<MovementManager<H>> {
        self.config.validate()?;
        let navmesh = self.navmesh.unwrap_or_else(|| {
            warn!("no navigation mesh supplied; only direct paths will be produced");
            NavMeshInterface::unloaded()
        });
        let validator = Arc::new(MovementValidator::new(self.config.validator, self.config.stuck));
        let planner = PathfindingAdapter::new(navmesh, validator)
            .with_config(self.config.pathfinding)?
            .with_cache_config(self.config.cache)?;
        info!(
            seed = self.config.seed,
            mesh_loaded = planner.navmesh().is_loaded(),
            max_agents_per_tick = self.config.scheduler.max_agents_per_tick,
            "movement manager built",
        );
        Ok(MovementManager::from_parts(self.host, planner, &self.config))
    }

    /// Build over a caller-supplied planner.  The navmesh, pathfinding and
    /// cache settings are ignored; the validator and stuck settings are
    /// applied to the planner's validator.
    pub fn build_with_planner<P: PathPlanner>(self, planner: P) -> ManagerResult<MovementManager<H, P>> {
        self.config.validate()?;
        if self.navmesh.is_some() {
            warn!("navmesh ignored: a custom planner was supplied");
        }
        planner.validator().set_config(self.config.validator)?;
        planner.validator().set_stuck_config(self.config.stuck)?;
        info!(seed = self.config.seed, "movement manager built with custom planner");
        Ok(MovementManager::from_parts(self.host, planner, &self.config))
    }
}
