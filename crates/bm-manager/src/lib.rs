//! `bm-manager`: owns every agent's movement generators and drives them.
//!
//! # One tick
//!
//! ```text
//! update_all(now):
//!   ① Batch     up to max_agents_per_tick agents, round-robin in id order
//!   ② Update    each due agent: retry pending, run the active generator,
//!               handle Success / Stuck / failure (parallel with `parallel`)
//!   ③ Report    finished generators to the observer, in id order
//!   ④ Maintain  planner upkeep (path cache expiry)
//!   ⑤ Snapshot  metrics and every agent's state, every metrics_interval_ms
//! ```
//!
//! An agent is due when its interval has elapsed (combat < normal < idle,
//! each stretched by its CPU-budget throttle) or when a command or target
//! notification marked it for recalculation.
//!
//! # Crate layout
//!
//! | Module       | Contents                                              |
//! |--------------|-------------------------------------------------------|
//! | [`manager`]  | `MovementManager`: commands, queries, updates, groups |
//! | [`builder`]  | `MovementManagerBuilder`                              |
//! | [`config`]   | `ManagerConfig`, `SchedulerConfig`                    |
//! | [`command`]  | `CommandResult`, `RejectReason`                       |
//! | [`state`]    | `MovementState` per-agent live status                 |
//! | [`metrics`]  | `MovementMetrics` snapshot                            |
//! | [`observer`] | `MovementObserver`, `NoopObserver`                    |
//! | [`error`]    | `ManagerError`, `ManagerResult<T>`                    |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `parallel` | Runs each tick's agent batch on Rayon's thread pool.    |
//! | `fx-hash`  | FxHash for the agent, group, cache and stuck tables.    |
//! | `serde`    | `Serialize`/`Deserialize` for configs, states, metrics. |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use bm_manager::{MovementManagerBuilder, NoopObserver};
//!
//! let manager = MovementManagerBuilder::new(Arc::clone(&world))
//!     .navmesh(NavMeshInterface::with_mesh(mesh))
//!     .build()?;
//! manager.add_agent(bot)?;
//! manager.move_to_point(bot, Position::at(100.0, 0.0, 0.0), None, clock.now());
//! loop {
//!     let now = clock.advance(250);
//!     world.step(250);
//!     manager.update_all(now, &mut NoopObserver);
//! }
//! ```

pub mod builder;
pub mod command;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod observer;
mod slot;
pub mod state;


pub use builder::MovementManagerBuilder;
pub use command::{CommandResult, RejectReason};
pub use config::{ManagerConfig, SchedulerConfig};
pub use error::{ManagerError, ManagerResult};
pub use manager::{Group, MovementManager};
pub use metrics::MovementMetrics;
pub use observer::{MovementObserver, NoopObserver};
pub use state::MovementState;
