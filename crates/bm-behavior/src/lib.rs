//! `bm-behavior`: movement generators and the requests that create them.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                      |
//! |---------------|---------------------------------------------------------------|
//! | [`generator`] | `MovementGenerator` trait and its lifecycle                   |
//! | [`context`]   | `GeneratorContext<'a>`: host, planner and clock for one call  |
//! | [`kind`]      | `GeneratorKind`, `MovementPriority`, the preemption rule      |
//! | [`result`]    | `MovementResult` per-update outcome codes                     |
//! | [`request`]   | `MovementRequest`, `GeneratorSpec`                            |
//! | [`follower`]  | `PathFollower` waypoint driving, `Seek` replanning            |
//! | [`idle`] ... [`wander`] | the eight concrete generators                       |
//! | [`error`]     | `BehaviorError`, `BehaviorResult<T>`                          |
//!
//! # Design notes
//!
//! Generators never own world state.  Every call receives the agent's
//! snapshot, taken by the manager just before the call, plus a
//! [`GeneratorContext`] borrowing the host and the path planner.  A generator
//! moves its agent only through the host's `move_to`/`stop`/`face`
//! primitives, so the host remains the single source of truth for positions.
//!
//! All path-following generators share [`follower::Seek`]: it plans through a
//! caller-supplied closure, follows the result waypoint by waypoint, replans
//! when the anchor drifts, and reports stuck agents.  The generators differ
//! only in how they pick the anchor and what counts as done.

pub mod chase;
pub mod context;
pub mod error;
pub mod flee;
pub mod follow;
pub mod follower;
pub mod formation;
pub mod generator;
pub mod idle;
pub mod kind;
pub mod patrol;
pub mod point;
pub mod request;
pub mod result;
pub mod wander;


pub use chase::ChaseGenerator;
pub use context::GeneratorContext;
pub use error::{BehaviorError, BehaviorResult};
pub use flee::FleeGenerator;
pub use follow::FollowGenerator;
pub use follower::{PathFollower, REACH_EPSILON, REPLAN_DISTANCE, Seek, SeekStatus};
pub use formation::{FORMATION_EPSILON, FormationGenerator};
pub use generator::MovementGenerator;
pub use idle::IdleGenerator;
pub use kind::{GeneratorKind, MovementPriority, preempts};
pub use patrol::PatrolGenerator;
pub use point::PointGenerator;
pub use request::{GeneratorSpec, MovementRequest};
pub use result::MovementResult;
pub use wander::WanderGenerator;
