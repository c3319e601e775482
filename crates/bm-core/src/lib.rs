//! `bm-core`: foundational types for the bot movement framework.
//!
//! This crate is a dependency of every other `bm-*` crate.  It intentionally
//! has no `bm-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`ids`]         | `AgentId`, `PolyRef`                                       |
//! | [`position`]    | `Position`, orientation and segment helpers                |
//! | [`time`]        | `GameTime`, `GameClock`                                    |
//! | [`rng`]         | `AgentRng` (per-agent), `SimRng` (global)                  |
//! | [`world`]       | `WorldQuery` / `MovementHost` traits, `AgentSnapshot`      |
//! | [`formation`]   | `FormationType`, `FormationPosition`, slot geometry        |
//! | [`sandbox`]     | `SandboxWorld`, an in-memory host for demos and tests     |
//! | [`sync`]        | poison-tolerant lock helpers                               |
//! | [`error`]       | `BmError`, `BmResult`                                      |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public value types.  |

pub mod error;
pub mod formation;
pub mod ids;
pub mod position;
pub mod rng;
pub mod sandbox;
pub mod sync;
pub mod time;
pub mod world;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{BmError, BmResult};
pub use formation::{FormationPosition, FormationType, calculate_formation_position};
pub use ids::{AgentId, PolyRef};
pub use position::{Position, angle_difference, normalize_orientation, segment_distance};
pub use rng::{AgentRng, SimRng};
pub use sandbox::{Aabb, SandboxWorld, TerrainZone};
pub use time::{GameClock, GameTime};
pub use world::{AgentSnapshot, MoveMode, MoveSpeeds, MovementHost, TerrainKind, WorldQuery};
