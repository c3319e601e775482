//! `bm-navmesh`: navigation mesh, corridor search and coordinate boundary.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                          |
//! |---------------|-------------------------------------------------------------------|
//! | [`mesh`]      | `NavMesh` (CSR polygons + R-tree), `NavMeshBuilder`, `flat_grid`  |
//! | [`query`]     | `PathEngine` trait, `AStarEngine`, funnel, raycast, random points |
//! | [`interface`] | `NavMeshInterface` (world-space queries), `NavPath`               |
//! | [`error`]     | `NavMeshError`, `NavMeshResult<T>`                                |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on `QueryFilter`.          |

pub mod error;
pub mod interface;
pub mod mesh;
pub mod query;

#[cfg(test)]
mod tests;

pub use error::{NavMeshError, NavMeshResult};
pub use interface::{DEFAULT_EXTENTS, NavMeshInterface, NavPath, nav_to_world, world_to_nav};
pub use mesh::{NavMesh, NavMeshBuilder, NavPoint, flat_grid};
pub use query::{
    AStarEngine, Corridor, CorridorStatus, PathEngine, QueryFilter, RaycastHit, find_nearest_poly,
    random_point_around, raycast, straight_path,
};
