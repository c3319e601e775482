//! `bm-pathing`: from "go there" to a list of waypoints.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                          |
//! |---------------|-------------------------------------------------------------------|
//! | [`path`]      | `PathNode`, `PathType`, `MovementPath`                            |
//! | [`optimizer`] | `PathOptimizer`, `OptimizerParams`, presets, individual stages    |
//! | [`cache`]     | `PathCache`: TTL + capacity, quantized destination keys          |
//! | [`planner`]   | `PathPlanner` (object-safe seam for generators), `PathOptions`    |
//! | [`adapter`]   | `PathfindingAdapter<E>`: the `PathPlanner` over a navmesh        |
//! | [`metrics`]   | `PathMetrics` snapshot                                            |
//! | [`error`]     | `PathingError`, `PathingResult<T>`                                |
//!
//! # Feature flags
//!
//! | Flag      | Effect                                                     |
//! |-----------|------------------------------------------------------------|
//! | `fx-hash` | FxHash for the path cache and the validator's tables.      |
//! | `serde`   | Derives `Serialize`/`Deserialize` on configs and paths.    |

pub mod adapter;
pub mod cache;
pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod path;
pub mod planner;

#[cfg(test)]
mod tests;

pub use adapter::{PathfindingAdapter, PathfindingConfig};
pub use cache::{CacheConfig, CacheKey, CacheStats, PathCache};
pub use error::{PathingError, PathingResult};
pub use metrics::PathMetrics;
pub use optimizer::{
    OptimizationLevel, OptimizeOutcome, OptimizerParams, PathOptimizer, PathPreset, SegmentCheck, SmoothingMode,
};
pub use path::{MovementPath, PathNode, PathType, polyline_length};
pub use planner::{PathOptions, PathPlanner, flee_fan, ground_point};
