//! Navigation-mesh error type.

use thiserror::Error;

use bm_core::PolyRef;

/// Errors produced by `bm-navmesh`.
#[derive(Debug, Error)]
pub enum NavMeshError {
    #[error("no corridor from {from} to {to}")]
    NoRoute { from: PolyRef, to: PolyRef },

    #[error("polygon {0} not found in mesh")]
    PolyNotFound(PolyRef),

    #[error("no polygon near ({x:.2}, {y:.2}, {z:.2})")]
    OffMesh { x: f32, y: f32, z: f32 },

    #[error("invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("navigation mesh is empty")]
    EmptyMesh,
}

pub type NavMeshResult<T> = Result<T, NavMeshError>;
