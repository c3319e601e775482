//! `NavMeshInterface`: the only place world and navigation space meet.
//!
//! Navigation space stores points as `[world.y, world.z, world.x]`: the
//! vertical axis sits in the middle and the horizontal axes are swapped.
//! [`world_to_nav`] and [`nav_to_world`] are the two conversion functions;
//! nothing outside this module performs the permutation.
//!
//! A missing mesh is not an error at construction time.  Every query against
//! an unloaded interface fails (returns `None` or [`NavMeshError::EmptyMesh`])
//! and logs a warning, so callers degrade instead of blocking.

use std::sync::Arc;

use rand::Rng;
use tracing::{trace, warn};

use bm_core::{Aabb, PolyRef, Position, TerrainKind};

use crate::mesh::{NavMesh, NavPoint, flat_grid};
use crate::query::{
    AStarEngine, CorridorStatus, PathEngine, QueryFilter, find_nearest_poly, random_point_around,
    raycast, straight_path,
};
use crate::{NavMeshError, NavMeshResult};

// ── Coordinate transform ──────────────────────────────────────────────────────

/// World space to navigation space.
#[inline]
pub fn world_to_nav(p: Position) -> NavPoint {
    [p.y, p.z, p.x]
}

/// Navigation space to world space, facing +x.
#[inline]
pub fn nav_to_world(n: NavPoint) -> Position {
    Position::at(n[2], n[0], n[1])
}

/// Default search half-extents around a query point: 4 units horizontally,
/// 8 vertically (`[axis0, up, axis2]`).
pub const DEFAULT_EXTENTS: NavPoint = [4.0, 8.0, 4.0];

/// A point list through the mesh, in world space.
#[derive(Clone, Debug)]
pub struct NavPath {
    /// Starts at the start point snapped onto the mesh, ends at the goal (or
    /// at the closest reachable point for a partial corridor).
    pub points:         Vec<Position>,
    pub status:         CorridorStatus,
    /// Polygons in the underlying corridor.
    pub corridor_len:   usize,
    pub nodes_searched: usize,
}

/// Mesh queries in world coordinates.
///
/// # Type parameter
///
/// `E` is the corridor search (default [`AStarEngine`]).  Swap it at compile
/// time with no runtime overhead.
pub struct NavMeshInterface<E: PathEngine = AStarEngine> {
    mesh:    Option<Arc<NavMesh>>,
    engine:  E,
    filter:  QueryFilter,
    extents: NavPoint,
}

impl NavMeshInterface<AStarEngine> {
    /// Interface over `mesh` using the default A* engine.
    pub fn with_mesh(mesh: NavMesh) -> Self {
        Self::new(Some(Arc::new(mesh)), AStarEngine)
    }

    /// Interface with no mesh loaded; every query fails.
    pub fn unloaded() -> Self {
        Self::new(None, AStarEngine)
    }

    // ── Construction helpers ──────────────────────────────────────────────

    /// Flat grid mesh covering `bounds` (world space) at height `z`.
    ///
    /// `classify` receives each cell's world-space centre and returns its
    /// area, or `None` to leave the cell out (walls, holes).
    pub fn flat_world_grid(
        bounds:       Aabb,
        cell:         f32,
        z:            f32,
        mut classify: impl FnMut(Position) -> Option<TerrainKind>,
    ) -> NavMesh {
        if cell <= 0.0 {
            return NavMesh::empty();
        }
        let cols = ((bounds.max_y - bounds.min_y) / cell).ceil().max(0.0) as usize;
        let rows = ((bounds.max_x - bounds.min_x) / cell).ceil().max(0.0) as usize;
        flat_grid([bounds.min_y, bounds.min_x], cols, rows, cell, z, |centre| {
            classify(nav_to_world(centre))
        })
    }
}

impl<E: PathEngine> NavMeshInterface<E> {
    pub fn new(mesh: Option<Arc<NavMesh>>, engine: E) -> Self {
        Self { mesh, engine, filter: QueryFilter::default(), extents: DEFAULT_EXTENTS }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Override the search half-extents used to snap points onto the mesh
    /// (`[horizontal, vertical]` in world units).
    pub fn with_extents(mut self, horizontal: f32, vertical: f32) -> Self {
        self.extents = [horizontal, vertical, horizontal];
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.mesh.as_ref().is_some_and(|m| !m.is_empty())
    }

    pub fn mesh(&self) -> Option<&NavMesh> {
        self.mesh.as_deref()
    }

    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn loaded_mesh(&self) -> NavMeshResult<&NavMesh> {
        match self.mesh.as_deref() {
            Some(m) if !m.is_empty() => Ok(m),
            _ => {
                warn!("navigation mesh query with no mesh loaded");
                Err(NavMeshError::EmptyMesh)
            }
        }
    }

    // ── Point queries ─────────────────────────────────────────────────────

    /// Nearest passable polygon to `pos` and the snapped point on it.
    pub fn nearest_poly(&self, pos: Position) -> Option<(PolyRef, Position)> {
        let mesh = self.loaded_mesh().ok()?;
        find_nearest_poly(mesh, world_to_nav(pos), self.extents, &self.filter)
            .map(|(poly, p)| (poly, nav_to_world(p).with_orientation(pos.o)))
    }

    pub fn nearest_point(&self, pos: Position) -> Option<Position> {
        self.nearest_poly(pos).map(|(_, p)| p)
    }

    /// Mesh surface height under `pos`, if `pos` lies over the mesh.
    pub fn ground_height(&self, pos: Position) -> Option<f32> {
        let mesh = self.loaded_mesh().ok()?;
        let (poly, _) = self.nearest_poly(pos)?;
        mesh.height_at(poly, world_to_nav(pos))
    }

    /// `true` if `pos` lies on a passable polygon (within the vertical
    /// extent).
    pub fn is_on_mesh(&self, pos: Position) -> bool {
        self.ground_height(pos).is_some()
    }

    /// Area classification of the polygon under `pos`.
    pub fn area_at(&self, pos: Position) -> Option<TerrainKind> {
        let mesh = self.loaded_mesh().ok()?;
        let n = world_to_nav(pos);
        mesh.polys_in_box([n[0], n[2]], [n[0], n[2]])
            .into_iter()
            .filter(|&p| mesh.contains_point(p, n))
            .filter_map(|p| mesh.height_at(p, n).map(|h| (p, (h - n[1]).abs())))
            .filter(|&(_, dy)| dy <= self.extents[1])
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| mesh.area(p))
    }

    /// A random reachable point within `radius` of `centre`.
    pub fn random_point<R: Rng + ?Sized>(&self, centre: Position, radius: f32, rng: &mut R) -> Option<Position> {
        let mesh = self.loaded_mesh().ok()?;
        let (poly, snapped) = self.nearest_poly(centre)?;
        random_point_around(mesh, poly, world_to_nav(snapped), radius, &self.filter, rng)
            .map(|(_, p)| nav_to_world(p))
    }

    /// `true` if a straight walk from `from` to `to` stays on the mesh.
    pub fn line_of_sight(&self, from: Position, to: Position) -> bool {
        let Ok(mesh) = self.loaded_mesh() else { return false };
        let Some((poly, start)) = self.nearest_poly(from) else { return false };
        raycast(mesh, poly, world_to_nav(start), world_to_nav(to), &self.filter)
            .is_ok_and(|hit| !hit.hit)
    }

    // ── Paths ─────────────────────────────────────────────────────────────

    /// Corridor search plus string pulling between two world points.
    ///
    /// # Errors
    ///
    /// - [`NavMeshError::EmptyMesh`] when no mesh is loaded.
    /// - [`NavMeshError::OffMesh`] when either end cannot be snapped.
    /// - [`NavMeshError::NoRoute`] when the search never leaves the start.
    pub fn find_path(&self, from: Position, to: Position, max_nodes: usize) -> NavMeshResult<NavPath> {
        let mesh = self.loaded_mesh()?;
        let off_mesh = |p: Position| NavMeshError::OffMesh { x: p.x, y: p.y, z: p.z };
        let (start_poly, start) = self.nearest_poly(from).ok_or_else(|| off_mesh(from))?;
        let (end_poly, end) = self.nearest_poly(to).ok_or_else(|| off_mesh(to))?;
        let (start, end) = (world_to_nav(start), world_to_nav(end));

        let corridor = self
            .engine
            .find_corridor(mesh, start_poly, end_poly, start, end, &self.filter, max_nodes)?;

        let goal = match (corridor.status, corridor.polys.last()) {
            (CorridorStatus::Partial, Some(&last)) => mesh.closest_point(last, end),
            _ => end,
        };
        let points: Vec<Position> = straight_path(mesh, &corridor.polys, start, goal)
            .into_iter()
            .map(nav_to_world)
            .collect();

        trace!(
            polys = corridor.polys.len(),
            points = points.len(),
            searched = corridor.nodes_searched,
            status = ?corridor.status,
            "corridor search",
        );

        Ok(NavPath {
            points,
            status: corridor.status,
            corridor_len: corridor.polys.len(),
            nodes_searched: corridor.nodes_searched,
        })
    }

    /// Walking distance along the mesh, or `None` if there is no complete
    /// path.
    pub fn path_distance(&self, from: Position, to: Position, max_nodes: usize) -> Option<f32> {
        let path = self.find_path(from, to, max_nodes).ok()?;
        if path.status != CorridorStatus::Complete {
            return None;
        }
        Some(path.points.windows(2).map(|w| w[0].distance(w[1])).sum())
    }
}
