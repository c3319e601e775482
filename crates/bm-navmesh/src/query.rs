//! Corridor search trait, default A* engine and mesh queries.
//!
//! # Pluggability
//!
//! Higher layers call the corridor search via the [`PathEngine`] trait, so
//! applications can swap in a hierarchical or precomputed search without
//! touching the rest of the stack.  The default [`AStarEngine`] is a plain
//! A* over polygon adjacency.
//!
//! # Budget
//!
//! Every search takes a node budget.  When the budget runs out, or the goal
//! polygon is unreachable, the search returns a **partial** corridor ending at
//! the explored polygon closest to the goal.  Only a search that never leaves
//! the start polygon fails outright.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};

use rand::Rng;

use bm_core::{PolyRef, TerrainKind};

use crate::mesh::{NavMesh, NavPoint, dist_2d, dist_3d, lerp, segment_dist_2d, triarea2};
use crate::{NavMeshError, NavMeshResult};

// ── QueryFilter ───────────────────────────────────────────────────────────────

/// Which polygon areas a query may enter and what they cost.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryFilter {
    /// Treat lava/slime polygons as walls.
    pub avoid_hazardous:  bool,
    pub allow_deep_water: bool,
    /// Cost multiplier for water polygons.
    pub water_cost:       f32,
    /// Cost multiplier for hazardous polygons when they are allowed.
    pub hazard_cost:      f32,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            avoid_hazardous:  true,
            allow_deep_water: true,
            water_cost:       2.0,
            hazard_cost:      10.0,
        }
    }
}

impl QueryFilter {
    #[inline]
    pub fn passable(&self, area: TerrainKind) -> bool {
        match area {
            TerrainKind::Void => false,
            TerrainKind::DeepWater => self.allow_deep_water,
            a if a.is_hazardous() => !self.avoid_hazardous,
            _ => true,
        }
    }

    #[inline]
    pub fn cost(&self, area: TerrainKind) -> f32 {
        match area {
            TerrainKind::Water | TerrainKind::DeepWater => self.water_cost,
            a if a.is_hazardous() => self.hazard_cost,
            _ => 1.0,
        }
    }
}

// ── Corridor ──────────────────────────────────────────────────────────────────

/// Whether a corridor reaches the goal polygon.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CorridorStatus {
    Complete,
    /// Ends at the explored polygon closest to the goal.
    Partial,
}

/// The result of a corridor search: polygons to cross, in order.
#[derive(Clone, Debug)]
pub struct Corridor {
    pub polys:          Vec<PolyRef>,
    pub status:         CorridorStatus,
    /// Polygons expanded by the search.
    pub nodes_searched: usize,
}

impl Corridor {
    /// `true` if start and goal share one polygon.
    pub fn is_single_poly(&self) -> bool {
        self.polys.len() == 1
    }
}

// ── PathEngine trait ──────────────────────────────────────────────────────────

/// Pluggable corridor search.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync` so they can be shared across rayon
/// workers when the manager updates agents in parallel.
pub trait PathEngine: Send + Sync {
    /// Find the polygon corridor from `start` (containing `start_pos`) to
    /// `end` (containing `end_pos`), expanding at most `max_nodes` polygons.
    ///
    /// `start == end` is a complete single-polygon corridor, not an error.
    #[allow(clippy::too_many_arguments)]
    fn find_corridor(
        &self,
        mesh:      &NavMesh,
        start:     PolyRef,
        end:       PolyRef,
        start_pos: NavPoint,
        end_pos:   NavPoint,
        filter:    &QueryFilter,
        max_nodes: usize,
    ) -> NavMeshResult<Corridor>;
}

// ── AStarEngine ───────────────────────────────────────────────────────────────

/// A* over polygon adjacency.
///
/// Nodes are placed at the midpoint of the portal through which a polygon is
/// first entered; edge cost is the 3-D distance between node positions times
/// the destination polygon's area cost.  The heuristic is the straight-line
/// distance to the goal point.
#[derive(Copy, Clone, Debug, Default)]
pub struct AStarEngine;

/// `f32` with a total order for the open list.
#[derive(Copy, Clone, PartialEq, Debug)]
struct Cost(f32);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PathEngine for AStarEngine {
    fn find_corridor(
        &self,
        mesh:      &NavMesh,
        start:     PolyRef,
        end:       PolyRef,
        start_pos: NavPoint,
        end_pos:   NavPoint,
        filter:    &QueryFilter,
        max_nodes: usize,
    ) -> NavMeshResult<Corridor> {
        for p in [start, end] {
            if !mesh.contains(p) {
                return Err(NavMeshError::PolyNotFound(p));
            }
        }
        if start == end {
            return Ok(Corridor { polys: vec![start], status: CorridorStatus::Complete, nodes_searched: 1 });
        }

        let n = mesh.poly_count();
        let mut g      = vec![f32::INFINITY; n];
        let mut prev   = vec![PolyRef::INVALID; n];
        let mut pos    = vec![[0.0f32; 3]; n];
        let mut closed = vec![false; n];

        g[start.index()] = 0.0;
        pos[start.index()] = start_pos;

        // Secondary key PolyRef keeps tie-breaking deterministic.
        let mut heap: BinaryHeap<Reverse<(Cost, PolyRef)>> = BinaryHeap::new();
        heap.push(Reverse((Cost(dist_3d(start_pos, end_pos)), start)));

        let mut best = start;
        let mut best_h = dist_3d(start_pos, end_pos);
        let mut expanded = 0usize;

        while let Some(Reverse((_, poly))) = heap.pop() {
            if closed[poly.index()] {
                continue;
            }
            closed[poly.index()] = true;

            if poly == end {
                return Ok(Corridor {
                    polys: reconstruct(&prev, end),
                    status: CorridorStatus::Complete,
                    nodes_searched: expanded + 1,
                });
            }

            expanded += 1;
            if expanded > max_nodes {
                break;
            }

            let here = pos[poly.index()];
            for (a, b, next) in mesh.edges(poly) {
                if !next.is_valid() || closed[next.index()] || !filter.passable(mesh.area(next)) {
                    continue;
                }
                let node = if next == end { end_pos } else { lerp(a, b, 0.5) };
                let cost = g[poly.index()] + dist_3d(here, node) * filter.cost(mesh.area(next));
                if cost < g[next.index()] {
                    g[next.index()] = cost;
                    prev[next.index()] = poly;
                    pos[next.index()] = node;
                    let h = dist_3d(node, end_pos);
                    if h < best_h {
                        best_h = h;
                        best = next;
                    }
                    heap.push(Reverse((Cost(cost + h), next)));
                }
            }
        }

        if best == start {
            return Err(NavMeshError::NoRoute { from: start, to: end });
        }
        Ok(Corridor {
            polys: reconstruct(&prev, best),
            status: CorridorStatus::Partial,
            nodes_searched: expanded,
        })
    }
}

fn reconstruct(prev: &[PolyRef], to: PolyRef) -> Vec<PolyRef> {
    let mut polys = vec![to];
    let mut cur = to;
    while prev[cur.index()].is_valid() {
        cur = prev[cur.index()];
        polys.push(cur);
    }
    polys.reverse();
    polys
}

// ── String pulling ────────────────────────────────────────────────────────────

/// Portal between consecutive corridor polygons as `(left, right)`.
///
/// Sides are decided by which way the edge turns around `from`'s centre, so
/// the mesh may use either winding.
fn portal(mesh: &NavMesh, from: PolyRef, to: PolyRef) -> Option<(NavPoint, NavPoint)> {
    let (a, b) = mesh.shared_edge(from, to)?;
    if triarea2(mesh.center(from), a, b) < 0.0 { Some((b, a)) } else { Some((a, b)) }
}

#[inline]
fn same_point(a: NavPoint, b: NavPoint) -> bool {
    dist_3d(a, b) < 1e-4
}

/// Turn a polygon corridor into the shortest point list through its portals
/// (the "simple stupid funnel").
///
/// The result starts at `start` and ends at `end` (a single point when the
/// two coincide).  A corridor whose portals cannot be resolved degrades to
/// the straight pair `[start, end]`.
pub fn straight_path(mesh: &NavMesh, corridor: &[PolyRef], start: NavPoint, end: NavPoint) -> Vec<NavPoint> {
    let mut portals: Vec<(NavPoint, NavPoint)> = Vec::with_capacity(corridor.len() + 1);
    portals.push((start, start));
    for pair in corridor.windows(2) {
        match portal(mesh, pair[0], pair[1]) {
            Some(p) => portals.push(p),
            None => return vec![start, end],
        }
    }
    portals.push((end, end));

    let mut points = vec![start];
    let (mut apex, mut left, mut right) = (start, start, start);
    let (mut apex_i, mut left_i, mut right_i) = (0usize, 0usize, 0usize);

    let mut i = 1;
    while i < portals.len() {
        let (pl, pr) = portals[i];

        // Tighten the right side.
        if triarea2(apex, right, pr) <= 0.0 {
            if same_point(apex, right) || triarea2(apex, left, pr) > 0.0 {
                right = pr;
                right_i = i;
            } else {
                // Right crossed over left: left becomes the new apex.
                apex = left;
                apex_i = left_i;
                if !same_point(*points.last().unwrap_or(&start), apex) {
                    points.push(apex);
                }
                left = apex;
                right = apex;
                left_i = apex_i;
                right_i = apex_i;
                i = apex_i + 1;
                continue;
            }
        }

        // Tighten the left side.
        if triarea2(apex, left, pl) >= 0.0 {
            if same_point(apex, left) || triarea2(apex, right, pl) < 0.0 {
                left = pl;
                left_i = i;
            } else {
                apex = right;
                apex_i = right_i;
                if !same_point(*points.last().unwrap_or(&start), apex) {
                    points.push(apex);
                }
                left = apex;
                right = apex;
                left_i = apex_i;
                right_i = apex_i;
                i = apex_i + 1;
                continue;
            }
        }

        i += 1;
    }

    if !same_point(*points.last().unwrap_or(&start), end) {
        points.push(end);
    }
    points
}

// ── Raycast ───────────────────────────────────────────────────────────────────

/// Result of walking a straight segment across the mesh.
#[derive(Clone, Debug)]
pub struct RaycastHit {
    /// Fraction of the segment travelled before hitting a wall; `1.0` when
    /// the end was reached.
    pub t:     f32,
    pub hit:   bool,
    /// Polygons visited in order.
    pub polys: Vec<PolyRef>,
}

/// Walk from `start` (inside `start_poly`) toward `end` on the horizontal
/// plane, crossing shared edges, until the end is reached or a boundary (or
/// an impassable polygon) is hit.
pub fn raycast(
    mesh:       &NavMesh,
    start_poly: PolyRef,
    start:      NavPoint,
    end:        NavPoint,
    filter:     &QueryFilter,
) -> NavMeshResult<RaycastHit> {
    if !mesh.contains(start_poly) {
        return Err(NavMeshError::PolyNotFound(start_poly));
    }
    let d = [end[0] - start[0], end[2] - start[2]];
    let mut polys = vec![start_poly];
    let mut cur = start_poly;

    // Each step enters a new polygon, so the walk is bounded by the mesh size.
    for _ in 0..=mesh.poly_count() {
        let centre = mesh.center(cur);
        let mut tmax = 1.0f32;
        let mut exit = PolyRef::INVALID;
        let mut exits = false;

        // Cyrus-Beck clip against each edge, normals pointing inward.
        for (a, b, next) in mesh.edges(cur) {
            let mut n = [-(b[2] - a[2]), b[0] - a[0]];
            if n[0] * (centre[0] - a[0]) + n[1] * (centre[2] - a[2]) < 0.0 {
                n = [-n[0], -n[1]];
            }
            let num = n[0] * (start[0] - a[0]) + n[1] * (start[2] - a[2]);
            let den = n[0] * d[0] + n[1] * d[1];
            if den < 0.0 {
                let t = -num / den;
                if t < tmax {
                    tmax = t;
                    exit = next;
                    exits = true;
                }
            }
        }

        if !exits {
            return Ok(RaycastHit { t: 1.0, hit: false, polys });
        }
        if !exit.is_valid() || !filter.passable(mesh.area(exit)) || polys.contains(&exit) {
            return Ok(RaycastHit { t: tmax.clamp(0.0, 1.0), hit: true, polys });
        }
        polys.push(exit);
        cur = exit;
    }

    Ok(RaycastHit { t: 1.0, hit: false, polys })
}

// ── Nearest / random points ───────────────────────────────────────────────────

/// Nearest passable polygon to `p` within the half-extents `extents`, and
/// the closest point on it.
pub fn find_nearest_poly(
    mesh:    &NavMesh,
    p:       NavPoint,
    extents: NavPoint,
    filter:  &QueryFilter,
) -> Option<(PolyRef, NavPoint)> {
    let min = [p[0] - extents[0], p[2] - extents[2]];
    let max = [p[0] + extents[0], p[2] + extents[2]];

    let mut best: Option<(PolyRef, NavPoint)> = None;
    let mut best_d = f32::MAX;
    for poly in mesh.polys_in_box(min, max) {
        if !filter.passable(mesh.area(poly)) {
            continue;
        }
        let q = mesh.closest_point(poly, p);
        if (q[1] - p[1]).abs() > extents[1] {
            continue;
        }
        let d = dist_3d(p, q);
        if d < best_d || (d == best_d && best.is_some_and(|(b, _)| poly < b)) {
            best_d = d;
            best = Some((poly, q));
        }
    }
    best
}

/// Polygons reachable from `start_poly` without leaving a circle of
/// `radius` around `centre`.
fn polys_within(
    mesh:       &NavMesh,
    start_poly: PolyRef,
    centre:     NavPoint,
    radius:     f32,
    filter:     &QueryFilter,
) -> Vec<PolyRef> {
    let mut seen = vec![false; mesh.poly_count()];
    let mut out = Vec::new();
    let mut queue = VecDeque::from([start_poly]);
    seen[start_poly.index()] = true;
    while let Some(poly) = queue.pop_front() {
        out.push(poly);
        for (a, b, next) in mesh.edges(poly) {
            if !next.is_valid() || seen[next.index()] || !filter.passable(mesh.area(next)) {
                continue;
            }
            if segment_dist_2d(centre, a, b) <= radius {
                seen[next.index()] = true;
                queue.push_back(next);
            }
        }
    }
    out
}

/// A uniformly random point on the mesh within `radius` of `centre`,
/// reachable from `start_poly`.
///
/// Draws candidate points in the disc and keeps the first one that lands on
/// a connected polygon; gives up after a fixed number of draws.
pub fn random_point_around<R: Rng + ?Sized>(
    mesh:       &NavMesh,
    start_poly: PolyRef,
    centre:     NavPoint,
    radius:     f32,
    filter:     &QueryFilter,
    rng:        &mut R,
) -> Option<(PolyRef, NavPoint)> {
    const ATTEMPTS: usize = 32;

    if !mesh.contains(start_poly) || radius <= 0.0 {
        return None;
    }
    let candidates = polys_within(mesh, start_poly, centre, radius, filter);
    for _ in 0..ATTEMPTS {
        let r = radius * rng.r#gen::<f32>().sqrt();
        let theta = rng.r#gen::<f32>() * std::f32::consts::TAU;
        let p = [centre[0] + r * theta.cos(), centre[1], centre[2] + r * theta.sin()];
        for &poly in &candidates {
            if mesh.contains_point(poly, p) {
                if let Some(h) = mesh.height_at(poly, p) {
                    return Some((poly, [p[0], h, p[2]]));
                }
            }
        }
    }
    None
}

/// Horizontal length of a point list.
pub fn path_length_2d(points: &[NavPoint]) -> f32 {
    points.windows(2).map(|w| dist_2d(w[0], w[1])).sum()
}
