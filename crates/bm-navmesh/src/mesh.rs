//! Polygon navigation mesh and builder.
//!
//! # Coordinate space
//!
//! Everything in this module is in **navigation space**: `[a, up, c]` with
//! axis 1 vertical.  The horizontal plane is axes 0 and 2.  Conversion from
//! world space happens only in [`NavMeshInterface`](crate::NavMeshInterface).
//!
//! # Data layout
//!
//! Polygons use **Compressed Sparse Row (CSR)** format for their vertex
//! rings.  Given a `PolyRef p`, its vertex indices occupy the slice:
//!
//! ```text
//! poly_verts[ poly_vert_start[p] .. poly_vert_start[p+1] ]
//! ```
//!
//! `poly_neighbors` is aligned with `poly_verts`: entry `k` is the polygon on
//! the far side of the edge from vertex `k` to vertex `k+1` (wrapping), or
//! `PolyRef::INVALID` for a boundary edge.  Walking a polygon's neighbours is
//! therefore a contiguous memory scan, which keeps the A* inner loop tight.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) holds each polygon's horizontal bounding box.  Used
//! to snap arbitrary points onto the mesh.

use std::collections::HashMap;

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use bm_core::{PolyRef, TerrainKind};

use crate::{NavMeshError, NavMeshResult};

/// A point in navigation space.
pub type NavPoint = [f32; 3];

// ── R-tree polygon entry ──────────────────────────────────────────────────────

/// Horizontal bounding box of one polygon, `[axis0, axis2]`.
#[derive(Clone)]
struct PolyEntry {
    min: [f32; 2],
    max: [f32; 2],
    id:  PolyRef,
}

impl RTreeObject for PolyEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

impl PointDistance for PolyEntry {
    /// Squared distance from the point to the bounding box (zero inside).
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = (self.min[0] - point[0]).max(0.0).max(point[0] - self.max[0]);
        let dz = (self.min[1] - point[1]).max(0.0).max(point[1] - self.max[1]);
        dx * dx + dz * dz
    }
}

// ── Planar helpers ────────────────────────────────────────────────────────────

/// Twice the signed area of the triangle `a, b, c` on the horizontal plane.
#[inline]
pub fn triarea2(a: NavPoint, b: NavPoint, c: NavPoint) -> f32 {
    let (abx, abz) = (b[0] - a[0], b[2] - a[2]);
    let (acx, acz) = (c[0] - a[0], c[2] - a[2]);
    acx * abz - abx * acz
}

/// Horizontal distance between two navigation points.
#[inline]
pub fn dist_2d(a: NavPoint, b: NavPoint) -> f32 {
    (b[0] - a[0]).hypot(b[2] - a[2])
}

#[inline]
pub fn dist_3d(a: NavPoint, b: NavPoint) -> f32 {
    let (dx, dy, dz) = (b[0] - a[0], b[1] - a[1], b[2] - a[2]);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

#[inline]
pub fn lerp(a: NavPoint, b: NavPoint, t: f32) -> NavPoint {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t, a[2] + (b[2] - a[2]) * t]
}

/// Closest point to `p` on segment `a`–`b`, measured horizontally; the
/// returned height is interpolated along the segment.
fn closest_on_segment_2d(p: NavPoint, a: NavPoint, b: NavPoint) -> NavPoint {
    let (dx, dz) = (b[0] - a[0], b[2] - a[2]);
    let len_sq = dx * dx + dz * dz;
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = (((p[0] - a[0]) * dx + (p[2] - a[2]) * dz) / len_sq).clamp(0.0, 1.0);
    lerp(a, b, t)
}

/// Horizontal distance from `p` to segment `a`–`b`.
pub fn segment_dist_2d(p: NavPoint, a: NavPoint, b: NavPoint) -> f32 {
    dist_2d(p, closest_on_segment_2d(p, a, b))
}

// ── NavMesh ───────────────────────────────────────────────────────────────────

/// Convex-polygon navigation mesh in CSR format plus a spatial index.
///
/// Do not construct directly; use [`NavMeshBuilder`] or [`flat_grid`].
pub struct NavMesh {
    /// Vertex positions, shared between adjacent polygons.
    pub verts: Vec<NavPoint>,

    // ── CSR polygon rings ─────────────────────────────────────────────────
    /// Length = `poly_count + 1`.
    pub poly_vert_start: Vec<u32>,
    pub poly_verts:      Vec<u32>,
    /// Aligned with `poly_verts`; `INVALID` marks a boundary edge.
    pub poly_neighbors:  Vec<PolyRef>,

    // ── Per-polygon data ──────────────────────────────────────────────────
    pub poly_area:   Vec<TerrainKind>,
    pub poly_center: Vec<NavPoint>,

    spatial_idx: RTree<PolyEntry>,
}

impl NavMesh {
    /// A mesh with no polygons.  Every query against it fails.
    pub fn empty() -> Self {
        NavMeshBuilder::new().build()
    }

    pub fn poly_count(&self) -> usize {
        self.poly_center.len()
    }

    pub fn vert_count(&self) -> usize {
        self.verts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poly_center.is_empty()
    }

    #[inline]
    pub fn contains(&self, poly: PolyRef) -> bool {
        poly.index() < self.poly_count()
    }

    #[inline]
    fn ring(&self, poly: PolyRef) -> std::ops::Range<usize> {
        let start = self.poly_vert_start[poly.index()] as usize;
        let end   = self.poly_vert_start[poly.index() + 1] as usize;
        start..end
    }

    /// Vertex positions of `poly` in ring order.
    pub fn poly_vertices(&self, poly: PolyRef) -> impl Iterator<Item = NavPoint> + '_ {
        self.poly_verts[self.ring(poly)]
            .iter()
            .map(|&v| self.verts[v as usize])
    }

    /// Edges of `poly` as `(a, b, neighbour)`.
    pub fn edges(&self, poly: PolyRef) -> impl Iterator<Item = (NavPoint, NavPoint, PolyRef)> + '_ {
        let range = self.ring(poly);
        let (start, n) = (range.start, range.len());
        (0..n).map(move |k| {
            let a = self.verts[self.poly_verts[start + k] as usize];
            let b = self.verts[self.poly_verts[start + (k + 1) % n] as usize];
            (a, b, self.poly_neighbors[start + k])
        })
    }

    /// Polygons sharing an edge with `poly`.
    pub fn neighbors(&self, poly: PolyRef) -> impl Iterator<Item = PolyRef> + '_ {
        self.poly_neighbors[self.ring(poly)]
            .iter()
            .copied()
            .filter(|n| n.is_valid())
    }

    #[inline]
    pub fn area(&self, poly: PolyRef) -> TerrainKind {
        self.poly_area[poly.index()]
    }

    #[inline]
    pub fn center(&self, poly: PolyRef) -> NavPoint {
        self.poly_center[poly.index()]
    }

    /// The edge shared by `from` and `to`, in `from`'s ring order.
    pub fn shared_edge(&self, from: PolyRef, to: PolyRef) -> Option<(NavPoint, NavPoint)> {
        self.edges(from).find(|&(_, _, n)| n == to).map(|(a, b, _)| (a, b))
    }

    /// Horizontal area of `poly`.
    pub fn surface_area(&self, poly: PolyRef) -> f32 {
        let pts: Vec<NavPoint> = self.poly_vertices(poly).collect();
        (1..pts.len().saturating_sub(1))
            .map(|i| triarea2(pts[0], pts[i], pts[i + 1]).abs() * 0.5)
            .sum()
    }

    /// `true` if `p` lies inside `poly` on the horizontal plane (boundary
    /// included).  Works for either winding.
    pub fn contains_point(&self, poly: PolyRef, p: NavPoint) -> bool {
        let mut sign = 0.0f32;
        for (a, b, _) in self.edges(poly) {
            let s = triarea2(a, b, p);
            if s.abs() <= 1e-6 {
                continue;
            }
            if sign == 0.0 {
                sign = s.signum();
            } else if s.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Surface height of `poly` at the horizontal location of `p`, if `p` is
    /// inside it.
    pub fn height_at(&self, poly: PolyRef, p: NavPoint) -> Option<f32> {
        let pts: Vec<NavPoint> = self.poly_vertices(poly).collect();
        for i in 1..pts.len().saturating_sub(1) {
            let (a, b, c) = (pts[0], pts[i], pts[i + 1]);
            let denom = triarea2(a, b, c);
            if denom.abs() <= f32::EPSILON {
                continue;
            }
            let u = triarea2(p, b, c) / denom;
            let v = triarea2(a, p, c) / denom;
            let w = 1.0 - u - v;
            const EPS: f32 = -1e-4;
            if u >= EPS && v >= EPS && w >= EPS {
                return Some(u * a[1] + v * b[1] + w * c[1]);
            }
        }
        None
    }

    /// Closest point on `poly`'s surface to `p`.
    pub fn closest_point(&self, poly: PolyRef, p: NavPoint) -> NavPoint {
        if let Some(h) = self.height_at(poly, p) {
            return [p[0], h, p[2]];
        }
        let mut best = self.center(poly);
        let mut best_d = f32::MAX;
        for (a, b, _) in self.edges(poly) {
            let q = closest_on_segment_2d(p, a, b);
            let d = dist_2d(p, q);
            if d < best_d {
                best_d = d;
                best = q;
            }
        }
        best
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Polygons whose bounding box overlaps the horizontal box `min`–`max`
    /// (given as `[axis0, axis2]`).
    pub fn polys_in_box(&self, min: [f32; 2], max: [f32; 2]) -> Vec<PolyRef> {
        self.spatial_idx
            .locate_in_envelope_intersecting(&AABB::from_corners(min, max))
            .map(|e| e.id)
            .collect()
    }

    /// Up to `k` polygons ordered by horizontal bounding-box distance.
    pub fn k_nearest_polys(&self, p: NavPoint, k: usize) -> Vec<PolyRef> {
        self.spatial_idx
            .nearest_neighbor_iter(&[p[0], p[2]])
            .take(k)
            .map(|e| e.id)
            .collect()
    }
}

// ── NavMeshBuilder ────────────────────────────────────────────────────────────

/// Construct a [`NavMesh`] from convex polygons, then call
/// [`build`](Self::build).
///
/// Vertices with bit-identical coordinates are merged, so adjacent polygons
/// may be added independently and still come out connected.  `build()` finds
/// shared edges, lays out the CSR arrays and bulk-loads the R-tree.
///
/// # Example
///
/// ```
/// use bm_core::TerrainKind;
/// use bm_navmesh::NavMeshBuilder;
///
/// let mut b = NavMeshBuilder::new();
/// b.add_polygon(&[[0.0, 0.0, 0.0], [0.0, 0.0, 4.0], [4.0, 0.0, 4.0], [4.0, 0.0, 0.0]], TerrainKind::Ground).unwrap();
/// b.add_polygon(&[[4.0, 0.0, 0.0], [4.0, 0.0, 4.0], [8.0, 0.0, 4.0], [8.0, 0.0, 0.0]], TerrainKind::Ground).unwrap();
/// let mesh = b.build();
/// assert_eq!(mesh.poly_count(), 2);
/// assert_eq!(mesh.vert_count(), 6);
/// ```
pub struct NavMeshBuilder {
    verts:     Vec<NavPoint>,
    vert_ids:  HashMap<[u32; 3], u32>,
    polys:     Vec<(Vec<u32>, TerrainKind)>,
}

impl NavMeshBuilder {
    pub fn new() -> Self {
        Self { verts: Vec::new(), vert_ids: HashMap::new(), polys: Vec::new() }
    }

    /// Add (or reuse) a vertex and return its index.
    pub fn add_vertex(&mut self, p: NavPoint) -> u32 {
        let key = [p[0].to_bits(), p[1].to_bits(), p[2].to_bits()];
        let next = self.verts.len() as u32;
        let id = *self.vert_ids.entry(key).or_insert(next);
        if id == next {
            self.verts.push(p);
        }
        id
    }

    /// Add a convex polygon given by its ring of corner points.
    ///
    /// # Errors
    ///
    /// [`NavMeshError::InvalidPolygon`] for fewer than three distinct corners
    /// or a ring with no horizontal area.
    pub fn add_polygon(&mut self, ring: &[NavPoint], area: TerrainKind) -> NavMeshResult<PolyRef> {
        let mut ids: Vec<u32> = Vec::with_capacity(ring.len());
        for &p in ring {
            let id = self.add_vertex(p);
            if ids.last() != Some(&id) && ids.first() != Some(&id) {
                ids.push(id);
            }
        }
        if ids.len() < 3 {
            return Err(NavMeshError::InvalidPolygon(format!(
                "{} distinct corners, need at least 3",
                ids.len()
            )));
        }
        let doubled: f32 = (1..ids.len() - 1)
            .map(|i| {
                triarea2(
                    self.verts[ids[0] as usize],
                    self.verts[ids[i] as usize],
                    self.verts[ids[i + 1] as usize],
                )
            })
            .sum();
        if doubled.abs() <= f32::EPSILON {
            return Err(NavMeshError::InvalidPolygon("degenerate ring".into()));
        }
        let poly = PolyRef(self.polys.len() as u32);
        self.polys.push((ids, area));
        Ok(poly)
    }

    pub fn poly_count(&self) -> usize { self.polys.len() }
    pub fn vert_count(&self) -> usize { self.verts.len() }

    /// Consume the builder and produce a [`NavMesh`].
    ///
    /// Time complexity: O(E) for edge matching + O(P log P) for the R-tree
    /// bulk load, where E = polygon edges, P = polygons.
    pub fn build(self) -> NavMesh {
        let poly_count = self.polys.len();

        let mut poly_vert_start = Vec::with_capacity(poly_count + 1);
        let mut poly_verts = Vec::new();
        poly_vert_start.push(0u32);
        for (ring, _) in &self.polys {
            poly_verts.extend_from_slice(ring);
            poly_vert_start.push(poly_verts.len() as u32);
        }

        // Match each undirected edge with the other polygon that uses it.
        let mut poly_neighbors = vec![PolyRef::INVALID; poly_verts.len()];
        let mut open_edges: HashMap<(u32, u32), usize> = HashMap::new();
        for p in 0..poly_count {
            let start = poly_vert_start[p] as usize;
            let end   = poly_vert_start[p + 1] as usize;
            let n = end - start;
            for k in 0..n {
                let a = poly_verts[start + k];
                let b = poly_verts[start + (k + 1) % n];
                let key = (a.min(b), a.max(b));
                match open_edges.remove(&key) {
                    Some(slot) => {
                        let other = poly_vert_start.partition_point(|&s| s as usize <= slot) - 1;
                        poly_neighbors[slot] = PolyRef(p as u32);
                        poly_neighbors[start + k] = PolyRef(other as u32);
                    }
                    None => {
                        open_edges.insert(key, start + k);
                    }
                }
            }
        }

        let poly_area: Vec<TerrainKind> = self.polys.iter().map(|(_, a)| *a).collect();
        let poly_center: Vec<NavPoint> = self
            .polys
            .iter()
            .map(|(ring, _)| {
                let inv = 1.0 / ring.len() as f32;
                ring.iter().fold([0.0; 3], |acc, &v| {
                    let p = self.verts[v as usize];
                    [acc[0] + p[0] * inv, acc[1] + p[1] * inv, acc[2] + p[2] * inv]
                })
            })
            .collect();

        // Bulk-load R-tree for O(P log P) construction.
        let entries: Vec<PolyEntry> = self
            .polys
            .iter()
            .enumerate()
            .map(|(i, (ring, _))| {
                let mut min = [f32::MAX; 2];
                let mut max = [f32::MIN; 2];
                for &v in ring {
                    let p = self.verts[v as usize];
                    min = [min[0].min(p[0]), min[1].min(p[2])];
                    max = [max[0].max(p[0]), max[1].max(p[2])];
                }
                PolyEntry { min, max, id: PolyRef(i as u32) }
            })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        NavMesh {
            verts: self.verts,
            poly_vert_start,
            poly_verts,
            poly_neighbors,
            poly_area,
            poly_center,
            spatial_idx,
        }
    }
}

impl Default for NavMeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a flat grid of square cells at height `height`, starting at
/// `origin` (`[axis0, axis2]`).
///
/// `classify` receives each cell's centre and returns its area, or `None` to
/// leave a hole.
pub fn flat_grid(
    origin:       [f32; 2],
    cols:         usize,
    rows:         usize,
    cell:         f32,
    height:       f32,
    mut classify: impl FnMut(NavPoint) -> Option<TerrainKind>,
) -> NavMesh {
    // Corners are computed from integer indices so neighbouring cells share
    // bit-identical vertices.
    let along = |i: usize| origin[0] + i as f32 * cell;
    let across = |i: usize| origin[1] + i as f32 * cell;

    let mut b = NavMeshBuilder::new();
    for r in 0..rows {
        for c in 0..cols {
            let (a0, a1) = (along(c), along(c + 1));
            let (c0, c1) = (across(r), across(r + 1));
            let centre = [(a0 + a1) * 0.5, height, (c0 + c1) * 0.5];
            let Some(area) = classify(centre) else { continue };
            let ring = [
                [a0, height, c0],
                [a0, height, c1],
                [a1, height, c1],
                [a1, height, c0],
            ];
            // A square ring with positive size is always accepted.
            if cell > 0.0 {
                let _ = b.add_polygon(&ring, area);
            }
        }
    }
    b.build()
}
