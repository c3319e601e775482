//! Unit tests for bm-navmesh.
//!
//! All tests use hand-built grids so they run without any mesh files.

#[cfg(test)]
mod helpers {
    use bm_core::TerrainKind;
    use crate::{NavMesh, flat_grid};

    /// A row of `n` cells, 2 units each, along axis 0.
    pub fn strip(n: usize) -> NavMesh {
        flat_grid([0.0, 0.0], n, 1, 2.0, 0.0, |_| Some(TerrainKind::Ground))
    }

    /// 3×3 cells of 2 units with the centre cell missing.
    ///
    /// ```text
    ///   axis2
    ///   4..6  P5 P6 P7
    ///   2..4  P3 -- P4
    ///   0..2  P0 P1 P2
    ///         0..2 2..4 4..6  axis0
    /// ```
    pub fn ring() -> NavMesh {
        flat_grid([0.0, 0.0], 3, 3, 2.0, 0.0, |c| {
            let centre_cell = (2.0..4.0).contains(&c[0]) && (2.0..4.0).contains(&c[2]);
            (!centre_cell).then_some(TerrainKind::Ground)
        })
    }
}

// ── Builder & mesh structure ──────────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use bm_core::{PolyRef, TerrainKind};
    use crate::{NavMeshBuilder, NavMeshError, flat_grid};

    #[test]
    fn empty_build() {
        let mesh = NavMeshBuilder::new().build();
        assert_eq!(mesh.poly_count(), 0);
        assert!(mesh.is_empty());
    }

    #[test]
    fn shared_edges_become_neighbours() {
        let mut b = NavMeshBuilder::new();
        let p = b.add_polygon(&[[0.0, 0.0, 0.0], [0.0, 0.0, 4.0], [4.0, 0.0, 4.0], [4.0, 0.0, 0.0]], TerrainKind::Ground).unwrap();
        let q = b.add_polygon(&[[4.0, 0.0, 0.0], [4.0, 0.0, 4.0], [8.0, 0.0, 4.0], [8.0, 0.0, 0.0]], TerrainKind::Water).unwrap();
        let mesh = b.build();
        assert_eq!(mesh.vert_count(), 6);
        assert_eq!(mesh.neighbors(p).collect::<Vec<_>>(), vec![q]);
        assert_eq!(mesh.neighbors(q).collect::<Vec<_>>(), vec![p]);
        assert_eq!(mesh.area(q), TerrainKind::Water);
        assert!(mesh.shared_edge(p, q).is_some());
    }

    #[test]
    fn degenerate_polygons_rejected() {
        let mut b = NavMeshBuilder::new();
        let two = b.add_polygon(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]], TerrainKind::Ground);
        assert!(matches!(two, Err(NavMeshError::InvalidPolygon(_))));
        let flat = b.add_polygon(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]], TerrainKind::Ground);
        assert!(matches!(flat, Err(NavMeshError::InvalidPolygon(_))));
    }

    #[test]
    fn grid_connectivity() {
        let mesh = flat_grid([0.0, 0.0], 3, 3, 1.0, 0.0, |_| Some(TerrainKind::Ground));
        assert_eq!(mesh.poly_count(), 9);
        assert_eq!(mesh.vert_count(), 16);
        assert_eq!(mesh.neighbors(PolyRef(4)).count(), 4);
        assert_eq!(mesh.neighbors(PolyRef(0)).count(), 2);
    }

    #[test]
    fn height_interpolates_on_slopes() {
        let mut b = NavMeshBuilder::new();
        let p = b.add_polygon(&[[0.0, 0.0, 0.0], [0.0, 0.0, 4.0], [4.0, 4.0, 4.0], [4.0, 4.0, 0.0]], TerrainKind::Ground).unwrap();
        let mesh = b.build();
        let h = mesh.height_at(p, [2.0, 100.0, 2.0]).unwrap();
        assert!((h - 2.0).abs() < 1e-4, "got {h}");
        assert!((mesh.height_at(p, [1.0, 0.0, 3.0]).unwrap() - 1.0).abs() < 1e-4);
        assert!(mesh.height_at(p, [5.0, 0.0, 2.0]).is_none());
        assert!(mesh.contains_point(p, [3.9, 0.0, 0.1]));
        assert!(!mesh.contains_point(p, [-0.1, 0.0, 0.1]));
    }
}

// ── Corridor search ───────────────────────────────────────────────────────────

#[cfg(test)]
mod search {
    use bm_core::{PolyRef, TerrainKind};
    use crate::{AStarEngine, CorridorStatus, NavMeshBuilder, NavMeshError, PathEngine, QueryFilter, flat_grid};

    #[test]
    fn straight_strip_is_complete() {
        let mesh = super::helpers::strip(5);
        let c = AStarEngine
            .find_corridor(&mesh, PolyRef(0), PolyRef(4), [1.0, 0.0, 1.0], [9.0, 0.0, 1.0], &QueryFilter::default(), 2048)
            .unwrap();
        assert_eq!(c.status, CorridorStatus::Complete);
        assert_eq!(c.polys, (0..5).map(PolyRef).collect::<Vec<_>>());
    }

    #[test]
    fn same_poly_is_single() {
        let mesh = super::helpers::strip(2);
        let c = AStarEngine
            .find_corridor(&mesh, PolyRef(1), PolyRef(1), [3.0, 0.0, 1.0], [3.5, 0.0, 1.5], &QueryFilter::default(), 16)
            .unwrap();
        assert!(c.is_single_poly());
    }

    #[test]
    fn budget_exhaustion_is_partial() {
        let mesh = super::helpers::strip(20);
        let c = AStarEngine
            .find_corridor(&mesh, PolyRef(0), PolyRef(19), [1.0, 0.0, 1.0], [39.0, 0.0, 1.0], &QueryFilter::default(), 3)
            .unwrap();
        assert_eq!(c.status, CorridorStatus::Partial);
        assert!(c.polys.len() > 1 && c.polys.len() < 20);
        assert_eq!(c.polys[0], PolyRef(0));
    }

    #[test]
    fn disconnected_island_is_partial_or_no_route() {
        // Two strips separated by a gap; the left one has three cells.
        let mesh = flat_grid([0.0, 0.0], 6, 1, 2.0, 0.0, |c| (c[0] < 6.0 || c[0] > 8.0).then_some(TerrainKind::Ground));
        let f = QueryFilter::default();
        let c = AStarEngine.find_corridor(&mesh, PolyRef(0), PolyRef(4), [1.0, 0.0, 1.0], [11.0, 0.0, 1.0], &f, 2048).unwrap();
        assert_eq!(c.status, CorridorStatus::Partial);
        assert_eq!(*c.polys.last().unwrap(), PolyRef(2));

        // An isolated single cell cannot make any progress.
        let mut b = NavMeshBuilder::new();
        b.add_polygon(&[[0.0, 0.0, 0.0], [0.0, 0.0, 2.0], [2.0, 0.0, 2.0], [2.0, 0.0, 0.0]], TerrainKind::Ground).unwrap();
        b.add_polygon(&[[5.0, 0.0, 0.0], [5.0, 0.0, 2.0], [7.0, 0.0, 2.0], [7.0, 0.0, 0.0]], TerrainKind::Ground).unwrap();
        let mesh = b.build();
        let r = AStarEngine.find_corridor(&mesh, PolyRef(0), PolyRef(1), [1.0, 0.0, 1.0], [6.0, 0.0, 1.0], &f, 2048);
        assert!(matches!(r, Err(NavMeshError::NoRoute { .. })));
    }

    #[test]
    fn hazards_are_avoided() {
        // Middle row is lava except at the far right column.
        let mesh = flat_grid([0.0, 0.0], 3, 3, 2.0, 0.0, |c| {
            let lava = (2.0..4.0).contains(&c[2]) && c[0] < 4.0;
            Some(if lava { TerrainKind::Lava } else { TerrainKind::Ground })
        });
        let c = AStarEngine
            .find_corridor(&mesh, PolyRef(0), PolyRef(6), [1.0, 0.0, 1.0], [1.0, 0.0, 5.0], &QueryFilter::default(), 2048)
            .unwrap();
        assert_eq!(c.status, CorridorStatus::Complete);
        assert!(c.polys.iter().all(|&p| mesh.area(p) != TerrainKind::Lava));
        assert!(c.polys.contains(&PolyRef(5)));
    }
}

// ── String pulling ────────────────────────────────────────────────────────────

#[cfg(test)]
mod funnel {
    use bm_core::PolyRef;
    use crate::mesh::dist_2d;
    use crate::{AStarEngine, PathEngine, QueryFilter, straight_path};

    #[test]
    fn straight_corridor_has_two_points() {
        let mesh = super::helpers::strip(5);
        let polys: Vec<PolyRef> = (0..5).map(PolyRef).collect();
        let pts = straight_path(&mesh, &polys, [1.0, 0.0, 1.0], [9.0, 0.0, 1.5]);
        assert_eq!(pts.len(), 2);
    }

    #[test]
    fn path_bends_round_the_hole_corners() {
        let mesh = super::helpers::ring();
        let (start, end) = ([1.0, 0.0, 3.0], [5.0, 0.0, 3.0]);
        let c = AStarEngine
            .find_corridor(&mesh, PolyRef(3), PolyRef(4), start, end, &QueryFilter::default(), 2048)
            .unwrap();
        let pts = straight_path(&mesh, &c.polys, start, end);
        assert_eq!(pts.len(), 4, "{pts:?}");
        for p in &pts[1..3] {
            assert!(p[0] == 2.0 || p[0] == 4.0);
            assert!(p[2] == 2.0 || p[2] == 4.0);
        }
        let len: f32 = pts.windows(2).map(|w| dist_2d(w[0], w[1])).sum();
        assert!((len - (2.0 + 2.0 * 2f32.sqrt())).abs() < 1e-3, "len {len}");
    }

    #[test]
    fn coincident_ends_give_one_point() {
        let mesh = super::helpers::strip(1);
        let pts = straight_path(&mesh, &[PolyRef(0)], [1.0, 0.0, 1.0], [1.0, 0.0, 1.0]);
        assert_eq!(pts.len(), 1);
    }
}

// ── Raycast, nearest, random ──────────────────────────────────────────────────

#[cfg(test)]
mod queries {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use bm_core::PolyRef;
    use crate::mesh::dist_2d;
    use crate::{QueryFilter, find_nearest_poly, random_point_around, raycast};

    #[test]
    fn raycast_open_and_blocked() {
        let f = QueryFilter::default();
        let strip = super::helpers::strip(5);
        let hit = raycast(&strip, PolyRef(0), [1.0, 0.0, 1.0], [9.0, 0.0, 1.0], &f).unwrap();
        assert!(!hit.hit);
        assert_eq!(hit.polys.len(), 5);

        let ring = super::helpers::ring();
        let hit = raycast(&ring, PolyRef(3), [1.0, 0.0, 3.0], [5.0, 0.0, 3.0], &f).unwrap();
        assert!(hit.hit);
        // Wall face of the hole is at axis0 = 2: a quarter of the way along.
        assert!((hit.t - 0.25).abs() < 1e-4, "t = {}", hit.t);
    }

    #[test]
    fn nearest_snaps_onto_boundary() {
        let mesh = super::helpers::strip(3);
        let f = QueryFilter::default();
        let (poly, p) = find_nearest_poly(&mesh, [3.0, 0.5, -1.0], [4.0, 8.0, 4.0], &f).unwrap();
        assert_eq!(poly, PolyRef(1));
        assert!(p[2].abs() < 1e-5 && (p[0] - 3.0).abs() < 1e-5);
        assert!(find_nearest_poly(&mesh, [3.0, 50.0, 1.0], [4.0, 8.0, 4.0], &f).is_none());
        assert!(find_nearest_poly(&mesh, [30.0, 0.0, 1.0], [4.0, 8.0, 4.0], &f).is_none());
    }

    #[test]
    fn random_points_stay_in_radius() {
        let mesh = super::helpers::ring();
        let f = QueryFilter::default();
        let mut rng = SmallRng::seed_from_u64(7);
        let centre = [1.0, 0.0, 1.0];
        for _ in 0..50 {
            let (poly, p) = random_point_around(&mesh, PolyRef(0), centre, 3.0, &f, &mut rng).unwrap();
            assert!(dist_2d(centre, p) <= 3.0 + 1e-4);
            assert!(mesh.contains_point(poly, p));
        }
    }
}

// ── World-space interface ─────────────────────────────────────────────────────

#[cfg(test)]
mod interface {
    use bm_core::{Aabb, Position, TerrainKind};
    use crate::{CorridorStatus, NavMeshError, NavMeshInterface, nav_to_world, world_to_nav};

    fn arena() -> NavMeshInterface {
        // 20×20 world with a wall across x = 8..12 for y < 14, lava near (-6, -6).
        let mesh = NavMeshInterface::flat_world_grid(Aabb::new(-10.0, -10.0, 30.0, 20.0), 2.0, 0.0, |p| {
            if (8.0..12.0).contains(&p.x) && p.y < 14.0 {
                None
            } else if p.x < -4.0 && p.y < -4.0 {
                Some(TerrainKind::Lava)
            } else {
                Some(TerrainKind::Ground)
            }
        });
        NavMeshInterface::with_mesh(mesh)
    }

    #[test]
    fn coordinate_roundtrip() {
        let p = Position::at(1.0, 2.0, 3.0);
        assert_eq!(world_to_nav(p), [2.0, 3.0, 1.0]);
        assert_eq!(nav_to_world(world_to_nav(p)), p);
    }

    #[test]
    fn path_detours_round_the_wall() {
        let nav = arena();
        let from = Position::at(0.0, 0.0, 0.0);
        let to = Position::at(20.0, 0.0, 0.0);
        let path = nav.find_path(from, to, 2048).unwrap();
        assert_eq!(path.status, CorridorStatus::Complete);
        assert!(path.points.len() >= 3);
        assert!(path.points.iter().any(|p| p.y >= 14.0 - 1e-3));
        assert!(path.points.last().unwrap().approx_eq(to, 1e-3));
        let direct = nav.path_distance(from, to, 2048).unwrap();
        assert!(direct > 20.0);
    }

    #[test]
    fn area_and_height() {
        let nav = arena();
        assert_eq!(nav.area_at(Position::at(-8.0, -8.0, 0.0)), Some(TerrainKind::Lava));
        assert_eq!(nav.area_at(Position::at(0.0, 0.0, 0.0)), Some(TerrainKind::Ground));
        assert_eq!(nav.area_at(Position::at(10.0, 0.0, 0.0)), None);
        assert_eq!(nav.ground_height(Position::at(1.0, 1.0, 3.0)), Some(0.0));
        assert!(!nav.is_on_mesh(Position::at(10.0, 0.0, 0.0)));
    }

    #[test]
    fn line_of_sight_on_mesh() {
        let nav = arena();
        assert!(nav.line_of_sight(Position::at(0.0, 0.0, 0.0), Position::at(6.0, 5.0, 0.0)));
        assert!(!nav.line_of_sight(Position::at(0.0, 0.0, 0.0), Position::at(20.0, 0.0, 0.0)));
    }

    #[test]
    fn random_point_is_on_mesh() {
        use rand::SeedableRng;
        let nav = arena();
        let mut rng = rand::rngs::SmallRng::seed_from_u64(11);
        let c = Position::at(20.0, 10.0, 0.0);
        for _ in 0..20 {
            let p = nav.random_point(c, 5.0, &mut rng).unwrap();
            assert!(p.distance_2d(c) <= 5.0 + 1e-3);
            assert!(nav.is_on_mesh(p));
        }
    }

    #[test]
    fn unloaded_fails_queries() {
        let nav = NavMeshInterface::unloaded();
        assert!(!nav.is_loaded());
        let r = nav.find_path(Position::at(0.0, 0.0, 0.0), Position::at(5.0, 0.0, 0.0), 64);
        assert!(matches!(r, Err(NavMeshError::EmptyMesh)));
        assert!(nav.nearest_point(Position::default()).is_none());
    }
}
