//! Integration tests for bm-output.

#[cfg(test)]
mod csv_tests {
    use tempfile::TempDir;

    use bm_behavior::{GeneratorKind, MovementResult};
    use bm_core::{AgentId, GameTime, Position};
    use bm_manager::{MovementMetrics, MovementState};

    use crate::csv::{CsvWriter, METRICS_FILE, METRICS_HEADER, RESULTS_FILE, STATES_FILE, STATES_HEADER};
    use crate::row::{AgentStateRow, MetricsRow, ResultRow};
    use crate::writer::OutputWriter;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    fn records(dir: &TempDir, file: &str) -> Vec<csv::StringRecord> {
        let mut rdr = csv::Reader::from_path(dir.path().join(file)).unwrap();
        rdr.records().map(|r| r.unwrap()).collect()
    }

    fn walking(x: f32) -> MovementState {
        MovementState {
            generator: GeneratorKind::Point,
            position: Position::at(x, 2.0, 0.0),
            is_moving: true,
            speed: 7.0,
            ..MovementState::default()
        }
    }

    #[test]
    fn csv_files_created_with_headers() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        for file in [METRICS_FILE, STATES_FILE, RESULTS_FILE] {
            assert!(dir.path().join(file).exists(), "{file} missing");
        }

        let mut rdr = csv::Reader::from_path(dir.path().join(STATES_FILE)).unwrap();
        let headers: Vec<_> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, STATES_HEADER);

        let mut rdr = csv::Reader::from_path(dir.path().join(METRICS_FILE)).unwrap();
        assert_eq!(rdr.headers().unwrap().len(), METRICS_HEADER.len());
    }

    #[test]
    fn nested_output_dir_is_created() {
        let dir = tmp();
        let nested = dir.path().join("runs").join("a");
        let _w = CsvWriter::new(&nested).unwrap();
        assert!(nested.join(METRICS_FILE).exists());
    }

    #[test]
    fn state_rows_are_written() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        let at = GameTime(2_000);
        let mut tracking = walking(5.0);
        tracking.target = Some(AgentId(7));
        let rows = [AgentStateRow::new(at, AgentId(1), &walking(1.5)), AgentStateRow::new(at, AgentId(2), &tracking)];
        w.write_states(&rows).unwrap();
        w.finish().unwrap();

        let read = records(&dir, STATES_FILE);
        assert_eq!(read.len(), 2);
        assert_eq!(&read[0][0], "1");
        assert_eq!(&read[0][1], "2000");
        assert_eq!(&read[0][2], "point");
        assert_eq!(&read[0][3], "in_progress");
        assert_eq!(&read[0][4], "1.500");
        assert_eq!(&read[0][7], "1");
        assert_eq!(&read[0][10], u32::MAX.to_string());
        assert_eq!(&read[1][10], "7");
    }

    #[test]
    fn metrics_and_results_are_written() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        let metrics = MovementMetrics { at: GameTime(3_000), agents: 4, commands_accepted: 9, ..Default::default() };
        w.write_metrics(&MetricsRow::from(&metrics)).unwrap();
        w.write_result(&ResultRow {
            at_ms:     3_250,
            agent_id:  2,
            generator: GeneratorKind::Patrol,
            result:    MovementResult::Unreachable,
        })
        .unwrap();
        w.finish().unwrap();

        let m = records(&dir, METRICS_FILE);
        assert_eq!(m.len(), 1);
        assert_eq!((&m[0][0], &m[0][1], &m[0][4]), ("3000", "4", "9"));

        let r = records(&dir, RESULTS_FILE);
        assert_eq!(r.len(), 1);
        assert_eq!((&r[0][1], &r[0][2], &r[0][3]), ("2", "patrol", "unreachable"));
    }

    #[test]
    fn csv_finish_idempotent() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_states(&[]).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();
    }
}

#[cfg(test)]
mod observer_tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use bm_core::{Aabb, AgentId, GameTime, Position, SandboxWorld, TerrainKind};
    use bm_manager::{MovementManagerBuilder, MovementObserver};
    use bm_navmesh::NavMeshInterface;

    use crate::csv::{CsvWriter, METRICS_FILE, RESULTS_FILE, STATES_FILE};
    use crate::observer::MovementOutputObserver;
    use crate::row::ResultRow;
    use crate::writer::OutputWriter;
    use crate::{AgentStateRow, MetricsRow, OutputError, OutputResult};

    fn count(dir: &TempDir, file: &str) -> usize {
        csv::Reader::from_path(dir.path().join(file)).unwrap().records().count()
    }

    #[test]
    fn manager_run_is_recorded() {
        let bounds = Aabb::new(-20.0, -20.0, 60.0, 20.0);
        let world = Arc::new(SandboxWorld::new(bounds));
        let mesh = NavMeshInterface::flat_world_grid(bounds, 2.0, 0.0, |_| Some(TerrainKind::Ground));
        let manager = MovementManagerBuilder::new(Arc::clone(&world))
            .navmesh(NavMeshInterface::with_mesh(mesh))
            .build()
            .unwrap();
        let (a, b) = (AgentId(1), AgentId(2));
        world.spawn_at(a, Position::at(0.0, 0.0, 0.0));
        world.spawn_at(b, Position::at(0.0, 10.0, 0.0));
        manager.add_agent(a).unwrap();
        manager.add_agent(b).unwrap();

        let mut now = GameTime(0);
        manager.move_to_point(a, Position::at(20.0, 0.0, 0.0), None, now);

        let dir = tempfile::tempdir().unwrap();
        let mut obs = MovementOutputObserver::new(CsvWriter::new(dir.path()).unwrap());
        // 5 s at 250 ms: enough to walk 20 units at run speed.
        for _ in 0..20 {
            manager.update_all(now, &mut obs);
            world.step(250);
            now = now + 250;
        }
        manager.shutdown(now, &mut obs);
        assert!(obs.take_error().is_none(), "no write errors expected");

        // Snapshots at 0, 1000, 2000, 3000, 4000 ms.
        assert_eq!(count(&dir, METRICS_FILE), 5);
        assert_eq!(count(&dir, STATES_FILE), 10);
        let results: Vec<_> = csv::Reader::from_path(dir.path().join(RESULTS_FILE))
            .unwrap()
            .records()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!((&results[0][1], &results[0][2], &results[0][3]), ("1", "point", "success"));
    }

    /// Fails every write.
    struct Broken;

    impl OutputWriter for Broken {
        fn write_metrics(&mut self, _row: &MetricsRow) -> OutputResult<()> {
            Err(std::io::Error::other("disk full").into())
        }

        fn write_states(&mut self, _rows: &[AgentStateRow]) -> OutputResult<()> {
            Err(std::io::Error::other("disk full").into())
        }

        fn write_result(&mut self, _row: &ResultRow) -> OutputResult<()> {
            Err(std::io::Error::other("disk full").into())
        }

        fn finish(&mut self) -> OutputResult<()> {
            Ok(())
        }
    }

    #[test]
    fn first_error_is_kept() {
        let mut obs = MovementOutputObserver::new(Broken).without_states();
        obs.on_result(GameTime(0), AgentId(1), bm_behavior::GeneratorKind::Point, bm_behavior::MovementResult::Stuck);
        obs.on_snapshot(GameTime(0), &Default::default(), &[]);
        assert!(matches!(obs.take_error(), Some(OutputError::Io(_))));
        assert!(obs.take_error().is_none());
    }
}
