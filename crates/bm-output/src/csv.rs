//! CSV output backend.
//!
//! Creates three files in the output directory:
//! - `movement_metrics.csv`: one row per metrics snapshot
//! - `agent_states.csv`: one row per agent per snapshot
//! - `generator_results.csv`: one row per generator that ended

use std::fs::{self, File};
use std::path::Path;

use csv::Writer;
use tracing::debug;

use crate::writer::OutputWriter;
use crate::{AgentStateRow, MetricsRow, OutputResult, ResultRow};

pub const METRICS_FILE: &str = "movement_metrics.csv";
pub const STATES_FILE: &str = "agent_states.csv";
pub const RESULTS_FILE: &str = "generator_results.csv";

pub const METRICS_HEADER: [&str; 22] = [
    "at_ms",
    "agents",
    "moving_agents",
    "throttled_agents",
    "commands_accepted",
    "commands_queued",
    "commands_rejected",
    "generator_switches",
    "updates_run",
    "updates_skipped",
    "budget_overruns",
    "average_update_us",
    "paths_generated",
    "direct_paths",
    "no_path",
    "cache_hits",
    "cache_misses",
    "cache_evictions",
    "average_path_len",
    "stuck_detections",
    "recoveries",
    "recoveries_failed",
];

pub const STATES_HEADER: [&str; 11] = [
    "agent_id",
    "at_ms",
    "generator",
    "last_result",
    "x",
    "y",
    "z",
    "is_moving",
    "speed",
    "stuck_counter",
    "target",
];

pub const RESULTS_HEADER: [&str; 4] = ["at_ms", "agent_id", "generator", "result"];

/// Writes movement recordings to three CSV files.
pub struct CsvWriter {
    metrics:  Writer<File>,
    states:   Writer<File>,
    results:  Writer<File>,
    finished: bool,
}

impl CsvWriter {
    /// Create `dir` if needed, open the three files and write the headers.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        fs::create_dir_all(dir)?;

        let mut metrics = Writer::from_path(dir.join(METRICS_FILE))?;
        metrics.write_record(METRICS_HEADER)?;

        let mut states = Writer::from_path(dir.join(STATES_FILE))?;
        states.write_record(STATES_HEADER)?;

        let mut results = Writer::from_path(dir.join(RESULTS_FILE))?;
        results.write_record(RESULTS_HEADER)?;

        debug!(dir = %dir.display(), "csv output opened");
        Ok(Self { metrics, states, results, finished: false })
    }
}

impl OutputWriter for CsvWriter {
    fn write_metrics(&mut self, row: &MetricsRow) -> OutputResult<()> {
        self.metrics.write_record(&[
            row.at_ms.to_string(),
            row.agents.to_string(),
            row.moving_agents.to_string(),
            row.throttled_agents.to_string(),
            row.commands_accepted.to_string(),
            row.commands_queued.to_string(),
            row.commands_rejected.to_string(),
            row.generator_switches.to_string(),
            row.updates_run.to_string(),
            row.updates_skipped.to_string(),
            row.budget_overruns.to_string(),
            format!("{:.1}", row.average_update_us),
            row.paths_generated.to_string(),
            row.direct_paths.to_string(),
            row.no_path.to_string(),
            row.cache_hits.to_string(),
            row.cache_misses.to_string(),
            row.cache_evictions.to_string(),
            format!("{:.2}", row.average_path_len),
            row.stuck_detections.to_string(),
            row.recoveries.to_string(),
            row.recoveries_failed.to_string(),
        ])?;
        Ok(())
    }

    fn write_states(&mut self, rows: &[AgentStateRow]) -> OutputResult<()> {
        for row in rows {
            self.states.write_record(&[
                row.agent_id.to_string(),
                row.at_ms.to_string(),
                row.generator.to_string(),
                row.last_result.to_string(),
                format!("{:.3}", row.x),
                format!("{:.3}", row.y),
                format!("{:.3}", row.z),
                (row.is_moving as u8).to_string(),
                format!("{:.2}", row.speed),
                row.stuck_counter.to_string(),
                row.target.to_string(),
            ])?;
        }
        Ok(())
    }

    fn write_result(&mut self, row: &ResultRow) -> OutputResult<()> {
        self.results.write_record(&[
            row.at_ms.to_string(),
            row.agent_id.to_string(),
            row.generator.to_string(),
            row.result.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.metrics.flush()?;
        self.states.flush()?;
        self.results.flush()?;
        Ok(())
    }
}
