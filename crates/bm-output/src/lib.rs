//! `bm-output`: recording of movement runs.
//!
//! | Backend | Files created                                                          |
//! |---------|------------------------------------------------------------------------|
//! | CSV     | `movement_metrics.csv`, `agent_states.csv`, `generator_results.csv`    |
//!
//! Backends implement [`OutputWriter`] and are driven by
//! [`MovementOutputObserver`], which implements `bm_manager::MovementObserver`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bm_output::{CsvWriter, MovementOutputObserver};
//!
//! let mut obs = MovementOutputObserver::new(CsvWriter::new(Path::new("./output"))?);
//! for _ in 0..ticks {
//!     manager.update_all(clock.advance(250), &mut obs);
//! }
//! manager.shutdown(clock.now(), &mut obs);
//! if let Some(e) = obs.take_error() {
//!     eprintln!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(test)]
mod tests;

pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::MovementOutputObserver;
pub use row::{AgentStateRow, MetricsRow, ResultRow};
pub use writer::OutputWriter;
