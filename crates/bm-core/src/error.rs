//! Framework error type.
//!
//! Sub-crates define their own error enums and convert them into `BmError`
//! via `From` impls where a caller needs a single type.  Errors here are for
//! construction and configuration only; per-tick movement failures are
//! reported as result codes, never as `Err`.

use thiserror::Error;

use crate::AgentId;

/// The top-level error type for `bm-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum BmError {
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BmError {
    /// Shorthand for building a [`BmError::Config`] from anything printable.
    pub fn config(msg: impl Into<String>) -> Self {
        BmError::Config(msg.into())
    }
}

/// Shorthand result type for all `bm-*` crates.
pub type BmResult<T> = Result<T, BmError>;
