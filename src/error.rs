//! Top-level error type.
//!
//! Only fatal conditions appear here: parse and configuration failures
//! abort before simulation starts, and a `ClockError` marks a scheduler
//! invariant violation. Capacity, TTL and duplicate outcomes are routing
//! statistics, not errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::plan::ParseError;
use crate::scheduler::ClockError;

/// Umbrella error returned by scenario setup and the run loop.
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
