//! Error types for the depot simulator.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort a simulation run.
///
/// Saturation, busy connectors, clamped rates, and grid-limit excess are not
/// errors; they are handled inside the loop and reported through logs and
/// telemetry.
#[derive(Error, Debug)]
pub enum DepotError {
    /// A policy returned a rate vector that does not cover the fleet.
    #[error("policy `{policy}` returned {got} rates for {expected} buses")]
    DecisionLength {
        policy: &'static str,
        expected: usize,
        got: usize,
    },

    /// Invalid scenario or depot configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O errors while reading scenarios or writing telemetry.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization errors.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience type alias for Results using `DepotError`.
pub type Result<T> = std::result::Result<T, DepotError>;
