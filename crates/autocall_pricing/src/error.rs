//! Error types for the pricing engine.

use autocall_core::DateError;
use autocall_models::{CorrelationError, ValidationError};
use thiserror::Error;

use crate::config::ConfigError;

/// Top-level pricing error.
///
/// Input problems surface as `Validation`/`Config` variants and are not
/// retried; `Correlation` and `NonFinitePv` are internal numerical
/// failures.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Term sheet validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Correlation factorisation failed even after repair.
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// Run configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Date arithmetic failed (reversed or invalid dates).
    #[error(transparent)]
    Date(#[from] DateError),

    /// The simulation aggregated to a NaN or infinite present value.
    #[error("Simulation produced a non-finite present value")]
    NonFinitePv,
}
