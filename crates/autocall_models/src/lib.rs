//! # Autocall Models (L2: Data Model)
//!
//! Term sheet definitions and correlation handling for worst-of
//! autocallable notes.
//!
//! This crate provides:
//! - [`TermSheet`] and its components (underlyings, schedules, payoff,
//!   knock-in barrier) with eager validation
//! - Closed enumerations for dividend, volatility and knock-in redemption
//!   variants
//! - Correlation matrix construction, PSD repair and Cholesky factorisation
//!
//! The term sheet is immutable across a pricing run; bumped scenarios are
//! expressed through overlays in the engine layer rather than by mutating
//! the input.

pub mod correlation;
pub mod termsheet;

pub use correlation::{build_correlation, CholeskyFactor, CorrelationError, CorrelationMatrix};
pub use termsheet::dividends::{CashDividend, DividendModel};
pub use termsheet::error::ValidationError;
pub use termsheet::volatility::{VolModel, VolPoint};
pub use termsheet::{
    BarrierMonitoring, CorrelationInput, KiRedemptionRule, KnockInBarrier, Meta, Payoff,
    Schedules, TermSheet, Underlying,
};
