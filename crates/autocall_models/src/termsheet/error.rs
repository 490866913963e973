//! Term sheet validation errors.

use autocall_core::Date;
use thiserror::Error;

/// Errors raised by eager term-sheet validation.
///
/// All of these indicate invalid input and are surfaced to the caller
/// without retry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The term sheet has no underlyings.
    #[error("Term sheet must have at least one underlying")]
    NoUnderlyings,

    /// Two underlyings share the same id.
    #[error("Duplicate underlying id: {id}")]
    DuplicateUnderlyingId {
        /// The repeated id.
        id: String,
    },

    /// Notional must be strictly positive.
    #[error("Notional must be positive, got {0}")]
    NonPositiveNotional(f64),

    /// Every initial spot must be strictly positive.
    #[error("Spot for {asset} must be positive, got {spot}")]
    NonPositiveSpot {
        /// The offending underlying id.
        asset: String,
        /// The offending spot.
        spot: f64,
    },

    /// Meta dates violate trade <= valuation <= maturity <= maturity payment.
    #[error("{first} date {first_date} is after {second} date {second_date}")]
    DatesOutOfOrder {
        /// Name of the earlier field.
        first: &'static str,
        /// Its value.
        first_date: Date,
        /// Name of the later field.
        second: &'static str,
        /// Its value.
        second_date: Date,
    },

    /// A schedule array does not match the observation-date count.
    #[error("{field} length {len} != observation_dates length {expected}")]
    ScheduleLengthMismatch {
        /// The misaligned schedule array.
        field: &'static str,
        /// Its length.
        len: usize,
        /// Expected length.
        expected: usize,
    },

    /// Observation dates must be strictly increasing.
    #[error("Observation dates must be strictly increasing at index {index}")]
    ObservationDatesNotIncreasing {
        /// First offending index.
        index: usize,
    },

    /// Observation dates must not extend past maturity.
    #[error("Observation date {date} is after maturity")]
    ObservationAfterMaturity {
        /// The offending date.
        date: Date,
    },

    /// Autocall level outside (0, 2].
    #[error("Autocall level at obs {index} is {value}, must be in (0, 2]")]
    AutocallLevelOutOfRange {
        /// Observation index.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// Coupon barrier outside (0, 2].
    #[error("Coupon barrier at obs {index} is {value}, must be in (0, 2]")]
    CouponBarrierOutOfRange {
        /// Observation index.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// Coupon rates must be non-negative.
    #[error("Coupon rate at obs {index} is {value}, must be >= 0")]
    NegativeCouponRate {
        /// Observation index.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// Knock-in level outside (0, 1.5].
    #[error("KI barrier level is {value}, must be in (0, 1.5]")]
    KiLevelOutOfRange {
        /// Offending value.
        value: f64,
    },

    /// Redemption amount outside (0, 2].
    #[error("{field} is {value}, must be in (0, 2]")]
    RedemptionOutOfRange {
        /// The offending payoff field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// KI redemption floor must be non-negative when present.
    #[error("ki_redemption_floor is {0}, must be >= 0")]
    NegativeKiRedemptionFloor(f64),

    /// Volatility must be non-negative.
    #[error("Volatility for {asset} is {vol}, must be >= 0")]
    NegativeVolatility {
        /// The offending underlying id.
        asset: String,
        /// Offending value.
        vol: f64,
    },

    /// A piecewise vol model needs at least one tenor.
    #[error("Vol term structure for {asset} is empty")]
    EmptyVolTermStructure {
        /// The offending underlying id.
        asset: String,
    },

    /// Correlation is required exactly when there are multiple underlyings.
    #[error("Correlation must be absent for a single-asset term sheet")]
    CorrelationUnexpected,

    /// Correlation is required exactly when there are multiple underlyings.
    #[error("Correlation is required for a multi-asset term sheet")]
    CorrelationMissing,

    /// Full matrix dimensions must be N x N.
    #[error("Correlation matrix must be {expected}x{expected}, got {rows}x{cols}")]
    CorrelationMatrixShape {
        /// Number of underlyings.
        expected: usize,
        /// Supplied row count.
        rows: usize,
        /// Supplied column count (of the first offending row).
        cols: usize,
    },

    /// A pairwise key does not resolve to two distinct underlying ids.
    #[error("Malformed correlation key: {key}")]
    MalformedCorrelationKey {
        /// The offending key.
        key: String,
    },
}
