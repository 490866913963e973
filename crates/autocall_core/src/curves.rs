//! Discount curves.
//!
//! Supports flat and piecewise step-constant continuously-compounded rate
//! curves. The piecewise curve integrates its step rate segment by segment,
//! so discount factors are exact across breakpoints.

use serde::{Deserialize, Serialize};

use crate::types::error::DateError;
use crate::types::time::{Date, DayCountConvention};

fn default_day_count() -> DayCountConvention {
    DayCountConvention::Act365Fixed
}

/// A single (date, rate) node of a piecewise curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatePoint {
    /// Breakpoint date; the rate applies to dates on or before it.
    pub date: Date,
    /// Continuously-compounded rate for the segment.
    pub rate: f64,
}

/// Continuously-compounded discount curve.
///
/// The rate at a date is the right-continuous step value: the first
/// breakpoint on or after the date, flat-extrapolated outside the tenor
/// range.
///
/// # Examples
///
/// ```
/// use autocall_core::curves::RateCurve;
/// use autocall_core::types::time::{Date, DayCountConvention};
///
/// let curve = RateCurve::flat(0.05);
/// let valuation = Date::from_ymd(2024, 1, 15).unwrap();
/// let maturity = Date::from_ymd(2025, 1, 15).unwrap();
///
/// let df = curve.discount_factor(valuation, maturity).unwrap();
/// let yf = 366.0 / 365.0;
/// assert!((df - (-0.05_f64 * yf).exp()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateCurve {
    /// Constant rate for all maturities.
    Flat {
        /// The flat continuously-compounded rate.
        rate: f64,
        /// Day count convention used for discounting.
        #[serde(default = "default_day_count")]
        day_count: DayCountConvention,
    },

    /// Step-constant rate between breakpoints.
    Piecewise {
        /// Curve reference date.
        reference_date: Date,
        /// Breakpoints sorted by date.
        tenors: Vec<RatePoint>,
        /// Day count convention used for discounting.
        #[serde(default = "default_day_count")]
        day_count: DayCountConvention,
    },
}

impl RateCurve {
    /// Constructs a flat curve with ACT/365F discounting.
    #[inline]
    pub fn flat(rate: f64) -> Self {
        RateCurve::Flat {
            rate,
            day_count: default_day_count(),
        }
    }

    /// Returns the curve's day count convention.
    #[inline]
    pub fn day_count(&self) -> DayCountConvention {
        match self {
            RateCurve::Flat { day_count, .. } => *day_count,
            RateCurve::Piecewise { day_count, .. } => *day_count,
        }
    }

    /// Returns the short rate applying at `date`.
    ///
    /// For a piecewise curve this is the rate of the first breakpoint on or
    /// after `date`, or the last rate when `date` lies beyond the final
    /// breakpoint. An empty tenor list yields zero.
    pub fn rate_at(&self, date: Date) -> f64 {
        match self {
            RateCurve::Flat { rate, .. } => *rate,
            RateCurve::Piecewise { tenors, .. } => {
                if tenors.is_empty() {
                    return 0.0;
                }
                for tenor in tenors {
                    if date <= tenor.date {
                        return tenor.rate;
                    }
                }
                tenors[tenors.len() - 1].rate
            }
        }
    }

    /// Returns the discount factor from `valuation` to `date`.
    ///
    /// The piecewise curve integrates its step rate over each
    /// breakpoint-delimited segment and exponentiates the negated sum.
    /// Each segment accrues the rate applying at its start, so a
    /// breakpoint's rate governs the segment that begins there.
    ///
    /// # Errors
    ///
    /// Returns [`DateError::ReversedDates`] when `date` is before
    /// `valuation`.
    pub fn discount_factor(&self, valuation: Date, date: Date) -> Result<f64, DateError> {
        match self {
            RateCurve::Flat { rate, day_count } => {
                let yf = day_count.year_fraction(valuation, date)?;
                Ok((-rate * yf).exp())
            }
            RateCurve::Piecewise {
                tenors, day_count, ..
            } => {
                if date < valuation {
                    return Err(DateError::ReversedDates {
                        start: valuation,
                        end: date,
                    });
                }
                if date == valuation {
                    return Ok(1.0);
                }

                let mut breakpoints = vec![valuation];
                for tenor in tenors {
                    if valuation < tenor.date && tenor.date < date {
                        breakpoints.push(tenor.date);
                    }
                }
                breakpoints.push(date);

                let mut log_df = 0.0;
                for pair in breakpoints.windows(2) {
                    let yf = day_count.year_fraction(pair[0], pair[1])?;
                    log_df += self.rate_at(pair[0]) * yf;
                }

                Ok((-log_df).exp())
            }
        }
    }

    /// Returns a copy of the curve with every rate shifted by `bump`.
    ///
    /// Used for parallel Rho bumping: the flat rate or every piecewise node
    /// moves by the same absolute amount.
    pub fn shifted(&self, bump: f64) -> RateCurve {
        match self {
            RateCurve::Flat { rate, day_count } => RateCurve::Flat {
                rate: rate + bump,
                day_count: *day_count,
            },
            RateCurve::Piecewise {
                reference_date,
                tenors,
                day_count,
            } => RateCurve::Piecewise {
                reference_date: *reference_date,
                tenors: tenors
                    .iter()
                    .map(|t| RatePoint {
                        date: t.date,
                        rate: t.rate + bump,
                    })
                    .collect(),
                day_count: *day_count,
            },
        }
    }
}
