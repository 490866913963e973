//! Volatility model variants.

use autocall_core::Date;
use serde::{Deserialize, Serialize};

/// A single (date, vol) node of a piecewise-constant term structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolPoint {
    /// Tenor date; the vol applies to dates on or before it.
    pub date: Date,
    /// Annualised volatility for the bucket.
    pub vol: f64,
}

/// Volatility model for a single underlying.
///
/// The piecewise-constant lookup returns the vol of the first tenor on or
/// after the requested date, falling back to the last tenor beyond the end
/// of the structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VolModel {
    /// Single volatility for all dates.
    Flat {
        /// Annualised volatility.
        vol: f64,
    },

    /// Step-constant volatility by tenor bucket (ATM only, no smile).
    PiecewiseConstant {
        /// Tenors sorted by date.
        tenors: Vec<VolPoint>,
    },
}

impl VolModel {
    /// Returns the instantaneous vol applying at `date`.
    pub fn vol_at(&self, date: Date) -> f64 {
        match self {
            VolModel::Flat { vol } => *vol,
            VolModel::PiecewiseConstant { tenors } => {
                for tenor in tenors {
                    if date <= tenor.date {
                        return tenor.vol;
                    }
                }
                tenors.last().map(|t| t.vol).unwrap_or(0.0)
            }
        }
    }

    /// Returns a copy with every node shifted for a Vega bump.
    ///
    /// Additive shifts move the vol by `shift` vol points; relative shifts
    /// scale it by `1 + shift`. The result is floored at zero.
    pub fn shifted(&self, shift: f64, relative: bool) -> VolModel {
        let apply = |vol: f64| -> f64 {
            let bumped = if relative { vol * (1.0 + shift) } else { vol + shift };
            bumped.max(0.0)
        };

        match self {
            VolModel::Flat { vol } => VolModel::Flat { vol: apply(*vol) },
            VolModel::PiecewiseConstant { tenors } => VolModel::PiecewiseConstant {
                tenors: tenors
                    .iter()
                    .map(|t| VolPoint {
                        date: t.date,
                        vol: apply(t.vol),
                    })
                    .collect(),
            },
        }
    }
}
