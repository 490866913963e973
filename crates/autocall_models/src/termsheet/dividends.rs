//! Dividend model variants.
//!
//! Dividends enter the simulation two ways: a continuous yield lowers the
//! risk-neutral drift, and discrete cash amounts are subtracted from the
//! simulated spot on their ex-dates.

use autocall_core::Date;
use serde::{Deserialize, Serialize};

/// A single discrete cash dividend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CashDividend {
    /// Ex-dividend date.
    pub ex_date: Date,
    /// Cash amount in spot units.
    pub amount: f64,
}

/// Dividend model for a single underlying.
///
/// # Examples
///
/// ```
/// use autocall_models::termsheet::dividends::DividendModel;
///
/// let json = r#"{"type": "continuous", "continuous_yield": 0.02}"#;
/// let model: DividendModel = serde_json::from_str(json).unwrap();
/// assert_eq!(model.continuous_yield(), 0.02);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DividendModel {
    /// Continuous dividend yield only.
    Continuous {
        /// Annualised continuous yield.
        continuous_yield: f64,
    },

    /// Known discrete cash dividends only.
    Discrete {
        /// Dividend schedule.
        dividends: Vec<CashDividend>,
    },

    /// Discrete dividends up to a horizon, with a continuous yield.
    ///
    /// Useful for modelling known near-term dividends with a yield for the
    /// far future. Discrete dividends past the horizon are ignored.
    Mixed {
        /// Annualised continuous yield.
        continuous_yield: f64,
        /// Dividend schedule.
        dividends: Vec<CashDividend>,
        /// Date after which only the continuous yield applies.
        #[serde(default)]
        horizon: Option<Date>,
    },
}

impl DividendModel {
    /// A zero-dividend model.
    #[inline]
    pub fn none() -> Self {
        DividendModel::Continuous {
            continuous_yield: 0.0,
        }
    }

    /// Returns the continuous yield component (zero for pure discrete).
    ///
    /// For the mixed model this is the raw yield; use
    /// [`continuous_yield_between`](Self::continuous_yield_between) for the
    /// horizon-gated value over a simulation step.
    #[inline]
    pub fn continuous_yield(&self) -> f64 {
        match self {
            DividendModel::Continuous { continuous_yield } => *continuous_yield,
            DividendModel::Discrete { .. } => 0.0,
            DividendModel::Mixed {
                continuous_yield, ..
            } => *continuous_yield,
        }
    }

    /// Returns the continuous yield accruing over the step `(start, end]`.
    ///
    /// A mixed model with a horizon pays known cash dividends up to it and
    /// switches to the yield afterwards: steps ending on or before the
    /// horizon carry no yield, and the step containing it accrues only the
    /// post-horizon fraction.
    pub fn continuous_yield_between(&self, start: Date, end: Date) -> f64 {
        let horizon = match self {
            DividendModel::Mixed { horizon, .. } => *horizon,
            _ => None,
        };

        match horizon {
            Some(h) if end <= h => 0.0,
            Some(h) if start < h => {
                let step_days = (end - start) as f64;
                if step_days <= 0.0 {
                    return 0.0;
                }
                self.continuous_yield() * (end - h) as f64 / step_days
            }
            _ => self.continuous_yield(),
        }
    }

    /// Returns discrete dividends with ex-date in `(start, end]`.
    ///
    /// For the mixed model, dividends past the horizon are excluded.
    pub fn dividends_between(&self, start: Date, end: Date) -> Vec<CashDividend> {
        let (schedule, horizon) = match self {
            DividendModel::Continuous { .. } => return Vec::new(),
            DividendModel::Discrete { dividends } => (dividends, None),
            DividendModel::Mixed {
                dividends, horizon, ..
            } => (dividends, *horizon),
        };

        schedule
            .iter()
            .filter(|d| start < d.ex_date && d.ex_date <= end)
            .filter(|d| horizon.map_or(true, |h| d.ex_date <= h))
            .copied()
            .collect()
    }
}
