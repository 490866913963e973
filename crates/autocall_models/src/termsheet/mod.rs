//! Term sheet for worst-of autocallable notes.
//!
//! The term sheet is the immutable product-and-market input to the pricing
//! engine. Its JSON form is a strict schema: unknown keys are rejected and
//! every enumeration is closed.
//!
//! Validation happens eagerly via [`TermSheet::validate`]; the simulation
//! itself never throws on per-path data.

pub mod dividends;
pub mod error;
pub mod volatility;

use std::collections::BTreeMap;

use autocall_core::{Date, RateCurve};
use serde::{Deserialize, Serialize};

use crate::correlation::build_correlation;
use self::dividends::DividendModel;
use self::error::ValidationError;
use self::volatility::VolModel;

/// Product identity, dates, currency and notional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Meta {
    /// Product identifier.
    pub product_id: String,
    /// Trade date.
    pub trade_date: Date,
    /// Valuation date (simulation start).
    pub valuation_date: Date,
    /// Settlement date.
    pub settlement_date: Date,
    /// Final observation date.
    pub maturity_date: Date,
    /// Payment date of the maturity redemption.
    pub maturity_payment_date: Date,
    /// Settlement currency.
    pub currency: String,
    /// Notional amount (> 0).
    pub notional: f64,
}

/// A single underlying with its market models.
///
/// The order of underlyings in the term sheet is canonical and determines
/// asset indexing throughout the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Underlying {
    /// Underlying identifier (e.g. a ticker).
    pub id: String,
    /// Initial spot (> 0).
    pub spot: f64,
    /// Quotation currency.
    pub currency: String,
    /// Dividend model.
    pub dividend_model: DividendModel,
    /// Volatility model.
    pub vol_model: VolModel,
}

/// Correlation input: either a full matrix or a pairwise map.
///
/// Pairwise keys are `"ASSET_A_ASSET_B"` with ids from the underlyings
/// list; duplicate entries are last-wins by JSON map semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CorrelationInput {
    /// Full N x N matrix, row-major as a list of lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Vec<Vec<f64>>>,
    /// Pairwise entries keyed by `"A_B"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairwise: Option<BTreeMap<String, f64>>,
}

/// Observation schedule: five aligned arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schedules {
    /// Strictly increasing observation dates.
    pub observation_dates: Vec<Date>,
    /// Payment date per observation.
    pub payment_dates: Vec<Date>,
    /// Autocall trigger level per observation, as a fraction of initial.
    pub autocall_levels: Vec<f64>,
    /// Coupon barrier per observation, as a fraction of initial.
    pub coupon_barriers: Vec<f64>,
    /// Coupon rate per observation, as a fraction of notional.
    pub coupon_rates: Vec<f64>,
}

impl Schedules {
    /// Number of observations.
    #[inline]
    pub fn len(&self) -> usize {
        self.observation_dates.len()
    }

    /// Whether the schedule has no observations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observation_dates.is_empty()
    }
}

/// Barrier monitoring style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarrierMonitoring {
    /// Continuous monitoring via the Brownian-bridge correction.
    Continuous,
    /// Endpoint checks at observation dates only.
    Discrete,
}

/// Down knock-in barrier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnockInBarrier {
    /// Barrier level as a fraction of the initial spot, in (0, 1.5].
    pub level: f64,
    /// Monitoring style.
    pub monitoring: BarrierMonitoring,
}

/// Redemption rule applied at maturity when the barrier has knocked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KiRedemptionRule {
    /// Redeem at the worst-of performance.
    WorstPerformance,
    /// Redeem at the fixed floor.
    Fixed,
    /// Redeem at the worst-of performance floored from below.
    Floored,
}

/// Payoff switches and redemption amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payoff {
    /// Worst-of (true) or best-of (false) performance driver.
    pub worst_of: bool,
    /// Whether missed coupons accumulate.
    pub coupon_memory: bool,
    /// Whether the period coupon (plus memory) is paid on autocall.
    pub coupon_on_autocall: bool,
    /// Redemption on autocall, as a fraction of notional.
    pub redemption_if_autocall: f64,
    /// Maturity redemption without knock-in, as a fraction of notional.
    pub redemption_if_no_ki: f64,
    /// Maturity redemption rule after knock-in.
    pub redemption_if_ki: KiRedemptionRule,
    /// Floor used by the `fixed` and `floored` rules; defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ki_redemption_floor: Option<f64>,
}

impl Payoff {
    /// Maturity redemption fraction for a knocked-in path with worst-of
    /// performance `worst`.
    pub fn ki_redemption(&self, worst: f64) -> f64 {
        let floor = self.ki_redemption_floor.unwrap_or(0.0);
        match self.redemption_if_ki {
            KiRedemptionRule::WorstPerformance => worst,
            KiRedemptionRule::Fixed => floor,
            KiRedemptionRule::Floored => worst.max(floor),
        }
    }
}

/// Immutable description of the product and its market data.
///
/// See the crate docs for the validation guardrails. Deserialisation is
/// strict; call [`TermSheet::validate`] before pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermSheet {
    /// Product identity and dates.
    pub meta: Meta,
    /// Ordered underlyings; order fixes asset indexing.
    pub underlyings: Vec<Underlying>,
    /// Discounting curve.
    pub discount_curve: RateCurve,
    /// Correlation; present iff there are multiple underlyings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationInput>,
    /// Observation schedules.
    pub schedules: Schedules,
    /// Optional down knock-in barrier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ki_barrier: Option<KnockInBarrier>,
    /// Payoff definition.
    pub payoff: Payoff,
}

impl TermSheet {
    /// Number of underlyings.
    #[inline]
    pub fn num_assets(&self) -> usize {
        self.underlyings.len()
    }

    /// Underlying ids in canonical order.
    pub fn asset_ids(&self) -> Vec<&str> {
        self.underlyings.iter().map(|u| u.id.as_str()).collect()
    }

    /// Initial spots in canonical order.
    pub fn initial_spots(&self) -> Vec<f64> {
        self.underlyings.iter().map(|u| u.spot).collect()
    }

    /// Validates every input guardrail.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered. Validation is
    /// eager: pricing code may assume a validated term sheet.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.underlyings.is_empty() {
            return Err(ValidationError::NoUnderlyings);
        }

        let mut seen = std::collections::BTreeSet::new();
        for u in &self.underlyings {
            if !seen.insert(u.id.as_str()) {
                return Err(ValidationError::DuplicateUnderlyingId { id: u.id.clone() });
            }
        }

        if self.meta.notional <= 0.0 {
            return Err(ValidationError::NonPositiveNotional(self.meta.notional));
        }

        for u in &self.underlyings {
            if u.spot <= 0.0 {
                return Err(ValidationError::NonPositiveSpot {
                    asset: u.id.clone(),
                    spot: u.spot,
                });
            }
            self.validate_vol_model(u)?;
        }

        self.validate_dates()?;
        self.validate_schedules()?;

        if let Some(ki) = &self.ki_barrier {
            if ki.level <= 0.0 || ki.level > 1.5 {
                return Err(ValidationError::KiLevelOutOfRange { value: ki.level });
            }
        }

        self.validate_payoff()?;

        match (&self.correlation, self.num_assets()) {
            (Some(_), 1) => return Err(ValidationError::CorrelationUnexpected),
            (None, n) if n > 1 => return Err(ValidationError::CorrelationMissing),
            _ => {}
        }
        // Resolves matrix shape and pairwise keys against the asset list.
        build_correlation(self)?;

        Ok(())
    }

    fn validate_vol_model(&self, u: &Underlying) -> Result<(), ValidationError> {
        match &u.vol_model {
            VolModel::Flat { vol } => {
                if *vol < 0.0 {
                    return Err(ValidationError::NegativeVolatility {
                        asset: u.id.clone(),
                        vol: *vol,
                    });
                }
            }
            VolModel::PiecewiseConstant { tenors } => {
                if tenors.is_empty() {
                    return Err(ValidationError::EmptyVolTermStructure {
                        asset: u.id.clone(),
                    });
                }
                for tenor in tenors {
                    if tenor.vol < 0.0 {
                        return Err(ValidationError::NegativeVolatility {
                            asset: u.id.clone(),
                            vol: tenor.vol,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_dates(&self) -> Result<(), ValidationError> {
        let m = &self.meta;
        let pairs = [
            ("trade", m.trade_date, "valuation", m.valuation_date),
            ("valuation", m.valuation_date, "maturity", m.maturity_date),
            (
                "maturity",
                m.maturity_date,
                "maturity_payment",
                m.maturity_payment_date,
            ),
        ];
        for (first, first_date, second, second_date) in pairs {
            if first_date > second_date {
                return Err(ValidationError::DatesOutOfOrder {
                    first,
                    first_date,
                    second,
                    second_date,
                });
            }
        }
        Ok(())
    }

    fn validate_schedules(&self) -> Result<(), ValidationError> {
        let s = &self.schedules;
        let n = s.observation_dates.len();

        let lengths = [
            ("payment_dates", s.payment_dates.len()),
            ("autocall_levels", s.autocall_levels.len()),
            ("coupon_barriers", s.coupon_barriers.len()),
            ("coupon_rates", s.coupon_rates.len()),
        ];
        for (field, len) in lengths {
            if len != n {
                return Err(ValidationError::ScheduleLengthMismatch {
                    field,
                    len,
                    expected: n,
                });
            }
        }

        for i in 1..n {
            if s.observation_dates[i] <= s.observation_dates[i - 1] {
                return Err(ValidationError::ObservationDatesNotIncreasing { index: i });
            }
        }

        for &obs_date in &s.observation_dates {
            if obs_date > self.meta.maturity_date {
                return Err(ValidationError::ObservationAfterMaturity { date: obs_date });
            }
        }

        for (i, &level) in s.autocall_levels.iter().enumerate() {
            if level <= 0.0 || level > 2.0 {
                return Err(ValidationError::AutocallLevelOutOfRange { index: i, value: level });
            }
        }
        for (i, &barrier) in s.coupon_barriers.iter().enumerate() {
            if barrier <= 0.0 || barrier > 2.0 {
                return Err(ValidationError::CouponBarrierOutOfRange {
                    index: i,
                    value: barrier,
                });
            }
        }
        for (i, &rate) in s.coupon_rates.iter().enumerate() {
            if rate < 0.0 {
                return Err(ValidationError::NegativeCouponRate { index: i, value: rate });
            }
        }

        Ok(())
    }

    fn validate_payoff(&self) -> Result<(), ValidationError> {
        let p = &self.payoff;
        if p.redemption_if_autocall <= 0.0 || p.redemption_if_autocall > 2.0 {
            return Err(ValidationError::RedemptionOutOfRange {
                field: "redemption_if_autocall",
                value: p.redemption_if_autocall,
            });
        }
        if p.redemption_if_no_ki <= 0.0 || p.redemption_if_no_ki > 2.0 {
            return Err(ValidationError::RedemptionOutOfRange {
                field: "redemption_if_no_ki",
                value: p.redemption_if_no_ki,
            });
        }
        if let Some(floor) = p.ki_redemption_floor {
            if floor < 0.0 {
                return Err(ValidationError::NegativeKiRedemptionFloor(floor));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd(y, m, day).unwrap()
    }

    fn underlying(id: &str, spot: f64) -> Underlying {
        Underlying {
            id: id.to_string(),
            spot,
            currency: "USD".to_string(),
            dividend_model: DividendModel::none(),
            vol_model: VolModel::Flat { vol: 0.25 },
        }
    }

    fn quarterly_schedules() -> Schedules {
        Schedules {
            observation_dates: vec![
                d(2024, 4, 15),
                d(2024, 7, 15),
                d(2024, 10, 15),
                d(2025, 1, 15),
            ],
            payment_dates: vec![
                d(2024, 4, 17),
                d(2024, 7, 17),
                d(2024, 10, 17),
                d(2025, 1, 17),
            ],
            autocall_levels: vec![1.0; 4],
            coupon_barriers: vec![0.8; 4],
            coupon_rates: vec![0.02; 4],
        }
    }

    fn term_sheet() -> TermSheet {
        TermSheet {
            meta: Meta {
                product_id: "TEST-001".to_string(),
                trade_date: d(2024, 1, 10),
                valuation_date: d(2024, 1, 15),
                settlement_date: d(2024, 1, 17),
                maturity_date: d(2025, 1, 15),
                maturity_payment_date: d(2025, 1, 17),
                currency: "USD".to_string(),
                notional: 1_000_000.0,
            },
            underlyings: vec![underlying("A", 100.0), underlying("B", 200.0)],
            discount_curve: RateCurve::flat(0.05),
            correlation: Some(CorrelationInput {
                matrix: None,
                pairwise: Some(BTreeMap::from([("A_B".to_string(), 0.7)])),
            }),
            schedules: quarterly_schedules(),
            ki_barrier: Some(KnockInBarrier {
                level: 0.6,
                monitoring: BarrierMonitoring::Continuous,
            }),
            payoff: Payoff {
                worst_of: true,
                coupon_memory: true,
                coupon_on_autocall: true,
                redemption_if_autocall: 1.0,
                redemption_if_no_ki: 1.0,
                redemption_if_ki: KiRedemptionRule::WorstPerformance,
                ki_redemption_floor: None,
            },
        }
    }

    #[test]
    fn test_valid_term_sheet() {
        assert!(term_sheet().validate().is_ok());
    }

    #[test]
    fn test_schedule_misalignment_rejected() {
        let mut ts = term_sheet();
        ts.schedules.coupon_rates.pop();
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::ScheduleLengthMismatch {
                field: "coupon_rates",
                ..
            })
        ));
    }

    #[test]
    fn test_non_increasing_observations_rejected() {
        let mut ts = term_sheet();
        ts.schedules.observation_dates[2] = ts.schedules.observation_dates[1];
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::ObservationDatesNotIncreasing { index: 2 })
        ));
    }

    #[test]
    fn test_observation_after_maturity_rejected() {
        let mut ts = term_sheet();
        ts.schedules.observation_dates[3] = d(2025, 6, 15);
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::ObservationAfterMaturity { .. })
        ));
    }

    #[test]
    fn test_autocall_level_range() {
        let mut ts = term_sheet();
        ts.schedules.autocall_levels[0] = 0.0;
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::AutocallLevelOutOfRange { index: 0, .. })
        ));

        let mut ts = term_sheet();
        ts.schedules.autocall_levels[1] = 2.5;
        assert!(ts.validate().is_err());
    }

    #[test]
    fn test_ki_level_range() {
        let mut ts = term_sheet();
        ts.ki_barrier = Some(KnockInBarrier {
            level: 1.6,
            monitoring: BarrierMonitoring::Continuous,
        });
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::KiLevelOutOfRange { value }) if value == 1.6
        ));
    }

    #[test]
    fn test_non_positive_spot_rejected() {
        let mut ts = term_sheet();
        ts.underlyings[1].spot = 0.0;
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::NonPositiveSpot { .. })
        ));
    }

    #[test]
    fn test_non_positive_notional_rejected() {
        let mut ts = term_sheet();
        ts.meta.notional = -5.0;
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::NonPositiveNotional(_))
        ));
    }

    #[test]
    fn test_date_ordering_rejected() {
        let mut ts = term_sheet();
        ts.meta.maturity_payment_date = d(2025, 1, 10);
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::DatesOutOfOrder { .. })
        ));
    }

    #[test]
    fn test_correlation_presence() {
        // Multi-asset without correlation
        let mut ts = term_sheet();
        ts.correlation = None;
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::CorrelationMissing)
        ));

        // Single asset with correlation
        let mut ts = term_sheet();
        ts.underlyings.pop();
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::CorrelationUnexpected)
        ));

        // Single asset without correlation is fine
        let mut ts = term_sheet();
        ts.underlyings.pop();
        ts.correlation = None;
        assert!(ts.validate().is_ok());
    }

    #[test]
    fn test_malformed_correlation_key_rejected() {
        let mut ts = term_sheet();
        ts.correlation = Some(CorrelationInput {
            matrix: None,
            pairwise: Some(BTreeMap::from([("A_UNKNOWN".to_string(), 0.5)])),
        });
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::MalformedCorrelationKey { .. })
        ));
    }

    #[test]
    fn test_duplicate_underlying_rejected() {
        let mut ts = term_sheet();
        ts.underlyings[1].id = "A".to_string();
        assert!(matches!(
            ts.validate(),
            Err(ValidationError::DuplicateUnderlyingId { .. })
        ));
    }

    #[test]
    fn test_ki_redemption_rules() {
        let mut payoff = term_sheet().payoff;

        payoff.redemption_if_ki = KiRedemptionRule::WorstPerformance;
        assert_eq!(payoff.ki_redemption(0.55), 0.55);

        payoff.redemption_if_ki = KiRedemptionRule::Fixed;
        payoff.ki_redemption_floor = Some(0.4);
        assert_eq!(payoff.ki_redemption(0.55), 0.4);

        payoff.redemption_if_ki = KiRedemptionRule::Floored;
        assert_eq!(payoff.ki_redemption(0.55), 0.55);
        assert_eq!(payoff.ki_redemption(0.25), 0.4);

        // Missing floor defaults to zero
        payoff.ki_redemption_floor = None;
        payoff.redemption_if_ki = KiRedemptionRule::Fixed;
        assert_eq!(payoff.ki_redemption(0.55), 0.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let ts = term_sheet();
        let json = serde_json::to_string(&ts).unwrap();
        let parsed: TermSheet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_json_rejects_unknown_keys() {
        let mut value = serde_json::to_value(term_sheet()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("surprise".to_string(), serde_json::json!(1));
        assert!(serde_json::from_value::<TermSheet>(value).is_err());
    }

    #[test]
    fn test_json_enums_are_fixed_strings() {
        let ts = term_sheet();
        let value = serde_json::to_value(&ts).unwrap();

        assert_eq!(value["ki_barrier"]["monitoring"], "continuous");
        assert_eq!(value["payoff"]["redemption_if_ki"], "worst_performance");
        assert_eq!(value["discount_curve"]["type"], "flat");
        assert_eq!(value["discount_curve"]["day_count"], "ACT/365F");
    }
}
