//! Event engine: deterministic per-path payoff evaluation.
//!
//! Per observation date the order is fixed: autocall check, then coupon
//! check, then memory accrual. An autocalled path stops immediately. At
//! maturity, surviving paths redeem according to the knock-in state.
//!
//! The engine never throws per path; all accumulators are 64-bit.

use autocall_models::{Payoff, TermSheet};
use autocall_core::Date;

use crate::error::PricingError;
use crate::grid::SimulationGrid;
use crate::overlay::MarketOverlay;
use crate::paths::SimulatedPaths;

/// One observation slot with everything the per-path loop needs.
#[derive(Clone, Debug)]
pub(crate) struct ObservationSlot {
    pub date: Date,
    pub payment_date: Date,
    /// Grid index; `None` when the date fell before the valuation date.
    pub grid_index: Option<usize>,
    pub discount_factor: f64,
    pub autocall_level: f64,
    pub coupon_barrier: f64,
    pub coupon_rate: f64,
}

/// Per-block accumulators.
///
/// Sums (not means) so blocks merge exactly; the pricer divides once at
/// the end. Per-observation vectors are indexed by observation number.
#[derive(Clone, Debug)]
pub struct BlockStats {
    /// Paths evaluated.
    pub n_paths: usize,
    /// Sum of per-path discounted payoffs.
    pub sum_pv: f64,
    /// Sum of squares of per-path discounted payoffs.
    pub sum_pv_sq: f64,
    /// Paths that autocalled.
    pub autocall_paths: u64,
    /// Paths that knocked in.
    pub ki_paths: u64,
    /// Sum of coupon counts.
    pub sum_coupon_count: f64,
    /// Sum of per-path lifetimes in years.
    pub sum_life_years: f64,
    /// Sum of discounted coupon cashflows.
    pub coupon_pv_sum: f64,
    /// Sum of discounted autocall redemptions.
    pub autocall_redemption_pv_sum: f64,
    /// Sum of discounted maturity redemptions.
    pub maturity_redemption_pv_sum: f64,
    /// First-autocall paths per observation.
    pub autocall_paths_by_obs: Vec<u64>,
    /// Coupon-receiving paths per observation (including on autocall).
    pub coupon_paths_by_obs: Vec<u64>,
    /// Undiscounted coupon amounts per observation.
    pub coupon_amount_by_obs: Vec<f64>,
    /// Undiscounted autocall redemption amounts per observation.
    pub autocall_amount_by_obs: Vec<f64>,
    /// Surviving paths that redeemed without knock-in.
    pub maturity_no_ki_paths: u64,
    /// Surviving paths that redeemed after knock-in.
    pub maturity_ki_paths: u64,
    /// Undiscounted maturity redemption amounts without knock-in.
    pub maturity_no_ki_amount_sum: f64,
    /// Undiscounted maturity redemption amounts after knock-in.
    pub maturity_ki_amount_sum: f64,
}

impl BlockStats {
    pub(crate) fn new(n_obs: usize) -> Self {
        Self {
            n_paths: 0,
            sum_pv: 0.0,
            sum_pv_sq: 0.0,
            autocall_paths: 0,
            ki_paths: 0,
            sum_coupon_count: 0.0,
            sum_life_years: 0.0,
            coupon_pv_sum: 0.0,
            autocall_redemption_pv_sum: 0.0,
            maturity_redemption_pv_sum: 0.0,
            autocall_paths_by_obs: vec![0; n_obs],
            coupon_paths_by_obs: vec![0; n_obs],
            coupon_amount_by_obs: vec![0.0; n_obs],
            autocall_amount_by_obs: vec![0.0; n_obs],
            maturity_no_ki_paths: 0,
            maturity_ki_paths: 0,
            maturity_no_ki_amount_sum: 0.0,
            maturity_ki_amount_sum: 0.0,
        }
    }

    /// Merges another block into this one.
    ///
    /// Merging in block order keeps aggregation bit-exact for a fixed
    /// configuration regardless of how blocks were scheduled.
    pub fn merge(&mut self, other: &BlockStats) {
        self.n_paths += other.n_paths;
        self.sum_pv += other.sum_pv;
        self.sum_pv_sq += other.sum_pv_sq;
        self.autocall_paths += other.autocall_paths;
        self.ki_paths += other.ki_paths;
        self.sum_coupon_count += other.sum_coupon_count;
        self.sum_life_years += other.sum_life_years;
        self.coupon_pv_sum += other.coupon_pv_sum;
        self.autocall_redemption_pv_sum += other.autocall_redemption_pv_sum;
        self.maturity_redemption_pv_sum += other.maturity_redemption_pv_sum;
        for (a, b) in self
            .autocall_paths_by_obs
            .iter_mut()
            .zip(&other.autocall_paths_by_obs)
        {
            *a += b;
        }
        for (a, b) in self
            .coupon_paths_by_obs
            .iter_mut()
            .zip(&other.coupon_paths_by_obs)
        {
            *a += b;
        }
        for (a, b) in self
            .coupon_amount_by_obs
            .iter_mut()
            .zip(&other.coupon_amount_by_obs)
        {
            *a += b;
        }
        for (a, b) in self
            .autocall_amount_by_obs
            .iter_mut()
            .zip(&other.autocall_amount_by_obs)
        {
            *a += b;
        }
        self.maturity_no_ki_paths += other.maturity_no_ki_paths;
        self.maturity_ki_paths += other.maturity_ki_paths;
        self.maturity_no_ki_amount_sum += other.maturity_no_ki_amount_sum;
        self.maturity_ki_amount_sum += other.maturity_ki_amount_sum;
    }
}

/// Event-driven payoff evaluation engine.
pub struct EventEngine {
    notional: f64,
    worst_of: bool,
    coupon_memory: bool,
    coupon_on_autocall: bool,
    redemption_if_autocall: f64,
    redemption_if_no_ki: f64,
    payoff: Payoff,
    spots_0: Vec<f64>,
    slots: Vec<ObservationSlot>,
    maturity_index: usize,
    maturity_date: Date,
    maturity_payment_date: Date,
    df_maturity: f64,
    times: Vec<f64>,
}

impl EventEngine {
    /// Builds the engine for a validated term sheet and grid.
    ///
    /// Discount factors for every payment date and the maturity payment
    /// date are precomputed from the (possibly rate-shifted) curve; the
    /// worst-of performance divides by the (possibly spot-bumped) initial
    /// spots, mirroring the path generator's overlay.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Date`] when a payment date precedes the
    /// valuation date.
    pub fn new(
        term_sheet: &TermSheet,
        grid: &SimulationGrid,
        overlay: &MarketOverlay,
    ) -> Result<Self, PricingError> {
        let valuation = term_sheet.meta.valuation_date;
        let curve = if overlay.rate_shift() != 0.0 {
            term_sheet.discount_curve.shifted(overlay.rate_shift())
        } else {
            term_sheet.discount_curve.clone()
        };

        let spots_0: Vec<f64> = term_sheet
            .underlyings
            .iter()
            .map(|u| u.spot * overlay.spot_factor(&u.id))
            .collect();

        let schedules = &term_sheet.schedules;
        let mut slots = Vec::with_capacity(schedules.len());
        for i in 0..schedules.len() {
            let date = schedules.observation_dates[i];
            let payment_date = schedules.payment_dates[i];
            let grid_index = grid.observation_indices.get(&date).copied();
            let discount_factor = match grid_index {
                Some(_) => curve.discount_factor(valuation, payment_date)?,
                None => 1.0,
            };
            slots.push(ObservationSlot {
                date,
                payment_date,
                grid_index,
                discount_factor,
                autocall_level: schedules.autocall_levels[i],
                coupon_barrier: schedules.coupon_barriers[i],
                coupon_rate: schedules.coupon_rates[i],
            });
        }

        let df_maturity =
            curve.discount_factor(valuation, term_sheet.meta.maturity_payment_date)?;

        Ok(Self {
            notional: term_sheet.meta.notional,
            worst_of: term_sheet.payoff.worst_of,
            coupon_memory: term_sheet.payoff.coupon_memory,
            coupon_on_autocall: term_sheet.payoff.coupon_on_autocall,
            redemption_if_autocall: term_sheet.payoff.redemption_if_autocall,
            redemption_if_no_ki: term_sheet.payoff.redemption_if_no_ki,
            payoff: term_sheet.payoff.clone(),
            spots_0,
            slots,
            maturity_index: grid.maturity_index,
            maturity_date: term_sheet.meta.maturity_date,
            maturity_payment_date: term_sheet.meta.maturity_payment_date,
            df_maturity,
            times: grid.times.clone(),
        })
    }

    pub(crate) fn slots(&self) -> &[ObservationSlot] {
        &self.slots
    }

    pub(crate) fn maturity_dates(&self) -> (Date, Date, f64) {
        (self.maturity_date, self.maturity_payment_date, self.df_maturity)
    }

    /// Performance at a grid step: min (worst-of) or max over assets of
    /// spot over initial spot.
    #[inline]
    fn performance(&self, paths: &SimulatedPaths, path: usize, step: usize) -> f64 {
        let mut best = if self.worst_of {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        };
        for asset in 0..paths.n_assets {
            let perf = paths.spot(path, step, asset) / self.spots_0[asset];
            best = if self.worst_of {
                best.min(perf)
            } else {
                best.max(perf)
            };
        }
        best
    }

    /// Evaluates one block of paths.
    pub fn evaluate_block(&self, paths: &SimulatedPaths) -> BlockStats {
        let mut stats = BlockStats::new(self.slots.len());
        stats.n_paths = paths.n_paths;

        for p in 0..paths.n_paths {
            let mut alive = true;
            let mut unpaid_coupons = 0.0;
            let mut total_pv = 0.0;
            let mut coupon_count = 0u32;
            let mut autocall_step = -1i32;

            for (i, slot) in self.slots.iter().enumerate() {
                let Some(grid_step) = slot.grid_index else {
                    continue;
                };
                if !alive {
                    break;
                }

                let performance = self.performance(paths, p, grid_step);
                let df = slot.discount_factor;

                // 1. Autocall
                if performance >= slot.autocall_level {
                    let redemption = self.redemption_if_autocall * self.notional;
                    total_pv += redemption * df;
                    stats.autocall_redemption_pv_sum += redemption * df;
                    stats.autocall_amount_by_obs[i] += redemption;
                    stats.autocall_paths_by_obs[i] += 1;

                    if self.coupon_on_autocall {
                        // Memory pays out unconditionally on autocall
                        let coupon = if self.coupon_memory {
                            (slot.coupon_rate + unpaid_coupons) * self.notional
                        } else {
                            slot.coupon_rate * self.notional
                        };
                        total_pv += coupon * df;
                        stats.coupon_pv_sum += coupon * df;
                        stats.coupon_amount_by_obs[i] += coupon;
                        stats.coupon_paths_by_obs[i] += 1;
                        coupon_count += 1;
                    }

                    autocall_step = grid_step as i32;
                    alive = false;
                    continue;
                }

                // 2. Coupon
                if performance >= slot.coupon_barrier {
                    let coupon = if self.coupon_memory {
                        let amount = (slot.coupon_rate + unpaid_coupons) * self.notional;
                        unpaid_coupons = 0.0;
                        amount
                    } else {
                        slot.coupon_rate * self.notional
                    };
                    total_pv += coupon * df;
                    stats.coupon_pv_sum += coupon * df;
                    stats.coupon_amount_by_obs[i] += coupon;
                    stats.coupon_paths_by_obs[i] += 1;
                    coupon_count += 1;
                } else if self.coupon_memory {
                    // 3. Memory accrual
                    unpaid_coupons += slot.coupon_rate;
                }
            }

            // Maturity redemption for surviving paths
            if alive {
                let worst = self.performance(paths, p, self.maturity_index);
                let knocked_in = paths.ki_state[p];
                let redemption = if knocked_in {
                    self.payoff.ki_redemption(worst) * self.notional
                } else {
                    self.redemption_if_no_ki * self.notional
                };
                total_pv += redemption * self.df_maturity;
                stats.maturity_redemption_pv_sum += redemption * self.df_maturity;
                if knocked_in {
                    stats.maturity_ki_paths += 1;
                    stats.maturity_ki_amount_sum += redemption;
                } else {
                    stats.maturity_no_ki_paths += 1;
                    stats.maturity_no_ki_amount_sum += redemption;
                }
            }

            let life_years = if autocall_step >= 0 {
                self.times[autocall_step as usize]
            } else {
                self.times[self.maturity_index]
            };

            stats.sum_pv += total_pv;
            stats.sum_pv_sq += total_pv * total_pv;
            if autocall_step >= 0 {
                stats.autocall_paths += 1;
            }
            if paths.ki_state[p] {
                stats.ki_paths += 1;
            }
            stats.sum_coupon_count += coupon_count as f64;
            stats.sum_life_years += life_years;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::build_simulation_grid;
    use approx::assert_relative_eq;
    use autocall_core::{Date, DayCountConvention, RateCurve};
    use autocall_models::termsheet::dividends::DividendModel;
    use autocall_models::termsheet::volatility::VolModel;
    use autocall_models::{
        KiRedemptionRule, Meta, Payoff, Schedules, TermSheet, Underlying,
    };

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd(y, m, day).unwrap()
    }

    /// Single-asset sheet with two observations and controllable levels.
    fn test_sheet(autocall_levels: Vec<f64>, coupon_barriers: Vec<f64>) -> TermSheet {
        TermSheet {
            meta: Meta {
                product_id: "EV-001".to_string(),
                trade_date: d(2024, 1, 10),
                valuation_date: d(2024, 1, 15),
                settlement_date: d(2024, 1, 17),
                maturity_date: d(2025, 1, 15),
                maturity_payment_date: d(2025, 1, 15),
                currency: "USD".to_string(),
                notional: 1_000_000.0,
            },
            underlyings: vec![Underlying {
                id: "A".to_string(),
                spot: 100.0,
                currency: "USD".to_string(),
                dividend_model: DividendModel::none(),
                vol_model: VolModel::Flat { vol: 0.2 },
            }],
            discount_curve: RateCurve::flat(0.0),
            correlation: None,
            schedules: Schedules {
                observation_dates: vec![d(2024, 7, 15), d(2025, 1, 15)],
                payment_dates: vec![d(2024, 7, 15), d(2025, 1, 15)],
                autocall_levels,
                coupon_barriers,
                coupon_rates: vec![0.02, 0.02],
            },
            ki_barrier: None,
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

    /// Hand-built paths: one asset, values given per grid step.
    fn synthetic_paths(path_values: &[Vec<f64>], ki: &[bool]) -> SimulatedPaths {
        let n_paths = path_values.len();
        let n_steps = path_values[0].len() - 1;
        let mut spots = Vec::with_capacity(n_paths * (n_steps + 1));
        for path in path_values {
            for &v in path {
                spots.push(v as f32);
            }
        }
        SimulatedPaths {
            n_paths,
            n_steps,
            n_assets: 1,
            spots,
            ki_state: ki.to_vec(),
            ki_step: ki.iter().map(|&k| if k { 1 } else { -1 }).collect(),
        }
    }

    fn engine_for(ts: &TermSheet) -> EventEngine {
        let grid = build_simulation_grid(ts, DayCountConvention::Act365Fixed).unwrap();
        EventEngine::new(ts, &grid, &MarketOverlay::default()).unwrap()
    }

    #[test]
    fn test_autocall_stops_later_coupons() {
        let ts = test_sheet(vec![1.0, 1.0], vec![0.5, 0.5]);
        let engine = engine_for(&ts);

        // Path autocalls at the first observation (performance 1.1), so the
        // second observation and maturity never pay.
        let paths = synthetic_paths(&[vec![100.0, 110.0, 120.0]], &[false]);
        let stats = engine.evaluate_block(&paths);

        // Zero rate: df = 1. Redemption + one coupon
        assert_relative_eq!(stats.sum_pv, 1_020_000.0, epsilon = 1e-6);
        assert_eq!(stats.autocall_paths, 1);
        assert_eq!(stats.autocall_paths_by_obs, vec![1, 0]);
        assert_eq!(stats.sum_coupon_count, 1.0);
        assert_eq!(stats.maturity_no_ki_paths, 0);
    }

    #[test]
    fn test_memory_coupon_catch_up() {
        // No autocall; first coupon missed, second catches up both periods
        let ts = test_sheet(vec![2.0, 2.0], vec![0.8, 0.8]);
        let engine = engine_for(&ts);

        let paths = synthetic_paths(&[vec![100.0, 70.0, 90.0]], &[false]);
        let stats = engine.evaluate_block(&paths);

        // Coupon at obs 2: (0.02 + 0.02) * notional, plus maturity redemption
        assert_relative_eq!(stats.sum_pv, 40_000.0 + 1_000_000.0, epsilon = 1e-6);
        assert_eq!(stats.coupon_paths_by_obs, vec![0, 1]);
        assert_relative_eq!(stats.coupon_amount_by_obs[1], 40_000.0, epsilon = 1e-6);
        assert_eq!(stats.sum_coupon_count, 1.0);
    }

    #[test]
    fn test_memory_off_pays_period_rate_only() {
        let mut ts = test_sheet(vec![2.0, 2.0], vec![0.8, 0.8]);
        ts.payoff.coupon_memory = false;
        let engine = engine_for(&ts);

        let paths = synthetic_paths(&[vec![100.0, 70.0, 90.0]], &[false]);
        let stats = engine.evaluate_block(&paths);

        assert_relative_eq!(stats.sum_pv, 20_000.0 + 1_000_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_autocall_pays_accumulated_memory() {
        // Miss the first coupon, then autocall at the second observation:
        // the accumulated memory pays out with the redemption.
        let ts = test_sheet(vec![2.0, 1.0], vec![0.8, 0.8]);
        let engine = engine_for(&ts);

        let paths = synthetic_paths(&[vec![100.0, 70.0, 105.0]], &[false]);
        let stats = engine.evaluate_block(&paths);

        // Redemption + (0.02 + 0.02 memory) coupon
        assert_relative_eq!(stats.sum_pv, 1_000_000.0 + 40_000.0, epsilon = 1e-6);
        assert_eq!(stats.autocall_paths_by_obs, vec![0, 1]);
    }

    #[test]
    fn test_maturity_redemption_rules() {
        let make = |rule: KiRedemptionRule, floor: Option<f64>| {
            let mut ts = test_sheet(vec![2.0, 2.0], vec![1.9, 1.9]);
            ts.payoff.redemption_if_ki = rule;
            ts.payoff.ki_redemption_floor = floor;
            engine_for(&ts)
        };

        // Knocked-in path finishing at 55% of initial
        let paths = synthetic_paths(&[vec![100.0, 60.0, 55.0]], &[true]);

        let stats = make(KiRedemptionRule::WorstPerformance, None).evaluate_block(&paths);
        assert_relative_eq!(stats.sum_pv, 550_000.0, max_relative = 1e-6);

        let stats = make(KiRedemptionRule::Fixed, Some(0.7)).evaluate_block(&paths);
        assert_relative_eq!(stats.sum_pv, 700_000.0, max_relative = 1e-6);

        let stats = make(KiRedemptionRule::Floored, Some(0.7)).evaluate_block(&paths);
        assert_relative_eq!(stats.sum_pv, 700_000.0, max_relative = 1e-6);

        // Floored with performance above the floor pays the performance
        let paths_high = synthetic_paths(&[vec![100.0, 60.0, 80.0]], &[true]);
        let stats = make(KiRedemptionRule::Floored, Some(0.7)).evaluate_block(&paths_high);
        assert_relative_eq!(stats.sum_pv, 800_000.0, max_relative = 1e-6);
    }

    #[test]
    fn test_no_ki_redeems_at_par() {
        let ts = test_sheet(vec![2.0, 2.0], vec![1.9, 1.9]);
        let engine = engine_for(&ts);

        let paths = synthetic_paths(&[vec![100.0, 60.0, 55.0]], &[false]);
        let stats = engine.evaluate_block(&paths);

        assert_relative_eq!(stats.sum_pv, 1_000_000.0, epsilon = 1e-6);
        assert_eq!(stats.maturity_no_ki_paths, 1);
        assert_eq!(stats.maturity_ki_paths, 0);
        assert_eq!(stats.ki_paths, 0);
    }

    #[test]
    fn test_decomposition_components_sum_to_total() {
        let ts = test_sheet(vec![1.2, 1.0], vec![0.8, 0.8]);
        let engine = engine_for(&ts);

        let paths = synthetic_paths(
            &[
                vec![100.0, 125.0, 130.0], // autocalls at obs 1
                vec![100.0, 90.0, 105.0],  // coupons both, autocalls at obs 2
                vec![100.0, 70.0, 90.0],   // memory catch-up, survives
                vec![100.0, 50.0, 40.0],   // knocked in
            ],
            &[false, false, false, true],
        );
        let stats = engine.evaluate_block(&paths);

        let total_components = stats.coupon_pv_sum
            + stats.autocall_redemption_pv_sum
            + stats.maturity_redemption_pv_sum;
        assert_relative_eq!(total_components, stats.sum_pv, max_relative = 1e-12);
    }

    #[test]
    fn test_expected_life_uses_autocall_step() {
        let ts = test_sheet(vec![1.0, 1.0], vec![0.5, 0.5]);
        let grid = build_simulation_grid(&ts, DayCountConvention::Act365Fixed).unwrap();
        let engine = EventEngine::new(&ts, &grid, &MarketOverlay::default()).unwrap();

        let paths = synthetic_paths(
            &[
                vec![100.0, 110.0, 120.0], // autocalls at obs 1
                vec![100.0, 90.0, 95.0],   // survives to maturity
            ],
            &[false, false],
        );
        let stats = engine.evaluate_block(&paths);

        let obs1_time = grid.times[grid.observation_indices[&d(2024, 7, 15)]];
        let maturity_time = grid.times[grid.maturity_index];
        assert_relative_eq!(
            stats.sum_life_years,
            obs1_time + maturity_time,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_block_merge_matches_single_block() {
        let ts = test_sheet(vec![1.0, 1.0], vec![0.8, 0.8]);
        let engine = engine_for(&ts);

        let all = synthetic_paths(
            &[
                vec![100.0, 110.0, 120.0],
                vec![100.0, 90.0, 95.0],
                vec![100.0, 70.0, 60.0],
            ],
            &[false, false, true],
        );
        let first = synthetic_paths(&[vec![100.0, 110.0, 120.0]], &[false]);
        let second = synthetic_paths(
            &[vec![100.0, 90.0, 95.0], vec![100.0, 70.0, 60.0]],
            &[false, true],
        );

        let stats_all = engine.evaluate_block(&all);
        let mut merged = engine.evaluate_block(&first);
        merged.merge(&engine.evaluate_block(&second));

        assert_eq!(merged.n_paths, stats_all.n_paths);
        assert_relative_eq!(merged.sum_pv, stats_all.sum_pv, epsilon = 1e-9);
        assert_relative_eq!(merged.sum_pv_sq, stats_all.sum_pv_sq, max_relative = 1e-12);
        assert_eq!(merged.autocall_paths, stats_all.autocall_paths);
        assert_eq!(merged.ki_paths, stats_all.ki_paths);
    }
}
