//! Pricing orchestration.
//!
//! [`AutocallPricer`] ties the grid builder, path generator and event
//! engine together: it partitions the path space into blocks, prices the
//! blocks in parallel over deterministic per-block RNG sub-streams, and
//! folds the block statistics in index order so a fixed configuration is
//! bit-exact regardless of thread count.

use std::collections::BTreeMap;
use std::time::Instant;

use autocall_core::{Date, DayCountConvention};
use autocall_models::TermSheet;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::RunConfig;
use crate::error::PricingError;
use crate::event::{BlockStats, EventEngine};
use crate::grid::build_simulation_grid;
use crate::overlay::MarketOverlay;
use crate::paths::PathGenerator;

/// Headline pricing result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceResult {
    /// Present value (mean discounted payoff).
    pub pv: f64,
    /// Standard error of the PV estimate (sample standard deviation over
    /// the square root of the path count).
    pub pv_std_error: f64,
    /// Share of paths that autocalled.
    pub autocall_probability: f64,
    /// Share of paths that knocked in.
    pub ki_probability: f64,
    /// Mean number of coupons received per path.
    pub expected_coupon_count: f64,
    /// Mean product lifetime in years.
    pub expected_life_years: f64,
    /// First-autocall probability per observation date.
    pub autocall_prob_by_date: BTreeMap<Date, f64>,
    /// Paths simulated (0 for a matured product).
    pub num_paths: usize,
    /// Simulation steps.
    pub num_steps: usize,
    /// Wall-clock pricing time in milliseconds.
    pub computation_time_ms: f64,
}

impl PriceResult {
    fn empty(computation_time_ms: f64) -> Self {
        Self {
            pv: 0.0,
            pv_std_error: 0.0,
            autocall_probability: 0.0,
            ki_probability: 0.0,
            expected_coupon_count: 0.0,
            expected_life_years: 0.0,
            autocall_prob_by_date: BTreeMap::new(),
            num_paths: 0,
            num_steps: 0,
            computation_time_ms,
        }
    }
}

/// Per-observation statistics carried by a detailed valuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationStats {
    /// Observation date.
    pub date: Date,
    /// Payment date.
    pub payment_date: Date,
    /// Discount factor to the payment date.
    pub discount_factor: f64,
    /// Paths that first autocalled here.
    pub autocall_paths: u64,
    /// Paths that received a coupon here (including on autocall).
    pub coupon_paths: u64,
    /// Undiscounted coupon amounts paid here, summed over paths.
    pub coupon_amount_sum: f64,
    /// Undiscounted autocall redemptions paid here, summed over paths.
    pub autocall_amount_sum: f64,
}

/// Maturity-leg statistics carried by a detailed valuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaturityStats {
    /// Maturity date.
    pub date: Date,
    /// Maturity payment date.
    pub payment_date: Date,
    /// Discount factor to the maturity payment date.
    pub discount_factor: f64,
    /// Surviving paths that redeemed without knock-in.
    pub no_ki_paths: u64,
    /// Surviving paths that redeemed after knock-in.
    pub ki_paths: u64,
    /// Undiscounted no-knock-in redemption amounts, summed over paths.
    pub no_ki_amount_sum: f64,
    /// Undiscounted knocked-in redemption amounts, summed over paths.
    pub ki_amount_sum: f64,
}

/// Detailed valuation: the headline result plus the per-leg statistics the
/// reporting layer consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Valuation {
    /// Headline result.
    pub result: PriceResult,
    /// Mean discounted coupon cashflow per path.
    pub coupon_pv: f64,
    /// Mean discounted autocall redemption per path.
    pub autocall_redemption_pv: f64,
    /// Mean discounted maturity redemption per path.
    pub maturity_redemption_pv: f64,
    /// Per-observation statistics (dates on the grid only).
    pub observations: Vec<ObservationStats>,
    /// Maturity-leg statistics; `None` for a matured product.
    pub maturity: Option<MaturityStats>,
    /// Coupon probability per observation date.
    pub coupon_prob_by_date: BTreeMap<Date, f64>,
}

impl Valuation {
    fn empty(computation_time_ms: f64) -> Self {
        Self {
            result: PriceResult::empty(computation_time_ms),
            coupon_pv: 0.0,
            autocall_redemption_pv: 0.0,
            maturity_redemption_pv: 0.0,
            observations: Vec::new(),
            maturity: None,
            coupon_prob_by_date: BTreeMap::new(),
        }
    }
}

/// Monte Carlo pricer for worst-of autocallable notes.
///
/// # Examples
///
/// ```no_run
/// use autocall_pricing::{AutocallPricer, RunConfig};
/// # fn term_sheet() -> autocall_models::TermSheet { unimplemented!() }
///
/// let config = RunConfig::builder()
///     .n_paths(100_000)
///     .seed(12345)
///     .build()
///     .unwrap();
///
/// let pricer = AutocallPricer::new(config);
/// let result = pricer.price(&term_sheet()).unwrap();
/// println!("PV: {:.2} +/- {:.2}", result.pv, result.pv_std_error);
/// ```
pub struct AutocallPricer {
    config: RunConfig,
}

impl AutocallPricer {
    /// Creates a pricer with the given run configuration.
    #[inline]
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Returns the run configuration.
    #[inline]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Prices the term sheet.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError`] for invalid inputs or internal numerical
    /// failure. A matured product (maturity before valuation) is not an
    /// error: it prices to zero with `num_paths == 0`.
    pub fn price(&self, term_sheet: &TermSheet) -> Result<PriceResult, PricingError> {
        self.price_with_overlay(term_sheet, &MarketOverlay::default())
    }

    /// Prices the term sheet under a bump overlay.
    pub fn price_with_overlay(
        &self,
        term_sheet: &TermSheet,
        overlay: &MarketOverlay,
    ) -> Result<PriceResult, PricingError> {
        self.valuate(term_sheet, overlay).map(|v| v.result)
    }

    /// Prices the term sheet and returns the detailed valuation.
    pub fn valuate(
        &self,
        term_sheet: &TermSheet,
        overlay: &MarketOverlay,
    ) -> Result<Valuation, PricingError> {
        let start = Instant::now();

        // Matured product: clean empty result, no validation noise
        if term_sheet.meta.maturity_date < term_sheet.meta.valuation_date {
            return Ok(Valuation::empty(elapsed_ms(start)));
        }

        term_sheet.validate()?;
        self.config.validate()?;

        let grid = build_simulation_grid(term_sheet, DayCountConvention::Act365Fixed)?;
        let base_seed = self.config.seed().unwrap_or_else(rand::random);

        let generator = PathGenerator::new(term_sheet, &grid, overlay, base_seed)?;
        let engine = EventEngine::new(term_sheet, &grid, overlay)?;

        // Partition the path space into blocks of at most block_size paths.
        let n_paths = self.config.n_paths();
        let block_size = self.config.block_size();
        let blocks: Vec<(u64, usize)> = (0..n_paths)
            .step_by(block_size)
            .enumerate()
            .map(|(index, offset)| (index as u64, block_size.min(n_paths - offset)))
            .collect();

        // Blocks run in parallel; collect preserves block order so the fold
        // below is deterministic for a fixed configuration.
        let block_stats: Vec<BlockStats> = blocks
            .par_iter()
            .map(|&(block_index, block_paths)| {
                let paths = generator.generate_block(block_index, block_paths);
                engine.evaluate_block(&paths)
            })
            .collect();

        let mut stats = BlockStats::new(engine.slots().len());
        for block in &block_stats {
            stats.merge(block);
        }

        self.aggregate(&engine, grid.num_steps(), stats, start)
    }

    fn aggregate(
        &self,
        engine: &EventEngine,
        num_steps: usize,
        stats: BlockStats,
        start: Instant,
    ) -> Result<Valuation, PricingError> {
        let n = stats.n_paths as f64;
        let pv = stats.sum_pv / n;

        let variance = (stats.sum_pv_sq - stats.sum_pv * stats.sum_pv / n) / (n - 1.0);
        let pv_std_error = variance.max(0.0).sqrt() / n.sqrt();

        if !pv.is_finite() || !pv_std_error.is_finite() {
            return Err(PricingError::NonFinitePv);
        }

        let mut autocall_prob_by_date = BTreeMap::new();
        let mut coupon_prob_by_date = BTreeMap::new();
        let mut observations = Vec::new();
        for (i, slot) in engine.slots().iter().enumerate() {
            if slot.grid_index.is_none() {
                continue;
            }
            autocall_prob_by_date.insert(slot.date, stats.autocall_paths_by_obs[i] as f64 / n);
            coupon_prob_by_date.insert(slot.date, stats.coupon_paths_by_obs[i] as f64 / n);
            observations.push(ObservationStats {
                date: slot.date,
                payment_date: slot.payment_date,
                discount_factor: slot.discount_factor,
                autocall_paths: stats.autocall_paths_by_obs[i],
                coupon_paths: stats.coupon_paths_by_obs[i],
                coupon_amount_sum: stats.coupon_amount_by_obs[i],
                autocall_amount_sum: stats.autocall_amount_by_obs[i],
            });
        }

        let (maturity_date, maturity_payment_date, df_maturity) = engine.maturity_dates();
        let maturity = Some(MaturityStats {
            date: maturity_date,
            payment_date: maturity_payment_date,
            discount_factor: df_maturity,
            no_ki_paths: stats.maturity_no_ki_paths,
            ki_paths: stats.maturity_ki_paths,
            no_ki_amount_sum: stats.maturity_no_ki_amount_sum,
            ki_amount_sum: stats.maturity_ki_amount_sum,
        });

        let result = PriceResult {
            pv,
            pv_std_error,
            autocall_probability: stats.autocall_paths as f64 / n,
            ki_probability: stats.ki_paths as f64 / n,
            expected_coupon_count: stats.sum_coupon_count / n,
            expected_life_years: stats.sum_life_years / n,
            autocall_prob_by_date,
            num_paths: stats.n_paths,
            num_steps,
            computation_time_ms: elapsed_ms(start),
        };

        Ok(Valuation {
            result,
            coupon_pv: stats.coupon_pv_sum / n,
            autocall_redemption_pv: stats.autocall_redemption_pv_sum / n,
            maturity_redemption_pv: stats.maturity_redemption_pv_sum / n,
            observations,
            maturity,
            coupon_prob_by_date,
        })
    }
}

#[inline]
fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1_000.0
}
