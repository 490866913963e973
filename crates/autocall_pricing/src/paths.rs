//! Correlated GBM path generation with knock-in monitoring.
//!
//! Each block simulates under the risk-neutral measure
//!
//! ```text
//! log S_a(k+1) = log S_a(k) + (r_k - q_a - sigma^2/2) dt + sigma sqrt(dt) Z_corr
//! ```
//!
//! with piecewise-constant vol looked up at the step-end date, the curve
//! rate for the segment, continuous dividend yields, discrete dividend
//! jumps floored at [`SPOT_FLOOR`], and either Brownian-bridge (continuous)
//! or endpoint (discrete) knock-in monitoring.
//!
//! Paths are stored in reduced precision (`f32`); the step recursion and
//! all downstream accumulators run in `f64`.

use autocall_models::correlation::{build_correlation, CholeskyFactor, PSD_EPSILON};
use autocall_models::{BarrierMonitoring, TermSheet};

use crate::barrier::bridge_hit_probability;
use crate::error::PricingError;
use crate::grid::SimulationGrid;
use crate::overlay::MarketOverlay;
use crate::rng::{SimRng, StreamKind};

/// Floor applied after discrete dividend subtraction.
pub const SPOT_FLOOR: f64 = 0.01;

/// One block of simulated paths.
///
/// `spots` is laid out `[path][step][asset]` row-major. `spots[:, 0, :]`
/// equals the initial spots for every path; `ki_state` is monotone
/// non-decreasing in step and `ki_step` records the first touch (or -1).
#[derive(Clone, Debug)]
pub struct SimulatedPaths {
    /// Number of paths in this block.
    pub n_paths: usize,
    /// Number of simulation steps.
    pub n_steps: usize,
    /// Number of assets.
    pub n_assets: usize,
    /// Spot paths in reduced precision, `[path][step][asset]`.
    pub spots: Vec<f32>,
    /// Whether the path has touched the knock-in barrier.
    pub ki_state: Vec<bool>,
    /// Step of the first barrier touch, or -1.
    pub ki_step: Vec<i32>,
}

impl SimulatedPaths {
    /// Spot for `(path, step, asset)` widened to `f64`.
    #[inline]
    pub fn spot(&self, path: usize, step: usize, asset: usize) -> f64 {
        let stride = (self.n_steps + 1) * self.n_assets;
        self.spots[path * stride + step * self.n_assets + asset] as f64
    }
}

struct KiMonitor {
    monitoring: BarrierMonitoring,
    /// Absolute barrier per asset (level times initial spot).
    barriers: Vec<f64>,
}

/// Monte Carlo path generator.
///
/// Precomputes the per-step vol and rate arrays, dividend jumps, continuous
/// yields and the Cholesky factor at construction; [`generate_block`]
/// is then a pure function of the block index, so blocks can run on any
/// thread in any order with identical results.
///
/// [`generate_block`]: PathGenerator::generate_block
pub struct PathGenerator {
    base_seed: u64,
    n_assets: usize,
    n_steps: usize,
    spots_0: Vec<f64>,
    /// Vol per (grid index, asset), `(n_steps + 1) * n_assets`.
    vols: Vec<f64>,
    /// Continuous yield per (grid index, asset); mixed-model yields are
    /// gated on the horizon, so pre-horizon steps carry zero.
    yields: Vec<f64>,
    /// Short rate per grid index (step k -> k+1 uses index k+1).
    rates: Vec<f64>,
    dt: Vec<f64>,
    /// Dividend jumps per grid index, (asset index, amount).
    dividends: Vec<Vec<(usize, f64)>>,
    /// Whether each grid index carries an observation tag.
    observation_steps: Vec<bool>,
    cholesky: CholeskyFactor,
    ki: Option<KiMonitor>,
}

impl PathGenerator {
    /// Builds a generator for a validated term sheet and grid.
    ///
    /// The overlay perturbs initial spots, vols and the short rate without
    /// touching the term sheet.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError`] when the correlation cannot be factorised
    /// even after repair.
    pub fn new(
        term_sheet: &TermSheet,
        grid: &SimulationGrid,
        overlay: &MarketOverlay,
        base_seed: u64,
    ) -> Result<Self, PricingError> {
        let n_assets = term_sheet.num_assets();
        let n_steps = grid.num_steps();

        let spots_0: Vec<f64> = term_sheet
            .underlyings
            .iter()
            .map(|u| u.spot * overlay.spot_factor(&u.id))
            .collect();

        let mut vols = vec![0.0; (n_steps + 1) * n_assets];
        for (asset, underlying) in term_sheet.underlyings.iter().enumerate() {
            let vol_model = match overlay.vol_shift(&underlying.id) {
                Some(shift) => underlying
                    .vol_model
                    .shifted(shift, overlay.vol_shifts_relative()),
                None => underlying.vol_model.clone(),
            };
            for (idx, &date) in grid.dates.iter().enumerate() {
                vols[idx * n_assets + asset] = vol_model.vol_at(date);
            }
        }

        let mut yields = vec![0.0; (n_steps + 1) * n_assets];
        for (asset, underlying) in term_sheet.underlyings.iter().enumerate() {
            for idx in 1..=n_steps {
                yields[idx * n_assets + asset] = underlying
                    .dividend_model
                    .continuous_yield_between(grid.dates[idx - 1], grid.dates[idx]);
            }
        }

        let rates: Vec<f64> = grid
            .dates
            .iter()
            .map(|&date| term_sheet.discount_curve.rate_at(date) + overlay.rate_shift())
            .collect();

        let mut correlation = build_correlation(term_sheet)?;
        correlation.repair(PSD_EPSILON);
        let cholesky = correlation.cholesky(PSD_EPSILON)?;

        let ki = term_sheet.ki_barrier.map(|barrier| KiMonitor {
            monitoring: barrier.monitoring,
            barriers: spots_0.iter().map(|s| s * barrier.level).collect(),
        });

        let dividends: Vec<Vec<(usize, f64)>> = (0..=n_steps)
            .map(|idx| grid.dividends_at(idx).to_vec())
            .collect();
        let observation_steps: Vec<bool> =
            (0..=n_steps).map(|idx| grid.is_observation_step(idx)).collect();

        Ok(Self {
            base_seed,
            n_assets,
            n_steps,
            spots_0,
            vols,
            yields,
            rates,
            dt: grid.dt.clone(),
            dividends,
            observation_steps,
            cholesky,
            ki,
        })
    }

    /// Number of assets.
    #[inline]
    pub fn num_assets(&self) -> usize {
        self.n_assets
    }

    /// Generates one block of paths.
    ///
    /// Draw order per step is fixed (all diffusion normals, then all
    /// barrier uniforms), and draws are consumed even across degenerate
    /// `dt <= 0` steps, so the stream position never depends on market
    /// data. This is the CRN property for bumped reprices.
    pub fn generate_block(&self, block_index: u64, n_paths: usize) -> SimulatedPaths {
        let a = self.n_assets;
        let steps = self.n_steps;
        let stride = (steps + 1) * a;

        let mut rng_diffusion = SimRng::for_block(self.base_seed, block_index, StreamKind::Diffusion);
        let continuous_ki = matches!(
            &self.ki,
            Some(monitor) if monitor.monitoring == BarrierMonitoring::Continuous
        );
        let mut rng_barrier =
            continuous_ki.then(|| SimRng::for_block(self.base_seed, block_index, StreamKind::BarrierUniform));

        let mut spots = vec![0.0f32; n_paths * stride];
        let mut ki_state = vec![false; n_paths];
        let mut ki_step = vec![-1i32; n_paths];

        // f64 working state per (path, asset); storage is f32 snapshots
        let mut current = Vec::with_capacity(n_paths * a);
        for _ in 0..n_paths {
            current.extend_from_slice(&self.spots_0);
        }
        for p in 0..n_paths {
            for asset in 0..a {
                spots[p * stride + asset] = self.spots_0[asset] as f32;
            }
        }

        let mut normals = vec![0.0; n_paths * a];
        let mut uniforms = vec![0.0; if continuous_ki { n_paths * a } else { 0 }];
        let mut shocks = vec![0.0; a];

        for step in 0..steps {
            rng_diffusion.fill_normal(&mut normals);
            if let Some(rng) = rng_barrier.as_mut() {
                rng.fill_uniform(&mut uniforms);
            }

            let end = step + 1;
            let dt = self.dt[end];

            if dt <= 0.0 {
                for p in 0..n_paths {
                    for asset in 0..a {
                        spots[p * stride + end * a + asset] = current[p * a + asset] as f32;
                    }
                }
                continue;
            }

            let sqrt_dt = dt.sqrt();
            let rate = self.rates[end];

            for p in 0..n_paths {
                self.cholesky
                    .correlate_into(&normals[p * a..(p + 1) * a], &mut shocks);
                for asset in 0..a {
                    let vol = self.vols[end * a + asset];
                    let drift = (rate - self.yields[end * a + asset] - 0.5 * vol * vol) * dt;
                    let log_ret = drift + vol * sqrt_dt * shocks[asset];
                    current[p * a + asset] *= log_ret.exp();
                }
            }

            for &(asset, amount) in &self.dividends[end] {
                let amount = amount.max(0.0);
                for p in 0..n_paths {
                    let spot = &mut current[p * a + asset];
                    *spot = (*spot - amount).max(SPOT_FLOOR);
                }
            }

            for p in 0..n_paths {
                for asset in 0..a {
                    spots[p * stride + end * a + asset] = current[p * a + asset] as f32;
                }
            }

            if let Some(ki) = &self.ki {
                match ki.monitoring {
                    BarrierMonitoring::Continuous => {
                        for asset in 0..a {
                            let barrier = ki.barriers[asset];
                            let vol = self.vols[end * a + asset];
                            for p in 0..n_paths {
                                if ki_state[p] {
                                    continue;
                                }
                                let s_start = spots[p * stride + step * a + asset] as f64;
                                let s_end = spots[p * stride + end * a + asset] as f64;
                                let hit_prob =
                                    bridge_hit_probability(s_start, s_end, barrier, vol, dt);
                                if uniforms[p * a + asset] < hit_prob {
                                    ki_state[p] = true;
                                    ki_step[p] = end as i32;
                                }
                            }
                        }
                    }
                    BarrierMonitoring::Discrete => {
                        if self.observation_steps[end] {
                            for asset in 0..a {
                                let barrier = ki.barriers[asset];
                                for p in 0..n_paths {
                                    if ki_state[p] {
                                        continue;
                                    }
                                    let s_end = spots[p * stride + end * a + asset] as f64;
                                    if s_end <= barrier {
                                        ki_state[p] = true;
                                        ki_step[p] = end as i32;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        SimulatedPaths {
            n_paths,
            n_steps: steps,
            n_assets: a,
            spots,
            ki_state,
            ki_step,
        }
    }
}
