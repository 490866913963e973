//! Greeks via finite-difference bumping with common random numbers.
//!
//! Every repricing reuses the base seed, so the same normals and uniforms
//! drive the base and bumped scenarios and path-level noise cancels in the
//! differences. Bumps are expressed as market overlays; the term sheet is
//! never copied or mutated.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use autocall_models::TermSheet;
use autocall_pricing::{AutocallPricer, MarketOverlay, PriceResult, PricingError, RunConfig};

/// Seed substituted when the run configuration carries none.
///
/// CRN needs a pinned seed; a nondeterministic Greeks run would be noise.
pub const DEFAULT_CRN_SEED: u64 = 42;

/// Errors from the risk layer.
#[derive(Debug, Error)]
pub enum RiskError {
    /// A bump size is outside its admissible range.
    #[error("{field} is {value}, must be in (0, 0.10]")]
    BumpOutOfRange {
        /// The offending bump parameter.
        field: &'static str,
        /// Its value.
        value: f64,
    },

    /// The underlying pricing run failed.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Bump configuration for finite-difference Greeks.
#[derive(Debug, Clone, PartialEq)]
pub struct BumpConfig {
    /// Relative spot bump for Delta (0.01 = 1%).
    pub spot_bump: f64,
    /// Vol bump for Vega: absolute vol points, or relative when
    /// `vega_bump_relative` is set.
    pub vol_bump: f64,
    /// Interpret `vol_bump` multiplicatively.
    pub vega_bump_relative: bool,
    /// Absolute rate bump for Rho (1e-4 = 1bp).
    pub rho_bump: f64,
    /// Use central differences (two reprices per Greek) instead of forward.
    pub use_central_diff: bool,
    /// Compute portfolio-level Rho.
    pub compute_rho: bool,
}

impl Default for BumpConfig {
    fn default() -> Self {
        Self {
            spot_bump: 0.01,
            vol_bump: 0.01,
            vega_bump_relative: false,
            rho_bump: 1e-4,
            use_central_diff: true,
            compute_rho: false,
        }
    }
}

impl BumpConfig {
    /// Validates the bump sizes.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::BumpOutOfRange`] when the spot or vol bump lies
    /// outside (0, 0.10].
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.spot_bump <= 0.0 || self.spot_bump > 0.10 {
            return Err(RiskError::BumpOutOfRange {
                field: "spot_bump",
                value: self.spot_bump,
            });
        }
        if self.vol_bump <= 0.0 || self.vol_bump > 0.10 {
            return Err(RiskError::BumpOutOfRange {
                field: "vol_bump",
                value: self.vol_bump,
            });
        }
        Ok(())
    }
}

/// Diagnostics recorded alongside the Greeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskDiagnostics {
    /// Bumped repricings performed (the base price is not counted).
    pub num_repricings: usize,
    /// Seed shared by every scenario.
    pub base_seed: u64,
    /// Paths per pricing run.
    pub total_paths: usize,
}

/// Greeks result: the base valuation plus per-underlying sensitivities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskResult {
    /// Base (unbumped) pricing result.
    pub base: PriceResult,
    /// Per-underlying Delta: dPV per unit fractional spot move.
    pub delta: BTreeMap<String, f64>,
    /// Delta as a percentage of notional.
    pub delta_pct: BTreeMap<String, f64>,
    /// Per-underlying Vega: dPV per unit vol move.
    pub vega: BTreeMap<String, f64>,
    /// Portfolio Rho (dPV per unit rate move), when requested.
    pub rho: Option<f64>,
    /// Run diagnostics.
    pub diagnostics: RiskDiagnostics,
}

/// Computes Delta, Vega and optionally Rho by CRN bump-and-reprice.
///
/// When the run configuration carries no seed, [`DEFAULT_CRN_SEED`] is
/// substituted so that all scenarios share one stream.
///
/// # Errors
///
/// Returns [`RiskError`] for invalid bump sizes or any failed repricing.
pub fn compute_risk(
    term_sheet: &TermSheet,
    run_config: &RunConfig,
    bump_config: &BumpConfig,
) -> Result<RiskResult, RiskError> {
    bump_config.validate()?;

    let base_seed = match run_config.seed() {
        Some(seed) => seed,
        None => {
            info!(seed = DEFAULT_CRN_SEED, "no seed provided, using default for CRN");
            DEFAULT_CRN_SEED
        }
    };
    let seeded = run_config.with_seed(base_seed);
    let pricer = AutocallPricer::new(seeded);

    let base = pricer.price(term_sheet)?;
    let notional = term_sheet.meta.notional;
    let mut num_repricings = 0usize;

    let mut reprice = |overlay: &MarketOverlay| -> Result<f64, RiskError> {
        num_repricings += 1;
        Ok(pricer.price_with_overlay(term_sheet, overlay)?.pv)
    };

    let mut delta = BTreeMap::new();
    let mut delta_pct = BTreeMap::new();
    let mut vega = BTreeMap::new();

    for underlying in &term_sheet.underlyings {
        let id = underlying.id.as_str();

        // Delta: relative spot bump
        let bump = bump_config.spot_bump;
        let up = reprice(&MarketOverlay::default().with_spot_factor(id, 1.0 + bump))?;
        let raw_delta = if bump_config.use_central_diff {
            let down = reprice(&MarketOverlay::default().with_spot_factor(id, 1.0 - bump))?;
            (up - down) / (2.0 * bump)
        } else {
            (up - base.pv) / bump
        };
        delta.insert(id.to_string(), raw_delta);
        delta_pct.insert(id.to_string(), raw_delta / notional * 100.0);

        // Vega: vol-point bump (or relative when configured)
        let bump = bump_config.vol_bump;
        let relative = bump_config.vega_bump_relative;
        let up = reprice(
            &MarketOverlay::default()
                .with_vol_shift(id, bump)
                .with_relative_vol_shifts(relative),
        )?;
        let raw_vega = if bump_config.use_central_diff {
            let down = reprice(
                &MarketOverlay::default()
                    .with_vol_shift(id, -bump)
                    .with_relative_vol_shifts(relative),
            )?;
            (up - down) / (2.0 * bump)
        } else {
            (up - base.pv) / bump
        };
        vega.insert(id.to_string(), raw_vega);
    }

    let rho = if bump_config.compute_rho {
        let bump = bump_config.rho_bump;
        let up = reprice(&MarketOverlay::default().with_rate_shift(bump))?;
        let value = if bump_config.use_central_diff {
            let down = reprice(&MarketOverlay::default().with_rate_shift(-bump))?;
            (up - down) / (2.0 * bump)
        } else {
            (up - base.pv) / bump
        };
        Some(value)
    } else {
        None
    };

    let diagnostics = RiskDiagnostics {
        num_repricings,
        base_seed,
        total_paths: base.num_paths,
    };

    Ok(RiskResult {
        base,
        delta,
        delta_pct,
        vega,
        rho,
        diagnostics,
    })
}
