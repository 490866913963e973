//! Expected cashflow tables and PV decomposition.
//!
//! Both reports are read off the detailed valuation statistics: the event
//! engine already tracks, per observation, how many paths received a coupon
//! or autocalled and the amounts actually paid (memory and
//! coupon-on-autocall included), so the table reconciles with the headline
//! PV to Monte Carlo associativity.

use serde::Serialize;

use autocall_core::Date;
use autocall_models::TermSheet;
use autocall_pricing::{AutocallPricer, MarketOverlay, PricingError, RunConfig};

/// Cashflow classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CashflowKind {
    /// Conditional coupon (including memory catch-up and coupons paid on
    /// autocall).
    Coupon,
    /// Early redemption on autocall.
    AutocallRedemption,
    /// Maturity redemption without knock-in.
    MaturityNoKi,
    /// Maturity redemption after knock-in.
    MaturityWithKi,
}

/// One expected cashflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cashflow {
    /// Observation (or maturity) date.
    pub date: Date,
    /// Payment date.
    pub payment_date: Date,
    /// Classification.
    pub kind: CashflowKind,
    /// Expected undiscounted amount (mean over all paths).
    pub expected_amount: f64,
    /// Discount factor from valuation to the payment date.
    pub discount_factor: f64,
    /// Expected discounted amount.
    pub pv_contribution: f64,
    /// Probability of the cashflow occurring.
    pub probability: f64,
}

/// PV split into coupon and redemption components.
///
/// `total_pv` equals the sum of the three components up to floating-point
/// associativity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PvDecomposition {
    /// Expected discounted coupons.
    pub coupon_pv: f64,
    /// Expected discounted autocall redemptions.
    pub autocall_redemption_pv: f64,
    /// Expected discounted maturity redemptions.
    pub maturity_redemption_pv: f64,
    /// Headline PV.
    pub total_pv: f64,
    /// Paths simulated.
    pub num_paths: usize,
}

/// Generates the expected cashflow table for a term sheet.
///
/// Rows appear only for cashflows with positive probability, in date order
/// with coupons before redemptions on a shared date. A matured product
/// yields an empty table.
///
/// # Errors
///
/// Returns [`PricingError`] when the underlying valuation fails.
pub fn cashflow_report(
    term_sheet: &TermSheet,
    run_config: &RunConfig,
) -> Result<Vec<Cashflow>, PricingError> {
    let valuation = AutocallPricer::new(run_config.clone())
        .valuate(term_sheet, &MarketOverlay::default())?;

    let n = valuation.result.num_paths as f64;
    if valuation.result.num_paths == 0 {
        return Ok(Vec::new());
    }

    let mut cashflows = Vec::new();

    for obs in &valuation.observations {
        if obs.coupon_paths > 0 {
            let expected_amount = obs.coupon_amount_sum / n;
            cashflows.push(Cashflow {
                date: obs.date,
                payment_date: obs.payment_date,
                kind: CashflowKind::Coupon,
                expected_amount,
                discount_factor: obs.discount_factor,
                pv_contribution: expected_amount * obs.discount_factor,
                probability: obs.coupon_paths as f64 / n,
            });
        }
        if obs.autocall_paths > 0 {
            let expected_amount = obs.autocall_amount_sum / n;
            cashflows.push(Cashflow {
                date: obs.date,
                payment_date: obs.payment_date,
                kind: CashflowKind::AutocallRedemption,
                expected_amount,
                discount_factor: obs.discount_factor,
                pv_contribution: expected_amount * obs.discount_factor,
                probability: obs.autocall_paths as f64 / n,
            });
        }
    }

    if let Some(maturity) = &valuation.maturity {
        if maturity.no_ki_paths > 0 {
            let expected_amount = maturity.no_ki_amount_sum / n;
            cashflows.push(Cashflow {
                date: maturity.date,
                payment_date: maturity.payment_date,
                kind: CashflowKind::MaturityNoKi,
                expected_amount,
                discount_factor: maturity.discount_factor,
                pv_contribution: expected_amount * maturity.discount_factor,
                probability: maturity.no_ki_paths as f64 / n,
            });
        }
        if maturity.ki_paths > 0 {
            let expected_amount = maturity.ki_amount_sum / n;
            cashflows.push(Cashflow {
                date: maturity.date,
                payment_date: maturity.payment_date,
                kind: CashflowKind::MaturityWithKi,
                expected_amount,
                discount_factor: maturity.discount_factor,
                pv_contribution: expected_amount * maturity.discount_factor,
                probability: maturity.ki_paths as f64 / n,
            });
        }
    }

    Ok(cashflows)
}

/// Splits the PV into coupon, autocall-redemption and maturity-redemption
/// components.
///
/// # Errors
///
/// Returns [`PricingError`] when the underlying valuation fails.
pub fn pv_decomposition(
    term_sheet: &TermSheet,
    run_config: &RunConfig,
) -> Result<PvDecomposition, PricingError> {
    let valuation = AutocallPricer::new(run_config.clone())
        .valuate(term_sheet, &MarketOverlay::default())?;

    Ok(PvDecomposition {
        coupon_pv: valuation.coupon_pv,
        autocall_redemption_pv: valuation.autocall_redemption_pv,
        maturity_redemption_pv: valuation.maturity_redemption_pv,
        total_pv: valuation.result.pv,
        num_paths: valuation.result.num_paths,
    })
}
