//! Brownian-bridge barrier hit probability.
//!
//! For a down barrier H and a GBM segment observed at its endpoints, the
//! probability that the continuous path touched H in between has the closed
//! form
//!
//! ```text
//! P(min S <= H | S_k, S_k+1) = exp(-2 ln(S_k/H) ln(S_k+1/H) / (sigma^2 dt))
//! ```
//!
//! valid when both endpoints sit above the barrier. Touched endpoints are a
//! certain hit; degenerate segments (dt <= 0 or vanishing variance) cannot
//! be hit from the interior.

/// Variance below which the interior hit probability collapses to zero.
const MIN_VARIANCE: f64 = 1e-12;

/// Probability that a GBM path with endpoints `s_start`, `s_end` touched
/// the down barrier during a step of length `dt`.
///
/// The result is clamped to [0, 1]. Non-positive inputs (barrier or
/// endpoints) yield zero.
///
/// # Examples
///
/// ```
/// use autocall_pricing::barrier::bridge_hit_probability;
///
/// // Endpoint at the barrier: certain hit
/// assert_eq!(bridge_hit_probability(100.0, 60.0, 60.0, 0.25, 0.5), 1.0);
///
/// // Far above the barrier: low probability
/// let p = bridge_hit_probability(100.0, 110.0, 60.0, 0.20, 0.25);
/// assert!(p < 0.10);
/// ```
pub fn bridge_hit_probability(s_start: f64, s_end: f64, barrier: f64, vol: f64, dt: f64) -> f64 {
    if barrier <= 0.0 || s_start <= 0.0 || s_end <= 0.0 {
        return 0.0;
    }

    if s_start <= barrier || s_end <= barrier {
        return 1.0;
    }

    if dt <= 0.0 {
        return 0.0;
    }

    let variance = vol * vol * dt;
    if variance <= MIN_VARIANCE {
        return 0.0;
    }

    let exponent = -2.0 * (s_start / barrier).ln() * (s_end / barrier).ln() / variance;
    exponent.min(0.0).exp()
}
