//! # Autocall Risk (L4: Application)
//!
//! Sensitivities and reporting on top of the pricing engine:
//! - [`greeks`]: finite-difference Delta, Vega and optional Rho using
//!   common random numbers (CRN). Every repricing reuses the base seed, so
//!   path-level noise cancels in the differences
//! - [`report`]: expected cashflow tables and PV decomposition
//!
//! Bump scenarios never mutate the term sheet; they are expressed as
//! [`MarketOverlay`](autocall_pricing::MarketOverlay) perturbations threaded
//! through the engine.

pub mod greeks;
pub mod report;

pub use greeks::{compute_risk, BumpConfig, RiskDiagnostics, RiskError, RiskResult};
pub use report::{cashflow_report, pv_decomposition, Cashflow, CashflowKind, PvDecomposition};
