//! # Autocall Pricing (L3: Engine)
//!
//! Monte Carlo pricing engine for worst-of autocallable notes.
//!
//! The pipeline has four subsystems:
//! 1. [`grid`]: merges observation, ex-dividend, valuation and maturity
//!    dates into a deterministic time grid
//! 2. [`paths`]: correlated multi-asset GBM with piecewise-constant vol,
//!    discrete dividend jumps and Brownian-bridge knock-in monitoring
//! 3. [`event`]: deterministic per-path payoff evaluation (autocall,
//!    memory coupons, maturity redemption)
//! 4. [`pricer`]: block-parallel orchestration and aggregation
//!
//! Determinism: the path space is partitioned into blocks, each drawing
//! from an RNG sub-stream derived purely from `(seed, block index, stream
//! kind)`. Identical configurations price bit-exactly regardless of thread
//! count, and bump overlays reuse every draw (common random numbers).

#![warn(missing_docs)]

pub mod barrier;
pub mod config;
pub mod error;
pub mod event;
pub mod grid;
pub mod overlay;
pub mod paths;
pub mod pricer;
pub mod rng;

pub use config::{ConfigError, RunConfig, RunConfigBuilder};
pub use error::PricingError;
pub use event::{BlockStats, EventEngine};
pub use grid::{build_simulation_grid, EventType, SimulationGrid};
pub use overlay::MarketOverlay;
pub use paths::{PathGenerator, SimulatedPaths};
pub use pricer::{AutocallPricer, MaturityStats, ObservationStats, PriceResult, Valuation};
pub use rng::{SimRng, StreamKind};
