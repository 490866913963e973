//! # Autocall Core (L1: Foundation)
//!
//! Core date and discounting types for the autocallable pricing engine.
//!
//! This crate provides:
//! - `Date`: a type-safe wrapper around `chrono::NaiveDate` with ISO-8601
//!   serialisation
//! - `DayCountConvention`: ACT/360, ACT/365F and 30/360 (ISDA) year fractions
//! - `RateCurve`: flat and piecewise step-constant continuously-compounded
//!   discount curves

#![warn(missing_docs)]

pub mod curves;
pub mod types;

pub use curves::{RateCurve, RatePoint};
pub use types::error::DateError;
pub use types::time::{Date, DayCountConvention};
