//! Error types for date handling.

use thiserror::Error;

use super::time::Date;

/// Errors arising from date construction and day-count arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    /// The (year, month, day) triple does not form a valid calendar date.
    #[error("Invalid date: {year}-{month:02}-{day:02}")]
    InvalidDate {
        /// Year component.
        year: i32,
        /// Month component (1-12).
        month: u32,
        /// Day component (1-31).
        day: u32,
    },

    /// The string could not be parsed as an ISO-8601 date.
    #[error("Failed to parse date: {0}")]
    ParseError(String),

    /// Year fractions require the end date on or after the start date.
    #[error("End date {end} is before start date {start}")]
    ReversedDates {
        /// Accrual start date.
        start: Date,
        /// Accrual end date.
        end: Date,
    },
}
