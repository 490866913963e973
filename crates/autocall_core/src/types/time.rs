//! Date type and day count conventions.
//!
//! This module provides:
//! - `Date`: type-safe date wrapper around `chrono::NaiveDate`
//! - `DayCountConvention`: market-standard year fraction conventions
//!
//! # Examples
//!
//! ```
//! use autocall_core::types::time::{Date, DayCountConvention};
//!
//! let start = Date::from_ymd(2024, 1, 15).unwrap();
//! let end = Date::from_ymd(2024, 7, 15).unwrap();
//!
//! let yf = DayCountConvention::Act365Fixed.year_fraction(start, end).unwrap();
//! assert!((yf - 182.0 / 365.0).abs() < 1e-12);
//! ```

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

use super::error::DateError;

/// Type-safe date wrapper around `chrono::NaiveDate`.
///
/// Serialises as an ISO-8601 string (`YYYY-MM-DD`) and supports standard
/// date arithmetic.
///
/// # Examples
///
/// ```
/// use autocall_core::types::time::Date;
///
/// let date = Date::from_ymd(2024, 6, 15).unwrap();
/// assert_eq!(date.to_string(), "2024-06-15");
///
/// let parsed: Date = "2024-06-15".parse().unwrap();
/// assert_eq!(date, parsed);
///
/// let later = Date::from_ymd(2024, 6, 25).unwrap();
/// assert_eq!(later - date, 10);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a date from year, month and day components.
    ///
    /// # Errors
    ///
    /// Returns [`DateError::InvalidDate`] when the triple does not form a
    /// valid calendar date (e.g. 30 February).
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or(DateError::InvalidDate { year, month, day })
    }

    /// Parses a date from an ISO-8601 string (`YYYY-MM-DD`).
    ///
    /// # Errors
    ///
    /// Returns [`DateError::ParseError`] when the string is malformed.
    pub fn parse(s: &str) -> Result<Self, DateError> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Date)
            .map_err(|e| DateError::ParseError(e.to_string()))
    }

    /// Returns the underlying `NaiveDate` for access to chrono's full API.
    #[inline]
    pub fn into_inner(self) -> NaiveDate {
        self.0
    }

    /// Returns the year component.
    #[inline]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the month component (1-12).
    #[inline]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Returns the day component (1-31).
    #[inline]
    pub fn day(&self) -> u32 {
        self.0.day()
    }
}

impl std::ops::Sub for Date {
    type Output = i64;

    /// Returns the number of days between two dates (negative when `self`
    /// is before `other`).
    fn sub(self, other: Self) -> i64 {
        (self.0 - other.0).num_days()
    }
}

impl FromStr for Date {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, DateError> {
        Date::parse(s)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Day count convention for year-fraction calculations.
///
/// # Variants
///
/// - `Act360`: actual days / 360 (money markets)
/// - `Act365Fixed`: actual days / 365 (most derivatives)
/// - `Thirty360`: 30/360 US bond basis with ISDA day adjustments
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayCountConvention {
    /// Actual/360: actual days / 360.0.
    Act360,

    /// Actual/365 Fixed: actual days / 365.0.
    Act365Fixed,

    /// 30/360 US bond basis.
    ///
    /// Each month is treated as 30 days with the ISDA adjustments:
    /// a start day of 31 becomes 30, and an end day of 31 becomes 30 when
    /// the adjusted start day is at least 30.
    Thirty360,
}

impl DayCountConvention {
    /// Returns the canonical convention name.
    ///
    /// These are the exact strings accepted by the term-sheet JSON schema.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            DayCountConvention::Act360 => "ACT/360",
            DayCountConvention::Act365Fixed => "ACT/365F",
            DayCountConvention::Thirty360 => "30/360",
        }
    }

    /// Calculates the year fraction between two dates.
    ///
    /// # Errors
    ///
    /// Returns [`DateError::ReversedDates`] when `end` is before `start`.
    ///
    /// # Examples
    ///
    /// ```
    /// use autocall_core::types::time::{Date, DayCountConvention};
    ///
    /// let start = Date::from_ymd(2024, 1, 1).unwrap();
    /// let end = Date::from_ymd(2024, 7, 1).unwrap();
    ///
    /// let yf = DayCountConvention::Act360.year_fraction(start, end).unwrap();
    /// assert!((yf - 182.0 / 360.0).abs() < 1e-12);
    /// ```
    pub fn year_fraction(&self, start: Date, end: Date) -> Result<f64, DateError> {
        if end < start {
            return Err(DateError::ReversedDates { start, end });
        }

        let yf = match self {
            DayCountConvention::Act360 => (end - start) as f64 / 360.0,
            DayCountConvention::Act365Fixed => (end - start) as f64 / 365.0,
            DayCountConvention::Thirty360 => {
                let (y1, m1, d1) = (start.year(), start.month(), start.day());
                let (y2, m2, d2) = (end.year(), end.month(), end.day());

                let d1_adj = if d1 == 31 { 30 } else { d1 };
                let d2_adj = if d2 == 31 && d1_adj >= 30 { 30 } else { d2 };

                let days = 360 * (y2 - y1)
                    + 30 * (m2 as i32 - m1 as i32)
                    + (d2_adj as i32 - d1_adj as i32);
                days as f64 / 360.0
            }
        };

        Ok(yf)
    }
}

impl FromStr for DayCountConvention {
    type Err = String;

    /// Parses a day count convention from its schema string
    /// (case-insensitive, a few common aliases accepted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace(['/', ' '], "").as_str() {
            "ACT360" | "ACTUAL360" => Ok(DayCountConvention::Act360),
            "ACT365F" | "ACT365" | "ACTUAL365" => Ok(DayCountConvention::Act365Fixed),
            "30360" | "THIRTY360" => Ok(DayCountConvention::Thirty360),
            _ => Err(format!("Unknown day count convention: {}", s)),
        }
    }
}

impl fmt::Display for DayCountConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl serde::Serialize for DayCountConvention {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for DayCountConvention {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DayCountConvention::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_date_from_ymd_valid() {
        let date = Date::from_ymd(2024, 6, 15).unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 6);
        assert_eq!(date.day(), 15);
    }

    #[test]
    fn test_date_from_ymd_invalid() {
        assert!(Date::from_ymd(2024, 2, 30).is_err());
        assert!(Date::from_ymd(2024, 13, 1).is_err());
        assert!(Date::from_ymd(2023, 2, 29).is_err());
    }

    #[test]
    fn test_date_parse() {
        let date = Date::parse("2024-06-15").unwrap();
        assert_eq!(date, Date::from_ymd(2024, 6, 15).unwrap());

        assert!(Date::parse("not-a-date").is_err());
        assert!(Date::parse("2024/06/15").is_err());
    }

    #[test]
    fn test_date_subtraction_and_ordering() {
        let earlier = Date::from_ymd(2024, 1, 1).unwrap();
        let later = Date::from_ymd(2024, 1, 11).unwrap();

        assert_eq!(later - earlier, 10);
        assert_eq!(earlier - later, -10);
        assert!(earlier < later);
    }

    #[test]
    fn test_date_display() {
        let date = Date::from_ymd(2024, 6, 5).unwrap();
        assert_eq!(format!("{}", date), "2024-06-05");
    }

    #[test]
    fn test_act_365f_known_dates() {
        let start = Date::from_ymd(2024, 1, 1).unwrap();
        let end = Date::from_ymd(2024, 7, 1).unwrap();

        let yf = DayCountConvention::Act365Fixed
            .year_fraction(start, end)
            .unwrap();
        assert_relative_eq!(yf, 182.0 / 365.0, epsilon = 1e-12);
    }

    #[test]
    fn test_act_360_known_dates() {
        let start = Date::from_ymd(2024, 1, 1).unwrap();
        let end = Date::from_ymd(2024, 7, 1).unwrap();

        let yf = DayCountConvention::Act360.year_fraction(start, end).unwrap();
        assert_relative_eq!(yf, 182.0 / 360.0, epsilon = 1e-12);
    }

    #[test]
    fn test_thirty_360_known_dates() {
        // 2024-01-01 to 2024-07-01: 6 whole months = 180 days in 30/360
        let start = Date::from_ymd(2024, 1, 1).unwrap();
        let end = Date::from_ymd(2024, 7, 1).unwrap();

        let yf = DayCountConvention::Thirty360
            .year_fraction(start, end)
            .unwrap();
        assert_relative_eq!(yf, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_thirty_360_day_adjustments() {
        // d1 = 31 -> 30, then d2 = 31 -> 30: exactly two 30-day months
        let start = Date::from_ymd(2024, 1, 31).unwrap();
        let end = Date::from_ymd(2024, 3, 31).unwrap();

        let yf = DayCountConvention::Thirty360
            .year_fraction(start, end)
            .unwrap();
        assert_relative_eq!(yf, 60.0 / 360.0, epsilon = 1e-12);
    }

    #[test]
    fn test_thirty_360_end_of_month_unadjusted() {
        // d2 = 31 with d1 < 30 keeps the 31st
        let start = Date::from_ymd(2024, 1, 15).unwrap();
        let end = Date::from_ymd(2024, 1, 31).unwrap();

        let yf = DayCountConvention::Thirty360
            .year_fraction(start, end)
            .unwrap();
        assert_relative_eq!(yf, 16.0 / 360.0, epsilon = 1e-12);
    }

    #[test]
    fn test_same_date_returns_zero() {
        let date = Date::from_ymd(2024, 6, 15).unwrap();

        for conv in [
            DayCountConvention::Act360,
            DayCountConvention::Act365Fixed,
            DayCountConvention::Thirty360,
        ] {
            assert_eq!(conv.year_fraction(date, date).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_reversed_dates_fail() {
        let start = Date::from_ymd(2024, 7, 1).unwrap();
        let end = Date::from_ymd(2024, 1, 1).unwrap();

        let result = DayCountConvention::Act365Fixed.year_fraction(start, end);
        assert!(matches!(result, Err(DateError::ReversedDates { .. })));
    }

    #[test]
    fn test_convention_names() {
        assert_eq!(DayCountConvention::Act360.name(), "ACT/360");
        assert_eq!(DayCountConvention::Act365Fixed.name(), "ACT/365F");
        assert_eq!(DayCountConvention::Thirty360.name(), "30/360");
    }

    #[test]
    fn test_convention_from_str() {
        assert_eq!(
            "ACT/360".parse::<DayCountConvention>().unwrap(),
            DayCountConvention::Act360
        );
        assert_eq!(
            "ACT/365F".parse::<DayCountConvention>().unwrap(),
            DayCountConvention::Act365Fixed
        );
        assert_eq!(
            "30/360".parse::<DayCountConvention>().unwrap(),
            DayCountConvention::Thirty360
        );
        assert!("INVALID".parse::<DayCountConvention>().is_err());
    }

    #[test]
    fn test_date_serde_roundtrip() {
        let date = Date::from_ymd(2024, 6, 15).unwrap();
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"2024-06-15\"");

        let parsed: Date = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, date);
    }

    #[test]
    fn test_convention_serde_roundtrip() {
        for conv in [
            DayCountConvention::Act360,
            DayCountConvention::Act365Fixed,
            DayCountConvention::Thirty360,
        ] {
            let json = serde_json::to_string(&conv).unwrap();
            let parsed: DayCountConvention = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, conv);
        }

        let parsed: DayCountConvention = serde_json::from_str("\"ACT/365F\"").unwrap();
        assert_eq!(parsed, DayCountConvention::Act365Fixed);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn date_strategy() -> impl Strategy<Value = Date> {
            (2000i32..2100i32, 1u32..13u32, 1u32..29u32)
                .prop_map(|(y, m, d)| Date::from_ymd(y, m, d).unwrap())
        }

        proptest! {
            #[test]
            fn year_fraction_non_negative(a in date_strategy(), b in date_strategy()) {
                let (start, end) = if a <= b { (a, b) } else { (b, a) };

                for conv in [
                    DayCountConvention::Act360,
                    DayCountConvention::Act365Fixed,
                    DayCountConvention::Thirty360,
                ] {
                    let yf = conv.year_fraction(start, end).unwrap();
                    prop_assert!(yf >= 0.0);
                    prop_assert!(yf.is_finite());
                }
            }

            #[test]
            fn act_ratio_is_constant(a in date_strategy(), b in date_strategy()) {
                let (start, end) = if a <= b { (a, b) } else { (b, a) };

                let yf_365 = DayCountConvention::Act365Fixed.year_fraction(start, end).unwrap();
                let yf_360 = DayCountConvention::Act360.year_fraction(start, end).unwrap();

                if yf_360 > 0.0 {
                    prop_assert!((yf_365 / yf_360 - 360.0 / 365.0).abs() < 1e-12);
                }
            }

            #[test]
            fn actual_conventions_are_additive(
                a in date_strategy(),
                b in date_strategy(),
                c in date_strategy(),
            ) {
                let mut dates = [a, b, c];
                dates.sort();
                let [d1, d2, d3] = dates;

                for conv in [DayCountConvention::Act360, DayCountConvention::Act365Fixed] {
                    let left = conv.year_fraction(d1, d2).unwrap();
                    let right = conv.year_fraction(d2, d3).unwrap();
                    let total = conv.year_fraction(d1, d3).unwrap();
                    prop_assert!((left + right - total).abs() < 1e-12);
                }
            }
        }
    }
}
