// crates/clinipay-core/src/core/time.rs
// ============================================================================
// Module: Clinipay Time Model
// Description: Explicit timestamps and competence periods.
// Purpose: Keep workflow transitions deterministic and replayable.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Clinipay uses explicit time values supplied by callers at transition
//! boundaries. The core engine never reads wall-clock time directly; hosts
//! (CLI, HTTP server) mint timestamps and pass them in. Competence periods
//! identify the calendar month a payment covers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp in unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Competence Period
// ============================================================================

/// Errors raised when parsing competence periods.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    /// The input string is not a `YYYY-MM` period.
    #[error("invalid competence period: {0}")]
    InvalidPeriod(String),
}

/// Calendar month a payment covers, with `YYYY-MM` wire form.
///
/// # Invariants
/// - `month` is in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompetencePeriod {
    /// Calendar year.
    year: i32,
    /// Calendar month (1-based).
    month: u8,
}

impl CompetencePeriod {
    /// Creates a competence period (returns `None` when the month is out of range).
    #[must_use]
    pub const fn new(year: i32, month: u8) -> Option<Self> {
        if month >= 1 && month <= 12 {
            Some(Self {
                year,
                month,
            })
        } else {
            None
        }
    }

    /// Returns the calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Returns the calendar month (1-based).
    #[must_use]
    pub const fn month(self) -> u8 {
        self.month
    }
}

impl fmt::Display for CompetencePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for CompetencePeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::InvalidPeriod(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for CompetencePeriod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CompetencePeriod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::CompetencePeriod;

    #[test]
    fn period_round_trips_through_wire_form() {
        let period: CompetencePeriod = "2026-08".parse().unwrap();
        assert_eq!(period.year(), 2026);
        assert_eq!(period.month(), 8);
        assert_eq!(period.to_string(), "2026-08");
    }

    #[test]
    fn period_rejects_out_of_range_month() {
        assert!("2026-13".parse::<CompetencePeriod>().is_err());
        assert!("2026-00".parse::<CompetencePeriod>().is_err());
        assert!("2026".parse::<CompetencePeriod>().is_err());
    }
}
