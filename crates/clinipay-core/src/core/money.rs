// crates/clinipay-core/src/core/money.rs
// ============================================================================
// Module: Clinipay Money Model
// Description: Currency-exact amounts for payments and invoices.
// Purpose: Provide decimal-aware monetary values with exact comparison.
// Dependencies: bigdecimal, serde, thiserror
// ============================================================================

//! ## Overview
//! All monetary values are decimal-exact. Floating point is never used for
//! money; comparison and difference computation go through [`bigdecimal`].
//! Amounts serialize as decimal strings on the wire so round-trips preserve
//! exact values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;
use std::ops::Sub;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use bigdecimal::Signed;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when parsing monetary values.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// The input string is not a valid decimal value.
    #[error("invalid decimal amount: {0}")]
    InvalidDecimal(String),
}

// ============================================================================
// SECTION: Amount
// ============================================================================

/// Currency-exact monetary amount.
///
/// # Invariants
/// - Equality and ordering are value-based (`1.0 == 1.00`).
/// - Differences may be negative; stored gross/net amounts are non-negative
///   by construction at the ledger boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(BigDecimal);

impl Amount {
    /// Creates an amount from a raw decimal value.
    #[must_use]
    pub const fn new(value: BigDecimal) -> Self {
        Self(value)
    }

    /// Creates an amount from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(BigDecimal::new(cents.into(), 2))
    }

    /// Parses an amount from a decimal string such as `"1234.56"`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidDecimal`] when the input is not a decimal.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        BigDecimal::from_str(input.trim())
            .map(Self)
            .map_err(|_| MoneyError::InvalidDecimal(input.to_string()))
    }

    /// Returns the zero amount.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigDecimal::from(0))
    }

    /// Returns the signed difference `self - other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self(&self.0 - &other.0)
    }

    /// Returns the absolute value of the amount.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Returns `true` when the amount is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Compares against another amount.
    #[must_use]
    pub fn cmp_value(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// Returns the inner decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> &BigDecimal {
        &self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Two decimal places for display; the stored value keeps full scale.
        self.0.with_scale(2).fmt(f)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
