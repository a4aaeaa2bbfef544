// crates/clinipay-core/src/reconcile.rs
// ============================================================================
// Module: Clinipay Amount Reconciler
// Description: Tolerance check between expected and extracted gross amounts.
// Purpose: Gate invoice acceptance on currency-exact agreement.
// Dependencies: crate::core::money
// ============================================================================

//! ## Overview
//! The reconciler compares an extracted (OCR or operator-confirmed) gross
//! amount against the expected payment amount within a fixed tolerance.
//! Rejection is unconditional; there is no manual override inside this
//! component. Missing extraction yields [`ReconcileOutcome::Unknown`] so
//! the engine can fall through to manual net-amount entry instead of
//! auto-rejecting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::money::Amount;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Three-way reconciliation outcome.
///
/// # Invariants
/// - `difference` is signed: `extracted - expected`.
/// - `Unknown` is returned only when no extracted amount exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The extracted amount agrees with the expected amount within tolerance.
    Accepted {
        /// Signed difference `extracted - expected`.
        difference: Amount,
    },
    /// The extracted amount disagrees beyond tolerance.
    Rejected {
        /// Signed difference `extracted - expected`.
        difference: Amount,
    },
    /// No amount was extracted; the caller falls through to manual entry.
    Unknown,
}

// ============================================================================
// SECTION: Reconciliation
// ============================================================================

/// Returns the default tolerance of one monetary cent.
#[must_use]
pub fn default_tolerance() -> Amount {
    Amount::from_cents(1)
}

/// Reconciles an extracted gross amount against the expected amount.
///
/// The absolute difference is compared against `tolerance`; any discrepancy
/// beyond it indicates a different document or a transcription error, and
/// the cost of a false accept vastly exceeds the cost of a false reject.
#[must_use]
pub fn reconcile(
    expected: &Amount,
    extracted: Option<&Amount>,
    tolerance: &Amount,
) -> ReconcileOutcome {
    let Some(extracted) = extracted else {
        return ReconcileOutcome::Unknown;
    };
    let difference = extracted.difference(expected);
    if difference.abs() <= *tolerance {
        ReconcileOutcome::Accepted {
            difference,
        }
    } else {
        ReconcileOutcome::Rejected {
            difference,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
