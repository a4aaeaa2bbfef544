// crates/clinipay-core/src/core/errors.rs
// ============================================================================
// Module: Clinipay Error Taxonomy
// Description: Typed errors for workflow transitions, stores, and providers.
// Purpose: Keep expected conditions distinguishable from system failures.
// Dependencies: crate::core::money, thiserror
// ============================================================================

//! ## Overview
//! Ledger-mutating errors ([`WorkflowError::GuardViolation`],
//! [`WorkflowError::Validation`], [`WorkflowError::DuplicateSubmission`])
//! always abort before any write and surface synchronously to the caller.
//! Provider failures during notification dispatch are recovered locally and
//! never reach the code path that triggered the state transition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::money::Amount;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors returned by ledger store implementations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `OpenInvoiceExists` and `PeriodOccupied` are raised atomically at
///   insert, never from a separate check.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
    /// An invoice for the payment is already `pending` or `approved`.
    #[error("an open invoice already exists for this payment")]
    OpenInvoiceExists,
    /// A non-cancelled payment already covers the (physician, period) pair.
    #[error("a payment already exists for this physician and period")]
    PeriodOccupied,
    /// A conditional update matched no rows (stale expected status).
    #[error("conditional update conflict: {0}")]
    Conflict(String),
    /// Record serialization failed.
    #[error("serialization failure: {0}")]
    Serialization(String),
    /// The storage backend failed.
    #[error("store backend failure: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Provider Errors
// ============================================================================

/// Errors returned by external collaborator adapters.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Timeouts are reported as failures and never retried inline.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider call exceeded its bounded timeout.
    #[error("provider call timed out")]
    Timeout,
    /// The provider rejected the request.
    #[error("provider rejected the request: {0}")]
    Rejected(String),
    /// The provider was unreachable or failed outright.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// The request or response payload was invalid.
    #[error("invalid provider payload: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Workflow Errors
// ============================================================================

/// Typed rejections surfaced by workflow engine transitions.
///
/// # Invariants
/// - Guard and validation errors abort before any ledger write.
/// - `AlreadyProcessed` and `TokenInvalid` are distinct so the action-link
///   surface can render a calm message for legitimate double-taps.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The record is not in a state the transition allows.
    #[error("transition not allowed: {0}")]
    GuardViolation(String),
    /// A required field is missing or inconsistent.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A second concurrent invoice submission for the same payment.
    #[error("an invoice for this payment is already awaiting a decision")]
    DuplicateSubmission,
    /// The extracted gross amount failed tolerance against the expected amount.
    #[error("amount mismatch: expected {expected}, document shows {extracted}")]
    ReconciliationMismatch {
        /// Expected gross amount from the payment.
        expected: Amount,
        /// Gross amount extracted from the document.
        extracted: Amount,
        /// Signed difference `extracted - expected`.
        difference: Amount,
    },
    /// The presented action token does not match the derived token.
    #[error("invalid action token")]
    TokenInvalid,
    /// The invoice was already decided; the action is a stale retry.
    #[error("invoice already processed")]
    AlreadyProcessed,
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An external collaborator call failed during the transition.
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),
    /// The ledger store failed.
    #[error("store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::OpenInvoiceExists => Self::DuplicateSubmission,
            StoreError::Conflict(what) => Self::GuardViolation(what),
            other => Self::Store(other),
        }
    }
}
