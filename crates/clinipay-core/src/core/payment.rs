// crates/clinipay-core/src/core/payment.rs
// ============================================================================
// Module: Clinipay Payment Records
// Description: Payment and invoice records with status enums and audit trails.
// Purpose: Capture the ledger's view of obligations and submitted documents.
// Dependencies: crate::core::{identifiers, money, time}, serde
// ============================================================================

//! ## Overview
//! A [`Payment`] is one obligation to pay a physician for one competence
//! period; an [`Invoice`] is one submitted document attempting to satisfy a
//! payment. Status fields are mutated only by the workflow engine through
//! ledger store transitions keyed on expected prior status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::InvoiceId;
use crate::core::identifiers::PaymentId;
use crate::core::identifiers::PhysicianId;
use crate::core::identifiers::StorageRef;
use crate::core::identifiers::UserId;
use crate::core::money::Amount;
use crate::core::time::CompetencePeriod;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Payment Status
// ============================================================================

/// Payment lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and store matching.
/// - `paid` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting an invoice request from finance.
    Pending,
    /// An invoice has been requested from the physician.
    Solicited,
    /// An invoice was received and awaits a manager decision.
    InvoiceReceived,
    /// The invoice was approved; payment release is pending.
    Approved,
    /// The payment was released.
    Paid,
    /// The obligation was cancelled administratively.
    Cancelled,
}

impl PaymentStatus {
    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Solicited => "solicited",
            Self::InvoiceReceived => "invoice_received",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

// ============================================================================
// SECTION: Payment
// ============================================================================

/// One obligation to pay a physician for one competence period.
///
/// # Invariants
/// - Exactly one non-cancelled payment exists per (physician, period).
/// - `net_amount`, once set, is `<=` `gross_amount`.
/// - Status fields are written only through ledger transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment identifier.
    pub id: PaymentId,
    /// Physician who is owed the payment.
    pub physician_id: PhysicianId,
    /// Calendar month the payment covers.
    pub competence: CompetencePeriod,
    /// Pre-deduction invoice value.
    pub gross_amount: Amount,
    /// Post-deduction value actually payable, when known.
    pub net_amount: Option<Amount>,
    /// Payment lifecycle status.
    pub status: PaymentStatus,
    /// When the invoice was requested from the physician.
    pub solicited_at: Option<Timestamp>,
    /// When a manager decided on the submitted invoice.
    pub responded_at: Option<Timestamp>,
    /// When the payment was released.
    pub paid_at: Option<Timestamp>,
}

/// Insert payload for a new payment.
///
/// # Invariants
/// - The ledger store assigns the identifier and rejects duplicate
///   (physician, period) pairs atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    /// Physician who is owed the payment.
    pub physician_id: PhysicianId,
    /// Calendar month the payment covers.
    pub competence: CompetencePeriod,
    /// Pre-deduction invoice value.
    pub gross_amount: Amount,
}

/// Optional field stamps applied together with a payment status transition.
///
/// # Invariants
/// - `None` fields are left untouched by the transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentStamps {
    /// Solicitation timestamp to set.
    pub solicited_at: Option<Timestamp>,
    /// Response timestamp to set.
    pub responded_at: Option<Timestamp>,
    /// Payment timestamp to set.
    pub paid_at: Option<Timestamp>,
    /// Net amount to set.
    pub net_amount: Option<Amount>,
}

// ============================================================================
// SECTION: Invoice Status
// ============================================================================

/// Invoice lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and store matching.
/// - `approved` and `rejected` are terminal per invoice instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Awaiting a manager decision.
    Pending,
    /// Approved; satisfies the owning payment.
    Approved,
    /// Rejected; a new invoice must be submitted.
    Rejected,
}

impl InvoiceStatus {
    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

// ============================================================================
// SECTION: OCR Outcome
// ============================================================================

/// Fields extracted from a submitted document by the OCR collaborator.
///
/// # Invariants
/// - Any field may be absent; absence is never an error.
/// - `processed` is `false` when extraction was skipped or failed outright.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOutcome {
    /// Printed invoice number, when recognized.
    pub invoice_number: Option<String>,
    /// Printed gross amount, when recognized.
    pub gross_amount: Option<Amount>,
    /// Printed net amount, when recognized.
    pub net_amount: Option<Amount>,
    /// Whether extraction ran to completion.
    pub processed: bool,
}

impl OcrOutcome {
    /// Returns an outcome representing skipped or failed extraction.
    #[must_use]
    pub fn unprocessed() -> Self {
        Self::default()
    }
}

// ============================================================================
// SECTION: Invoice
// ============================================================================

/// One submitted fiscal document attempting to satisfy a payment.
///
/// # Invariants
/// - At most one invoice per payment is `pending` or `approved` at a time.
/// - Decided invoices are immutable except for audited net adjustments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice identifier.
    pub id: InvoiceId,
    /// Owning payment.
    pub payment_id: PaymentId,
    /// Submitting physician.
    pub physician_id: PhysicianId,
    /// Reference to the stored document.
    pub file_ref: StorageRef,
    /// Original filename as submitted.
    pub original_filename: String,
    /// SHA-256 hex digest of the stored document bytes.
    pub content_hash: String,
    /// Invoice lifecycle status.
    pub status: InvoiceStatus,
    /// Rejection or adjustment notes.
    pub notes: Option<String>,
    /// OCR extraction outcome.
    pub ocr: OcrOutcome,
    /// Net amount recorded for this invoice, when known.
    pub net_amount: Option<Amount>,
    /// Creation timestamp; part of the action token derivation.
    pub created_at: Timestamp,
    /// Decision timestamp, set exactly once.
    pub decided_at: Option<Timestamp>,
}

/// Insert payload for a new invoice.
///
/// # Invariants
/// - The ledger store assigns the identifier and enforces the open-invoice
///   uniqueness invariant atomically at insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    /// Owning payment.
    pub payment_id: PaymentId,
    /// Submitting physician.
    pub physician_id: PhysicianId,
    /// Reference to the stored document.
    pub file_ref: StorageRef,
    /// Original filename as submitted.
    pub original_filename: String,
    /// SHA-256 hex digest of the stored document bytes.
    pub content_hash: String,
    /// OCR extraction outcome.
    pub ocr: OcrOutcome,
    /// Net amount recorded for this invoice, when known.
    pub net_amount: Option<Amount>,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Net Adjustment Audit
// ============================================================================

/// Audit record for an administrative net-amount correction.
///
/// # Invariants
/// - Records are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetAdjustment {
    /// Adjusted invoice.
    pub invoice_id: InvoiceId,
    /// Owning payment.
    pub payment_id: PaymentId,
    /// Net amount before the adjustment.
    pub previous_net: Option<Amount>,
    /// Net amount after the adjustment.
    pub new_net: Amount,
    /// Stated reason for the adjustment.
    pub reason: String,
    /// Back-office user who made the adjustment.
    pub actor: UserId,
    /// Adjustment timestamp.
    pub adjusted_at: Timestamp,
}

// ============================================================================
// SECTION: Contacts
// ============================================================================

/// Messaging endpoints for one notification recipient.
///
/// # Invariants
/// - `phone`, when present, is a digits-only international number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name used in message bodies and attempt logs.
    pub display_name: String,
    /// Digits-only mobile number, when registered.
    pub phone: Option<String>,
    /// E-mail address, when registered.
    pub email: Option<String>,
    /// Whether the recipient opted in to workflow notifications.
    pub opted_in: bool,
}
