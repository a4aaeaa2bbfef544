// crates/clinipay-core/src/core/events.rs
// ============================================================================
// Module: Clinipay Notification Events
// Description: Logical workflow events and notification delivery records.
// Purpose: Describe fan-out inputs and per-delivery audit outputs.
// Dependencies: crate::core::{identifiers, money, payment, time}, serde
// ============================================================================

//! ## Overview
//! A [`NotificationEvent`] is one logical state change the dispatcher fans
//! out to N (recipient, channel) pairs. Each delivery attempt produces one
//! [`DeliveryResult`] and one write-only [`NotificationAttempt`] log record;
//! the log is never consulted to decide whether to send.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::mpsc::Receiver;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::PaymentId;
use crate::core::money::Amount;
use crate::core::payment::Invoice;
use crate::core::payment::NetAdjustment;
use crate::core::payment::Payment;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Day Summary
// ============================================================================

/// Aggregated counts and totals for one calendar day.
///
/// # Invariants
/// - Totals are decimal-exact sums over the ledger, never running counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    /// Calendar day in `YYYY-MM-DD` form.
    pub date: String,
    /// Invoices requested during the day.
    pub requested: u64,
    /// Invoices received during the day.
    pub received: u64,
    /// Invoices approved during the day.
    pub approved: u64,
    /// Invoices rejected during the day.
    pub rejected: u64,
    /// Payments released during the day.
    pub paid: u64,
    /// Gross total of payments approved during the day.
    pub approved_total: Amount,
    /// Net total of payments released during the day.
    pub paid_total: Amount,
}

// ============================================================================
// SECTION: Notification Events
// ============================================================================

/// One logical workflow event to fan out to recipients.
///
/// # Invariants
/// - Events are emitted only after the triggering ledger transition commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Finance requested an invoice from the physician.
    InvoiceRequested {
        /// The solicited payment.
        payment: Payment,
    },
    /// An invoice was received and awaits a decision.
    InvoiceReceived {
        /// The submitted invoice.
        invoice: Invoice,
        /// The owning payment.
        payment: Payment,
    },
    /// A manager approved the invoice.
    InvoiceApproved {
        /// The approved invoice.
        invoice: Invoice,
        /// The owning payment.
        payment: Payment,
    },
    /// A manager rejected the invoice.
    InvoiceRejected {
        /// The rejected invoice.
        invoice: Invoice,
        /// The owning payment, returned to the request queue.
        payment: Payment,
        /// Stated rejection reason.
        reason: String,
    },
    /// The payment was released.
    PaymentMade {
        /// The paid payment.
        payment: Payment,
    },
    /// An administrative net-amount correction was recorded.
    AmountAdjusted {
        /// The audit record for the adjustment.
        adjustment: NetAdjustment,
        /// The owning payment with the propagated net amount.
        payment: Payment,
    },
    /// A submitted document's printed amount failed reconciliation.
    ReconciliationMismatch {
        /// The payment the submission targeted.
        payment: Payment,
        /// Expected gross amount from the payment.
        expected: Amount,
        /// Gross amount extracted from the document.
        extracted: Amount,
        /// Signed difference `extracted - expected`.
        difference: Amount,
    },
    /// Scheduled daily summary for managers.
    DailyDigest {
        /// Aggregated counts and totals for the day.
        summary: DaySummary,
    },
}

impl NotificationEvent {
    /// Returns the stable event label used in attempt logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvoiceRequested {
                ..
            } => "invoice_requested",
            Self::InvoiceReceived {
                ..
            } => "invoice_received",
            Self::InvoiceApproved {
                ..
            } => "invoice_approved",
            Self::InvoiceRejected {
                ..
            } => "invoice_rejected",
            Self::PaymentMade {
                ..
            } => "payment_made",
            Self::AmountAdjusted {
                ..
            } => "amount_adjusted",
            Self::ReconciliationMismatch {
                ..
            } => "reconciliation_mismatch",
            Self::DailyDigest {
                ..
            } => "daily_digest",
        }
    }

    /// Returns the payment the event concerns, when there is one.
    #[must_use]
    pub const fn payment_id(&self) -> Option<PaymentId> {
        match self {
            Self::InvoiceRequested {
                payment,
            }
            | Self::InvoiceReceived {
                payment,
                ..
            }
            | Self::InvoiceApproved {
                payment,
                ..
            }
            | Self::InvoiceRejected {
                payment,
                ..
            }
            | Self::PaymentMade {
                payment,
            }
            | Self::AmountAdjusted {
                payment,
                ..
            }
            | Self::ReconciliationMismatch {
                payment,
                ..
            } => Some(payment.id),
            Self::DailyDigest {
                ..
            } => None,
        }
    }
}

// ============================================================================
// SECTION: Channels
// ============================================================================

/// Outbound notification channel kinds.
///
/// # Invariants
/// - Variants are stable for attempt logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// WhatsApp text/media messages.
    WhatsApp,
    /// Transactional e-mail.
    Email,
    /// In-app realtime notification.
    Realtime,
}

impl ChannelKind {
    /// Returns the stable channel label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Email => "email",
            Self::Realtime => "realtime",
        }
    }
}

// ============================================================================
// SECTION: Delivery Results
// ============================================================================

/// Outcome of one delivery attempt.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The provider accepted the message.
    Delivered {
        /// Raw provider response, truncated for logging.
        provider_response: String,
    },
    /// The delivery failed; other deliveries are unaffected.
    Failed {
        /// Failure description.
        error: String,
    },
}

/// Result of one delivery to one recipient through one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Event label being delivered.
    pub event: String,
    /// Channel used for the delivery.
    pub channel: ChannelKind,
    /// Recipient display name.
    pub recipient: String,
    /// Target address (phone number, e-mail, or subscriber id).
    pub address: String,
    /// Delivery outcome.
    pub outcome: DeliveryOutcome,
}

impl DeliveryResult {
    /// Returns `true` when the delivery succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }
}

/// Write-only audit record for one delivery attempt.
///
/// # Invariants
/// - Records are appended after the attempt and never drive send decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAttempt {
    /// Event label that triggered the attempt.
    pub event: String,
    /// Channel used for the attempt.
    pub channel: ChannelKind,
    /// Recipient display name.
    pub recipient: String,
    /// Target address.
    pub address: String,
    /// Whether the provider accepted the message.
    pub success: bool,
    /// Raw provider response or failure description.
    pub provider_response: String,
    /// Payment the event concerned, when there was one.
    pub payment_id: Option<PaymentId>,
    /// Attempt timestamp.
    pub sent_at: Timestamp,
}

// ============================================================================
// SECTION: Dispatch Ticket
// ============================================================================

/// Handle for one background dispatch fan-out.
///
/// # Invariants
/// - Exactly `expected` results arrive on the receiver, one per delivery job.
/// - Dropping the ticket never cancels in-flight deliveries.
#[derive(Debug)]
pub struct DispatchTicket {
    /// Number of delivery jobs submitted.
    expected: usize,
    /// Receiver for per-job results.
    results: Receiver<DeliveryResult>,
}

impl DispatchTicket {
    /// Creates a ticket for `expected` jobs reporting on `results`.
    #[must_use]
    pub const fn new(expected: usize, results: Receiver<DeliveryResult>) -> Self {
        Self {
            expected,
            results,
        }
    }

    /// Returns the number of delivery jobs submitted.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }

    /// Blocks until every delivery job reports, returning all results.
    ///
    /// Results arrive in completion order; jobs that panic or disconnect are
    /// simply absent from the output.
    #[must_use]
    pub fn wait(self) -> Vec<DeliveryResult> {
        let mut out = Vec::with_capacity(self.expected);
        for _ in 0 .. self.expected {
            match self.results.recv() {
                Ok(result) => out.push(result),
                Err(_) => break,
            }
        }
        out
    }
}
