// crates/clinipay-notify/src/templates.rs
// ============================================================================
// Module: Message Templates
// Description: Renders one event into subject, text, and HTML bodies.
// Purpose: Keep wording and action-link construction in one place.
// Dependencies: clinipay-core
// ============================================================================

//! ## Overview
//! Rendering happens once per dispatch; channels pick the representation
//! they need. The `invoice_received` template carries the one-tap approve
//! and reject links, derived from the invoice identity and creation instant
//! so no token state exists anywhere.

// ============================================================================
// SECTION: Imports
// ============================================================================

use clinipay_core::ActionKind;
use clinipay_core::Invoice;
use clinipay_core::NotificationEvent;
use clinipay_core::token;

// ============================================================================
// SECTION: Rendered Message
// ============================================================================

/// Channel-agnostic rendering of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML body.
    pub html: String,
}

/// Builds the one-tap action URL for an invoice decision.
#[must_use]
pub fn action_url(public_base_url: &str, invoice: &Invoice, kind: ActionKind) -> String {
    let base = public_base_url.trim_end_matches('/');
    let token = token::encode(invoice.id, invoice.created_at, kind);
    format!("{base}/{}?invoice={}&token={token}", kind.as_str(), invoice.id)
}

/// Renders one event into subject, text, and HTML bodies.
#[must_use]
pub fn render(event: &NotificationEvent, public_base_url: &str) -> RenderedMessage {
    match event {
        NotificationEvent::InvoiceRequested {
            payment,
        } => {
            let text = format!(
                "Please submit your invoice for {} (gross amount {}).",
                payment.competence, payment.gross_amount
            );
            RenderedMessage {
                subject: format!("Invoice requested for {}", payment.competence),
                html: format!("<p>{text}</p>"),
                text,
            }
        }
        NotificationEvent::InvoiceReceived {
            invoice,
            payment,
        } => {
            let approve = action_url(public_base_url, invoice, ActionKind::Approve);
            let reject = action_url(public_base_url, invoice, ActionKind::Reject);
            let text = format!(
                "Invoice {} received for {} (gross amount {}).\n\nApprove: {approve}\nReject: {reject}",
                invoice.original_filename, payment.competence, payment.gross_amount
            );
            let html = format!(
                "<p>Invoice <strong>{}</strong> received for {} (gross amount {}).</p>\
                 <p><a href=\"{approve}\">Approve</a> &middot; <a href=\"{reject}\">Reject</a></p>",
                invoice.original_filename, payment.competence, payment.gross_amount
            );
            RenderedMessage {
                subject: format!("Invoice received for {}", payment.competence),
                text,
                html,
            }
        }
        NotificationEvent::InvoiceApproved {
            payment,
            ..
        } => {
            let text = format!(
                "Your invoice for {} was approved. Payment of {} will follow.",
                payment.competence,
                payment.net_amount.as_ref().unwrap_or(&payment.gross_amount)
            );
            RenderedMessage {
                subject: format!("Invoice approved for {}", payment.competence),
                html: format!("<p>{text}</p>"),
                text,
            }
        }
        NotificationEvent::InvoiceRejected {
            payment,
            reason,
            ..
        } => {
            let text = format!(
                "Your invoice for {} was rejected: {reason}. Please submit a corrected invoice.",
                payment.competence
            );
            RenderedMessage {
                subject: format!("Invoice rejected for {}", payment.competence),
                html: format!("<p>{text}</p>"),
                text,
            }
        }
        NotificationEvent::PaymentMade {
            payment,
        } => {
            let text = format!(
                "Your payment for {} ({}) has been released.",
                payment.competence,
                payment.net_amount.as_ref().unwrap_or(&payment.gross_amount)
            );
            RenderedMessage {
                subject: format!("Payment released for {}", payment.competence),
                html: format!("<p>{text}</p>"),
                text,
            }
        }
        NotificationEvent::AmountAdjusted {
            adjustment,
            payment,
        } => {
            let text = format!(
                "The net amount for {} was adjusted to {}: {}.",
                payment.competence, adjustment.new_net, adjustment.reason
            );
            RenderedMessage {
                subject: format!("Amount adjusted for {}", payment.competence),
                html: format!("<p>{text}</p>"),
                text,
            }
        }
        NotificationEvent::ReconciliationMismatch {
            payment,
            expected,
            extracted,
            difference,
        } => {
            let text = format!(
                "The submitted document for {} shows {extracted}, but the expected \
                 gross amount is {expected} (difference {difference}). The document \
                 was not accepted; please verify the invoice and submit again.",
                payment.competence
            );
            RenderedMessage {
                subject: format!("Invoice amount mismatch for {}", payment.competence),
                html: format!("<p>{text}</p>"),
                text,
            }
        }
        NotificationEvent::DailyDigest {
            summary,
        } => {
            let text = format!(
                "Daily summary for {}:\n\
                 - requested: {}\n- received: {}\n- approved: {} ({})\n\
                 - rejected: {}\n- paid: {} ({})",
                summary.date,
                summary.requested,
                summary.received,
                summary.approved,
                summary.approved_total,
                summary.rejected,
                summary.paid,
                summary.paid_total
            );
            let html = format!(
                "<p>Daily summary for {}</p><ul>\
                 <li>requested: {}</li><li>received: {}</li>\
                 <li>approved: {} ({})</li><li>rejected: {}</li>\
                 <li>paid: {} ({})</li></ul>",
                summary.date,
                summary.requested,
                summary.received,
                summary.approved,
                summary.approved_total,
                summary.rejected,
                summary.paid,
                summary.paid_total
            );
            RenderedMessage {
                subject: format!("Daily payment summary for {}", summary.date),
                text,
                html,
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
