// crates/clinipay-server/src/audit.rs
// ============================================================================
// Module: Server Audit Logging
// Description: Structured audit events for action links and inbound webhooks.
// Purpose: Emit JSON-line audit records without hard logging dependencies.
// Dependencies: clinipay-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every action-link decision and every inbound webhook produces one audit
//! event. Sinks are intentionally lightweight so deployments can route the
//! JSON lines into their preferred pipeline without redesign; the default
//! sink writes to stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clinipay_core::InvoiceId;
use clinipay_core::PaymentId;
use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Audit event for one action-link decision attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ActionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Invoice the action named.
    pub invoice_id: Option<u64>,
    /// Action label (`approve` / `reject`).
    pub action: &'static str,
    /// Normalized outcome label.
    pub outcome: &'static str,
    /// Stated rejection reason, when present.
    pub reason: Option<String>,
}

impl ActionAuditEvent {
    /// Creates an action event with a consistent timestamp.
    #[must_use]
    pub fn new(
        invoice_id: Option<InvoiceId>,
        action: &'static str,
        outcome: &'static str,
        reason: Option<String>,
    ) -> Self {
        Self {
            event: "action_decision",
            timestamp_ms: unix_millis(),
            invoice_id: invoice_id.map(InvoiceId::get),
            action,
            outcome,
            reason,
        }
    }
}

/// Audit event for one inbound webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Inbound event kind label.
    pub kind: String,
    /// Masked sender address, when present.
    pub sender: Option<String>,
    /// Payment the event was associated with, when association succeeded.
    pub payment_id: Option<u64>,
    /// Normalized outcome label.
    pub outcome: &'static str,
}

impl WebhookAuditEvent {
    /// Creates a webhook event with a consistent timestamp.
    #[must_use]
    pub fn new(
        kind: &str,
        sender: Option<&str>,
        payment_id: Option<PaymentId>,
        outcome: &'static str,
    ) -> Self {
        Self {
            event: "webhook",
            timestamp_ms: unix_millis(),
            kind: kind.to_string(),
            sender: sender.map(mask_sender),
            payment_id: payment_id.map(PaymentId::get),
            outcome,
        }
    }
}

/// Returns the current unix time in milliseconds.
fn unix_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Masks all but the last four characters of a sender address.
fn mask_sender(sender: &str) -> String {
    let len = sender.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let masked: String = "*".repeat(len.saturating_sub(4));
    let tail: String = sender.chars().skip(len.saturating_sub(4)).collect();
    format!("{masked}{tail}")
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for server events.
pub trait AuditSink: Send + Sync {
    /// Records an action-link decision event.
    fn record_action(&self, event: &ActionAuditEvent);

    /// Records an inbound webhook event.
    fn record_webhook(&self, event: &WebhookAuditEvent);
}

/// Shared audit sink handle.
pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_action(&self, event: &ActionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_webhook(&self, event: &WebhookAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
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

    use super::mask_sender;

    #[test]
    fn sender_masking_keeps_only_the_tail() {
        assert_eq!(mask_sender("5531988887777"), "*********7777");
        assert_eq!(mask_sender("123"), "***");
    }
}
