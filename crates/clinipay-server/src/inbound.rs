// crates/clinipay-server/src/inbound.rs
// ============================================================================
// Module: Inbound Webhook Router
// Description: Messaging-provider events routed into the workflow engine.
// Purpose: Turn chat documents and button taps into engine calls safely.
// Dependencies: clinipay-core, axum, base64, tokio
// ============================================================================

//! ## Overview
//! The messaging provider delivers three event kinds: an inbound document
//! (a physician replying with a PDF), a button tap, and a delivery receipt.
//! Documents must be associated with exactly the right payment or not at
//! all; the association chain tries the sender's open payment first, then
//! the latest outbound request addressed to any number variant, and finally
//! acknowledges without processing. A document is never attached to a
//! guessed payment. Every disposition produces one audit event, and the
//! provider always receives 2xx for a well-formed delivery so it stops
//! retrying.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clinipay_core::ActionKind;
use clinipay_core::InvoiceId;
use clinipay_core::InvoiceUpload;
use clinipay_core::Payment;
use clinipay_core::PaymentId;
use clinipay_core::WorkflowError;
use serde::Deserialize;
use serde_json::json;

use crate::audit::WebhookAuditEvent;
use crate::phone::variants;
use crate::state::AppState;
use crate::state::current_timestamp;

/// Header carrying the shared webhook verification token.
const VERIFY_HEADER: &str = "x-verify-token";

/// Fallback filename for documents delivered without one.
const DEFAULT_FILENAME: &str = "invoice.pdf";

// ============================================================================
// SECTION: Payload
// ============================================================================

/// One provider event delivered to `POST /hooks/messaging`.
#[derive(Debug, Deserialize)]
pub struct InboundEvent {
    /// Event kind: `document`, `button`, or `receipt`.
    pub kind: String,
    /// Sender address as the provider reports it.
    #[serde(default)]
    pub sender: Option<String>,
    /// Document filename, when the event carries one.
    #[serde(default)]
    pub filename: Option<String>,
    /// Base64-encoded document bytes, when the event carries a document.
    #[serde(default)]
    pub content_base64: Option<String>,
    /// Button payload (`approve:<invoice>:<token>`), when the event is a tap.
    #[serde(default)]
    pub button: Option<String>,
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// `POST /hooks/messaging` routes one provider event.
pub async fn messaging(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<InboundEvent>,
) -> impl IntoResponse {
    if let Some(expected) = state.webhook_verify_token.as_deref() {
        let presented = headers.get(VERIFY_HEADER).and_then(|value| value.to_str().ok());
        if presented != Some(expected) {
            acknowledge(&state, &event, None, "unauthorized");
            return disposition(StatusCode::UNAUTHORIZED, "unauthorized");
        }
    }
    match event.kind.as_str() {
        "document" => handle_document(state, event).await,
        "button" => handle_button(state, event).await,
        "receipt" => {
            acknowledge(&state, &event, None, "receipt_ignored");
            disposition(StatusCode::OK, "acknowledged")
        }
        _ => {
            acknowledge(&state, &event, None, "unknown_kind");
            disposition(StatusCode::BAD_REQUEST, "unknown_kind")
        }
    }
}

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Routes an inbound document through the association chain.
async fn handle_document(state: AppState, event: InboundEvent) -> (StatusCode, Json<serde_json::Value>) {
    if !state.workflow.allow_chat_submission {
        acknowledge(&state, &event, None, "chat_submission_disabled");
        return disposition(StatusCode::OK, "acknowledged");
    }
    let Some(sender) = event.sender.as_deref().filter(|sender| !sender.trim().is_empty()) else {
        acknowledge(&state, &event, None, "missing_sender");
        return disposition(StatusCode::BAD_REQUEST, "missing_sender");
    };
    let Some(encoded) = event.content_base64.as_deref() else {
        acknowledge(&state, &event, None, "missing_document");
        return disposition(StatusCode::BAD_REQUEST, "missing_document");
    };
    let Ok(bytes) = STANDARD.decode(encoded) else {
        acknowledge(&state, &event, None, "invalid_document");
        return disposition(StatusCode::BAD_REQUEST, "invalid_document");
    };

    let numbers = variants(sender, &state.workflow.default_country_code);
    let payment = match associate(&state, &numbers) {
        Ok(Some(payment)) => payment,
        Ok(None) => {
            // Never guess; acknowledged so the provider stops retrying.
            acknowledge(&state, &event, None, "unassociated");
            return disposition(StatusCode::OK, "acknowledged");
        }
        Err(_) => {
            acknowledge(&state, &event, None, "association_failed");
            return disposition(StatusCode::INTERNAL_SERVER_ERROR, "association_failed");
        }
    };

    let payment_id = payment.id;
    let upload = InvoiceUpload {
        bytes,
        filename: event
            .filename
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string(),
    };
    let engine = state.engine.clone();
    // Captured here, not at startup, so a transition runs under one
    // consistent view of the flags.
    let snapshot = state.workflow_snapshot();
    let outcome = tokio::task::spawn_blocking(move || {
        engine.submit_invoice(payment_id, upload, None, &snapshot, current_timestamp())
    })
    .await;
    match outcome {
        Ok(Ok(_)) => {
            acknowledge(&state, &event, Some(payment_id), "submitted");
            disposition(StatusCode::OK, "submitted")
        }
        Ok(Err(error)) => {
            let label = submission_label(&error);
            acknowledge(&state, &event, Some(payment_id), label);
            disposition(StatusCode::OK, label)
        }
        Err(_) => {
            acknowledge(&state, &event, Some(payment_id), "internal_error");
            disposition(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

/// Finds the payment an inbound document belongs to, or `None`.
///
/// Order: the sender's physician's open payment, then the payment of the
/// most recent outbound request addressed to any sender variant.
fn associate(state: &AppState, numbers: &[String]) -> Result<Option<Payment>, WorkflowError> {
    if numbers.is_empty() {
        return Ok(None);
    }
    if let Some(physician) = state.directory.physician_by_phone(numbers)?
        && let Some(payment) = state.ledger.open_payment_for_physician(physician)?
    {
        return Ok(Some(payment));
    }
    if let Some(payment_id) = state.attempts.latest_request_payment(numbers)? {
        return Ok(Some(state.ledger.payment(payment_id)?));
    }
    Ok(None)
}

/// Maps a submission failure to a stable disposition label.
fn submission_label(error: &WorkflowError) -> &'static str {
    match error {
        WorkflowError::DuplicateSubmission => "duplicate_submission",
        WorkflowError::ReconciliationMismatch {
            ..
        } => "reconciliation_mismatch",
        WorkflowError::GuardViolation(_) => "guard_violation",
        WorkflowError::Validation(_) => "validation_failed",
        WorkflowError::NotFound(_) => "not_found",
        _ => "submission_failed",
    }
}

// ============================================================================
// SECTION: Buttons
// ============================================================================

/// Routes a button tap carrying an `approve:<invoice>:<token>` payload.
///
/// Rejections need a typed reason and therefore always go through the web
/// form; a reject button payload is acknowledged without processing.
async fn handle_button(state: AppState, event: InboundEvent) -> (StatusCode, Json<serde_json::Value>) {
    let Some((invoice_id, token)) = event.button.as_deref().and_then(parse_approve_payload) else {
        acknowledge(&state, &event, None, "button_ignored");
        return disposition(StatusCode::OK, "acknowledged");
    };
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        engine.approve(invoice_id, &token, current_timestamp())
    })
    .await;
    let label = match outcome {
        Ok(Ok(_)) => "approved",
        Ok(Err(WorkflowError::AlreadyProcessed)) => "already_processed",
        Ok(Err(WorkflowError::TokenInvalid)) => "invalid_token",
        Ok(Err(WorkflowError::NotFound(_))) => "not_found",
        Ok(Err(_)) | Err(_) => "internal_error",
    };
    acknowledge(&state, &event, None, label);
    disposition(StatusCode::OK, label)
}

/// Parses an approve button payload into its invoice id and token.
fn parse_approve_payload(payload: &str) -> Option<(InvoiceId, String)> {
    let rest = payload.strip_prefix(ActionKind::Approve.as_str())?.strip_prefix(':')?;
    let (raw_id, token) = rest.split_once(':')?;
    let invoice_id = raw_id.parse().ok().and_then(InvoiceId::from_raw)?;
    if token.is_empty() {
        return None;
    }
    Some((invoice_id, token.to_string()))
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Records one webhook audit event for a disposition.
fn acknowledge(state: &AppState, event: &InboundEvent, payment: Option<PaymentId>, outcome: &'static str) {
    state.audit.record_webhook(&WebhookAuditEvent::new(
        &event.kind,
        event.sender.as_deref(),
        payment,
        outcome,
    ));
}

/// Builds the JSON disposition body the provider receives.
fn disposition(status: StatusCode, label: &'static str) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(json!({
            "status": label,
        })),
    )
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

    use super::parse_approve_payload;

    #[test]
    fn approve_payloads_parse_into_id_and_token() {
        let (invoice, token) = parse_approve_payload("approve:7:abc123").unwrap();
        assert_eq!(invoice.get(), 7);
        assert_eq!(token, "abc123");
    }

    #[test]
    fn malformed_payloads_are_ignored() {
        assert!(parse_approve_payload("reject:7:abc").is_none());
        assert!(parse_approve_payload("approve:0:abc").is_none());
        assert!(parse_approve_payload("approve:7:").is_none());
        assert!(parse_approve_payload("approve:7").is_none());
    }
}
