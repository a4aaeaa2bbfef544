// crates/clinipay-server/src/actions.rs
// ============================================================================
// Module: Action Link Handlers
// Description: Tokenized approve/reject endpoints for notification links.
// Purpose: Let managers decide invoices from e-mail and chat without a login.
// Dependencies: clinipay-core, axum, tokio
// ============================================================================

//! ## Overview
//! Action links carry the invoice id and a constant-time-checked token; the
//! token is the entire credential. Responses are small HTML pages because the
//! clicker is a human in a mail client. A replayed link must read as a calm
//! "already processed" page, never as an error, and an invalid token must not
//! reveal whether the invoice exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Form;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::IntoResponse;
use clinipay_core::InvoiceId;
use clinipay_core::WorkflowError;
use serde::Deserialize;

use crate::audit::ActionAuditEvent;
use crate::state::AppState;
use crate::state::current_timestamp;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Query parameters on an approve link or a reject-form link.
#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    /// Invoice identifier.
    pub invoice: u64,
    /// Action token minted for the link.
    pub token: String,
}

/// Form body posted by the rejection page.
#[derive(Debug, Deserialize)]
pub struct RejectForm {
    /// Invoice identifier.
    pub invoice: u64,
    /// Action token minted for the link.
    pub token: String,
    /// Stated rejection reason.
    pub reason: String,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /approve` approves a pending invoice from a notification link.
pub async fn approve(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> impl IntoResponse {
    let Some(invoice_id) = InvoiceId::from_raw(query.invoice) else {
        record(&state, None, "approve", "not_found", None);
        return page(StatusCode::NOT_FOUND, "Not found", "The requested invoice was not found.");
    };
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        engine.approve(invoice_id, &query.token, current_timestamp())
    })
    .await;
    match outcome {
        Ok(Ok(invoice)) => {
            record(&state, Some(invoice_id), "approve", "approved", None);
            page(
                StatusCode::OK,
                "Invoice approved",
                &format!("Invoice #{} has been approved.", invoice.id.get()),
            )
        }
        Ok(Err(error)) => decision_error(&state, Some(invoice_id), "approve", &error),
        Err(_) => join_failure(&state, Some(invoice_id), "approve"),
    }
}

/// `GET /reject` renders the rejection-reason form for a notification link.
pub async fn reject_form(Query(query): Query<ActionQuery>) -> impl IntoResponse {
    let body = format!(
        "<h1>Reject invoice #{id}</h1>\
         <form method=\"post\" action=\"/reject\">\
         <input type=\"hidden\" name=\"invoice\" value=\"{id}\">\
         <input type=\"hidden\" name=\"token\" value=\"{token}\">\
         <label for=\"reason\">Reason</label>\
         <textarea id=\"reason\" name=\"reason\" rows=\"4\" required></textarea>\
         <button type=\"submit\">Reject invoice</button>\
         </form>",
        id = query.invoice,
        token = escape(&query.token),
    );
    page(StatusCode::OK, "Reject invoice", &body)
}

/// `POST /reject` rejects a pending invoice with the stated reason.
pub async fn reject(
    State(state): State<AppState>,
    Form(form): Form<RejectForm>,
) -> impl IntoResponse {
    let Some(invoice_id) = InvoiceId::from_raw(form.invoice) else {
        record(&state, None, "reject", "not_found", None);
        return page(StatusCode::NOT_FOUND, "Not found", "The requested invoice was not found.");
    };
    let reason = form.reason.trim().to_string();
    let engine = state.engine.clone();
    let task_reason = reason.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        engine.reject(invoice_id, &form.token, &task_reason, current_timestamp())
    })
    .await;
    match outcome {
        Ok(Ok(invoice)) => {
            record(&state, Some(invoice_id), "reject", "rejected", Some(reason));
            page(
                StatusCode::OK,
                "Invoice rejected",
                &format!(
                    "Invoice #{} has been rejected. The physician was asked to resubmit.",
                    invoice.id.get()
                ),
            )
        }
        Ok(Err(error)) => decision_error(&state, Some(invoice_id), "reject", &error),
        Err(_) => join_failure(&state, Some(invoice_id), "reject"),
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Maps a workflow error to its audit label and HTML page.
fn decision_error(
    state: &AppState,
    invoice_id: Option<InvoiceId>,
    action: &'static str,
    error: &WorkflowError,
) -> (StatusCode, Html<String>) {
    match error {
        WorkflowError::AlreadyProcessed => {
            record(state, invoice_id, action, "already_processed", None);
            page(
                StatusCode::OK,
                "Already processed",
                "This invoice has already been processed. No further action is needed.",
            )
        }
        WorkflowError::TokenInvalid => {
            record(state, invoice_id, action, "invalid_token", None);
            page(
                StatusCode::FORBIDDEN,
                "Link not valid",
                "This link is not valid. Please use the most recent notification.",
            )
        }
        WorkflowError::Validation(message) => {
            record(state, invoice_id, action, "validation_failed", Some(message.clone()));
            page(StatusCode::BAD_REQUEST, "Request incomplete", &escape(message))
        }
        WorkflowError::NotFound(_) => {
            record(state, invoice_id, action, "not_found", None);
            page(StatusCode::NOT_FOUND, "Not found", "The requested invoice was not found.")
        }
        _ => {
            record(state, invoice_id, action, "internal_error", None);
            page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "The action could not be completed. Please try again shortly.",
            )
        }
    }
}

/// Responds when the blocking task itself failed to run.
fn join_failure(
    state: &AppState,
    invoice_id: Option<InvoiceId>,
    action: &'static str,
) -> (StatusCode, Html<String>) {
    record(state, invoice_id, action, "internal_error", None);
    page(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong",
        "The action could not be completed. Please try again shortly.",
    )
}

/// Records one action-decision audit event.
fn record(
    state: &AppState,
    invoice_id: Option<InvoiceId>,
    action: &'static str,
    outcome: &'static str,
    reason: Option<String>,
) {
    state.audit.record_action(&ActionAuditEvent::new(invoice_id, action, outcome, reason));
}

/// Wraps a body fragment in the shared minimal page shell.
fn page(status: StatusCode, title: &str, body: &str) -> (StatusCode, Html<String>) {
    let html = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>{title}</title></head><body>{body}</body></html>"
    );
    (status, Html(html))
}

/// Escapes text interpolated into HTML responses.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
