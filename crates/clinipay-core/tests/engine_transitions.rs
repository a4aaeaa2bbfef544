// crates/clinipay-core/tests/engine_transitions.rs
// ============================================================================
// Module: Workflow Transition Tests
// Description: End-to-end state machine scenarios over the in-memory ledger.
// ============================================================================

//! ## Overview
//! Drives full payment lifecycles through the workflow engine: request,
//! submission, approval, rejection, payment, adjustment, and cancellation,
//! including the guard and compensation paths.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use clinipay_core::Amount;
use clinipay_core::FileStorage;
use clinipay_core::InMemoryLedger;
use clinipay_core::InvoiceStatus;
use clinipay_core::InvoiceUpload;
use clinipay_core::LedgerStore;
use clinipay_core::NewPayment;
use clinipay_core::NoopDispatcher;
use clinipay_core::OcrOutcome;
use clinipay_core::OcrProvider;
use clinipay_core::Payment;
use clinipay_core::PaymentStatus;
use clinipay_core::PhysicianId;
use clinipay_core::ProviderError;
use clinipay_core::RequestOutcome;
use clinipay_core::StorageRef;
use clinipay_core::Timestamp;
use clinipay_core::UserId;
use clinipay_core::WorkflowEngine;
use clinipay_core::WorkflowError;
use clinipay_core::WorkflowSnapshot;
use clinipay_core::default_tolerance;
use clinipay_core::token;
use clinipay_core::token::ActionKind;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// File storage backed by a guarded map, with delete tracking.
#[derive(Debug, Default)]
struct MemStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemStorage {
    fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

impl FileStorage for MemStorage {
    fn upload(&self, path_hint: &str, bytes: &[u8]) -> Result<StorageRef, ProviderError> {
        self.files.lock().unwrap().insert(path_hint.to_string(), bytes.to_vec());
        Ok(StorageRef::new(path_hint))
    }

    fn download(&self, reference: &StorageRef) -> Result<Vec<u8>, ProviderError> {
        self.files
            .lock()
            .unwrap()
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable(format!("missing {reference}")))
    }

    fn signed_url(&self, reference: &StorageRef, _ttl_secs: u64) -> Result<String, ProviderError> {
        Ok(format!("mem://{reference}"))
    }

    fn delete(&self, reference: &StorageRef) -> Result<(), ProviderError> {
        self.files.lock().unwrap().remove(reference.as_str());
        Ok(())
    }
}

/// OCR stub returning a fixed outcome.
struct StubOcr {
    outcome: OcrOutcome,
}

impl OcrProvider for StubOcr {
    fn extract(&self, _pdf: &[u8]) -> Result<OcrOutcome, ProviderError> {
        Ok(self.outcome.clone())
    }
}

/// OCR stub that always fails.
struct FailingOcr;

impl OcrProvider for FailingOcr {
    fn extract(&self, _pdf: &[u8]) -> Result<OcrOutcome, ProviderError> {
        Err(ProviderError::Timeout)
    }
}

struct Harness {
    engine: WorkflowEngine,
    ledger: Arc<InMemoryLedger>,
    storage: Arc<MemStorage>,
}

fn harness(ocr: Arc<dyn OcrProvider>) -> Harness {
    let ledger = Arc::new(InMemoryLedger::new());
    let storage = Arc::new(MemStorage::default());
    let engine = WorkflowEngine::new(
        ledger.clone(),
        storage.clone(),
        ocr,
        Arc::new(NoopDispatcher),
    );
    Harness {
        engine,
        ledger,
        storage,
    }
}

fn snapshot() -> WorkflowSnapshot {
    WorkflowSnapshot {
        ocr_enabled: true,
        allow_chat_submission: true,
        tolerance: default_tolerance(),
    }
}

fn amount(s: &str) -> Amount {
    Amount::parse(s).unwrap()
}

fn seed_payment(ledger: &InMemoryLedger, gross: &str) -> Payment {
    ledger
        .create_payment(NewPayment {
            physician_id: PhysicianId::from_raw(7).unwrap(),
            competence: "2026-08".parse().unwrap(),
            gross_amount: amount(gross),
        })
        .unwrap()
}

fn upload() -> InvoiceUpload {
    InvoiceUpload {
        bytes: b"%PDF-1.4 fiscal document".to_vec(),
        filename: "nf-1234.pdf".to_string(),
    }
}

fn matching_ocr(gross: &str, net: &str) -> Arc<dyn OcrProvider> {
    Arc::new(StubOcr {
        outcome: OcrOutcome {
            invoice_number: Some("1234".to_string()),
            gross_amount: Some(amount(gross)),
            net_amount: Some(amount(net)),
            processed: true,
        },
    })
}

const T0: Timestamp = Timestamp::from_millis(1_756_000_000_000);
const T1: Timestamp = Timestamp::from_millis(1_756_000_100_000);
const T2: Timestamp = Timestamp::from_millis(1_756_000_200_000);
const T3: Timestamp = Timestamp::from_millis(1_756_000_300_000);

// ============================================================================
// SECTION: Happy Path
// ============================================================================

#[test]
fn full_lifecycle_request_submit_approve_pay() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");

    let outcome = h.engine.request_invoice(payment.id, T0).unwrap();
    let RequestOutcome::Requested(requested) = outcome else {
        panic!("expected a fresh request");
    };
    assert_eq!(requested.status, PaymentStatus::Solicited);
    assert_eq!(requested.solicited_at, Some(T0));

    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.net_amount, Some(amount("93.50")));
    assert_eq!(h.ledger.payment(payment.id).unwrap().status, PaymentStatus::InvoiceReceived);

    let approve_token = token::encode(invoice.id, invoice.created_at, ActionKind::Approve);
    let approved = h.engine.approve(invoice.id, &approve_token, T2).unwrap();
    assert_eq!(approved.status, InvoiceStatus::Approved);
    let payment_after = h.ledger.payment(payment.id).unwrap();
    assert_eq!(payment_after.status, PaymentStatus::Approved);
    assert_eq!(payment_after.responded_at, Some(T2));
    assert_eq!(payment_after.net_amount, Some(amount("93.50")));

    let paid = h.engine.mark_paid(payment.id, T3, T3).unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert_eq!(paid.paid_at, Some(T3));
}

#[test]
fn request_is_idempotent_for_solicited_payments() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");

    h.engine.request_invoice(payment.id, T0).unwrap();
    let again = h.engine.request_invoice(payment.id, T1).unwrap();
    assert_eq!(again, RequestOutcome::AlreadyRequested);
    // The original solicitation timestamp survives the retry.
    assert_eq!(h.ledger.payment(payment.id).unwrap().solicited_at, Some(T0));
}

#[test]
fn request_refuses_terminal_payments() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.cancel_payment(payment.id, T0).unwrap();

    let err = h.engine.request_invoice(payment.id, T1).unwrap_err();
    assert!(matches!(err, WorkflowError::GuardViolation(_)), "got {err:?}");
}

// ============================================================================
// SECTION: Submission Guards
// ============================================================================

#[test]
fn second_submission_is_rejected_while_invoice_is_open() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();
    h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();

    let err = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T2).unwrap_err();
    assert!(matches!(err, WorkflowError::DuplicateSubmission), "got {err:?}");
}

#[test]
fn mismatched_amount_discards_the_upload() {
    let h = harness(matching_ocr("105.00", "98.00"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();

    let err = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap_err();
    let WorkflowError::ReconciliationMismatch {
        expected,
        extracted,
        difference,
    } = err
    else {
        panic!("expected a reconciliation mismatch");
    };
    assert_eq!(expected, amount("100.00"));
    assert_eq!(extracted, amount("105.00"));
    assert_eq!(difference, amount("5.00"));

    // Nothing half-applied: no invoice, no stored file, payment untouched.
    assert!(h.ledger.open_invoice_for(payment.id).unwrap().is_none());
    assert_eq!(h.storage.file_count(), 0);
    assert_eq!(h.ledger.payment(payment.id).unwrap().status, PaymentStatus::Solicited);
}

#[test]
fn one_cent_difference_is_within_tolerance() {
    let h = harness(matching_ocr("100.01", "95.00"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();

    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
}

#[test]
fn failed_extraction_falls_through_to_manual_net() {
    let h = harness(Arc::new(FailingOcr));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();

    let invoice = h
        .engine
        .submit_invoice(payment.id, upload(), Some(amount("92.00")), &snapshot(), T1)
        .unwrap();
    assert!(!invoice.ocr.processed);
    assert_eq!(invoice.net_amount, Some(amount("92.00")));
}

#[test]
fn ocr_disabled_skips_reconciliation() {
    // The stub would fail tolerance if consulted.
    let h = harness(matching_ocr("500.00", "450.00"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();

    let invoice = h
        .engine
        .submit_invoice(
            payment.id,
            upload(),
            Some(amount("90.00")),
            &WorkflowSnapshot {
                ocr_enabled: false,
                allow_chat_submission: true,
                tolerance: default_tolerance(),
            },
            T1,
        )
        .unwrap();
    assert_eq!(invoice.net_amount, Some(amount("90.00")));
}

#[test]
fn net_above_gross_is_rejected_and_upload_discarded() {
    let h = harness(matching_ocr("100.00", "120.00"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();

    let err = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "got {err:?}");
    assert_eq!(h.storage.file_count(), 0);
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

#[test]
fn rejection_returns_payment_to_pending_and_allows_resubmission() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();
    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();

    let reject_token = token::encode(invoice.id, invoice.created_at, ActionKind::Reject);
    let rejected = h.engine.reject(invoice.id, &reject_token, "wrong month", T2).unwrap();
    assert_eq!(rejected.status, InvoiceStatus::Rejected);
    assert_eq!(rejected.notes.as_deref(), Some("wrong month"));
    assert_eq!(h.ledger.payment(payment.id).unwrap().status, PaymentStatus::Pending);

    // A fresh submission is accepted after the rejection.
    let second = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T3).unwrap();
    assert_eq!(second.status, InvoiceStatus::Pending);
    assert_ne!(second.id, invoice.id);
}

#[test]
fn rejection_requires_a_reason() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();
    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();

    let reject_token = token::encode(invoice.id, invoice.created_at, ActionKind::Reject);
    let err = h.engine.reject(invoice.id, &reject_token, "   ", T2).unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "got {err:?}");
    assert_eq!(h.ledger.invoice(invoice.id).unwrap().status, InvoiceStatus::Pending);
}

#[test]
fn wrong_kind_token_is_invalid() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();
    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();

    // A reject token must not authorize approval.
    let reject_token = token::encode(invoice.id, invoice.created_at, ActionKind::Reject);
    let err = h.engine.approve(invoice.id, &reject_token, T2).unwrap_err();
    assert!(matches!(err, WorkflowError::TokenInvalid), "got {err:?}");
    assert_eq!(h.ledger.invoice(invoice.id).unwrap().status, InvoiceStatus::Pending);
}

#[test]
fn double_approval_reports_already_processed() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();
    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();

    let approve_token = token::encode(invoice.id, invoice.created_at, ActionKind::Approve);
    h.engine.approve(invoice.id, &approve_token, T2).unwrap();
    let err = h.engine.approve(invoice.id, &approve_token, T3).unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyProcessed), "got {err:?}");
}

#[test]
fn reject_after_approve_reports_already_processed() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();
    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();

    let approve_token = token::encode(invoice.id, invoice.created_at, ActionKind::Approve);
    let reject_token = token::encode(invoice.id, invoice.created_at, ActionKind::Reject);
    h.engine.approve(invoice.id, &approve_token, T2).unwrap();
    let err = h.engine.reject(invoice.id, &reject_token, "too late", T3).unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyProcessed), "got {err:?}");
}

// ============================================================================
// SECTION: Payment Release and Adjustment
// ============================================================================

#[test]
fn mark_paid_requires_an_approved_payment() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");

    let err = h.engine.mark_paid(payment.id, T1, T1).unwrap_err();
    assert!(matches!(err, WorkflowError::GuardViolation(_)), "got {err:?}");
}

#[test]
fn adjustment_propagates_to_invoice_and_payment() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();
    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();

    let adjustment = h
        .engine
        .adjust_net_amount(
            invoice.id,
            amount("91.25"),
            "ISS retention was missing",
            UserId::from_raw(3).unwrap(),
            T2,
        )
        .unwrap();
    assert_eq!(adjustment.previous_net, Some(amount("93.50")));
    assert_eq!(adjustment.new_net, amount("91.25"));
    assert_eq!(h.ledger.invoice(invoice.id).unwrap().net_amount, Some(amount("91.25")));
    assert_eq!(h.ledger.payment(payment.id).unwrap().net_amount, Some(amount("91.25")));
}

#[test]
fn adjustment_above_gross_is_rejected() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");
    h.engine.request_invoice(payment.id, T0).unwrap();
    let invoice = h.engine.submit_invoice(payment.id, upload(), None, &snapshot(), T1).unwrap();

    let err = h
        .engine
        .adjust_net_amount(
            invoice.id,
            amount("100.01"),
            "typo",
            UserId::from_raw(3).unwrap(),
            T2,
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)), "got {err:?}");
    assert_eq!(h.ledger.invoice(invoice.id).unwrap().net_amount, Some(amount("93.50")));
}

#[test]
fn cancellation_frees_the_period_slot() {
    let h = harness(matching_ocr("100.00", "93.50"));
    let payment = seed_payment(&h.ledger, "100.00");

    // The slot is occupied while the payment lives.
    let duplicate = h.ledger.create_payment(NewPayment {
        physician_id: PhysicianId::from_raw(7).unwrap(),
        competence: "2026-08".parse().unwrap(),
        gross_amount: amount("100.00"),
    });
    assert!(duplicate.is_err());

    let cancelled = h.engine.cancel_payment(payment.id, T0).unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);
    assert!(cancelled.status.is_terminal());

    let replacement = seed_payment(&h.ledger, "110.00");
    assert_ne!(replacement.id, payment.id);
}
