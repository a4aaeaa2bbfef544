// crates/clinipay-core/tests/concurrency.rs
// ============================================================================
// Module: Concurrent Transition Tests
// Description: Racing submissions and decisions against the same records.
// ============================================================================

//! ## Overview
//! Exercises the insert-time uniqueness guard and conditional transitions
//! under real thread interleavings: exactly one racer wins, the rest get a
//! typed rejection, and the ledger never holds two open invoices.

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
use std::sync::Barrier;
use std::sync::Mutex;
use std::thread;

use clinipay_core::Amount;
use clinipay_core::FileStorage;
use clinipay_core::InMemoryLedger;
use clinipay_core::InvoiceUpload;
use clinipay_core::LedgerStore;
use clinipay_core::NewPayment;
use clinipay_core::NoopDispatcher;
use clinipay_core::OcrOutcome;
use clinipay_core::OcrProvider;
use clinipay_core::PhysicianId;
use clinipay_core::ProviderError;
use clinipay_core::StorageRef;
use clinipay_core::Timestamp;
use clinipay_core::WorkflowEngine;
use clinipay_core::WorkflowError;
use clinipay_core::WorkflowSnapshot;
use clinipay_core::default_tolerance;
use clinipay_core::token;
use clinipay_core::token::ActionKind;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

#[derive(Debug, Default)]
struct MemStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
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

struct StubOcr;

impl OcrProvider for StubOcr {
    fn extract(&self, _pdf: &[u8]) -> Result<OcrOutcome, ProviderError> {
        Ok(OcrOutcome {
            invoice_number: Some("42".to_string()),
            gross_amount: Some(Amount::parse("250.00").unwrap()),
            net_amount: Some(Amount::parse("230.00").unwrap()),
            processed: true,
        })
    }
}

fn engine_over(ledger: Arc<InMemoryLedger>) -> Arc<WorkflowEngine> {
    Arc::new(WorkflowEngine::new(
        ledger,
        Arc::new(MemStorage::default()),
        Arc::new(StubOcr),
        Arc::new(NoopDispatcher),
    ))
}

fn snapshot() -> WorkflowSnapshot {
    WorkflowSnapshot {
        ocr_enabled: true,
        allow_chat_submission: true,
        tolerance: default_tolerance(),
    }
}

const NOW: Timestamp = Timestamp::from_millis(1_756_000_000_000);

// ============================================================================
// SECTION: Racing Submissions
// ============================================================================

#[test]
fn racing_submissions_yield_exactly_one_open_invoice() {
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = engine_over(ledger.clone());
    let payment = ledger
        .create_payment(NewPayment {
            physician_id: PhysicianId::from_raw(1).unwrap(),
            competence: "2026-08".parse().unwrap(),
            gross_amount: Amount::parse("250.00").unwrap(),
        })
        .unwrap();
    engine.request_invoice(payment.id, NOW).unwrap();

    let racers = 8;
    let barrier = Arc::new(Barrier::new(racers));
    let handles: Vec<_> = (0 .. racers)
        .map(|n| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            let payment_id = payment.id;
            thread::spawn(move || {
                barrier.wait();
                engine.submit_invoice(
                    payment_id,
                    InvoiceUpload {
                        bytes: format!("document {n}").into_bytes(),
                        filename: format!("nf-{n}.pdf"),
                    },
                    None,
                    &snapshot(),
                    NOW,
                )
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => successes += 1,
            // Losers read the payment either before or after the winner's
            // transition; both rejections are acceptable, silence is not.
            Err(WorkflowError::DuplicateSubmission | WorkflowError::GuardViolation(_)) => {}
            Err(other) => panic!("unexpected rejection: {other:?}"),
        }
    }
    assert_eq!(successes, 1);

    let open = ledger.open_invoice_for(payment.id).unwrap();
    assert!(open.is_some());
}

// ============================================================================
// SECTION: Racing Decisions
// ============================================================================

#[test]
fn racing_approvals_decide_the_invoice_exactly_once() {
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = engine_over(ledger.clone());
    let payment = ledger
        .create_payment(NewPayment {
            physician_id: PhysicianId::from_raw(2).unwrap(),
            competence: "2026-08".parse().unwrap(),
            gross_amount: Amount::parse("250.00").unwrap(),
        })
        .unwrap();
    engine.request_invoice(payment.id, NOW).unwrap();
    let invoice = engine
        .submit_invoice(
            payment.id,
            InvoiceUpload {
                bytes: b"document".to_vec(),
                filename: "nf.pdf".to_string(),
            },
            None,
            &snapshot(),
            NOW,
        )
        .unwrap();
    let approve_token = token::encode(invoice.id, invoice.created_at, ActionKind::Approve);

    let racers = 4;
    let barrier = Arc::new(Barrier::new(racers));
    let handles: Vec<_> = (0 .. racers)
        .map(|_| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            let approve_token = approve_token.clone();
            let invoice_id = invoice.id;
            thread::spawn(move || {
                barrier.wait();
                engine.approve(invoice_id, &approve_token, NOW)
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => successes += 1,
            Err(WorkflowError::AlreadyProcessed) => {}
            Err(other) => panic!("unexpected rejection: {other:?}"),
        }
    }
    assert_eq!(successes, 1);
}

// ============================================================================
// SECTION: Racing Inserts
// ============================================================================

#[test]
fn racing_payment_creation_honors_the_period_slot() {
    let ledger = Arc::new(InMemoryLedger::new());

    let racers = 6;
    let barrier = Arc::new(Barrier::new(racers));
    let handles: Vec<_> = (0 .. racers)
        .map(|_| {
            let ledger = ledger.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ledger.create_payment(NewPayment {
                    physician_id: PhysicianId::from_raw(3).unwrap(),
                    competence: "2026-07".parse().unwrap(),
                    gross_amount: Amount::parse("100.00").unwrap(),
                })
            })
        })
        .collect();

    let successes = handles.into_iter().filter_map(|h| h.join().unwrap().ok()).count();
    assert_eq!(successes, 1);
}
