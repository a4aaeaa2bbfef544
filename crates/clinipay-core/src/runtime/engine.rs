// crates/clinipay-core/src/runtime/engine.rs
// ============================================================================
// Module: Clinipay Workflow Engine
// Description: The payment/invoice state machine and its transition guards.
// Purpose: Sequence reconciliation, persistence, and notification dispatch.
// Dependencies: crate::core, crate::interfaces, crate::reconcile, crate::token
// ============================================================================

//! ## Overview
//! The workflow engine is the only component permitted to mutate status
//! fields. Every transition takes an explicit `now` timestamp and a
//! [`WorkflowSnapshot`] of configuration captured once at entry, so a flag
//! flip mid-transition cannot produce an inconsistent decision. Guards are
//! enforced twice: a cheap precondition read, then the ledger store's
//! conditional write keyed on expected prior status, which is what actually
//! serializes racing transitions on the same payment.
//!
//! Notifications are dispatched strictly after the ledger commit and are
//! best-effort: a failed delivery never unwinds a transition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::errors::WorkflowError;
use crate::core::events::NotificationEvent;
use crate::core::hashing::sha256_hex;
use crate::core::identifiers::InvoiceId;
use crate::core::identifiers::PaymentId;
use crate::core::identifiers::StorageRef;
use crate::core::identifiers::UserId;
use crate::core::money::Amount;
use crate::core::payment::Invoice;
use crate::core::payment::InvoiceStatus;
use crate::core::payment::NetAdjustment;
use crate::core::payment::NewInvoice;
use crate::core::payment::OcrOutcome;
use crate::core::payment::Payment;
use crate::core::payment::PaymentStamps;
use crate::core::payment::PaymentStatus;
use crate::core::time::Timestamp;
use crate::interfaces::SharedDispatcher;
use crate::interfaces::SharedFileStorage;
use crate::interfaces::SharedLedgerStore;
use crate::interfaces::SharedOcrProvider;
use crate::reconcile::ReconcileOutcome;
use crate::reconcile::reconcile;
use crate::token::ActionKind;
use crate::token::validate;

// ============================================================================
// SECTION: Configuration Snapshot
// ============================================================================

/// Configuration captured once per transition.
///
/// # Invariants
/// - Values are read at transition entry and never refreshed mid-flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    /// Whether OCR reconciliation gates invoice submission.
    pub ocr_enabled: bool,
    /// Whether inbound chat documents may create submissions.
    pub allow_chat_submission: bool,
    /// Reconciliation tolerance.
    pub tolerance: Amount,
}

// ============================================================================
// SECTION: Inputs and Outcomes
// ============================================================================

/// One uploaded document to submit against a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceUpload {
    /// Raw document bytes.
    pub bytes: Vec<u8>,
    /// Original filename as submitted.
    pub filename: String,
}

/// Outcome of [`WorkflowEngine::request_invoice`].
///
/// # Invariants
/// - `AlreadyRequested` is a success, not an error: duplicate requests are
///   tolerated by design.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The payment was transitioned to `solicited` and the physician notified.
    Requested(Payment),
    /// The payment was already solicited or has an open invoice; nothing changed.
    AlreadyRequested,
}

// ============================================================================
// SECTION: Workflow Engine
// ============================================================================

/// Owner of the payment/invoice state machine.
///
/// # Invariants
/// - Transitions either fully commit (status, stamps, queued notification)
///   or abort before any write.
/// - Dispatch happens only after the ledger write succeeds.
pub struct WorkflowEngine {
    /// Ledger store, the single source of truth.
    ledger: SharedLedgerStore,
    /// File storage for submitted documents.
    storage: SharedFileStorage,
    /// OCR collaborator, consulted only when the snapshot enables it.
    ocr: SharedOcrProvider,
    /// Notification fan-out.
    dispatcher: SharedDispatcher,
}

impl WorkflowEngine {
    /// Creates an engine over the provided collaborators.
    #[must_use]
    pub fn new(
        ledger: SharedLedgerStore,
        storage: SharedFileStorage,
        ocr: SharedOcrProvider,
        dispatcher: SharedDispatcher,
    ) -> Self {
        Self {
            ledger,
            storage,
            ocr,
            dispatcher,
        }
    }

    /// Returns the ledger store handle.
    #[must_use]
    pub fn ledger(&self) -> &SharedLedgerStore {
        &self.ledger
    }

    /// Requests an invoice from the physician for a `pending` payment.
    ///
    /// Idempotent: a retried request against an already-`solicited` payment
    /// or a payment with an open invoice is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::GuardViolation`] when the payment is in a
    /// state other than `pending`/`solicited`.
    pub fn request_invoice(
        &self,
        payment_id: PaymentId,
        now: Timestamp,
    ) -> Result<RequestOutcome, WorkflowError> {
        let payment = self.ledger.payment(payment_id)?;
        if payment.status == PaymentStatus::Solicited {
            return Ok(RequestOutcome::AlreadyRequested);
        }
        if self.ledger.open_invoice_for(payment_id)?.is_some() {
            return Ok(RequestOutcome::AlreadyRequested);
        }
        if payment.status != PaymentStatus::Pending {
            return Err(WorkflowError::GuardViolation(format!(
                "cannot request an invoice for a {} payment",
                payment.status.as_str()
            )));
        }
        let payment = self.ledger.transition_payment(
            payment_id,
            &[PaymentStatus::Pending],
            PaymentStatus::Solicited,
            PaymentStamps {
                solicited_at: Some(now),
                ..PaymentStamps::default()
            },
        )?;
        drop(self.dispatcher.dispatch(
            NotificationEvent::InvoiceRequested {
                payment: payment.clone(),
            },
            now,
        ));
        Ok(RequestOutcome::Requested(payment))
    }

    /// Submits a document against a `solicited` (or resubmission `pending`)
    /// payment, creating the `pending` invoice.
    ///
    /// When OCR is enabled and the extracted gross amount fails tolerance,
    /// the stored file is deleted, the physician is notified with the
    /// specific difference, and no invoice persists.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::DuplicateSubmission`] when another invoice
    /// for the payment is already open, [`WorkflowError::ReconciliationMismatch`]
    /// on amount disagreement, and [`WorkflowError::GuardViolation`] /
    /// [`WorkflowError::Validation`] on precondition failures.
    pub fn submit_invoice(
        &self,
        payment_id: PaymentId,
        upload: InvoiceUpload,
        manual_net: Option<Amount>,
        snapshot: &WorkflowSnapshot,
        now: Timestamp,
    ) -> Result<Invoice, WorkflowError> {
        let payment = self.ledger.payment(payment_id)?;
        // An open invoice must be reported as a duplicate before the status
        // guard: the first submission already moved the payment to
        // `invoice_received`, so the guard alone would misreport replays.
        if self.ledger.open_invoice_for(payment_id)?.is_some() {
            return Err(WorkflowError::DuplicateSubmission);
        }
        if !matches!(payment.status, PaymentStatus::Solicited | PaymentStatus::Pending) {
            return Err(WorkflowError::GuardViolation(format!(
                "cannot submit an invoice for a {} payment",
                payment.status.as_str()
            )));
        }

        let content_hash = sha256_hex(&upload.bytes);
        let path_hint = format!("invoices/{payment_id}/{}", upload.filename);
        let file_ref = self.storage.upload(&path_hint, &upload.bytes)?;

        let ocr = if snapshot.ocr_enabled {
            // Extraction failure is non-fatal; the flow falls through to
            // manual net entry.
            self.ocr.extract(&upload.bytes).unwrap_or_else(|_| OcrOutcome::unprocessed())
        } else {
            OcrOutcome::unprocessed()
        };

        if let ReconcileOutcome::Rejected {
            difference,
        } = reconcile(&payment.gross_amount, ocr.gross_amount.as_ref(), &snapshot.tolerance)
        {
            self.discard_upload(&file_ref);
            let extracted = ocr
                .gross_amount
                .clone()
                .unwrap_or_else(Amount::zero);
            drop(self.dispatcher.dispatch(
                NotificationEvent::ReconciliationMismatch {
                    payment: payment.clone(),
                    expected: payment.gross_amount.clone(),
                    extracted: extracted.clone(),
                    difference: difference.clone(),
                },
                now,
            ));
            return Err(WorkflowError::ReconciliationMismatch {
                expected: payment.gross_amount,
                extracted,
                difference,
            });
        }

        let net = manual_net.or_else(|| ocr.net_amount.clone());
        if let Some(net) = &net
            && *net > payment.gross_amount
        {
            self.discard_upload(&file_ref);
            return Err(WorkflowError::Validation(format!(
                "net amount {net} exceeds gross amount {}",
                payment.gross_amount
            )));
        }

        let invoice = match self.ledger.create_invoice(NewInvoice {
            payment_id,
            physician_id: payment.physician_id,
            file_ref: file_ref.clone(),
            original_filename: upload.filename,
            content_hash,
            ocr,
            net_amount: net.clone(),
            created_at: now,
        }) {
            Ok(invoice) => invoice,
            Err(err) => {
                // Storage is not transactional with the ledger; compensate.
                self.discard_upload(&file_ref);
                return Err(err.into());
            }
        };

        match self.ledger.transition_payment(
            payment_id,
            &[PaymentStatus::Solicited, PaymentStatus::Pending],
            PaymentStatus::InvoiceReceived,
            PaymentStamps {
                net_amount: net,
                ..PaymentStamps::default()
            },
        ) {
            Ok(payment) => {
                drop(self.dispatcher.dispatch(
                    NotificationEvent::InvoiceReceived {
                        invoice: invoice.clone(),
                        payment,
                    },
                    now,
                ));
                Ok(invoice)
            }
            Err(err) => {
                // A racing transition moved the payment; unwind the invoice
                // and the stored file so nothing half-applied survives.
                let _ = self.ledger.decide_invoice(
                    invoice.id,
                    InvoiceStatus::Rejected,
                    Some("rolled back: payment moved during submission".to_string()),
                    now,
                );
                self.discard_upload(&file_ref);
                Err(err.into())
            }
        }
    }

    /// Approves a `pending` invoice via its action token.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::TokenInvalid`] for a bad token and
    /// [`WorkflowError::AlreadyProcessed`] for a decided invoice.
    pub fn approve(
        &self,
        invoice_id: InvoiceId,
        token: &str,
        now: Timestamp,
    ) -> Result<Invoice, WorkflowError> {
        let invoice = self.ledger.invoice(invoice_id)?;
        if !validate(token, invoice_id, invoice.created_at, ActionKind::Approve) {
            return Err(WorkflowError::TokenInvalid);
        }
        if invoice.status != InvoiceStatus::Pending {
            return Err(WorkflowError::AlreadyProcessed);
        }
        let invoice = self
            .ledger
            .decide_invoice(invoice_id, InvoiceStatus::Approved, None, now)
            .map_err(|err| match err {
                crate::core::errors::StoreError::Conflict(_) => WorkflowError::AlreadyProcessed,
                other => other.into(),
            })?;
        let payment = self.ledger.transition_payment(
            invoice.payment_id,
            &[PaymentStatus::InvoiceReceived],
            PaymentStatus::Approved,
            PaymentStamps {
                responded_at: Some(now),
                net_amount: invoice.net_amount.clone(),
                ..PaymentStamps::default()
            },
        )?;
        drop(self.dispatcher.dispatch(
            NotificationEvent::InvoiceApproved {
                invoice: invoice.clone(),
                payment,
            },
            now,
        ));
        Ok(invoice)
    }

    /// Rejects a `pending` invoice via its action token, returning the
    /// payment to the request queue.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Validation`] for an empty reason,
    /// [`WorkflowError::TokenInvalid`] for a bad token, and
    /// [`WorkflowError::AlreadyProcessed`] for a decided invoice.
    pub fn reject(
        &self,
        invoice_id: InvoiceId,
        token: &str,
        reason: &str,
        now: Timestamp,
    ) -> Result<Invoice, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::Validation("a rejection reason is required".to_string()));
        }
        let invoice = self.ledger.invoice(invoice_id)?;
        if !validate(token, invoice_id, invoice.created_at, ActionKind::Reject) {
            return Err(WorkflowError::TokenInvalid);
        }
        if invoice.status != InvoiceStatus::Pending {
            return Err(WorkflowError::AlreadyProcessed);
        }
        let invoice = self
            .ledger
            .decide_invoice(
                invoice_id,
                InvoiceStatus::Rejected,
                Some(reason.to_string()),
                now,
            )
            .map_err(|err| match err {
                crate::core::errors::StoreError::Conflict(_) => WorkflowError::AlreadyProcessed,
                other => other.into(),
            })?;
        let payment = self.ledger.transition_payment(
            invoice.payment_id,
            &[PaymentStatus::InvoiceReceived],
            PaymentStatus::Pending,
            PaymentStamps {
                responded_at: Some(now),
                ..PaymentStamps::default()
            },
        )?;
        drop(self.dispatcher.dispatch(
            NotificationEvent::InvoiceRejected {
                invoice: invoice.clone(),
                payment,
                reason: reason.to_string(),
            },
            now,
        ));
        Ok(invoice)
    }

    /// Marks an `approved` payment as paid.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::GuardViolation`] when the payment is not
    /// `approved`.
    pub fn mark_paid(
        &self,
        payment_id: PaymentId,
        paid_on: Timestamp,
        now: Timestamp,
    ) -> Result<Payment, WorkflowError> {
        let payment = self.ledger.transition_payment(
            payment_id,
            &[PaymentStatus::Approved],
            PaymentStatus::Paid,
            PaymentStamps {
                paid_at: Some(paid_on),
                ..PaymentStamps::default()
            },
        )?;
        drop(self.dispatcher.dispatch(
            NotificationEvent::PaymentMade {
                payment: payment.clone(),
            },
            now,
        ));
        Ok(payment)
    }

    /// Records an audited administrative net-amount correction.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::GuardViolation`] when the owning payment is
    /// not `invoice_received`/`approved` and [`WorkflowError::Validation`]
    /// when the new amount exceeds gross or the reason is empty.
    pub fn adjust_net_amount(
        &self,
        invoice_id: InvoiceId,
        new_amount: Amount,
        reason: &str,
        actor: UserId,
        now: Timestamp,
    ) -> Result<NetAdjustment, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::Validation("an adjustment reason is required".to_string()));
        }
        let invoice = self.ledger.invoice(invoice_id)?;
        let payment = self.ledger.payment(invoice.payment_id)?;
        if !matches!(payment.status, PaymentStatus::InvoiceReceived | PaymentStatus::Approved) {
            return Err(WorkflowError::GuardViolation(format!(
                "cannot adjust the net amount of a {} payment",
                payment.status.as_str()
            )));
        }
        if new_amount > payment.gross_amount {
            return Err(WorkflowError::Validation(format!(
                "net amount {new_amount} exceeds gross amount {}",
                payment.gross_amount
            )));
        }
        let adjustment = NetAdjustment {
            invoice_id,
            payment_id: payment.id,
            previous_net: invoice.net_amount.clone(),
            new_net: new_amount.clone(),
            reason: reason.to_string(),
            actor,
            adjusted_at: now,
        };
        self.ledger.record_adjustment(adjustment.clone())?;
        self.ledger.set_net_amounts(invoice_id, payment.id, new_amount)?;
        let payment = self.ledger.payment(payment.id)?;
        drop(self.dispatcher.dispatch(
            NotificationEvent::AmountAdjusted {
                adjustment: adjustment.clone(),
                payment,
            },
            now,
        ));
        Ok(adjustment)
    }

    /// Cancels a `pending`/`solicited` payment, freeing its period slot.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::GuardViolation`] for any other state.
    pub fn cancel_payment(
        &self,
        payment_id: PaymentId,
        now: Timestamp,
    ) -> Result<Payment, WorkflowError> {
        let _ = now;
        let payment = self.ledger.transition_payment(
            payment_id,
            &[PaymentStatus::Pending, PaymentStatus::Solicited],
            PaymentStatus::Cancelled,
            PaymentStamps::default(),
        )?;
        Ok(payment)
    }

    /// Best-effort compensating delete for a stored upload.
    fn discard_upload(&self, file_ref: &StorageRef) {
        // The delete itself is best-effort: storage unavailability must not
        // mask the error that triggered the compensation.
        let _ = self.storage.delete(file_ref);
    }
}
