// crates/clinipay-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Ledger
// Description: Mutex-guarded reference implementations of the store traits.
// Purpose: Back tests and single-process deployments without SQLite.
// Dependencies: crate::core, crate::interfaces, std
// ============================================================================

//! ## Overview
//! The in-memory ledger holds everything under a single mutex, so the
//! uniqueness invariants (one open invoice per payment, one non-cancelled
//! payment per physician/period) are enforced atomically at insert: the
//! same guarantee the SQLite store provides with partial unique indexes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::mpsc;

use crate::core::errors::StoreError;
use crate::core::events::DaySummary;
use crate::core::events::DispatchTicket;
use crate::core::events::NotificationAttempt;
use crate::core::events::NotificationEvent;
use crate::core::identifiers::InvoiceId;
use crate::core::identifiers::PaymentId;
use crate::core::identifiers::PhysicianId;
use crate::core::money::Amount;
use crate::core::payment::Contact;
use crate::core::payment::Invoice;
use crate::core::payment::InvoiceStatus;
use crate::core::payment::NetAdjustment;
use crate::core::payment::NewInvoice;
use crate::core::payment::NewPayment;
use crate::core::payment::Payment;
use crate::core::payment::PaymentStamps;
use crate::core::payment::PaymentStatus;
use crate::core::time::Timestamp;
use crate::interfaces::AttemptLog;
use crate::interfaces::Dispatcher;
use crate::interfaces::LedgerStore;
use crate::interfaces::UserDirectory;

// ============================================================================
// SECTION: Day Arithmetic
// ============================================================================

/// Milliseconds in one day.
const DAY_MILLIS: i64 = 86_400_000;

/// Returns days since the unix epoch for a `YYYY-MM-DD` string.
fn parse_epoch_day(date: &str) -> Result<i64, StoreError> {
    let invalid = || StoreError::Backend(format!("invalid date: {date}"));
    let mut parts = date.split('-');
    let year: i64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let month: i64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let day: i64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    if parts.next().is_some() || !(1 ..= 12).contains(&month) || !(1 ..= 31).contains(&day) {
        return Err(invalid());
    }
    // Civil-to-days conversion (proleptic Gregorian calendar).
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    Ok(era * 146_097 + doe - 719_468)
}

/// Returns `true` when the timestamp falls on the given epoch day.
fn on_day(ts: Timestamp, epoch_day: i64) -> bool {
    ts.as_millis().div_euclid(DAY_MILLIS) == epoch_day
}

// ============================================================================
// SECTION: In-Memory Ledger
// ============================================================================

/// Mutable ledger contents.
#[derive(Debug, Default)]
struct LedgerInner {
    /// Payments keyed by raw identifier.
    payments: BTreeMap<u64, Payment>,
    /// Invoices keyed by raw identifier.
    invoices: BTreeMap<u64, Invoice>,
    /// Append-only adjustment audit trail.
    adjustments: Vec<NetAdjustment>,
    /// Next payment identifier.
    next_payment: u64,
    /// Next invoice identifier.
    next_invoice: u64,
}

/// In-memory [`LedgerStore`] implementation.
///
/// # Invariants
/// - All reads and writes happen under one mutex, so insert-time uniqueness
///   checks and conditional transitions are atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    /// Guarded ledger contents.
    inner: Mutex<LedgerInner>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the ledger, mapping poisoning to a backend error.
    fn lock(&self) -> Result<MutexGuard<'_, LedgerInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Backend("ledger lock poisoned".to_string()))
    }
}

impl LedgerStore for InMemoryLedger {
    fn payment(&self, id: PaymentId) -> Result<Payment, StoreError> {
        let inner = self.lock()?;
        inner
            .payments
            .get(&id.get())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("payment {id}")))
    }

    fn invoice(&self, id: InvoiceId) -> Result<Invoice, StoreError> {
        let inner = self.lock()?;
        inner
            .invoices
            .get(&id.get())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("invoice {id}")))
    }

    fn create_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut inner = self.lock()?;
        let occupied = inner.payments.values().any(|existing| {
            existing.physician_id == payment.physician_id
                && existing.competence == payment.competence
                && existing.status != PaymentStatus::Cancelled
        });
        if occupied {
            return Err(StoreError::PeriodOccupied);
        }
        inner.next_payment += 1;
        let id = PaymentId::from_raw(inner.next_payment)
            .ok_or_else(|| StoreError::Backend("payment id overflow".to_string()))?;
        let record = Payment {
            id,
            physician_id: payment.physician_id,
            competence: payment.competence,
            gross_amount: payment.gross_amount,
            net_amount: None,
            status: PaymentStatus::Pending,
            solicited_at: None,
            responded_at: None,
            paid_at: None,
        };
        inner.payments.insert(id.get(), record.clone());
        Ok(record)
    }

    fn open_invoice_for(&self, payment: PaymentId) -> Result<Option<Invoice>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .invoices
            .values()
            .find(|invoice| {
                invoice.payment_id == payment
                    && matches!(invoice.status, InvoiceStatus::Pending | InvoiceStatus::Approved)
            })
            .cloned())
    }

    fn transition_payment(
        &self,
        id: PaymentId,
        expected: &[PaymentStatus],
        to: PaymentStatus,
        stamps: PaymentStamps,
    ) -> Result<Payment, StoreError> {
        let mut inner = self.lock()?;
        let payment = inner
            .payments
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("payment {id}")))?;
        if !expected.contains(&payment.status) {
            return Err(StoreError::Conflict(format!(
                "payment {id} is {}, not in expected set",
                payment.status.as_str()
            )));
        }
        payment.status = to;
        if let Some(ts) = stamps.solicited_at {
            payment.solicited_at = Some(ts);
        }
        if let Some(ts) = stamps.responded_at {
            payment.responded_at = Some(ts);
        }
        if let Some(ts) = stamps.paid_at {
            payment.paid_at = Some(ts);
        }
        if let Some(net) = stamps.net_amount {
            payment.net_amount = Some(net);
        }
        Ok(payment.clone())
    }

    fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, StoreError> {
        let mut inner = self.lock()?;
        let open_exists = inner.invoices.values().any(|existing| {
            existing.payment_id == invoice.payment_id
                && matches!(existing.status, InvoiceStatus::Pending | InvoiceStatus::Approved)
        });
        if open_exists {
            return Err(StoreError::OpenInvoiceExists);
        }
        inner.next_invoice += 1;
        let id = InvoiceId::from_raw(inner.next_invoice)
            .ok_or_else(|| StoreError::Backend("invoice id overflow".to_string()))?;
        let record = Invoice {
            id,
            payment_id: invoice.payment_id,
            physician_id: invoice.physician_id,
            file_ref: invoice.file_ref,
            original_filename: invoice.original_filename,
            content_hash: invoice.content_hash,
            status: InvoiceStatus::Pending,
            notes: None,
            ocr: invoice.ocr,
            net_amount: invoice.net_amount,
            created_at: invoice.created_at,
            decided_at: None,
        };
        inner.invoices.insert(id.get(), record.clone());
        Ok(record)
    }

    fn decide_invoice(
        &self,
        id: InvoiceId,
        decision: InvoiceStatus,
        notes: Option<String>,
        decided_at: Timestamp,
    ) -> Result<Invoice, StoreError> {
        let mut inner = self.lock()?;
        let invoice = inner
            .invoices
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("invoice {id}")))?;
        if invoice.status != InvoiceStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "invoice {id} is already {}",
                invoice.status.as_str()
            )));
        }
        invoice.status = decision;
        invoice.decided_at = Some(decided_at);
        if notes.is_some() {
            invoice.notes = notes;
        }
        Ok(invoice.clone())
    }

    fn set_net_amounts(
        &self,
        invoice: InvoiceId,
        payment: PaymentId,
        net: Amount,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let invoice_record = inner
            .invoices
            .get_mut(&invoice.get())
            .ok_or_else(|| StoreError::NotFound(format!("invoice {invoice}")))?;
        invoice_record.net_amount = Some(net.clone());
        let payment_record = inner
            .payments
            .get_mut(&payment.get())
            .ok_or_else(|| StoreError::NotFound(format!("payment {payment}")))?;
        payment_record.net_amount = Some(net);
        Ok(())
    }

    fn record_adjustment(&self, adjustment: NetAdjustment) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.adjustments.push(adjustment);
        Ok(())
    }

    fn open_payment_for_physician(
        &self,
        physician: PhysicianId,
    ) -> Result<Option<Payment>, StoreError> {
        let inner = self.lock()?;
        let mut candidates: Vec<&Payment> = inner
            .payments
            .values()
            .filter(|payment| {
                payment.physician_id == physician
                    && matches!(payment.status, PaymentStatus::Solicited | PaymentStatus::Pending)
            })
            .collect();
        // Solicited payments outrank pending ones; ties break on recency.
        candidates.sort_by_key(|payment| {
            (payment.status == PaymentStatus::Solicited, payment.id.get())
        });
        Ok(candidates.last().map(|payment| (*payment).clone()))
    }

    fn daily_summary(&self, date: &str) -> Result<DaySummary, StoreError> {
        let epoch_day = parse_epoch_day(date)?;
        let inner = self.lock()?;
        let mut summary = DaySummary {
            date: date.to_string(),
            requested: 0,
            received: 0,
            approved: 0,
            rejected: 0,
            paid: 0,
            approved_total: Amount::zero(),
            paid_total: Amount::zero(),
        };
        for payment in inner.payments.values() {
            if payment.solicited_at.is_some_and(|ts| on_day(ts, epoch_day)) {
                summary.requested += 1;
            }
            if payment.paid_at.is_some_and(|ts| on_day(ts, epoch_day)) {
                summary.paid += 1;
                let released =
                    payment.net_amount.clone().unwrap_or_else(|| payment.gross_amount.clone());
                summary.paid_total = summary.paid_total.clone() + released;
            }
        }
        for invoice in inner.invoices.values() {
            if on_day(invoice.created_at, epoch_day) {
                summary.received += 1;
            }
            if invoice.decided_at.is_some_and(|ts| on_day(ts, epoch_day)) {
                match invoice.status {
                    InvoiceStatus::Approved => {
                        summary.approved += 1;
                        if let Some(payment) = inner.payments.get(&invoice.payment_id.get()) {
                            summary.approved_total =
                                summary.approved_total.clone() + payment.gross_amount.clone();
                        }
                    }
                    InvoiceStatus::Rejected => summary.rejected += 1,
                    InvoiceStatus::Pending => {}
                }
            }
        }
        Ok(summary)
    }
}

// ============================================================================
// SECTION: In-Memory Attempt Log
// ============================================================================

/// In-memory [`AttemptLog`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryAttemptLog {
    /// Append-only attempt records.
    attempts: Mutex<Vec<NotificationAttempt>>,
}

impl InMemoryAttemptLog {
    /// Creates an empty attempt log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded attempts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<NotificationAttempt>, StoreError> {
        Ok(self
            .attempts
            .lock()
            .map_err(|_| StoreError::Backend("attempt log lock poisoned".to_string()))?
            .clone())
    }
}

impl AttemptLog for InMemoryAttemptLog {
    fn record(&self, attempt: &NotificationAttempt) -> Result<(), StoreError> {
        self.attempts
            .lock()
            .map_err(|_| StoreError::Backend("attempt log lock poisoned".to_string()))?
            .push(attempt.clone());
        Ok(())
    }

    fn latest_request_payment(
        &self,
        addresses: &[String],
    ) -> Result<Option<PaymentId>, StoreError> {
        let attempts = self
            .attempts
            .lock()
            .map_err(|_| StoreError::Backend("attempt log lock poisoned".to_string()))?;
        Ok(attempts
            .iter()
            .rev()
            .find(|attempt| {
                attempt.event == "invoice_requested"
                    && attempt.success
                    && addresses.contains(&attempt.address)
            })
            .and_then(|attempt| attempt.payment_id))
    }
}

// ============================================================================
// SECTION: In-Memory Directory
// ============================================================================

/// In-memory [`UserDirectory`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    /// Manager contacts.
    managers: Vec<Contact>,
    /// Physician contacts keyed by raw identifier.
    physicians: BTreeMap<u64, Contact>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a manager contact.
    pub fn add_manager(&mut self, contact: Contact) {
        self.managers.push(contact);
    }

    /// Adds a physician contact.
    pub fn add_physician(&mut self, physician: PhysicianId, contact: Contact) {
        self.physicians.insert(physician.get(), contact);
    }
}

impl UserDirectory for InMemoryDirectory {
    fn managers(&self) -> Result<Vec<Contact>, StoreError> {
        Ok(self.managers.clone())
    }

    fn physician_contact(&self, physician: PhysicianId) -> Result<Contact, StoreError> {
        self.physicians
            .get(&physician.get())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("physician {physician}")))
    }

    fn physician_by_phone(
        &self,
        variants: &[String],
    ) -> Result<Option<PhysicianId>, StoreError> {
        for (raw, contact) in &self.physicians {
            if let Some(phone) = &contact.phone
                && variants.iter().any(|variant| variant == phone)
            {
                let id = PhysicianId::from_raw(*raw)
                    .ok_or_else(|| StoreError::Backend("zero physician id".to_string()))?;
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// SECTION: Noop Dispatcher
// ============================================================================

/// Dispatcher that drops every event.
///
/// # Invariants
/// - Events are intentionally discarded; tickets report zero jobs.
#[derive(Debug, Default)]
pub struct NoopDispatcher;

impl Dispatcher for NoopDispatcher {
    fn dispatch(&self, _event: NotificationEvent, _now: Timestamp) -> DispatchTicket {
        let (_tx, rx) = mpsc::channel();
        DispatchTicket::new(0, rx)
    }
}
