// crates/clinipay-core/src/interfaces/mod.rs
// ============================================================================
// Module: Clinipay Interfaces
// Description: Collaborator traits for stores, storage, providers, and dispatch.
// Purpose: Keep the workflow engine independent of concrete backends.
// Dependencies: crate::core, std
// ============================================================================

//! ## Overview
//! Every external collaborator the engine touches sits behind one of these
//! traits. Implementations must be `Send + Sync`; methods are synchronous
//! and every network-facing implementation carries its own bounded timeout.
//! The ledger store is the only shared mutable resource; its conditional
//! operations provide the single-writer discipline per payment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::errors::ProviderError;
use crate::core::errors::StoreError;
use crate::core::events::DaySummary;
use crate::core::events::DispatchTicket;
use crate::core::events::NotificationAttempt;
use crate::core::events::NotificationEvent;
use crate::core::identifiers::InvoiceId;
use crate::core::identifiers::PaymentId;
use crate::core::identifiers::PhysicianId;
use crate::core::identifiers::StorageRef;
use crate::core::money::Amount;
use crate::core::payment::Contact;
use crate::core::payment::Invoice;
use crate::core::payment::InvoiceStatus;
use crate::core::payment::NetAdjustment;
use crate::core::payment::NewInvoice;
use crate::core::payment::NewPayment;
use crate::core::payment::OcrOutcome;
use crate::core::payment::Payment;
use crate::core::payment::PaymentStamps;
use crate::core::payment::PaymentStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Ledger Store
// ============================================================================

/// Durable record of payments, invoices, and their audit trails.
///
/// # Invariants
/// - `create_invoice` enforces the open-invoice uniqueness invariant
///   atomically at insert (no separate check-then-insert).
/// - `create_payment` enforces one non-cancelled payment per
///   (physician, period) atomically at insert.
/// - Transition methods apply conditionally on expected prior status and
///   return [`StoreError::Conflict`] when the record moved underneath.
pub trait LedgerStore: Send + Sync {
    /// Loads a payment by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the payment does not exist.
    fn payment(&self, id: PaymentId) -> Result<Payment, StoreError>;

    /// Loads an invoice by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the invoice does not exist.
    fn invoice(&self, id: InvoiceId) -> Result<Invoice, StoreError>;

    /// Creates a payment, enforcing the (physician, period) invariant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PeriodOccupied`] when a non-cancelled payment
    /// already covers the pair.
    fn create_payment(&self, payment: NewPayment) -> Result<Payment, StoreError>;

    /// Returns the payment's `pending` or `approved` invoice, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn open_invoice_for(&self, payment: PaymentId) -> Result<Option<Invoice>, StoreError>;

    /// Applies a conditional status transition with field stamps.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the current status is not in
    /// `expected`, leaving the record untouched.
    fn transition_payment(
        &self,
        id: PaymentId,
        expected: &[PaymentStatus],
        to: PaymentStatus,
        stamps: PaymentStamps,
    ) -> Result<Payment, StoreError>;

    /// Creates a `pending` invoice, enforcing open-invoice uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OpenInvoiceExists`] when another invoice for
    /// the payment is `pending` or `approved`.
    fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, StoreError>;

    /// Decides a `pending` invoice exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the invoice is not `pending`.
    fn decide_invoice(
        &self,
        id: InvoiceId,
        decision: InvoiceStatus,
        notes: Option<String>,
        decided_at: Timestamp,
    ) -> Result<Invoice, StoreError>;

    /// Sets the net amount on an invoice and its payment together.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when either record is missing or the write fails.
    fn set_net_amounts(
        &self,
        invoice: InvoiceId,
        payment: PaymentId,
        net: Amount,
    ) -> Result<(), StoreError>;

    /// Appends a net-adjustment audit record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn record_adjustment(&self, adjustment: NetAdjustment) -> Result<(), StoreError>;

    /// Returns the physician's most recent `solicited` or `pending` payment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn open_payment_for_physician(
        &self,
        physician: PhysicianId,
    ) -> Result<Option<Payment>, StoreError>;

    /// Aggregates counts and totals for one `YYYY-MM-DD` day.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn daily_summary(&self, date: &str) -> Result<DaySummary, StoreError>;
}

/// Shared ledger store handle.
pub type SharedLedgerStore = Arc<dyn LedgerStore>;

// ============================================================================
// SECTION: File Storage
// ============================================================================

/// External file storage for submitted documents.
///
/// # Invariants
/// - Storage is never assumed transactional with the ledger; callers issue
///   compensating deletes when a ledger write fails after an upload.
pub trait FileStorage: Send + Sync {
    /// Uploads bytes and returns an opaque reference.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the upload fails.
    fn upload(&self, path_hint: &str, bytes: &[u8]) -> Result<StorageRef, ProviderError>;

    /// Downloads the referenced bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the reference is missing or unreadable.
    fn download(&self, reference: &StorageRef) -> Result<Vec<u8>, ProviderError>;

    /// Returns a temporary signed download URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the URL cannot be produced.
    fn signed_url(&self, reference: &StorageRef, ttl_secs: u64) -> Result<String, ProviderError>;

    /// Deletes the referenced bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the delete fails.
    fn delete(&self, reference: &StorageRef) -> Result<(), ProviderError>;
}

/// Shared file storage handle.
pub type SharedFileStorage = Arc<dyn FileStorage>;

// ============================================================================
// SECTION: OCR Provider
// ============================================================================

/// Document text extraction collaborator.
///
/// # Invariants
/// - Treated as unreliable: any field may be absent and the call may fail
///   outright, both non-fatal to the submission flow.
pub trait OcrProvider: Send + Sync {
    /// Extracts invoice fields from PDF bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the call fails or times out.
    fn extract(&self, pdf: &[u8]) -> Result<OcrOutcome, ProviderError>;
}

/// Shared OCR provider handle.
pub type SharedOcrProvider = Arc<dyn OcrProvider>;

// ============================================================================
// SECTION: Messaging Provider
// ============================================================================

/// WhatsApp-style messaging collaborator.
///
/// # Invariants
/// - No delivery-order or confirmation-latency guarantees.
pub trait Messenger: Send + Sync {
    /// Sends a text message, returning the raw provider response.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the call fails or times out.
    fn send_text(&self, number: &str, body: &str) -> Result<String, ProviderError>;

    /// Sends a media message, returning the raw provider response.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider rejects the media or the
    /// call fails; callers fall back to [`Messenger::send_text`].
    fn send_media(
        &self,
        number: &str,
        bytes: &[u8],
        caption: &str,
        filename: &str,
    ) -> Result<String, ProviderError>;
}

/// Shared messenger handle.
pub type SharedMessenger = Arc<dyn Messenger>;

// ============================================================================
// SECTION: Email Relay
// ============================================================================

/// One e-mail attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    /// Attachment filename.
    pub filename: String,
    /// Attachment bytes.
    pub bytes: Vec<u8>,
}

/// Transactional e-mail collaborator.
pub trait EmailRelay: Send + Sync {
    /// Sends an HTML e-mail, returning the raw relay response.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the call fails or times out.
    fn send(
        &self,
        to: &[String],
        subject: &str,
        html: &str,
        attachments: &[EmailAttachment],
    ) -> Result<String, ProviderError>;
}

/// Shared e-mail relay handle.
pub type SharedEmailRelay = Arc<dyn EmailRelay>;

// ============================================================================
// SECTION: Attempt Log
// ============================================================================

/// Write-only log of notification delivery attempts.
///
/// # Invariants
/// - The dispatcher never reads the log to decide whether to send; the only
///   read path is the webhook router's outbound-request association lookup.
pub trait AttemptLog: Send + Sync {
    /// Appends one attempt record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn record(&self, attempt: &NotificationAttempt) -> Result<(), StoreError>;

    /// Returns the payment of the most recent successful `invoice_requested`
    /// attempt addressed to any of the provided numbers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn latest_request_payment(&self, addresses: &[String])
    -> Result<Option<PaymentId>, StoreError>;
}

/// Shared attempt log handle.
pub type SharedAttemptLog = Arc<dyn AttemptLog>;

// ============================================================================
// SECTION: User Directory
// ============================================================================

/// Read-only directory of managers and physician contacts.
pub trait UserDirectory: Send + Sync {
    /// Returns every user with the manager role.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn managers(&self) -> Result<Vec<Contact>, StoreError>;

    /// Returns the contact for a physician.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the physician is unknown.
    fn physician_contact(&self, physician: PhysicianId) -> Result<Contact, StoreError>;

    /// Finds a physician whose registered number matches any variant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn physician_by_phone(&self, variants: &[String])
    -> Result<Option<PhysicianId>, StoreError>;
}

/// Shared user directory handle.
pub type SharedUserDirectory = Arc<dyn UserDirectory>;

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Multi-channel, multi-recipient notification fan-out.
///
/// # Invariants
/// - Dispatch is best-effort and runs strictly after the ledger commit.
/// - One recipient's failure never blocks another's delivery.
pub trait Dispatcher: Send + Sync {
    /// Submits one logical event for background fan-out.
    fn dispatch(&self, event: NotificationEvent, now: Timestamp) -> DispatchTicket;
}

/// Shared dispatcher handle.
pub type SharedDispatcher = Arc<dyn Dispatcher>;
