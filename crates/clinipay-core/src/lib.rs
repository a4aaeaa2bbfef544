// crates/clinipay-core/src/lib.rs
// ============================================================================
// Module: Clinipay Core Root
// Description: Public API surface for the payment workflow core.
// Purpose: Wire together core types, interfaces, and the workflow runtime.
// Dependencies: crate::{core, interfaces, reconcile, runtime, token}
// ============================================================================

//! ## Overview
//! `clinipay-core` owns the physician payment workflow: the payment and
//! invoice records, the amount reconciler, the action-token codec, the
//! collaborator interfaces, and the workflow engine that sequences them.
//! Everything here is deterministic and synchronous; wall-clock time enters
//! only as explicit [`core::time::Timestamp`] parameters, and all I/O sits
//! behind [`interfaces`] traits.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod reconcile;
pub mod runtime;
pub mod token;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::errors::ProviderError;
pub use crate::core::errors::StoreError;
pub use crate::core::errors::WorkflowError;
pub use crate::core::events::ChannelKind;
pub use crate::core::events::DaySummary;
pub use crate::core::events::DeliveryOutcome;
pub use crate::core::events::DeliveryResult;
pub use crate::core::events::DispatchTicket;
pub use crate::core::events::NotificationAttempt;
pub use crate::core::events::NotificationEvent;
pub use crate::core::hashing::sha256_hex;
pub use crate::core::identifiers::CorrelationId;
pub use crate::core::identifiers::InvoiceId;
pub use crate::core::identifiers::PaymentId;
pub use crate::core::identifiers::PhysicianId;
pub use crate::core::identifiers::StorageRef;
pub use crate::core::identifiers::UserId;
pub use crate::core::money::Amount;
pub use crate::core::money::MoneyError;
pub use crate::core::payment::Contact;
pub use crate::core::payment::Invoice;
pub use crate::core::payment::InvoiceStatus;
pub use crate::core::payment::NetAdjustment;
pub use crate::core::payment::NewInvoice;
pub use crate::core::payment::NewPayment;
pub use crate::core::payment::OcrOutcome;
pub use crate::core::payment::Payment;
pub use crate::core::payment::PaymentStamps;
pub use crate::core::payment::PaymentStatus;
pub use crate::core::time::CompetencePeriod;
pub use crate::core::time::PeriodError;
pub use crate::core::time::Timestamp;
pub use crate::interfaces::AttemptLog;
pub use crate::interfaces::Dispatcher;
pub use crate::interfaces::EmailAttachment;
pub use crate::interfaces::EmailRelay;
pub use crate::interfaces::FileStorage;
pub use crate::interfaces::LedgerStore;
pub use crate::interfaces::Messenger;
pub use crate::interfaces::OcrProvider;
pub use crate::interfaces::SharedAttemptLog;
pub use crate::interfaces::SharedDispatcher;
pub use crate::interfaces::SharedEmailRelay;
pub use crate::interfaces::SharedFileStorage;
pub use crate::interfaces::SharedLedgerStore;
pub use crate::interfaces::SharedMessenger;
pub use crate::interfaces::SharedOcrProvider;
pub use crate::interfaces::SharedUserDirectory;
pub use crate::interfaces::UserDirectory;
pub use crate::reconcile::ReconcileOutcome;
pub use crate::reconcile::default_tolerance;
pub use crate::reconcile::reconcile;
pub use crate::runtime::engine::InvoiceUpload;
pub use crate::runtime::engine::RequestOutcome;
pub use crate::runtime::engine::WorkflowEngine;
pub use crate::runtime::engine::WorkflowSnapshot;
pub use crate::runtime::memory::InMemoryAttemptLog;
pub use crate::runtime::memory::InMemoryDirectory;
pub use crate::runtime::memory::InMemoryLedger;
pub use crate::runtime::memory::NoopDispatcher;
pub use crate::token::ActionKind;
pub use crate::token::TOKEN_LENGTH;
