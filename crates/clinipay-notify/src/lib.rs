// crates/clinipay-notify/src/lib.rs
// ============================================================================
// Module: Clinipay Notify Root
// Description: Public API surface for the notification dispatcher.
// Purpose: Expose channels, recipient rules, templates, fan-out, and digest.
// Dependencies: crate::{channel, digest, dispatcher, recipients, templates}
// ============================================================================

//! ## Overview
//! Multi-channel, multi-recipient notification fan-out. One logical
//! [`clinipay_core::NotificationEvent`] becomes N independent deliveries
//! across WhatsApp, e-mail, and in-app realtime channels; partial failure
//! is the normal case and never blocks the ledger transition that raised
//! the event.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod channel;
pub mod digest;
pub mod dispatcher;
pub mod recipients;
pub mod templates;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::channel::AttachmentPayload;
pub use crate::channel::EmailChannel;
pub use crate::channel::NotificationChannel;
pub use crate::channel::OutboundMessage;
pub use crate::channel::RealtimeChannel;
pub use crate::channel::RealtimeNotice;
pub use crate::channel::SharedChannel;
pub use crate::channel::WhatsAppChannel;
pub use crate::digest::DigestOutcome;
pub use crate::digest::date_for;
pub use crate::digest::run_daily_digest;
pub use crate::dispatcher::DispatchError;
pub use crate::dispatcher::DispatcherConfig;
pub use crate::dispatcher::FanoutDispatcher;
pub use crate::templates::RenderedMessage;
pub use crate::templates::action_url;
pub use crate::templates::render;
