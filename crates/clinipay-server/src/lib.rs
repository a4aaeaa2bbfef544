// crates/clinipay-server/src/lib.rs
// ============================================================================
// Module: Clinipay Server
// Description: HTTP surface for action links, webhooks, and downloads.
// Purpose: Bridge untrusted inbound traffic into the workflow engine.
// Dependencies: clinipay-core, clinipay-providers, axum, tokio
// ============================================================================

//! ## Overview
//! This crate hosts the clinipay HTTP surface: tokenized approve/reject
//! action links, the inbound messaging webhook with its payment association
//! chain, signed document downloads, and a liveness probe. Handlers bridge
//! into the synchronous engine via `spawn_blocking`; every decision and
//! webhook disposition emits one audit event.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod actions;
pub mod audit;
pub mod files;
pub mod inbound;
pub mod phone;
pub mod router;
pub mod state;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::audit::ActionAuditEvent;
pub use crate::audit::AuditSink;
pub use crate::audit::SharedAuditSink;
pub use crate::audit::StderrAuditSink;
pub use crate::audit::WebhookAuditEvent;
pub use crate::inbound::InboundEvent;
pub use crate::router::ServerError;
pub use crate::router::build_router;
pub use crate::router::serve;
pub use crate::state::AppState;
pub use crate::state::current_timestamp;
