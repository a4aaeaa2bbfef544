// crates/clinipay-providers/src/lib.rs
// ============================================================================
// Module: Clinipay Providers Root
// Description: Concrete implementations of the external collaborator traits.
// Purpose: Expose storage, OCR, messaging, and e-mail providers.
// Dependencies: crate::{email, http, messaging, ocr, storage}
// ============================================================================

//! ## Overview
//! Every provider here is an unreliable external collaborator: calls carry
//! bounded timeouts, redirects are disabled, response bodies are size-capped,
//! and failures map onto [`clinipay_core::ProviderError`] so the engine and
//! dispatcher can isolate them per operation.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod email;
pub mod messaging;
pub mod ocr;
pub mod storage;

/// Shared bounded HTTP plumbing for the outbound providers.
mod http;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::email::HttpEmailRelay;
pub use crate::messaging::HttpMessenger;
pub use crate::ocr::HttpOcrProvider;
pub use crate::storage::LocalFileStorage;
