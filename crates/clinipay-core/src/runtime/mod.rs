// crates/clinipay-core/src/runtime/mod.rs
// ============================================================================
// Module: Clinipay Runtime
// Description: Workflow engine and in-memory reference backends.
// Purpose: Group the state machine with the backends used by tests.
// Dependencies: crate::{core, interfaces, reconcile, token}
// ============================================================================

//! ## Overview
//! The runtime layer holds the [`engine::WorkflowEngine`] and the in-memory
//! collaborator implementations. Production deployments swap the in-memory
//! backends for the SQLite ledger and HTTP providers; the engine itself is
//! backend-agnostic.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod engine;
pub mod memory;
