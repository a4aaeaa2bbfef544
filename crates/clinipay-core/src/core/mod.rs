// crates/clinipay-core/src/core/mod.rs
// ============================================================================
// Module: Clinipay Core Model
// Description: Identifiers, money, time, records, events, and errors.
// Purpose: Group the pure data model shared by every Clinipay crate.
// Dependencies: submodules
// ============================================================================

//! ## Overview
//! The core model is pure data: no I/O, no wall-clock reads, no provider
//! calls. Everything here is serializable with stable wire forms.

/// Typed error taxonomy.
pub mod errors;
/// Notification events and delivery records.
pub mod events;
/// Content hashing helpers.
pub mod hashing;
/// Canonical identifiers.
pub mod identifiers;
/// Currency-exact amounts.
pub mod money;
/// Payment and invoice records.
pub mod payment;
/// Timestamps and competence periods.
pub mod time;
