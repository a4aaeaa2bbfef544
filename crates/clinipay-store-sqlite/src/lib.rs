// crates/clinipay-store-sqlite/src/lib.rs
// ============================================================================
// Module: Clinipay SQLite Store Root
// Description: Public API surface for the SQLite ledger store.
// Purpose: Expose the durable LedgerStore and AttemptLog implementation.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! Durable [`clinipay_core::LedgerStore`] and [`clinipay_core::AttemptLog`]
//! backed by `SQLite` in WAL mode. The uniqueness invariants are partial
//! unique indexes, so the duplicate-submission race is closed inside the
//! database rather than by any check-then-insert sequence in Rust.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::store::SqliteJournalMode;
pub use crate::store::SqliteLedger;
pub use crate::store::SqliteLedgerConfig;
pub use crate::store::SqliteLedgerError;
pub use crate::store::SqliteSyncMode;
