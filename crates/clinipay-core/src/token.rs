// crates/clinipay-core/src/token.rs
// ============================================================================
// Module: Clinipay Action Token Codec
// Description: Deterministic single-action bearer tokens for approve/reject links.
// Purpose: Authorize one action on one invoice without a login path.
// Dependencies: crate::core::{identifiers, time}, base64, sha2, subtle
// ============================================================================

//! ## Overview
//! Action tokens are derived, unauthenticated bearer capabilities scoped to
//! one invoice and one action kind. Derivation is deterministic and
//! stateless; validation re-derives and compares in constant time so no
//! token bytes leak through timing. Single-use enforcement is not here: the
//! engine's `pending` guard rejects replays against decided invoices as a
//! stale-state condition, not a token error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::core::identifiers::InvoiceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Action Kind
// ============================================================================

/// Action authorized by a token.
///
/// # Invariants
/// - Labels are stable; they are part of the token derivation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Approve the invoice.
    Approve,
    /// Reject the invoice.
    Reject,
}

impl ActionKind {
    /// Returns the stable label mixed into the derivation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Number of characters kept from the encoded digest.
pub const TOKEN_LENGTH: usize = 20;

/// Derives the action token for `(invoice, created_at, kind)`.
///
/// The material is hashed before encoding so every input byte, including
/// the action-kind suffix, influences every kept character; truncating the
/// encoding never drops part of the derivation input.
#[must_use]
pub fn encode(invoice_id: InvoiceId, created_at: Timestamp, kind: ActionKind) -> String {
    let material = format!("{invoice_id}-{}-{}", created_at.as_millis(), kind.as_str());
    let digest = Sha256::digest(material.as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    encoded.chars().take(TOKEN_LENGTH).collect()
}

/// Validates a presented token against the re-derived value.
///
/// Comparison is a constant-time byte-equality check; a length mismatch
/// short-circuits because length is not secret.
#[must_use]
pub fn validate(
    presented: &str,
    invoice_id: InvoiceId,
    created_at: Timestamp,
    kind: ActionKind,
) -> bool {
    let derived = encode(invoice_id, created_at, kind);
    let presented = presented.as_bytes();
    let derived = derived.as_bytes();
    if presented.len() != derived.len() {
        return false;
    }
    presented.ct_eq(derived).into()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::ActionKind;
    use super::TOKEN_LENGTH;
    use super::encode;
    use super::validate;
    use crate::core::identifiers::InvoiceId;
    use crate::core::time::Timestamp;

    fn invoice(raw: u64) -> InvoiceId {
        InvoiceId::from_raw(raw).unwrap()
    }

    #[test]
    fn encode_is_deterministic() {
        let a = encode(invoice(42), Timestamp::from_millis(1_700_000_000_000), ActionKind::Approve);
        let b = encode(invoice(42), Timestamp::from_millis(1_700_000_000_000), ActionKind::Approve);
        assert_eq!(a, b);
        assert_eq!(a.len(), TOKEN_LENGTH);
    }

    #[test]
    fn action_kinds_derive_distinct_tokens() {
        let created = Timestamp::from_millis(1_700_000_000_000);
        let approve = encode(invoice(42), created, ActionKind::Approve);
        let reject = encode(invoice(42), created, ActionKind::Reject);
        assert_ne!(approve, reject);
    }

    #[test]
    fn validate_accepts_matching_token() {
        let created = Timestamp::from_millis(1_700_000_000_000);
        let token = encode(invoice(7), created, ActionKind::Reject);
        assert!(validate(&token, invoice(7), created, ActionKind::Reject));
    }

    #[test]
    fn validate_rejects_wrong_invoice_kind_or_instant() {
        let created = Timestamp::from_millis(1_700_000_000_000);
        let token = encode(invoice(7), created, ActionKind::Approve);
        assert!(!validate(&token, invoice(8), created, ActionKind::Approve));
        assert!(!validate(&token, invoice(7), created, ActionKind::Reject));
        assert!(!validate(
            &token,
            invoice(7),
            Timestamp::from_millis(1_700_000_000_001),
            ActionKind::Approve
        ));
    }

    #[test]
    fn validate_rejects_truncated_and_padded_tokens() {
        let created = Timestamp::from_millis(1_700_000_000_000);
        let token = encode(invoice(7), created, ActionKind::Approve);
        assert!(!validate(&token[.. token.len() - 1], invoice(7), created, ActionKind::Approve));
        let padded = format!("{token}A");
        assert!(!validate(&padded, invoice(7), created, ActionKind::Approve));
    }
}
