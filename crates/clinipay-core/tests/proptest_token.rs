// crates/clinipay-core/tests/proptest_token.rs
// ============================================================================
// Module: Action Token Property-Based Tests
// Description: Property tests for token derivation and validation.
// Purpose: Detect collisions and validation drift across wide input ranges.
// ============================================================================

//! Property-based tests for the action token codec.

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

use clinipay_core::InvoiceId;
use clinipay_core::TOKEN_LENGTH;
use clinipay_core::Timestamp;
use clinipay_core::token::ActionKind;
use clinipay_core::token::encode;
use clinipay_core::token::validate;
use proptest::prelude::*;

fn invoice_id_strategy() -> impl Strategy<Value = InvoiceId> {
    (1_u64 .. u64::MAX).prop_map(|raw| InvoiceId::from_raw(raw).unwrap())
}

fn kind_strategy() -> impl Strategy<Value = ActionKind> {
    prop_oneof![Just(ActionKind::Approve), Just(ActionKind::Reject)]
}

proptest! {
    #[test]
    fn derived_tokens_validate(
        id in invoice_id_strategy(),
        millis in 0_i64 .. 4_102_444_800_000,
        kind in kind_strategy(),
    ) {
        let created_at = Timestamp::from_millis(millis);
        let token = encode(id, created_at, kind);
        prop_assert!(token.len() <= TOKEN_LENGTH);
        prop_assert!(validate(&token, id, created_at, kind));
    }

    #[test]
    fn approve_and_reject_tokens_never_collide(
        id in invoice_id_strategy(),
        millis in 0_i64 .. 4_102_444_800_000,
    ) {
        let created_at = Timestamp::from_millis(millis);
        let approve = encode(id, created_at, ActionKind::Approve);
        let reject = encode(id, created_at, ActionKind::Reject);
        prop_assert_ne!(&approve, &reject);
        prop_assert!(!validate(&approve, id, created_at, ActionKind::Reject));
        prop_assert!(!validate(&reject, id, created_at, ActionKind::Approve));
    }

    #[test]
    fn wrong_invoice_or_time_fails_validation(
        id in 1_u64 .. u64::MAX - 1,
        millis in 0_i64 .. 4_102_444_800_000,
        kind in kind_strategy(),
    ) {
        let invoice = InvoiceId::from_raw(id).unwrap();
        let other_invoice = InvoiceId::from_raw(id + 1).unwrap();
        let created_at = Timestamp::from_millis(millis);
        let shifted = Timestamp::from_millis(millis + 1);
        let token = encode(invoice, created_at, kind);
        prop_assert!(!validate(&token, other_invoice, created_at, kind));
        prop_assert!(!validate(&token, invoice, shifted, kind));
    }

    #[test]
    fn truncated_or_padded_tokens_fail(
        id in invoice_id_strategy(),
        millis in 0_i64 .. 4_102_444_800_000,
        kind in kind_strategy(),
    ) {
        let created_at = Timestamp::from_millis(millis);
        let token = encode(id, created_at, kind);
        let truncated = &token[.. token.len() - 1];
        let padded = format!("{token}A");
        prop_assert!(!validate(truncated, id, created_at, kind));
        prop_assert!(!validate(&padded, id, created_at, kind));
        prop_assert!(!validate("", id, created_at, kind));
    }

    #[test]
    fn single_character_corruption_fails(
        id in invoice_id_strategy(),
        millis in 0_i64 .. 4_102_444_800_000,
        kind in kind_strategy(),
        position in 0_usize .. TOKEN_LENGTH,
    ) {
        let created_at = Timestamp::from_millis(millis);
        let token = encode(id, created_at, kind);
        prop_assume!(position < token.len());
        let mut corrupted: Vec<u8> = token.clone().into_bytes();
        corrupted[position] = if corrupted[position] == b'!' { b'?' } else { b'!' };
        let corrupted = String::from_utf8(corrupted).unwrap();
        prop_assert!(!validate(&corrupted, id, created_at, kind));
    }
}
