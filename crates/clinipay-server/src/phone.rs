// crates/clinipay-server/src/phone.rs
// ============================================================================
// Module: Phone Normalization
// Description: Sender-number normalization and mobile-prefix variants.
// Purpose: Match inbound senders against registrations with or without the
//          extra mobile prefix digit.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Physicians register numbers with or without the locale-specific mobile
//! prefix digit that follows the country and area codes (the Brazilian
//! leading `9`). An inbound sender must therefore be expanded into every
//! normalized variant before the router may conclude "unknown sender".

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Length of the area code that follows the country code.
const AREA_CODE_LEN: usize = 2;

/// Local number length without the mobile prefix digit.
const SHORT_LOCAL_LEN: usize = 8;

/// Local number length with the mobile prefix digit.
const LONG_LOCAL_LEN: usize = 9;

/// The mobile prefix digit inserted after the area code.
const MOBILE_PREFIX: char = '9';

/// Strips everything but digits from a sender address.
#[must_use]
pub fn normalize(sender: &str) -> String {
    sender.chars().filter(char::is_ascii_digit).collect()
}

/// Expands a sender into every registration variant worth matching.
///
/// The sender itself (normalized, with the country code prepended when it
/// arrives in national form) always comes first; the with/without-prefix
/// twin follows when the number has mobile shape.
#[must_use]
pub fn variants(sender: &str, country_code: &str) -> Vec<String> {
    let digits = normalize(sender);
    if digits.is_empty() {
        return Vec::new();
    }
    let national = digits.len() == AREA_CODE_LEN + SHORT_LOCAL_LEN
        || digits.len() == AREA_CODE_LEN + LONG_LOCAL_LEN;
    let canonical = if !digits.starts_with(country_code) && national {
        // National form: prepend the configured country code.
        format!("{country_code}{digits}")
    } else {
        digits
    };

    let mut out = vec![canonical.clone()];
    if let Some(twin) = prefix_twin(&canonical, country_code)
        && !out.contains(&twin)
    {
        out.push(twin);
    }
    out
}

/// Returns the with/without-mobile-prefix twin of a canonical number.
fn prefix_twin(canonical: &str, country_code: &str) -> Option<String> {
    let local = canonical.strip_prefix(country_code)?;
    if local.len() == AREA_CODE_LEN + LONG_LOCAL_LEN {
        let (area, rest) = local.split_at(AREA_CODE_LEN);
        let mut chars = rest.chars();
        if chars.next() == Some(MOBILE_PREFIX) {
            return Some(format!("{country_code}{area}{}", chars.as_str()));
        }
        return None;
    }
    if local.len() == AREA_CODE_LEN + SHORT_LOCAL_LEN {
        let (area, rest) = local.split_at(AREA_CODE_LEN);
        return Some(format!("{country_code}{area}{MOBILE_PREFIX}{rest}"));
    }
    None
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

    use super::normalize;
    use super::variants;

    #[test]
    fn normalization_strips_formatting() {
        assert_eq!(normalize("+55 (31) 98888-7777"), "5531988887777");
    }

    #[test]
    fn long_mobile_numbers_gain_a_short_twin() {
        assert_eq!(
            variants("5531988887777", "55"),
            vec!["5531988887777".to_string(), "553188887777".to_string()]
        );
    }

    #[test]
    fn short_mobile_numbers_gain_a_long_twin() {
        assert_eq!(
            variants("553188887777", "55"),
            vec!["553188887777".to_string(), "5531988887777".to_string()]
        );
    }

    #[test]
    fn national_form_is_canonicalized_with_the_country_code() {
        assert_eq!(
            variants("(31) 98888-7777", "55"),
            vec!["5531988887777".to_string(), "553188887777".to_string()]
        );
    }

    #[test]
    fn long_numbers_without_the_prefix_digit_have_no_twin() {
        // Nine local digits not starting with 9 cannot drop a prefix.
        assert_eq!(variants("5531788887777", "55"), vec!["5531788887777".to_string()]);
    }

    #[test]
    fn odd_lengths_pass_through_untouched() {
        // Neither national form nor country-prefixed mobile shape.
        assert_eq!(variants("08001234", "55"), vec!["08001234".to_string()]);
        assert!(variants("abc", "55").is_empty());
    }
}
