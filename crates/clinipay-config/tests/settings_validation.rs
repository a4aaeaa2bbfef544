//! Settings validation tests for clinipay-config.
// crates/clinipay-config/tests/settings_validation.rs
// =============================================================================
// Module: Settings Validation Tests
// Description: Validate server, provider, and workflow setting constraints.
// Purpose: Ensure deployment settings fail closed and enforce limits.
// =============================================================================

use clinipay_config::ConfigError;

mod common;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

#[test]
fn minimal_config_is_valid() -> TestResult {
    let config = common::minimal_config()?;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn bind_must_be_a_socket_address() -> TestResult {
    let mut config = common::minimal_config()?;
    config.server.bind = "not-an-address".to_string();
    assert_invalid(config.validate(), "server.bind must be a socket address")?;
    Ok(())
}

#[test]
fn non_loopback_bind_requires_verify_token() -> TestResult {
    let mut config = common::minimal_config()?;
    config.server.bind = "0.0.0.0:8843".to_string();
    config.server.webhook_verify_token = None;
    assert_invalid(config.validate(), "non-loopback bind disallowed without webhook verify token")?;
    Ok(())
}

#[test]
fn non_loopback_bind_with_verify_token_is_accepted() -> TestResult {
    let mut config = common::minimal_config()?;
    config.server.bind = "0.0.0.0:8843".to_string();
    config.server.webhook_verify_token = Some("hub-token".to_string());
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn public_base_url_must_be_http() -> TestResult {
    let mut config = common::minimal_config()?;
    config.server.public_base_url = "ftp://pay.example.com".to_string();
    assert_invalid(config.validate(), "server.public_base_url must use http or https")?;
    Ok(())
}

#[test]
fn ocr_enabled_requires_an_ocr_section() -> TestResult {
    let mut config = common::minimal_config()?;
    config.ocr = None;
    assert_invalid(config.validate(), "workflow.ocr_enabled requires an [ocr] section")?;
    Ok(())
}

#[test]
fn ocr_disabled_tolerates_a_missing_section() -> TestResult {
    let mut config = common::minimal_config()?;
    config.workflow.ocr_enabled = false;
    config.ocr = None;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn provider_timeout_is_bounded() -> TestResult {
    let mut config = common::minimal_config()?;
    if let Some(whatsapp) = config.whatsapp.as_mut() {
        whatsapp.timeout_ms = 0;
    }
    assert_invalid(config.validate(), "whatsapp.timeout_ms must be in 1..=120000")?;

    let mut config = common::minimal_config()?;
    if let Some(whatsapp) = config.whatsapp.as_mut() {
        whatsapp.timeout_ms = 600_000;
    }
    assert_invalid(config.validate(), "whatsapp.timeout_ms must be in 1..=120000")?;
    Ok(())
}

#[test]
fn provider_api_key_must_be_non_empty() -> TestResult {
    let mut config = common::minimal_config()?;
    if let Some(ocr) = config.ocr.as_mut() {
        ocr.endpoint.api_key = "   ".to_string();
    }
    assert_invalid(config.validate(), "ocr.api_key must be non-empty")?;
    Ok(())
}

#[test]
fn email_from_address_must_be_an_address() -> TestResult {
    let mut config = common::minimal_config()?;
    if let Some(email) = config.email.as_mut() {
        email.from_address = "finance".to_string();
    }
    assert_invalid(config.validate(), "email.from_address must be an address")?;
    Ok(())
}

#[test]
fn signing_secret_must_be_non_empty() -> TestResult {
    let mut config = common::minimal_config()?;
    config.storage.signing_secret = String::new();
    assert_invalid(config.validate(), "storage.signing_secret must be non-empty")?;
    Ok(())
}

#[test]
fn country_code_must_be_short_digits() -> TestResult {
    let mut config = common::minimal_config()?;
    config.workflow.default_country_code = "+55".to_string();
    assert_invalid(config.validate(), "workflow.default_country_code must be 1-3 digits")?;

    let mut config = common::minimal_config()?;
    config.workflow.default_country_code = "5555".to_string();
    assert_invalid(config.validate(), "workflow.default_country_code must be 1-3 digits")?;
    Ok(())
}

#[test]
fn digest_hour_is_bounded() -> TestResult {
    let mut config = common::minimal_config()?;
    config.digest.send_hour = 24;
    assert_invalid(config.validate(), "digest.send_hour must be 0-23")?;
    Ok(())
}

#[test]
fn tolerance_feeds_the_reconciler_amount() -> TestResult {
    let mut config = common::minimal_config()?;
    config.workflow.tolerance_cents = 2;
    let tolerance = config.workflow.tolerance();
    if tolerance.to_string() == "0.02" {
        Ok(())
    } else {
        Err(format!("unexpected tolerance: {tolerance}"))
    }
}
