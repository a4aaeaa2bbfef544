//! Config load validation tests for clinipay-config.
// crates/clinipay-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use clinipay_config::ClinipayConfig;
use clinipay_config::ConfigError;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<ClinipayConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(ClinipayConfig::load(Some(path)), "config path exceeds max length")?;
    Ok(())
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(ClinipayConfig::load(Some(path)), "config path component too long")?;
    Ok(())
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(ClinipayConfig::load(Some(file.path())), "config file exceeds size limit")?;
    Ok(())
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(ClinipayConfig::load(Some(file.path())), "config file must be utf-8")?;
    Ok(())
}

#[test]
fn load_rejects_unknown_top_level_keys() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[mystery]\nvalue = 1\n").map_err(|err| err.to_string())?;
    assert_invalid(ClinipayConfig::load(Some(file.path())), "config parse failure")?;
    Ok(())
}

#[test]
fn load_accepts_a_complete_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let text = r#"
        [store]
        path = "clinipay.db"

        [storage]
        root = "/var/lib/clinipay/files"
        signing_secret = "secret"

        [ocr]
        url = "https://ocr.example.com/v1/extract"
        api_key = "ocr-key"

        [server]
        bind = "127.0.0.1:8843"
        public_base_url = "https://pay.example.com"
    "#;
    file.write_all(text.as_bytes()).map_err(|err| err.to_string())?;
    let config = ClinipayConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if !config.workflow.ocr_enabled {
        return Err("ocr_enabled should default to true".to_string());
    }
    if config.workflow.tolerance_cents != 1 {
        return Err("tolerance_cents should default to 1".to_string());
    }
    if config.digest.enabled {
        return Err("digest should default to disabled".to_string());
    }
    Ok(())
}
