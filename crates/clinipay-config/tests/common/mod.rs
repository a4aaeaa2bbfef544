// crates/clinipay-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Minimal valid configuration shared by validation tests.
// =============================================================================

//! Shared fixtures for configuration tests.

use clinipay_config::ClinipayConfig;

/// Returns a minimal configuration that passes validation.
pub fn minimal_config() -> Result<ClinipayConfig, String> {
    let text = r#"
        [workflow]
        ocr_enabled = true
        allow_chat_submission = true
        tolerance_cents = 1

        [store]
        path = "clinipay.db"

        [storage]
        root = "/var/lib/clinipay/files"
        signing_secret = "test-secret"

        [ocr]
        url = "https://ocr.example.com/v1/extract"
        api_key = "ocr-key"

        [whatsapp]
        url = "https://wa.example.com/v1/messages"
        api_key = "wa-key"

        [email]
        url = "https://mail.example.com/v1/send"
        api_key = "mail-key"
        from_address = "finance@example.com"

        [server]
        bind = "127.0.0.1:8843"
        public_base_url = "https://pay.example.com"
    "#;
    toml::from_str(text).map_err(|err| err.to_string())
}
