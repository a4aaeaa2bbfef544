// crates/clinipay-providers/src/ocr.rs
// ============================================================================
// Module: HTTP OCR Provider
// Description: Invoice field extraction over a bounded HTTP endpoint.
// Purpose: Turn PDF bytes into an OcrOutcome without trusting the provider.
// Dependencies: crate::http, clinipay-config, clinipay-core, base64, reqwest,
//               serde, serde_json
// ============================================================================

//! ## Overview
//! The OCR service is treated as unreliable by contract: any field may be
//! missing, amounts may be unparseable, and the whole call may fail. All of
//! that degrades to an unprocessed or partial [`OcrOutcome`]; only
//! transport and policy violations surface as [`ProviderError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clinipay_config::OcrConfig;
use clinipay_core::Amount;
use clinipay_core::OcrOutcome;
use clinipay_core::OcrProvider;
use clinipay_core::ProviderError;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::Serialize;

use crate::http::build_client;
use crate::http::ensure_success;
use crate::http::map_send_error;
use crate::http::read_limited;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Extraction request payload.
#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    /// Base64 of the PDF bytes.
    document_base64: &'a str,
    /// Document media type hint.
    content_type: &'a str,
}

/// Extraction response payload; every field is optional by contract.
#[derive(Debug, Deserialize)]
struct ExtractResponse {
    /// Printed invoice number, when detected.
    invoice_number: Option<String>,
    /// Printed gross amount as decimal text, when detected.
    gross_amount: Option<String>,
    /// Printed net amount as decimal text, when detected.
    net_amount: Option<String>,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// OCR extraction over one HTTP endpoint with bearer authentication.
pub struct HttpOcrProvider {
    /// Endpoint URL.
    url: String,
    /// Bearer API key.
    api_key: String,
    /// Response size cap in bytes.
    max_response_bytes: usize,
    /// Bounded blocking client.
    client: Client,
}

impl HttpOcrProvider {
    /// Creates the provider from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the HTTP client cannot be built or the
    /// configured response cap does not fit an address-space size.
    pub fn new(config: &OcrConfig) -> Result<Self, ProviderError> {
        let max_response_bytes = usize::try_from(config.max_response_bytes)
            .map_err(|_| ProviderError::Invalid("max_response_bytes too large".to_string()))?;
        Ok(Self {
            url: config.endpoint.url.clone(),
            api_key: config.endpoint.api_key.clone(),
            max_response_bytes,
            client: build_client(config.endpoint.timeout_ms)?,
        })
    }
}

impl OcrProvider for HttpOcrProvider {
    fn extract(&self, pdf: &[u8]) -> Result<OcrOutcome, ProviderError> {
        let encoded = STANDARD.encode(pdf);
        let body = serde_json::to_string(&ExtractRequest {
            document_base64: &encoded,
            content_type: "application/pdf",
        })
        .map_err(|err| ProviderError::Invalid(format!("request encoding failed: {err}")))?;
        let response = self
            .client
            .post(&self.url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .map_err(|err| map_send_error(&err))?;
        ensure_success(response.status())?;
        let bytes = read_limited(response, self.max_response_bytes)?;
        let parsed: ExtractResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ProviderError::Invalid(format!("response decoding failed: {err}")))?;
        Ok(outcome_from(parsed))
    }
}

/// Converts the wire response into an outcome, dropping unparseable amounts.
fn outcome_from(parsed: ExtractResponse) -> OcrOutcome {
    OcrOutcome {
        invoice_number: parsed.invoice_number,
        gross_amount: parsed.gross_amount.as_deref().and_then(parse_amount),
        net_amount: parsed.net_amount.as_deref().and_then(parse_amount),
        processed: true,
    }
}

/// Parses provider decimal text leniently, accepting a comma separator.
fn parse_amount(text: &str) -> Option<Amount> {
    let normalized = text.trim().replace(',', ".");
    Amount::parse(&normalized).ok()
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

    use clinipay_core::Amount;

    use super::ExtractResponse;
    use super::outcome_from;
    use super::parse_amount;

    #[test]
    fn comma_decimals_parse_like_dots() {
        assert_eq!(parse_amount(" 1234,56 "), Some(Amount::parse("1234.56").unwrap()));
    }

    #[test]
    fn unparseable_amounts_degrade_to_absent_fields() {
        let outcome = outcome_from(ExtractResponse {
            invoice_number: Some("NF-123".to_string()),
            gross_amount: Some("one thousand".to_string()),
            net_amount: None,
        });
        assert!(outcome.processed);
        assert_eq!(outcome.invoice_number.as_deref(), Some("NF-123"));
        assert_eq!(outcome.gross_amount, None);
        assert_eq!(outcome.net_amount, None);
    }
}
