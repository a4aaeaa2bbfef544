// crates/clinipay-providers/src/email.rs
// ============================================================================
// Module: HTTP E-mail Relay
// Description: Transactional HTML mail over an HTTP relay API.
// Purpose: Bounded relay calls with inline base64 attachments.
// Dependencies: crate::http, clinipay-config, clinipay-core, base64, reqwest,
//               serde, serde_json
// ============================================================================

//! ## Overview
//! Mail goes out through an HTTP relay rather than SMTP; the relay's raw
//! response is surfaced so attempt logs keep whatever correlation id the
//! relay hands back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clinipay_config::EmailConfig;
use clinipay_core::EmailAttachment;
use clinipay_core::EmailRelay;
use clinipay_core::ProviderError;
use reqwest::blocking::Client;
use serde::Serialize;

use crate::http::DEFAULT_MAX_RESPONSE_BYTES;
use crate::http::build_client;
use crate::http::ensure_success;
use crate::http::map_send_error;
use crate::http::read_limited_text;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// One inline attachment on the wire.
#[derive(Debug, Serialize)]
struct WireAttachment<'a> {
    /// Attachment filename.
    filename: &'a str,
    /// Base64 of the attachment bytes.
    content_base64: String,
}

/// Relay send payload.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    /// Sender address.
    from: &'a str,
    /// Recipient addresses.
    to: &'a [String],
    /// Subject line.
    subject: &'a str,
    /// HTML body.
    html: &'a str,
    /// Inline attachments.
    attachments: Vec<WireAttachment<'a>>,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// HTTP e-mail relay client with bearer authentication.
pub struct HttpEmailRelay {
    /// Relay endpoint URL.
    url: String,
    /// Bearer API key.
    api_key: String,
    /// Sender address for workflow mail.
    from_address: String,
    /// Bounded blocking client.
    client: Client,
}

impl HttpEmailRelay {
    /// Creates the relay client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the HTTP client cannot be built.
    pub fn new(config: &EmailConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            url: config.endpoint.url.clone(),
            api_key: config.endpoint.api_key.clone(),
            from_address: config.from_address.clone(),
            client: build_client(config.endpoint.timeout_ms)?,
        })
    }
}

impl EmailRelay for HttpEmailRelay {
    fn send(
        &self,
        to: &[String],
        subject: &str,
        html: &str,
        attachments: &[EmailAttachment],
    ) -> Result<String, ProviderError> {
        if to.is_empty() {
            return Err(ProviderError::Invalid("no recipients".to_string()));
        }
        let wire_attachments = attachments
            .iter()
            .map(|attachment| WireAttachment {
                filename: &attachment.filename,
                content_base64: STANDARD.encode(&attachment.bytes),
            })
            .collect();
        let payload = serde_json::to_string(&SendRequest {
            from: &self.from_address,
            to,
            subject,
            html,
            attachments: wire_attachments,
        })
        .map_err(|err| ProviderError::Invalid(format!("request encoding failed: {err}")))?;
        let response = self
            .client
            .post(&self.url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .body(payload)
            .send()
            .map_err(|err| map_send_error(&err))?;
        ensure_success(response.status())?;
        read_limited_text(response, DEFAULT_MAX_RESPONSE_BYTES)
    }
}
