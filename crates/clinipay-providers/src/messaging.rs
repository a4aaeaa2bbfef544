// crates/clinipay-providers/src/messaging.rs
// ============================================================================
// Module: HTTP Messenger
// Description: WhatsApp-style text and media delivery over an HTTP gateway.
// Purpose: Bounded, no-redirect calls with the raw response surfaced upward.
// Dependencies: crate::http, clinipay-config, clinipay-core, base64, reqwest,
//               serde, serde_json
// ============================================================================

//! ## Overview
//! Thin client for a messaging gateway. Media rejections come back as
//! [`ProviderError::Rejected`] so the WhatsApp channel can fall back to a
//! text message with a signed download link; transport failures and
//! timeouts stay distinct because only the channel layer decides what is
//! retriable by a later scheduled job.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clinipay_config::EndpointConfig;
use clinipay_core::Messenger;
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

/// Text message payload.
#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    /// Destination number, digits only.
    to: &'a str,
    /// Message body.
    body: &'a str,
}

/// Media message payload.
#[derive(Debug, Serialize)]
struct MediaRequest<'a> {
    /// Destination number, digits only.
    to: &'a str,
    /// Caption shown with the media.
    caption: &'a str,
    /// Media filename.
    filename: &'a str,
    /// Base64 of the media bytes.
    media_base64: &'a str,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Messaging gateway client with bearer authentication.
pub struct HttpMessenger {
    /// Gateway base URL.
    url: String,
    /// Bearer API key.
    api_key: String,
    /// Bounded blocking client.
    client: Client,
}

impl HttpMessenger {
    /// Creates the messenger from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the HTTP client cannot be built.
    pub fn new(config: &EndpointConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: build_client(config.timeout_ms)?,
        })
    }

    /// Posts one JSON payload to a gateway path, returning the raw response.
    fn post_json(&self, path: &str, body: String) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .map_err(|err| map_send_error(&err))?;
        ensure_success(response.status())?;
        read_limited_text(response, DEFAULT_MAX_RESPONSE_BYTES)
    }
}

impl Messenger for HttpMessenger {
    fn send_text(&self, number: &str, body: &str) -> Result<String, ProviderError> {
        let payload = serde_json::to_string(&TextRequest {
            to: number,
            body,
        })
        .map_err(|err| ProviderError::Invalid(format!("request encoding failed: {err}")))?;
        self.post_json("messages/text", payload)
    }

    fn send_media(
        &self,
        number: &str,
        bytes: &[u8],
        caption: &str,
        filename: &str,
    ) -> Result<String, ProviderError> {
        let encoded = STANDARD.encode(bytes);
        let payload = serde_json::to_string(&MediaRequest {
            to: number,
            caption,
            filename,
            media_base64: &encoded,
        })
        .map_err(|err| ProviderError::Invalid(format!("request encoding failed: {err}")))?;
        self.post_json("messages/media", payload)
    }
}
