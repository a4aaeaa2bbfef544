// crates/clinipay-providers/src/http.rs
// ============================================================================
// Module: Bounded HTTP Plumbing
// Description: Shared client construction and response handling for providers.
// Purpose: Enforce timeouts, no-redirect policy, and response size limits.
// Dependencies: clinipay-core, reqwest
// ============================================================================

//! ## Overview
//! Every outbound provider call goes through this plumbing: a full-lifecycle
//! timeout, redirects disabled, and a hard cap on response bytes. A call
//! that exceeds any limit fails closed as a [`ProviderError`] for that one
//! delivery or extraction, never as a process-level failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use clinipay_core::ProviderError;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;

// ============================================================================
// SECTION: Client Construction
// ============================================================================

/// User agent sent with every outbound provider request.
const USER_AGENT: &str = "clinipay/0.1";

/// Default cap on provider response bodies, in bytes.
pub(crate) const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Builds a blocking client with a bounded timeout and redirects disabled.
///
/// # Errors
///
/// Returns [`ProviderError::Unavailable`] when the client cannot be built.
pub(crate) fn build_client(timeout_ms: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .redirect(Policy::none())
        .build()
        .map_err(|err| ProviderError::Unavailable(format!("http client build failed: {err}")))
}

// ============================================================================
// SECTION: Response Handling
// ============================================================================

/// Maps a transport-level send error onto the provider taxonomy.
pub(crate) fn map_send_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Unavailable(format!("http request failed: {err}"))
    }
}

/// Maps a non-success status onto the provider taxonomy.
///
/// # Errors
///
/// Returns [`ProviderError::Rejected`] for 4xx statuses and
/// [`ProviderError::Unavailable`] for everything else non-successful.
pub(crate) fn ensure_success(status: StatusCode) -> Result<(), ProviderError> {
    if status.is_success() {
        Ok(())
    } else if status.is_client_error() {
        Err(ProviderError::Rejected(format!("provider returned {status}")))
    } else {
        Err(ProviderError::Unavailable(format!("provider returned {status}")))
    }
}

/// Reads a response body while enforcing a byte limit.
///
/// # Errors
///
/// Returns [`ProviderError::Invalid`] when the body exceeds `max_bytes` or
/// cannot be read.
pub(crate) fn read_limited(response: Response, max_bytes: usize) -> Result<Vec<u8>, ProviderError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| ProviderError::Invalid("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(ProviderError::Invalid("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle
        .read_to_end(&mut buf)
        .map_err(|err| ProviderError::Invalid(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(ProviderError::Invalid("response exceeds size limit".to_string()));
    }
    Ok(buf)
}

/// Reads a bounded response body as UTF-8 text.
///
/// # Errors
///
/// Returns [`ProviderError::Invalid`] on size or encoding violations.
pub(crate) fn read_limited_text(
    response: Response,
    max_bytes: usize,
) -> Result<String, ProviderError> {
    let bytes = read_limited(response, max_bytes)?;
    String::from_utf8(bytes)
        .map_err(|_| ProviderError::Invalid("response is not utf-8".to_string()))
}
