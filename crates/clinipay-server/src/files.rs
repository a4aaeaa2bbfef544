// crates/clinipay-server/src/files.rs
// ============================================================================
// Module: Signed File Downloads
// Description: Serve stored documents behind expiring signed URLs.
// Purpose: Let notification recipients fetch attachments without a login.
// Dependencies: clinipay-core, clinipay-providers, axum
// ============================================================================

//! ## Overview
//! Download links minted by the dispatcher carry an expiry and a derived
//! signature; the handler re-derives the signature before touching disk and
//! answers with the same 404 for an expired, tampered, or missing file so
//! the URL reveals nothing about which failed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use clinipay_core::FileStorage;
use clinipay_core::StorageRef;
use serde::Deserialize;

use crate::state::AppState;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Query parameters on a signed download URL.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    /// Expiry as unix seconds.
    pub expires: u64,
    /// Derived signature over path and expiry.
    pub sig: String,
}

/// `GET /files/{*path}` serves one stored document when the signature holds.
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> impl IntoResponse {
    let now_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    if !state.storage.verify_signed(&path, query.expires, &query.sig, now_secs) {
        return not_found();
    }
    let storage = state.storage.clone();
    let reference = StorageRef::new(path.clone());
    let fetched =
        tokio::task::spawn_blocking(move || storage.download(&reference)).await;
    match fetched {
        Ok(Ok(bytes)) => {
            let content_type = if path.to_ascii_lowercase().ends_with(".pdf") {
                "application/pdf"
            } else {
                "application/octet-stream"
            };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_DISPOSITION, "attachment".to_string()),
                ],
                bytes,
            )
        }
        // Missing and unreadable collapse into the same answer as a bad
        // signature.
        Ok(Err(_)) | Err(_) => not_found(),
    }
}

/// Uniform negative response for every failure mode.
fn not_found() -> (StatusCode, [(header::HeaderName, String); 2], Vec<u8>) {
    (
        StatusCode::NOT_FOUND,
        [
            (header::CONTENT_TYPE, "text/plain".to_string()),
            (header::CONTENT_DISPOSITION, "inline".to_string()),
        ],
        b"not found".to_vec(),
    )
}
