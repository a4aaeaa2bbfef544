// crates/clinipay-server/src/router.rs
// ============================================================================
// Module: HTTP Router
// Description: Route table and serve loop for the clinipay HTTP surface.
// Purpose: Expose action links, the messaging webhook, and signed downloads.
// Dependencies: clinipay-core, axum, tokio, thiserror
// ============================================================================

//! ## Overview
//! One router, four surfaces: tokenized action links, the inbound messaging
//! webhook, signed document downloads, and a liveness probe. Inputs are
//! untrusted; bodies are capped before any handler runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::actions;
use crate::files;
use crate::inbound;
use crate::state::AppState;

/// Request body cap covering base64-encoded document deliveries.
const MAX_BODY_BYTES: usize = 15 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while binding or serving the HTTP surface.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured bind address is not a socket address.
    #[error("invalid bind address: {0}")]
    InvalidBind(String),

    /// Binding or serving failed at the socket level.
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the route table over shared state.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/approve", get(actions::approve))
        .route("/reject", get(actions::reject_form).post(actions::reject))
        .route("/hooks/messaging", post(inbound::messaging))
        .route("/files/{*path}", get(files::download))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Liveness probe.
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Binds the configured address and serves until shutdown.
///
/// # Errors
///
/// Returns [`ServerError`] when the bind address is invalid or the socket
/// fails.
pub async fn serve(bind: &str, state: AppState) -> Result<(), ServerError> {
    let addr: SocketAddr =
        bind.parse().map_err(|_| ServerError::InvalidBind(bind.to_string()))?;
    let listener = TcpListener::bind(addr).await?;
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
