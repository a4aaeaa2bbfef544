// crates/clinipay-server/src/state.rs
// ============================================================================
// Module: Server State
// Description: Shared application state handed to every HTTP handler.
// Purpose: Bundle the engine and its collaborators behind one cloneable handle.
// Dependencies: clinipay-config, clinipay-core, clinipay-providers
// ============================================================================

//! ## Overview
//! Handlers receive one [`AppState`] clone. The engine and every collaborator
//! inside it is already `Send + Sync`, so cloning the state is a handful of
//! `Arc` bumps. Hosts mint timestamps here; the core never reads the clock.
//! Workflow flags live here as configuration, and each transition captures
//! its own snapshot from them so a transition in flight never sees a mix.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clinipay_config::WorkflowConfig;
use clinipay_core::SharedAttemptLog;
use clinipay_core::SharedLedgerStore;
use clinipay_core::SharedUserDirectory;
use clinipay_core::Timestamp;
use clinipay_core::WorkflowEngine;
use clinipay_core::WorkflowSnapshot;
use clinipay_providers::LocalFileStorage;

use crate::audit::SharedAuditSink;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for every server route.
#[derive(Clone)]
pub struct AppState {
    /// Workflow engine executing decisions and submissions.
    pub engine: Arc<WorkflowEngine>,
    /// Ledger store for association lookups.
    pub ledger: SharedLedgerStore,
    /// Directory for sender-to-physician resolution.
    pub directory: SharedUserDirectory,
    /// Attempt log for outbound-request association.
    pub attempts: SharedAttemptLog,
    /// Local file storage backing signed downloads.
    pub storage: Arc<LocalFileStorage>,
    /// Workflow settings, including the country code for sender matching.
    pub workflow: WorkflowConfig,
    /// Audit sink for action and webhook events.
    pub audit: SharedAuditSink,
    /// Shared-secret token expected on inbound webhooks, when configured.
    pub webhook_verify_token: Option<String>,
}

impl AppState {
    /// Captures the workflow snapshot one transition runs under.
    #[must_use]
    pub fn workflow_snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            ocr_enabled: self.workflow.ocr_enabled,
            allow_chat_submission: self.workflow.allow_chat_submission,
            tolerance: self.workflow.tolerance(),
        }
    }
}

/// Mints the current wall-clock timestamp for a transition.
#[must_use]
pub fn current_timestamp() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default();
    Timestamp::from_millis(millis)
}
