// crates/clinipay-notify/src/digest.rs
// ============================================================================
// Module: Daily Digest
// Description: Aggregates one day of ledger activity into a manager digest.
// Purpose: One summary message per manager per day, never per state change.
// Dependencies: crate, clinipay-core, time
// ============================================================================

//! ## Overview
//! The digest re-evaluates current ledger state at send time instead of
//! accumulating counters, so a restarted process never double-counts and a
//! day with no activity sends nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use clinipay_core::DispatchTicket;
use clinipay_core::Dispatcher;
use clinipay_core::LedgerStore;
use clinipay_core::NotificationEvent;
use clinipay_core::StoreError;
use clinipay_core::Timestamp;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Digest Job
// ============================================================================

/// Result of one digest evaluation.
#[derive(Debug)]
pub enum DigestOutcome {
    /// The digest was dispatched; the ticket tracks its deliveries.
    Sent(DispatchTicket),
    /// The day had no activity; nothing was sent.
    Empty,
}

/// Formats the UTC calendar date for an instant as `YYYY-MM-DD`.
#[must_use]
pub fn date_for(now: Timestamp) -> Option<String> {
    let seconds = now.as_millis().div_euclid(1_000);
    let moment = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
    let date = moment.date();
    Some(format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

/// Aggregates `date` from the ledger and dispatches one digest event.
///
/// # Errors
///
/// Returns [`StoreError`] when the ledger aggregation fails.
pub fn run_daily_digest(
    ledger: &dyn LedgerStore,
    dispatcher: &dyn Dispatcher,
    date: &str,
    now: Timestamp,
) -> Result<DigestOutcome, StoreError> {
    let summary = ledger.daily_summary(date)?;
    let activity = summary
        .requested
        .saturating_add(summary.received)
        .saturating_add(summary.approved)
        .saturating_add(summary.rejected)
        .saturating_add(summary.paid);
    if activity == 0 {
        return Ok(DigestOutcome::Empty);
    }
    let ticket = dispatcher.dispatch(
        NotificationEvent::DailyDigest {
            summary,
        },
        now,
    );
    Ok(DigestOutcome::Sent(ticket))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
