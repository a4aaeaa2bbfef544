// crates/clinipay-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Ledger Store
// Description: Durable LedgerStore and AttemptLog backed by SQLite WAL.
// Purpose: Persist payments, invoices, adjustments, and delivery attempts.
// Dependencies: clinipay-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One writer connection behind a mutex, WAL journaling, and fail-closed
//! schema versioning. The two workflow uniqueness invariants live in the
//! database as partial unique indexes:
//!
//! - `invoices_open_slot` on `invoices(payment_id)` where the status is
//!   `pending` or `approved`, so a second concurrent submission loses at
//!   INSERT time regardless of interleaving;
//! - `payments_period_slot` on `payments(physician_id, competence)` where
//!   the status is not `cancelled`.
//!
//! Status transitions are conditional UPDATEs keyed on the expected prior
//! status; zero affected rows is reported as a conflict, never retried.
//! Monetary amounts are stored as decimal text at full scale.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use clinipay_core::Amount;
use clinipay_core::AttemptLog;
use clinipay_core::DaySummary;
use clinipay_core::Invoice;
use clinipay_core::InvoiceId;
use clinipay_core::InvoiceStatus;
use clinipay_core::LedgerStore;
use clinipay_core::NetAdjustment;
use clinipay_core::NewInvoice;
use clinipay_core::NewPayment;
use clinipay_core::NotificationAttempt;
use clinipay_core::OcrOutcome;
use clinipay_core::Payment;
use clinipay_core::PaymentId;
use clinipay_core::PaymentStamps;
use clinipay_core::PaymentStatus;
use clinipay_core::PhysicianId;
use clinipay_core::StorageRef;
use clinipay_core::StoreError;
use clinipay_core::Timestamp;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the ledger.
const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4_096;

/// Milliseconds in one day.
const DAY_MILLIS: i64 = 86_400_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` ledger store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteLedgerConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` ledger errors raised while opening or migrating the database.
///
/// # Invariants
/// - Error messages avoid embedding record payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteLedgerError {
    /// Store I/O error.
    #[error("sqlite ledger io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite ledger db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite ledger version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or data.
    #[error("sqlite ledger invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed ledger store with WAL support.
///
/// # Invariants
/// - All access is serialized through one mutex-guarded connection.
/// - Uniqueness invariants are enforced by partial unique indexes.
#[derive(Debug)]
pub struct SqliteLedger {
    /// Shared connection guarded by a mutex.
    connection: Mutex<Connection>,
}

impl SqliteLedger {
    /// Opens an `SQLite`-backed ledger store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteLedgerError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteLedgerConfig) -> Result<Self, SqliteLedgerError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Locks the connection, mapping poisoning to a backend error.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Backend("sqlite ledger mutex poisoned".to_string()))
    }
}

/// Opens and configures one connection per the ledger config.
fn open_connection(config: &SqliteLedgerConfig) -> Result<Connection, SqliteLedgerError> {
    let connection =
        Connection::open(&config.path).map_err(|err| SqliteLedgerError::Io(err.to_string()))?;
    let busy = i64::try_from(config.busy_timeout_ms)
        .map_err(|_| SqliteLedgerError::Invalid("busy_timeout_ms too large".to_string()))?;
    connection
        .pragma_update(None, "busy_timeout", busy)
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    connection
        .pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    connection
        .pragma_update(None, "synchronous", config.sync_mode.pragma_value())
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    connection
        .pragma_update(None, "foreign_keys", "on")
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    Ok(connection)
}

/// Creates the schema and verifies the stored schema version.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteLedgerError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS ledger_meta (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS payments (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 physician_id INTEGER NOT NULL,
                 competence TEXT NOT NULL,
                 gross_amount TEXT NOT NULL,
                 net_amount TEXT,
                 status TEXT NOT NULL,
                 solicited_at INTEGER,
                 responded_at INTEGER,
                 paid_at INTEGER
             );
             CREATE UNIQUE INDEX IF NOT EXISTS payments_period_slot
                 ON payments(physician_id, competence)
                 WHERE status != 'cancelled';
             CREATE TABLE IF NOT EXISTS invoices (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 payment_id INTEGER NOT NULL REFERENCES payments(id),
                 physician_id INTEGER NOT NULL,
                 file_ref TEXT NOT NULL,
                 original_filename TEXT NOT NULL,
                 content_hash TEXT NOT NULL,
                 status TEXT NOT NULL,
                 notes TEXT,
                 ocr_json TEXT NOT NULL,
                 net_amount TEXT,
                 created_at INTEGER NOT NULL,
                 decided_at INTEGER
             );
             CREATE UNIQUE INDEX IF NOT EXISTS invoices_open_slot
                 ON invoices(payment_id)
                 WHERE status IN ('pending', 'approved');
             CREATE INDEX IF NOT EXISTS invoices_by_payment
                 ON invoices(payment_id);
             CREATE TABLE IF NOT EXISTS net_adjustments (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 invoice_id INTEGER NOT NULL REFERENCES invoices(id),
                 payment_id INTEGER NOT NULL REFERENCES payments(id),
                 previous_net TEXT,
                 new_net TEXT NOT NULL,
                 reason TEXT NOT NULL,
                 actor INTEGER NOT NULL,
                 adjusted_at INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS notification_attempts (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 event TEXT NOT NULL,
                 channel TEXT NOT NULL,
                 recipient TEXT NOT NULL,
                 address TEXT NOT NULL,
                 success INTEGER NOT NULL,
                 provider_response TEXT NOT NULL,
                 payment_id INTEGER,
                 sent_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS attempts_by_address
                 ON notification_attempts(address, id);",
        )
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    let stored: Option<String> = connection
        .query_row("SELECT value FROM ledger_meta WHERE key = 'schema_version'", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
    match stored {
        Some(value) => {
            let version: i64 = value
                .parse()
                .map_err(|_| SqliteLedgerError::Invalid(format!("schema_version: {value}")))?;
            if version != SCHEMA_VERSION {
                return Err(SqliteLedgerError::VersionMismatch(format!(
                    "found {version}, expected {SCHEMA_VERSION}"
                )));
            }
        }
        None => {
            connection
                .execute(
                    "INSERT INTO ledger_meta (key, value) VALUES ('schema_version', ?1)",
                    params![SCHEMA_VERSION.to_string()],
                )
                .map_err(|err| SqliteLedgerError::Db(err.to_string()))?;
        }
    }
    Ok(())
}

/// Rejects paths that exceed component or total length limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteLedgerError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteLedgerError::Invalid("store path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteLedgerError::Invalid("store path component too long".to_string()));
        }
    }
    Ok(())
}

/// Creates the parent directory of the database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteLedgerError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| SqliteLedgerError::Io(err.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Parses a stored payment status label.
fn parse_payment_status(label: &str) -> Result<PaymentStatus, StoreError> {
    match label {
        "pending" => Ok(PaymentStatus::Pending),
        "solicited" => Ok(PaymentStatus::Solicited),
        "invoice_received" => Ok(PaymentStatus::InvoiceReceived),
        "approved" => Ok(PaymentStatus::Approved),
        "paid" => Ok(PaymentStatus::Paid),
        "cancelled" => Ok(PaymentStatus::Cancelled),
        other => Err(StoreError::Serialization(format!("payment status: {other}"))),
    }
}

/// Parses a stored invoice status label.
fn parse_invoice_status(label: &str) -> Result<InvoiceStatus, StoreError> {
    match label {
        "pending" => Ok(InvoiceStatus::Pending),
        "approved" => Ok(InvoiceStatus::Approved),
        "rejected" => Ok(InvoiceStatus::Rejected),
        other => Err(StoreError::Serialization(format!("invoice status: {other}"))),
    }
}

/// Parses a stored decimal amount.
fn parse_amount(text: &str) -> Result<Amount, StoreError> {
    Amount::parse(text).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Parses an optional stored decimal amount.
fn parse_opt_amount(text: Option<String>) -> Result<Option<Amount>, StoreError> {
    text.as_deref().map(parse_amount).transpose()
}

/// Renders an amount at full stored scale.
fn amount_text(amount: &Amount) -> String {
    amount.as_decimal().to_string()
}

/// Parses a stored raw identifier into a typed one.
fn parse_id<T>(raw: i64, build: impl Fn(u64) -> Option<T>, what: &str) -> Result<T, StoreError> {
    u64::try_from(raw)
        .ok()
        .and_then(build)
        .ok_or_else(|| StoreError::Serialization(format!("{what} id: {raw}")))
}

/// Maps one `payments` row into a [`Payment`].
fn payment_from_row(row: &Row<'_>) -> Result<Payment, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    let physician: i64 = row.get(1)?;
    let competence: String = row.get(2)?;
    let gross: String = row.get(3)?;
    let net: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let solicited_at: Option<i64> = row.get(6)?;
    let responded_at: Option<i64> = row.get(7)?;
    let paid_at: Option<i64> = row.get(8)?;
    build_payment(
        id,
        physician,
        &competence,
        &gross,
        net,
        &status,
        solicited_at,
        responded_at,
        paid_at,
    )
    .map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })
}

/// Builds a [`Payment`] from decoded row fields.
#[allow(clippy::too_many_arguments, reason = "Row decoding keeps one argument per column.")]
fn build_payment(
    id: i64,
    physician: i64,
    competence: &str,
    gross: &str,
    net: Option<String>,
    status: &str,
    solicited_at: Option<i64>,
    responded_at: Option<i64>,
    paid_at: Option<i64>,
) -> Result<Payment, StoreError> {
    Ok(Payment {
        id: parse_id(id, PaymentId::from_raw, "payment")?,
        physician_id: parse_id(physician, PhysicianId::from_raw, "physician")?,
        competence: competence
            .parse()
            .map_err(|_| StoreError::Serialization(format!("competence: {competence}")))?,
        gross_amount: parse_amount(gross)?,
        net_amount: parse_opt_amount(net)?,
        status: parse_payment_status(status)?,
        solicited_at: solicited_at.map(Timestamp::from_millis),
        responded_at: responded_at.map(Timestamp::from_millis),
        paid_at: paid_at.map(Timestamp::from_millis),
    })
}

/// Maps one `invoices` row into an [`Invoice`].
fn invoice_from_row(row: &Row<'_>) -> Result<Invoice, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    let payment: i64 = row.get(1)?;
    let physician: i64 = row.get(2)?;
    let file_ref: String = row.get(3)?;
    let original_filename: String = row.get(4)?;
    let content_hash: String = row.get(5)?;
    let status: String = row.get(6)?;
    let notes: Option<String> = row.get(7)?;
    let ocr_json: String = row.get(8)?;
    let net: Option<String> = row.get(9)?;
    let created_at: i64 = row.get(10)?;
    let decided_at: Option<i64> = row.get(11)?;
    let build = || -> Result<Invoice, StoreError> {
        let ocr: OcrOutcome = serde_json::from_str(&ocr_json)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        Ok(Invoice {
            id: parse_id(id, InvoiceId::from_raw, "invoice")?,
            payment_id: parse_id(payment, PaymentId::from_raw, "payment")?,
            physician_id: parse_id(physician, PhysicianId::from_raw, "physician")?,
            file_ref: StorageRef::new(file_ref.clone()),
            original_filename: original_filename.clone(),
            content_hash: content_hash.clone(),
            status: parse_invoice_status(&status)?,
            notes: notes.clone(),
            ocr,
            net_amount: parse_opt_amount(net.clone())?,
            created_at: Timestamp::from_millis(created_at),
            decided_at: decided_at.map(Timestamp::from_millis),
        })
    };
    build().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })
}

/// Columns selected for every payment read.
const PAYMENT_COLUMNS: &str = "id, physician_id, competence, gross_amount, net_amount, status, \
                               solicited_at, responded_at, paid_at";

/// Columns selected for every invoice read.
const INVOICE_COLUMNS: &str = "id, payment_id, physician_id, file_ref, original_filename, \
                               content_hash, status, notes, ocr_json, net_amount, created_at, \
                               decided_at";

/// Classifies a `SQLite` error, mapping unique-index violations to the
/// invariant-specific store errors.
fn map_insert_error(err: &rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = err
        && failure.code == ErrorCode::ConstraintViolation
    {
        if message.contains("invoices_open_slot") || message.contains("invoices.payment_id") {
            return StoreError::OpenInvoiceExists;
        }
        if message.contains("payments_period_slot") || message.contains("payments.physician_id") {
            return StoreError::PeriodOccupied;
        }
    }
    StoreError::Backend(err.to_string())
}

// ============================================================================
// SECTION: Day Arithmetic
// ============================================================================

/// Returns the `[start, end)` millisecond bounds for a `YYYY-MM-DD` day.
fn day_bounds(date: &str) -> Result<(i64, i64), StoreError> {
    let invalid = || StoreError::Backend(format!("invalid date: {date}"));
    let mut parts = date.split('-');
    let year: i64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let month: i64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let day: i64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    if parts.next().is_some() || !(1 ..= 12).contains(&month) || !(1 ..= 31).contains(&day) {
        return Err(invalid());
    }
    // Civil-to-days conversion (proleptic Gregorian calendar).
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let epoch_day = era * 146_097 + doe - 719_468;
    let start = epoch_day * DAY_MILLIS;
    Ok((start, start + DAY_MILLIS))
}

// ============================================================================
// SECTION: LedgerStore Implementation
// ============================================================================

impl LedgerStore for SqliteLedger {
    fn payment(&self, id: PaymentId) -> Result<Payment, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"),
                params![i64::try_from(id.get()).unwrap_or(i64::MAX)],
                payment_from_row,
            )
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))?
            .ok_or_else(|| StoreError::NotFound(format!("payment {id}")))
    }

    fn invoice(&self, id: InvoiceId) -> Result<Invoice, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"),
                params![i64::try_from(id.get()).unwrap_or(i64::MAX)],
                invoice_from_row,
            )
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))?
            .ok_or_else(|| StoreError::NotFound(format!("invoice {id}")))
    }

    fn create_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO payments (physician_id, competence, gross_amount, status)
                 VALUES (?1, ?2, ?3, 'pending')",
                params![
                    i64::try_from(payment.physician_id.get()).unwrap_or(i64::MAX),
                    payment.competence.to_string(),
                    amount_text(&payment.gross_amount),
                ],
            )
            .map_err(|err| map_insert_error(&err))?;
        let id = guard.last_insert_rowid();
        Ok(Payment {
            id: parse_id(id, PaymentId::from_raw, "payment")?,
            physician_id: payment.physician_id,
            competence: payment.competence,
            gross_amount: payment.gross_amount,
            net_amount: None,
            status: PaymentStatus::Pending,
            solicited_at: None,
            responded_at: None,
            paid_at: None,
        })
    }

    fn open_invoice_for(&self, payment: PaymentId) -> Result<Option<Invoice>, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                &format!(
                    "SELECT {INVOICE_COLUMNS} FROM invoices
                     WHERE payment_id = ?1 AND status IN ('pending', 'approved')"
                ),
                params![i64::try_from(payment.get()).unwrap_or(i64::MAX)],
                invoice_from_row,
            )
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn transition_payment(
        &self,
        id: PaymentId,
        expected: &[PaymentStatus],
        to: PaymentStatus,
        stamps: PaymentStamps,
    ) -> Result<Payment, StoreError> {
        if expected.is_empty() {
            return Err(StoreError::Backend("empty expected status set".to_string()));
        }
        let placeholders: Vec<String> =
            (0 .. expected.len()).map(|n| format!("?{}", n + 3)).collect();
        let sql = format!(
            "UPDATE payments SET
                 status = ?2,
                 solicited_at = COALESCE(?{sa}, solicited_at),
                 responded_at = COALESCE(?{ra}, responded_at),
                 paid_at = COALESCE(?{pa}, paid_at),
                 net_amount = COALESCE(?{na}, net_amount)
             WHERE id = ?1 AND status IN ({expected})",
            sa = expected.len() + 3,
            ra = expected.len() + 4,
            pa = expected.len() + 5,
            na = expected.len() + 6,
            expected = placeholders.join(", "),
        );
        let affected = {
            let guard = self.lock()?;
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
                Box::new(i64::try_from(id.get()).unwrap_or(i64::MAX)),
                Box::new(to.as_str().to_string()),
            ];
            for status in expected {
                values.push(Box::new(status.as_str().to_string()));
            }
            values.push(Box::new(stamps.solicited_at.map(Timestamp::as_millis)));
            values.push(Box::new(stamps.responded_at.map(Timestamp::as_millis)));
            values.push(Box::new(stamps.paid_at.map(Timestamp::as_millis)));
            values.push(Box::new(stamps.net_amount.as_ref().map(amount_text)));
            guard
                .execute(&sql, rusqlite::params_from_iter(values.iter().map(|value| value.as_ref())))
                .map_err(|err| StoreError::Backend(err.to_string()))?
        };
        if affected == 0 {
            // Distinguish a stale status from a missing record.
            let current = self.payment(id)?;
            return Err(StoreError::Conflict(format!(
                "payment {id} is {}, not in expected set",
                current.status.as_str()
            )));
        }
        self.payment(id)
    }

    fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, StoreError> {
        let ocr_json = serde_json::to_string(&invoice.ocr)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO invoices (payment_id, physician_id, file_ref, original_filename,
                     content_hash, status, ocr_json, net_amount, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8)",
                params![
                    i64::try_from(invoice.payment_id.get()).unwrap_or(i64::MAX),
                    i64::try_from(invoice.physician_id.get()).unwrap_or(i64::MAX),
                    invoice.file_ref.as_str(),
                    invoice.original_filename,
                    invoice.content_hash,
                    ocr_json,
                    invoice.net_amount.as_ref().map(amount_text),
                    invoice.created_at.as_millis(),
                ],
            )
            .map_err(|err| map_insert_error(&err))?;
        let id = guard.last_insert_rowid();
        Ok(Invoice {
            id: parse_id(id, InvoiceId::from_raw, "invoice")?,
            payment_id: invoice.payment_id,
            physician_id: invoice.physician_id,
            file_ref: invoice.file_ref,
            original_filename: invoice.original_filename,
            content_hash: invoice.content_hash,
            status: InvoiceStatus::Pending,
            notes: None,
            ocr: invoice.ocr,
            net_amount: invoice.net_amount,
            created_at: invoice.created_at,
            decided_at: None,
        })
    }

    fn decide_invoice(
        &self,
        id: InvoiceId,
        decision: InvoiceStatus,
        notes: Option<String>,
        decided_at: Timestamp,
    ) -> Result<Invoice, StoreError> {
        let affected = {
            let guard = self.lock()?;
            guard
                .execute(
                    "UPDATE invoices SET
                         status = ?2,
                         notes = COALESCE(?3, notes),
                         decided_at = ?4
                     WHERE id = ?1 AND status = 'pending'",
                    params![
                        i64::try_from(id.get()).unwrap_or(i64::MAX),
                        decision.as_str(),
                        notes,
                        decided_at.as_millis(),
                    ],
                )
                .map_err(|err| StoreError::Backend(err.to_string()))?
        };
        if affected == 0 {
            let current = self.invoice(id)?;
            return Err(StoreError::Conflict(format!(
                "invoice {id} is already {}",
                current.status.as_str()
            )));
        }
        self.invoice(id)
    }

    fn set_net_amounts(
        &self,
        invoice: InvoiceId,
        payment: PaymentId,
        net: Amount,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| StoreError::Backend(err.to_string()))?;
        let text = amount_text(&net);
        let invoices = tx
            .execute(
                "UPDATE invoices SET net_amount = ?2 WHERE id = ?1",
                params![i64::try_from(invoice.get()).unwrap_or(i64::MAX), text],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let payments = tx
            .execute(
                "UPDATE payments SET net_amount = ?2 WHERE id = ?1",
                params![i64::try_from(payment.get()).unwrap_or(i64::MAX), text],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        if invoices == 0 {
            return Err(StoreError::NotFound(format!("invoice {invoice}")));
        }
        if payments == 0 {
            return Err(StoreError::NotFound(format!("payment {payment}")));
        }
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn record_adjustment(&self, adjustment: NetAdjustment) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO net_adjustments (invoice_id, payment_id, previous_net, new_net,
                     reason, actor, adjusted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    i64::try_from(adjustment.invoice_id.get()).unwrap_or(i64::MAX),
                    i64::try_from(adjustment.payment_id.get()).unwrap_or(i64::MAX),
                    adjustment.previous_net.as_ref().map(amount_text),
                    amount_text(&adjustment.new_net),
                    adjustment.reason,
                    i64::try_from(adjustment.actor.get()).unwrap_or(i64::MAX),
                    adjustment.adjusted_at.as_millis(),
                ],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(())
    }

    fn open_payment_for_physician(
        &self,
        physician: PhysicianId,
    ) -> Result<Option<Payment>, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                &format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments
                     WHERE physician_id = ?1 AND status IN ('solicited', 'pending')
                     ORDER BY (status = 'solicited') DESC, id DESC
                     LIMIT 1"
                ),
                params![i64::try_from(physician.get()).unwrap_or(i64::MAX)],
                payment_from_row,
            )
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn daily_summary(&self, date: &str) -> Result<DaySummary, StoreError> {
        let (start, end) = day_bounds(date)?;
        let guard = self.lock()?;
        let requested: u64 = guard
            .query_row(
                "SELECT COUNT(*) FROM payments WHERE solicited_at >= ?1 AND solicited_at < ?2",
                params![start, end],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?
            .try_into()
            .unwrap_or(0);
        let received: u64 = guard
            .query_row(
                "SELECT COUNT(*) FROM invoices WHERE created_at >= ?1 AND created_at < ?2",
                params![start, end],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?
            .try_into()
            .unwrap_or(0);
        let decided = |status: &str| -> Result<u64, StoreError> {
            guard
                .query_row(
                    "SELECT COUNT(*) FROM invoices
                     WHERE status = ?1 AND decided_at >= ?2 AND decided_at < ?3",
                    params![status, start, end],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(|err| StoreError::Backend(err.to_string()))
                .map(|count| count.try_into().unwrap_or(0))
        };
        let approved = decided("approved")?;
        let rejected = decided("rejected")?;
        let paid: u64 = guard
            .query_row(
                "SELECT COUNT(*) FROM payments WHERE paid_at >= ?1 AND paid_at < ?2",
                params![start, end],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?
            .try_into()
            .unwrap_or(0);
        // Totals are summed in Rust so decimal exactness survives.
        let approved_total = sum_amounts(
            &guard,
            "SELECT payments.gross_amount FROM invoices
             JOIN payments ON payments.id = invoices.payment_id
             WHERE invoices.status = 'approved'
               AND invoices.decided_at >= ?1 AND invoices.decided_at < ?2",
            start,
            end,
        )?;
        let paid_total = sum_amounts(
            &guard,
            "SELECT COALESCE(net_amount, gross_amount) FROM payments
             WHERE paid_at >= ?1 AND paid_at < ?2",
            start,
            end,
        )?;
        Ok(DaySummary {
            date: date.to_string(),
            requested,
            received,
            approved,
            rejected,
            paid,
            approved_total,
            paid_total,
        })
    }
}

/// Sums decimal text amounts selected by `sql` over `[start, end)`.
fn sum_amounts(
    connection: &Connection,
    sql: &str,
    start: i64,
    end: i64,
) -> Result<Amount, StoreError> {
    let mut stmt = connection.prepare(sql).map_err(|err| StoreError::Backend(err.to_string()))?;
    let rows = stmt
        .query_map(params![start, end], |row| row.get::<_, String>(0))
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    let mut total = Amount::zero();
    for row in rows {
        let text = row.map_err(|err| StoreError::Backend(err.to_string()))?;
        total = total + parse_amount(&text)?;
    }
    Ok(total)
}

// ============================================================================
// SECTION: AttemptLog Implementation
// ============================================================================

impl AttemptLog for SqliteLedger {
    fn record(&self, attempt: &NotificationAttempt) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO notification_attempts (event, channel, recipient, address,
                     success, provider_response, payment_id, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    attempt.event,
                    attempt.channel.as_str(),
                    attempt.recipient,
                    attempt.address,
                    i64::from(attempt.success),
                    attempt.provider_response,
                    attempt
                        .payment_id
                        .map(|id| i64::try_from(id.get()).unwrap_or(i64::MAX)),
                    attempt.sent_at.as_millis(),
                ],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(())
    }

    fn latest_request_payment(
        &self,
        addresses: &[String],
    ) -> Result<Option<PaymentId>, StoreError> {
        if addresses.is_empty() {
            return Ok(None);
        }
        let placeholders: Vec<String> =
            (0 .. addresses.len()).map(|n| format!("?{}", n + 1)).collect();
        let sql = format!(
            "SELECT payment_id FROM notification_attempts
             WHERE event = 'invoice_requested' AND success = 1 AND payment_id IS NOT NULL
               AND address IN ({})
             ORDER BY id DESC LIMIT 1",
            placeholders.join(", "),
        );
        let guard = self.lock()?;
        let raw: Option<i64> = guard
            .query_row(&sql, rusqlite::params_from_iter(addresses.iter()), |row| row.get(0))
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        raw.map(|raw| parse_id(raw, PaymentId::from_raw, "payment")).transpose()
    }
}
