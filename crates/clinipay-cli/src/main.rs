// crates/clinipay-cli/src/main.rs
// ============================================================================
// Module: Clinipay CLI Entry Point
// Description: Command dispatcher for config validation and the server.
// Purpose: Wire the ledger, providers, and dispatcher into a running service.
// Dependencies: clap, clinipay-*, serde, thiserror, time, tokio, toml
// ============================================================================

//! ## Overview
//! The clinipay binary has two jobs: validate a deployment configuration and
//! run the HTTP surface with its notification dispatcher and daily digest
//! scheduler. The scheduler re-evaluates ledger state on every tick instead
//! of blindly resending; a digest fires at most once per UTC day.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use clinipay_config::ClinipayConfig;
use clinipay_config::ConfigError;
use clinipay_core::Contact;
use clinipay_core::InMemoryDirectory;
use clinipay_core::OcrOutcome;
use clinipay_core::OcrProvider;
use clinipay_core::PhysicianId;
use clinipay_core::ProviderError;
use clinipay_core::SharedOcrProvider;
use clinipay_core::WorkflowEngine;
use clinipay_notify::DispatchError;
use clinipay_notify::DispatcherConfig;
use clinipay_notify::EmailChannel;
use clinipay_notify::FanoutDispatcher;
use clinipay_notify::RealtimeChannel;
use clinipay_notify::SharedChannel;
use clinipay_notify::WhatsAppChannel;
use clinipay_notify::date_for;
use clinipay_notify::run_daily_digest;
use clinipay_providers::HttpEmailRelay;
use clinipay_providers::HttpMessenger;
use clinipay_providers::HttpOcrProvider;
use clinipay_providers::LocalFileStorage;
use clinipay_server::AppState;
use clinipay_server::ServerError;
use clinipay_server::StderrAuditSink;
use clinipay_server::current_timestamp;
use clinipay_server::serve;
use clinipay_store_sqlite::SqliteJournalMode;
use clinipay_store_sqlite::SqliteLedger;
use clinipay_store_sqlite::SqliteLedgerConfig;
use clinipay_store_sqlite::SqliteLedgerError;
use clinipay_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

/// Scheduler polling interval.
const DIGEST_TICK: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Command Line
// ============================================================================

/// Clinipay physician payment workflow service.
#[derive(Parser, Debug)]
#[command(name = "clinipay", disable_help_subcommand = true)]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate a configuration file, then exit.
    Validate {
        /// Path to the configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the HTTP surface and the digest scheduler.
    Serve {
        /// Path to the configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Path to the contacts file (managers and physicians).
        #[arg(long)]
        contacts: Option<PathBuf>,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration loading or validation failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The contacts file could not be loaded.
    #[error("contacts error: {0}")]
    Contacts(String),

    /// The ledger store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] SqliteLedgerError),

    /// A provider adapter could not be constructed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The dispatcher could not be started.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// The HTTP server failed.
    #[error("server error: {0}")]
    Server(#[from] ServerError),
}

// ============================================================================
// SECTION: Contacts File
// ============================================================================

/// Contacts file root: manager and physician rosters.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContactsFile {
    /// Finance managers who receive decision notifications.
    #[serde(default)]
    managers: Vec<ContactEntry>,
    /// Physicians and their registered addresses.
    #[serde(default)]
    physicians: Vec<PhysicianEntry>,
}

/// One contact row.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContactEntry {
    /// Display name used in messages and attempt logs.
    display_name: String,
    /// Digits-only mobile number.
    #[serde(default)]
    phone: Option<String>,
    /// E-mail address.
    #[serde(default)]
    email: Option<String>,
    /// Notification opt-in flag.
    #[serde(default = "default_opted_in")]
    opted_in: bool,
}

/// One physician row: a contact with its ledger identifier.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PhysicianEntry {
    /// Physician identifier matching the ledger.
    id: u64,
    /// Contact details.
    #[serde(flatten)]
    contact: ContactEntry,
}

/// Contacts default to opted in.
const fn default_opted_in() -> bool {
    true
}

impl ContactEntry {
    /// Converts the file row into a directory contact.
    fn into_contact(self) -> Contact {
        Contact {
            display_name: self.display_name,
            phone: self.phone,
            email: self.email,
            opted_in: self.opted_in,
        }
    }
}

/// Loads the contacts roster into the in-memory directory.
fn load_directory(path: Option<&Path>) -> Result<InMemoryDirectory, CliError> {
    let mut directory = InMemoryDirectory::new();
    let Some(path) = path else {
        return Ok(directory);
    };
    let text = fs::read_to_string(path)
        .map_err(|err| CliError::Contacts(format!("{}: {err}", path.display())))?;
    let file: ContactsFile =
        toml::from_str(&text).map_err(|err| CliError::Contacts(err.to_string()))?;
    for manager in file.managers {
        directory.add_manager(manager.into_contact());
    }
    for physician in file.physicians {
        let id = PhysicianId::from_raw(physician.id)
            .ok_or_else(|| CliError::Contacts("physician id must be >= 1".to_string()))?;
        directory.add_physician(id, physician.contact.into_contact());
    }
    Ok(directory)
}

// ============================================================================
// SECTION: Providers
// ============================================================================

/// OCR stand-in used when extraction is disabled in configuration.
struct DisabledOcr;

impl OcrProvider for DisabledOcr {
    fn extract(&self, _pdf: &[u8]) -> Result<OcrOutcome, ProviderError> {
        Ok(OcrOutcome::unprocessed())
    }
}

/// Builds the OCR provider for the configured mode.
fn build_ocr(config: &ClinipayConfig) -> Result<SharedOcrProvider, CliError> {
    match &config.ocr {
        Some(ocr) if config.workflow.ocr_enabled => Ok(Arc::new(HttpOcrProvider::new(ocr)?)),
        _ => Ok(Arc::new(DisabledOcr)),
    }
}

/// Builds the notification channels the configuration enables.
fn build_channels(config: &ClinipayConfig) -> Result<Vec<SharedChannel>, CliError> {
    let mut channels: Vec<SharedChannel> = Vec::new();
    if let Some(whatsapp) = &config.whatsapp {
        let messenger = Arc::new(HttpMessenger::new(whatsapp)?);
        channels.push(Arc::new(WhatsAppChannel::new(messenger)));
    }
    if let Some(email) = &config.email {
        let relay = Arc::new(HttpEmailRelay::new(email)?);
        channels.push(Arc::new(EmailChannel::new(relay)));
    }
    channels.push(Arc::new(RealtimeChannel::new()));
    Ok(channels)
}

// ============================================================================
// SECTION: Digest Scheduler
// ============================================================================

/// Runs the digest loop: one digest per UTC day at the configured hour.
fn digest_loop(ledger: Arc<SqliteLedger>, dispatcher: Arc<FanoutDispatcher>, send_hour: u8) {
    let mut last_sent: Option<String> = None;
    loop {
        let now = current_timestamp();
        let seconds = now.as_millis().div_euclid(1_000);
        if let Ok(moment) = OffsetDateTime::from_unix_timestamp(seconds)
            && moment.hour() == send_hour
            && let Some(date) = date_for(now)
            && last_sent.as_deref() != Some(date.as_str())
        {
            match run_daily_digest(ledger.as_ref(), dispatcher.as_ref(), &date, now) {
                Ok(_) => last_sent = Some(date),
                Err(err) => {
                    let _ = write_stderr_line(&format!("digest failed for {date}: {err}"));
                }
            }
        }
        thread::sleep(DIGEST_TICK);
    }
}

/// Spawns the digest scheduler thread when the digest is enabled.
fn spawn_digest(
    config: &ClinipayConfig,
    ledger: Arc<SqliteLedger>,
    dispatcher: Arc<FanoutDispatcher>,
) {
    if !config.digest.enabled {
        return;
    }
    let send_hour = config.digest.send_hour;
    let spawned = thread::Builder::new()
        .name("clinipay-digest".to_string())
        .spawn(move || digest_loop(ledger, dispatcher, send_hour));
    if spawned.is_err() {
        let _ = write_stderr_line("digest scheduler could not be started");
    }
}

// ============================================================================
// SECTION: Serve
// ============================================================================

/// Wires every collaborator and serves until shutdown.
async fn run_serve(config_path: Option<&Path>, contacts: Option<&Path>) -> Result<(), CliError> {
    let config = ClinipayConfig::load(config_path)?;
    let directory = Arc::new(load_directory(contacts)?);
    if contacts.is_none() {
        let _ = write_stderr_line("no contacts file given; notifications have no recipients");
    }

    let ledger = Arc::new(SqliteLedger::new(&SqliteLedgerConfig {
        path: PathBuf::from(&config.store.path),
        busy_timeout_ms: config.store.busy_timeout_ms,
        journal_mode: SqliteJournalMode::default(),
        sync_mode: SqliteSyncMode::default(),
    })?);
    let storage =
        Arc::new(LocalFileStorage::new(&config.storage, &config.server.public_base_url)?);

    let dispatcher = Arc::new(FanoutDispatcher::new(
        DispatcherConfig {
            public_base_url: config.server.public_base_url.clone(),
            url_ttl_secs: config.storage.url_ttl_secs,
            ..DispatcherConfig::default()
        },
        build_channels(&config)?,
        directory.clone(),
        storage.clone(),
        ledger.clone(),
    )?);
    let engine = Arc::new(WorkflowEngine::new(
        ledger.clone(),
        storage.clone(),
        build_ocr(&config)?,
        dispatcher.clone(),
    ));

    spawn_digest(&config, ledger.clone(), dispatcher.clone());

    let state = AppState {
        engine,
        ledger: ledger.clone(),
        directory,
        attempts: ledger,
        storage,
        workflow: config.workflow.clone(),
        audit: Arc::new(StderrAuditSink),
        webhook_verify_token: config.server.webhook_verify_token.clone(),
    };
    let _ = write_stdout_line(&format!("listening on {}", config.server.bind));
    serve(&config.server.bind, state).await?;
    Ok(())
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes one line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Parses arguments and executes the chosen subcommand.
async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate {
            config,
        } => {
            ClinipayConfig::load(config.as_deref())?;
            let _ = write_stdout_line("configuration OK");
            Ok(())
        }
        Commands::Serve {
            config,
            contacts,
        } => run_serve(config.as_deref(), contacts.as_deref()).await,
    }
}

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = write_stderr_line(&err.to_string());
            ExitCode::FAILURE
        }
    }
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

    use std::io::Write;

    use clinipay_core::PhysicianId;
    use clinipay_core::UserDirectory;
    use tempfile::NamedTempFile;

    use super::load_directory;

    #[test]
    fn contacts_file_populates_both_rosters() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[managers]]\n\
             display_name = \"Ana\"\n\
             email = \"ana@clinic.example\"\n\n\
             [[physicians]]\n\
             id = 7\n\
             display_name = \"Dr. Souza\"\n\
             phone = \"5531988887777\"\n"
        )
        .unwrap();

        let directory = load_directory(Some(file.path())).unwrap();
        assert_eq!(directory.managers().unwrap().len(), 1);
        let physician = directory
            .physician_by_phone(&["5531988887777".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(physician, PhysicianId::from_raw(7).unwrap());
    }

    #[test]
    fn missing_contacts_file_means_an_empty_directory() {
        let directory = load_directory(None).unwrap();
        assert!(directory.managers().unwrap().is_empty());
    }

    #[test]
    fn bad_physician_ids_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[[physicians]]\nid = 0\ndisplay_name = \"X\"\n").unwrap();
        assert!(load_directory(Some(file.path())).is_err());
    }
}
