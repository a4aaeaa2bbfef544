// crates/clinipay-config/src/lib.rs
// ============================================================================
// Module: Clinipay Configuration
// Description: Canonical configuration model with strict loading and validation.
// Purpose: Give every binary one fail-closed source of deployment settings.
// Dependencies: clinipay-core, serde, thiserror, toml, url
// ============================================================================

//! ## Overview
//! Configuration is one TOML file loaded under strict guards (path length,
//! file size, UTF-8) and validated as a whole before any component starts.
//! Validation fails closed: a bind address outside loopback without a
//! webhook verify token, a zero timeout, or an unparseable public URL each
//! abort startup rather than degrade at runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use clinipay_core::Amount;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted config path length in bytes.
const MAX_PATH_LEN: usize = 4_096;

/// Maximum accepted length of one path component in bytes.
const MAX_PATH_COMPONENT: usize = 255;

/// Maximum accepted config file size in bytes.
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Default config path when none is provided.
const DEFAULT_PATH: &str = "clinipay.toml";

/// Upper bound for provider timeouts in milliseconds.
const MAX_TIMEOUT_MS: u64 = 120_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating configuration.
///
/// # Invariants
/// - Messages are stable; operators and tests match on them.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config read failure: {0}")]
    Read(String),
    /// The config file violated a load guard.
    #[error("{0}")]
    Guard(String),
    /// The config file is not valid TOML.
    #[error("config parse failure: {0}")]
    Parse(String),
    /// A validated setting is out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Workflow Settings
// ============================================================================

/// Workflow engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Whether OCR reconciliation gates invoice submission.
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,
    /// Whether inbound chat documents may create submissions.
    #[serde(default = "default_true")]
    pub allow_chat_submission: bool,
    /// Reconciliation tolerance in cents.
    #[serde(default = "default_tolerance_cents")]
    pub tolerance_cents: u32,
    /// Country calling code assumed for national phone numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

impl WorkflowConfig {
    /// Returns the tolerance as a monetary amount.
    #[must_use]
    pub fn tolerance(&self) -> Amount {
        Amount::from_cents(i64::from(self.tolerance_cents))
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            allow_chat_submission: true,
            tolerance_cents: default_tolerance_cents(),
            default_country_code: default_country_code(),
        }
    }
}

// ============================================================================
// SECTION: Store Settings
// ============================================================================

/// SQLite ledger store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: String,
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Local file storage settings for submitted documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory for stored documents.
    pub root: String,
    /// Lifetime of signed download URLs in seconds.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
    /// Secret used to sign download URLs.
    pub signing_secret: String,
}

// ============================================================================
// SECTION: Provider Settings
// ============================================================================

/// HTTP endpoint settings shared by external providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Provider base URL.
    pub url: String,
    /// API key sent with each request.
    pub api_key: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// OCR provider settings.
// No deny_unknown_fields here: serde rejects it alongside flatten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// HTTP endpoint settings.
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    /// Maximum accepted response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
}

/// Transactional e-mail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// HTTP endpoint settings.
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    /// Sender address for workflow mail.
    pub from_address: String,
}

// ============================================================================
// SECTION: Server Settings
// ============================================================================

/// Webhook router and action-link server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub bind: String,
    /// Public base URL action links are built from.
    pub public_base_url: String,
    /// Verify token required on inbound webhook deliveries.
    #[serde(default)]
    pub webhook_verify_token: Option<String>,
}

/// Daily digest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DigestConfig {
    /// Whether the scheduled digest runs.
    #[serde(default)]
    pub enabled: bool,
    /// Local send hour (0-23).
    #[serde(default = "default_digest_hour")]
    pub send_hour: u8,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            send_hour: default_digest_hour(),
        }
    }
}

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Complete deployment configuration.
///
/// # Invariants
/// - A loaded config has passed every guard and [`ClinipayConfig::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClinipayConfig {
    /// Workflow engine settings.
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// SQLite ledger store settings.
    pub store: StoreConfig,
    /// Local file storage settings.
    pub storage: StorageConfig,
    /// OCR provider settings, absent when OCR is disabled.
    #[serde(default)]
    pub ocr: Option<OcrConfig>,
    /// WhatsApp provider settings, absent when the channel is off.
    #[serde(default)]
    pub whatsapp: Option<EndpointConfig>,
    /// Transactional e-mail settings, absent when the channel is off.
    #[serde(default)]
    pub email: Option<EmailConfig>,
    /// Webhook router and action-link server settings.
    pub server: ServerConfig,
    /// Daily digest settings.
    #[serde(default)]
    pub digest: DigestConfig,
}

impl ClinipayConfig {
    /// Loads and validates configuration from `path` (or the default path).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a load guard trips, the file is not
    /// valid TOML, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_PATH));
        check_path(path)?;
        let metadata =
            fs::metadata(path).map_err(|err| ConfigError::Read(format!("{}: {err}", path.display())))?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(ConfigError::Guard("config file exceeds size limit".to_string()));
        }
        let bytes =
            fs::read(path).map_err(|err| ConfigError::Read(format!("{}: {err}", path.display())))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ConfigError::Guard("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every setting as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.trim().is_empty() {
            return Err(ConfigError::Invalid("store.path must be non-empty".to_string()));
        }
        if self.storage.root.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.root must be non-empty".to_string()));
        }
        if self.storage.signing_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.signing_secret must be non-empty".to_string(),
            ));
        }
        if self.storage.url_ttl_secs == 0 {
            return Err(ConfigError::Invalid("storage.url_ttl_secs must be positive".to_string()));
        }
        if self.workflow.ocr_enabled && self.ocr.is_none() {
            return Err(ConfigError::Invalid(
                "workflow.ocr_enabled requires an [ocr] section".to_string(),
            ));
        }
        if let Some(ocr) = &self.ocr {
            validate_endpoint("ocr", &ocr.endpoint)?;
            if ocr.max_response_bytes == 0 {
                return Err(ConfigError::Invalid(
                    "ocr.max_response_bytes must be positive".to_string(),
                ));
            }
        }
        if let Some(whatsapp) = &self.whatsapp {
            validate_endpoint("whatsapp", whatsapp)?;
        }
        if let Some(email) = &self.email {
            validate_endpoint("email", &email.endpoint)?;
            if !email.from_address.contains('@') {
                return Err(ConfigError::Invalid(
                    "email.from_address must be an address".to_string(),
                ));
            }
        }
        let country = &self.workflow.default_country_code;
        if country.is_empty()
            || country.len() > 3
            || !country.chars().all(|digit| digit.is_ascii_digit())
        {
            return Err(ConfigError::Invalid(
                "workflow.default_country_code must be 1-3 digits".to_string(),
            ));
        }
        self.validate_server()?;
        if self.digest.send_hour > 23 {
            return Err(ConfigError::Invalid("digest.send_hour must be 0-23".to_string()));
        }
        Ok(())
    }

    /// Validates the server section.
    fn validate_server(&self) -> Result<(), ConfigError> {
        let bind: SocketAddr = self
            .server
            .bind
            .parse()
            .map_err(|_| ConfigError::Invalid("server.bind must be a socket address".to_string()))?;
        if !bind.ip().is_loopback() && self.server.webhook_verify_token.is_none() {
            return Err(ConfigError::Invalid(
                "non-loopback bind disallowed without webhook verify token".to_string(),
            ));
        }
        if let Some(token) = &self.server.webhook_verify_token
            && token.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "server.webhook_verify_token must be non-empty when set".to_string(),
            ));
        }
        let base = Url::parse(&self.server.public_base_url).map_err(|_| {
            ConfigError::Invalid("server.public_base_url must be a valid url".to_string())
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(
                "server.public_base_url must use http or https".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validates one provider endpoint section.
fn validate_endpoint(section: &str, endpoint: &EndpointConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&endpoint.url)
        .map_err(|_| ConfigError::Invalid(format!("{section}.url must be a valid url")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!("{section}.url must use http or https")));
    }
    if endpoint.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{section}.api_key must be non-empty")));
    }
    if endpoint.timeout_ms == 0 || endpoint.timeout_ms > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "{section}.timeout_ms must be in 1..={MAX_TIMEOUT_MS}"
        )));
    }
    Ok(())
}

/// Applies the path guards shared by every load.
fn check_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_PATH_LEN {
        return Err(ConfigError::Guard("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT {
            return Err(ConfigError::Guard("config path component too long".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Serde default helper.
const fn default_true() -> bool {
    true
}

/// Default reconciliation tolerance in cents.
const fn default_tolerance_cents() -> u32 {
    1
}

/// Default country calling code (Brazil).
fn default_country_code() -> String {
    "55".to_string()
}

/// Default SQLite busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Default signed URL lifetime.
const fn default_url_ttl_secs() -> u64 {
    3_600
}

/// Default provider timeout.
const fn default_timeout_ms() -> u64 {
    10_000
}

/// Default OCR response size cap.
const fn default_max_response_bytes() -> u64 {
    1_048_576
}

/// Default digest send hour.
const fn default_digest_hour() -> u8 {
    18
}
