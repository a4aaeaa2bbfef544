// crates/clinipay-providers/src/storage.rs
// ============================================================================
// Module: Local File Storage
// Description: Filesystem-backed document storage with signed download URLs.
// Purpose: Store submitted invoices under a root with path-safety guards.
// Dependencies: clinipay-config, clinipay-core, sha2 (via core hashing), subtle
// ============================================================================

//! ## Overview
//! Documents live under a configured root directory, addressed by the
//! sanitized upload hint. Signed URLs are derived, not stored: the
//! signature binds the path and an expiry instant to the configured secret,
//! so the download endpoint can verify a link with no state. Storage is not
//! transactional with the ledger; callers compensate with deletes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clinipay_config::StorageConfig;
use clinipay_core::FileStorage;
use clinipay_core::ProviderError;
use clinipay_core::StorageRef;
use clinipay_core::sha256_hex;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Path Safety
// ============================================================================

/// Maximum length accepted for one stored path component.
const MAX_COMPONENT_LEN: usize = 255;

/// Maximum length accepted for a full storage reference.
const MAX_REFERENCE_LEN: usize = 1_024;

/// Number of hex characters kept from the signature digest.
const SIGNATURE_LEN: usize = 32;

/// Validates a reference and returns its relative components.
///
/// # Errors
///
/// Returns [`ProviderError::Invalid`] for traversal attempts, absolute
/// paths, and oversized components.
fn sanitize(reference: &str) -> Result<Vec<&str>, ProviderError> {
    if reference.is_empty() || reference.len() > MAX_REFERENCE_LEN {
        return Err(ProviderError::Invalid("storage reference length out of range".to_string()));
    }
    if reference.starts_with('/') {
        return Err(ProviderError::Invalid("storage reference must be relative".to_string()));
    }
    let mut components = Vec::new();
    for component in reference.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(ProviderError::Invalid(
                "storage reference contains a reserved component".to_string(),
            ));
        }
        if component.len() > MAX_COMPONENT_LEN {
            return Err(ProviderError::Invalid("storage component too long".to_string()));
        }
        if component.contains('\\') || component.contains('\0') {
            return Err(ProviderError::Invalid(
                "storage component contains forbidden characters".to_string(),
            ));
        }
        components.push(component);
    }
    Ok(components)
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Filesystem storage rooted at a configured directory.
pub struct LocalFileStorage {
    /// Root directory for stored documents.
    root: PathBuf,
    /// Secret used to sign download URLs.
    signing_secret: String,
    /// Public base URL the signed links are served under.
    public_base_url: String,
}

impl LocalFileStorage {
    /// Creates the storage, ensuring the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] when the root cannot be created.
    pub fn new(config: &StorageConfig, public_base_url: &str) -> Result<Self, ProviderError> {
        let root = PathBuf::from(&config.root);
        fs::create_dir_all(&root).map_err(|err| {
            ProviderError::Unavailable(format!("storage root unavailable: {err}"))
        })?;
        Ok(Self {
            root,
            signing_secret: config.signing_secret.clone(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolves a sanitized reference to its on-disk path.
    fn resolve(&self, reference: &str) -> Result<PathBuf, ProviderError> {
        let mut path = self.root.clone();
        for component in sanitize(reference)? {
            path.push(component);
        }
        Ok(path)
    }

    /// Derives the signature for a (path, expiry) pair.
    fn signature(&self, reference: &str, expires: u64) -> String {
        let material = format!("{}|{reference}|{expires}", self.signing_secret);
        let mut digest = sha256_hex(material.as_bytes());
        digest.truncate(SIGNATURE_LEN);
        digest
    }

    /// Verifies a presented download signature against the expiry instant.
    ///
    /// Comparison is constant-time over the signature bytes; the expiry
    /// check runs first because expiry is not secret.
    #[must_use]
    pub fn verify_signed(&self, reference: &str, expires: u64, sig: &str, now_secs: u64) -> bool {
        if expires < now_secs {
            return false;
        }
        let derived = self.signature(reference, expires);
        if sig.len() != derived.len() {
            return false;
        }
        sig.as_bytes().ct_eq(derived.as_bytes()).into()
    }
}

/// Returns the current unix time in whole seconds.
fn unix_now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
}

/// Ensures the parent directory of a path exists.
fn ensure_parent(path: &Path) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            ProviderError::Unavailable(format!("storage directory unavailable: {err}"))
        })?;
    }
    Ok(())
}

impl FileStorage for LocalFileStorage {
    fn upload(&self, path_hint: &str, bytes: &[u8]) -> Result<StorageRef, ProviderError> {
        let path = self.resolve(path_hint)?;
        ensure_parent(&path)?;
        fs::write(&path, bytes)
            .map_err(|err| ProviderError::Unavailable(format!("storage write failed: {err}")))?;
        Ok(StorageRef::new(path_hint))
    }

    fn download(&self, reference: &StorageRef) -> Result<Vec<u8>, ProviderError> {
        let path = self.resolve(reference.as_str())?;
        fs::read(&path)
            .map_err(|err| ProviderError::Unavailable(format!("storage read failed: {err}")))
    }

    fn signed_url(&self, reference: &StorageRef, ttl_secs: u64) -> Result<String, ProviderError> {
        sanitize(reference.as_str())?;
        let expires = unix_now_secs().saturating_add(ttl_secs);
        let sig = self.signature(reference.as_str(), expires);
        Ok(format!(
            "{}/files/{}?expires={expires}&sig={sig}",
            self.public_base_url,
            reference.as_str()
        ))
    }

    fn delete(&self, reference: &StorageRef) -> Result<(), ProviderError> {
        let path = self.resolve(reference.as_str())?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            // Compensating deletes may race; an already-absent file is fine.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(ProviderError::Unavailable(format!("storage delete failed: {err}")))
            }
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

    use clinipay_config::StorageConfig;
    use clinipay_core::FileStorage;
    use clinipay_core::ProviderError;
    use clinipay_core::StorageRef;
    use tempfile::TempDir;

    use super::LocalFileStorage;

    fn storage(dir: &TempDir) -> LocalFileStorage {
        LocalFileStorage::new(
            &StorageConfig {
                root: dir.path().join("docs").to_string_lossy().into_owned(),
                url_ttl_secs: 3_600,
                signing_secret: "test-secret".to_string(),
            },
            "https://pay.example.com/",
        )
        .unwrap()
    }

    #[test]
    fn upload_download_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let reference = storage.upload("invoices/3/nf.pdf", b"%PDF-1.7").unwrap();
        assert_eq!(reference.as_str(), "invoices/3/nf.pdf");
        assert_eq!(storage.download(&reference).unwrap(), b"%PDF-1.7");
        storage.delete(&reference).unwrap();
        assert!(storage.download(&reference).is_err());
        // A repeated compensating delete is a no-op.
        storage.delete(&reference).unwrap();
    }

    #[test]
    fn traversal_hints_are_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        for hint in ["../escape.pdf", "/etc/passwd", "a//b.pdf", "a/./b.pdf", ""] {
            let err = storage.upload(hint, b"x").unwrap_err();
            assert!(matches!(err, ProviderError::Invalid(_)), "{hint}: {err:?}");
        }
    }

    #[test]
    fn signed_urls_verify_until_expiry() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let reference = StorageRef::new("invoices/3/nf.pdf");
        let url = storage.signed_url(&reference, 60).unwrap();
        assert!(url.starts_with("https://pay.example.com/files/invoices/3/nf.pdf?expires="), "{url}");

        let query = url.split_once('?').unwrap().1;
        let mut expires = 0_u64;
        let mut sig = String::new();
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", value) => expires = value.parse().unwrap(),
                ("sig", value) => sig = value.to_string(),
                _ => {}
            }
        }
        assert!(storage.verify_signed("invoices/3/nf.pdf", expires, &sig, expires - 1));
        assert!(!storage.verify_signed("invoices/3/nf.pdf", expires, &sig, expires + 1));
        assert!(!storage.verify_signed("invoices/3/other.pdf", expires, &sig, expires - 1));
        assert!(!storage.verify_signed("invoices/3/nf.pdf", expires, "bad", expires - 1));
    }
}
