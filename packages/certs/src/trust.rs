//! Trust pool assembly from a directory of CA certificates
//!
//! Best effort by construction: a missing directory yields an empty pool and
//! any file that fails to parse is skipped. Only a directory that exists but
//! cannot be listed is an error.

use std::io;
use std::path::{Path, PathBuf};

use rustls::RootCertStore;

use crate::bundle::parse_public_cert_file;
use crate::certificate::ParsedCertificate;
use crate::error::CertError;

/// Certificates trusted for verifying peers
#[derive(Debug, Clone, Default)]
pub struct TrustPool {
    certificates: Vec<ParsedCertificate>,
}

impl TrustPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    #[must_use]
    pub fn certificates(&self) -> &[ParsedCertificate] {
        &self.certificates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParsedCertificate> {
        self.certificates.iter()
    }

    pub fn push(&mut self, cert: ParsedCertificate) {
        self.certificates.push(cert);
    }

    /// Build a rustls root store from the pool.
    ///
    /// Certificates webpki cannot use as trust anchors are left out and
    /// counted in a warning.
    #[must_use]
    pub fn root_cert_store(&self) -> RootCertStore {
        let mut store = RootCertStore::empty();
        let roots = self.certificates.iter().map(|c| c.der().clone());
        let (added, ignored) = store.add_parsable_certificates(roots);
        if ignored > 0 {
            tracing::warn!(
                added,
                ignored,
                "Some trusted certificates were not usable as roots"
            );
        }
        store
    }
}

impl Extend<ParsedCertificate> for TrustPool {
    fn extend<T: IntoIterator<Item = ParsedCertificate>>(&mut self, iter: T) {
        self.certificates.extend(iter);
    }
}

impl<'a> IntoIterator for &'a TrustPool {
    type Item = &'a ParsedCertificate;
    type IntoIter = std::slice::Iter<'a, ParsedCertificate>;

    fn into_iter(self) -> Self::IntoIter {
        self.certificates.iter()
    }
}

/// Load every certificate found in the regular files directly under `dir`.
///
/// # Errors
///
/// Returns [`CertError::Io`] only when `dir` exists but cannot be listed.
/// A missing directory, subdirectories, unreadable entries and files that
/// are not certificates are all skipped.
pub fn load_trust_pool(dir: impl AsRef<Path>) -> Result<TrustPool, CertError> {
    let dir = dir.as_ref();
    let Some(files) = candidate_files(dir)? else {
        tracing::debug!(dir = %dir.display(), "Trust directory does not exist");
        return Ok(TrustPool::new());
    };

    let pool = files.into_iter().fold(TrustPool::new(), |mut pool, file| {
        match parse_public_cert_file(&file) {
            Ok(certs) => pool.extend(certs),
            Err(e) => {
                tracing::debug!(path = %file.display(), "Skipping trust file: {}", e);
            }
        }
        pool
    });

    tracing::info!(
        dir = %dir.display(),
        cert_count = pool.len(),
        "Loaded trusted certificates"
    );
    Ok(pool)
}

/// Like [`load_trust_pool`], but starts from the platform's native roots.
///
/// # Errors
///
/// Same as [`load_trust_pool`].
pub fn load_trust_pool_with_native_roots(dir: impl AsRef<Path>) -> Result<TrustPool, CertError> {
    let mut pool = native_trust_pool();
    pool.extend(load_trust_pool(dir)?.certificates);
    Ok(pool)
}

/// Trust pool holding the platform's native root certificates.
///
/// Failures reading the native store are logged and otherwise ignored.
#[must_use]
pub fn native_trust_pool() -> TrustPool {
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        tracing::warn!("Failed to load native root certificate: {}", e);
    }

    let mut pool = TrustPool::new();
    let mut skipped = 0usize;
    for der in native.certs {
        match ParsedCertificate::from_der(der.as_ref()) {
            Ok(cert) => pool.push(cert),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "Skipped undecodable native root certificates");
    }
    pool
}

/// Regular files directly under `dir`, sorted by name, or `None` if `dir`
/// does not exist.
fn candidate_files(dir: &Path) -> Result<Option<Vec<PathBuf>>, CertError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CertError::io(dir, e)),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                tracing::debug!(dir = %dir.display(), "Skipping unreadable entry: {}", e);
                None
            }
        })
        // follows symlinks; dangling links fail metadata and are dropped
        .filter(|path| std::fs::metadata(path).is_ok_and(|m| m.is_file()))
        .collect();
    files.sort();
    Ok(Some(files))
}
