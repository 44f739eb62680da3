//! Server identity loading: certificate chain plus matching private key

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer,
};
use rustls::sign::CertifiedKey;
use zeroize::Zeroizing;

use crate::bundle::parse_public_cert_file;
use crate::certificate::ParsedCertificate;
use crate::error::{CertError, DecryptionError};
use crate::key_encryption::{Passphrase, decrypt_pem_block, is_encrypted};

const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const SEC1_LABEL: &str = "EC PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";
const ENCRYPTED_PKCS8_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// A certificate chain bound to the private key of its leaf
pub struct KeyPair {
    chain: Vec<ParsedCertificate>,
    key: PrivateKeyDer<'static>,
    certified: Arc<CertifiedKey>,
}

impl KeyPair {
    /// Bind a certificate chain to a private key.
    ///
    /// The first certificate is the leaf; its public key must match `key`.
    ///
    /// # Errors
    ///
    /// - [`CertError::UnsupportedKey`] if rustls cannot sign with `key`
    /// - [`CertError::KeyMismatch`] if the leaf belongs to another key
    pub fn new(
        chain: Vec<ParsedCertificate>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, CertError> {
        if chain.is_empty() {
            return Err(CertError::Tls(rustls::Error::NoCertificatesPresented));
        }

        let provider = rustls::crypto::ring::default_provider();
        let signing_key = provider
            .key_provider
            .load_private_key(key.clone_key())
            .map_err(|e| CertError::UnsupportedKey(e.to_string()))?;

        let cert_chain = chain.iter().map(|c| c.der().clone()).collect();
        let certified = CertifiedKey::new(cert_chain, signing_key);
        match certified.keys_match() {
            Ok(()) => {}
            // key type cannot report its public half; nothing to compare
            Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => {
                tracing::debug!("Skipping key consistency check for opaque signing key");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            chain,
            key,
            certified: Arc::new(certified),
        })
    }

    /// The leaf certificate
    #[must_use]
    pub fn certificate(&self) -> &ParsedCertificate {
        &self.chain[0]
    }

    #[must_use]
    pub fn chain(&self) -> &[ParsedCertificate] {
        &self.chain
    }

    #[must_use]
    pub fn cert_chain_der(&self) -> Vec<CertificateDer<'static>> {
        self.chain.iter().map(|c| c.der().clone()).collect()
    }

    #[must_use]
    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }

    /// Ready-to-use rustls identity for a certificate resolver
    #[must_use]
    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified)
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
            certified: Arc::clone(&self.certified),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

/// Load a certificate file and its private key as a server identity.
///
/// `passphrase` is only consulted when the key PEM carries legacy encryption
/// headers; a passphrase given for a plaintext key is ignored. An empty
/// passphrase counts as none.
///
/// # Errors
///
/// - [`CertError::Io`] if either file cannot be read
/// - [`CertError::NoPemBlock`] / [`CertError::TrailingKeyData`] for a
///   malformed key file
/// - [`CertError::Decryption`] for a missing or wrong passphrase
/// - any [`parse_public_cert_file`] error for the certificate file
/// - [`CertError::UnsupportedKey`] / [`CertError::KeyMismatch`] from binding
pub fn load_key_pair(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
    passphrase: Option<&Passphrase>,
) -> Result<KeyPair, CertError> {
    let key = load_private_key(key_path.as_ref(), passphrase)?;
    let chain = parse_public_cert_file(cert_path.as_ref())?;
    let pair = KeyPair::new(chain, key)?;

    tracing::info!(
        cert_path = %cert_path.as_ref().display(),
        subject = %pair.certificate().subject(),
        chain_len = pair.chain().len(),
        "Loaded TLS key pair"
    );
    Ok(pair)
}

/// Read a single PEM private key, decrypting it when it is encrypted.
///
/// # Errors
///
/// See [`load_key_pair`]; binding errors do not apply.
pub fn load_private_key(
    path: impl AsRef<Path>,
    passphrase: Option<&Passphrase>,
) -> Result<PrivateKeyDer<'static>, CertError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| CertError::io(path, e))?;

    let block = pem::parse(&data).map_err(|e| {
        tracing::debug!(path = %path.display(), "PEM decode failed: {}", e);
        CertError::NoPemBlock {
            path: path.to_path_buf(),
        }
    })?;
    if has_trailing_data(&data) {
        return Err(CertError::TrailingKeyData {
            path: path.to_path_buf(),
        });
    }

    let passphrase = passphrase.filter(|p| !p.is_empty());
    let mut der = if is_encrypted(&block) {
        let passphrase = passphrase.ok_or(DecryptionError::MissingPassphrase)?;
        decrypt_pem_block(&block, passphrase)?
    } else {
        if passphrase.is_some() {
            tracing::debug!(
                path = %path.display(),
                "Private key is not encrypted, ignoring passphrase"
            );
        }
        Zeroizing::new(block.contents().to_vec())
    };

    private_key_der(block.tag(), std::mem::take(&mut *der))
}

fn private_key_der(label: &str, der: Vec<u8>) -> Result<PrivateKeyDer<'static>, CertError> {
    match label {
        PKCS1_LABEL => Ok(PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(der))),
        SEC1_LABEL => Ok(PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(der))),
        PKCS8_LABEL => Ok(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der))),
        ENCRYPTED_PKCS8_LABEL => Err(CertError::UnsupportedKey(
            "PKCS#8 encrypted private keys are not supported".to_string(),
        )),
        other => Err(CertError::UnsupportedKey(format!("unexpected PEM block type {other}"))),
    }
}

/// Anything other than whitespace after the first PEM block's END line
fn has_trailing_data(data: &[u8]) -> bool {
    const END_MARKER: &[u8] = b"-----END ";
    const DASHES: &[u8] = b"-----";

    let Some(end) = find(data, END_MARKER) else {
        return false;
    };
    let after_marker = &data[end + END_MARKER.len()..];
    let Some(close) = find(after_marker, DASHES) else {
        return false;
    };
    after_marker[close + DASHES.len()..]
        .iter()
        .any(|b| !b.is_ascii_whitespace())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
