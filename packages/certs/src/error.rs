//! Error types for certificate and key loading

use std::path::PathBuf;

/// Coarse classification of a [`CertError`], for callers that branch on the
/// failure stage rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file or directory does not exist.
    NotFound,
    /// Any other filesystem failure.
    Io,
    /// A certificate file with zero bytes.
    EmptyFile,
    /// Content present but not PEM-structured.
    MalformedPem,
    /// PEM decoded but the payload is not valid DER/X.509.
    MalformedDer,
    /// Encrypted private key could not be decrypted.
    Decryption,
    /// Private key format or algorithm rustls cannot use.
    UnsupportedKey,
    /// Certificate and private key do not belong together.
    KeyMismatch,
    /// rustls rejected the assembled configuration.
    Tls,
}

/// Errors raised while loading certificates, trust pools and key pairs
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Empty public certificate file {}", path.display())]
    EmptyFile { path: PathBuf },
    #[error("Could not read PEM block from file {}", path.display())]
    NoPemBlock { path: PathBuf },
    /// DER decode failure, message passed through from the decoder untouched
    #[error(transparent)]
    Der(#[from] der::Error),
    #[error("The private key contains additional data: {}", path.display())]
    TrailingKeyData { path: PathBuf },
    #[error(transparent)]
    Decryption(#[from] DecryptionError),
    #[error("Unsupported private key: {0}")]
    UnsupportedKey(String),
    #[error("Private key does not match the public key in the certificate")]
    KeyMismatch,
    #[error("TLS configuration failed: {0}")]
    Tls(#[source] rustls::Error),
}

/// Failures specific to legacy (RFC 1421) encrypted PEM keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecryptionError {
    #[error("Private key is encrypted but no passphrase was provided")]
    MissingPassphrase,
    #[error("Private key decryption failed: incorrect passphrase")]
    IncorrectPassphrase,
    #[error("Unsupported private key cipher: {0}")]
    UnsupportedCipher(String),
    #[error("Malformed encryption header: {0}")]
    MalformedHeader(String),
}

impl CertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error by the stage that produced it
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            Self::Io { .. } => ErrorKind::Io,
            Self::EmptyFile { .. } => ErrorKind::EmptyFile,
            Self::NoPemBlock { .. } | Self::TrailingKeyData { .. } => ErrorKind::MalformedPem,
            Self::Der(_) => ErrorKind::MalformedDer,
            Self::Decryption(_) => ErrorKind::Decryption,
            Self::UnsupportedKey(_) => ErrorKind::UnsupportedKey,
            Self::KeyMismatch => ErrorKind::KeyMismatch,
            Self::Tls(_) => ErrorKind::Tls,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<rustls::Error> for CertError {
    fn from(err: rustls::Error) -> Self {
        match err {
            rustls::Error::InconsistentKeys(rustls::InconsistentKeys::KeyMismatch) => {
                Self::KeyMismatch
            }
            other => Self::Tls(other),
        }
    }
}
