//! Where TLS material lives and how to load it
//!
//! The conventional layout is a single certs directory:
//!
//! ```text
//! certs/
//! ├── public.crt    server certificate (optionally followed by its chain)
//! ├── private.key   matching private key, possibly passphrase-protected
//! └── CAs/          extra certificates trusted for peer verification
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CertError;
use crate::key_encryption::Passphrase;
use crate::keypair::{KeyPair, load_key_pair};
use crate::trust::{
    TrustPool, load_trust_pool, load_trust_pool_with_native_roots, native_trust_pool,
};

/// Environment variable holding the private key passphrase
pub const TLS_PRIVATE_KEY_PASSWORD: &str = "TLS_PRIVATE_KEY_PASSWORD";

pub const DEFAULT_CERTS_DIR: &str = "certs";
pub const PUBLIC_CERT_FILE: &str = "public.crt";
pub const PRIVATE_KEY_FILE: &str = "private.key";
pub const CA_CERTS_DIR: &str = "CAs";

/// Paths and secrets for loading a server's TLS material
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertsConfig {
    pub public_cert_file: PathBuf,
    pub private_key_file: PathBuf,
    /// Directory of additional trusted certificates; absent means none
    pub ca_certs_dir: Option<PathBuf>,
    /// Seed the trust pool with the platform's native roots
    pub include_system_roots: bool,
    #[serde(skip)]
    key_passphrase: Option<Passphrase>,
}

impl Default for CertsConfig {
    fn default() -> Self {
        Self::from_certs_dir(DEFAULT_CERTS_DIR)
    }
}

/// Everything a TLS server needs at startup
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub identity: KeyPair,
    pub trust: TrustPool,
}

impl CertsConfig {
    /// Use the conventional file names under `dir`
    pub fn from_certs_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            public_cert_file: dir.join(PUBLIC_CERT_FILE),
            private_key_file: dir.join(PRIVATE_KEY_FILE),
            ca_certs_dir: Some(dir.join(CA_CERTS_DIR)),
            include_system_roots: false,
            key_passphrase: None,
        }
    }

    #[must_use]
    pub fn with_passphrase(self, passphrase: impl Into<Passphrase>) -> Self {
        Self {
            key_passphrase: Some(passphrase.into()),
            ..self
        }
    }

    /// Resolve the passphrase from [`TLS_PRIVATE_KEY_PASSWORD`]
    #[must_use]
    pub fn with_passphrase_from_env(self) -> Self {
        self.with_passphrase_from(|name| std::env::var(name).ok())
    }

    /// Resolve the passphrase through `lookup`, called once with
    /// [`TLS_PRIVATE_KEY_PASSWORD`]. Unset or empty clears it.
    #[must_use]
    pub fn with_passphrase_from<F>(self, lookup: F) -> Self
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let key_passphrase = lookup(TLS_PRIVATE_KEY_PASSWORD)
            .filter(|value| !value.is_empty())
            .map(Passphrase::from);
        Self {
            key_passphrase,
            ..self
        }
    }

    #[must_use]
    pub fn include_system_roots(self, include: bool) -> Self {
        Self {
            include_system_roots: include,
            ..self
        }
    }

    #[must_use]
    pub fn passphrase(&self) -> Option<&Passphrase> {
        self.key_passphrase.as_ref()
    }

    /// Whether both identity files are present, i.e. TLS should be served
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.public_cert_file.is_file() && self.private_key_file.is_file()
    }

    /// Load the server identity.
    ///
    /// # Errors
    ///
    /// Any [`load_key_pair`] error.
    pub fn load_identity(&self) -> Result<KeyPair, CertError> {
        load_key_pair(
            &self.public_cert_file,
            &self.private_key_file,
            self.passphrase(),
        )
    }

    /// Load the trust pool. Missing or unset CA directories give an empty
    /// pool (plus native roots if enabled).
    ///
    /// # Errors
    ///
    /// Only when the CA directory exists but cannot be listed.
    pub fn load_trust(&self) -> Result<TrustPool, CertError> {
        match (&self.ca_certs_dir, self.include_system_roots) {
            (Some(dir), true) => load_trust_pool_with_native_roots(dir),
            (Some(dir), false) => load_trust_pool(dir),
            (None, true) => Ok(native_trust_pool()),
            (None, false) => Ok(TrustPool::new()),
        }
    }

    /// Load identity and trust pool together.
    ///
    /// # Errors
    ///
    /// Identity errors are fatal; see [`Self::load_identity`] and
    /// [`Self::load_trust`].
    pub fn load(&self) -> Result<TlsMaterial, CertError> {
        Ok(TlsMaterial {
            identity: self.load_identity()?,
            trust: self.load_trust()?,
        })
    }
}
