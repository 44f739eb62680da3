//! # certbundle
//!
//! Certificate material for TLS servers, loaded from PEM files:
//!
//! - **Certificate bundles**: one or more certificates from a single file,
//!   in file order ([`parse_public_cert_file`])
//! - **Trust pools**: every certificate found directly under a directory,
//!   skipping anything that is not one ([`load_trust_pool`])
//! - **Key pairs**: a certificate chain bound to its private key, with
//!   legacy passphrase-protected keys decrypted on the way ([`load_key_pair`])
//!
//! Failures are tagged so callers can tell a missing file from an empty one,
//! a broken PEM frame from a broken DER payload, and a wrong passphrase from
//! a certificate that belongs to another key ([`CertError::kind`]).
//!
//! ## Usage
//!
//! ```no_run
//! use certbundle::{CertsConfig, server_config};
//!
//! let config = CertsConfig::from_certs_dir("/etc/myserver/certs").with_passphrase_from_env();
//! if config.tls_enabled() {
//!     let material = config.load()?;
//!     let client_trust = (!material.trust.is_empty()).then_some(&material.trust);
//!     let tls = server_config(&material.identity, client_trust)?;
//!     # drop(tls);
//! }
//! # Ok::<(), certbundle::CertError>(())
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod bundle;
pub mod certificate;
pub mod config;
pub mod error;
pub mod key_encryption;
pub mod keypair;
pub mod tls_config;
pub mod trust;

pub use bundle::{parse_pem_bundle, parse_public_cert_file};
pub use certificate::ParsedCertificate;
pub use config::{CertsConfig, TLS_PRIVATE_KEY_PASSWORD, TlsMaterial};
pub use error::{CertError, DecryptionError, ErrorKind};
pub use key_encryption::Passphrase;
pub use keypair::{KeyPair, load_key_pair, load_private_key};
pub use tls_config::server_config;
pub use trust::{TrustPool, load_trust_pool, load_trust_pool_with_native_roots, native_trust_pool};
