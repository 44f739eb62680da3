//! rustls server configuration from loaded material

use std::sync::Arc;

use rustls::ServerConfig;
use rustls::server::WebPkiClientVerifier;

use crate::error::CertError;
use crate::keypair::KeyPair;
use crate::trust::TrustPool;

/// Build a rustls `ServerConfig` presenting `identity`.
///
/// With a trust pool, clients must present a certificate chaining to one of
/// its roots (mutual TLS). Without one, client certificates are not requested.
///
/// # Errors
///
/// Returns [`CertError::Tls`] if rustls rejects the protocol versions, the
/// verifier (for example an empty trust pool) or the identity.
pub fn server_config(
    identity: &KeyPair,
    client_trust: Option<&TrustPool>,
) -> Result<ServerConfig, CertError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;

    let builder = match client_trust {
        Some(pool) => {
            let roots = Arc::new(pool.root_cert_store());
            let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider)
                .build()
                .map_err(|e| CertError::Tls(rustls::Error::General(e.to_string())))?;
            tracing::debug!(roots = pool.len(), "Requiring client certificates");
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let key = identity.private_key().clone_key();
    let config = builder.with_single_cert(identity.cert_chain_der(), key)?;
    Ok(config)
}
