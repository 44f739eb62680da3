//! Public certificate bundle parsing
//!
//! A bundle is a PEM file holding one or more `CERTIFICATE` blocks back to
//! back. Parsing is strict: the first failure aborts and no partial bundle is
//! returned.

use std::path::Path;

use crate::certificate::ParsedCertificate;
use crate::error::CertError;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Read and parse every certificate in a PEM bundle file.
///
/// Certificates are returned in file order and the result is never empty.
///
/// # Errors
///
/// - [`CertError::Io`] if the file cannot be read (OS error preserved)
/// - [`CertError::EmptyFile`] if the file has zero bytes
/// - [`CertError::NoPemBlock`] if no certificate PEM block can be decoded
/// - [`CertError::Der`] with the decoder's message if any block is not a
///   valid X.509 certificate
pub fn parse_public_cert_file(path: impl AsRef<Path>) -> Result<Vec<ParsedCertificate>, CertError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| CertError::io(path, e))?;
    let certs = parse_pem_bundle(&data, path)?;

    tracing::debug!(
        path = %path.display(),
        cert_count = certs.len(),
        "Loaded public certificate bundle"
    );
    Ok(certs)
}

/// Parse certificates from PEM bytes already in memory.
///
/// `origin` is only used to name the source in error messages.
///
/// # Errors
///
/// Same as [`parse_public_cert_file`], minus the I/O failure.
pub fn parse_pem_bundle(data: &[u8], origin: &Path) -> Result<Vec<ParsedCertificate>, CertError> {
    if data.is_empty() {
        return Err(CertError::EmptyFile {
            path: origin.to_path_buf(),
        });
    }

    let no_pem_block = || CertError::NoPemBlock {
        path: origin.to_path_buf(),
    };

    // Invalid base64 or mismatched BEGIN/END labels anywhere fail the whole file
    let blocks = pem::parse_many(data).map_err(|e| {
        tracing::debug!(path = %origin.display(), "PEM decode failed: {}", e);
        no_pem_block()
    })?;

    let mut certs = Vec::with_capacity(blocks.len());
    for block in blocks.iter().filter(|b| b.tag() == CERTIFICATE_LABEL) {
        certs.push(ParsedCertificate::from_der(block.contents())?);
    }

    if certs.is_empty() {
        return Err(no_pem_block());
    }
    if certs.len() < blocks.len() {
        tracing::debug!(
            path = %origin.display(),
            skipped = blocks.len() - certs.len(),
            "Ignored non-certificate PEM blocks"
        );
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_CERT: &str = include_str!("../tests/fixtures/rsa.crt");
    const EC_CERT: &str = include_str!("../tests/fixtures/ec.crt");
    const RSA_KEY: &str = include_str!("../tests/fixtures/rsa.key");

    fn origin() -> &'static Path {
        Path::new("inline.pem")
    }

    #[test]
    fn empty_input_is_its_own_error() {
        let err = parse_pem_bundle(b"", origin()).unwrap_err();
        assert!(matches!(err, CertError::EmptyFile { .. }));
    }

    #[test]
    fn text_without_pem_framing() {
        let err = parse_pem_bundle(b"just some text\n", origin()).unwrap_err();
        assert!(matches!(err, CertError::NoPemBlock { .. }));
    }

    #[test]
    fn mismatched_labels() {
        let data = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END PRIVATE KEY-----\n";
        let err = parse_pem_bundle(data.as_bytes(), origin()).unwrap_err();
        assert!(matches!(err, CertError::NoPemBlock { .. }));
    }

    #[test]
    fn key_only_file_has_no_certificate_block() {
        let err = parse_pem_bundle(RSA_KEY.as_bytes(), origin()).unwrap_err();
        assert!(matches!(err, CertError::NoPemBlock { .. }));
    }

    #[test]
    fn certificates_mixed_with_a_key() {
        let data = format!("{RSA_CERT}{RSA_KEY}{EC_CERT}");
        let certs = parse_pem_bundle(data.as_bytes(), origin()).expect("two certificates");
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].key_algorithm(), "RSA");
        assert_eq!(certs[1].key_algorithm(), "ECDSA");
    }

    #[test]
    fn tolerates_surrounding_text() {
        let data = format!("subject=CN=localhost\n{RSA_CERT}\n\n");
        let certs = parse_pem_bundle(data.as_bytes(), origin()).expect("one certificate");
        assert_eq!(certs.len(), 1);
    }

    #[test]
    fn valid_base64_that_is_not_a_certificate() {
        let data = "-----BEGIN CERTIFICATE-----\nAAECAwQF\n-----END CERTIFICATE-----\n";
        let err = parse_pem_bundle(data.as_bytes(), origin()).unwrap_err();
        assert!(matches!(err, CertError::Der(_)));
    }
}
