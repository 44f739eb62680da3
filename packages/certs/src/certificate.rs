//! Decoded X.509 certificates

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use rustls::pki_types::CertificateDer;
use x509_cert::Certificate;
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::BasicConstraints;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const ED448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.113");

/// A certificate decoded from one PEM block.
///
/// Keeps the original DER next to the decoded structure so it can be handed
/// to rustls without re-encoding. Clones share the decoded form.
#[derive(Clone)]
pub struct ParsedCertificate {
    der: CertificateDer<'static>,
    decoded: Arc<Certificate>,
}

impl ParsedCertificate {
    /// Decode a DER-encoded X.509 certificate.
    ///
    /// # Errors
    ///
    /// Returns the decoder's [`der::Error`] unchanged when the payload is not
    /// a structurally valid certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, der::Error> {
        let decoded = Certificate::from_der(der)?;
        Ok(Self {
            der: CertificateDer::from(der.to_vec()),
            decoded: Arc::new(decoded),
        })
    }

    #[must_use]
    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    #[must_use]
    pub fn x509(&self) -> &Certificate {
        &self.decoded
    }

    /// Subject distinguished name in RFC 4514 form
    #[must_use]
    pub fn subject(&self) -> String {
        self.decoded.tbs_certificate.subject.to_string()
    }

    /// Issuer distinguished name in RFC 4514 form
    #[must_use]
    pub fn issuer(&self) -> String {
        self.decoded.tbs_certificate.issuer.to_string()
    }

    /// Serial number as lowercase hex
    #[must_use]
    pub fn serial_number(&self) -> String {
        let serial = self.decoded.tbs_certificate.serial_number.as_bytes();
        if serial.is_empty() {
            "00".to_string()
        } else {
            hex::encode(serial)
        }
    }

    #[must_use]
    pub fn not_before(&self) -> SystemTime {
        let validity = &self.decoded.tbs_certificate.validity;
        validity.not_before.to_system_time()
    }

    #[must_use]
    pub fn not_after(&self) -> SystemTime {
        let validity = &self.decoded.tbs_certificate.validity;
        validity.not_after.to_system_time()
    }

    #[must_use]
    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.decoded.tbs_certificate.subject_public_key_info
    }

    /// DER encoding of the SubjectPublicKeyInfo.
    ///
    /// # Errors
    ///
    /// Fails only if re-encoding the decoded structure fails.
    pub fn subject_public_key_info_der(&self) -> Result<Vec<u8>, der::Error> {
        self.subject_public_key_info().to_der()
    }

    /// Short name of the public key algorithm (`RSA`, `ECDSA`, `Ed25519`, ...)
    #[must_use]
    pub fn key_algorithm(&self) -> &'static str {
        let oid = self.subject_public_key_info().algorithm.oid;
        if oid == RSA_ENCRYPTION {
            "RSA"
        } else if oid == EC_PUBLIC_KEY {
            "ECDSA"
        } else if oid == ED25519 {
            "Ed25519"
        } else if oid == ED448 {
            "Ed448"
        } else if oid == DSA {
            "DSA"
        } else {
            "Unknown"
        }
    }

    #[must_use]
    pub fn extensions(&self) -> &[Extension] {
        self.decoded
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
    }

    /// Whether BasicConstraints marks this certificate as a CA.
    /// A missing or undecodable extension counts as not a CA.
    #[must_use]
    pub fn is_ca(&self) -> bool {
        match self.decoded.tbs_certificate.get::<BasicConstraints>() {
            Ok(Some((_, constraints))) => constraints.ca,
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(subject = %self.subject(), "Undecodable BasicConstraints: {}", e);
                false
            }
        }
    }
}

impl PartialEq for ParsedCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for ParsedCertificate {}

impl fmt::Debug for ParsedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedCertificate")
            .field("subject", &self.subject())
            .field("issuer", &self.issuer())
            .field("serial_number", &self.serial_number())
            .field("key_algorithm", &self.key_algorithm())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_CERT: &str = include_str!("../tests/fixtures/rsa.crt");
    const EC_CERT: &str = include_str!("../tests/fixtures/ec.crt");
    const CA_CERT: &str = include_str!("../tests/fixtures/ca.crt");

    fn decode(pem_text: &str) -> ParsedCertificate {
        let block = pem::parse(pem_text).expect("fixture is PEM");
        ParsedCertificate::from_der(block.contents()).expect("fixture is a certificate")
    }

    #[test]
    fn exposes_subject_and_key_algorithm() {
        let cert = decode(RSA_CERT);
        assert!(cert.subject().contains("CN=localhost"));
        assert_eq!(cert.subject(), cert.issuer());
        assert_eq!(cert.key_algorithm(), "RSA");
        assert!(cert.not_before() < cert.not_after());
        assert!(!cert.serial_number().is_empty());

        let ec = decode(EC_CERT);
        assert_eq!(ec.key_algorithm(), "ECDSA");
    }

    #[test]
    fn reads_basic_constraints() {
        assert!(decode(CA_CERT).is_ca());
        assert!(!decode(EC_CERT).is_ca());
    }

    #[test]
    fn keeps_original_der() {
        let block = pem::parse(RSA_CERT).expect("fixture is PEM");
        let cert = ParsedCertificate::from_der(block.contents()).expect("certificate");
        assert_eq!(cert.der().as_ref(), block.contents());
        assert_eq!(cert.clone(), cert);
    }

    #[test]
    fn decoded_structure_matches_the_der() {
        let block = pem::parse(RSA_CERT).expect("fixture is PEM");
        let cert = ParsedCertificate::from_der(block.contents()).expect("certificate");

        let reencoded = cert.x509().to_der().expect("re-encodes");
        assert_eq!(reencoded, block.contents());

        let spki = cert.subject_public_key_info_der().expect("encodes");
        assert_eq!(spki[0], 0x30);
        assert!(block.contents().windows(spki.len()).any(|w| w == spki));
    }

    #[test]
    fn lists_extensions() {
        let basic_constraints = ObjectIdentifier::new_unwrap("2.5.29.19");
        let subject_alt_name = ObjectIdentifier::new_unwrap("2.5.29.17");

        let cert = decode(RSA_CERT);
        let extensions = cert.extensions();
        assert_eq!(extensions.len(), 5);

        let bc = extensions
            .iter()
            .find(|ext| ext.extn_id == basic_constraints)
            .expect("basicConstraints present");
        assert!(bc.critical);
        assert!(extensions.iter().any(|ext| ext.extn_id == subject_alt_name));
    }

    #[test]
    fn rejects_truncated_der() {
        let block = pem::parse(RSA_CERT).expect("fixture is PEM");
        let truncated = &block.contents()[..block.contents().len() / 2];
        assert!(ParsedCertificate::from_der(truncated).is_err());
    }
}
