//! Legacy encrypted PEM private keys
//!
//! Handles RFC 1421 style encryption as written by `openssl rsa -aes128` and
//! friends: a `Proc-Type: 4,ENCRYPTED` header, a `DEK-Info: <cipher>,<hex iv>`
//! header, and a CBC-encrypted body keyed with OpenSSL's `EVP_BytesToKey`
//! (MD5, one iteration, salt = first 8 bytes of the IV).

use std::fmt;

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit};
use der::asn1::AnyRef;
use der::{Decode, Tag, Tagged};
use md5::{Digest, Md5};
use zeroize::Zeroizing;

use crate::error::DecryptionError;

const PROC_TYPE: &str = "Proc-Type";
const DEK_INFO: &str = "DEK-Info";
const SALT_LEN: usize = 8;

/// Secret used to decrypt a private key. Zeroed on drop, redacted in `Debug`.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(***)")
    }
}

impl From<&str> for Passphrase {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for Passphrase {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

/// Block ciphers OpenSSL writes into `DEK-Info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PemCipher {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    DesEde3Cbc,
    DesCbc,
}

impl PemCipher {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "AES-128-CBC" => Some(Self::Aes128Cbc),
            "AES-192-CBC" => Some(Self::Aes192Cbc),
            "AES-256-CBC" => Some(Self::Aes256Cbc),
            "DES-EDE3-CBC" => Some(Self::DesEde3Cbc),
            "DES-CBC" => Some(Self::DesCbc),
            _ => None,
        }
    }

    fn key_len(self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc | Self::DesEde3Cbc => 24,
            Self::Aes256Cbc => 32,
            Self::DesCbc => 8,
        }
    }

    fn iv_len(self) -> usize {
        match self {
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc => 16,
            Self::DesEde3Cbc | Self::DesCbc => 8,
        }
    }

    fn decrypt(self, key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<usize, DecryptionError> {
        match self {
            Self::Aes128Cbc => cbc_decrypt::<aes::Aes128>(key, iv, buf),
            Self::Aes192Cbc => cbc_decrypt::<aes::Aes192>(key, iv, buf),
            Self::Aes256Cbc => cbc_decrypt::<aes::Aes256>(key, iv, buf),
            Self::DesEde3Cbc => cbc_decrypt::<des::TdesEde3>(key, iv, buf),
            Self::DesCbc => cbc_decrypt::<des::Des>(key, iv, buf),
        }
    }
}

/// Whether a PEM block carries legacy encryption headers
pub(crate) fn is_encrypted(block: &pem::Pem) -> bool {
    let headers = block.headers();
    headers
        .get(PROC_TYPE)
        .is_some_and(|value| value.trim().ends_with("ENCRYPTED"))
        || headers.get(DEK_INFO).is_some()
}

/// Decrypt the body of an encrypted PEM block into plaintext key DER.
///
/// A wrong passphrase shows up as bad padding or, when the padding happens to
/// check out, as plaintext that is not one well-formed DER SEQUENCE. Both are
/// reported as [`DecryptionError::IncorrectPassphrase`].
pub(crate) fn decrypt_pem_block(
    block: &pem::Pem,
    passphrase: &Passphrase,
) -> Result<Zeroizing<Vec<u8>>, DecryptionError> {
    let dek_info = block
        .headers()
        .get(DEK_INFO)
        .ok_or_else(|| DecryptionError::MalformedHeader("missing DEK-Info header".to_string()))?;
    let (cipher, iv) = parse_dek_info(dek_info)?;

    let salt = &iv[..SALT_LEN];
    let key = derive_key(passphrase.expose().as_bytes(), salt, cipher.key_len());
    let mut buf = Zeroizing::new(block.contents().to_vec());
    let len = cipher.decrypt(&key, &iv, &mut buf)?;
    buf.truncate(len);

    if !is_single_der_sequence(&buf) {
        return Err(DecryptionError::IncorrectPassphrase);
    }
    Ok(buf)
}

fn parse_dek_info(value: &str) -> Result<(PemCipher, Vec<u8>), DecryptionError> {
    let (name, iv_hex) = value
        .split_once(',')
        .ok_or_else(|| DecryptionError::MalformedHeader(format!("DEK-Info: {value}")))?;
    let name = name.trim();
    let cipher = PemCipher::from_name(name)
        .ok_or_else(|| DecryptionError::UnsupportedCipher(name.to_string()))?;
    let iv = hex::decode(iv_hex.trim())
        .map_err(|e| DecryptionError::MalformedHeader(format!("DEK-Info IV: {e}")))?;
    if iv.len() != cipher.iv_len() {
        return Err(DecryptionError::MalformedHeader(format!(
            "DEK-Info IV is {} bytes, {name} needs {}",
            iv.len(),
            cipher.iv_len()
        )));
    }
    Ok((cipher, iv))
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration:
/// `D_i = MD5(D_{i-1} || passphrase || salt)`, concatenated until long enough.
fn derive_key(passphrase: &[u8], salt: &[u8], key_len: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(Vec::with_capacity(key_len + 16));
    let mut previous: Option<Zeroizing<Vec<u8>>> = None;
    while key.len() < key_len {
        let mut hasher = Md5::new();
        if let Some(prev) = &previous {
            hasher.update(prev.as_slice());
        }
        hasher.update(passphrase);
        hasher.update(salt);
        let digest = Zeroizing::new(hasher.finalize().to_vec());
        key.extend_from_slice(&digest);
        previous = Some(digest);
    }
    key.truncate(key_len);
    key
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<usize, DecryptionError>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| DecryptionError::MalformedHeader("invalid key or IV length".to_string()))?;
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(buf)
        .map_err(|_| DecryptionError::IncorrectPassphrase)?;
    Ok(plaintext.len())
}

fn is_single_der_sequence(bytes: &[u8]) -> bool {
    AnyRef::from_der(bytes).is_ok_and(|any| any.tag() == Tag::Sequence)
}
