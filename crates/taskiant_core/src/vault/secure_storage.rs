//! OS-backed secret protection used by the key vault.
//!
//! `KeyringSecureStorage` keeps a 256-bit wrapping key in the platform
//! credential store (Keychain, Windows Credential Manager, kernel keyutils)
//! and seals payloads with AES-256-GCM. Sealed blobs are
//! `MAGIC || nonce || ciphertext`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SEALED_MAGIC: &[u8; 8] = b"TKSS0001";
const NONCE_LEN: usize = 12;
const WRAPPING_KEY_LEN: usize = 32;

pub const DEFAULT_KEYRING_SERVICE: &str = "taskiant.secure-storage";
pub const DEFAULT_KEYRING_ACCOUNT: &str = "wrapping-key";

/// Failures from a secure storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecureStorageError {
    /// The platform credential store cannot be reached or holds no key.
    Unavailable(String),
    /// Sealing or unsealing failed (tampered blob, wrong wrapping key).
    Crypto(String),
}

impl Display for SecureStorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "secure storage unavailable: {message}"),
            Self::Crypto(message) => write!(f, "secure storage crypto failure: {message}"),
        }
    }
}

impl Error for SecureStorageError {}

/// Platform secret protection, the seam the vault is tested through.
pub trait SecureStorage {
    /// Whether `encrypt`/`decrypt` can currently be served.
    fn is_available(&self) -> bool;
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecureStorageError>;
    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, SecureStorageError>;
}

impl<S: SecureStorage + ?Sized> SecureStorage for Box<S> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecureStorageError> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, SecureStorageError> {
        (**self).decrypt(sealed)
    }
}

/// Secure storage backed by the OS credential store via `keyring`.
#[derive(Debug, Clone)]
pub struct KeyringSecureStorage {
    service: String,
    account: String,
}

impl Default for KeyringSecureStorage {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_SERVICE, DEFAULT_KEYRING_ACCOUNT)
    }
}

impl KeyringSecureStorage {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, SecureStorageError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|err| SecureStorageError::Unavailable(err.to_string()))
    }

    fn wrapping_key(&self, create: bool) -> Result<[u8; WRAPPING_KEY_LEN], SecureStorageError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(encoded) => decode_hex::<WRAPPING_KEY_LEN>(&encoded).ok_or_else(|| {
                SecureStorageError::Crypto("stored wrapping key has invalid format".to_string())
            }),
            Err(keyring::Error::NoEntry) if create => {
                let mut key = [0u8; WRAPPING_KEY_LEN];
                rand::rngs::OsRng.fill_bytes(&mut key);
                entry
                    .set_password(&encode_hex(&key))
                    .map_err(|err| SecureStorageError::Unavailable(err.to_string()))?;
                Ok(key)
            }
            Err(keyring::Error::NoEntry) => Err(SecureStorageError::Unavailable(
                "no wrapping key in credential store".to_string(),
            )),
            Err(err) => Err(SecureStorageError::Unavailable(err.to_string())),
        }
    }
}

impl SecureStorage for KeyringSecureStorage {
    fn is_available(&self) -> bool {
        match self.entry() {
            Ok(entry) => matches!(entry.get_password(), Ok(_) | Err(keyring::Error::NoEntry)),
            Err(_) => false,
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecureStorageError> {
        let key = self.wrapping_key(true)?;
        seal(&key, plaintext)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, SecureStorageError> {
        let key = self.wrapping_key(false)?;
        unseal(&key, sealed)
    }
}

pub(crate) fn seal(key: &[u8; WRAPPING_KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, SecureStorageError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|err| SecureStorageError::Crypto(err.to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| SecureStorageError::Crypto("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(SEALED_MAGIC.len() + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(SEALED_MAGIC);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn unseal(key: &[u8; WRAPPING_KEY_LEN], sealed: &[u8]) -> Result<Vec<u8>, SecureStorageError> {
    let nonce_end = SEALED_MAGIC.len() + NONCE_LEN;
    if sealed.len() <= nonce_end || &sealed[..SEALED_MAGIC.len()] != SEALED_MAGIC {
        return Err(SecureStorageError::Crypto(
            "sealed payload has invalid header".to_string(),
        ));
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|err| SecureStorageError::Crypto(err.to_string()))?;
    cipher
        .decrypt(
            Nonce::from_slice(&sealed[SEALED_MAGIC.len()..nonce_end]),
            &sealed[nonce_end..],
        )
        .map_err(|_| SecureStorageError::Crypto("decryption failed".to_string()))
}

pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

pub(crate) fn decode_hex<const N: usize>(hex: &str) -> Option<[u8; N]> {
    let hex = hex.trim();
    if hex.len() != N * 2 {
        return None;
    }
    let mut out = [0u8; N];
    for (idx, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
        let hi = (chunk[0] as char).to_digit(16)? as u8;
        let lo = (chunk[1] as char).to_digit(16)? as u8;
        out[idx] = (hi << 4) | lo;
    }
    Some(out)
}
