//! Key vault: the device-bound symmetric key for the encrypted store.
//!
//! # Responsibility
//! - Load the persisted key file and unseal it through [`SecureStorage`].
//! - Generate, seal and persist a fresh 256-bit key on first use.
//!
//! # Invariants
//! - An existing key file that cannot be unsealed is fatal; the vault never
//!   regenerates over it.
//! - Key bytes are never logged and `SymmetricKey`'s `Debug` is redacted.
//! - The fixed fallback key is only returned under
//!   [`KeyFallbackPolicy::DevelopmentFallback`] and is never written to disk.

mod secure_storage;

pub use secure_storage::{
    KeyringSecureStorage, SecureStorage, SecureStorageError, DEFAULT_KEYRING_ACCOUNT,
    DEFAULT_KEYRING_SERVICE,
};

use log::{info, warn};
use rand::RngCore;
use secure_storage::{decode_hex, encode_hex};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const KEY_LEN: usize = 32;

const DEVELOPMENT_FALLBACK_KEY: &[u8; KEY_LEN] = b"taskiant-development-fallback-k!";

pub type VaultResult<T> = Result<T, VaultError>;

/// Key vault failures.
#[derive(Debug)]
pub enum VaultError {
    /// Secure storage cannot produce the key (unavailable or cannot unseal).
    KeyUnavailable(String),
    /// The key file unsealed but does not hold a valid key.
    InvalidKeyFile(String),
    /// Reading or writing the key file failed.
    Io(io::Error),
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyUnavailable(message) => write!(f, "encryption key unavailable: {message}"),
            Self::InvalidKeyFile(message) => write!(f, "invalid key file: {message}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for VaultError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// What to do when secure storage is unavailable while creating a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFallbackPolicy {
    /// Fail with [`VaultError::KeyUnavailable`]. Production default.
    #[default]
    Fail,
    /// Hand out a fixed, well-known key. Non-production builds only.
    DevelopmentFallback,
}

/// 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lower-case hex, the on-disk plaintext format inside the sealed file.
    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        decode_hex::<KEY_LEN>(hex).map(Self)
    }

    /// SQLCipher raw-key literal (`x'<hex>'`), skipping passphrase derivation.
    pub fn sqlcipher_raw_key(&self) -> String {
        format!("x'{}'", self.to_hex())
    }
}

impl Debug for SymmetricKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Device key manager over one key file.
pub struct KeyVault<S: SecureStorage> {
    key_path: PathBuf,
    storage: S,
    fallback: KeyFallbackPolicy,
}

impl<S: SecureStorage> KeyVault<S> {
    pub fn new(key_path: impl Into<PathBuf>, storage: S, fallback: KeyFallbackPolicy) -> Self {
        Self {
            key_path: key_path.into(),
            storage,
            fallback,
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Returns the persisted key, creating it on first use.
    ///
    /// # Errors
    /// - [`VaultError::KeyUnavailable`] when an existing key file cannot be
    ///   unsealed, or when no key exists, secure storage is unavailable and the
    ///   policy is [`KeyFallbackPolicy::Fail`].
    /// - [`VaultError::InvalidKeyFile`] when the unsealed content is not a key.
    /// - [`VaultError::Io`] for key file read/write failures.
    pub fn get_or_create_key(&self) -> VaultResult<SymmetricKey> {
        if self.key_path.exists() {
            return self.load_existing();
        }

        if !self.storage.is_available() {
            return match self.fallback {
                KeyFallbackPolicy::Fail => {
                    warn!(
                        "event=key_create module=vault status=error error_code=secure_storage_unavailable"
                    );
                    Err(VaultError::KeyUnavailable(
                        "secure storage unavailable; refusing to create an unprotected key"
                            .to_string(),
                    ))
                }
                KeyFallbackPolicy::DevelopmentFallback => {
                    warn!(
                        "event=key_create module=vault status=ok mode=development_fallback persisted=false"
                    );
                    Ok(SymmetricKey(*DEVELOPMENT_FALLBACK_KEY))
                }
            };
        }

        let key = SymmetricKey::generate();
        let sealed = self
            .storage
            .encrypt(key.to_hex().as_bytes())
            .map_err(|err| VaultError::KeyUnavailable(err.to_string()))?;
        write_atomically(&self.key_path, &sealed)?;
        info!("event=key_create module=vault status=ok persisted=true");
        Ok(key)
    }

    fn load_existing(&self) -> VaultResult<SymmetricKey> {
        let sealed = fs::read(&self.key_path)?;
        if !self.storage.is_available() {
            warn!("event=key_load module=vault status=error error_code=secure_storage_unavailable");
            return Err(VaultError::KeyUnavailable(
                "secure storage unavailable; cannot unseal existing key".to_string(),
            ));
        }
        let plaintext = self.storage.decrypt(&sealed).map_err(|err| {
            warn!("event=key_load module=vault status=error error_code=key_unseal_failed");
            VaultError::KeyUnavailable(err.to_string())
        })?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| VaultError::InvalidKeyFile("key is not valid UTF-8".to_string()))?;
        let key = SymmetricKey::from_hex(text).ok_or_else(|| {
            VaultError::InvalidKeyFile(format!("expected {} hex chars", KEY_LEN * 2))
        })?;
        info!("event=key_load module=vault status=ok");
        Ok(key)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("enc.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}
