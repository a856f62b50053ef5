//! Session keys and profile salts
//!
//! A `SessionKey` is the raw 256-bit AES key. It is wrapped in `Zeroizing<>`
//! so the bytes are scrubbed on drop, and it never prints itself.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::{kdf, CryptoError, Result};

/// 256-bit key (32 bytes)
pub const KEY_SIZE: usize = 32;
/// 128-bit salt (16 bytes)
pub const SALT_SIZE: usize = 16;

/// Fill `buf` from the operating system CSPRNG
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| CryptoError::Random)
}

/// Symmetric key used for AES-256-GCM field encryption
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Zeroizing<[u8; KEY_SIZE]>);

impl SessionKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Take ownership of bytes that are already zeroized on drop
    pub(crate) fn from_zeroizing(bytes: Zeroizing<[u8; KEY_SIZE]>) -> Self {
        Self(bytes)
    }

    /// Generate a cryptographically secure random key
    pub fn generate() -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        fill_random(&mut key[..])?;
        Ok(Self::from_zeroizing(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Base64 of the raw key bytes. Only for session-scoped storage.
    pub fn export(&self) -> SecretString {
        SecretString::new(STANDARD.encode(self.as_bytes()))
    }

    /// Inverse of [`SessionKey::export`]
    pub fn import(encoded: &str) -> Result<Self> {
        let raw = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::KeyDerivation(format!("exported key is not base64: {e}")))?,
        );
        if raw.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(raw.len()));
        }
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&raw);
        Ok(Self::from_zeroizing(key))
    }

    /// Key scoped to one partition (room, topic, ...).
    ///
    /// Deterministic in `(self, label)`; different labels give unrelated keys.
    pub fn derive_partition(&self, label: &str) -> SessionKey {
        kdf::partition_key(self, label)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Per-profile PBKDF2 salt. Not secret, but losing it loses the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::KeyDerivation(format!("stored salt is not base64: {e}")))?;
        if bytes.is_empty() {
            return Err(CryptoError::KeyDerivation("stored salt is empty".into()));
        }
        Ok(Self(bytes))
    }
}

/// Generate a fresh random salt of [`SALT_SIZE`] bytes
pub fn generate_salt() -> Result<Salt> {
    let mut salt = vec![0u8; SALT_SIZE];
    fill_random(&mut salt)?;
    Ok(Salt(salt))
}
