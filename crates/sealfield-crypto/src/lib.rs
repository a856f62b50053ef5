//! Sealfield Crypto - field encryption primitives
//!
//! This crate provides:
//! - AES-256-GCM sealing with a fresh random nonce per call
//! - PBKDF2-HMAC-SHA256 key derivation from a password and salt
//! - HMAC-SHA256 partition keys (one key per room / topic)
//! - Self-describing `ENC:` / `ENCP:` string envelopes
//!
//! Everything here is pure. Session state lives in `sealfield-core`.

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod key;

pub use cipher::{open, seal, NONCE_SIZE, TAG_SIZE};
pub use envelope::{
    decrypt, decrypt_untagged, decrypt_with_password, encrypt, encrypt_with_password,
    is_protected, ENVELOPE_PREFIX, PASSWORD_ENVELOPE_PREFIX,
};
pub use kdf::{derive_key, KDF_VERSION, PBKDF2_ITERATIONS};
pub use key::{generate_salt, Salt, SessionKey, KEY_SIZE, SALT_SIZE};

/// Errors that can occur in cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Invalid key length: expected {KEY_SIZE}, got {0}")]
    InvalidKeyLength(usize),

    #[error("Secure random source unavailable")]
    Random,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
