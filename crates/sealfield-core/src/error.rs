use sealfield_crypto::CryptoError;
use sealfield_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SealError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Fail-closed policy refused to write plaintext
    #[error("No session key available and plaintext fallback is disabled")]
    KeyUnavailable,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Key derivation worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SealError>;
