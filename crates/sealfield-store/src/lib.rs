//! Sealfield Store - where keys and salts live between calls
//!
//! Two lifetimes matter:
//! - session scoped: the exported session key, gone when the process ends
//!   (`MemoryStore`)
//! - persistent: the profile salt, survives restarts
//!   (`FileStore`, `KeychainStore`)
//!
//! Callers only see the `KeyValueStore` trait.

pub mod file;
pub mod keychain;
pub mod memory;

pub use file::FileStore;
pub use keychain::KeychainStore;
pub use memory::MemoryStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store file is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// String key/value storage addressed by a fixed logical name
pub trait KeyValueStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<String>>;

    fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Removing a name that is not present is not an error
    fn remove(&self, name: &str) -> Result<()>;
}
