//! OS keychain store
//!
//! One keychain entry per logical name, all under the same service name.
//! Suitable for the persistent salt; the keychain outlives the session, so
//! never put the exported session key here.

use crate::{KeyValueStore, Result, StoreError};

pub struct KeychainStore {
    service_name: String,
}

impl KeychainStore {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service_name, name)
            .map_err(|e| StoreError::Keychain(e.to_string()))
    }
}

impl KeyValueStore for KeychainStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        match self.entry(name)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keychain(e.to_string())),
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.entry(name)?
            .set_password(value)
            .map_err(|e| StoreError::Keychain(e.to_string()))
    }

    fn remove(&self, name: &str) -> Result<()> {
        match self.entry(name)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keychain(e.to_string())),
        }
    }
}
