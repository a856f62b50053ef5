//! In-process store. Contents die with the process, which makes it the
//! session-scoped store.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{KeyValueStore, Result, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(name);
        Ok(())
    }
}
