//! JSON file store for data that must survive restarts (the profile salt).
//!
//! The whole map is rewritten on every change. Writes go to a sibling temp
//! file first and are renamed into place, so a crash never leaves half a salt.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{KeyValueStore, Result, StoreError};

pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read(&self.path)?;
        if data.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.remove(name))
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        entries.insert(name.to_string(), value.to_string());
        self.save(&entries)?;
        tracing::debug!(path = %self.path.display(), name, "persisted entry");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        if entries.remove(name).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
