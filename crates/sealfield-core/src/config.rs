//! Runtime configuration
//!
//! Read from a JSON file; every field is optional and falls back to the
//! defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SealError};

/// What to do when a write needs encrypting but no session key exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Store the plaintext and keep going
    #[default]
    FailOpen,
    /// Refuse the write with `SealError::KeyUnavailable`
    FailClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub fallback: FallbackPolicy,
    /// Session-store name of the exported session key
    pub session_key_name: String,
    /// Persistent-store name of the profile salt
    pub salt_key_name: String,
    /// Try prefix-less base64 values as legacy envelopes on read
    pub accept_untagged: bool,
    /// Service name for `KeychainStore`
    pub keychain_service: String,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::FailOpen,
            session_key_name: "sealfield_session_key".to_string(),
            salt_key_name: "sealfield_salt".to_string(),
            accept_untagged: false,
            keychain_service: "sealfield".to_string(),
        }
    }
}

impl SealConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| SealError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_key_name.is_empty() || self.salt_key_name.is_empty() {
            return Err(SealError::Config("storage names must not be empty".into()));
        }
        if self.session_key_name == self.salt_key_name {
            return Err(SealError::Config(
                "session key and salt must use different storage names".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SealConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, SealConfig::default());
        assert_eq!(config.fallback, FallbackPolicy::FailOpen);
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sealfield.json");
        std::fs::write(&path, r#"{"fallback": "fail_closed", "accept_untagged": true}"#).unwrap();

        let config = SealConfig::load(&path).unwrap();
        assert_eq!(config.fallback, FallbackPolicy::FailClosed);
        assert!(config.accept_untagged);
        assert_eq!(config.salt_key_name, "sealfield_salt");
    }

    #[test]
    fn test_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sealfield.json");

        std::fs::write(&path, r#"{"fallback": "sometimes"}"#).unwrap();
        assert!(matches!(SealConfig::load(&path), Err(SealError::Config(_))));

        std::fs::write(&path, r#"{"session_key_name": "x", "salt_key_name": "x"}"#).unwrap();
        assert!(matches!(SealConfig::load(&path), Err(SealError::Config(_))));
    }
}
