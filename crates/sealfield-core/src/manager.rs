//! Session key lifecycle
//!
//! `NoKey --initialize_*--> Keyed --clear_key--> NoKey`
//!
//! The key is cached in memory and mirrored, exported, into the session
//! store so a restarted view within the same session can pick it up again.
//! The salt it was derived from lives in the persistent store.
//!
//! Derivation failures are returned to the caller. Decryption failures in
//! the `*_if_available` helpers are logged and the stored value is returned.

use std::sync::Arc;

use sealfield_crypto::{self as crypto, generate_salt, Salt, SessionKey};
use sealfield_store::KeyValueStore;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{FallbackPolicy, SealConfig};
use crate::fields::{FieldCodec, Record};
use crate::records::{self, ProtectedRecord};
use crate::{Result, SealError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    NoKey,
    Keyed,
}

/// Owns the session key for one signed-in session
pub struct KeyManager {
    config: SealConfig,
    codec: FieldCodec,
    session: Arc<dyn KeyValueStore>,
    persistent: Arc<dyn KeyValueStore>,
    current: RwLock<Option<SessionKey>>,
}

impl KeyManager {
    pub fn new(
        config: SealConfig,
        session: Arc<dyn KeyValueStore>,
        persistent: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            codec: FieldCodec::new(config.accept_untagged),
            config,
            session,
            persistent,
            current: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    /// Derive the session key from `password` and the profile salt.
    ///
    /// Creates and persists the salt on first use. A stored salt that cannot
    /// be read is an error; it is never replaced.
    pub async fn initialize_from_password(&self, password: &SecretString) -> Result<()> {
        let salt = self.load_or_create_salt()?;
        let password = SecretString::new(password.expose_secret().to_owned());

        let key = tokio::task::spawn_blocking(move || {
            crypto::derive_key(password.expose_secret(), salt.as_bytes())
        })
        .await
        .map_err(|e| SealError::Worker(e.to_string()))??;

        self.install(key).await?;
        info!("session key derived from password");
        Ok(())
    }

    /// Reuse the exported key in session storage, or generate a random one.
    pub async fn initialize_from_random(&self) -> Result<()> {
        let key = match self.session.get(&self.config.session_key_name)? {
            Some(exported) => {
                debug!("reusing session key from session storage");
                SessionKey::import(&exported)?
            }
            None => {
                debug!("generating random session key");
                SessionKey::generate()?
            }
        };

        self.install(key).await?;
        info!("session key ready");
        Ok(())
    }

    async fn install(&self, key: SessionKey) -> Result<()> {
        self.session
            .set(&self.config.session_key_name, key.export().expose_secret())?;
        *self.current.write().await = Some(key);
        Ok(())
    }

    fn load_or_create_salt(&self) -> Result<Salt> {
        let name = &self.config.salt_key_name;
        if let Some(encoded) = self.persistent.get(name)? {
            return Ok(Salt::from_base64(&encoded)?);
        }

        let salt = generate_salt()?;
        self.persistent.set(name, &salt.to_base64())?;
        info!("created new profile salt");
        Ok(salt)
    }

    /// Current key, importing it from session storage if needed.
    ///
    /// `None` is a normal state (signed out, or never initialized).
    pub async fn current_key(&self) -> Option<SessionKey> {
        if let Some(key) = self.current.read().await.as_ref() {
            return Some(key.clone());
        }

        let exported = match self.session.get(&self.config.session_key_name) {
            Ok(exported) => exported?,
            Err(e) => {
                warn!(error = %e, "session storage unreadable, treating as signed out");
                return None;
            }
        };

        match SessionKey::import(&exported) {
            Ok(key) => {
                *self.current.write().await = Some(key.clone());
                Some(key)
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable session key");
                None
            }
        }
    }

    pub async fn has_key(&self) -> bool {
        self.current_key().await.is_some()
    }

    pub async fn state(&self) -> KeyState {
        if self.has_key().await {
            KeyState::Keyed
        } else {
            KeyState::NoKey
        }
    }

    /// Forget the session key. Call on every sign-out path.
    ///
    /// The in-memory key is dropped even when removing the stored copy fails;
    /// that failure is still returned.
    pub async fn clear_key(&self) -> Result<()> {
        self.current.write().await.take();
        self.session.remove(&self.config.session_key_name)?;
        info!("session key cleared");
        Ok(())
    }

    /// Key for one partition (room, topic, ...), or `None` without a session key
    pub async fn derive_for_partition(&self, label: &str) -> Option<SessionKey> {
        self.current_key()
            .await
            .map(|key| key.derive_partition(label))
    }

    async fn key_for(&self, partition: Option<&str>) -> Option<SessionKey> {
        match partition {
            Some(label) => self.derive_for_partition(label).await,
            None => self.current_key().await,
        }
    }

    fn without_key<T>(&self, passthrough: T) -> Result<T> {
        match self.config.fallback {
            FallbackPolicy::FailOpen => {
                debug!("no session key, writing plaintext");
                Ok(passthrough)
            }
            FallbackPolicy::FailClosed => Err(SealError::KeyUnavailable),
        }
    }

    /// Envelope under the session key, or `text` itself when there is no key
    /// and the policy is fail-open.
    pub async fn encrypt_if_available(&self, text: &str) -> Result<String> {
        self.encrypt_with(None, text).await
    }

    pub async fn encrypt_for_partition(&self, label: &str, text: &str) -> Result<String> {
        self.encrypt_with(Some(label), text).await
    }

    async fn encrypt_with(&self, partition: Option<&str>, text: &str) -> Result<String> {
        match self.key_for(partition).await {
            Some(key) => Ok(self.codec.encrypt_value(text, &key)?),
            None => self.without_key(text.to_string()),
        }
    }

    /// Plaintext if `value` opens under the session key, otherwise `value`.
    /// Never fails.
    pub async fn decrypt_if_available(&self, value: &str) -> String {
        self.decrypt_with(None, value).await
    }

    pub async fn decrypt_for_partition(&self, label: &str, value: &str) -> String {
        self.decrypt_with(Some(label), value).await
    }

    async fn decrypt_with(&self, partition: Option<&str>, value: &str) -> String {
        match self.key_for(partition).await {
            Some(key) => self.codec.decrypt_or_original(value, &key),
            None => value.to_string(),
        }
    }

    pub async fn encrypt_fields_if_available(
        &self,
        record: &Record,
        fields: &[&str],
        partition: Option<&str>,
    ) -> Result<Record> {
        match self.key_for(partition).await {
            Some(key) => Ok(self.codec.encrypt_fields(record, fields, &key)?),
            None => self.without_key(record.clone()),
        }
    }

    pub async fn decrypt_fields_if_available(
        &self,
        record: &Record,
        fields: &[&str],
        partition: Option<&str>,
    ) -> Record {
        match self.key_for(partition).await {
            Some(key) => self.codec.decrypt_fields(record, fields, &key),
            None => record.clone(),
        }
    }

    /// Seal a typed record under its partition key
    pub async fn seal_record<T: ProtectedRecord + Clone>(&self, record: &T) -> Result<T> {
        match self.key_for(record.partition()).await {
            Some(key) => records::seal_record(&self.codec, record, &key),
            None => self.without_key(record.clone()),
        }
    }

    /// Open a typed record under its partition key; unopenable fields stay sealed
    pub async fn open_record<T: ProtectedRecord + Clone>(&self, record: &T) -> Result<T> {
        match self.key_for(record.partition()).await {
            Some(key) => records::open_record(&self.codec, record, &key),
            None => Ok(record.clone()),
        }
    }
}
