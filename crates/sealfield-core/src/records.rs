//! Forum record types and which of their fields are protected
//!
//! Ids, authorship, partition ids and timestamps stay readable so the
//! remote store can still filter, join and order rows.

use chrono::{DateTime, Utc};
use sealfield_crypto::SessionKey;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::fields::{FieldCodec, Record};
use crate::{Result, SealError};

/// A record type with a fixed set of encrypted text fields
pub trait ProtectedRecord: Serialize + DeserializeOwned {
    const PROTECTED_FIELDS: &'static [&'static str];

    /// Partition whose derived key seals this record, if any
    fn partition(&self) -> Option<&str> {
        None
    }
}

/// A post inside a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub topic_id: String,
    pub author_id: String,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProtectedRecord for Post {
    const PROTECTED_FIELDS: &'static [&'static str] = &["title", "content"];

    fn partition(&self) -> Option<&str> {
        Some(self.topic_id.as_str())
    }
}

/// A comment on a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ProtectedRecord for Comment {
    const PROTECTED_FIELDS: &'static [&'static str] = &["content"];

    fn partition(&self) -> Option<&str> {
        Some(self.post_id.as_str())
    }
}

/// A chat message in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ProtectedRecord for Message {
    const PROTECTED_FIELDS: &'static [&'static str] = &["content"];

    fn partition(&self) -> Option<&str> {
        Some(self.room_id.as_str())
    }
}

fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(SealError::Config(format!(
            "protected record must serialize to an object, got {other}"
        ))),
    }
}

/// Encrypt the protected fields of `record` with `key` as given
pub fn seal_record<T: ProtectedRecord>(
    codec: &FieldCodec,
    record: &T,
    key: &SessionKey,
) -> Result<T> {
    let sealed = codec.encrypt_fields(&to_record(record)?, T::PROTECTED_FIELDS, key)?;
    Ok(serde_json::from_value(serde_json::Value::Object(sealed))?)
}

/// Decrypt the protected fields of `record`; fields that fail stay as stored
pub fn open_record<T: ProtectedRecord>(
    codec: &FieldCodec,
    record: &T,
    key: &SessionKey,
) -> Result<T> {
    let opened = codec.decrypt_fields(&to_record(record)?, T::PROTECTED_FIELDS, key);
    Ok(serde_json::from_value(serde_json::Value::Object(opened))?)
}
