//! Encrypt / decrypt named fields of a record
//!
//! Each field is handled on its own. A field that fails to decrypt keeps its
//! stored value and the rest of the record still opens. Absent, null and
//! non-string fields are left alone, as is everything not named.

use sealfield_crypto::{self as crypto, CryptoError, SessionKey};
use serde_json::{Map, Value};

/// A record as it comes back from the remote store
pub type Record = Map<String, Value>;

/// Result of a decryption pass that reports failures instead of hiding them
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptReport {
    pub record: Record,
    /// Fields that held an envelope this key could not open
    pub failed: Vec<String>,
}

/// Stateless single-value and per-field encryption
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldCodec {
    /// Also try prefix-less base64 values written by older clients
    pub accept_untagged: bool,
}

impl FieldCodec {
    pub fn new(accept_untagged: bool) -> Self {
        Self { accept_untagged }
    }

    /// Envelope for `plaintext`.
    ///
    /// Only an envelope that opens under `key` passes through unchanged. Text
    /// that merely starts with a prefix is user data and gets encrypted.
    pub fn encrypt_value(&self, plaintext: &str, key: &SessionKey) -> Result<String, CryptoError> {
        if crypto::is_protected(plaintext) && crypto::decrypt(plaintext, key).is_ok() {
            return Ok(plaintext.to_string());
        }
        crypto::encrypt(plaintext, key)
    }

    /// `Ok(None)` means the value is plaintext and should be shown as is.
    pub fn decrypt_value(
        &self,
        value: &str,
        key: &SessionKey,
    ) -> Result<Option<String>, CryptoError> {
        if crypto::is_protected(value) {
            return crypto::decrypt(value, key).map(Some);
        }
        if self.accept_untagged {
            // Ordinary text fails here too; only a verified tag counts.
            if let Ok(plaintext) = crypto::decrypt_untagged(value, key) {
                return Ok(Some(plaintext));
            }
        }
        Ok(None)
    }

    /// Decrypted text, or `value` unchanged if it cannot be decrypted
    pub fn decrypt_or_original(&self, value: &str, key: &SessionKey) -> String {
        match self.decrypt_value(value, key) {
            Ok(Some(plaintext)) => plaintext,
            Ok(None) => value.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to decrypt value, returning original");
                value.to_string()
            }
        }
    }

    pub fn encrypt_fields(
        &self,
        record: &Record,
        fields: &[&str],
        key: &SessionKey,
    ) -> Result<Record, CryptoError> {
        let mut out = record.clone();
        for field in fields {
            if let Some(Value::String(text)) = out.get_mut(*field) {
                *text = self.encrypt_value(text, key)?;
            }
        }
        Ok(out)
    }

    pub fn decrypt_fields(&self, record: &Record, fields: &[&str], key: &SessionKey) -> Record {
        self.decrypt_fields_report(record, fields, key).record
    }

    pub fn decrypt_fields_report(
        &self,
        record: &Record,
        fields: &[&str],
        key: &SessionKey,
    ) -> DecryptReport {
        let mut out = record.clone();
        let mut failed = Vec::new();

        for field in fields {
            let Some(Value::String(stored)) = out.get_mut(*field) else {
                continue;
            };
            match self.decrypt_value(stored, key) {
                Ok(Some(plaintext)) => *stored = plaintext,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(field = *field, error = %e, "failed to decrypt field, keeping stored value");
                    failed.push(field.to_string());
                }
            }
        }

        DecryptReport {
            record: out,
            failed,
        }
    }
}

/// [`FieldCodec::encrypt_fields`] with the default codec
pub fn encrypt_fields(
    record: &Record,
    fields: &[&str],
    key: &SessionKey,
) -> Result<Record, CryptoError> {
    FieldCodec::default().encrypt_fields(record, fields, key)
}

/// [`FieldCodec::decrypt_fields`] with the default codec
pub fn decrypt_fields(record: &Record, fields: &[&str], key: &SessionKey) -> Record {
    FieldCodec::default().decrypt_fields(record, fields, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_encrypt_then_decrypt_named_fields() {
        let key = SessionKey::generate().unwrap();
        let post = record(json!({
            "id": "p-1",
            "title": "Weekend plans",
            "content": "Hiking on Saturday",
            "vote_score": 3
        }));

        let sealed = encrypt_fields(&post, &["title", "content"], &key).unwrap();
        assert_eq!(sealed["id"], json!("p-1"));
        assert_eq!(sealed["vote_score"], json!(3));
        assert!(crypto::is_protected(sealed["title"].as_str().unwrap()));
        assert!(crypto::is_protected(sealed["content"].as_str().unwrap()));

        assert_eq!(decrypt_fields(&sealed, &["title", "content"], &key), post);
    }

    #[test]
    fn test_absent_null_and_non_string_fields_untouched() {
        let key = SessionKey::generate().unwrap();
        let comment = record(json!({
            "content": null,
            "flags": ["pinned"],
            "count": 2
        }));

        let sealed = encrypt_fields(&comment, &["content", "flags", "count", "missing"], &key).unwrap();
        assert_eq!(sealed, comment);
        assert!(!sealed.contains_key("missing"));
    }

    #[test]
    fn test_field_isolation_on_decrypt() {
        let key = SessionKey::generate().unwrap();
        let valid = crypto::encrypt("readable", &key).unwrap();
        let corrupt = "ENC:bm90IGEgcmVhbCBlbnZlbG9wZSBhdCBhbGw=".to_string();
        let stored = record(json!({ "a": valid, "b": corrupt.clone() }));

        let report = FieldCodec::default().decrypt_fields_report(&stored, &["a", "b"], &key);
        assert_eq!(report.record["a"], json!("readable"));
        assert_eq!(report.record["b"], json!(corrupt));
        assert_eq!(report.failed, vec!["b".to_string()]);
    }

    #[test]
    fn test_prefix_lookalike_plaintext_is_encrypted() {
        let key = SessionKey::generate().unwrap();
        let codec = FieldCodec::default();

        for text in ["ENC: my pin is 4711", "ENCP:hunter2", "ENC:"] {
            let sealed = codec.encrypt_value(text, &key).unwrap();
            assert_ne!(sealed, text);
            assert!(crypto::is_protected(&sealed));
            assert_eq!(crypto::decrypt(&sealed, &key).unwrap(), text);
        }
    }

    #[test]
    fn test_own_envelope_not_reencrypted() {
        let key = SessionKey::generate().unwrap();
        let codec = FieldCodec::default();
        let once = codec.encrypt_value("x", &key).unwrap();
        assert_eq!(codec.encrypt_value(&once, &key).unwrap(), once);

        // Someone else's envelope is opaque text here, so it is sealed again
        let other = SessionKey::generate().unwrap();
        let twice = codec.encrypt_value(&once, &other).unwrap();
        assert_ne!(twice, once);
        assert_eq!(crypto::decrypt(&twice, &other).unwrap(), once);
    }

    #[test]
    fn test_plaintext_fields_pass_through_decrypt() {
        let key = SessionKey::generate().unwrap();
        let stored = record(json!({ "title": "written before encryption was on" }));
        assert_eq!(decrypt_fields(&stored, &["title"], &key), stored);
    }

    #[test]
    fn test_untagged_values_only_with_opt_in() {
        let key = SessionKey::generate().unwrap();
        let envelope = crypto::encrypt("legacy", &key).unwrap();
        let bare = envelope.trim_start_matches(crypto::ENVELOPE_PREFIX);

        assert_eq!(FieldCodec::new(false).decrypt_or_original(bare, &key), bare);
        assert_eq!(FieldCodec::new(true).decrypt_or_original(bare, &key), "legacy");
        assert_eq!(FieldCodec::new(true).decrypt_or_original("plain words", &key), "plain words");
    }
}
