//! Text envelope format for protected fields
//!
//! An envelope is a single string that is safe in any text column:
//!
//! ```text
//! ENC:<base64(nonce || ciphertext || tag)>           key supplied by caller
//! ENCP:<base64(salt || nonce || ciphertext || tag)>  key derived from a password
//! ```
//!
//! The prefix lets readers tell protected values from plaintext without
//! touching any key. `ENCP:` envelopes are bound to KDF version 1.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::cipher::{open, seal, NONCE_SIZE, TAG_SIZE};
use crate::kdf::derive_key;
use crate::key::{generate_salt, SessionKey, SALT_SIZE};
use crate::{CryptoError, Result};

/// Prefix of envelopes sealed with a caller-supplied key
pub const ENVELOPE_PREFIX: &str = "ENC:";
/// Prefix of envelopes sealed with a password and an embedded salt
pub const PASSWORD_ENVELOPE_PREFIX: &str = "ENCP:";

/// A parsed envelope, payload already base64-decoded
#[derive(Debug, Clone, PartialEq, Eq)]
enum Envelope {
    Keyed { sealed: Vec<u8> },
    Password { salt: Vec<u8>, sealed: Vec<u8> },
}

impl Envelope {
    fn parse(value: &str) -> Result<Self> {
        if let Some(body) = value.strip_prefix(PASSWORD_ENVELOPE_PREFIX) {
            let mut payload = decode_payload(body)?;
            if payload.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
                return Err(CryptoError::Decryption("password envelope too short".into()));
            }
            let sealed = payload.split_off(SALT_SIZE);
            return Ok(Envelope::Password { salt: payload, sealed });
        }
        if let Some(body) = value.strip_prefix(ENVELOPE_PREFIX) {
            return Ok(Envelope::Keyed { sealed: decode_payload(body)? });
        }
        Err(CryptoError::Decryption("value is not an envelope".into()))
    }

    fn encode(&self) -> String {
        match self {
            Envelope::Keyed { sealed } => format!("{ENVELOPE_PREFIX}{}", STANDARD.encode(sealed)),
            Envelope::Password { salt, sealed } => {
                let mut payload = Vec::with_capacity(salt.len() + sealed.len());
                payload.extend_from_slice(salt);
                payload.extend_from_slice(sealed);
                format!("{PASSWORD_ENVELOPE_PREFIX}{}", STANDARD.encode(payload))
            }
        }
    }
}

fn decode_payload(body: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(body)
        .map_err(|e| CryptoError::Decryption(format!("malformed envelope encoding: {e}")))
}

fn utf8(plaintext: Vec<u8>) -> Result<String> {
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".into()))
}

/// True if `value` looks like an envelope. Prefix check only, no crypto.
pub fn is_protected(value: &str) -> bool {
    value.starts_with(ENVELOPE_PREFIX) || value.starts_with(PASSWORD_ENVELOPE_PREFIX)
}

/// Encrypt `plaintext` under `key` into an `ENC:` envelope
pub fn encrypt(plaintext: &str, key: &SessionKey) -> Result<String> {
    let sealed = seal(key, plaintext.as_bytes())?;
    Ok(Envelope::Keyed { sealed }.encode())
}

/// Decrypt an `ENC:` envelope produced by [`encrypt`]
pub fn decrypt(envelope: &str, key: &SessionKey) -> Result<String> {
    match Envelope::parse(envelope)? {
        Envelope::Keyed { sealed } => utf8(open(key, &sealed)?),
        Envelope::Password { .. } => Err(CryptoError::Decryption(
            "password envelope cannot be opened with a session key".into(),
        )),
    }
}

/// Encrypt with a key derived from `password` and a fresh per-value salt.
///
/// Runs PBKDF2, so this is slow on purpose.
pub fn encrypt_with_password(plaintext: &str, password: &str) -> Result<String> {
    let salt = generate_salt()?;
    let key = derive_key(password, salt.as_bytes())?;
    let sealed = seal(&key, plaintext.as_bytes())?;
    Ok(Envelope::Password {
        salt: salt.as_bytes().to_vec(),
        sealed,
    }
    .encode())
}

/// Decrypt an `ENCP:` envelope produced by [`encrypt_with_password`]
pub fn decrypt_with_password(envelope: &str, password: &str) -> Result<String> {
    match Envelope::parse(envelope)? {
        Envelope::Password { salt, sealed } => {
            let key = derive_key(password, &salt)?;
            utf8(open(&key, &sealed)?)
        }
        Envelope::Keyed { .. } => Err(CryptoError::Decryption(
            "keyed envelope cannot be opened with a password".into(),
        )),
    }
}

/// Decrypt a bare base64 `nonce || ciphertext || tag` value with no prefix.
///
/// Rows written before envelopes carried a prefix look like this.
pub fn decrypt_untagged(value: &str, key: &SessionKey) -> Result<String> {
    let sealed = decode_payload(value)?;
    utf8(open(key, &sealed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_end_to_end_password_derived_key() {
        let key = derive_key("correct horse", b"fixed-salt-16byt").unwrap();

        let envelope = encrypt("hello world", &key).unwrap();
        assert!(envelope.starts_with(ENVELOPE_PREFIX));
        assert_ne!(envelope, "hello world");
        assert!(is_protected(&envelope));

        assert_eq!(decrypt(&envelope, &key).unwrap(), "hello world");
    }

    #[test]
    fn test_same_plaintext_gives_different_envelopes() {
        let key = SessionKey::generate().unwrap();
        let a = encrypt("same text", &key).unwrap();
        let b = encrypt("same text", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_is_decryption_error() {
        let k1 = SessionKey::generate().unwrap();
        let k2 = SessionKey::generate().unwrap();
        let envelope = encrypt("private", &k1).unwrap();
        assert!(matches!(decrypt(&envelope, &k2), Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_any_character_change_is_rejected() {
        let key = SessionKey::generate().unwrap();
        let envelope = encrypt("tamper with me", &key).unwrap();

        for (i, c) in envelope.char_indices() {
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut tampered = envelope.clone();
            tampered.replace_range(i..i + c.len_utf8(), &replacement.to_string());
            assert!(decrypt(&tampered, &key).is_err(), "change at {i} went unnoticed");
        }
    }

    #[test]
    fn test_malformed_envelopes() {
        let key = SessionKey::generate().unwrap();
        assert!(decrypt("plain text", &key).is_err());
        assert!(decrypt("ENC:", &key).is_err());
        assert!(decrypt("ENC:%%%not-base64%%%", &key).is_err());
        assert!(decrypt("ENC:AAAA", &key).is_err());
    }

    #[test]
    fn test_is_protected_is_prefix_only() {
        assert!(is_protected("ENC:garbage"));
        assert!(is_protected("ENCP:garbage"));
        assert!(!is_protected("hello"));
        assert!(!is_protected("enc:lowercase"));
        assert!(!is_protected(""));
    }

    #[test]
    fn test_password_envelope_roundtrip() {
        let envelope = encrypt_with_password("diary entry", "hunter2").unwrap();
        assert!(envelope.starts_with(PASSWORD_ENVELOPE_PREFIX));
        assert_eq!(decrypt_with_password(&envelope, "hunter2").unwrap(), "diary entry");
        assert!(decrypt_with_password(&envelope, "hunter3").is_err());
    }

    #[test]
    fn test_password_envelopes_embed_fresh_salts() {
        let a = encrypt_with_password("x", "pw").unwrap();
        let b = encrypt_with_password("x", "pw").unwrap();
        let payload_a = STANDARD.decode(&a[PASSWORD_ENVELOPE_PREFIX.len()..]).unwrap();
        let payload_b = STANDARD.decode(&b[PASSWORD_ENVELOPE_PREFIX.len()..]).unwrap();
        assert_ne!(payload_a[..SALT_SIZE], payload_b[..SALT_SIZE]);
    }

    #[test]
    fn test_variants_do_not_cross() {
        let key = SessionKey::generate().unwrap();
        let keyed = encrypt("a", &key).unwrap();
        assert!(decrypt_with_password(&keyed, "pw").is_err());

        let by_password = encrypt_with_password("a", "pw").unwrap();
        assert!(decrypt(&by_password, &key).is_err());
    }

    #[test]
    fn test_untagged_legacy_values() {
        let key = SessionKey::generate().unwrap();
        let envelope = encrypt("old row", &key).unwrap();
        let bare = envelope.strip_prefix(ENVELOPE_PREFIX).unwrap();

        assert_eq!(decrypt_untagged(bare, &key).unwrap(), "old row");
        assert!(decrypt_untagged("just some words", &key).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip(text in ".*", raw in any::<[u8; 32]>()) {
            let key = SessionKey::from_bytes(raw);
            let envelope = encrypt(&text, &key).unwrap();
            prop_assert_eq!(decrypt(&envelope, &key).unwrap(), text);
        }
    }
}
