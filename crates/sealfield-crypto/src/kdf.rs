//! Key derivation
//!
//! - PBKDF2-HMAC-SHA256 turns a password + profile salt into a `SessionKey`
//! - HMAC-SHA256 turns a session key + label into a partition key
//!
//! `PBKDF2_ITERATIONS` is part of the stored data format. Every `ENCP:`
//! envelope and every profile salt already written assumes this count, so a
//! change needs a new `KDF_VERSION` and a new envelope prefix.

use std::num::NonZeroU32;

use ring::{hmac, pbkdf2};
use zeroize::Zeroizing;

use crate::key::{SessionKey, KEY_SIZE};
use crate::{CryptoError, Result};

/// PBKDF2 iteration count for KDF version 1
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Version of the password KDF parameters above
pub const KDF_VERSION: u8 = 1;

/// Domain separation for partition keys
const PARTITION_CONTEXT: &[u8] = b"sealfield:partition:";

/// Derive a session key from a password and salt.
///
/// Same `(password, salt)` always yields the same key.
pub fn derive_key(password: &str, salt: &[u8]) -> Result<SessionKey> {
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("salt must not be empty".into()));
    }
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| CryptoError::KeyDerivation("iteration count must be non-zero".into()))?;

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password.as_bytes(),
        &mut key[..],
    );
    Ok(SessionKey::from_zeroizing(key))
}

/// HMAC-SHA256(key, context || label)
pub(crate) fn partition_key(key: &SessionKey, label: &str) -> SessionKey {
    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
    let mut ctx = hmac::Context::with_key(&mac_key);
    ctx.update(PARTITION_CONTEXT);
    ctx.update(label.as_bytes());
    let tag = ctx.sign();

    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    out.copy_from_slice(tag.as_ref());
    SessionKey::from_zeroizing(out)
}
