//! AES-256-GCM authenticated encryption
//!
//! Output layout: nonce || ciphertext || tag.
//! The nonce is prepended so we can decrypt without external state.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};

use crate::key::{fill_random, SessionKey};
use crate::{CryptoError, Result};

/// 96-bit nonce (12 bytes)
pub const NONCE_SIZE: usize = 12;
/// GCM authentication tag (16 bytes)
pub const TAG_SIZE: usize = 16;

fn aead_key(key: &SessionKey) -> Result<LessSafeKey> {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| CryptoError::InvalidKeyLength(key.as_bytes().len()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Generate a cryptographically secure random nonce
fn generate_nonce() -> Result<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(&mut nonce)?;
    Ok(nonce)
}

/// Encrypt plaintext under `key` with a fresh random nonce.
///
/// Returns: nonce || ciphertext || tag
pub fn seal(key: &SessionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = aead_key(key)?;
    let nonce_bytes = generate_nonce()?;

    let mut in_out = plaintext.to_vec();
    cipher
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CryptoError::Encryption)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + in_out.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&in_out);
    Ok(result)
}

/// Decrypt data produced by [`seal`].
///
/// Expects: nonce || ciphertext || tag
pub fn open(key: &SessionKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption(format!(
            "payload too short: {} bytes",
            sealed.len()
        )));
    }

    let cipher = aead_key(key)?;
    let (nonce_bytes, encrypted) = sealed.split_at(NONCE_SIZE);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| CryptoError::Decryption("bad nonce".into()))?;

    let mut in_out = encrypted.to_vec();
    let plaintext = cipher
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            CryptoError::Decryption("authentication failed - wrong key or tampered data".into())
        })?;

    Ok(plaintext.to_vec())
}
