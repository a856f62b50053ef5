//! Sealfield Core - session keys and protected fields
//!
//! The host application owns one `KeyManager` per signed-in session:
//! build it at sign-in, call `initialize_from_password` or
//! `initialize_from_random`, run records through the field helpers on every
//! write and read, and call `clear_key` on every sign-out path.

pub mod config;
pub mod error;
pub mod fields;
pub mod manager;
pub mod records;

pub use config::{FallbackPolicy, SealConfig};
pub use error::{Result, SealError};
pub use fields::{decrypt_fields, encrypt_fields, DecryptReport, FieldCodec, Record};
pub use manager::{KeyManager, KeyState};
pub use records::{open_record, seal_record, Comment, Message, Post, ProtectedRecord};

pub use sealfield_crypto::{CryptoError, SessionKey};
pub use sealfield_store::{KeyValueStore, StoreError};
