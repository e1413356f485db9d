//! Cryptographic primitives for the diary core.
//!
//! Layered bottom-up:
//!
//! - **password**: master password buffer (zeroized on drop) and validation
//! - **key**: PBKDF2-HMAC-SHA256 key derivation with per-record salts
//! - **cipher**: one-shot AES-256-GCM authenticated encryption
//! - **stream**: the same GCM construction run incrementally, for payloads
//!   too large to buffer
//!
//! All per-operation state (salt, IV) is generated locally per call; nothing
//! here holds mutable state between operations.

pub mod cipher;
pub mod key;
pub mod password;
pub mod stream;

pub use cipher::{decrypt, encrypt, Iv, IV_SIZE, TAG_SIZE};
pub use key::{derive_key, DerivedKey, Salt, KEY_LENGTH, PBKDF2_ITERATIONS, SALT_SIZE};
pub use password::{validate_password, MasterPassword};
pub use stream::{encrypt_stream, DecryptingReader};
