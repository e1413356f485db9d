//! Authenticated encryption using AES-256-GCM.
//!
//! A fresh random 12-byte IV is generated for every encryption; GCM requires
//! IVs never repeat under a given key. The 16-byte authentication tag is
//! appended to the ciphertext by the cipher, not framed separately. No
//! associated data (AAD) is used.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::crypto::key::DerivedKey;
use crate::error::{DiaryError, Result};

/// Size of a GCM initialization vector in bytes.
pub const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes (128 bits).
///
/// Part of the persisted record format; must not change.
pub const TAG_SIZE: usize = 16;

/// Per-encryption initialization vector (nonce).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generates a random IV.
    pub fn random() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates an IV from raw bytes.
    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the IV bytes.
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }
}

/// Encrypt plaintext under a derived key.
///
/// Generates a fresh random IV internally and returns it alongside the
/// ciphertext with the authentication tag appended.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> Result<(Iv, Vec<u8>)> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let iv = Iv::random();
    let nonce = Nonce::from_slice(iv.as_bytes());

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| DiaryError::Crypto(format!("Encryption failed: {}", e)))?;

    Ok((iv, ciphertext))
}

/// Decrypt ciphertext (with appended tag) under a derived key and IV.
///
/// # Errors
///
/// Returns `DiaryError::Authentication` when the tag does not verify:
/// wrong key (wrong password), tampered ciphertext, or mismatched IV. The
/// cipher never returns unauthenticated plaintext.
pub fn decrypt(key: &DerivedKey, iv: &Iv, ciphertext_with_tag: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(iv.as_bytes());

    cipher
        .decrypt(nonce, ciphertext_with_tag)
        .map_err(|_| DiaryError::Authentication)
}
