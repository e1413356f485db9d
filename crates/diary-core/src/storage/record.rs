//! Encrypted record layout and entry payload codec.
//!
//! Every persisted unit uses the same self-contained byte layout, with no
//! length prefixes (all header fields are fixed-size):
//!
//! ```text
//! offset 0..16  : salt                (16 bytes)
//! offset 16..28 : iv                  (12 bytes)
//! offset 28..end: ciphertext || tag   (GCM tag is the trailing 16 bytes)
//! ```
//!
//! Successful authenticated decryption of a record under the key derived
//! from (password, record.salt) is proof the password was correct for that
//! record; password verification is built on exactly this property.

use serde::{Deserialize, Serialize};

use crate::crypto::cipher::{self, Iv, IV_SIZE};
use crate::crypto::key::{derive_key, Salt, SALT_SIZE};
use crate::crypto::password::MasterPassword;
use crate::error::{DiaryError, Result};

/// Size of the salt + IV header preceding the ciphertext.
pub const HEADER_SIZE: usize = SALT_SIZE + IV_SIZE;

/// The atomic persisted unit: salt, IV, and tagged ciphertext.
#[derive(Clone, Debug)]
pub struct EncryptedRecord {
    pub salt: Salt,
    pub iv: Iv,
    /// Ciphertext with the 16-byte GCM tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedRecord {
    /// Serialize to the on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(self.salt.as_bytes());
        bytes.extend_from_slice(self.iv.as_bytes());
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse from the on-disk layout, splitting at the fixed offsets.
    ///
    /// # Errors
    ///
    /// Returns `DiaryError::MalformedRecord` when the input is shorter than
    /// the 28-byte header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(DiaryError::MalformedRecord(format!(
                "record too short ({} bytes, need at least {})",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&bytes[SALT_SIZE..HEADER_SIZE]);

        Ok(Self {
            salt: Salt::from_bytes(salt),
            iv: Iv::from_bytes(iv),
            ciphertext: bytes[HEADER_SIZE..].to_vec(),
        })
    }
}

/// A decrypted diary entry: title and content (plain text or rich text).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub title: String,
    pub content: String,
}

impl DiaryEntry {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Encode an entry payload to bytes for encryption.
pub fn encode_payload(entry: &DiaryEntry) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(entry)?)
}

/// Decode a decrypted payload back into an entry.
///
/// # Errors
///
/// Returns `DiaryError::PayloadDecode` when the plaintext is not valid
/// entry JSON. Distinct from an authentication failure: decryption already
/// succeeded, the content just isn't an entry. Should not happen for
/// records written by this crate, but corrupt-yet-authentic data must not
/// crash the caller.
pub fn decode_payload(bytes: &[u8]) -> Result<DiaryEntry> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encrypt a plaintext payload into a fresh record.
///
/// Generates a new random salt and IV; derivation is never cached or
/// reused across records.
pub fn seal_record(plaintext: &[u8], password: &MasterPassword) -> Result<EncryptedRecord> {
    let salt = Salt::random();
    let key = derive_key(password, &salt)?;
    let (iv, ciphertext) = cipher::encrypt(&key, plaintext)?;

    Ok(EncryptedRecord {
        salt,
        iv,
        ciphertext,
    })
}

/// Decrypt a record's payload.
///
/// # Errors
///
/// Returns `DiaryError::Authentication` for a wrong password or tampered
/// ciphertext.
pub fn open_record(record: &EncryptedRecord, password: &MasterPassword) -> Result<Vec<u8>> {
    let key = derive_key(password, &record.salt)?;
    cipher::decrypt(&key, &record.iv, &record.ciphertext)
}

/// Seal opaque secret bytes into a self-contained `[salt][iv][ct||tag]` blob.
///
/// Used for secrets that travel outside the store (for example values
/// destined for short-range wireless tag transfer). The blob carries
/// everything needed to open it again with the master password.
pub fn seal_secret(secret: &[u8], password: &MasterPassword) -> Result<Vec<u8>> {
    Ok(seal_record(secret, password)?.to_bytes())
}

/// Open a sealed secret blob.
///
/// Returns `None` when the blob is malformed or fails authentication
/// (wrong password or tampering); the caller cannot distinguish the two,
/// matching the store's null-on-failure contract.
pub fn open_secret(blob: &[u8], password: &MasterPassword) -> Option<Vec<u8>> {
    let record = EncryptedRecord::from_bytes(blob).ok()?;
    open_record(&record, password).ok()
}
