//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! Every record carries its own random salt, so two entries saved under the
//! same password encrypt under unrelated keys. Keys are ephemeral: they are
//! recomputed on every operation from the in-memory password plus the
//! record's stored salt, and never persisted.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::crypto::password::MasterPassword;
use crate::error::{DiaryError, Result};

/// Size of a key-derivation salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Length of derived keys in bytes (256 bits for AES-256-GCM).
pub const KEY_LENGTH: usize = 32;

/// PBKDF2 iteration count.
///
/// Deliberately slow (tens of milliseconds) as a brute-force deterrent.
/// This constant is part of the persisted record format: changing it makes
/// previously written records permanently undecryptable.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Random salt mixed into key derivation.
///
/// Generated fresh for every encryption and stored alongside the record;
/// never reused across two ciphertexts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt {
    bytes: [u8; SALT_SIZE],
}

impl Salt {
    /// Generates a random salt.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a salt from raw bytes.
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.bytes
    }
}

/// A symmetric key derived from the master password.
///
/// This type ensures that key material is securely zeroized from memory
/// when dropped, reducing the window of exposure.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only for immediate
    /// encryption operations.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive an encryption key from the master password using PBKDF2-HMAC-SHA256.
///
/// # Security
///
/// - Same password + salt always produces the same key (deterministic);
///   this is what makes round-trip decryption possible.
/// - Different salt produces an unrelated key.
/// - 100,000 iterations make brute-force attacks computationally expensive.
///
/// # Errors
///
/// Returns `DiaryError::InvalidInput` if the password is empty. Salt length
/// is fixed by the `Salt` type.
pub fn derive_key(password: &MasterPassword, salt: &Salt) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(DiaryError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut key_bytes,
    );

    Ok(DerivedKey::from_bytes(key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation_deterministic() {
        let password = MasterPassword::from("test-password");
        let salt = Salt::from_bytes(*b"unique-salt-0016");

        let key1 = derive_key(&password, &salt).unwrap();
        let key2 = derive_key(&password, &salt).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let password = MasterPassword::from("test-password");
        let salt1 = Salt::from_bytes(*b"salt-one-0000016");
        let salt2 = Salt::from_bytes(*b"salt-two-0000016");

        let key1 = derive_key(&password, &salt1).unwrap();
        let key2 = derive_key(&password, &salt2).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_password_different_key() {
        let salt = Salt::from_bytes(*b"fixed-salt-00016");

        let key1 = derive_key(&MasterPassword::from("password-one"), &salt).unwrap();
        let key2 = derive_key(&MasterPassword::from("password-two"), &salt).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_password_rejected() {
        let salt = Salt::from_bytes(*b"fixed-salt-00016");
        let result = derive_key(&MasterPassword::from(""), &salt);
        assert!(result.is_err());
    }

    #[test]
    fn test_key_length() {
        let password = MasterPassword::from("test-password");
        let key = derive_key(&password, &Salt::random()).unwrap();
        assert_eq!(key.as_bytes().len(), KEY_LENGTH);
    }

    #[test]
    fn test_random_salts_unique() {
        let salt1 = Salt::random();
        let salt2 = Salt::random();
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_derived_key_debug_redacts() {
        let password = MasterPassword::from("test-password");
        let key = derive_key(&password, &Salt::random()).unwrap();

        let debug_output = format!("{:?}", key);
        assert!(debug_output.contains("REDACTED"));

        let key_hex = hex::encode(&key.as_bytes()[..4]);
        assert!(!debug_output.contains(&key_hex));
    }
}
