//! Master password handling and validation.
//!
//! The master password is held only in process memory, as a mutable byte
//! buffer that is zeroized when dropped. It is never persisted, neither in
//! plaintext nor as a reversible hash; every crypto operation re-derives its
//! key from this value plus a per-record salt.

use zeroize::Zeroizing;

use crate::error::{DiaryError, Result};

/// Minimum password length in bytes.
const MIN_PASSWORD_LENGTH: usize = 8;

/// The user's master password, zeroized on drop.
///
/// Constructed from whatever the UI layer collected (manual entry or a
/// device-credential-gated unwrap) and passed by reference into every
/// crypto operation for the duration of a session.
pub struct MasterPassword {
    bytes: Zeroizing<Vec<u8>>,
}

impl MasterPassword {
    /// Take ownership of a password byte buffer.
    ///
    /// The buffer is zeroized when the `MasterPassword` is dropped.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Get the raw password bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only as immediate input to
    /// key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the password in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&str> for MasterPassword {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<String> for MasterPassword {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl std::fmt::Debug for MasterPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterPassword")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Validate that a password meets minimum security requirements.
///
/// # Requirements
///
/// - At least 8 bytes long
/// - Not empty or only whitespace
///
/// # Returns
///
/// Returns `Ok(())` if valid, or `DiaryError::InvalidInput` with explanation.
pub fn validate_password(password: &MasterPassword) -> Result<()> {
    if password.is_empty() || password.as_bytes().iter().all(|b| b.is_ascii_whitespace()) {
        return Err(DiaryError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(DiaryError::InvalidInput(format!(
            "Password must be at least {} characters (got {})",
            MIN_PASSWORD_LENGTH,
            password.len()
        )));
    }

    Ok(())
}
