//! # Diary Core
//!
//! Password-based encrypted storage core for a personal diary: text entries
//! and images, encrypted at rest under keys derived from a user master
//! password.
//!
//! The master password is the only credential. It is never persisted, in
//! plaintext or hashed form; every operation derives a fresh AES-256 key
//! from it via PBKDF2-HMAC-SHA256 (100,000 iterations) and a per-record
//! random salt. Records are self-contained
//! `[salt(16)][iv(12)][ciphertext||tag]` blobs, authenticated with
//! AES-256-GCM, so a successful decryption doubles as proof that the
//! password was correct. Verification works exactly that way: there is no
//! stored hash to attack.
//!
//! ## Architecture
//!
//! - **crypto**: key derivation, one-shot and streaming AES-GCM, password
//!   hygiene
//! - **storage**: record layout plus the entry store and image vault
//! - **vault**: the facade UI/platform code calls, including password
//!   verification
//!
//! All operations are synchronous and blocking; callers are expected to
//! invoke them off any interactive thread. The core holds no session state:
//! the caller keeps the password and passes it into each operation.

pub mod crypto;
pub mod error;
mod fs;
pub mod storage;
pub mod vault;

pub use crypto::password::MasterPassword;
pub use error::{DiaryError, Result};
pub use storage::{DiaryEntry, EntryStore, ImageVault, RecordId};
pub use vault::DiaryVault;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
