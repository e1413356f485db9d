//! The diary vault: the surface UI/platform code talks to.
//!
//! An injectable, constructible service (no global state) that owns an
//! entry store and an image vault over a shared root directory and adds
//! password verification on top. The UI layer owns the password itself:
//! collecting it, holding it for the session, and locking. This type only
//! ever borrows it per operation.

use std::path::Path;

use crate::crypto::password::{validate_password, MasterPassword};
use crate::error::Result;
use crate::storage::{EntryStore, ImageVault};

/// Password-protected diary storage: entries, images, and verification.
pub struct DiaryVault {
    entries: EntryStore,
    images: ImageVault,
}

impl DiaryVault {
    /// Open a vault rooted at `root`, creating the directory if needed.
    ///
    /// Entry and image records share the directory and are told apart by
    /// filename prefix.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        Ok(Self {
            entries: EntryStore::open(root)?,
            images: ImageVault::open(root)?,
        })
    }

    /// Accept a new master password at first-use setup.
    ///
    /// Only validates strength; nothing is persisted. The password becomes
    /// verifiable the moment the first record is saved under it, since
    /// there is no stored hash to check against.
    pub fn setup(&self, password: &MasterPassword) -> Result<()> {
        validate_password(password)
    }

    /// Check a candidate password against the vault at unlock time.
    pub fn unlock(&self, password: &MasterPassword) -> Result<bool> {
        self.verify(password)
    }

    /// Determine whether `password` is the correct master password.
    ///
    /// Attempts to decrypt a probe record, the most recently created diary
    /// entry. Successful authenticated decryption proves the password was
    /// correct for that record; any failure (tag mismatch or undecodable
    /// payload) counts as incorrect, and the two are deliberately not
    /// distinguished here.
    ///
    /// With no records at all, verification trivially succeeds: nothing can
    /// contradict the candidate password, and the user must not be locked
    /// out before any data exists. Deliberate first-use policy, not an
    /// oversight.
    pub fn verify(&self, password: &MasterPassword) -> Result<bool> {
        let ids = self.entries.list_entries()?;
        let Some(probe) = ids.first() else {
            return Ok(true);
        };
        Ok(self.entries.load_entry(*probe, password)?.is_some())
    }

    /// The diary entry store.
    pub fn entries(&self) -> &EntryStore {
        &self.entries
    }

    /// The image vault.
    pub fn images(&self) -> &ImageVault {
        &self.images
    }

    /// Wipe all entries and images.
    pub fn delete_all(&self) -> Result<()> {
        self.entries.delete_all()?;
        self.images.delete_all()
    }
}
