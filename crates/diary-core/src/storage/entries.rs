//! File-backed store for encrypted diary entries.
//!
//! One record per file, named `entry_<millis>.rec` after the creation
//! timestamp the record id encodes. Every save and update derives a fresh
//! key from a new random salt; nothing about the password is cached between
//! operations.
//!
//! Concurrency is the caller's responsibility: two concurrent operations on
//! the same record id must be serialized externally. Writes are atomic
//! (temp file plus rename), so a reader never observes a half-written
//! record, but there is no per-record locking here.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::crypto::password::MasterPassword;
use crate::error::{DiaryError, Result};
use crate::fs::write_atomic;
use crate::storage::record::{
    decode_payload, encode_payload, open_record, seal_record, DiaryEntry, EncryptedRecord,
};
use crate::storage::{list_record_ids, RecordId};

const ENTRY_PREFIX: &str = "entry_";
const ENTRY_EXT: &str = ".rec";

/// Store of encrypted diary entries in a directory.
///
/// Holds no mutable state; all per-operation state (salt, IV, derived key)
/// is generated locally per call.
pub struct EntryStore {
    dir: PathBuf,
}

impl EntryStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The directory records are kept in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: RecordId) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", ENTRY_PREFIX, id.timestamp_millis(), ENTRY_EXT))
    }

    /// Allocate a fresh id from the current time, bumping past collisions
    /// so two saves in the same millisecond get distinct records.
    ///
    /// The record file is claimed with an exclusive create, so concurrent
    /// saves (even from separate store instances) can never pick the same
    /// id and overwrite each other.
    fn allocate_id(&self) -> Result<RecordId> {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let id = RecordId::from_millis(millis);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.path_for(id))
            {
                Ok(_) => return Ok(id),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Encrypt and persist a new entry; returns its freshly allocated id.
    pub fn save_entry(&self, entry: &DiaryEntry, password: &MasterPassword) -> Result<RecordId> {
        let payload = encode_payload(entry)?;
        let record = seal_record(&payload, password)?;
        let id = self.allocate_id()?;
        let path = self.path_for(id);
        if let Err(e) = write_atomic(&path, &record.to_bytes()) {
            // Release the claimed filename rather than leave an empty record.
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(id)
    }

    /// Load and decrypt an entry.
    ///
    /// Returns `Ok(None)` when the record is missing, fails authentication
    /// (wrong password or tampering), or decrypts to an invalid payload.
    /// The caller decides whether that means "wrong password" or "corrupt
    /// data". I/O errors propagate.
    pub fn load_entry(
        &self,
        id: RecordId,
        password: &MasterPassword,
    ) -> Result<Option<DiaryEntry>> {
        let bytes = match fs::read(self.path_for(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match decrypt_entry(&bytes, password) {
            Ok(entry) => Ok(Some(entry)),
            Err(
                DiaryError::Authentication
                | DiaryError::MalformedRecord(_)
                | DiaryError::PayloadDecode(_),
            ) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Re-encrypt an existing entry with new content.
    ///
    /// Always a fresh encryption: new random salt and IV, never a reuse of
    /// the record's previous ones. The record file is replaced atomically.
    ///
    /// # Errors
    ///
    /// Returns `DiaryError::RecordNotFound` if the id does not exist.
    pub fn update_entry(
        &self,
        id: RecordId,
        entry: &DiaryEntry,
        password: &MasterPassword,
    ) -> Result<()> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(DiaryError::RecordNotFound(id.to_string()));
        }

        let payload = encode_payload(entry)?;
        let record = seal_record(&payload, password)?;
        write_atomic(&path, &record.to_bytes())?;
        Ok(())
    }

    /// Delete an entry. Deleting a nonexistent id is not an error.
    pub fn delete_entry(&self, id: RecordId) -> Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every entry in the store.
    pub fn delete_all(&self) -> Result<()> {
        for id in self.list_entries()? {
            self.delete_entry(id)?;
        }
        Ok(())
    }

    /// Enumerate entry ids, newest first.
    pub fn list_entries(&self) -> Result<Vec<RecordId>> {
        list_record_ids(&self.dir, ENTRY_PREFIX, ENTRY_EXT)
    }
}

fn decrypt_entry(bytes: &[u8], password: &MasterPassword) -> Result<DiaryEntry> {
    let record = EncryptedRecord::from_bytes(bytes)?;
    let plaintext = open_record(&record, password)?;
    decode_payload(&plaintext)
}
