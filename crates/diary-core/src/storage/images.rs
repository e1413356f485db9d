//! Streaming store for encrypted image blobs.
//!
//! Same record shape as the entry store (`[salt][iv][ciphertext||tag]`,
//! one file per record, `vault_<millis>.enc`) but payloads are streamed:
//! images can be large, and buffering them whole would defeat the point.
//! Saving copies the source reader through the streaming cipher into the
//! record file; reading hands back a decrypting reader that verifies the
//! authentication tag at end of stream.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::crypto::cipher::{Iv, IV_SIZE};
use crate::crypto::key::{derive_key, Salt, SALT_SIZE};
use crate::crypto::password::MasterPassword;
use crate::crypto::stream::{encrypt_stream, DecryptingReader};
use crate::error::{DiaryError, Result};
use crate::fs::{rename_with_fallback, temp_path_for};
use crate::storage::{list_record_ids, RecordId};

const IMAGE_PREFIX: &str = "vault_";
const IMAGE_EXT: &str = ".enc";

/// Streaming decryptor over a stored image record.
pub type ImageReader = DecryptingReader<File>;

/// Store of encrypted images in a directory.
pub struct ImageVault {
    dir: PathBuf,
}

impl ImageVault {
    /// Open a vault rooted at `dir`, creating the directory if needed.
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
            .join(format!("{}{}{}", IMAGE_PREFIX, id.timestamp_millis(), IMAGE_EXT))
    }

    /// Allocate a fresh id by exclusively claiming its record file; see
    /// `EntryStore::allocate_id`.
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

    /// Encrypt `source` into a new image record; returns its id.
    ///
    /// Writes the salt and IV header, then streams ciphertext chunk by
    /// chunk; the whole image is never held in memory. The record file
    /// appears atomically (temp file plus rename), so a failed or
    /// interrupted save leaves no partial record behind.
    pub fn save_image<R: Read + ?Sized>(
        &self,
        source: &mut R,
        password: &MasterPassword,
    ) -> Result<RecordId> {
        let salt = Salt::random();
        let key = derive_key(password, &salt)?;
        let iv = Iv::random();

        let id = self.allocate_id()?;
        let path = self.path_for(id);
        let temp = temp_path_for(&path);

        let result = (|| -> Result<()> {
            let mut file = File::create(&temp)?;
            file.write_all(salt.as_bytes())?;
            file.write_all(iv.as_bytes())?;
            encrypt_stream(&key, &iv, source, &mut file)?;
            file.flush()?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                rename_with_fallback(&temp, &path)?;
                Ok(id)
            }
            Err(e) => {
                let _ = fs::remove_file(&temp);
                // Release the claimed filename rather than leave an empty record.
                let _ = fs::remove_file(&path);
                Err(e)
            }
        }
    }

    /// Open an image record for streaming decryption.
    ///
    /// Returns `Ok(None)` when the record is missing. The returned reader
    /// yields plaintext incrementally and fails with an `InvalidData` I/O
    /// error at end of stream if the password was wrong or the record was
    /// tampered with.
    pub fn open_image(
        &self,
        id: RecordId,
        password: &MasterPassword,
    ) -> Result<Option<ImageReader>> {
        let mut file = match File::open(self.path_for(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; IV_SIZE];
        read_header(&mut file, &mut salt, &mut iv)?;

        let key = derive_key(password, &Salt::from_bytes(salt))?;
        Ok(Some(DecryptingReader::new(
            &key,
            &Iv::from_bytes(iv),
            file,
        )))
    }

    /// Decrypt an image record into `dest`.
    ///
    /// Returns `Ok(false)` when the record is missing or fails
    /// authentication; I/O errors propagate. Used for sharing or exporting
    /// a decrypted copy.
    ///
    /// The tag is only checked at end of stream, so on an authentication
    /// failure `dest` may already hold unauthenticated partial output.
    /// Callers exporting to a real file should write to a temp path and
    /// rename only on `Ok(true)`.
    pub fn decrypt_image_to_writer<W: Write + ?Sized>(
        &self,
        id: RecordId,
        password: &MasterPassword,
        dest: &mut W,
    ) -> Result<bool> {
        let Some(mut reader) = self.open_image(id, password)? else {
            return Ok(false);
        };

        match io::copy(&mut reader, dest) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::InvalidData => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an image record. Deleting a nonexistent id is not an error.
    pub fn delete_image(&self, id: RecordId) -> Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every image in the vault.
    pub fn delete_all(&self) -> Result<()> {
        for id in self.list_images()? {
            self.delete_image(id)?;
        }
        Ok(())
    }

    /// Enumerate image ids, newest first.
    pub fn list_images(&self) -> Result<Vec<RecordId>> {
        list_record_ids(&self.dir, IMAGE_PREFIX, IMAGE_EXT)
    }
}

fn read_header(
    file: &mut File,
    salt: &mut [u8; SALT_SIZE],
    iv: &mut [u8; IV_SIZE],
) -> Result<()> {
    let read = |file: &mut File, buf: &mut [u8]| -> Result<()> {
        file.read_exact(buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                DiaryError::MalformedRecord(format!(
                    "record too short for its {}-byte header",
                    SALT_SIZE + IV_SIZE
                ))
            } else {
                e.into()
            }
        })
    };
    read(file, salt)?;
    read(file, iv)
}
