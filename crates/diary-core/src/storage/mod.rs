//! Encrypted record stores.
//!
//! - **record**: the `[salt][iv][ciphertext||tag]` layout and entry payload codec
//! - **entries**: file-per-record store for diary entries
//! - **images**: streaming store for large image blobs
//!
//! Both stores keep their files in a caller-chosen directory and tell their
//! records apart by filename prefix. Where the records live is the caller's
//! concern; the stores only need a directory they may fill.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;

pub mod entries;
pub mod images;
pub mod record;

pub use entries::EntryStore;
pub use images::{ImageReader, ImageVault};
pub use record::{DiaryEntry, EncryptedRecord};

/// Opaque identifier for a stored record.
///
/// Encodes the record's creation time in milliseconds since the Unix epoch;
/// this is also what the filename embeds and what enumeration orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(i64);

impl RecordId {
    /// Creates an id from a millisecond timestamp.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// The millisecond timestamp this id encodes.
    pub fn timestamp_millis(self) -> i64 {
        self.0
    }

    /// The creation time this id encodes, if representable.
    pub fn created_at(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Enumerate record ids in `dir` matching `prefix`/`ext`, newest first.
pub(crate) fn list_record_ids(dir: &Path, prefix: &str, ext: &str) -> Result<Vec<RecordId>> {
    let mut ids = Vec::new();
    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        let name = dirent.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(id) = parse_record_name(name, prefix, ext) {
            ids.push(id);
        }
    }
    ids.sort_unstable_by(|a, b| b.cmp(a));
    Ok(ids)
}

fn parse_record_name(name: &str, prefix: &str, ext: &str) -> Option<RecordId> {
    let millis = name.strip_prefix(prefix)?.strip_suffix(ext)?;
    millis.parse::<i64>().ok().map(RecordId::from_millis)
}
