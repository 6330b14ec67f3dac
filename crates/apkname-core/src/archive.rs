//! Random-access view over the entries of an APK.
//!
//! The extractors only need two things from an archive: the entry names in
//! listing order and the bytes of a named entry. [`ArchiveSource`] captures
//! exactly that so callers can hand in an already opened [`zip::ZipArchive`]
//! or, in tests, a [`MemoryArchive`].

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::trace;
use zip::ZipArchive;

/// Largest entry read into memory; manifests and string tables are far smaller
pub const MAX_ENTRY_LEN: u64 = 64 * 1024 * 1024;

/// Trait for archives the metadata extractors can read from
pub trait ArchiveSource {
    /// Names of all entries, in archive listing order
    fn entry_names(&self) -> Vec<String>;

    /// Reads the full content of the named entry.
    ///
    /// Returns `None` if the entry is missing or cannot be read.
    fn read_entry(&mut self, name: &str) -> Option<Vec<u8>>;
}

impl<R: Read + Seek> ArchiveSource for ZipArchive<R> {
    fn entry_names(&self) -> Vec<String> {
        (0..self.len())
            .filter_map(|i| self.name_for_index(i).map(str::to_string))
            .collect()
    }

    fn read_entry(&mut self, name: &str) -> Option<Vec<u8>> {
        let mut file = match self.by_name(name) {
            Ok(file) => file,
            Err(e) => {
                trace!("Cannot open entry {}: {}", name, e);
                return None;
            }
        };

        match read_bounded(&mut file, MAX_ENTRY_LEN) {
            Ok(Some(data)) => Some(data),
            Ok(None) => {
                trace!("Entry {} exceeds {} bytes", name, MAX_ENTRY_LEN);
                None
            }
            Err(e) => {
                trace!("Cannot read entry {}: {}", name, e);
                None
            }
        }
    }
}

/// Read at most `limit` bytes; `None` if the reader holds more.
///
/// The size an archive declares for an entry is untrusted, so the buffer
/// grows with the bytes actually read.
fn read_bounded(reader: impl Read, limit: u64) -> std::io::Result<Option<Vec<u8>>> {
    let mut data = Vec::new();
    reader.take(limit + 1).read_to_end(&mut data)?;
    if data.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(data))
}

/// An archive held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Vec<(String, Vec<u8>)>,
}

impl MemoryArchive {
    /// Creates an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, keeping insertion order as listing order
    pub fn with_entry(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.entries.push((name.into(), data.into()));
        self
    }
}

impl ArchiveSource for MemoryArchive {
    fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_entry(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, data)| data.clone())
    }
}

/// Open an APK on disk as a ZIP archive
pub fn open_archive(path: impl AsRef<Path>) -> Result<ZipArchive<BufReader<File>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| Error::archive_open(path, e))
}
