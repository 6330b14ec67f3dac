//! Error types for the apkname-core library.
//!
//! Metadata extraction never fails: a missing manifest, an unreadable resource
//! table or an absent badging tool only leave fields empty. The variants here
//! cover opening an archive from disk and the file-system side of renaming.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for apkname operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all apkname operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be opened as a ZIP container
    #[error("failed to open '{path}' as an archive: {source}")]
    ArchiveOpen {
        /// Path to the archive
        path: PathBuf,
        /// Underlying ZIP error
        #[source]
        source: zip::result::ZipError,
    },

    /// Copying the archive to its new name failed; nothing was renamed
    #[error("failed to copy '{from}' to '{to}': {source}")]
    CopyFailed {
        /// Source archive
        from: PathBuf,
        /// Destination that could not be written
        to: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The copy finished but its content differs from the source
    #[error("copy of '{from}' at '{to}' does not match the original")]
    CopyMismatch {
        /// Source archive
        from: PathBuf,
        /// Destination whose content differs
        to: PathBuf,
    },

    /// The copy succeeded but the original could not be removed
    #[error("renamed copy written to '{copy}' but failed to delete original '{path}': {source}")]
    DeleteOriginalFailed {
        /// Original archive that is still present
        path: PathBuf,
        /// The new file, which is left in place
        copy: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Every collision suffix up to the configured bound was taken
    #[error("no free file name for '{path}' after {attempts} attempts")]
    CollisionLimit {
        /// Candidate path before any suffix was applied
        path: PathBuf,
        /// Number of suffixes tried
        attempts: usize,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new archive open error
    pub fn archive_open(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::ArchiveOpen {
            path: path.into(),
            source,
        }
    }

    /// Creates a new copy error
    pub fn copy_failed(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::CopyFailed {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// Creates a new copy mismatch error
    pub fn copy_mismatch(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self::CopyMismatch {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Creates a new delete-original error
    pub fn delete_original_failed(
        path: impl Into<PathBuf>,
        copy: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::DeleteOriginalFailed {
            path: path.into(),
            copy: copy.into(),
            source,
        }
    }

    /// Creates a new collision limit error
    pub fn collision_limit(path: impl Into<PathBuf>, attempts: usize) -> Self {
        Self::CollisionLimit {
            path: path.into(),
            attempts,
        }
    }

    /// Returns true if the renamed copy exists even though the operation failed
    ///
    /// Only a failed deletion of the original leaves both files on disk.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::DeleteOriginalFailed { .. })
    }
}
