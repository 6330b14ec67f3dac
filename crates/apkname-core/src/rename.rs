//! Canonical file naming and the copy-then-delete rename.
//!
//! The new name is `<packer>_<app>_<package>[_<version>].apk`, capped at
//! [`MAX_FILE_NAME_LEN`] bytes, and placed next to the original. An
//! existing file is never overwritten: `_1`, `_2`, ... is inserted before the
//! extension until a free name is found.
//!
//! The original is only removed after the copy has completed, so a failure
//! at any point leaves the source archive in place.

use crate::error::{Error, Result};
use crate::extract::{PackageMetadata, APK_EXTENSION};
use crate::packer::PackerLabel;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Longest file name produced in bytes, extension included
pub const MAX_FILE_NAME_LEN: usize = 200;

/// Longest name portion in bytes kept when a name has to be truncated
pub const MAX_BASE_NAME_LEN: usize = 196;

/// Separator between name segments
const SEGMENT_SEPARATOR: &str = "_";

/// Rename configuration
#[derive(Debug, Clone)]
pub struct RenameOptions {
    /// Perform the rename at all
    pub rename: bool,
    /// Remove the original once the copy succeeded
    pub delete_original: bool,
    /// Collision suffixes tried before giving up
    pub max_collision_attempts: usize,
    /// Compare content hashes before deleting the original
    pub verify_copy: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            rename: false,
            delete_original: false,
            max_collision_attempts: 10_000,
            verify_copy: true,
        }
    }
}

impl RenameOptions {
    /// Creates new options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the rename is performed
    pub fn rename(mut self, rename: bool) -> Self {
        self.rename = rename;
        self
    }

    /// Sets whether the original is deleted after copying
    pub fn delete_original(mut self, delete: bool) -> Self {
        self.delete_original = delete;
        self
    }

    /// Sets the collision suffix bound
    pub fn max_collision_attempts(mut self, max: usize) -> Self {
        self.max_collision_attempts = max;
        self
    }

    /// Sets whether the copy is verified before the original is deleted
    pub fn verify_copy(mut self, verify: bool) -> Self {
        self.verify_copy = verify;
        self
    }
}

/// What a rename request did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Renaming was not requested
    Skipped,
    /// The archive was copied to its new name
    Renamed {
        /// Original archive
        from: PathBuf,
        /// New file
        to: PathBuf,
        /// Whether the original was removed
        original_deleted: bool,
    },
}

/// Compose the canonical file name, extension included.
///
/// Empty package and version segments are left out.
pub fn compose_file_name(meta: &PackageMetadata, label: &PackerLabel) -> String {
    let label = label.to_string();
    let segments = [
        label.as_str(),
        meta.display_name.as_str(),
        meta.package_name.as_str(),
        meta.version_name.as_str(),
    ];
    let base = segments
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(SEGMENT_SEPARATOR);

    truncate_file_name(&base)
}

/// Append the extension, truncating `base` if the result would be too long
///
/// Lengths are in bytes; the cut lands on the last char boundary within
/// [`MAX_BASE_NAME_LEN`].
fn truncate_file_name(base: &str) -> String {
    let len = base.len() + APK_EXTENSION.len();
    if len <= MAX_FILE_NAME_LEN {
        return format!("{base}{APK_EXTENSION}");
    }

    let mut end = MAX_BASE_NAME_LEN.min(base.len());
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    debug!("Truncated file name from {} bytes", len);
    format!("{}{APK_EXTENSION}", &base[..end])
}

/// Insert `_<n>` before the extension of `path`
fn with_counter(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    path.with_file_name(name)
}

/// Copies archives to their canonical names
#[derive(Debug, Clone, Default)]
pub struct Renamer {
    options: RenameOptions,
}

impl Renamer {
    /// Creates a renamer with the given options
    pub fn new(options: RenameOptions) -> Self {
        Self { options }
    }

    /// Returns the active options
    pub fn options(&self) -> &RenameOptions {
        &self.options
    }

    /// Compute the collision-free destination for `meta`
    pub fn plan(&self, meta: &PackageMetadata, label: &PackerLabel) -> Result<PathBuf> {
        let dir = meta.source_path.parent().unwrap_or_else(|| Path::new(""));
        let candidate = dir.join(compose_file_name(meta, label));
        self.resolve_collision(&candidate)
    }

    /// Find the first of `candidate`, `candidate_1`, `candidate_2`, ... that does not exist
    pub fn resolve_collision(&self, candidate: &Path) -> Result<PathBuf> {
        if !candidate.exists() {
            return Ok(candidate.to_path_buf());
        }

        for n in 1..=self.options.max_collision_attempts {
            let path = with_counter(candidate, n);
            if !path.exists() {
                debug!("{} exists, using {}", candidate.display(), path.display());
                return Ok(path);
            }
        }

        Err(Error::collision_limit(
            candidate,
            self.options.max_collision_attempts,
        ))
    }

    /// Copy the archive to its canonical name, then optionally delete the original.
    ///
    /// Does nothing unless renaming was requested.
    pub fn rename(&self, meta: &PackageMetadata, label: &PackerLabel) -> Result<RenameOutcome> {
        self.rename_with(meta, label, |path| fs::remove_file(path))
    }

    fn rename_with(
        &self,
        meta: &PackageMetadata,
        label: &PackerLabel,
        remove: impl FnOnce(&Path) -> io::Result<()>,
    ) -> Result<RenameOutcome> {
        if !self.options.rename {
            return Ok(RenameOutcome::Skipped);
        }

        let from = meta.source_path.clone();
        let to = self.plan(meta, label)?;
        info!("Renaming {} -> {}", from.display(), to.display());

        copy_file(&from, &to)?;

        if !self.options.delete_original {
            return Ok(RenameOutcome::Renamed {
                from,
                to,
                original_deleted: false,
            });
        }

        if self.options.verify_copy && !same_content(&from, &to)? {
            return Err(Error::copy_mismatch(&from, &to));
        }

        remove(&from).map_err(|e| Error::delete_original_failed(&from, &to, e))?;
        info!("Deleted original {}", from.display());

        Ok(RenameOutcome::Renamed {
            from,
            to,
            original_deleted: true,
        })
    }
}

/// Copy `from` into a newly created `to`, removing `to` again on failure
fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let source = File::open(from).map_err(|e| Error::copy_failed(from, to, e))?;
    let dest = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(|e| Error::copy_failed(from, to, e))?;

    let result = (|| -> io::Result<u64> {
        let mut reader = BufReader::new(source);
        let mut writer = BufWriter::new(dest);
        let copied = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(copied)
    })();

    match result {
        Ok(copied) => {
            debug!("Copied {} bytes to {}", copied, to.display());
            Ok(())
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(to) {
                warn!("Failed to remove partial copy {}: {}", to.display(), cleanup);
            }
            Err(Error::copy_failed(from, to, e))
        }
    }
}

/// Compare two files by content hash
fn same_content(a: &Path, b: &Path) -> Result<bool> {
    Ok(hash_file(a)? == hash_file(b)?)
}

fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut BufReader::new(file), &mut hasher).map_err(|e| Error::file_read(path, e))?;
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn metadata(dir: &Path, file: &str) -> PackageMetadata {
        PackageMetadata {
            package_name: "com.example.app".into(),
            version_name: "1.2.3".into(),
            version_code: "45".into(),
            display_name: "My App".into(),
            source_path: dir.join(file),
        }
    }

    fn vendor(name: &str) -> PackerLabel {
        PackerLabel::from_findings(&[format!("    Sopath  {name} -> assets/lib.so")])
    }

    fn enabled() -> Renamer {
        Renamer::new(RenameOptions::new().rename(true))
    }

    #[test]
    fn test_compose_file_name() {
        let meta = metadata(Path::new("/apks"), "a.apk");
        assert_eq!(
            compose_file_name(&meta, &vendor("VendorX")),
            "VendorX_My App_com.example.app_1.2.3.apk"
        );
        assert_eq!(
            compose_file_name(&meta, &PackerLabel::default()),
            "no protection_My App_com.example.app_1.2.3.apk"
        );
    }

    #[test]
    fn test_compose_omits_empty_segments() {
        let mut meta = metadata(Path::new("/apks"), "a.apk");
        meta.version_name.clear();
        assert_eq!(
            compose_file_name(&meta, &vendor("V")),
            "V_My App_com.example.app.apk"
        );

        meta.package_name.clear();
        assert_eq!(compose_file_name(&meta, &vendor("V")), "V_My App.apk");
    }

    #[test]
    fn test_long_name_is_truncated() {
        let mut meta = metadata(Path::new("/apks"), "a.apk");
        // "V_" + name + "_com.example.app_1.2.3" = 230 characters
        let fixed = "V__com.example.app_1.2.3".len();
        meta.display_name = "n".repeat(230 - fixed);

        let name = compose_file_name(&meta, &vendor("V"));
        assert_eq!(name.chars().count(), MAX_FILE_NAME_LEN);
        assert!(name.ends_with(".apk"));
        assert_eq!(name.trim_end_matches(".apk").chars().count(), MAX_BASE_NAME_LEN);
    }

    #[test]
    fn test_truncation_counts_bytes() {
        // 65 three-byte chars fit in 196 bytes, the 66th would not
        let name = truncate_file_name(&"应".repeat(300));
        assert_eq!(name, format!("{}.apk", "应".repeat(65)));
        assert_eq!(name.len(), 199);
    }

    #[test]
    fn test_cjk_name_is_renamed() {
        let temp_dir = TempDir::new().unwrap();
        let mut meta = metadata(temp_dir.path(), "orig.apk");
        meta.display_name = "应".repeat(90);
        fs::write(&meta.source_path, b"apk").unwrap();
        let label = vendor("梆梆安全（企业版）");

        let name = compose_file_name(&meta, &label);
        assert!(name.len() <= MAX_FILE_NAME_LEN);
        assert!(name.starts_with("梆梆安全_应"));
        assert!(name.ends_with(".apk"));

        let RenameOutcome::Renamed { to, .. } = enabled().rename(&meta, &label).unwrap() else {
            panic!("expected a rename");
        };
        assert_eq!(to.file_name().unwrap().to_string_lossy(), name);
        assert_eq!(fs::read(to).unwrap(), b"apk");
    }

    #[test]
    fn test_name_at_limit_is_kept() {
        let base = "x".repeat(MAX_FILE_NAME_LEN - APK_EXTENSION.len());
        assert_eq!(truncate_file_name(&base), format!("{base}.apk"));
    }

    #[test]
    fn test_with_counter() {
        assert_eq!(
            with_counter(Path::new("/apks/V_App.apk"), 2),
            PathBuf::from("/apks/V_App_2.apk")
        );
        assert_eq!(
            with_counter(Path::new("/apks/V_App_1.2.3.apk"), 1),
            PathBuf::from("/apks/V_App_1.2.3_1.apk")
        );
    }

    #[test]
    fn test_skipped_when_not_requested() {
        let temp_dir = TempDir::new().unwrap();
        let meta = metadata(temp_dir.path(), "orig.apk");
        fs::write(&meta.source_path, b"apk").unwrap();

        let outcome = Renamer::default().rename(&meta, &vendor("V")).unwrap();

        assert_eq!(outcome, RenameOutcome::Skipped);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_collisions_get_counters() {
        let temp_dir = TempDir::new().unwrap();
        let renamer = enabled();
        let label = vendor("V");
        let mut destinations = Vec::new();

        for file in ["one.apk", "two.apk", "three.apk"] {
            let meta = metadata(temp_dir.path(), file);
            fs::write(&meta.source_path, file).unwrap();
            match renamer.rename(&meta, &label).unwrap() {
                RenameOutcome::Renamed { to, original_deleted, .. } => {
                    assert!(!original_deleted);
                    assert!(meta.source_path.exists());
                    destinations.push(to.file_name().unwrap().to_string_lossy().into_owned());
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(
            destinations,
            vec![
                "V_My App_com.example.app_1.2.3.apk",
                "V_My App_com.example.app_1.2.3_1.apk",
                "V_My App_com.example.app_1.2.3_2.apk",
            ]
        );
        let second = temp_dir.path().join(&destinations[1]);
        assert_eq!(fs::read(second).unwrap(), b"two.apk");
    }

    #[test]
    fn test_delete_original_after_copy() {
        let temp_dir = TempDir::new().unwrap();
        let meta = metadata(temp_dir.path(), "orig.apk");
        fs::write(&meta.source_path, b"PK\x03\x04 payload").unwrap();
        let renamer = Renamer::new(RenameOptions::new().rename(true).delete_original(true));

        let outcome = renamer.rename(&meta, &vendor("V")).unwrap();

        let RenameOutcome::Renamed { to, original_deleted, .. } = outcome else {
            panic!("expected a rename");
        };
        assert!(original_deleted);
        assert!(!meta.source_path.exists());
        assert_eq!(fs::read(to).unwrap(), b"PK\x03\x04 payload");
    }

    #[test]
    fn test_failed_delete_keeps_both_files() {
        let temp_dir = TempDir::new().unwrap();
        let meta = metadata(temp_dir.path(), "orig.apk");
        fs::write(&meta.source_path, b"apk").unwrap();
        let renamer = Renamer::new(RenameOptions::new().rename(true).delete_original(true));

        let err = renamer
            .rename_with(&meta, &vendor("V"), |_| {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
            })
            .unwrap_err();

        assert!(err.is_partial());
        let Error::DeleteOriginalFailed { path, copy, .. } = err else {
            panic!("expected a delete failure");
        };
        assert_eq!(path, meta.source_path);
        assert!(path.exists());
        assert_eq!(fs::read(copy).unwrap(), b"apk");
    }

    #[test]
    fn test_delete_skipped_without_request() {
        let temp_dir = TempDir::new().unwrap();
        let meta = metadata(temp_dir.path(), "orig.apk");
        fs::write(&meta.source_path, b"apk").unwrap();

        let outcome = enabled()
            .rename_with(&meta, &vendor("V"), |_| panic!("original must be kept"))
            .unwrap();

        assert!(matches!(
            outcome,
            RenameOutcome::Renamed { original_deleted: false, .. }
        ));
        assert!(meta.source_path.exists());
    }

    #[test]
    fn test_same_content() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.apk");
        let b = temp_dir.path().join("b.apk");
        let c = temp_dir.path().join("c.apk");
        fs::write(&a, b"payload").unwrap();
        fs::write(&b, b"payload").unwrap();
        fs::write(&c, b"tampered").unwrap();

        assert!(same_content(&a, &b).unwrap());
        assert!(!same_content(&a, &c).unwrap());
        assert!(matches!(
            same_content(&a, &temp_dir.path().join("missing.apk")),
            Err(Error::FileRead { .. })
        ));
    }

    #[test]
    fn test_failed_copy_keeps_original() {
        let temp_dir = TempDir::new().unwrap();
        let meta = metadata(temp_dir.path(), "missing.apk");
        let renamer = Renamer::new(RenameOptions::new().rename(true).delete_original(true));

        let err = renamer.rename(&meta, &vendor("V")).unwrap_err();

        assert!(matches!(err, Error::CopyFailed { .. }));
        assert!(!err.is_partial());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_collision_limit() {
        let temp_dir = TempDir::new().unwrap();
        let meta = metadata(temp_dir.path(), "orig.apk");
        fs::write(&meta.source_path, b"apk").unwrap();
        let label = vendor("V");
        let candidate = temp_dir.path().join(compose_file_name(&meta, &label));
        fs::write(&candidate, b"taken").unwrap();
        fs::write(with_counter(&candidate, 1), b"taken").unwrap();
        fs::write(with_counter(&candidate, 2), b"taken").unwrap();

        let renamer = Renamer::new(RenameOptions::new().rename(true).max_collision_attempts(2));
        let err = renamer.rename(&meta, &label).unwrap_err();

        assert!(matches!(err, Error::CollisionLimit { attempts: 2, .. }));
    }

    #[test]
    fn test_plan_does_not_touch_files() {
        let temp_dir = TempDir::new().unwrap();
        let meta = metadata(temp_dir.path(), "orig.apk");

        let planned = enabled().plan(&meta, &vendor("V")).unwrap();

        assert_eq!(planned.parent(), Some(temp_dir.path()));
        assert!(!planned.exists());
    }
}
