//! APK identity extraction.
//!
//! This module reconciles three sources of metadata into one
//! [`PackageMetadata`] record.
//!
//! ## Pipeline
//!
//! 1. [`manifest`]: surface patterns over the raw `AndroidManifest.xml`
//! 2. [`resources`]: string tables, only if no display name was found
//! 3. [`badging`]: `aapt dump badging`, only if no package name was found
//! 4. The file name, if there is still no display name
//! 5. Sanitization of every populated name field
//!
//! No stage can fail. Anything a stage cannot find stays an empty string.
//!
//! ## Example
//!
//! ```no_run
//! use apkname_core::{open_archive, MetadataResolver};
//!
//! let path = "./app-release.apk";
//! let mut archive = open_archive(path)?;
//! let meta = MetadataResolver::new().resolve(path, Some(&mut archive));
//! println!("{}", meta);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod badging;
pub mod manifest;
pub mod resources;

use crate::archive::ArchiveSource;
use crate::sanitize::sanitize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use badging::{parse_badging, Aapt, BadgingInfo, BadgingTool};
pub use manifest::ManifestFields;

/// Extension of Android package archives
pub const APK_EXTENSION: &str = ".apk";

/// Identity of a single APK
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    /// Reverse-domain package identifier
    pub package_name: String,
    /// Human readable version
    pub version_name: String,
    /// Numeric version marker, kept verbatim
    pub version_code: String,
    /// Application name shown to users
    pub display_name: String,
    /// Path of the archive this record describes
    pub source_path: PathBuf,
}

impl PackageMetadata {
    /// Creates an empty record for the archive at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: path.into(),
            ..Self::default()
        }
    }

    /// Archive file name with the `.apk` suffix removed
    fn file_stem_name(&self) -> String {
        let mut name = self
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let split = name.len().saturating_sub(APK_EXTENSION.len());
        let has_extension = split > 0
            && name
                .get(split..)
                .is_some_and(|ext| ext.eq_ignore_ascii_case(APK_EXTENSION));
        if has_extension {
            name.truncate(split);
        }
        name
    }

    /// Sanitize every populated name field; empty fields stay empty
    fn sanitize_fields(&mut self) {
        for field in [
            &mut self.display_name,
            &mut self.package_name,
            &mut self.version_name,
        ] {
            if !field.is_empty() {
                *field = sanitize(field);
            }
        }
    }
}

impl fmt::Display for PackageMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:         {}", self.source_path.display())?;
        writeln!(f, "App name:     {}", self.display_name)?;
        writeln!(f, "Package:      {}", self.package_name)?;
        writeln!(f, "Version name: {}", self.version_name)?;
        write!(f, "Version code: {}", self.version_code)
    }
}

/// Configuration for metadata resolution
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Badging tool executable; `None` disables the fallback stage
    pub badging_tool: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            badging_tool: Some(PathBuf::from("aapt")),
        }
    }
}

impl ResolverConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the badging tool executable
    pub fn badging_tool(mut self, program: impl Into<PathBuf>) -> Self {
        self.badging_tool = Some(program.into());
        self
    }

    /// Disables the badging fallback
    pub fn without_badging_tool(mut self) -> Self {
        self.badging_tool = None;
        self
    }
}

/// Orchestrates the extractors into one resolved record
pub struct MetadataResolver {
    tool: Option<Box<dyn BadgingTool>>,
}

impl fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataResolver")
            .field("badging_tool", &self.tool.is_some())
            .finish()
    }
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataResolver {
    /// Creates a resolver that falls back to `aapt` from `PATH`
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    /// Creates a resolver from configuration
    pub fn with_config(config: ResolverConfig) -> Self {
        let tool = config
            .badging_tool
            .map(|program| Box::new(Aapt::new(program)) as Box<dyn BadgingTool>);
        Self { tool }
    }

    /// Replaces the badging tool with a custom implementation
    pub fn with_badging_tool(mut self, tool: impl BadgingTool + 'static) -> Self {
        self.tool = Some(Box::new(tool));
        self
    }

    /// Resolve the metadata of the APK at `path`.
    ///
    /// `archive` is the already opened archive, if it could be opened; without
    /// it only the badging fallback and the file name are available.
    pub fn resolve<A: ArchiveSource + ?Sized>(
        &self,
        path: impl AsRef<Path>,
        archive: Option<&mut A>,
    ) -> PackageMetadata {
        let path = path.as_ref();
        let mut meta = PackageMetadata::new(path);

        if let Some(archive) = archive {
            manifest::extract(archive, &mut meta);
            if meta.display_name.is_empty() {
                resources::extract(archive, &mut meta);
            }
        }

        if meta.package_name.is_empty() {
            if let Some(tool) = &self.tool {
                if let Some(output) = tool.dump_badging(path) {
                    merge_badging(&mut meta, parse_badging(&output));
                }
            }
        }

        if meta.display_name.is_empty() {
            meta.display_name = meta.file_stem_name();
            debug!("Using file name {:?} as display name", meta.display_name);
        }

        meta.sanitize_fields();
        debug!(
            "Resolved {}: name={:?} package={:?} version={:?} ({:?})",
            path.display(),
            meta.display_name,
            meta.package_name,
            meta.version_name,
            meta.version_code
        );
        meta
    }
}

/// Take package and version fields from the tool whenever it has them;
/// the label only fills an empty display name.
fn merge_badging(meta: &mut PackageMetadata, info: BadgingInfo) {
    let identity = [
        (&mut meta.package_name, info.package_name),
        (&mut meta.version_name, info.version_name),
        (&mut meta.version_code, info.version_code),
    ];
    for (slot, value) in identity {
        if let Some(value) = value {
            *slot = value;
        }
    }

    if let Some(label) = info.label {
        if meta.display_name.is_empty() {
            meta.display_name = label;
        }
    }
}
