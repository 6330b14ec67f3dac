//! # apkname-core
//!
//! A library for identifying Android packages and giving them canonical file names.
//!
//! This crate provides the core functionality for:
//! - Pulling package name, version and display name out of an APK
//! - Turning hardening-detector findings into a packer vendor label
//! - Copying the APK to a collision-free `<packer>_<app>_<package>_<version>.apk`
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`archive`]: Random access to archive entries
//! - [`extract`]: Manifest, string resource and badging extraction
//! - [`sanitize`]: Path component sanitization
//! - [`packer`]: Packer vendor label aggregation
//! - [`rename`]: File name composition and the rename itself
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use apkname_core::{open_archive, MetadataResolver, PackerLabel, RenameOptions, Renamer};
//!
//! let path = "./downloads/app.apk";
//! let mut archive = open_archive(path)?;
//! let meta = MetadataResolver::new().resolve(path, Some(&mut archive));
//!
//! let findings = ["    Sopath  VendorX(Pro) -> assets/libvx.so"];
//! let label = PackerLabel::from_findings(&findings);
//!
//! let renamer = Renamer::new(RenameOptions::new().rename(true));
//! renamer.rename(&meta, &label)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`ArchiveSource`]: Supply archive entries from something other than a ZIP file
//! - [`BadgingTool`]: Replace the `aapt` fallback
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod archive;
pub mod error;
pub mod extract;
pub mod packer;
pub mod rename;
pub mod sanitize;

// Re-export primary types for convenience
pub use archive::{open_archive, ArchiveSource, MemoryArchive};
pub use error::{Error, Result};
pub use extract::{
    Aapt, BadgingTool, MetadataResolver, PackageMetadata, ResolverConfig, APK_EXTENSION,
};
pub use packer::{PackerLabel, NO_PROTECTION};
pub use rename::{compose_file_name, RenameOptions, RenameOutcome, Renamer};
pub use sanitize::sanitize;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
