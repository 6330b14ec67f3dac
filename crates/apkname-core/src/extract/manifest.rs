//! Surface-pattern extraction from `AndroidManifest.xml`.
//!
//! The manifest is treated as an opaque byte blob. Each field is matched
//! independently and only the first capture of the first match is used, so a
//! manifest that is fully compiled to binary XML simply yields nothing.

use super::PackageMetadata;
use crate::archive::ArchiveSource;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::{debug, trace};

/// Name of the manifest entry inside an APK
pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";

/// Prefix marking a resource reference such as `@string/app_name`
const RESOURCE_REF_MARKER: &str = "@";

static PACKAGE_RE: Lazy<Regex> = Lazy::new(|| pattern(r#"package="([^"]+)""#));
static VERSION_NAME_RE: Lazy<Regex> = Lazy::new(|| pattern(r#"android:versionName="([^"]+)""#));
static VERSION_CODE_RE: Lazy<Regex> = Lazy::new(|| pattern(r#"android:versionCode="([^"]+)""#));
static LABEL_RE: Lazy<Regex> = Lazy::new(|| pattern(r#"android:label="([^"]+)""#));

/// Compile a byte pattern with Unicode classes disabled so `[^"]` spans raw bytes
fn pattern(re: &str) -> Regex {
    Regex::new(&format!("(?-u){re}")).expect("manifest pattern is valid")
}

/// Fields found in a manifest blob
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestFields {
    /// `package="..."`
    pub package_name: Option<String>,
    /// `android:versionName="..."`
    pub version_name: Option<String>,
    /// `android:versionCode="..."`
    pub version_code: Option<String>,
    /// `android:label="..."`, unless it is a resource reference
    pub label: Option<String>,
}

impl ManifestFields {
    /// Match every field pattern against the raw manifest bytes
    pub fn parse(data: &[u8]) -> Self {
        let label = first_capture(&LABEL_RE, data).filter(|label| {
            let is_ref = label.starts_with(RESOURCE_REF_MARKER);
            if is_ref {
                trace!("Ignoring resource reference label {}", label);
            }
            !is_ref
        });

        Self {
            package_name: first_capture(&PACKAGE_RE, data),
            version_name: first_capture(&VERSION_NAME_RE, data),
            version_code: first_capture(&VERSION_CODE_RE, data),
            label,
        }
    }

    /// Copy found fields into `meta`; unmatched fields leave it untouched
    pub fn apply(self, meta: &mut PackageMetadata) {
        if let Some(v) = self.package_name {
            meta.package_name = v;
        }
        if let Some(v) = self.version_name {
            meta.version_name = v;
        }
        if let Some(v) = self.version_code {
            meta.version_code = v;
        }
        if let Some(v) = self.label {
            if meta.display_name.is_empty() {
                meta.display_name = v;
            }
        }
    }
}

/// First capture group of the first match, decoded lossily
fn first_capture(re: &Regex, data: &[u8]) -> Option<String> {
    re.captures(data)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

/// Locate the manifest entry and pattern-match it into `meta`.
///
/// A missing or unreadable manifest is a soft miss and leaves `meta` as is.
pub fn extract<A: ArchiveSource + ?Sized>(archive: &mut A, meta: &mut PackageMetadata) {
    let Some(name) = archive
        .entry_names()
        .into_iter()
        .find(|name| name == MANIFEST_ENTRY)
    else {
        debug!("No {} entry in archive", MANIFEST_ENTRY);
        return;
    };

    let Some(data) = archive.read_entry(&name) else {
        debug!("Failed to read {}", MANIFEST_ENTRY);
        return;
    };

    trace!("Matching {} bytes of {}", data.len(), MANIFEST_ENTRY);
    let fields = ManifestFields::parse(&data);
    debug!("Manifest fields: {:?}", fields);
    fields.apply(meta);
}
