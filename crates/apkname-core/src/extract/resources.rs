//! Display-name lookup in `res/values*/strings.xml` entries.

use super::PackageMetadata;
use crate::archive::ArchiveSource;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::{debug, trace};

/// Path fragment identifying a values resource directory
const VALUES_DIR_MARKER: &str = "res/values";

/// Suffix of string resource tables
const STRINGS_SUFFIX: &str = "strings.xml";

/// Candidate keys for the application name, highest priority first
const NAME_KEYS: &[&str] = &["app_name", "app_title", "application_name", "title"];

static NAME_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    NAME_KEYS
        .iter()
        .map(|key| {
            let re = Regex::new(&format!(r#"(?-u)<string name="{key}">([^<]+)</string>"#))
                .expect("string resource pattern is valid");
            (*key, re)
        })
        .collect()
});

/// Returns true if `name` looks like a string resource table
pub fn is_strings_entry(name: &str) -> bool {
    name.contains(VALUES_DIR_MARKER) && name.ends_with(STRINGS_SUFFIX)
}

/// Find the application name in a single strings table
pub fn find_display_name(data: &[u8]) -> Option<String> {
    NAME_PATTERNS.iter().find_map(|(key, re)| {
        let caps = re.captures(data)?;
        let value = String::from_utf8_lossy(caps.get(1)?.as_bytes())
            .trim()
            .to_string();
        trace!("Matched string resource {} = {:?}", key, value);
        Some(value)
    })
}

/// Scan string tables in listing order; the first key match in the first
/// matching entry becomes the display name.
pub fn extract<A: ArchiveSource + ?Sized>(archive: &mut A, meta: &mut PackageMetadata) {
    for name in archive.entry_names() {
        if !is_strings_entry(&name) {
            continue;
        }

        let Some(data) = archive.read_entry(&name) else {
            trace!("Skipping unreadable {}", name);
            continue;
        };

        if let Some(display_name) = find_display_name(&data) {
            debug!("Display name {:?} from {}", display_name, name);
            meta.display_name = display_name;
            return;
        }
    }

    debug!("No application name in string resources");
}
