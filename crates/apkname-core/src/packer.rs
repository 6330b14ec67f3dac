//! Packer vendor label derived from hardening-detector findings.
//!
//! A finding is one line of the form
//! `<descriptor> <vendor-phrase> -> <location>`, for example
//! `    Sopath  VendorX（Pro） -> assets/libjiagu.so`. The last word before the
//! arrow names the vendor; edition qualifiers in parentheses are dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::trace;

/// Label used when no vendor was recognized
pub const NO_PROTECTION: &str = "no protection";

/// Separator between the vendor phrase and the location
const ARROW: &str = " -> ";

/// Separator between vendors in the rendered label
const VENDOR_SEPARATOR: &str = "_";

/// Parenthesized qualifier in ASCII or fullwidth style, contents included
static QUALIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[（(][^）)]*[）)]").expect("qualifier pattern is valid"));

/// Distinct packer vendors, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackerLabel {
    vendors: Vec<String>,
}

impl PackerLabel {
    /// Reduce detector findings to a vendor label
    pub fn from_findings<S: AsRef<str>>(findings: &[S]) -> Self {
        let mut label = Self::default();
        for finding in findings {
            if let Some(vendor) = vendor_of(finding.as_ref()) {
                label.insert(vendor);
            }
        }
        label
    }

    fn insert(&mut self, vendor: String) {
        if !self.vendors.contains(&vendor) {
            self.vendors.push(vendor);
        }
    }

    /// Recognized vendors
    pub fn vendors(&self) -> &[String] {
        &self.vendors
    }

    /// Returns true if at least one vendor was recognized
    pub fn is_protected(&self) -> bool {
        !self.vendors.is_empty()
    }
}

impl fmt::Display for PackerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vendors.is_empty() {
            f.write_str(NO_PROTECTION)
        } else {
            f.write_str(&self.vendors.join(VENDOR_SEPARATOR))
        }
    }
}

/// Extract the cleaned vendor name from a single finding
fn vendor_of(finding: &str) -> Option<String> {
    let (before, _) = finding.split_once(ARROW)?;

    let words: Vec<&str> = before.split_whitespace().collect();
    if words.len() < 2 {
        trace!("Ignoring finding without vendor phrase: {:?}", finding);
        return None;
    }

    let vendor = clean_vendor(words[words.len() - 1]);
    (!vendor.is_empty()).then_some(vendor)
}

/// Drop parenthesized qualifiers and all whitespace
fn clean_vendor(raw: &str) -> String {
    QUALIFIER_RE
        .replace_all(raw, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}
