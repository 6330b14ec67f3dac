//! Normalization of untrusted text into a single path component.

/// Replacement used when nothing printable survives sanitization
pub const PLACEHOLDER: &str = "Unknown";

/// Characters that are rejected by at least one common file system
const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make `s` safe to use as a file name component.
///
/// Every illegal character becomes `_`, then leading and trailing spaces
/// and underscores are trimmed. An empty result yields [`PLACEHOLDER`].
pub fn sanitize(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '_');
    if trimmed.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}
