//! Helpers for sanitizing data before it enters tracing span attributes
//! or gets joined onto the storage root.
//!
//! Session trees hold customer photos; log lines only ever carry file names,
//! and caller-supplied tokens (session ids, group ids) are checked before
//! they become path components.

use std::path::Path;

/// Maximum length accepted for a caller-supplied path token.
const MAX_TOKEN_LENGTH: usize = 128;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Returns true when `token` can be used as a single path component.
///
/// Accepts ASCII alphanumerics, `-` and `_` only. Rejects empty strings,
/// dots (so `.` and `..` never pass), separators and anything longer than
/// [`MAX_TOKEN_LENGTH`].
pub fn is_safe_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LENGTH
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lower-cased extension of an uploaded file name including the dot,
/// `.jpg` when the name has none.
pub fn extension_from_name(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| ".jpg".to_string())
}
