//! Shared normalization helpers for observation and reference names.
//!
//! Matching is case-sensitive and byte-exact after trimming, so these helpers
//! never fold case, accents or punctuation. Only the bucket key is uppercased.

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

/// Values that stand in for "no current name" in reference exports.
pub static PLACEHOLDER_NAMES: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    ["-", "—", "--", "n/a", "none", "null", "na"]
        .into_iter()
        .collect()
});

/// Null-coalesce and trim a raw field.
pub fn norm(s: Option<&str>) -> String {
    s.unwrap_or("").trim().to_string()
}

/// Current name if non-empty, else historical name.
pub fn preferred_name<'a>(historical: &'a str, current: &'a str) -> &'a str {
    let current = current.trim();
    if current.is_empty() {
        historical.trim()
    } else {
        current
    }
}

/// Bucket key for a name: its first character, uppercased.
/// Returns `None` for names that are empty after trimming.
pub fn bucket_key(name: &str) -> Option<char> {
    let first = name.trim_start().chars().next()?;
    // Multi-char mappings (e.g. 'ß' -> "SS") keep their first char
    first.to_uppercase().next()
}

/// Whether a value is a placeholder such as "-" or "n/a" (case-insensitive).
pub fn is_placeholder(s: &str) -> bool {
    PLACEHOLDER_NAMES.contains(s.trim().to_lowercase().as_str())
}
