//! Filename sanitization for URL segments

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Used when nothing survives sanitization
pub const PLACEHOLDER_FILENAME: &str = "file";

static UNSAFE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_-]+").unwrap());

static REPEATED_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").unwrap());

/// Turn any string into a lowercase `[a-z0-9_-]` token.
///
/// Accents are folded to their base letter, every other run of unsafe
/// characters becomes a single `_`, and separators are trimmed from both ends.
/// Idempotent: sanitizing an already sanitized token returns it unchanged.
pub fn sanitize_filename(input: &str) -> String {
    let folded = input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let replaced = UNSAFE_RUN.replace_all(&folded, "_");
    let collapsed = REPEATED_SEPARATOR.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches(|c| c == '_' || c == '-');

    if trimmed.is_empty() {
        PLACEHOLDER_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}
