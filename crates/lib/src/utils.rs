//! Small helpers shared by the bridges and the in-memory provider.

use crate::constants::PATH_SEPARATOR;

/// Number of characters (Unicode scalar values) in `text`.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the character at `char_index`.
///
/// An index equal to the character length maps to `text.len()`. Larger
/// indices are clamped to the end of the string.
pub(crate) fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// Byte range covering the characters `start..end`.
pub(crate) fn byte_range(text: &str, start: usize, end: usize) -> std::ops::Range<usize> {
    byte_offset(text, start)..byte_offset(text, end)
}

/// Join a base path and a relative path, skipping empty segments.
pub(crate) fn join_path(base: &str, path: &str) -> String {
    match (base.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}{PATH_SEPARATOR}{path}"),
    }
}

/// Initials of the whitespace-separated words of a display name.
pub(crate) fn initials(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect()
}
