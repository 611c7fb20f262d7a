//! Pure input sanitization rules.
//!
//! These functions implement the protocol's input constraints without side
//! effects, making them easy to test in isolation.

/// Maximum chat line length, in characters, after whitespace collapsing.
pub const MAX_TEXT_LEN: usize = 250;

/// Restrict a display name to the permitted alphabet `[A-Za-z0-9_]`.
///
/// Disallowed characters are stripped rather than rejected, so `"bob!!"`
/// becomes `"bob"`. The result may be empty; callers decide what an empty
/// name means (the facade rejects it).
///
/// # Arguments
///
/// * `raw` - The display name as typed
///
/// # Returns
///
/// The name with every character outside the alphabet removed
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Normalize a chat line for sending.
///
/// Consecutive whitespace runs collapse to a single space, leading and
/// trailing whitespace is dropped, and the result is capped at
/// [`MAX_TEXT_LEN`] characters.
///
/// # Arguments
///
/// * `raw` - The chat line as typed
///
/// # Returns
///
/// `Some(normalized)` when anything remains, `None` for empty or
/// whitespace-only input
pub fn sanitize_text(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(MAX_TEXT_LEN).collect())
}
