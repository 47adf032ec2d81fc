//! Presentation helpers.

/// Cut `text` to at most `max_chars` chars, appending `"..."` if anything was
/// removed. Counts chars, not bytes.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
