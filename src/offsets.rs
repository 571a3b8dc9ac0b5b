//! Character/byte offset conversion for paragraph text.
//!
//! Brief JSON counts span offsets in characters (Unicode scalar values), while
//! Rust slices by byte. Briefs are full of curly quotes, `§` and `¶`, so every
//! slice or splice goes through these helpers.

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Convert a character offset to a byte offset. Offsets past the end clamp
/// to `text.len()`.
pub fn char_to_byte(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(text.len())
}

/// Convert a byte offset (on a char boundary) to a character offset.
pub fn byte_to_char(text: &str, byte_idx: usize) -> usize {
    text[..byte_idx.min(text.len())].chars().count()
}

/// Convert a character range to a byte range.
pub fn chars_to_bytes(text: &str, char_start: usize, char_end: usize) -> (usize, usize) {
    let mut byte_start = text.len();
    let mut byte_end = text.len();
    for (char_idx, (byte_idx, _ch)) in text.char_indices().enumerate() {
        if char_idx == char_start {
            byte_start = byte_idx;
        }
        if char_idx == char_end {
            byte_end = byte_idx;
            break;
        }
    }
    (byte_start, byte_end)
}

/// Slice `text` by a character range. `None` when the range is inverted or
/// runs past the end.
pub fn slice_chars(text: &str, char_start: usize, char_end: usize) -> Option<&str> {
    if char_start > char_end || char_end > char_len(text) {
        return None;
    }
    let (bs, be) = chars_to_bytes(text, char_start, char_end);
    Some(&text[bs..be])
}

/// Character offset of the first occurrence of `needle`.
pub fn find_char(text: &str, needle: &str) -> Option<usize> {
    text.find(needle).map(|b| byte_to_char(text, b))
}

/// Replace the character range `[char_start, char_end)` with `replacement`.
pub fn splice_chars(text: &str, char_start: usize, char_end: usize, replacement: &str) -> String {
    let (bs, be) = chars_to_bytes(text, char_start, char_end);
    let mut out = String::with_capacity(text.len() - (be - bs) + replacement.len());
    out.push_str(&text[..bs]);
    out.push_str(replacement);
    out.push_str(&text[be..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_identity() {
        let text = "Smith v. Jones";
        assert_eq!(chars_to_bytes(text, 0, 5), (0, 5));
        assert_eq!(slice_chars(text, 9, 14), Some("Jones"));
    }

    #[test]
    fn test_curly_quotes() {
        // U+201C and U+201D are three bytes each
        let text = "said \u{201c}no\u{201d} twice";
        assert_eq!(char_len(text), 15);
        assert_eq!(slice_chars(text, 5, 9), Some("\u{201c}no\u{201d}"));
        assert_eq!(find_char(text, "twice"), Some(10));
        assert_eq!(char_to_byte(text, 10), 14);
        assert_eq!(byte_to_char(text, 14), 10);
    }

    #[test]
    fn test_slice_out_of_range() {
        assert_eq!(slice_chars("abc", 2, 4), None);
        assert_eq!(slice_chars("abc", 2, 1), None);
        assert_eq!(slice_chars("abc", 3, 3), Some(""));
    }

    #[test]
    fn test_splice_keeps_surrounding_text() {
        let text = "\u{00b6} 12 of the Complaint";
        let out = splice_chars(text, 2, 4, "47");
        assert_eq!(out, "\u{00b6} 47 of the Complaint");
        let grown = splice_chars(text, 0, 1, "Paragraph");
        assert_eq!(grown, "Paragraph 12 of the Complaint");
    }
}
