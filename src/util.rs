//! Small text helpers shared across modules.

/// Truncate to at most `max_chars` characters, appending a marker when cut.
///
/// Cuts on a char boundary, so multi-byte text never panics.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}... [truncated]", &s[..byte_idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn long_text_is_cut_with_marker() {
        assert_eq!(truncate_chars("abcdef", 3), "abc... [truncated]");
    }

    #[test]
    fn multibyte_text_cuts_on_char_boundary() {
        assert_eq!(truncate_chars("€€€€", 2), "€€... [truncated]");
    }
}
