/// Truncate `s` to at most `max_bytes` bytes without splitting a UTF-8
/// character boundary.
pub fn truncate_utf8_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_under_limit_is_unchanged() {
        assert_eq!(truncate_utf8_bytes("hello", 10), "hello");
    }

    #[test]
    fn ascii_over_limit_is_cut() {
        assert_eq!(truncate_utf8_bytes("hello world", 5), "hello");
    }

    #[test]
    fn multibyte_boundary_is_respected() {
        // "café" - 'é' is 2 bytes, total 5 bytes.
        let s = "café";
        assert_eq!(s.len(), 5);
        // Cutting at 4 would split 'é'; should back off to 3.
        assert_eq!(truncate_utf8_bytes(s, 4), "caf");
    }

    #[test]
    fn emoji_boundary_is_respected() {
        let s = "a\u{1F600}b"; // a + 4-byte emoji + b
        assert_eq!(truncate_utf8_bytes(s, 3), "a");
        assert_eq!(truncate_utf8_bytes(s, 5), "a\u{1F600}");
    }

    #[test]
    fn zero_limit_yields_empty() {
        assert_eq!(truncate_utf8_bytes("hello", 0), "");
    }
}
