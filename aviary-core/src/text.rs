//! Character-boundary-safe string truncation

/// Truncate `s` to at most `max_chars` characters, appending an ellipsis
/// when anything was cut. Counts characters, not bytes, so multi-byte
/// input is never split mid-character.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_input_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn test_truncate_long_input() {
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn test_truncate_exact_boundary() {
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let s = "日程を確認してください";
        let out = truncate(s, 4);
        assert_eq!(out, "日程を確...");
    }
}
