//! Formatting helpers shared by the report renderers.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries so CJK names are never split mid-codepoint.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Round to `dp` decimal places, half away from zero.
pub fn round_to(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (value * factor).round() / factor
}

/// Format a percentage with an explicit sign for positive values: `+1.23%`, `-0.50%`, `0.00%`.
pub fn signed_pct(pct: f64) -> String {
    if pct > 0.0 {
        format!("+{pct:.2}%")
    } else if pct < 0.0 {
        format!("{pct:.2}%")
    } else {
        "0.00%".to_string()
    }
}

/// Format a raw heat value in units of ten thousand: `8472839` → `847.28万`.
pub fn format_wan(value: f64) -> String {
    format!("{:.2}万", value / 10_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
        assert_eq!(truncate_with_ellipsis("人工智能,机器人,算力", 4), "人工智能...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
    }

    #[test_case(1.005, 2 => 1.0; "binary representation rounds down")]
    #[test_case(-0.125, 2 => -0.13; "negative half away from zero")]
    #[test_case(26.8, 2 => 26.8; "already rounded")]
    fn test_round_to(value: f64, dp: u32) -> f64 {
        round_to(value, dp)
    }

    #[test]
    fn test_signed_pct() {
        assert_eq!(signed_pct(1.234), "+1.23%");
        assert_eq!(signed_pct(-0.5), "-0.50%");
        assert_eq!(signed_pct(0.0), "0.00%");
    }

    #[test]
    fn test_format_wan() {
        assert_eq!(format_wan(8_472_839.0), "847.28万");
        assert_eq!(format_wan(0.0), "0.00万");
    }
}
