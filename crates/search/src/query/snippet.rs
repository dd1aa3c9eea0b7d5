//! Snippet generation: a window of stored field text centered on the first
//! occurrence of any highlighted term, padded with ellipses when truncated.

use crate::knobs;

/// Builds a snippet from `body`, centered on the first case-insensitive
/// occurrence of any of `highlight_terms`. Falls back to the leading
/// `SNIPPET_WINDOW_CHARS` characters when no term is found.
pub fn build_snippet(body: &str, highlight_terms: &[String]) -> String {
    let window = *knobs::SNIPPET_WINDOW_CHARS;
    if body.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = body.chars().collect();
    let lower: String = body.to_lowercase();

    let anchor = highlight_terms
        .iter()
        .filter_map(|t| lower.find(&t.to_lowercase()).map(|byte_idx| char_index_of_byte(body, byte_idx)))
        .min();

    let (start, end) = match anchor {
        Some(anchor_char_idx) => {
            let half = window / 2;
            let start = anchor_char_idx.saturating_sub(half);
            let end = (start + window).min(chars.len());
            (start, end)
        },
        None => (0, window.min(chars.len())),
    };

    let excerpt: String = chars[start..end].iter().collect();
    let mut result = String::new();
    if start > 0 {
        result.push_str("...");
    }
    result.push_str(excerpt.trim());
    if end < chars.len() {
        result.push_str("...");
    }
    result
}

fn char_index_of_byte(s: &str, byte_idx: usize) -> usize {
    s.char_indices().take_while(|(i, _)| *i < byte_idx).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_window_on_first_match() {
        let body = "a".repeat(300) + "needle" + &"b".repeat(300);
        let snippet = build_snippet(&body, &["needle".to_string()]);
        assert!(snippet.contains("needle"));
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn falls_back_to_leading_window_when_no_term_found() {
        let body = "the quick brown fox jumps over the lazy dog";
        let snippet = build_snippet(body, &["absent".to_string()]);
        assert!(snippet.starts_with("the quick"));
    }

    #[test]
    fn empty_body_yields_empty_snippet() {
        assert_eq!(build_snippet("", &["x".to_string()]), "");
    }

    #[test]
    fn short_body_has_no_ellipses() {
        let body = "short body text";
        let snippet = build_snippet(body, &["short".to_string()]);
        assert_eq!(snippet, "short body text");
    }
}
