//! Minimal YAML-subset parser for markdown front matter.
//!
//! The recognized-key contract is closed (`url`, `title`, `language`/`lang`,
//! `tags`, `last_fetched_at`) so this intentionally does not pull in a
//! general YAML crate. Malformed or absent front matter must never abort
//! indexing — callers get `None` and fall back to inference.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub url: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
    pub tags: Vec<String>,
    pub last_fetched_at: Option<String>,
}

/// Splits a markdown document into `(front_matter, remaining_body)`.
/// `front_matter` is `None` if the document has no leading `---` delimiter
/// or the block between delimiters could not be parsed.
pub fn split_front_matter(markdown: &str) -> (Option<FrontMatter>, &str) {
    let mut lines = markdown.lines();
    match lines.next() {
        Some(first) if first.trim_end() == "---" => {},
        _ => return (None, markdown),
    }

    let rest = &markdown[markdown.find('\n').map(|i| i + 1).unwrap_or(markdown.len())..];
    let Some(end_rel) = find_closing_delimiter(rest) else {
        return (None, markdown);
    };
    let block = &rest[..end_rel];
    let body_start = rest[end_rel..]
        .find('\n')
        .map(|i| end_rel + i + 1)
        .unwrap_or(rest.len());
    let body = &rest[body_start..];

    match parse_block(block) {
        Some(fm) => (Some(fm), body),
        None => (None, markdown),
    }
}

fn find_closing_delimiter(s: &str) -> Option<usize> {
    let mut offset = 0;
    for line in s.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n').trim_end();
        if trimmed == "---" {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

fn parse_block(block: &str) -> Option<FrontMatter> {
    let mut fm = FrontMatter::default();
    let mut lines = block.lines().peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "url" => fm.url = non_empty_unquoted(value),
            "title" => fm.title = non_empty_unquoted(value),
            "language" | "lang" => fm.language = non_empty_unquoted(value),
            "last_fetched_at" => fm.last_fetched_at = non_empty_unquoted(value),
            "tags" => {
                if let Some(inline) = parse_inline_list(value) {
                    fm.tags = inline;
                } else if value.is_empty() {
                    fm.tags = parse_block_list(&mut lines);
                }
            },
            _ => {},
        }
    }
    Some(fm)
}

fn non_empty_unquoted(value: &str) -> Option<String> {
    let unquoted = unquote(value);
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted)
    }
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses `[a, b, c]` style inline lists. Returns `None` if `value` isn't
/// bracketed (the caller then tries the block-list form instead).
fn parse_inline_list(value: &str) -> Option<Vec<String>> {
    let trimmed = value.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return None;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    Some(
        inner
            .split(',')
            .map(|s| unquote(s))
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Parses a `- item` block list, consuming lines from `lines` until one no
/// longer matches the block-list-item shape.
fn parse_block_list<'a>(lines: &mut std::iter::Peekable<std::str::Lines<'a>>) -> Vec<String> {
    let mut items = Vec::new();
    while let Some(next) = lines.peek() {
        let trimmed = next.trim();
        if let Some(item) = trimmed.strip_prefix("- ") {
            items.push(unquote(item));
            lines.next();
        } else if trimmed == "-" {
            lines.next();
        } else {
            break;
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_front_matter() {
        let doc = "---\nurl: https://ex.com/a\ntitle: Hello\nlang: EN\n---\n# Body\n";
        let (fm, body) = split_front_matter(doc);
        let fm = fm.unwrap();
        assert_eq!(fm.url.as_deref(), Some("https://ex.com/a"));
        assert_eq!(fm.title.as_deref(), Some("Hello"));
        assert_eq!(fm.language.as_deref(), Some("EN"));
        assert_eq!(body.trim(), "# Body");
    }

    #[test]
    fn parses_inline_tag_list() {
        let doc = "---\ntags: [rust, search]\n---\nbody\n";
        let (fm, _) = split_front_matter(doc);
        assert_eq!(fm.unwrap().tags, vec!["rust", "search"]);
    }

    #[test]
    fn parses_block_tag_list() {
        let doc = "---\ntags:\n  - rust\n  - search\n---\nbody\n";
        let (fm, _) = split_front_matter(doc);
        assert_eq!(fm.unwrap().tags, vec!["rust", "search"]);
    }

    #[test]
    fn absence_of_front_matter_returns_none_and_whole_body() {
        let doc = "# Just a heading\nsome body text\n";
        let (fm, body) = split_front_matter(doc);
        assert!(fm.is_none());
        assert_eq!(body, doc);
    }

    #[test]
    fn missing_closing_delimiter_is_treated_as_no_front_matter() {
        let doc = "---\nurl: https://ex.com/a\nno closing delimiter here\n";
        let (fm, body) = split_front_matter(doc);
        assert!(fm.is_none());
        assert_eq!(body, doc);
    }
}
