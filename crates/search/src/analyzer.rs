//! Pluggable tokenization profiles.
//!
//! Analyzer plug-ins are a fixed, named set registered at process startup
//! rather than looked up dynamically — see the "dynamic duck-typed analyzer
//! plug-ins" re-architecture note this crate follows.

use std::collections::HashMap;

/// A single token produced by an [`Analyzer`]. Positions are 0-based,
/// monotonically increasing, and never duplicated within one field of one
/// document (they may skip, e.g. when a stop word is dropped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: u32,
    pub start_char: u32,
    pub end_char: u32,
}

pub trait Analyzer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// Lowercases, splits on non-alphanumeric boundaries, strips punctuation,
/// and drops a small stop-word list. This mirrors a `SimpleTokenizer` +
/// `LowerCaser` + stop-word filter pipeline without depending on a full
/// tokenization crate.
pub struct DefaultAnalyzer {
    stop_words: &'static [&'static str],
}

const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "into", "is",
    "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "will", "with",
];

impl Default for DefaultAnalyzer {
    fn default() -> Self {
        DefaultAnalyzer {
            stop_words: DEFAULT_STOP_WORDS,
        }
    }
}

impl DefaultAnalyzer {
    pub fn without_stop_words() -> Self {
        DefaultAnalyzer { stop_words: &[] }
    }
}

impl Analyzer for DefaultAnalyzer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;
        for (start, word) in word_boundaries(text) {
            let lower = word.to_lowercase();
            if self.stop_words.contains(&lower.as_str()) {
                continue;
            }
            let end = start + word.chars().count() as u32;
            tokens.push(Token {
                text: lower,
                position,
                start_char: start,
                end_char: end,
            });
            position += 1;
        }
        tokens
    }
}

/// Preserves identifiers with embedded `_`/digits as a single token, and
/// additionally splits on CamelCase boundaries, emitting both the original
/// identifier and its sub-parts so `parseJSON` is findable by `parsejson`,
/// `parse`, and `json`.
pub struct CodeFriendlyAnalyzer;

impl Analyzer for CodeFriendlyAnalyzer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;
        for (start, word) in code_word_boundaries(text) {
            let end = start + word.chars().count() as u32;
            tokens.push(Token {
                text: word.to_lowercase(),
                position,
                start_char: start,
                end_char: end,
            });
            position += 1;
            for part in split_camel_case(&word) {
                if part.eq_ignore_ascii_case(&word) {
                    continue;
                }
                tokens.push(Token {
                    text: part.to_lowercase(),
                    position,
                    start_char: start,
                    end_char: end,
                });
                position += 1;
            }
        }
        tokens
    }
}

/// Treats the whole input as a single token at position 0. For list-valued
/// fields the caller analyzes one element at a time via [`tokenize_list`],
/// which assigns increasing positions across elements.
pub struct KeywordAnalyzer;

impl Analyzer for KeywordAnalyzer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        vec![Token {
            text: trimmed.to_string(),
            position: 0,
            start_char: 0,
            end_char: trimmed.chars().count() as u32,
        }]
    }
}

/// Analyze each element of a list-valued keyword field, assigning each
/// element's token the next free position.
pub fn tokenize_list(analyzer: &KeywordAnalyzer, values: &[String]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut position = 0u32;
    for value in values {
        for mut token in analyzer.tokenize(value) {
            token.position = position;
            position += 1;
            tokens.push(token);
        }
    }
    tokens
}

pub struct AnalyzerRegistry {
    profiles: HashMap<String, Box<dyn Analyzer>>,
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        let mut profiles: HashMap<String, Box<dyn Analyzer>> = HashMap::new();
        profiles.insert("default".to_string(), Box::new(DefaultAnalyzer::default()));
        profiles.insert("code-friendly".to_string(), Box::new(CodeFriendlyAnalyzer));
        profiles.insert("keyword".to_string(), Box::new(KeywordAnalyzer));
        AnalyzerRegistry { profiles }
    }
}

impl AnalyzerRegistry {
    pub fn get(&self, profile: &str) -> &dyn Analyzer {
        self.profiles
            .get(profile)
            .map(|b| b.as_ref())
            .unwrap_or_else(|| self.profiles.get("default").expect("default profile always registered"))
    }
}

/// Splits `text` on runs of non-alphanumeric characters, returning
/// `(start_char_offset, word)` pairs. Mirrors tantivy's `SimpleTokenizer`
/// boundary rule (alphanumeric vs. everything else).
fn word_boundaries(text: &str) -> Vec<(u32, String)> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_start: u32 = 0;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_alphanumeric() {
            if current.is_empty() {
                current_start = i as u32;
            }
            current.push(ch);
        } else if !current.is_empty() {
            result.push((current_start, std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        result.push((current_start, current));
    }
    result
}

/// Like [`word_boundaries`] but also allows `_` inside a word, so
/// `parse_json` stays one token before CamelCase/underscore splitting.
fn code_word_boundaries(text: &str) -> Vec<(u32, String)> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_start: u32 = 0;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_alphanumeric() || ch == '_' {
            if current.is_empty() {
                current_start = i as u32;
            }
            current.push(ch);
        } else if !current.is_empty() {
            result.push((current_start, std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        result.push((current_start, current));
    }
    result
}

/// Splits an identifier on CamelCase and `_` boundaries: `parseJSONValue` ->
/// `["parse", "JSON", "Value"]`, `parse_json_value` -> `["parse", "json",
/// "value"]`.
fn split_camel_case(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = word.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = i > 0
            && ch.is_uppercase()
            && (chars[i - 1].is_lowercase()
                || chars[i - 1].is_ascii_digit()
                || (i + 1 < chars.len() && chars[i + 1].is_lowercase() && chars[i - 1].is_uppercase()));
        if boundary && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_analyzer_lowercases_and_strips_punctuation() {
        let analyzer = DefaultAnalyzer::without_stop_words();
        let tokens = analyzer.tokenize("Install with pip install pkg!");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["install", "with", "pip", "install", "pkg"]);
    }

    #[test]
    fn default_analyzer_positions_are_dense_and_increasing() {
        let analyzer = DefaultAnalyzer::default();
        let tokens = analyzer.tokenize("alpha beta gamma");
        let positions: Vec<_> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn code_friendly_splits_camel_case_but_keeps_original() {
        let analyzer = CodeFriendlyAnalyzer;
        let tokens = analyzer.tokenize("parseJSONValue");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"parsejsonvalue"));
        assert!(texts.contains(&"parse"));
        assert!(texts.contains(&"value"));
    }

    #[test]
    fn keyword_analyzer_emits_single_token() {
        let analyzer = KeywordAnalyzer;
        let tokens = analyzer.tokenize("  some raw value  ");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "some raw value");
        assert_eq!(tokens[0].position, 0);
    }

    #[test]
    fn tokenize_list_assigns_increasing_positions() {
        let analyzer = KeywordAnalyzer;
        let values = vec!["rust".to_string(), "search".to_string()];
        let tokens = tokenize_list(&analyzer, &values);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn registry_falls_back_to_default_for_unknown_profile() {
        let registry = AnalyzerRegistry::default();
        let tokens = registry.get("does-not-exist").tokenize("Hello World");
        assert_eq!(tokens[0].text, "hello");
    }
}
