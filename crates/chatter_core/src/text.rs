//! Tokenization and keyword extraction shared by the brain and topic memory.

use std::collections::HashMap;

/// Minimum length (in chars) for a token to count as a keyword.
pub const MIN_KEYWORD_CHARS: usize = 3;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '\'' | '_' | '-')
}

/// Split text into lower-cased runs of word characters
/// (letters, digits, apostrophe, underscore, hyphen).
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !is_word_char(c))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// True when the text contains letters and none of them are lower-case.
///
/// "OK!!" shouts, "123" and "ok" do not.
pub fn is_shouting(text: &str) -> bool {
    let mut saw_letter = false;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        if c.is_lowercase() {
            return false;
        }
        saw_letter = true;
    }
    saw_letter
}

/// Up to `limit` keywords ranked by frequency, ties broken by first appearance.
///
/// Tokens shorter than [`MIN_KEYWORD_CHARS`] and purely numeric tokens are skipped.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }

    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, token) in tokenize(text).into_iter().enumerate() {
        if token.chars().count() < MIN_KEYWORD_CHARS || token.chars().all(|c| c.is_numeric()) {
            continue;
        }
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first_seen))| (token, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(token, _, _)| token)
        .collect()
}

/// Lower-case, trim and dedupe a keyword list, keeping first occurrences.
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for keyword in keywords {
        let normalized = keyword.as_ref().trim().to_lowercase();
        if !normalized.is_empty() && !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Hello, WORLD! it's a well-known snake_case fact."),
            vec!["hello", "world", "it's", "a", "well-known", "snake_case", "fact"]
        );
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  ?! ... ").is_empty());
    }

    #[test]
    fn test_is_shouting() {
        assert!(is_shouting("STOP IT"));
        assert!(is_shouting("OK!!"));
        assert!(!is_shouting("Stop it"));
        assert!(!is_shouting("123 456"));
        assert!(!is_shouting(""));
    }

    #[test]
    fn test_extract_keywords_by_frequency_then_first_seen() {
        let text = "rust is fast, rust is safe, cargo builds rust and cargo tests";
        assert_eq!(extract_keywords(text, 3), vec!["rust", "cargo", "fast"]);
    }

    #[test]
    fn test_extract_keywords_skips_short_and_numeric() {
        let text = "42 is an ok number but 1234 is bigger";
        assert_eq!(extract_keywords(text, 5), vec!["number", "but", "bigger"]);
    }

    #[test]
    fn test_normalize_keywords_dedupes() {
        assert_eq!(
            normalize_keywords([" Rust", "rust", "", "Cargo"]),
            vec!["rust", "cargo"]
        );
    }
}
