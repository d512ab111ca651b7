//! Whitespace tokenizer for BM25
//!
//! Lowercases and splits on runs of whitespace. Punctuation is kept as part
//! of the token and nothing is stemmed or dropped.

/// Tokenizer that case-folds and splits on whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer;

impl Tokenizer {
    /// Create a new tokenizer
    pub fn new() -> Self {
        Self
    }

    /// Tokenize text into terms, preserving order and repeats
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokenization() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("Open Savings Account");
        assert_eq!(tokens, vec!["open", "savings", "account"]);
    }

    #[test]
    fn test_whitespace_runs() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("  konto \t\n eröffnen   ");
        assert_eq!(tokens, vec!["konto", "eröffnen"]);
    }

    #[test]
    fn test_punctuation_kept() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("Hello, World!");
        assert_eq!(tokens, vec!["hello,", "world!"]);
    }

    #[test]
    fn test_repeats_preserved() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("a b A");
        assert_eq!(tokens, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_unicode_case_folding() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("KONTO ERÖFFNEN Überweisung");
        assert_eq!(tokens, vec!["konto", "eröffnen", "überweisung"]);
    }

    #[test]
    fn test_empty() {
        let tokenizer = Tokenizer::new();
        assert!(tokenizer.tokenize("").is_empty());
        assert!(tokenizer.tokenize(" \t\n ").is_empty());
    }
}
