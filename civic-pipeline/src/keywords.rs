//! Local deny-list check used when the classifier cannot be used.
//!
//! Matching is a case-insensitive substring test, so "spammer" matches
//! "spam" and so does "antispam". Sub-word false positives are accepted in
//! exchange for a filter with no I/O and no failure mode.

use crate::types::ModerationVerdict;

/// Case-insensitive substring deny-list.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    tokens: Vec<String>,
}

impl KeywordFilter {
    /// Build a filter from deny-list tokens. Tokens are lower-cased and blank ones dropped.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens: Vec<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        tokens.sort();
        tokens.dedup();
        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// First deny-list token found in `text`, if any.
    pub fn find_match(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.tokens
            .iter()
            .find(|token| lowered.contains(token.as_str()))
            .map(String::as_str)
    }

    /// Fallback verdict for `text`. Total over all strings.
    pub fn check(&self, text: &str) -> ModerationVerdict {
        ModerationVerdict::fallback(self.find_match(text).is_some())
    }
}
