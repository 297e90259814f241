use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Normalized word tokens of one retained sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenizedSentence(Vec<String>);

impl TokenizedSentence {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|t| t == token)
    }
}

/// Tokens joined by single spaces, one line of the cleaned-text artifact.
impl fmt::Display for TokenizedSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl From<Vec<&str>> for TokenizedSentence {
    fn from(tokens: Vec<&str>) -> Self {
        Self(tokens.into_iter().map(str::to_string).collect())
    }
}

/// Append-only sentence collection for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    sentences: Vec<TokenizedSentence>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, sentences: impl IntoIterator<Item = TokenizedSentence>) {
        self.sentences.extend(sentences);
    }

    pub fn sentences(&self) -> &[TokenizedSentence] {
        &self.sentences
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.sentences.iter().map(TokenizedSentence::len).sum()
    }

    /// Token frequencies, keeping only tokens seen at least `min_count` times.
    pub fn vocabulary(&self, min_count: usize) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in self.sentences.iter().flat_map(|s| s.tokens()) {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        counts.retain(|_, count| *count >= min_count);
        counts
    }
}
