//! Scientific tokenization
//!
//! Hyphenated scientific terms ("RNA-seq") and alphanumeric identifiers
//! ("GLDS-123") must survive as single tokens; naive punctuation splitting
//! measurably degrades domain recall. The same token rule is used everywhere
//! a term set is needed: lexical indexing, query building, keyword overlap,
//! and duplicate detection.

use std::collections::HashSet;
use std::str::CharIndices;

use once_cell::sync::Lazy;
use regex::Regex;
use tantivy::tokenizer::{Token, TokenStream, Tokenizer};

/// A token starts with an alphanumeric and may continue with alphanumerics,
/// hyphens, or underscores. Trailing connectors are trimmed so "bone-" and
/// "bone" index identically.
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{Alphabetic}\d][\p{Alphabetic}\d_-]*").expect("valid regex"));

/// Tokenize into lowercase terms, dropping single-character tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str().trim_end_matches(['-', '_']).to_string())
        .filter(|t| t.chars().count() > 1)
        .collect()
}

/// Tokenize into a deduplicated term set.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Token-set Jaccard similarity between two texts.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Tantivy tokenizer applying the same token rule at indexing time.
///
/// Registered on the lexical index as "scientific" together with a
/// lowercasing filter, so index terms line up with [`tokenize`] output.
#[derive(Clone, Default)]
pub struct ScientificTokenizer {
    token: Token,
}

pub struct ScientificTokenStream<'a> {
    text: &'a str,
    chars: CharIndices<'a>,
    token: &'a mut Token,
}

impl Tokenizer for ScientificTokenizer {
    type TokenStream<'a> = ScientificTokenStream<'a>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> ScientificTokenStream<'a> {
        self.token.reset();
        ScientificTokenStream {
            text,
            chars: text.char_indices(),
            token: &mut self.token,
        }
    }
}

impl ScientificTokenStream<'_> {
    fn search_token_end(&mut self) -> usize {
        (&mut self.chars)
            .filter(|(_, c)| !(c.is_alphanumeric() || *c == '-' || *c == '_'))
            .map(|(offset, _)| offset)
            .next()
            .unwrap_or(self.text.len())
    }
}

impl TokenStream for ScientificTokenStream<'_> {
    fn advance(&mut self) -> bool {
        self.token.text.clear();
        self.token.position = self.token.position.wrapping_add(1);
        while let Some((offset_from, c)) = self.chars.next() {
            if c.is_alphanumeric() {
                let offset_to = self.search_token_end();
                let raw = &self.text[offset_from..offset_to];
                let trimmed = raw.trim_end_matches(['-', '_']);
                self.token.offset_from = offset_from;
                self.token.offset_to = offset_from + trimmed.len();
                self.token.text.push_str(trimmed);
                return true;
            }
        }
        false
    }

    fn token(&self) -> &Token {
        self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        self.token
    }
}
