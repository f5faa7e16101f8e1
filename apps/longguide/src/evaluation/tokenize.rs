//! Tokenizers feeding ROUGE-L.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use tiktoken_rs::CoreBPE;

use super::ScoringError;

/// Same-language tokenization: lowercase, keep `[a-z0-9]` runs, stem words
/// longer than three characters.
pub struct StemmingTokenizer {
    stemmer: Stemmer,
    non_alnum: Regex,
}

impl StemmingTokenizer {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
            non_alnum: Regex::new(r"[^a-z0-9]+").expect("valid regex"),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.non_alnum
            .replace_all(&lowered, " ")
            .split_whitespace()
            .map(|token| {
                if token.len() > 3 {
                    self.stemmer.stem(token).into_owned()
                } else {
                    token.to_string()
                }
            })
            .filter(|token| !token.is_empty())
            .collect()
    }
}

impl Default for StemmingTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cross-lingual tokenization with the GPT-2 byte-pair vocabulary.
///
/// The leading-space marker is dropped so ` word` and `word` compare equal.
/// Tokens that are only part of a multi-byte character are keyed by id.
pub struct BpeTokenizer {
    bpe: CoreBPE,
}

impl BpeTokenizer {
    pub fn gpt2() -> Result<Self, ScoringError> {
        let bpe = tiktoken_rs::r50k_base().map_err(|e| ScoringError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|id| match self.bpe.decode(vec![id]) {
                Ok(piece) => piece.trim_start_matches(' ').to_string(),
                Err(_) => format!("<{id}>"),
            })
            .collect()
    }
}

pub enum Tokenizer {
    Stemming(StemmingTokenizer),
    CrossLingual(BpeTokenizer),
}

impl Tokenizer {
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        match self {
            Tokenizer::Stemming(t) => t.tokenize(text),
            Tokenizer::CrossLingual(t) => t.tokenize(text),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tokenizer::Stemming(_) => "stemmed",
            Tokenizer::CrossLingual(_) => "gpt2-bpe",
        }
    }
}
