use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Separator hashed between tokens; cannot occur inside a token.
const TOKEN_SEPARATOR: u8 = 0x1f;

/// Deterministic identifier of an ordered token window.
pub fn ngram_id<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut hasher = Sha256::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            hasher.update([TOKEN_SEPARATOR]);
        }
        hasher.update(token.as_ref().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// A fixed-length window of tokens and what was seen around it.
///
/// `tokens` never changes once created; learning only sets the boundary flags
/// and adds to the transition counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ngram {
    pub tokens: Vec<String>,
    pub can_start: bool,
    pub can_end: bool,
    pub next_tokens: BTreeMap<String, u64>,
    pub previous_tokens: BTreeMap<String, u64>,
}

impl Ngram {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            can_start: false,
            can_end: false,
            next_tokens: BTreeMap::new(),
            previous_tokens: BTreeMap::new(),
        }
    }

    pub fn record_next(&mut self, token: &str) {
        *self.next_tokens.entry(token.to_string()).or_insert(0) += 1;
    }

    pub fn record_previous(&mut self, token: &str) {
        *self.previous_tokens.entry(token.to_string()).or_insert(0) += 1;
    }

    /// The window after appending `token`: drop the first token, push `token`.
    pub fn shifted_forward(&self, token: &str) -> Vec<String> {
        let mut tokens: Vec<String> = self.tokens.iter().skip(1).cloned().collect();
        tokens.push(token.to_string());
        tokens
    }

    /// The window after prepending `token`: drop the last token.
    pub fn shifted_backward(&self, token: &str) -> Vec<String> {
        let keep = self.tokens.len().saturating_sub(1);
        let mut tokens = Vec::with_capacity(self.tokens.len());
        tokens.push(token.to_string());
        tokens.extend(self.tokens.iter().take(keep).cloned());
        tokens
    }
}
