//! The lexical chain model.
//!
//! Two collections make up the brain:
//! - the **lexicon**: token -> ids of every window containing it
//! - the **n-gram graph**: id -> [`Ngram`] (window, boundary flags, transitions)
//!
//! Learning slides a `chain_length` window over each utterance. Generation
//! picks a window containing the seed and grows it backwards until a window
//! that can start an utterance, then forwards until one that can end it.

use crate::ngram::{ngram_id, Ngram};
use crate::sampling::{pick_ranked, pick_uniform};
use chatter_core::tokenize;
use chatter_memory::{Database, IndexedStore, StoreResult, TokenBias};
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub const LEXICON_TABLE: &str = "lexicon";
pub const NGRAM_TABLE: &str = "ngrams";

/// Returned by [`Brain::get_random_seed`] when nothing has been learned.
pub const NO_WORDS: &str = "I know no words";
/// Returned by [`Brain::get_response`] when the graph holds no windows.
pub const EMPTY_BRAIN: &str = "my brain is empty";
/// Returned by [`Brain::get_response`] when the seed leads to no window.
pub const NOT_ENOUGH_INFORMATION: &str = "I do not know enough information";

pub const DEFAULT_RECURSION: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrainStats {
    pub words: u64,
    pub ngrams: u64,
    pub chain_length: usize,
}

pub struct Brain {
    lexicon: IndexedStore<String, BTreeSet<String>>,
    ngrams: IndexedStore<String, Ngram>,
    chain_length: usize,
    recursion: usize,
}

impl Brain {
    pub fn new(
        lexicon: IndexedStore<String, BTreeSet<String>>,
        ngrams: IndexedStore<String, Ngram>,
        chain_length: usize,
    ) -> Self {
        Self {
            lexicon,
            ngrams,
            chain_length: chain_length.max(1),
            recursion: DEFAULT_RECURSION,
        }
    }

    pub async fn open(db: &Database, chain_length: usize) -> StoreResult<Self> {
        let lexicon = db.collection(LEXICON_TABLE).await?;
        let ngrams = db.collection(NGRAM_TABLE).await?;
        Ok(Self::new(lexicon, ngrams, chain_length))
    }

    /// A brain that forgets everything when dropped.
    pub fn in_memory(chain_length: usize) -> StoreResult<Self> {
        Ok(Self::new(
            IndexedStore::in_memory(LEXICON_TABLE, 1024)?,
            IndexedStore::in_memory(NGRAM_TABLE, 1024)?,
            chain_length,
        ))
    }

    pub fn chain_length(&self) -> usize {
        self.chain_length
    }

    pub fn recursion(&self) -> usize {
        self.recursion
    }

    /// Max traversal steps per direction for subsequent generations.
    pub fn set_recursion(&mut self, recursion: usize) {
        self.recursion = recursion;
    }

    pub fn lexicon(&self) -> &IndexedStore<String, BTreeSet<String>> {
        &self.lexicon
    }

    pub fn ngrams(&self) -> &IndexedStore<String, Ngram> {
        &self.ngrams
    }

    pub async fn stats(&self) -> StoreResult<BrainStats> {
        Ok(BrainStats {
            words: self.lexicon.len().await?,
            ngrams: self.ngrams.len().await?,
            chain_length: self.chain_length,
        })
    }

    /// Learn every window of `text`. Returns `false`, touching nothing, when
    /// the text has too few tokens to form a single transition.
    pub async fn learn(&mut self, text: &str) -> StoreResult<bool> {
        let tokens = tokenize(text);
        let n = self.chain_length;
        if tokens.len() < n + 1 {
            tracing::debug!("Not learning '{}': {} token(s)", text, tokens.len());
            return Ok(false);
        }

        // Gather every change first, then write: windows before lexicon
        // entries, so the lexicon never names a window that was not stored.
        let mut touched: BTreeMap<String, Ngram> = BTreeMap::new();
        let mut lexicon_additions: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for start in 0..=(tokens.len() - n) {
            let window = &tokens[start..start + n];
            let id = ngram_id(window);
            if !touched.contains_key(&id) {
                let ngram = match self.ngrams.get(&id).await? {
                    Some(existing) => existing,
                    None => Ngram::new(window.to_vec()),
                };
                touched.insert(id.clone(), ngram);
            }
            let Some(ngram) = touched.get_mut(&id) else {
                continue;
            };

            if start == 0 {
                ngram.can_start = true;
            }
            if start + n == tokens.len() {
                ngram.can_end = true;
            }
            if let Some(next) = tokens.get(start + n) {
                ngram.record_next(next);
            }
            if start > 0 {
                ngram.record_previous(&tokens[start - 1]);
            }
            for token in window {
                lexicon_additions
                    .entry(token.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }

        let windows = touched.len();
        for (id, ngram) in touched {
            self.ngrams.set(&id, ngram).await?;
        }
        for (token, ids) in lexicon_additions {
            let mut known = self.lexicon.get(&token).await?.unwrap_or_default();
            let before = known.len();
            known.extend(ids);
            if known.len() != before {
                self.lexicon.set(&token, known).await?;
            }
        }

        tracing::debug!("Learned {} token(s) across {} window(s)", tokens.len(), windows);
        Ok(true)
    }

    /// A token of `text` chosen uniformly, or a random known word when the
    /// text has no tokens.
    pub async fn get_seed<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> StoreResult<String> {
        let tokens = tokenize(text);
        match pick_uniform(rng, tokens.len()) {
            Some(index) => Ok(tokens[index].clone()),
            None => self.get_random_seed(rng).await,
        }
    }

    /// A known word chosen uniformly, or [`NO_WORDS`] for an empty lexicon.
    pub async fn get_random_seed<R: Rng + ?Sized>(&self, rng: &mut R) -> StoreResult<String> {
        let count = self.lexicon.len().await?;
        let Some(index) = pick_uniform(rng, count as usize) else {
            return Ok(NO_WORDS.to_string());
        };
        Ok(self
            .lexicon
            .key_at(index as u64)
            .await?
            .unwrap_or_else(|| NO_WORDS.to_string()))
    }

    /// Prefer a remembered topic keyword with probability `strength`, falling
    /// back to [`Brain::get_seed`]. Only keywords the brain knows qualify;
    /// the most significant known keyword wins.
    pub async fn get_topic_seed<R: Rng + ?Sized>(
        &self,
        text: &str,
        keywords: &[String],
        strength: f64,
        rng: &mut R,
    ) -> StoreResult<String> {
        if !keywords.is_empty() && strength > 0.0 {
            let draw: f64 = rng.gen();
            if draw < strength {
                for keyword in keywords {
                    if self.lexicon.has(keyword).await? {
                        tracing::debug!("Seeding from topic keyword '{}'", keyword);
                        return Ok(keyword.clone());
                    }
                }
            }
        }
        self.get_seed(text, rng).await
    }

    /// Generate a reply around `seed` with no overlay bias.
    pub async fn get_response<R: Rng + ?Sized>(&self, seed: &str, rng: &mut R) -> StoreResult<String> {
        self.respond_with_bias(seed, &TokenBias::new(), rng).await
    }

    /// Generate a reply around `seed`, letting `bias` nudge every choice.
    pub async fn respond_with_bias<R: Rng + ?Sized>(
        &self,
        seed: &str,
        bias: &TokenBias,
        rng: &mut R,
    ) -> StoreResult<String> {
        if self.ngrams.is_empty().await? {
            return Ok(EMPTY_BRAIN.to_string());
        }

        let Some(start) = self.select_start_window(seed, bias, rng).await? else {
            return Ok(NOT_ENOUGH_INFORMATION.to_string());
        };

        let mut words: VecDeque<String> = start.tokens.iter().cloned().collect();
        self.grow_backward(&start, &mut words, bias, rng).await?;
        self.grow_forward(&start, &mut words, bias, rng).await?;

        Ok(Vec::from(words).join(" "))
    }

    async fn select_start_window<R: Rng + ?Sized>(
        &self,
        seed: &str,
        bias: &TokenBias,
        rng: &mut R,
    ) -> StoreResult<Option<Ngram>> {
        let Some(seed) = tokenize(seed).into_iter().next() else {
            return Ok(None);
        };
        let ids = self.lexicon.get(&seed).await?.unwrap_or_default();

        let mut candidates: Vec<(String, Ngram)> = Vec::with_capacity(ids.len());
        for id in ids {
            match self.ngrams.get(&id).await? {
                Some(ngram) => candidates.push((id, ngram)),
                None => tracing::warn!("Lexicon entry '{}' names missing window {}", seed, id),
            }
        }

        let ranked = candidates
            .iter()
            .map(|(id, ngram)| {
                let weight: f64 = ngram.tokens.iter().map(|t| bias.weight(t)).product();
                (id.as_str(), weight, ngram)
            })
            .collect();
        Ok(pick_ranked(rng, ranked).cloned())
    }

    async fn grow_backward<R: Rng + ?Sized>(
        &self,
        start: &Ngram,
        words: &mut VecDeque<String>,
        bias: &TokenBias,
        rng: &mut R,
    ) -> StoreResult<()> {
        let mut window = start.clone();
        let mut steps = 0;
        while !window.can_start && steps < self.recursion {
            let Some(token) = choose_transition(&window.previous_tokens, bias, rng) else {
                break;
            };
            let Some(previous) = self.ngrams.get(&ngram_id(&window.shifted_backward(&token))).await?
            else {
                break;
            };
            words.push_front(token);
            window = previous;
            steps += 1;
        }
        Ok(())
    }

    async fn grow_forward<R: Rng + ?Sized>(
        &self,
        start: &Ngram,
        words: &mut VecDeque<String>,
        bias: &TokenBias,
        rng: &mut R,
    ) -> StoreResult<()> {
        let mut window = start.clone();
        let mut steps = 0;
        while !window.can_end && steps < self.recursion {
            let Some(token) = choose_transition(&window.next_tokens, bias, rng) else {
                break;
            };
            let Some(next) = self.ngrams.get(&ngram_id(&window.shifted_forward(&token))).await?
            else {
                break;
            };
            words.push_back(token);
            window = next;
            steps += 1;
        }
        Ok(())
    }
}

/// Sample a transition with probability proportional to count x overlay weight.
fn choose_transition<R: Rng + ?Sized>(
    transitions: &BTreeMap<String, u64>,
    bias: &TokenBias,
    rng: &mut R,
) -> Option<String> {
    let ranked = transitions
        .iter()
        .map(|(token, count)| (token.as_str(), *count as f64 * bias.weight(token), token))
        .collect();
    pick_ranked(rng, ranked).cloned()
}
