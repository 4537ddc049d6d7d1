//! Weighting overlays: per-scope token weights that nudge generation.
//!
//! Overlays never remove a choice. Weights are clamped into
//! [`MIN_WEIGHT`, `MAX_WEIGHT`] before they are stored, so the worst an
//! overlay can do is make a token unlikely.

use crate::codec::StoreKey;
use crate::error::StoreResult;
use crate::store::IndexedStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const OVERLAY_TABLE: &str = "overlays";
pub const MIN_WEIGHT: f64 = 0.01;
pub const MAX_WEIGHT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum ScopeDescriptor {
    Global,
    Community(String),
    Conversation(String),
}

impl StoreKey for ScopeDescriptor {
    const TAG: &'static str = "scope";
}

impl fmt::Display for ScopeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeDescriptor::Global => write!(f, "global"),
            ScopeDescriptor::Community(id) => write!(f, "community:{}", id),
            ScopeDescriptor::Conversation(id) => write!(f, "conversation:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub scope: ScopeDescriptor,
    pub weights: BTreeMap<String, f64>,
    pub updated_at: DateTime<Utc>,
}

/// Merged token weights for one generation pass. Tokens without an entry weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBias {
    weights: HashMap<String, f64>,
}

impl TokenBias {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, token: &str) -> f64 {
        self.weights.get(token).copied().unwrap_or(1.0)
    }

    pub fn is_neutral(&self) -> bool {
        self.weights.is_empty()
    }

    /// Multiply another layer of weights into this one.
    pub fn apply(&mut self, weights: &BTreeMap<String, f64>) {
        for (token, weight) in weights {
            let token = token.to_lowercase();
            let merged = self.weight(&token) * clamp_weight(*weight);
            self.weights.insert(token, merged);
        }
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for TokenBias {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let layer: BTreeMap<String, f64> = iter.into_iter().map(|(t, w)| (t.into(), w)).collect();
        let mut bias = TokenBias::new();
        bias.apply(&layer);
        bias
    }
}

fn clamp_weight(weight: f64) -> f64 {
    if weight.is_nan() {
        return 1.0;
    }
    weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
}

pub struct OverlayStore {
    store: IndexedStore<ScopeDescriptor, Overlay>,
}

impl OverlayStore {
    pub fn new(store: IndexedStore<ScopeDescriptor, Overlay>) -> Self {
        Self { store }
    }

    /// Replace the weights for a scope. Tokens are lower-cased to match learned tokens.
    pub async fn set_overlay(
        &self,
        scope: &ScopeDescriptor,
        weights: BTreeMap<String, f64>,
    ) -> StoreResult<Overlay> {
        let weights: BTreeMap<String, f64> = weights
            .into_iter()
            .filter(|(token, _)| !token.trim().is_empty())
            .map(|(token, weight)| (token.trim().to_lowercase(), clamp_weight(weight)))
            .collect();
        let overlay = Overlay {
            scope: scope.clone(),
            weights,
            updated_at: Utc::now(),
        };
        self.store.set(scope, overlay.clone()).await?;
        tracing::debug!("Overlay {} set with {} weights", scope, overlay.weights.len());
        Ok(overlay)
    }

    pub async fn get_overlay(&self, scope: &ScopeDescriptor) -> StoreResult<Option<Overlay>> {
        self.store.get(scope).await
    }

    pub async fn delete_overlay(&self, scope: &ScopeDescriptor) -> StoreResult<bool> {
        self.store.delete(scope).await
    }

    /// Every scope that currently has an overlay.
    pub async fn list_contexts(&self) -> StoreResult<Vec<ScopeDescriptor>> {
        let mut scopes = self.store.keys().await?;
        scopes.sort();
        Ok(scopes)
    }

    /// Multiply the overlays of the given scopes, in order, into one bias.
    /// Scopes without an overlay contribute nothing.
    pub async fn resolve_bias(&self, scopes: &[ScopeDescriptor]) -> StoreResult<TokenBias> {
        let mut bias = TokenBias::new();
        for scope in scopes {
            if let Some(overlay) = self.store.get(scope).await? {
                bias.apply(&overlay.weights);
            }
        }
        Ok(bias)
    }
}
