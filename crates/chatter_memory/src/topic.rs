//! Topic memory - short-lived keywords per (user, channel).
//!
//! User identifiers never reach storage: they are salted with a server-side
//! secret and hashed. Without a salt the feature is inert, it never fails the
//! message path. Entries die by time (`expires_at`) or by use
//! (`remaining_interactions`), and are deleted when they do.

use crate::codec::StoreKey;
use crate::error::StoreResult;
use crate::store::IndexedStore;
use chatter_core::{extract_keywords, normalize_keywords, TopicMemorySettings};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

pub const TOPIC_MEMORY_TABLE: &str = "topic_memory";

/// Longest TTL honoured, one week.
const MAX_TTL_MINUTES: i64 = 7 * 24 * 60;

/// Who said it, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScope {
    pub user_id: String,
    pub channel_id: String,
}

impl TopicScope {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicKey {
    pub user_hash: String,
    pub channel_id: String,
}

impl StoreKey for TopicKey {
    const TAG: &'static str = "topic";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicEntry {
    /// Most significant first.
    pub keywords: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remaining_interactions: u32,
}

impl TopicEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && self.remaining_interactions > 0
    }
}

pub struct TopicMemory {
    store: IndexedStore<TopicKey, TopicEntry>,
    salt: Option<String>,
    warned_missing_salt: AtomicBool,
}

impl TopicMemory {
    pub fn new(store: IndexedStore<TopicKey, TopicEntry>, salt: Option<String>) -> Self {
        let salt = salt.filter(|s| !s.trim().is_empty());
        Self {
            store,
            salt,
            warned_missing_salt: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.salt.is_some()
    }

    /// Privacy-preserving storage key, or `None` (with a one-time warning)
    /// when no salt is configured.
    pub fn scope_key(&self, scope: &TopicScope) -> Option<TopicKey> {
        let Some(salt) = &self.salt else {
            if !self.warned_missing_salt.swap(true, Ordering::Relaxed) {
                tracing::warn!("Topic memory salt not configured; topic memory is disabled");
            }
            return None;
        };

        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b":");
        hasher.update(scope.user_id.as_bytes());
        Some(TopicKey {
            user_hash: format!("{:x}", hasher.finalize()),
            channel_id: scope.channel_id.clone(),
        })
    }

    /// Remember the keywords of `text` for this scope. Returns what was stored.
    pub async fn update(
        &self,
        scope: &TopicScope,
        text: &str,
        settings: &TopicMemorySettings,
    ) -> StoreResult<Vec<String>> {
        self.update_at(scope, text, settings, Utc::now()).await
    }

    pub async fn update_at(
        &self,
        scope: &TopicScope,
        text: &str,
        settings: &TopicMemorySettings,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<String>> {
        if !settings.enabled {
            return Ok(Vec::new());
        }
        let Some(key) = self.scope_key(scope) else {
            return Ok(Vec::new());
        };

        let keywords = extract_keywords(text, settings.keyword_count);
        if keywords.is_empty() {
            self.store.delete(&key).await?;
            return Ok(keywords);
        }

        let ttl = Duration::minutes(settings.ttl_minutes.clamp(1, MAX_TTL_MINUTES));
        let entry = TopicEntry {
            keywords: keywords.clone(),
            updated_at: now,
            expires_at: now + ttl,
            remaining_interactions: settings.max_interactions.max(1),
        };
        self.store.set(&key, entry).await?;
        tracing::debug!("Topic memory updated for channel {}: {:?}", key.channel_id, keywords);
        Ok(keywords)
    }

    /// Take this scope's keywords for one interaction, spending one use.
    pub async fn consume(&self, scope: &TopicScope) -> StoreResult<Vec<String>> {
        self.consume_at(scope, Utc::now()).await
    }

    pub async fn consume_at(
        &self,
        scope: &TopicScope,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<String>> {
        let Some(key) = self.scope_key(scope) else {
            return Ok(Vec::new());
        };
        let Some(mut entry) = self.store.get(&key).await? else {
            return Ok(Vec::new());
        };

        if !entry.is_live(now) {
            self.store.delete(&key).await?;
            tracing::debug!("Topic memory expired for channel {}", key.channel_id);
            return Ok(Vec::new());
        }

        let keywords = normalize_keywords(&entry.keywords);
        entry.remaining_interactions -= 1;
        if entry.remaining_interactions == 0 {
            self.store.delete(&key).await?;
        } else {
            self.store.set(&key, entry).await?;
        }
        Ok(keywords)
    }

    /// Drop every entry that is no longer live. Returns how many were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let dead: Vec<TopicKey> = self
            .store
            .entries()
            .await?
            .into_iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key)
            .collect();
        self.store.delete_many(&dead).await
    }

    pub fn store(&self) -> &IndexedStore<TopicKey, TopicEntry> {
        &self.store
    }
}

/// How strongly seed selection should prefer a remembered keyword, in `[0, 1]`.
pub fn bias_strength(settings: &TopicMemorySettings) -> f64 {
    if !settings.enabled || settings.bias_strength.is_nan() {
        return 0.0;
    }
    settings.bias_strength.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(salt: Option<&str>) -> TopicMemory {
        TopicMemory::new(
            IndexedStore::in_memory(TOPIC_MEMORY_TABLE, 16).unwrap(),
            salt.map(str::to_string),
        )
    }

    #[test]
    fn test_scope_key_hides_user_id() {
        let topics = memory(Some("pepper"));
        let key = topics.scope_key(&TopicScope::new("alice", "general")).unwrap();
        assert!(!key.user_hash.contains("alice"));
        assert_eq!(key.user_hash.len(), 64);
        assert_eq!(key.channel_id, "general");

        let other = memory(Some("salt")).scope_key(&TopicScope::new("alice", "general"));
        assert_ne!(Some(key), other);
    }

    #[tokio::test]
    async fn test_missing_salt_is_inert() {
        let topics = memory(None);
        let scope = TopicScope::new("alice", "general");
        let settings = TopicMemorySettings::default();

        assert!(!topics.is_enabled());
        assert!(topics
            .update(&scope, "rust rust cargo", &settings)
            .await
            .unwrap()
            .is_empty());
        assert!(topics.consume(&scope).await.unwrap().is_empty());
        assert!(topics.store().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_keywords_delete_existing_entry() {
        let topics = memory(Some("pepper"));
        let scope = TopicScope::new("alice", "general");
        let settings = TopicMemorySettings::default();

        topics.update(&scope, "talking about rust", &settings).await.unwrap();
        assert_eq!(topics.store().len().await.unwrap(), 1);

        let stored = topics.update(&scope, "ok 42 hi", &settings).await.unwrap();
        assert!(stored.is_empty());
        assert_eq!(topics.store().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_single_use_entry_is_deleted_after_consume() {
        let topics = memory(Some("pepper"));
        let scope = TopicScope::new("alice", "general");
        let settings = TopicMemorySettings {
            max_interactions: 1,
            ..Default::default()
        };

        topics
            .update(&scope, "cats cats dogs and more cats", &settings)
            .await
            .unwrap();
        let first = topics.consume(&scope).await.unwrap();
        assert_eq!(first, vec!["cats", "dogs", "and"]);
        assert!(topics.store().is_empty().await.unwrap());
        assert!(topics.consume(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_consume_decrements_budget() {
        let topics = memory(Some("pepper"));
        let scope = TopicScope::new("alice", "general");
        let settings = TopicMemorySettings {
            max_interactions: 2,
            ..Default::default()
        };
        topics.update(&scope, "rust borrow checker", &settings).await.unwrap();

        assert!(!topics.consume(&scope).await.unwrap().is_empty());
        let key = topics.scope_key(&scope).unwrap();
        let entry = topics.store().get(&key).await.unwrap().unwrap();
        assert_eq!(entry.remaining_interactions, 1);

        assert!(!topics.consume(&scope).await.unwrap().is_empty());
        assert!(topics.consume(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_is_deleted_not_returned() {
        let topics = memory(Some("pepper"));
        let scope = TopicScope::new("alice", "general");
        let settings = TopicMemorySettings {
            ttl_minutes: 5,
            ..Default::default()
        };
        let start = Utc::now();
        topics
            .update_at(&scope, "rust borrow checker", &settings, start)
            .await
            .unwrap();

        let later = start + Duration::minutes(6);
        assert!(topics.consume_at(&scope, later).await.unwrap().is_empty());
        assert!(topics.store().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let topics = memory(Some("pepper"));
        let settings = TopicMemorySettings {
            ttl_minutes: 5,
            ..Default::default()
        };
        let start = Utc::now();
        topics
            .update_at(&TopicScope::new("a", "c"), "old topic here", &settings, start)
            .await
            .unwrap();
        topics
            .update_at(
                &TopicScope::new("b", "c"),
                "fresh topic here",
                &settings,
                start + Duration::minutes(4),
            )
            .await
            .unwrap();

        let purged = topics
            .purge_expired(start + Duration::minutes(6))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(topics.store().len().await.unwrap(), 1);
    }

    #[test]
    fn test_bias_strength_is_clamped() {
        let mut settings = TopicMemorySettings::default();
        settings.bias_strength = 3.0;
        assert_eq!(bias_strength(&settings), 1.0);
        settings.bias_strength = -1.0;
        assert_eq!(bias_strength(&settings), 0.0);
        settings.bias_strength = f64::NAN;
        assert_eq!(bias_strength(&settings), 0.0);
        settings.bias_strength = 0.4;
        settings.enabled = false;
        assert_eq!(bias_strength(&settings), 0.0);
    }
}
