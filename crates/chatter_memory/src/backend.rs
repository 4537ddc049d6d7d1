use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Durable side of an [`IndexedStore`](crate::IndexedStore).
///
/// Rows are `(encoded key, encoded value)` pairs. Ordered operations sort by
/// encoded key. A backend owns exactly one logical table.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn table(&self) -> &str;

    async fn load(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or replace. Must be durable when it returns.
    async fn save(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Returns whether a row was removed.
    async fn remove(&self, key: &str) -> StoreResult<bool>;

    async fn scan(&self) -> StoreResult<Vec<(String, String)>>;

    async fn scan_keys(&self) -> StoreResult<Vec<String>>;

    /// The `index`-th key in key order.
    async fn key_at(&self, index: u64) -> StoreResult<Option<String>>;

    async fn count(&self) -> StoreResult<u64>;

    /// Remove every row; returns how many were removed.
    async fn clear(&self) -> StoreResult<u64>;
}

/// Table names end up inside SQL text, so only plain identifiers are accepted.
pub fn validate_table_name(table: &str) -> StoreResult<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(table.to_string()))
    }
}

/// Ordered in-memory table. Used by tests and by bots that should forget
/// everything on restart.
pub struct MemoryBackend {
    table: String,
    rows: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new(table: &str) -> StoreResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            table: table.to_string(),
            rows: RwLock::new(BTreeMap::new()),
        })
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn table(&self) -> &str {
        &self.table
    }

    async fn load(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> StoreResult<()> {
        self.rows
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.rows.write().await.remove(key).is_some())
    }

    async fn scan(&self) -> StoreResult<Vec<(String, String)>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn scan_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.rows.read().await.keys().cloned().collect())
    }

    async fn key_at(&self, index: u64) -> StoreResult<Option<String>> {
        let index = usize::try_from(index).unwrap_or(usize::MAX);
        Ok(self.rows.read().await.keys().nth(index).cloned())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.rows.read().await.len() as u64)
    }

    async fn clear(&self) -> StoreResult<u64> {
        let mut rows = self.rows.write().await;
        let removed = rows.len() as u64;
        rows.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("ngrams").is_ok());
        assert!(validate_table_name("_topic_memory_v2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("words; DROP TABLE x").is_err());
    }

    #[tokio::test]
    async fn test_memory_backend_orders_keys() {
        let backend = MemoryBackend::new("t").unwrap();
        backend.save("b", "2").await.unwrap();
        backend.save("a", "1").await.unwrap();
        backend.save("c", "3").await.unwrap();

        assert_eq!(backend.scan_keys().await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(backend.key_at(1).await.unwrap().as_deref(), Some("b"));
        assert_eq!(backend.key_at(3).await.unwrap(), None);
        assert!(backend.remove("b").await.unwrap());
        assert!(!backend.remove("b").await.unwrap());
        assert_eq!(backend.clear().await.unwrap(), 2);
        assert_eq!(backend.count().await.unwrap(), 0);
    }
}
