//! Persistent indexed store: a bounded LRU cache in front of a storage backend.
//!
//! Writes go to the backend first and only then to the cache, so a value the
//! cache hands out has always been persisted. Reads that miss the cache fall
//! through to the backend and populate it.

use crate::backend::{MemoryBackend, StorageBackend};
use crate::codec::{decode_key, decode_value, encode_key, encode_value_exact, StoreKey};
use crate::error::{StoreError, StoreResult};
use crate::sqlite::{connect_pool, SqliteBackend};
use chatter_core::StorageConfig;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How one logical collection is stored.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// SQLite file; `:memory:` for a private in-memory database.
    pub filename: String,
    pub table: String,
    pub cache_size: usize,
    pub allow_schema_migration: bool,
    /// Log every storage operation at debug level.
    pub debug: bool,
    pub io_timeout: Duration,
}

impl StoreOptions {
    pub fn new(filename: &str, table: &str) -> Self {
        Self::from_config(
            &StorageConfig {
                db_path: filename.to_string(),
                ..StorageConfig::default()
            },
            table,
        )
    }

    pub fn from_config(config: &StorageConfig, table: &str) -> Self {
        Self {
            filename: config.db_path.clone(),
            table: table.to_string(),
            cache_size: config.cache_size,
            allow_schema_migration: config.allow_schema_migration,
            debug: config.debug,
            io_timeout: Duration::from_millis(config.io_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub cached: usize,
}

pub struct IndexedStore<K, V> {
    backend: Arc<dyn StorageBackend>,
    cache: Mutex<LruCache<String, V>>,
    io_timeout: Duration,
    debug: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    _key: PhantomData<fn() -> K>,
}

impl<K, V> IndexedStore<K, V>
where
    K: StoreKey,
    V: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync,
{
    /// Open a collection in its own SQLite file.
    pub async fn open(options: StoreOptions) -> StoreResult<Self> {
        let pool = connect_pool(&options.filename).await?;
        let backend =
            SqliteBackend::open(pool, &options.table, options.allow_schema_migration).await?;
        Ok(Self::with_backend(Arc::new(backend), &options))
    }

    /// Wrap an already opened backend (shared pool, in-memory table, ...).
    pub fn with_backend(backend: Arc<dyn StorageBackend>, options: &StoreOptions) -> Self {
        let capacity = NonZeroUsize::new(options.cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            cache: Mutex::new(LruCache::new(capacity)),
            io_timeout: options.io_timeout,
            debug: options.debug,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            _key: PhantomData,
        }
    }

    /// A collection backed by an ordered in-memory table.
    pub fn in_memory(table: &str, cache_size: usize) -> StoreResult<Self> {
        let options = StoreOptions {
            cache_size,
            ..StoreOptions::new(":memory:", table)
        };
        Ok(Self::with_backend(
            Arc::new(MemoryBackend::new(table)?),
            &options,
        ))
    }

    pub fn table(&self) -> &str {
        self.backend.table()
    }

    pub async fn get(&self, key: &K) -> StoreResult<Option<V>> {
        let encoded = encode_key(key)?;
        let cached = self.lock_cache().get(&encoded).cloned();
        if let Some(value) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.trace("get (cache hit)", &encoded);
            return Ok(Some(value));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.trace("get (cache miss)", &encoded);
        let raw = self.guarded("get", self.backend.load(&encoded)).await?;
        match raw {
            Some(raw) => {
                let value: V = decode_value(self.table(), &encoded, &raw)?;
                self.lock_cache().put(encoded, value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Write-through: the value is durable before the cache sees it. Values
    /// that would not read back unchanged are refused and nothing is written.
    pub async fn set(&self, key: &K, value: V) -> StoreResult<()> {
        let encoded = encode_key(key)?;
        let raw = encode_value_exact(self.table(), &encoded, &value)?;
        self.trace("set", &encoded);
        self.guarded("set", self.backend.save(&encoded, &raw)).await?;
        self.lock_cache().put(encoded, value);
        Ok(())
    }

    pub async fn delete(&self, key: &K) -> StoreResult<bool> {
        let encoded = encode_key(key)?;
        self.trace("delete", &encoded);
        let removed = self
            .guarded("delete", self.backend.remove(&encoded))
            .await?;
        self.lock_cache().pop(&encoded);
        Ok(removed)
    }

    /// Delete several keys; returns how many existed.
    pub async fn delete_many(&self, keys: &[K]) -> StoreResult<usize> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// True for keys stored with the absent marker as well. A cached key
    /// counts as recently used, same as for `get`.
    pub async fn has(&self, key: &K) -> StoreResult<bool> {
        let encoded = encode_key(key)?;
        if self.lock_cache().get(&encoded).is_some() {
            return Ok(true);
        }
        self.trace("has", &encoded);
        let raw = self.guarded("has", self.backend.load(&encoded)).await?;
        Ok(raw.is_some())
    }

    /// All entries in key order.
    pub async fn entries(&self) -> StoreResult<Vec<(K, V)>> {
        self.trace("entries", "*");
        let rows = self.guarded("entries", self.backend.scan()).await?;
        rows.into_iter()
            .map(|(encoded, raw)| {
                let key = decode_key(self.table(), &encoded)?;
                let value = decode_value(self.table(), &encoded, &raw)?;
                Ok((key, value))
            })
            .collect()
    }

    pub async fn keys(&self) -> StoreResult<Vec<K>> {
        self.trace("keys", "*");
        let keys = self.guarded("keys", self.backend.scan_keys()).await?;
        keys.iter()
            .map(|encoded| decode_key(self.table(), encoded))
            .collect()
    }

    pub async fn values(&self) -> StoreResult<Vec<V>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// The `index`-th key in key order, for uniform sampling without a full scan.
    pub async fn key_at(&self, index: u64) -> StoreResult<Option<K>> {
        let encoded = self.guarded("key_at", self.backend.key_at(index)).await?;
        encoded
            .map(|encoded| decode_key(self.table(), &encoded))
            .transpose()
    }

    pub async fn len(&self) -> StoreResult<u64> {
        self.guarded("len", self.backend.count()).await
    }

    pub async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn clear(&self) -> StoreResult<u64> {
        self.trace("clear", "*");
        let removed = self.guarded("clear", self.backend.clear()).await?;
        self.lock_cache().clear();
        Ok(removed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cached: self.lock_cache().len(),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, LruCache<String, V>> {
        // The cache only mirrors persisted rows, so a poisoned lock is still usable.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn guarded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                table: self.table().to_string(),
                after: self.io_timeout,
            }),
        }
    }

    fn trace(&self, operation: &str, key: &str) {
        if self.debug {
            tracing::debug!(table = self.table(), key, "store {}", operation);
        }
    }
}

/// Opens every collection of one bot against a single storage location.
#[derive(Clone)]
pub struct Database {
    pool: Option<sqlx::Pool<sqlx::Sqlite>>,
    config: StorageConfig,
}

impl Database {
    /// Connect to the SQLite file named in the config.
    pub async fn connect(config: &StorageConfig) -> StoreResult<Self> {
        let pool = connect_pool(&config.db_path).await?;
        Ok(Self {
            pool: Some(pool),
            config: config.clone(),
        })
    }

    /// Keep every collection in process memory; nothing survives a restart.
    pub fn ephemeral(config: &StorageConfig) -> Self {
        Self {
            pool: None,
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub async fn collection<K, V>(&self, table: &str) -> StoreResult<IndexedStore<K, V>>
    where
        K: StoreKey,
        V: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync,
    {
        let options = StoreOptions::from_config(&self.config, table);
        let backend: Arc<dyn StorageBackend> = match &self.pool {
            Some(pool) => Arc::new(
                SqliteBackend::open(pool.clone(), table, options.allow_schema_migration).await?,
            ),
            None => Arc::new(MemoryBackend::new(table)?),
        };
        tracing::debug!("Opened collection '{}'", table);
        Ok(IndexedStore::with_backend(backend, &options))
    }
}
