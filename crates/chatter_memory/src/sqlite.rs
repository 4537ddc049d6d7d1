use crate::backend::{validate_table_name, StorageBackend};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};

/// Columns every collection table carries, in creation order.
const COLUMNS: [&str; 3] = ["key", "value", "updated_at"];

/// Open (creating if needed) the SQLite file behind one or more collections.
///
/// `":memory:"` gives a private in-memory database; the pool is pinned to a
/// single connection that never expires so the data lives as long as the pool.
pub async fn connect_pool(db_path: &str) -> StoreResult<Pool<Sqlite>> {
    let pool = if db_path == ":memory:" {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?
    } else {
        let db_url = format!("sqlite://{}?mode=rwc", db_path);
        SqlitePoolOptions::new()
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA busy_timeout = 5000")
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&db_url)
            .await?
    };
    tracing::debug!("Connected to SQLite at {}", db_path);
    Ok(pool)
}

/// One key/value table inside a SQLite database.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    table: String,
}

impl SqliteBackend {
    pub async fn open(
        pool: Pool<Sqlite>,
        table: &str,
        allow_schema_migration: bool,
    ) -> StoreResult<Self> {
        validate_table_name(table)?;
        let backend = Self {
            pool,
            table: table.to_string(),
        };
        backend.migrate(allow_schema_migration).await?;
        Ok(backend)
    }

    async fn migrate(&self, allow_schema_migration: bool) -> StoreResult<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT 0
            );
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;

        let present: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", self.table))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        let missing: Vec<String> = COLUMNS
            .iter()
            .filter(|c| !present.iter().any(|p| p == *c))
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        // Only the bookkeeping column can be added in place; a table without
        // key/value columns is not ours to rewrite.
        let only_timestamp = missing.iter().all(|c| c == "updated_at");
        if !allow_schema_migration || !only_timestamp {
            return Err(StoreError::SchemaMismatch {
                table: self.table.clone(),
                missing,
            });
        }

        sqlx::query(&format!(
            "ALTER TABLE {} ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0",
            self.table
        ))
        .execute(&self.pool)
        .await?;
        tracing::info!("Migrated table '{}': added updated_at column", self.table);
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn table(&self) -> &str {
        &self.table
    }

    async fn load(&self, key: &str) -> StoreResult<Option<String>> {
        let row = sqlx::query(&format!("SELECT value FROM {} WHERE key = ?", self.table))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn save(&self, key: &str, value: &str) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(&format!(
            "INSERT INTO {} (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            self.table
        ))
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE key = ?", self.table))
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self) -> StoreResult<Vec<(String, String)>> {
        let rows = sqlx::query(&format!("SELECT key, value FROM {} ORDER BY key", self.table))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }

    async fn scan_keys(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query(&format!("SELECT key FROM {} ORDER BY key", self.table))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("key")).collect())
    }

    async fn key_at(&self, index: u64) -> StoreResult<Option<String>> {
        let offset = i64::try_from(index).unwrap_or(i64::MAX);
        let row = sqlx::query(&format!(
            "SELECT key FROM {} ORDER BY key LIMIT 1 OFFSET ?",
            self.table
        ))
        .bind(offset)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("key")))
    }

    async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?
            .get("n");
        Ok(count.max(0) as u64)
    }

    async fn clear(&self) -> StoreResult<u64> {
        let result = sqlx::query(&format!("DELETE FROM {}", self.table))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
