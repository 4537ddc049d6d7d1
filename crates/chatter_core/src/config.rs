use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatterConfig {
    pub storage: StorageConfig,
    pub brain: BrainConfig,
    pub topic_memory: TopicMemoryConfig,
}

impl ChatterConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
                path: path.as_ref().display().to_string(),
                source,
            })?;
        let mut config: ChatterConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHATTER_DB_PATH") {
            self.storage.db_path = v;
        }
        if let Ok(v) = std::env::var("CHATTER_BOT_NAME") {
            self.brain.bot_name = v;
        }
        if let Ok(v) = std::env::var("CHATTER_TOPIC_SALT") {
            if !v.trim().is_empty() {
                self.topic_memory.salt = Some(v);
            }
        }
        if let Ok(v) = std::env::var("CHATTER_STORAGE_DEBUG") {
            self.storage.debug = matches!(v.as_str(), "1" | "true" | "yes");
        }
        // Production never rewrites table shapes behind the operator's back.
        if let Ok(v) = std::env::var("CHATTER_ENV") {
            if v.eq_ignore_ascii_case("production") {
                self.storage.allow_schema_migration = false;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding every collection. `:memory:` keeps everything in RAM.
    pub db_path: String,
    /// Entries kept in each collection's write-through cache.
    pub cache_size: usize,
    /// Upper bound for a single storage round trip.
    pub io_timeout_ms: u64,
    pub allow_schema_migration: bool,
    /// Trace every storage operation. No behavioral effect.
    pub debug: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "chatter.db".to_string(),
            cache_size: 1024,
            io_timeout_ms: 5_000,
            allow_schema_migration: true,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Name of the bot instance; keys the persisted settings record.
    pub bot_name: String,
    /// Tokens per n-gram window.
    pub chain_length: usize,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            bot_name: "chatter".to_string(),
            chain_length: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopicMemoryConfig {
    /// Server-side secret mixed into user identifiers. Topic memory is inert without it.
    pub salt: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ChatterConfig::default();
        assert_eq!(cfg.brain.chain_length, 3);
        assert_eq!(cfg.storage.cache_size, 1024);
        assert!(cfg.storage.allow_schema_migration);
        assert!(cfg.topic_memory.salt.is_none());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[brain]
bot_name = "parrot"
"#;
        let cfg: ChatterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.brain.bot_name, "parrot");
        // Defaults for unspecified fields
        assert_eq!(cfg.brain.chain_length, 3);
        assert_eq!(cfg.storage.db_path, "chatter.db");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[storage]
db_path = "data/brain.db"
cache_size = 64
io_timeout_ms = 250
allow_schema_migration = false
debug = true

[brain]
bot_name = "parrot"
chain_length = 2

[topic_memory]
salt = "pepper"
"#;
        let cfg: ChatterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.storage.db_path, "data/brain.db");
        assert_eq!(cfg.storage.cache_size, 64);
        assert_eq!(cfg.storage.io_timeout_ms, 250);
        assert!(!cfg.storage.allow_schema_migration);
        assert!(cfg.storage.debug);
        assert_eq!(cfg.brain.chain_length, 2);
        assert_eq!(cfg.topic_memory.salt.as_deref(), Some("pepper"));
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("CHATTER_BOT_NAME", "envbot");
        std::env::set_var("CHATTER_ENV", "production");

        let mut cfg = ChatterConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.brain.bot_name, "envbot");
        assert!(!cfg.storage.allow_schema_migration);

        std::env::remove_var("CHATTER_BOT_NAME");
        std::env::remove_var("CHATTER_ENV");

        let cfg = ChatterConfig::load_or_default("/nonexistent/path.toml");
        assert_eq!(cfg.brain.bot_name, "chatter");
    }
}
