pub mod config;
pub mod settings;
pub mod text;

pub use config::{BrainConfig, ChatterConfig, ConfigError, StorageConfig, TopicMemoryConfig};
pub use settings::{BotSettings, RespondsTo, TopicMemorySettings};
pub use text::{extract_keywords, is_shouting, normalize_keywords, tokenize};
