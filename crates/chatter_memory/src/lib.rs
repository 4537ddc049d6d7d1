pub mod backend;
pub mod codec;
pub mod error;
pub mod overlay;
pub mod settings_store;
pub mod sqlite;
pub mod store;
pub mod topic;

pub use backend::{MemoryBackend, StorageBackend};
pub use codec::StoreKey;
pub use error::{StoreError, StoreResult};
pub use overlay::{Overlay, OverlayStore, ScopeDescriptor, TokenBias, OVERLAY_TABLE};
pub use settings_store::{SettingsStore, SETTINGS_TABLE};
pub use sqlite::{connect_pool, SqliteBackend};
pub use store::{CacheStats, Database, IndexedStore, StoreOptions};
pub use topic::{bias_strength, TopicEntry, TopicKey, TopicMemory, TopicScope, TOPIC_MEMORY_TABLE};
