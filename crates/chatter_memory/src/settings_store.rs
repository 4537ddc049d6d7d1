use crate::error::StoreResult;
use crate::store::IndexedStore;
use chatter_core::BotSettings;

pub const SETTINGS_TABLE: &str = "bot_settings";

/// One `BotSettings` record per named bot instance.
pub struct SettingsStore {
    store: IndexedStore<String, BotSettings>,
}

impl SettingsStore {
    pub fn new(store: IndexedStore<String, BotSettings>) -> Self {
        Self { store }
    }

    /// Stored settings for `bot_name`, or defaults for a bot seen for the first time.
    pub async fn load_or_default(&self, bot_name: &str) -> StoreResult<BotSettings> {
        match self.store.get(&bot_name.to_string()).await? {
            Some(settings) => {
                tracing::info!("Loaded settings for bot '{}'", bot_name);
                Ok(settings)
            }
            None => {
                tracing::info!("No stored settings for bot '{}', using defaults", bot_name);
                Ok(BotSettings::default())
            }
        }
    }

    pub async fn save(&self, bot_name: &str, settings: &BotSettings) -> StoreResult<()> {
        self.store.set(&bot_name.to_string(), settings.clone()).await?;
        tracing::debug!("Settings saved for bot '{}'", bot_name);
        Ok(())
    }

    pub async fn bot_names(&self) -> StoreResult<Vec<String>> {
        self.store.keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settings_persist_per_bot() {
        let settings = SettingsStore::new(IndexedStore::in_memory(SETTINGS_TABLE, 4).unwrap());

        let fresh = settings.load_or_default("parrot").await.unwrap();
        assert_eq!(fresh, BotSettings::default());

        let mut angry = fresh.clone();
        angry.anger_level = 7.5;
        angry.number_of_lines = 2;
        settings.save("parrot", &angry).await.unwrap();

        assert_eq!(settings.load_or_default("parrot").await.unwrap(), angry);
        assert_eq!(
            settings.load_or_default("crow").await.unwrap(),
            BotSettings::default()
        );
        assert_eq!(settings.bot_names().await.unwrap(), vec!["parrot"]);
    }
}
