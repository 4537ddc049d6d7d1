//! Chat Coordinator - runs one inbound message through every subsystem
//!
//! Per message:
//! 1. Topic memory drops expired entries (at most once a minute) and remembers
//!    the message's keywords for (author, channel)
//! 2. The brain learns the text
//! 3. Mood moves; triggers, addressing and conversation age decide whether to speak
//! 4. A reply is generated from a (possibly topic-biased) seed under the
//!    overlay bias of the message's scopes, and upper-cased when yelling

use crate::brain::Brain;
use anyhow::{Context, Result};
use chatter_core::{BotSettings, ChatterConfig, RespondsTo};
use chatter_limbic::{should_respond, should_yell, ResponseTrigger};
use chatter_memory::{
    bias_strength, Database, OverlayStore, ScopeDescriptor, SettingsStore, TopicMemory,
    TopicScope, OVERLAY_TABLE, SETTINGS_TABLE, TOPIC_MEMORY_TABLE,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;

/// Minimum gap between two sweeps of expired topic entries.
const TOPIC_PURGE_INTERVAL_SECS: i64 = 60;

/// A chat message as seen by the engine, stripped of any platform detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author_id: String,
    pub channel_id: String,
    /// Server / guild / workspace the channel belongs to, if any.
    pub community_id: Option<String>,
    pub text: String,
    pub from_bot: bool,
    /// The platform says the message addresses this bot directly.
    pub mentions_bot: bool,
}

impl InboundMessage {
    pub fn new(
        author_id: impl Into<String>,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            channel_id: channel_id.into(),
            community_id: None,
            text: text.into(),
            from_bot: false,
            mentions_bot: false,
        }
    }

    pub fn in_community(mut self, community_id: impl Into<String>) -> Self {
        self.community_id = Some(community_id.into());
        self
    }

    pub fn from_bot(mut self) -> Self {
        self.from_bot = true;
        self
    }

    pub fn mentioning_bot(mut self) -> Self {
        self.mentions_bot = true;
        self
    }

    /// Overlay scopes in the order their weights are multiplied.
    pub fn scopes(&self) -> Vec<ScopeDescriptor> {
        let mut scopes = vec![ScopeDescriptor::Global];
        if let Some(community) = &self.community_id {
            scopes.push(ScopeDescriptor::Community(community.clone()));
        }
        scopes.push(ScopeDescriptor::Conversation(self.channel_id.clone()));
        scopes
    }
}

pub struct ChatCoordinator {
    bot_name: String,
    brain: Brain,
    topics: TopicMemory,
    overlays: OverlayStore,
    settings_store: SettingsStore,
    settings: BotSettings,
    trigger: Option<ResponseTrigger>,
    name_trigger: Option<ResponseTrigger>,
    /// Last reply time per channel.
    last_replies: HashMap<String, DateTime<Utc>>,
    last_topic_purge: Option<DateTime<Utc>>,
}

impl ChatCoordinator {
    /// Connect to the configured database and load this bot's settings.
    pub async fn open(config: &ChatterConfig) -> Result<Self> {
        let db = Database::connect(&config.storage)
            .await
            .with_context(|| format!("Failed to open database at {}", config.storage.db_path))?;
        Self::from_database(&db, config).await
    }

    pub async fn from_database(db: &Database, config: &ChatterConfig) -> Result<Self> {
        let brain = Brain::open(db, config.brain.chain_length)
            .await
            .context("Failed to open brain collections")?;
        let topics = TopicMemory::new(
            db.collection(TOPIC_MEMORY_TABLE)
                .await
                .context("Failed to open topic memory")?,
            config.topic_memory.salt.clone(),
        );
        let overlays = OverlayStore::new(
            db.collection(OVERLAY_TABLE)
                .await
                .context("Failed to open overlays")?,
        );
        let settings_store = SettingsStore::new(
            db.collection(SETTINGS_TABLE)
                .await
                .context("Failed to open settings")?,
        );

        let bot_name = config.brain.bot_name.clone();
        let settings = settings_store
            .load_or_default(&bot_name)
            .await
            .context("Failed to load bot settings")?;
        let trigger = compile_trigger(settings.responds_to.as_ref());
        let name_trigger = compile_trigger(Some(&RespondsTo::Literal(bot_name.clone())));

        let mut brain = brain;
        brain.set_recursion(settings.recursion);

        tracing::info!(
            "Chat coordinator ready for '{}' (chain length {})",
            bot_name,
            brain.chain_length()
        );
        Ok(Self {
            bot_name,
            brain,
            topics,
            overlays,
            settings_store,
            settings,
            trigger,
            name_trigger,
            last_replies: HashMap::new(),
            last_topic_purge: None,
        })
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn brain_mut(&mut self) -> &mut Brain {
        &mut self.brain
    }

    pub fn topics(&self) -> &TopicMemory {
        &self.topics
    }

    pub fn overlays(&self) -> &OverlayStore {
        &self.overlays
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    /// Changes take effect from the next handled message.
    pub fn settings_mut(&mut self) -> &mut BotSettings {
        &mut self.settings
    }

    /// Replace the responds-to rule. An invalid pattern leaves the old rule in place.
    pub fn set_responds_to(&mut self, rule: Option<RespondsTo>) -> Result<()> {
        self.trigger = match &rule {
            Some(rule) => ResponseTrigger::compile(rule)?,
            None => None,
        };
        self.settings.responds_to = rule;
        Ok(())
    }

    pub async fn save_settings(&self) -> Result<()> {
        self.settings_store
            .save(&self.bot_name, &self.settings)
            .await
            .with_context(|| format!("Failed to save settings for '{}'", self.bot_name))
    }

    pub async fn handle_message<R: Rng + ?Sized>(
        &mut self,
        msg: &InboundMessage,
        rng: &mut R,
    ) -> Result<Option<String>> {
        self.handle_message_at(msg, Utc::now(), rng).await
    }

    /// Process one message at `now`. Returns the reply, if the bot speaks.
    pub async fn handle_message_at<R: Rng + ?Sized>(
        &mut self,
        msg: &InboundMessage,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Option<String>> {
        if msg.from_bot && !self.settings.learn_from_bots {
            tracing::debug!("Ignoring message from bot {}", msg.author_id);
            return Ok(None);
        }

        self.purge_topics_if_due(now).await?;
        let scope = TopicScope::new(&msg.author_id, &msg.channel_id);
        self.topics
            .update_at(&scope, &msg.text, &self.settings.topic_memory, now)
            .await
            .context("Failed to update topic memory")?;
        self.brain
            .learn(&msg.text)
            .await
            .context("Failed to learn message")?;

        // Bots are learned from, never answered.
        if msg.from_bot {
            return Ok(None);
        }

        let yell = should_yell(&msg.text, &mut self.settings, rng);
        let addressed = msg.mentions_bot
            || self
                .name_trigger
                .as_ref()
                .map_or(false, |t| t.matches(&msg.text));
        let speak = addressed
            || self.in_conversation(&msg.channel_id, now)
            || should_respond(self.trigger.as_ref(), &msg.text, &self.settings, rng);
        if !speak {
            return Ok(None);
        }

        let mut reply = self.compose_reply(msg, &scope, now, rng).await?;
        if yell {
            reply = reply.to_uppercase();
        }
        self.last_replies.insert(msg.channel_id.clone(), now);
        tracing::debug!("Replying in {} (yell={})", msg.channel_id, yell);
        Ok(Some(reply))
    }

    /// Whether the bot replied in `channel_id` within the conversation time limit.
    /// Limits too large to represent mean the conversation never goes stale.
    pub fn in_conversation(&self, channel_id: &str, now: DateTime<Utc>) -> bool {
        let limit = i64::try_from(self.settings.conversation_time_limit)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        self.last_replies
            .get(channel_id)
            .map_or(false, |last| now.signed_duration_since(*last) <= limit)
    }

    async fn purge_topics_if_due(&mut self, now: DateTime<Utc>) -> Result<()> {
        let due = self.last_topic_purge.map_or(true, |last| {
            now.signed_duration_since(last) >= Duration::seconds(TOPIC_PURGE_INTERVAL_SECS)
        });
        if !due {
            return Ok(());
        }
        let purged = self
            .topics
            .purge_expired(now)
            .await
            .context("Failed to purge topic memory")?;
        if purged > 0 {
            tracing::debug!("Purged {} expired topic entries", purged);
        }
        self.last_topic_purge = Some(now);
        Ok(())
    }

    async fn compose_reply<R: Rng + ?Sized>(
        &mut self,
        msg: &InboundMessage,
        scope: &TopicScope,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<String> {
        self.brain.set_recursion(self.settings.recursion);

        let keywords = self
            .topics
            .consume_at(scope, now)
            .await
            .context("Failed to read topic memory")?;
        let strength = bias_strength(&self.settings.topic_memory);
        let bias = self
            .overlays
            .resolve_bias(&msg.scopes())
            .await
            .context("Failed to resolve overlays")?;
        if !bias.is_neutral() {
            tracing::debug!("Overlay bias active for {}", msg.channel_id);
        }

        let mut lines: Vec<String> = Vec::new();
        for _ in 0..self.settings.number_of_lines.max(1) {
            let seed = self
                .brain
                .get_topic_seed(&msg.text, &keywords, strength, rng)
                .await?;
            let line = self.brain.respond_with_bias(&seed, &bias, rng).await?;
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        Ok(lines.join("\n"))
    }
}

fn compile_trigger(rule: Option<&RespondsTo>) -> Option<ResponseTrigger> {
    let rule = rule?;
    match ResponseTrigger::compile(rule) {
        Ok(trigger) => trigger,
        Err(e) => {
            tracing::warn!("Ignoring responds-to rule {:?}: {:#}", rule, e);
            None
        }
    }
}
