//! Per-bot runtime settings.
//!
//! One `BotSettings` record exists per named bot instance. It is loaded at
//! startup, mutated while messages are processed (the anger scalar moves on
//! every message), and persisted on shutdown or explicit save.

use serde::{Deserialize, Serialize};

/// What the bot answers to when it is not having an outburst.
///
/// Stored in its source form; the limbic crate compiles it into a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RespondsTo {
    /// A phrase matched case-insensitively on word boundaries.
    Literal(String),
    /// A regular expression matched against the raw message.
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Probability-like scalar in `[0.01, 10]`; compared against a uniform draw.
    pub anger_level: f64,
    /// Multiplier applied when the bot is yelled at.
    pub anger_increase: f64,
    /// Multiplier applied on every calm message.
    pub anger_decrease: f64,
    /// Probability of speaking without being addressed.
    pub outburst_threshold: f64,
    /// Lines generated per reply.
    pub number_of_lines: usize,
    /// Max traversal steps per direction during generation.
    pub recursion: usize,
    /// Seconds after a reply during which follow-ups count as the same conversation.
    pub conversation_time_limit: u64,
    pub learn_from_bots: bool,
    pub responds_to: Option<RespondsTo>,
    pub topic_memory: TopicMemorySettings,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            anger_level: 0.5,
            anger_increase: 1.75,
            anger_decrease: 0.8,
            outburst_threshold: 0.001,
            number_of_lines: 1,
            recursion: 30,
            conversation_time_limit: 300,
            learn_from_bots: false,
            responds_to: None,
            topic_memory: TopicMemorySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicMemorySettings {
    pub enabled: bool,
    /// Keywords remembered per (user, channel).
    pub keyword_count: usize,
    pub ttl_minutes: i64,
    /// Replies that may draw on one remembered topic before it is forgotten.
    pub max_interactions: u32,
    /// How strongly seed selection prefers a remembered keyword (0..1).
    pub bias_strength: f64,
}

impl Default for TopicMemorySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            keyword_count: 3,
            ttl_minutes: 30,
            max_interactions: 3,
            bias_strength: 0.5,
        }
    }
}
