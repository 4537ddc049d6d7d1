//! # Chatter Limbic System
//!
//! Fast, non-verbal decisions taken on every inbound message before the brain
//! is asked for words:
//!
//! - **Mood**: an anger scalar that shouting pushes up and calm decays,
//!   deciding whether the reply is yelled.
//! - **Trigger**: whether to speak at all, either as an unprompted outburst
//!   or because the message matches the bot's responds-to rule.
//!
//! Randomness always comes in as an explicit `Rng` so every decision can be
//! replayed with a fixed source.

mod mood;
mod trigger;

pub use mood::{next_anger, should_yell, YellDecision, ANGER_CEILING, ANGER_FLOOR};
pub use trigger::{should_respond, ResponseTrigger};
