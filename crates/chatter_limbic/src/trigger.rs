//! Whether to speak at all: outbursts and responds-to matching.

use anyhow::{Context, Result};
use chatter_core::{BotSettings, RespondsTo};
use rand::Rng;
use regex::Regex;

/// A compiled responds-to rule.
#[derive(Debug, Clone)]
pub enum ResponseTrigger {
    /// Case-insensitive phrase on word boundaries; `source` keeps the phrase.
    Literal { source: String, matcher: Regex },
    /// Caller-supplied regular expression, matched as written.
    Pattern(Regex),
}

impl ResponseTrigger {
    pub fn literal(phrase: &str) -> Result<Self> {
        let phrase = phrase.trim();
        // Non-word neighbours (or the ends of the text) delimit the phrase so
        // phrases that start or end with punctuation still match.
        let matcher = Regex::new(&format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(phrase)))
            .with_context(|| format!("Failed to build matcher for phrase '{}'", phrase))?;
        Ok(Self::Literal {
            source: phrase.to_string(),
            matcher,
        })
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("Invalid responds-to pattern '{}'", pattern))?;
        Ok(Self::Pattern(regex))
    }

    /// Compile a stored rule. Empty literals compile to no trigger at all.
    pub fn compile(rule: &RespondsTo) -> Result<Option<Self>> {
        match rule {
            RespondsTo::Literal(phrase) if phrase.trim().is_empty() => Ok(None),
            RespondsTo::Literal(phrase) => Self::literal(phrase).map(Some),
            RespondsTo::Pattern(pattern) => Self::pattern(pattern).map(Some),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            ResponseTrigger::Literal { matcher, .. } => matcher.is_match(text),
            ResponseTrigger::Pattern(regex) => regex.is_match(text),
        }
    }
}

/// Speak on an outburst (draw under `outburst_threshold`), otherwise only
/// when the trigger matches. No trigger means stay quiet.
pub fn should_respond<R: Rng + ?Sized>(
    trigger: Option<&ResponseTrigger>,
    text: &str,
    settings: &BotSettings,
    rng: &mut R,
) -> bool {
    let draw: f64 = rng.gen();
    if draw < settings.outburst_threshold {
        tracing::debug!("Outburst (draw {:.4} < {:.4})", draw, settings.outburst_threshold);
        return true;
    }
    trigger.map_or(false, |t| t.matches(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn low_draw() -> StepRng {
        StepRng::new(0, 0)
    }

    fn high_draw() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn settings(outburst_threshold: f64) -> BotSettings {
        BotSettings {
            outburst_threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_outburst_ignores_trigger() {
        assert!(should_respond(None, "anything", &settings(0.5), &mut low_draw()));
        let trigger = ResponseTrigger::literal("parrot").unwrap();
        assert!(should_respond(Some(&trigger), "no match", &settings(0.5), &mut low_draw()));
    }

    #[test]
    fn test_no_trigger_above_threshold_is_silent() {
        assert!(!should_respond(None, "parrot", &settings(0.5), &mut high_draw()));
    }

    #[test]
    fn test_literal_is_case_insensitive_whole_word() {
        let trigger = ResponseTrigger::literal("Parrot").unwrap();
        let s = settings(0.0);
        assert!(should_respond(Some(&trigger), "hey PARROT, talk", &s, &mut high_draw()));
        assert!(should_respond(Some(&trigger), "parrot", &s, &mut high_draw()));
        assert!(!should_respond(Some(&trigger), "parrots everywhere", &s, &mut high_draw()));
        assert!(!should_respond(Some(&trigger), "hello", &s, &mut high_draw()));
    }

    #[test]
    fn test_literal_phrase_with_punctuation() {
        let trigger = ResponseTrigger::literal("hey bot!").unwrap();
        assert!(trigger.matches("oh, Hey Bot! how are you"));
        assert!(!trigger.matches("hey bots"));
    }

    #[test]
    fn test_pattern_trigger() {
        let trigger = ResponseTrigger::pattern(r"^!(talk|speak)\b").unwrap();
        let s = settings(0.0);
        assert!(should_respond(Some(&trigger), "!talk about cats", &s, &mut high_draw()));
        assert!(!should_respond(Some(&trigger), "please !talk", &s, &mut high_draw()));
    }

    #[test]
    fn test_compile_rules() {
        assert!(ResponseTrigger::compile(&RespondsTo::Literal("  ".into()))
            .unwrap()
            .is_none());
        assert!(ResponseTrigger::compile(&RespondsTo::Pattern("(".into())).is_err());
        let trigger = ResponseTrigger::compile(&RespondsTo::Literal("bot".into()))
            .unwrap()
            .unwrap();
        assert!(trigger.matches("Bot?"));
    }
}
