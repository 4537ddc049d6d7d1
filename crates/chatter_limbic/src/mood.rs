//! Anger - a slowly decaying scalar that shouting pushes up.
//!
//! Every message moves the scalar: shouting multiplies it by
//! `anger_increase`, anything else by `anger_decrease`. The bot yells back
//! when a uniform draw lands under the result.

use chatter_core::{is_shouting, BotSettings};
use rand::Rng;

pub const ANGER_FLOOR: f64 = 0.01;
pub const ANGER_CEILING: f64 = 10.0;

/// Outcome of one mood update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YellDecision {
    pub yell: bool,
    pub anger_level: f64,
}

/// Pure form: next anger level for `text`, and whether `draw` (uniform in
/// `[0, 1)`) triggers a yell at that level.
pub fn next_anger(text: &str, settings: &BotSettings, draw: f64) -> YellDecision {
    let factor = if is_shouting(text) {
        settings.anger_increase
    } else {
        settings.anger_decrease
    };
    let mut anger_level = settings.anger_level * factor;
    if !anger_level.is_finite() {
        anger_level = if anger_level.is_nan() {
            ANGER_FLOOR
        } else {
            ANGER_CEILING
        };
    }
    let anger_level = anger_level.clamp(ANGER_FLOOR, ANGER_CEILING);
    YellDecision {
        yell: draw < anger_level,
        anger_level,
    }
}

/// Update `settings.anger_level` for `text` and decide whether to yell.
pub fn should_yell<R: Rng + ?Sized>(text: &str, settings: &mut BotSettings, rng: &mut R) -> bool {
    let draw: f64 = rng.gen();
    let decision = next_anger(text, settings, draw);
    if decision.anger_level != settings.anger_level {
        tracing::debug!(
            "Anger {:.3} -> {:.3} (yell={})",
            settings.anger_level,
            decision.anger_level,
            decision.yell
        );
    }
    settings.anger_level = decision.anger_level;
    decision.yell
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

    #[test]
    fn test_shouting_raises_anger_and_yells_on_low_draw() {
        let mut settings = BotSettings::default();
        let before = settings.anger_level;
        assert!(should_yell("WHY WOULD YOU DO THAT", &mut settings, &mut low_draw()));
        assert!(settings.anger_level > before);
        assert_eq!(settings.anger_level, before * settings.anger_increase);
    }

    #[test]
    fn test_calm_text_decays_to_floor_and_does_not_yell() {
        let mut settings = BotSettings {
            anger_level: 0.011,
            ..Default::default()
        };
        assert!(!should_yell("just chatting", &mut settings, &mut high_draw()));
        assert_eq!(settings.anger_level, ANGER_FLOOR);

        assert!(!should_yell("still chatting", &mut settings, &mut high_draw()));
        assert_eq!(settings.anger_level, ANGER_FLOOR);
    }

    #[test]
    fn test_anger_is_capped() {
        let mut settings = BotSettings {
            anger_level: 9.0,
            ..Default::default()
        };
        should_yell("STOP", &mut settings, &mut high_draw());
        assert_eq!(settings.anger_level, ANGER_CEILING);
    }

    #[test]
    fn test_next_anger_is_pure() {
        let settings = BotSettings::default();
        let decision = next_anger("hello", &settings, 0.99);
        assert!(!decision.yell);
        assert!(decision.anger_level < settings.anger_level);
        assert_eq!(settings.anger_level, BotSettings::default().anger_level);
    }

    #[test]
    fn test_non_finite_multipliers_stay_in_range() {
        let settings = BotSettings {
            anger_increase: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(next_anger("LOUD", &settings, 0.5).anger_level, ANGER_CEILING);

        let settings = BotSettings {
            anger_decrease: f64::NAN,
            ..Default::default()
        };
        assert_eq!(next_anger("quiet", &settings, 0.5).anger_level, ANGER_FLOOR);
    }
}
