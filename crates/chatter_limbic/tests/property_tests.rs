//! Property-based tests for chatter_limbic mood and trigger decisions.
//!
//! Verifies that the anger scalar always stays within its documented clamp
//! regardless of input settings, and that outbursts always win.

use chatter_core::BotSettings;
use chatter_limbic::{next_anger, should_respond, ResponseTrigger, ANGER_CEILING, ANGER_FLOOR};
use proptest::prelude::*;
use rand::rngs::mock::StepRng;

// ============================================================================
// Strategies
// ============================================================================

fn arb_settings() -> impl Strategy<Value = BotSettings> {
    (0.0f64..=20.0, 0.0f64..=5.0, 0.0f64..=2.0, 0.0f64..=1.0).prop_map(
        |(anger_level, anger_increase, anger_decrease, outburst_threshold)| BotSettings {
            anger_level,
            anger_increase,
            anger_decrease,
            outburst_threshold,
            ..Default::default()
        },
    )
}

proptest! {
    /// **Core invariant**: the updated anger level is ALWAYS within
    /// [ANGER_FLOOR, ANGER_CEILING] for any settings, text and draw.
    #[test]
    fn anger_stays_clamped(settings in arb_settings(), text in "\\PC{0,40}", draw in 0.0f64..1.0) {
        let decision = next_anger(&text, &settings, draw);
        prop_assert!(decision.anger_level >= ANGER_FLOOR);
        prop_assert!(decision.anger_level <= ANGER_CEILING);
        prop_assert_eq!(decision.yell, draw < decision.anger_level);
    }

    /// Repeated calm messages never push anger up when decrease <= 1.
    #[test]
    fn calm_never_raises_anger(settings in arb_settings(), rounds in 1usize..20) {
        prop_assume!(settings.anger_decrease <= 1.0);
        let mut current = settings.clone();
        current.anger_level = current.anger_level.clamp(ANGER_FLOOR, ANGER_CEILING);
        for _ in 0..rounds {
            let before = current.anger_level;
            current.anger_level = next_anger("just talking", &current, 0.5).anger_level;
            prop_assert!(current.anger_level <= before);
        }
    }

    /// A zero draw is an outburst whenever the threshold is positive.
    #[test]
    fn outburst_beats_any_trigger(settings in arb_settings(), text in "[a-z ]{0,30}") {
        prop_assume!(settings.outburst_threshold > 0.0);
        let trigger = ResponseTrigger::literal("zzzzzz").unwrap();
        prop_assert!(should_respond(Some(&trigger), &text, &settings, &mut StepRng::new(0, 0)));
    }
}
