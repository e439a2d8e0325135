use std::sync::Arc;

use proptest::prelude::*;
use twofilters_engine::{connect, Engine, EngineConfig, NullHost};

fn engine_at(sample_rate: f64) -> Engine {
    let config = EngineConfig::default();
    let (audio, _main) = connect(&config);
    let mut engine = Engine::new(&config, audio, Arc::new(NullHost));
    engine.set_sample_rate(sample_rate);
    engine
}

proptest! {
    #[test]
    fn ramps_settle_monotonically(
        start in 0.0f32..1.0,
        target in 0.0f32..1.0,
        sample_rate in prop_oneof![Just(44_100.0), Just(48_000.0), Just(96_000.0)],
    ) {
        let mut engine = engine_at(sample_rate);
        let index = engine.patch().routing.mix;
        engine.set_param_target(index, start);
        engine.snap_param_to_target(index);
        prop_assert_eq!(engine.patch().value(index), start);

        engine.set_param_target(index, target);
        let smoothing_blocks = (0.064 * sample_rate / 8.0).ceil() as usize;
        let mut previous = start;
        let mut settled_after = None;
        for block in 1..=smoothing_blocks + 2 {
            engine.process_all_active();
            let value = engine.patch().value(index);
            let before = (target - previous).abs();
            let after = (target - value).abs();
            prop_assert!(after <= before, "block {}: {} moved away from {}", block, value, target);
            previous = value;
            if value == target {
                settled_after = Some(block);
                break;
            }
        }
        prop_assert!(settled_after.is_some(), "never settled on {}", target);
        engine.process_all_active();
        prop_assert_eq!(engine.active_len(), 0);
    }
}

#[test]
fn ramp_takes_the_configured_time() {
    let mut engine = engine_at(48_000.0);
    let index = engine.patch().filters[0].cutoff;
    engine.set_param_target(index, 0.0);
    assert_eq!(engine.active_len(), 1);

    for _ in 0..100 {
        engine.process_all_active();
    }
    let value = engine.patch().value(index);
    assert!(value > 0.0 && value < 0.75, "ramp should be audible, got {value}");

    engine.instantly_snap();
    assert_eq!(engine.patch().value(index), 0.0);
    assert_eq!(engine.active_len(), 0);
}

#[test]
fn sample_rate_change_settles_ramps() {
    let mut engine = engine_at(48_000.0);
    let index = engine.patch().routing.feedback;
    engine.set_param_target(index, 0.9);
    engine.process_all_active();
    engine.set_sample_rate(96_000.0);
    assert_eq!(engine.active_len(), 0);
    assert_eq!(engine.patch().value(index), 0.9);
}
