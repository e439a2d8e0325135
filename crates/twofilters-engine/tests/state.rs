use std::fs;
use std::sync::Arc;

use twofilters_engine::filter::{DriveMode, Passband, Slope, SubModel};
use twofilters_engine::patch::{bulk_load_len, ids};
use twofilters_engine::{
    EngineConfig, EngineError, FilterModel, NullHost, OutputEvent, Patch, PatchState, StateError, TwoFiltersPlugin,
    PATCH_VERSION,
};

#[test]
fn json_round_trip_through_a_file() {
    let mut patch = Patch::new();
    patch.set_by_id_direct(ids::routing(ids::FEEDBACK), 0.4).unwrap();
    patch.set_by_id_direct(ids::lfo(1, ids::LFO_STEPS + 3), -0.5).unwrap();
    patch.name.set("Wide Sweep");
    let state = patch.to_state();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patch.json");
    fs::write(&path, state.to_json().unwrap()).unwrap();
    let loaded = PatchState::from_json(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, state);

    let mut restored = Patch::new();
    restored.apply_state(&loaded).unwrap();
    assert_eq!(restored.value_by_id(ids::routing(ids::FEEDBACK)), Some(0.4));
    assert_eq!(restored.value_by_id(ids::lfo(1, ids::LFO_STEPS + 3)), Some(-0.5));
    assert_eq!(restored.name.as_str(), "Wide Sweep");
}

#[test]
fn version_one_state_migrates_sub_model_and_retrigger() {
    let mut state = Patch::new().to_state();
    state.version = 1;
    // Version 1 wrote 0 for the compensated ladder and 2 for four-bar retrigger.
    state.filters = vec![[FilterModel::Ladder as u32, Passband::LowPass as u32, Slope::Slope24 as u32, 0, 0]];
    state.values.insert(ids::routing(ids::RETRIGGER_MODE), 2.0);
    state.values.insert(ids::routing(ids::MIX), 7.5);
    state.values.insert(4242, 1.0);

    let mut patch = Patch::new();
    patch.apply_state(&state).unwrap();
    let setup = patch.filter_setups[0];
    assert_eq!(setup.model, FilterModel::Ladder);
    assert_eq!(setup.config.sub_model, SubModel::Compensated);
    assert_eq!(setup.config.drive, DriveMode::Clean);
    assert_eq!(patch.filter_setups[1], Patch::default_filter_setups()[1]);
    assert_eq!(patch.value_by_id(ids::routing(ids::RETRIGGER_MODE)), Some(3.0));
    assert_eq!(patch.value_by_id(ids::routing(ids::MIX)), Some(1.0));
}

#[test]
fn future_versions_are_rejected() {
    let mut state = PatchState::default();
    state.version = PATCH_VERSION + 1;
    let mut patch = Patch::new();
    assert!(matches!(
        patch.apply_state(&state),
        Err(StateError::FutureVersion { found, .. }) if found == PATCH_VERSION + 1
    ));
}

#[test]
fn plugin_load_reaches_the_audio_thread() {
    let plugin = TwoFiltersPlugin::new(EngineConfig::default(), Arc::new(NullHost));
    let mut patch = Patch::new();
    patch.set_by_id_direct(ids::filter(1, ids::CUTOFF), 0.1).unwrap();
    patch.filter_setups[1] = twofilters_engine::FilterSetup::default_for(FilterModel::OnePole);
    plugin.state_load_json(&patch.to_state().to_json().unwrap()).unwrap();

    let mut events: Vec<OutputEvent> = Vec::new();
    plugin.params_flush(&[], &mut events);
    plugin.with_engine(|engine| {
        assert_eq!(engine.patch().value_by_id(ids::filter(1, ids::CUTOFF)), Some(0.1));
        assert_eq!(engine.filter(1).setup().model, FilterModel::OnePole);
        assert!(!engine.patch().dirty);
        assert!(events.is_empty());
    });

    assert!(plugin.state_load_json("{ not json").is_err());
}

#[test]
fn load_that_does_not_fit_the_queue_keeps_audio_running() {
    let small = bulk_load_len(&Patch::new()) - 1;
    let plugin = TwoFiltersPlugin::new(
        EngineConfig::default().with_queue_capacities(1024, small),
        Arc::new(NullHost),
    );
    plugin.activate(48_000.0);
    let mut patch = Patch::new();
    patch.set_by_id_direct(ids::filter(0, ids::CUTOFF), 0.1).unwrap();
    assert!(matches!(plugin.state_load(&patch.to_state()), Err(EngineError::QueueFull)));

    let frames = 100 * 8;
    let input = vec![0.5f32; frames];
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];
    let mut events: Vec<OutputEvent> = Vec::new();
    plugin.process([&input, &input], [&mut left, &mut right], &[], None, &mut events);

    plugin.with_engine(|engine| {
        assert!(engine.is_audio_running());
        assert_ne!(engine.patch().value_by_id(ids::filter(0, ids::CUTOFF)), Some(0.1));
    });
    assert!(left.iter().map(|s| s * s).sum::<f32>() > 0.0);
}

#[test]
fn load_that_exactly_fits_the_queue_is_applied() {
    let exact = bulk_load_len(&Patch::new());
    let plugin = TwoFiltersPlugin::new(
        EngineConfig::default().with_queue_capacities(1024, exact),
        Arc::new(NullHost),
    );
    plugin.activate(48_000.0);
    let mut patch = Patch::new();
    patch.set_by_id_direct(ids::filter(0, ids::CUTOFF), 0.1).unwrap();
    plugin.state_load(&patch.to_state()).unwrap();

    let mut events: Vec<OutputEvent> = Vec::new();
    plugin.params_flush(&[], &mut events);
    plugin.with_engine(|engine| {
        assert!(engine.is_audio_running());
        assert_eq!(engine.patch().value_by_id(ids::filter(0, ids::CUTOFF)), Some(0.1));
    });
}
