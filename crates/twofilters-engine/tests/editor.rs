use std::sync::Arc;

use twofilters_engine::filter::{Passband, Slope};
use twofilters_engine::messages::{MainToAudioAction, RawMainToAudioMsg};
use twofilters_engine::patch::{ids, NUM_LFOS};
use twofilters_engine::{
    EngineConfig, EngineError, FilterError, FilterModel, FilterSetup, MainToAudioMsg, NullHost, OutputEvent,
    SlotState, TwoFiltersPlugin, BLOCK_SIZE,
};

fn plugin() -> TwoFiltersPlugin {
    let plugin = TwoFiltersPlugin::new(EngineConfig::default(), Arc::new(NullHost));
    plugin.activate(48_000.0);
    plugin
}

/// Renders `frames` of a constant input and returns the left output.
fn render(plugin: &TwoFiltersPlugin, frames: usize, level: f32) -> Vec<f32> {
    let input = vec![level; frames];
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];
    let mut events: Vec<OutputEvent> = Vec::new();
    plugin.process([&input, &input], [&mut left, &mut right], &[], None, &mut events);
    left
}

#[test]
fn attach_refreshes_the_ui_copy() {
    let plugin = plugin();
    let mut editor = plugin.take_editor().unwrap();
    assert!(plugin.take_editor().is_none());

    let mix = ids::routing(ids::MIX);
    plugin
        .sender()
        .try_push(MainToAudioMsg::SetParamWithoutNotifying { id: mix, value: 0.25 })
        .unwrap();
    editor.attach().unwrap();
    render(&plugin, 4 * BLOCK_SIZE, 0.0);

    assert!(editor.idle() > 0);
    assert_eq!(editor.patch().value_by_id(mix), Some(0.25));
    assert_eq!(editor.sample_rate(), 48_000.0);
    assert!(editor.is_dirty());
    assert_eq!(editor.patch().name.as_str(), "Init");
    assert!(plugin.with_engine(|engine| engine.flags().is_editor_attached()));
}

#[test]
fn vu_and_lfo_telemetry_arrive_while_attached() {
    let plugin = plugin();
    let mut editor = plugin.take_editor().unwrap();
    editor.attach().unwrap();
    // Two VU intervals at 48 kHz.
    render(&plugin, 2 * 250 * BLOCK_SIZE + BLOCK_SIZE, 0.5);
    editor.idle();
    let (left, right) = editor.vu();
    assert!(left > 0.0 && right > 0.0);
    assert!(editor.lfo_position(0).is_some());
    assert_eq!(editor.lfo_position(NUM_LFOS), None);

    editor.detach().unwrap();
    render(&plugin, BLOCK_SIZE * 2, 0.5);
    editor.idle();
    assert!(!plugin.with_engine(|engine| engine.flags().is_editor_attached()));
}

#[test]
fn unavailable_filter_setups_are_rejected_on_both_sides() {
    let plugin = plugin();
    let mut editor = plugin.take_editor().unwrap();

    let band_one_pole = FilterSetup {
        model: FilterModel::OnePole,
        config: twofilters_engine::filter::FilterConfig {
            passband: Passband::BandPass,
            slope: Slope::Slope6,
            ..Default::default()
        },
    };
    assert!(matches!(
        editor.push_filter_setup(0, band_one_pole),
        Err(EngineError::Filter(FilterError::Unsupported { .. }))
    ));
    assert!(matches!(
        editor.push_filter_setup(5, FilterSetup::bypass()),
        Err(EngineError::Filter(FilterError::InvalidSlot(5)))
    ));

    plugin
        .sender()
        .try_push(MainToAudioMsg::SetFilterModel {
            slot: 0,
            setup: band_one_pole.to_raw(),
        })
        .unwrap();
    plugin
        .sender()
        .try_push(MainToAudioMsg::SetFilterModel {
            slot: 9,
            setup: FilterSetup::bypass().to_raw(),
        })
        .unwrap();
    render(&plugin, 2 * BLOCK_SIZE, 0.0);
    plugin.with_engine(|engine| {
        assert_eq!(engine.filter(0).setup(), FilterSetup::default_for(FilterModel::Svf));
        assert_eq!(engine.filter(0).state(), SlotState::Active);
        assert!(!engine.patch().dirty);
    });

    let ladder = FilterSetup::default_for(FilterModel::Ladder);
    editor.push_filter_setup(1, ladder).unwrap();
    render(&plugin, 2 * BLOCK_SIZE, 0.0);
    plugin.with_engine(|engine| {
        assert_eq!(engine.filter(1).setup(), ladder);
        assert_eq!(engine.filter(1).state(), SlotState::Active);
        assert!(engine.patch().dirty);
    });
    editor.idle();
    assert_eq!(editor.patch().filter_setups[1], ladder);
}

#[test]
fn stop_audio_silences_and_start_resumes() {
    let plugin = plugin();
    render(&plugin, 16 * BLOCK_SIZE, 0.5);

    plugin.sender().try_push(MainToAudioMsg::StopAudio).unwrap();
    let silent = render(&plugin, 16 * BLOCK_SIZE, 0.5);
    // At most one block rendered before the message can still play out.
    assert!(silent[BLOCK_SIZE..].iter().all(|&s| s == 0.0));
    assert!(!plugin.with_engine(|engine| engine.is_audio_running()));

    plugin.sender().try_push(MainToAudioMsg::StartAudio).unwrap();
    let resumed = render(&plugin, 64 * BLOCK_SIZE, 0.5);
    assert!(resumed.iter().skip(2 * BLOCK_SIZE).any(|&s| s != 0.0));
}

#[test]
fn edits_outside_a_gesture_still_apply() {
    let plugin = plugin();
    let feedback = ids::routing(ids::FEEDBACK);
    plugin
        .sender()
        .try_push(MainToAudioMsg::SetParam { id: feedback, value: 0.6 })
        .unwrap();
    plugin
        .sender()
        .try_push(MainToAudioMsg::SetParam { id: 999_999, value: 0.6 })
        .unwrap();
    render(&plugin, 2 * BLOCK_SIZE, 0.0);
    plugin.with_engine(|engine| {
        let index = engine.patch().param_index(feedback).unwrap();
        assert_eq!(engine.patch().param(index).target(), 0.6);
        assert_eq!(engine.gesture_depth(), 0);
    });
}

#[test]
fn drag_sends_many_values_inside_one_gesture() {
    let plugin = plugin();
    let mut editor = plugin.take_editor().unwrap();
    let morph = ids::filter(0, ids::MORPH);
    editor.begin_edit(morph).unwrap();
    for value in [0.2, 0.4, 0.6] {
        editor.set_and_send_param_value(morph, value, false).unwrap();
    }
    render(&plugin, 2 * BLOCK_SIZE, 0.0);
    plugin.with_engine(|engine| assert_eq!(engine.gesture_depth(), 1));

    editor.end_edit(morph).unwrap();
    render(&plugin, 2 * BLOCK_SIZE, 0.0);
    plugin.with_engine(|engine| {
        assert_eq!(engine.gesture_depth(), 0);
        let index = engine.patch().param_index(morph).unwrap();
        assert_eq!(engine.patch().param(index).target(), 0.6);
    });
}

#[test]
fn rescan_request_reaches_the_editor() {
    let plugin = plugin();
    let mut editor = plugin.take_editor().unwrap();
    plugin.sender().try_push(MainToAudioMsg::SendRequestRescan).unwrap();
    render(&plugin, 2 * BLOCK_SIZE, 0.0);
    editor.idle();
    assert!(editor.take_metadata_reload());
    assert!(!editor.take_metadata_reload());
}

#[test]
fn lfo_preview_follows_the_ui_copy() {
    let plugin = plugin();
    let mut editor = plugin.take_editor().unwrap();
    editor
        .set_and_send_param_value(ids::lfo(0, ids::LFO_STEP_COUNT), 4.0, true)
        .unwrap();
    editor
        .set_and_send_param_value(ids::lfo(0, ids::LFO_STEPS + 1), 1.0, true)
        .unwrap();
    let curve = editor.lfo_preview(0, 2).unwrap();
    assert_eq!(curve, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(editor.lfo_preview(NUM_LFOS, 2), None);
    assert!(matches!(
        editor.set_and_send_param_value(7, 0.0, true),
        Err(EngineError::UnknownParam(7))
    ));
}

#[test]
fn raw_messages_decode_or_are_skipped() {
    let plugin = plugin();
    let feedback = ids::routing(ids::FEEDBACK);
    let unknown = RawMainToAudioMsg {
        action: 99,
        ..Default::default()
    };
    assert!(!plugin.send_raw(unknown).unwrap());
    let set = RawMainToAudioMsg {
        action: MainToAudioAction::SetParam as u32,
        param_id: feedback,
        value: 0.3,
        ..Default::default()
    };
    assert!(plugin.send_raw(set).unwrap());

    render(&plugin, 2 * BLOCK_SIZE, 0.0);
    plugin.with_engine(|engine| {
        let index = engine.patch().param_index(feedback).unwrap();
        assert_eq!(engine.patch().param(index).target(), 0.3);
    });
}
