use std::sync::Arc;

use twofilters_engine::patch::ids;
use twofilters_engine::{
    connect, Engine, EngineConfig, MainToAudioMsg, NullHost, OutputEvent, PlayState, TransportInfo, BLOCK_SIZE,
};

const SAMPLE_RATE: f64 = 48_000.0;
/// Control blocks per simulated host buffer of 256 frames.
const BLOCKS_PER_HOST_CALL: usize = 256 / BLOCK_SIZE;

fn engine() -> Engine {
    let config = EngineConfig::default();
    let (audio, _main) = connect(&config);
    let mut engine = Engine::new(&config, audio, Arc::new(NullHost));
    engine.set_sample_rate(SAMPLE_RATE);
    engine
}

fn host_call(engine: &mut Engine, transport: Option<TransportInfo>) {
    let mut events: Vec<OutputEvent> = Vec::new();
    engine.begin_host_block(transport);
    for _ in 0..BLOCKS_PER_HOST_CALL {
        engine.process_control(&mut events);
    }
}

fn retriggers(engine: &Engine) -> [u64; 2] {
    [engine.lfo(0).retriggers(), engine.lfo(1).retriggers()]
}

#[test]
fn each_start_retriggers_once() {
    let mut engine = engine();
    let playing = TransportInfo {
        song_pos_beats: Some(2.7),
        ..TransportInfo::playing_at(128.0)
    };

    host_call(&mut engine, None);
    assert_eq!(retriggers(&engine), [0, 0]);

    host_call(&mut engine, Some(playing));
    assert_eq!(engine.transport().state(), PlayState::Playing);
    host_call(&mut engine, Some(TransportInfo::default()));
    host_call(&mut engine, Some(playing));
    assert_eq!(retriggers(&engine), [2, 2]);
    assert_eq!(engine.lfo(0).step(), 0);
}

#[test]
fn steady_playback_retriggers_only_on_bars() {
    let mut engine = engine();
    let playing = TransportInfo::playing_at(120.0);
    host_call(&mut engine, Some(playing));
    assert_eq!(retriggers(&engine), [1, 1]);

    // One 4/4 bar at 120 BPM lasts two seconds.
    let calls_per_second = SAMPLE_RATE as usize / 256;
    for _ in 0..calls_per_second {
        host_call(&mut engine, Some(playing));
    }
    assert_eq!(retriggers(&engine), [1, 1], "free running mode never realigns");

    let mut engine = engine_with_retrigger(1);
    host_call(&mut engine, Some(playing));
    for _ in 0..calls_per_second * 5 {
        host_call(&mut engine, Some(playing));
    }
    // Start plus the bar lines at 2 s and 4 s.
    assert_eq!(retriggers(&engine), [3, 3]);
}

fn engine_with_retrigger(mode: u32) -> Engine {
    let config = EngineConfig::default();
    let (audio, main) = connect(&config);
    let mut engine = Engine::new(&config, audio, Arc::new(NullHost));
    engine.set_sample_rate(SAMPLE_RATE);
    main.to_audio
        .try_push(MainToAudioMsg::SetParamWithoutNotifying {
            id: ids::routing(ids::RETRIGGER_MODE),
            value: mode as f32,
        })
        .unwrap();
    let mut events: Vec<OutputEvent> = Vec::new();
    engine.flush(&mut events);
    engine
}

#[test]
fn stopped_engine_keeps_lfo_phase_running_free() {
    let mut engine = engine();
    let rate = engine.patch().lfos[0].rate;
    engine.set_param_target(rate, 3.0);
    engine.instantly_snap();
    for _ in 0..50 {
        host_call(&mut engine, None);
    }
    assert_eq!(retriggers(&engine), [0, 0]);
    assert!(engine.lfo(0).step() > 0 || engine.lfo(0).phase() > 0.0);
}
