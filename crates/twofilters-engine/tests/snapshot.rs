use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use twofilters_engine::patch::ids;
use twofilters_engine::{
    EngineConfig, HostCallbacks, NullHost, OutputEvent, StreamPrepConfig, StreamPrepOutcome, TwoFiltersPlugin,
};

fn render(plugin: &TwoFiltersPlugin, frames: usize) {
    let input = vec![0.1f32; frames];
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];
    let mut events: Vec<OutputEvent> = Vec::new();
    plugin.process([&input, &input], [&mut left, &mut right], &[], None, &mut events);
}

#[test]
fn idle_audio_thread_forces_snapshot_within_budget() {
    let stream = StreamPrepConfig {
        max_attempts: 4,
        poll_interval_ms: 2,
        backoff: 1.5,
    };
    let config = EngineConfig::default().with_stream(stream.clone());
    let plugin = TwoFiltersPlugin::new(config, Arc::new(NullHost));
    plugin.activate(48_000.0);

    let mut editor = plugin.take_editor().unwrap();
    let cutoff = ids::filter(0, ids::CUTOFF);
    editor.set_and_send_param_value(cutoff, 0.3, true).unwrap();
    render(&plugin, 64);
    assert!(plugin.with_engine(|engine| engine.active_len()) > 0);

    let started = Instant::now();
    let snapshot = plugin.state_save();
    assert_eq!(snapshot.outcome, StreamPrepOutcome::Forced);
    assert!(started.elapsed() < stream.budget() * 50);
    assert_eq!(snapshot.state.values[&cutoff], 0.3);

    plugin.with_engine(|engine| {
        assert_eq!(engine.active_len(), 0);
        assert!(!engine.patch().dirty);
        assert_eq!(engine.patch().value_by_id(cutoff), Some(0.3));
    });
}

#[test]
fn running_audio_thread_answers_the_handshake() {
    let config = EngineConfig::default().with_stream(StreamPrepConfig {
        max_attempts: 400,
        poll_interval_ms: 5,
        backoff: 1.0,
    });
    let plugin = Arc::new(TwoFiltersPlugin::new(config, Arc::new(NullHost)));
    plugin.activate(48_000.0);
    let stop = Arc::new(AtomicBool::new(false));

    let audio = {
        let plugin = Arc::clone(&plugin);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                render(&plugin, 128);
                thread::yield_now();
            }
        })
    };

    let snapshot = plugin.state_save();
    stop.store(true, Ordering::Release);
    audio.join().unwrap();
    assert!(matches!(snapshot.outcome, StreamPrepOutcome::Ready { .. }));
    assert_eq!(snapshot.state.version, twofilters_engine::PATCH_VERSION);
}

#[derive(Default)]
struct CountingHost {
    flushes: AtomicUsize,
    rescans: AtomicUsize,
    callbacks: AtomicUsize,
}

impl HostCallbacks for CountingHost {
    fn request_callback(&self) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
    }

    fn rescan_params(&self) {
        self.rescans.fetch_add(1, Ordering::Relaxed);
    }

    fn request_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn save_requests_a_flush_and_load_rescans_on_main_thread() {
    let host = Arc::new(CountingHost::default());
    let config = EngineConfig::default().with_stream(StreamPrepConfig {
        max_attempts: 1,
        poll_interval_ms: 1,
        backoff: 1.0,
    });
    let plugin = TwoFiltersPlugin::new(config, host.clone());
    let snapshot = plugin.state_save();
    assert_eq!(host.flushes.load(Ordering::Relaxed), 1);

    plugin.state_load(&snapshot.state).unwrap();
    let mut events: Vec<OutputEvent> = Vec::new();
    plugin.params_flush(&[], &mut events);
    assert_eq!(host.callbacks.load(Ordering::Relaxed), 1);

    plugin.on_main_thread();
    plugin.on_main_thread();
    assert_eq!(host.rescans.load(Ordering::Relaxed), 1);
}
