use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use twofilters_engine::patch::ids;
use twofilters_engine::{EngineConfig, MainToAudioMsg, NullHost, OutputEvent, TransportInfo, TwoFiltersPlugin};

const HOST_FRAMES: usize = 512;

fn modulated_plugin(routing_mode: f32) -> TwoFiltersPlugin {
    let plugin = TwoFiltersPlugin::new(EngineConfig::default(), Arc::new(NullHost));
    plugin.activate(96_000.0);
    let sender = plugin.sender();
    let set = |id: u32, value: f32| {
        sender
            .try_push(MainToAudioMsg::SetParamWithoutNotifying { id, value })
            .expect("queue has room");
    };
    set(ids::routing(ids::ROUTING_MODE), routing_mode);
    set(ids::routing(ids::FEEDBACK_POWER), 1.0);
    set(ids::routing(ids::FEEDBACK), 0.6);
    set(ids::lfo(0, ids::LFO_RATE), 3.0);
    for step in 0..8 {
        set(ids::lfo(0, ids::LFO_STEPS + step), if step % 2 == 0 { 1.0 } else { -1.0 });
    }
    set(ids::lfo(0, ids::LFO_DEPTHS), 0.3);
    set(ids::lfo(1, ids::LFO_DEPTHS + 4), -0.2);
    plugin
}

fn render(plugin: &TwoFiltersPlugin, input: &[f32], output: &mut [Vec<f32>; 2], events: &mut Vec<OutputEvent>) {
    let [left, right] = output;
    plugin.process(
        [input, input],
        [left.as_mut_slice(), right.as_mut_slice()],
        &[],
        Some(TransportInfo::playing_at(128.0)),
        events,
    );
    events.clear();
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.measurement_time(Duration::from_secs(10));
    let input: Vec<f32> = (0..HOST_FRAMES).map(|n| (n as f32 * 0.031).sin() * 0.5).collect();

    for (label, mode) in [("serial", 0.0), ("parallel_split_feedback", 3.0)] {
        group.bench_function(format!("{label}_96k_{HOST_FRAMES}"), |b| {
            let plugin = modulated_plugin(mode);
            let mut output = [vec![0.0; HOST_FRAMES], vec![0.0; HOST_FRAMES]];
            let mut events = Vec::new();
            b.iter(|| {
                render(&plugin, black_box(&input), &mut output, &mut events);
                black_box(output[0][HOST_FRAMES - 1])
            });
        });
    }

    group.bench_function("automation_storm_96k_512", |b| {
        let plugin = modulated_plugin(1.0);
        let sender = plugin.sender();
        let mut output = [vec![0.0; HOST_FRAMES], vec![0.0; HOST_FRAMES]];
        let mut events = Vec::new();
        let mut tick = 0u32;
        b.iter(|| {
            for slot in 0..2 {
                let id = ids::filter(slot, ids::CUTOFF);
                let value = (tick % 100) as f32 / 100.0;
                sender
                    .try_push(MainToAudioMsg::SetParamWithoutNotifying { id, value })
                    .expect("queue has room");
            }
            tick = tick.wrapping_add(1);
            render(&plugin, black_box(&input), &mut output, &mut events);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_process);
criterion_main!(benches);
