//! Plugin instance: the engine plus the main-thread end of the bridge.
//!
//! The audio thread only ever `try_lock`s the engine. A failed attempt renders
//! silence for that host block.

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use twofilters_dsp::utils::NoDenormalsGuard;
use twofilters_rt::{EventReceiver, EventSender, NamePool, SharedFlags};

use crate::bridge::{connect, MainEndpoint};
use crate::config::{EngineConfig, BLOCK_SIZE};
use crate::editor::EditorBridge;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::host::{HostCallbacks, HostEvent, OutputEvents};
use crate::messages::{AudioToUiMsg, MainToAudioMsg, RawMainToAudioMsg};
use crate::patch::{send_entire_patch_to_audio, ParamMeta, Patch, PatchState};
use crate::stream::{await_ready_for_stream, StreamPrepOutcome};
use crate::transport::TransportInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Continue,
    /// The engine was locked by the main thread; the block is silent.
    Busy,
}

/// A ramp-settled patch snapshot and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSnapshot {
    pub state: PatchState,
    pub outcome: StreamPrepOutcome,
}

struct AudioState {
    engine: Engine,
    /// Frame inside the current control block.
    position: usize,
}

pub struct TwoFiltersPlugin {
    config: EngineConfig,
    audio: Mutex<AudioState>,
    to_audio: EventSender<MainToAudioMsg>,
    from_audio: Mutex<Option<EventReceiver<AudioToUiMsg>>>,
    flags: Arc<SharedFlags>,
    /// Names written by the main thread.
    outbound_names: Arc<NamePool>,
    /// Names written by the audio thread.
    inbound_names: Arc<NamePool>,
    host: Arc<dyn HostCallbacks>,
}

impl TwoFiltersPlugin {
    pub fn new(config: EngineConfig, host: Arc<dyn HostCallbacks>) -> Self {
        let (audio, main) = connect(&config);
        let engine = Engine::new(&config, audio, Arc::clone(&host));
        let MainEndpoint {
            to_audio,
            from_audio,
            flags,
            inbound_names,
            outbound_names,
        } = main;
        Self {
            config,
            audio: Mutex::new(AudioState { engine, position: 0 }),
            to_audio,
            from_audio: Mutex::new(Some(from_audio)),
            flags,
            outbound_names,
            inbound_names,
            host,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn activate(&self, sample_rate: f64) {
        let mut audio = self.audio.lock();
        audio.engine.set_sample_rate(sample_rate);
        audio.position = 0;
        info!(sample_rate, "plugin activated");
    }

    /// Output lags input by one control block.
    pub fn latency_samples(&self) -> u32 {
        BLOCK_SIZE as u32
    }

    /// Renders one host buffer. `events` must be sorted by time.
    pub fn process(
        &self,
        inputs: [&[f32]; 2],
        outputs: [&mut [f32]; 2],
        events: &[HostEvent],
        transport: Option<TransportInfo>,
        out: &mut dyn OutputEvents,
    ) -> ProcessStatus {
        let [out_left, out_right] = outputs;
        let Some(mut audio) = self.audio.try_lock() else {
            out_left.fill(0.0);
            out_right.fill(0.0);
            return ProcessStatus::Busy;
        };
        let _denormals = NoDenormalsGuard::new();
        let AudioState { engine, position } = &mut *audio;
        let frames = inputs[0]
            .len()
            .min(inputs[1].len())
            .min(out_left.len())
            .min(out_right.len());

        engine.begin_host_block(transport);
        let mut pending = events.iter().peekable();
        for frame in 0..frames {
            if *position == BLOCK_SIZE {
                while let Some(event) = pending.next_if(|event| event.time() as usize <= frame) {
                    engine.apply_host_event(event);
                }
                engine.process_control(out);
                *position = 0;
            }
            let rendered = engine.output();
            out_left[frame] = rendered[0][*position];
            out_right[frame] = rendered[1][*position];
            let input = engine.input_mut();
            input[0][*position] = inputs[0][frame];
            input[1][*position] = inputs[1][frame];
            *position += 1;
        }
        for event in pending {
            engine.apply_host_event(event);
        }
        out_left[frames..].fill(0.0);
        out_right[frames..].fill(0.0);
        ProcessStatus::Continue
    }

    /// Applies `events` and the queued UI messages without rendering.
    pub fn params_flush(&self, events: &[HostEvent], out: &mut dyn OutputEvents) -> ProcessStatus {
        let Some(mut audio) = self.audio.try_lock() else {
            return ProcessStatus::Busy;
        };
        for event in events {
            audio.engine.apply_host_event(event);
        }
        audio.engine.flush(out);
        ProcessStatus::Continue
    }

    /// Takes a ramp-settled snapshot of the audio-side patch. Never waits
    /// longer than the configured stream budget for the audio thread.
    pub fn state_save(&self) -> StreamSnapshot {
        self.flags.set_ready_for_stream(false);
        if self.to_audio.try_push(MainToAudioMsg::SendPrepForStream).is_err() {
            warn!("audio queue full; stream preparation will be forced");
        }
        self.host.request_flush();

        let outcome = await_ready_for_stream(&self.flags, &self.config.stream, std::thread::sleep);
        let state = {
            let mut audio = self.audio.lock();
            if outcome.is_forced() {
                audio.engine.prep_for_stream();
            }
            audio.engine.patch().to_state()
        };
        self.flags.set_ready_for_stream(false);
        debug!(?outcome, "state saved");
        StreamSnapshot { state, outcome }
    }

    /// Migrates `state` and replays it into the audio thread.
    pub fn state_load(&self, state: &PatchState) -> Result<(), EngineError> {
        let mut patch = Patch::new();
        patch.apply_state(state)?;
        send_entire_patch_to_audio(&patch, &self.to_audio, &self.outbound_names)?;
        self.host.request_flush();
        info!(name = patch.name.as_str(), version = state.version, "state loaded");
        Ok(())
    }

    pub fn state_load_json(&self, text: &str) -> anyhow::Result<()> {
        let state = PatchState::from_json(text).context("failed to parse patch state")?;
        self.state_load(&state).context("failed to load patch state")
    }

    /// Runs work the audio thread deferred to the main thread.
    pub fn on_main_thread(&self) {
        if self.flags.take_rescan() {
            debug!("rescanning parameters");
            self.host.rescan_params();
        }
    }

    /// Builds the editor bridge. Only one editor can exist, since it is the
    /// sole consumer of the audio-to-UI queue.
    pub fn take_editor(&self) -> Option<EditorBridge> {
        let from_audio = self.from_audio.lock().take()?;
        let endpoint = MainEndpoint {
            to_audio: self.to_audio.clone(),
            from_audio,
            flags: Arc::clone(&self.flags),
            inbound_names: Arc::clone(&self.inbound_names),
            outbound_names: Arc::clone(&self.outbound_names),
        };
        Some(EditorBridge::new(endpoint, Arc::clone(&self.host)))
    }

    /// Parameter metadata in presentation order.
    pub fn param_infos(&self) -> Vec<ParamMeta> {
        let patch = Patch::new();
        patch
            .presentation_order()
            .into_iter()
            .map(|index| patch.param(index).meta.clone())
            .collect()
    }

    /// Queues an untyped message for the audio thread. Returns `Ok(false)`
    /// when the message does not decode; it is logged and dropped.
    pub fn send_raw(&self, raw: RawMainToAudioMsg) -> Result<bool, EngineError> {
        let Some(msg) = MainToAudioMsg::decode_or_skip(raw) else {
            return Ok(false);
        };
        self.to_audio.try_push(msg).map_err(|_| EngineError::QueueFull)?;
        self.host.request_flush();
        Ok(true)
    }

    pub fn sender(&self) -> EventSender<MainToAudioMsg> {
        self.to_audio.clone()
    }

    /// Runs `f` on the engine, blocking the audio thread out for the call.
    pub fn with_engine<R>(&self, f: impl FnOnce(&Engine) -> R) -> R {
        f(&self.audio.lock().engine)
    }
}
