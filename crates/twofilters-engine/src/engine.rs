//! The audio-side engine and its per-block control-rate driver.
//!
//! Everything here runs on the audio thread: no allocation, no locks and no
//! blocking. The engine talks to the main thread only through its
//! [`AudioEndpoint`].

use std::sync::Arc;

use tracing::{debug, info, warn};
use twofilters_dsp::meter::PeakMeter;
use twofilters_rt::{ActiveSet, EventReceiver, EventSender, NamePool, SharedFlags};

use crate::bridge::AudioEndpoint;
use crate::config::{EngineConfig, BLOCK_SIZE};
use crate::error::FilterError;
use crate::filter::FilterSlot;
use crate::host::{HostCallbacks, HostEvent, OutputEvents};
use crate::lag::{MidiLags, CHANNEL_PRESSURE_LAG, PITCH_BEND_LAG};
use crate::messages::{AudioToUiMsg, MainToAudioMsg};
use crate::patch::{ids, ParamAddress, ParamKind, Patch, MAX_STEPS, NUM_FILTERS, NUM_LFOS};
use crate::routing::{ModulatedValues, RoutingGraph};
use crate::step_lfo::{step_rate, StepLfo};
use crate::transport::{TransportInfo, TransportTracker};

pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

/// One control block of stereo audio, `[channel][frame]`.
pub type Block = [[f32; BLOCK_SIZE]; 2];

/// Returns the LFO whose step storage the parameter `id` belongs to.
fn lfo_storage_owner(id: u32) -> Option<usize> {
    match ParamAddress::of(id)? {
        ParamAddress::Lfo { lfo, offset }
            if offset == ids::LFO_STEP_COUNT
                || (ids::LFO_STEPS..ids::LFO_STEPS + MAX_STEPS as u32).contains(&offset) =>
        {
            Some(lfo)
        }
        _ => None,
    }
}

pub struct Engine {
    config: EngineConfig,
    patch: Patch,
    active: ActiveSet,
    midi_lags: MidiLags,
    filters: [FilterSlot; NUM_FILTERS],
    lfos: [StepLfo; NUM_LFOS],
    transport: TransportTracker,
    routing: RoutingGraph,
    modulated: ModulatedValues,
    meter: PeakMeter,
    vu_interval: u32,
    vu_countdown: u32,
    sample_rate: f64,
    audio_running: bool,
    gesture_depth: u32,
    to_ui: EventSender<AudioToUiMsg>,
    from_main: EventReceiver<MainToAudioMsg>,
    flags: Arc<SharedFlags>,
    inbound_names: Arc<NamePool>,
    outbound_names: Arc<NamePool>,
    host: Arc<dyn HostCallbacks>,
    input: Block,
    output: Block,
}

impl Engine {
    pub fn new(config: &EngineConfig, endpoint: AudioEndpoint, host: Arc<dyn HostCallbacks>) -> Self {
        let patch = Patch::new();
        let filters = std::array::from_fn(|slot| {
            FilterSlot::new(slot, patch.filter_setups[slot], DEFAULT_SAMPLE_RATE as f32)
        });
        let modulated = ModulatedValues::compute(&patch, &[0.0; NUM_LFOS]);
        let AudioEndpoint {
            to_ui,
            from_main,
            flags,
            inbound_names,
            outbound_names,
        } = endpoint;

        let mut engine = Self {
            config: config.clone(),
            patch,
            active: ActiveSet::new(),
            midi_lags: MidiLags::new(),
            filters,
            lfos: [StepLfo::new(); NUM_LFOS],
            transport: TransportTracker::new(),
            routing: RoutingGraph::new(),
            modulated,
            meter: PeakMeter::default(),
            vu_interval: 1,
            vu_countdown: 1,
            sample_rate: DEFAULT_SAMPLE_RATE,
            audio_running: true,
            gesture_depth: 0,
            to_ui,
            from_main,
            flags,
            inbound_names,
            outbound_names,
            host,
            input: [[0.0; BLOCK_SIZE]; 2],
            output: [[0.0; BLOCK_SIZE]; 2],
        };
        engine.configure_rates(DEFAULT_SAMPLE_RATE);
        engine
    }

    /// Reconfigures every rate-dependent part. Must run before processing and
    /// whenever the host rate changes.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.configure_rates(sample_rate);
        info!(sample_rate = self.sample_rate, "engine sample rate set");
        self.send_to_ui(AudioToUiMsg::SendSampleRate(self.sample_rate));
    }

    fn configure_rates(&mut self, sample_rate: f64) {
        let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            warn!(sample_rate, "invalid sample rate; using default");
            DEFAULT_SAMPLE_RATE
        };
        self.sample_rate = sample_rate;
        let sr = sample_rate as f32;

        for param in &mut self.patch.params {
            param.lag.set_rate(self.config.param_smoothing_ms, sr, BLOCK_SIZE);
        }
        self.instantly_snap();
        self.midi_lags.set_rate(self.config.midi_smoothing_ms, sr, BLOCK_SIZE);
        for filter in &mut self.filters {
            filter.set_sample_rate(sr);
        }

        self.vu_interval = self.config.vu_interval_blocks(sample_rate);
        self.vu_countdown = self.vu_interval;
        let interval_s = self.vu_interval as f32 * BLOCK_SIZE as f32 / sr;
        self.meter.set_release(self.config.vu_release_ms, interval_s);
        self.routing.snap_next_update();
    }

    /// Starts a host processing call with its transport snapshot.
    pub fn begin_host_block(&mut self, transport: Option<TransportInfo>) {
        if self.transport.begin_host_block(transport) {
            for lfo in &mut self.lfos {
                lfo.retrigger();
            }
        }
    }

    /// Runs one control block: reads [`Engine::input_mut`] and fills
    /// [`Engine::output`].
    pub fn process_control(&mut self, events: &mut dyn OutputEvents) {
        for filter in &mut self.filters {
            filter.conclude_block();
        }
        self.flush(events);

        if !self.audio_running {
            self.output = [[0.0; BLOCK_SIZE]; 2];
            return;
        }

        self.process_all_active();

        if self
            .transport
            .tick(BLOCK_SIZE, self.sample_rate, self.patch.retrigger_mode())
        {
            for lfo in &mut self.lfos {
                lfo.retrigger();
            }
        }
        let lfo_outputs = self.advance_lfos();

        self.modulated = ModulatedValues::compute(&self.patch, &lfo_outputs);
        for (slot, filter) in self.filters.iter_mut().enumerate() {
            filter.prepare_block(self.modulated.filter_inputs(slot));
        }
        self.routing.update(&self.patch, &self.modulated);
        self.routing.process(&mut self.filters, &self.input, &mut self.output);

        if self.flags.is_editor_attached() {
            self.update_telemetry();
        }
    }

    /// Applies every queued message and rebuilds pending filter slots without
    /// rendering. A full UI refresh runs at most once per call.
    pub fn flush(&mut self, events: &mut dyn OutputEvents) {
        let mut refresh_requested = false;
        while let Some(msg) = self.from_main.pop() {
            self.apply_message(msg, events, &mut refresh_requested);
        }
        let implicit_refresh = self.flags.take_full_refresh();
        if refresh_requested || implicit_refresh {
            self.push_full_ui_refresh();
        }
        for (slot, filter) in self.filters.iter_mut().enumerate() {
            filter.rebuild_if_pending(self.modulated.filter_inputs(slot));
        }
    }

    fn advance_lfos(&mut self) -> [f32; NUM_LFOS] {
        let block_seconds = BLOCK_SIZE as f32 / self.sample_rate as f32;
        let tempo = self.transport.tempo_bpm();
        let mut outputs = [0.0; NUM_LFOS];
        for (index, lfo) in self.lfos.iter_mut().enumerate() {
            let node = &self.patch.lfos[index];
            if lfo.is_stale() {
                let (levels, count) = self.patch.step_levels(index);
                lfo.load_steps(levels, count);
            }
            lfo.set_smooth(self.patch.value(node.smooth));
            let rate = step_rate(self.patch.value(node.rate), self.patch.bool_value(node.tempo_sync), tempo);
            outputs[index] = lfo.advance(rate, block_seconds);
        }
        outputs
    }

    fn update_telemetry(&mut self) {
        self.meter.accumulate(&self.output[0], &self.output[1]);
        self.vu_countdown = self.vu_countdown.saturating_sub(1);
        if self.vu_countdown > 0 {
            return;
        }
        self.vu_countdown = self.vu_interval;
        let (left, right) = self.meter.take();
        self.send_to_ui(AudioToUiMsg::UpdateVu { left, right });
        for (index, lfo) in self.lfos.iter().enumerate() {
            self.send_to_ui(AudioToUiMsg::UpdateLfoStep {
                lfo: index as u8,
                step: lfo.step() as u16,
                phase: lfo.phase(),
                level: lfo.output(),
            });
        }
    }

    fn apply_message(&mut self, msg: MainToAudioMsg, events: &mut dyn OutputEvents, refresh: &mut bool) {
        if self.config.log.verbose {
            debug!(?msg, "applying message");
        }
        match msg {
            MainToAudioMsg::RequestRefresh => *refresh = true,
            MainToAudioMsg::SetParam { id, value } => {
                if self.gesture_depth == 0 {
                    warn!(id, "parameter edited outside a begin/end gesture");
                }
                let Some(index) = self.lookup(id) else {
                    return;
                };
                self.set_param_target(index, value);
                let target = self.patch.param(index).target();
                events.param_value(id, target);
                self.send_to_ui(AudioToUiMsg::UpdateParam { id, value: target });
                self.mark_dirty();
            }
            MainToAudioMsg::SetParamWithoutNotifying { id, value } => {
                let Some(index) = self.lookup(id) else {
                    return;
                };
                self.patch.set_value_direct(index, value);
                self.active.remove(&mut self.patch.params, index);
                self.after_param_write(index);
                self.mark_dirty();
            }
            MainToAudioMsg::BeginEdit { id } => {
                self.gesture_depth += 1;
                events.gesture(id, true);
            }
            MainToAudioMsg::EndEdit { id } => {
                if self.gesture_depth == 0 {
                    warn!(id, "end of edit without a matching begin");
                } else {
                    self.gesture_depth -= 1;
                }
                events.gesture(id, false);
            }
            MainToAudioMsg::StopAudio => {
                self.instantly_snap();
                self.audio_running = false;
                self.silence();
            }
            MainToAudioMsg::StartAudio => self.audio_running = true,
            MainToAudioMsg::SendPatchName(handle) => match self.inbound_names.read(handle, &mut self.patch.name) {
                Ok(()) => {
                    let handle = self.outbound_names.write(self.patch.name.as_str());
                    self.send_to_ui(AudioToUiMsg::SetPatchName(handle));
                }
                Err(err) => warn!(%err, "patch name could not be read"),
            },
            MainToAudioMsg::SendPatchIsClean => {
                self.patch.dirty = false;
                self.send_to_ui(AudioToUiMsg::SetPatchDirtyState(false));
            }
            MainToAudioMsg::SendPostLoad => {
                self.flags.request_full_refresh();
                self.instantly_snap();
            }
            MainToAudioMsg::SendRequestRescan => {
                self.flags.request_rescan();
                self.send_to_ui(AudioToUiMsg::DoParamRescan);
                self.host.request_callback();
            }
            MainToAudioMsg::EditorAttachDetach(attached) => {
                self.flags.set_editor_attached(attached);
                if attached {
                    self.meter.reset();
                    self.vu_countdown = self.vu_interval;
                }
            }
            MainToAudioMsg::SendPrepForStream => self.prep_for_stream(),
            MainToAudioMsg::SetFilterModel { slot, setup } => self.set_filter_model(slot, setup),
            MainToAudioMsg::PanicStopVoices => self.silence(),
        }
    }

    fn lookup(&self, id: u32) -> Option<usize> {
        let index = self.patch.param_index(id);
        if index.is_none() {
            warn!(id, "message for unknown parameter id");
        }
        index
    }

    fn set_filter_model(&mut self, slot: u32, raw: [u32; 5]) {
        let Some(filter) = self.filters.get_mut(slot as usize) else {
            warn!(err = %FilterError::InvalidSlot(slot), "filter configuration rejected");
            return;
        };
        let Some(setup) = filter.configure_raw(raw) else {
            return;
        };
        let index = slot as usize;
        if self.patch.filter_setups[index] != setup {
            self.patch.filter_setups[index] = setup;
            self.mark_dirty();
        }
        self.send_to_ui(AudioToUiMsg::SendFilterConfig {
            slot,
            setup: setup.to_raw(),
        });
    }

    /// Clears filter and feedback state.
    fn silence(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
        self.routing.reset();
        self.output = [[0.0; BLOCK_SIZE]; 2];
    }

    fn mark_dirty(&mut self) {
        if !self.patch.dirty {
            self.patch.dirty = true;
            self.send_to_ui(AudioToUiMsg::SetPatchDirtyState(true));
        }
    }

    /// Structural side effects of writing parameter `index`.
    fn after_param_write(&mut self, index: usize) {
        if index == self.patch.routing.oversample {
            let factor = if self.patch.bool_value(index) { 2 } else { 1 };
            for filter in &mut self.filters {
                filter.set_oversample(factor);
            }
        }
        for (slot, node) in self.patch.filters.iter().enumerate() {
            if index == node.active {
                self.filters[slot].set_enabled(self.patch.bool_value(index));
            }
        }
        if let Some(lfo) = lfo_storage_owner(self.patch.param(index).id()) {
            self.lfos[lfo].mark_stale();
        }
    }

    #[inline]
    fn send_to_ui(&self, msg: AudioToUiMsg) {
        self.to_ui.push_lossy(msg);
    }

    /// Starts a ramp towards `value`. Boolean and stepped parameters are
    /// written directly.
    pub fn set_param_target(&mut self, index: usize, value: f32) {
        let ramping = {
            let param = &mut self.patch.params[index];
            let value = param.meta.clamp(value);
            match param.meta.kind {
                ParamKind::Continuous => {
                    param.lag.set_target(value);
                    param.lag.is_active()
                }
                ParamKind::Boolean | ParamKind::Stepped => {
                    param.set_direct(value);
                    false
                }
            }
        };
        if ramping {
            self.active.insert(&mut self.patch.params, index);
        } else {
            self.active.remove(&mut self.patch.params, index);
        }
        self.after_param_write(index);
    }

    /// Advances every ramping parameter and MIDI lag by one block.
    pub fn process_all_active(&mut self) {
        let lfos = &mut self.lfos;
        self.active.retain(&mut self.patch.params, |_, param| {
            param.lag.process();
            if let Some(lfo) = lfo_storage_owner(param.id()) {
                lfos[lfo].mark_stale();
            }
            param.lag.is_active()
        });
        self.midi_lags.process_all();
    }

    pub fn snap_param_to_target(&mut self, index: usize) {
        self.patch.params[index].lag.snap_to_target();
        self.active.remove(&mut self.patch.params, index);
        self.after_param_write(index);
    }

    /// Settles every ramp and empties the active set.
    pub fn instantly_snap(&mut self) {
        self.active.retain(&mut self.patch.params, |_, param| {
            param.lag.snap_to_target();
            false
        });
        self.midi_lags.snap_all();
        for lfo in &mut self.lfos {
            lfo.mark_stale();
        }
    }

    /// Audio side of the stream snapshot handshake.
    pub fn prep_for_stream(&mut self) {
        self.instantly_snap();
        self.patch.dirty = false;
        self.send_to_ui(AudioToUiMsg::SetPatchDirtyState(false));
        self.flags.request_full_refresh();
        self.flags.set_ready_for_stream(true);
        debug!("ready for stream");
    }

    /// Applies a host event. Automation ramps like a UI edit but is not
    /// echoed back to the host.
    pub fn apply_host_event(&mut self, event: &HostEvent) {
        match *event {
            HostEvent::ParamValue { id, value, .. } => {
                let Some(index) = self.lookup(id) else {
                    return;
                };
                self.set_param_target(index, value);
                let target = self.patch.param(index).target();
                self.send_to_ui(AudioToUiMsg::UpdateParam { id, value: target });
                self.mark_dirty();
            }
            HostEvent::Midi { data, .. } => self.apply_midi(data),
        }
    }

    fn apply_midi(&mut self, data: [u8; 3]) {
        let [_, d1, d2] = data.map(|byte| byte & 0x7F);
        match data[0] & 0xF0 {
            0xB0 => self.midi_lags.set_target(usize::from(d1), f32::from(d2) / 127.0),
            0xE0 => {
                let raw = u16::from(d1) | (u16::from(d2) << 7);
                self.midi_lags
                    .set_target(PITCH_BEND_LAG, (f32::from(raw) - 8192.0) / 8192.0);
            }
            0xD0 => self.midi_lags.set_target(CHANNEL_PRESSURE_LAG, f32::from(d1) / 127.0),
            _ => {
                if self.config.log.verbose {
                    debug!(status = data[0], "ignoring midi message");
                }
            }
        }
    }

    /// Sends every parameter target plus name, dirty state, sample rate and
    /// filter setups to the UI.
    pub fn push_full_ui_refresh(&self) {
        for param in self.patch.params() {
            self.send_to_ui(AudioToUiMsg::UpdateParam {
                id: param.id(),
                value: param.target(),
            });
        }
        let handle = self.outbound_names.write(self.patch.name.as_str());
        self.send_to_ui(AudioToUiMsg::SetPatchName(handle));
        self.send_to_ui(AudioToUiMsg::SetPatchDirtyState(self.patch.dirty));
        self.send_to_ui(AudioToUiMsg::SendSampleRate(self.sample_rate));
        for (slot, setup) in self.patch.filter_setups.iter().enumerate() {
            self.send_to_ui(AudioToUiMsg::SendFilterConfig {
                slot: slot as u32,
                setup: setup.to_raw(),
            });
        }
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn input_mut(&mut self) -> &mut Block {
        &mut self.input
    }

    pub fn output(&self) -> &Block {
        &self.output
    }

    pub fn filter(&self, slot: usize) -> &FilterSlot {
        &self.filters[slot]
    }

    pub fn lfo(&self, index: usize) -> &StepLfo {
        &self.lfos[index]
    }

    pub fn modulated(&self) -> &ModulatedValues {
        &self.modulated
    }

    pub fn transport(&self) -> &TransportTracker {
        &self.transport
    }

    /// Number of parameters currently ramping.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn midi_value(&self, index: usize) -> f32 {
        self.midi_lags.value(index)
    }

    pub fn is_audio_running(&self) -> bool {
        self.audio_running
    }

    pub fn gesture_depth(&self) -> u32 {
        self.gesture_depth
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn flags(&self) -> &SharedFlags {
        &self.flags
    }
}
