//! UI-side view of the engine.
//!
//! The editor keeps its own [`Patch`] copy and learns about audio-side changes
//! only through the audio-to-UI queue.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::bridge::MainEndpoint;
use crate::error::{EngineError, FilterError};
use crate::filter::FilterSetup;
use crate::host::HostCallbacks;
use crate::messages::{AudioToUiMsg, MainToAudioMsg};
use crate::patch::{send_entire_patch_to_audio, Patch, PatchState, NUM_FILTERS, NUM_LFOS};
use crate::step_lfo::preview_curve;

/// Last LFO position reported by the audio thread.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LfoPosition {
    pub step: usize,
    pub phase: f32,
    pub level: f32,
}

pub struct EditorBridge {
    patch: Patch,
    endpoint: MainEndpoint,
    host: Arc<dyn HostCallbacks>,
    sample_rate: f64,
    vu: (f32, f32),
    lfo_positions: [LfoPosition; NUM_LFOS],
    attached: bool,
    metadata_reload: bool,
}

impl EditorBridge {
    pub fn new(endpoint: MainEndpoint, host: Arc<dyn HostCallbacks>) -> Self {
        Self {
            patch: Patch::new(),
            endpoint,
            host,
            sample_rate: 0.0,
            vu: (0.0, 0.0),
            lfo_positions: [LfoPosition::default(); NUM_LFOS],
            attached: false,
            metadata_reload: false,
        }
    }

    fn send(&self, msg: MainToAudioMsg) -> Result<(), EngineError> {
        self.endpoint.to_audio.try_push(msg).map_err(|_| EngineError::QueueFull)
    }

    /// Starts telemetry and asks for a full refresh of the UI copy.
    pub fn attach(&mut self) -> Result<(), EngineError> {
        self.send(MainToAudioMsg::EditorAttachDetach(true))?;
        self.send(MainToAudioMsg::RequestRefresh)?;
        self.attached = true;
        Ok(())
    }

    pub fn detach(&mut self) -> Result<(), EngineError> {
        self.send(MainToAudioMsg::EditorAttachDetach(false))?;
        self.attached = false;
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Drains the audio-to-UI queue into the UI copy. Returns the number of
    /// messages applied.
    pub fn idle(&mut self) -> usize {
        let mut applied = 0;
        while let Some(msg) = self.endpoint.from_audio.pop() {
            self.apply(msg);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, msg: AudioToUiMsg) {
        match msg {
            AudioToUiMsg::UpdateParam { id, value } => match self.patch.param_index(id) {
                Some(index) => self.patch.set_value_direct(index, value),
                None => warn!(id, "update for unknown parameter id"),
            },
            AudioToUiMsg::UpdateVu { left, right } => self.vu = (left, right),
            AudioToUiMsg::UpdateLfoStep { lfo, step, phase, level } => {
                if let Some(position) = self.lfo_positions.get_mut(usize::from(lfo)) {
                    *position = LfoPosition {
                        step: usize::from(step),
                        phase,
                        level,
                    };
                }
            }
            AudioToUiMsg::SetPatchName(handle) => {
                if let Err(err) = self.endpoint.inbound_names.read(handle, &mut self.patch.name) {
                    warn!(%err, "patch name from audio thread could not be read");
                }
            }
            AudioToUiMsg::SetPatchDirtyState(dirty) => self.patch.dirty = dirty,
            AudioToUiMsg::DoParamRescan => self.metadata_reload = true,
            AudioToUiMsg::SendSampleRate(sample_rate) => self.sample_rate = sample_rate,
            AudioToUiMsg::SendFilterConfig { slot, setup } => {
                let slot_index = slot as usize;
                match FilterSetup::from_raw(setup) {
                    Ok(setup) if slot_index < NUM_FILTERS => self.patch.filter_setups[slot_index] = setup,
                    Ok(_) => warn!(err = %FilterError::InvalidSlot(slot), "filter config ignored"),
                    Err(err) => warn!(slot, %err, "filter config ignored"),
                }
            }
        }
    }

    /// Writes the UI copy and sends the edit. With `gesture` the edit is
    /// wrapped in its own begin/end pair; without it the caller is expected
    /// to have opened one already.
    pub fn set_and_send_param_value(&mut self, id: u32, value: f32, gesture: bool) -> Result<(), EngineError> {
        let index = self.patch.param_index(id).ok_or(EngineError::UnknownParam(id))?;
        self.patch.set_value_direct(index, value);
        let value = self.patch.value(index);
        if gesture {
            self.send(MainToAudioMsg::BeginEdit { id })?;
        }
        self.send(MainToAudioMsg::SetParam { id, value })?;
        if gesture {
            self.send(MainToAudioMsg::EndEdit { id })?;
        }
        self.host.request_flush();
        Ok(())
    }

    /// Selects a new setup for `slot`. Combinations that are not available
    /// are rejected before anything is sent.
    pub fn push_filter_setup(&mut self, slot: usize, setup: FilterSetup) -> Result<(), EngineError> {
        if slot >= NUM_FILTERS {
            return Err(FilterError::InvalidSlot(slot as u32).into());
        }
        setup.validate()?;
        self.patch.filter_setups[slot] = setup;
        self.send(MainToAudioMsg::SetFilterModel {
            slot: slot as u32,
            setup: setup.to_raw(),
        })?;
        self.host.request_flush();
        Ok(())
    }

    pub fn begin_edit(&self, id: u32) -> Result<(), EngineError> {
        self.send(MainToAudioMsg::BeginEdit { id })
    }

    pub fn end_edit(&self, id: u32) -> Result<(), EngineError> {
        self.send(MainToAudioMsg::EndEdit { id })
    }

    pub fn send_patch_name(&mut self, name: &str) -> Result<(), EngineError> {
        self.patch.name.set(name);
        let handle = self.endpoint.outbound_names.write(self.patch.name.as_str());
        self.send(MainToAudioMsg::SendPatchName(handle))
    }

    /// Replaces the UI copy with `state` and replays it into the audio thread.
    pub fn load_state(&mut self, state: &PatchState) -> Result<(), EngineError> {
        self.patch.apply_state(state)?;
        send_entire_patch_to_audio(&self.patch, &self.endpoint.to_audio, &self.endpoint.outbound_names)?;
        self.host.request_flush();
        debug!(name = self.patch.name.as_str(), "editor loaded state");
        Ok(())
    }

    /// Preview of `lfo` drawn from the UI copy, or `None` for an unknown LFO.
    pub fn lfo_preview(&self, lfo: usize, points_per_step: usize) -> Option<Vec<f32>> {
        let node = self.patch.lfos.get(lfo)?;
        let (levels, count) = self.patch.step_levels(lfo);
        let smooth = self.patch.value(node.smooth);
        Some(preview_curve(&levels, count, smooth, points_per_step))
    }

    /// Whether the audio thread asked for parameter metadata to be reloaded
    /// since the last call.
    pub fn take_metadata_reload(&mut self) -> bool {
        std::mem::take(&mut self.metadata_reload)
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn vu(&self) -> (f32, f32) {
        self.vu
    }

    pub fn lfo_position(&self, lfo: usize) -> Option<LfoPosition> {
        self.lfo_positions.get(lfo).copied()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn is_dirty(&self) -> bool {
        self.patch.dirty
    }
}
