//! Message catalogues of the two queues.
//!
//! Both directions carry small `Copy` values. Names travel as handles into
//! the sender's [`twofilters_rt::NamePool`].

use tracing::warn;
use twofilters_rt::NameHandle;

use crate::error::MessageError;

/// Main/UI thread to audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MainToAudioMsg {
    RequestRefresh,
    SetParam { id: u32, value: f32 },
    SetParamWithoutNotifying { id: u32, value: f32 },
    BeginEdit { id: u32 },
    EndEdit { id: u32 },
    StopAudio,
    StartAudio,
    SendPatchName(NameHandle),
    SendPatchIsClean,
    SendPostLoad,
    SendRequestRescan,
    EditorAttachDetach(bool),
    SendPrepForStream,
    SetFilterModel { slot: u32, setup: [u32; 5] },
    PanicStopVoices,
}

/// Audio thread to main/UI thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioToUiMsg {
    UpdateParam { id: u32, value: f32 },
    UpdateVu { left: f32, right: f32 },
    UpdateLfoStep { lfo: u8, step: u16, phase: f32, level: f32 },
    SetPatchName(NameHandle),
    SetPatchDirtyState(bool),
    DoParamRescan,
    SendSampleRate(f64),
    SendFilterConfig { slot: u32, setup: [u32; 5] },
}

/// Numeric action tags used by adapters that carry untyped messages.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainToAudioAction {
    RequestRefresh = 0,
    SetParam = 1,
    SetParamWithoutNotifying = 2,
    BeginEdit = 3,
    EndEdit = 4,
    StopAudio = 5,
    StartAudio = 6,
    SendPatchName = 7,
    SendPatchIsClean = 8,
    SendPostLoad = 9,
    SendRequestRescan = 10,
    EditorAttachDetach = 11,
    SendPrepForStream = 12,
    SetFilterModel = 13,
    PanicStopVoices = 14,
}

impl MainToAudioAction {
    pub const ALL: [MainToAudioAction; 15] = [
        Self::RequestRefresh,
        Self::SetParam,
        Self::SetParamWithoutNotifying,
        Self::BeginEdit,
        Self::EndEdit,
        Self::StopAudio,
        Self::StartAudio,
        Self::SendPatchName,
        Self::SendPatchIsClean,
        Self::SendPostLoad,
        Self::SendRequestRescan,
        Self::EditorAttachDetach,
        Self::SendPrepForStream,
        Self::SetFilterModel,
        Self::PanicStopVoices,
    ];

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

/// Untyped form: action tag plus every payload field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawMainToAudioMsg {
    pub action: u32,
    pub param_id: u32,
    pub value: f32,
    pub uint_values: [u32; 5],
    pub name: Option<NameHandle>,
}

impl TryFrom<RawMainToAudioMsg> for MainToAudioMsg {
    type Error = MessageError;

    fn try_from(raw: RawMainToAudioMsg) -> Result<Self, Self::Error> {
        use MainToAudioAction as A;

        let action = A::from_tag(raw.action).ok_or(MessageError::UnknownAction(raw.action))?;
        let id = raw.param_id;
        Ok(match action {
            A::RequestRefresh => Self::RequestRefresh,
            A::SetParam => Self::SetParam { id, value: raw.value },
            A::SetParamWithoutNotifying => Self::SetParamWithoutNotifying { id, value: raw.value },
            A::BeginEdit => Self::BeginEdit { id },
            A::EndEdit => Self::EndEdit { id },
            A::StopAudio => Self::StopAudio,
            A::StartAudio => Self::StartAudio,
            A::SendPatchName => Self::SendPatchName(raw.name.ok_or(MessageError::MissingName {
                action: "SendPatchName",
            })?),
            A::SendPatchIsClean => Self::SendPatchIsClean,
            A::SendPostLoad => Self::SendPostLoad,
            A::SendRequestRescan => Self::SendRequestRescan,
            A::EditorAttachDetach => Self::EditorAttachDetach(raw.uint_values[0] != 0),
            A::SendPrepForStream => Self::SendPrepForStream,
            A::SetFilterModel => Self::SetFilterModel {
                slot: id,
                setup: raw.uint_values,
            },
            A::PanicStopVoices => Self::PanicStopVoices,
        })
    }
}

impl MainToAudioMsg {
    /// Decodes `raw`, logging and skipping anything that does not decode.
    pub fn decode_or_skip(raw: RawMainToAudioMsg) -> Option<Self> {
        match Self::try_from(raw) {
            Ok(msg) => Some(msg),
            Err(err) => {
                warn!(%err, action = raw.action, "raw message skipped");
                None
            }
        }
    }
}

/// Decodes arbitrary bytes into raw messages and runs them through an engine.
#[cfg(feature = "fuzzing")]
pub fn fuzz_message_stream(data: &[u8]) {
    use crate::{connect, Engine, EngineConfig, NullHost, OutputEvent, BLOCK_SIZE};
    use std::sync::Arc;

    let config = EngineConfig::default().with_queue_capacities(256, 256);
    let (audio, main) = connect(&config);
    let mut engine = Engine::new(&config, audio, Arc::new(NullHost));
    let mut events: Vec<OutputEvent> = Vec::new();

    for chunk in data.chunks(12) {
        let mut bytes = [0u8; 12];
        bytes[..chunk.len()].copy_from_slice(chunk);
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let raw = RawMainToAudioMsg {
            action: word(0) % 20,
            param_id: word(4) % 2200,
            value: f32::from_bits(word(8)),
            uint_values: [word(8) % 6, word(4) % 6, word(0) % 4, word(8) % 3, word(4) % 3],
            name: None,
        };
        if let Some(msg) = MainToAudioMsg::decode_or_skip(raw) {
            let _ = main.to_audio.try_push(msg);
        }
        engine.input_mut()[0] = [0.25; BLOCK_SIZE];
        engine.process_control(&mut events);
        assert!(engine.output().iter().flatten().all(|s| s.is_finite()));
    }
}
