use tracing::warn;
use twofilters_rt::{EventSender, NamePool};

use super::Patch;
use crate::error::EngineError;
use crate::messages::MainToAudioMsg;

/// Replays `patch` into the audio thread as one bulk load: mute, write every
/// value without ramping and install the filter setups, unmute, then mark the
/// patch clean, settle ramps and resync the UI.
///
/// Nothing is sent unless the queue has room for the whole load, so a full
/// queue can never leave the engine muted with a partial patch.
pub fn send_entire_patch_to_audio(
    patch: &Patch,
    sender: &EventSender<MainToAudioMsg>,
    names: &NamePool,
) -> Result<(), EngineError> {
    let needed = bulk_load_len(patch);
    let free = sender.capacity().saturating_sub(sender.len());
    if free < needed {
        warn!(needed, free, "audio queue cannot take the whole patch; load skipped");
        return Err(EngineError::QueueFull);
    }
    let send = |msg| sender.try_push(msg).map_err(|_| EngineError::QueueFull);

    send(MainToAudioMsg::SendPatchName(names.write(patch.name.as_str())))?;
    send(MainToAudioMsg::StopAudio)?;
    for param in patch.params() {
        send(MainToAudioMsg::SetParamWithoutNotifying {
            id: param.id(),
            value: param.target(),
        })?;
    }
    for (slot, setup) in patch.filter_setups.iter().enumerate() {
        send(MainToAudioMsg::SetFilterModel {
            slot: slot as u32,
            setup: setup.to_raw(),
        })?;
    }
    send(MainToAudioMsg::StartAudio)?;
    send(MainToAudioMsg::SendPatchIsClean)?;
    send(MainToAudioMsg::SendPostLoad)?;
    send(MainToAudioMsg::SendRequestRescan)?;
    Ok(())
}

/// Messages sent by [`send_entire_patch_to_audio`] for `patch`.
pub fn bulk_load_len(patch: &Patch) -> usize {
    // name, stop, start, clean, post-load, rescan
    6 + patch.params().len() + patch.filter_setups.len()
}
