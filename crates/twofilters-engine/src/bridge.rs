//! The two channels between the audio thread and the main thread.
//!
//! Neither side owns the other. Each endpoint holds one producer, one
//! consumer, the shared flags and the name pools.

use std::sync::Arc;

use twofilters_rt::{channel, EventReceiver, EventSender, NamePool, SharedFlags};

use crate::config::EngineConfig;
use crate::messages::{AudioToUiMsg, MainToAudioMsg};

pub struct AudioEndpoint {
    pub to_ui: EventSender<AudioToUiMsg>,
    pub from_main: EventReceiver<MainToAudioMsg>,
    pub flags: Arc<SharedFlags>,
    /// Written by the main thread, read here.
    pub inbound_names: Arc<NamePool>,
    /// Written here, read by the main thread.
    pub outbound_names: Arc<NamePool>,
}

pub struct MainEndpoint {
    pub to_audio: EventSender<MainToAudioMsg>,
    pub from_audio: EventReceiver<AudioToUiMsg>,
    pub flags: Arc<SharedFlags>,
    pub inbound_names: Arc<NamePool>,
    pub outbound_names: Arc<NamePool>,
}

pub fn connect(config: &EngineConfig) -> (AudioEndpoint, MainEndpoint) {
    let (to_ui, from_audio) = channel(config.to_ui_capacity);
    let (to_audio, from_main) = channel(config.to_audio_capacity);
    let flags = Arc::new(SharedFlags::new());
    let main_names = Arc::new(NamePool::new(config.name_pool_slots));
    let audio_names = Arc::new(NamePool::new(config.name_pool_slots));

    let audio = AudioEndpoint {
        to_ui,
        from_main,
        flags: Arc::clone(&flags),
        inbound_names: Arc::clone(&main_names),
        outbound_names: Arc::clone(&audio_names),
    };
    let main = MainEndpoint {
        to_audio,
        from_audio,
        flags,
        inbound_names: audio_names,
        outbound_names: main_names,
    };
    (audio, main)
}
