//! Real-time engine of the Two Filters effect: parameter smoothing, the
//! filter/LFO modulation graph, the transport retrigger machine and the
//! lock-free protocol that keeps the UI in step with the audio thread.

pub mod bridge;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod filter;
pub mod host;
pub mod lag;
pub mod messages;
pub mod patch;
pub mod plugin;
pub mod routing;
pub mod step_lfo;
pub mod stream;
pub mod transport;

pub use bridge::{connect, AudioEndpoint, MainEndpoint};
pub use config::{EngineConfig, LogConfig, StreamPrepConfig, BLOCK_SIZE};
pub use editor::{EditorBridge, LfoPosition};
pub use engine::{Engine, DEFAULT_SAMPLE_RATE};
pub use error::{EngineError, FilterError, MessageError, StateError};
pub use filter::{FilterModel, FilterSetup, FilterSlot, SlotState};
pub use host::{HostCallbacks, HostEvent, NullHost, OutputEvent, OutputEvents};
pub use messages::{AudioToUiMsg, MainToAudioMsg, RawMainToAudioMsg};
pub use patch::{Patch, PatchState, PATCH_VERSION};
pub use plugin::{ProcessStatus, StreamSnapshot, TwoFiltersPlugin};
pub use routing::{Destination, ModulatedValues, RoutingMode};
pub use stream::StreamPrepOutcome;
pub use transport::{PlayState, RetriggerMode, TransportInfo};

#[cfg(feature = "fuzzing")]
pub use messages::fuzz_message_stream;
#[cfg(feature = "fuzzing")]
pub use patch::state::fuzz_parse_state;
