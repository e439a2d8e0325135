//! Seams to the host adapter.

/// Host services the engine may request. Implementations must be callable
/// from the audio thread without blocking.
pub trait HostCallbacks: Send + Sync {
    /// Asks the host to schedule a main-thread callback.
    fn request_callback(&self);
    /// Asks the host to re-read parameter metadata and values.
    fn rescan_params(&self);
    /// Asks the host to run a parameter flush when it is not processing.
    fn request_flush(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl HostCallbacks for NullHost {
    fn request_callback(&self) {}
    fn rescan_params(&self) {}
    fn request_flush(&self) {}
}

/// Notifications for the host produced while processing.
pub trait OutputEvents {
    fn param_value(&mut self, id: u32, value: f32);
    fn gesture(&mut self, id: u32, begin: bool);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputEvent {
    ParamValue { id: u32, value: f32 },
    GestureBegin { id: u32 },
    GestureEnd { id: u32 },
}

impl OutputEvents for Vec<OutputEvent> {
    fn param_value(&mut self, id: u32, value: f32) {
        self.push(OutputEvent::ParamValue { id, value });
    }

    fn gesture(&mut self, id: u32, begin: bool) {
        self.push(if begin {
            OutputEvent::GestureBegin { id }
        } else {
            OutputEvent::GestureEnd { id }
        });
    }
}

/// Timestamped input events, `time` in samples from the start of the host
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    ParamValue { time: u32, id: u32, value: f32 },
    Midi { time: u32, data: [u8; 3] },
}

impl HostEvent {
    pub fn time(&self) -> u32 {
        match self {
            HostEvent::ParamValue { time, .. } | HostEvent::Midi { time, .. } => *time,
        }
    }
}
