use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot flags shared between the audio and main threads. Each flag has a
/// single writing side per transition; release stores pair with acquire loads.
#[derive(Debug, Default)]
pub struct SharedFlags {
    do_full_refresh: AtomicBool,
    on_main_rescan_params: AtomicBool,
    ready_for_stream: AtomicBool,
    is_editor_attached: AtomicBool,
}

impl SharedFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_full_refresh(&self) {
        self.do_full_refresh.store(true, Ordering::Release);
    }

    /// Clears the refresh request and reports whether one was pending.
    pub fn take_full_refresh(&self) -> bool {
        self.do_full_refresh.swap(false, Ordering::AcqRel)
    }

    pub fn request_rescan(&self) {
        self.on_main_rescan_params.store(true, Ordering::Release);
    }

    pub fn take_rescan(&self) -> bool {
        self.on_main_rescan_params.swap(false, Ordering::AcqRel)
    }

    pub fn set_ready_for_stream(&self, ready: bool) {
        self.ready_for_stream.store(ready, Ordering::Release);
    }

    pub fn is_ready_for_stream(&self) -> bool {
        self.ready_for_stream.load(Ordering::Acquire)
    }

    pub fn set_editor_attached(&self, attached: bool) {
        self.is_editor_attached.store(attached, Ordering::Release);
    }

    pub fn is_editor_attached(&self) -> bool {
        self.is_editor_attached.load(Ordering::Acquire)
    }
}
