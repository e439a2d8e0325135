/// Stereo peak follower feeding the VU display. Peaks are collected block by
/// block and decay exponentially between reads.
#[derive(Clone, Copy, Debug)]
pub struct PeakMeter {
    held: [f32; 2],
    shown: [f32; 2],
    falloff: f32,
}

impl Default for PeakMeter {
    fn default() -> Self {
        Self {
            held: [0.0; 2],
            shown: [0.0; 2],
            falloff: 0.0,
        }
    }
}

impl PeakMeter {
    /// `interval_s` is the time between two [`PeakMeter::take`] calls.
    pub fn new(release_ms: f32, interval_s: f32) -> Self {
        let mut meter = Self::default();
        meter.set_release(release_ms, interval_s);
        meter
    }

    pub fn set_release(&mut self, release_ms: f32, interval_s: f32) {
        let tau = release_ms.max(0.01) * 0.001;
        self.falloff = (-interval_s.max(0.0) / tau).exp().clamp(0.0, 1.0);
    }

    #[inline]
    pub fn accumulate(&mut self, left: &[f32], right: &[f32]) {
        for (held, channel) in self.held.iter_mut().zip([left, right]) {
            for sample in channel {
                *held = held.max(sample.abs());
            }
        }
    }

    pub fn take(&mut self) -> (f32, f32) {
        for (shown, held) in self.shown.iter_mut().zip(self.held.iter_mut()) {
            *shown = held.max(*shown * self.falloff);
            *held = 0.0;
        }
        (self.shown[0], self.shown[1])
    }

    pub fn reset(&mut self) {
        self.held = [0.0; 2];
        self.shown = [0.0; 2];
    }
}
