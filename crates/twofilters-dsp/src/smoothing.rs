/// Types whose values can be blended linearly, used for per-sample
/// interpolation of control-rate values.
pub trait Interpolate: Copy {
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

/// Linear lag advanced once per control block.
///
/// `rate` is the fraction of the distance to a freshly set target covered per
/// block. The lag never overshoots and lands exactly on the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearLag {
    value: f32,
    target: f32,
    step: f32,
    rate: f32,
    active: bool,
}

impl Default for LinearLag {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl LinearLag {
    #[inline]
    pub fn new(value: f32) -> Self {
        Self {
            value,
            target: value,
            step: 0.0,
            rate: 1.0,
            active: false,
        }
    }

    /// Derives the per-block rate so the lag spans `smoothing_ms` at any
    /// sample rate.
    pub fn set_rate(&mut self, smoothing_ms: f32, sample_rate: f32, block_size: usize) {
        let blocks = smoothing_ms.max(0.0) * 0.001 * sample_rate.max(1.0) / block_size.max(1) as f32;
        self.rate = if blocks > 1.0 { 1.0 / blocks } else { 1.0 };
        if self.active {
            self.step = (self.target - self.value) * self.rate;
        }
    }

    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Upper bound on the blocks a freshly set target needs to settle.
    #[inline]
    pub fn max_blocks_to_settle(&self) -> usize {
        (1.0 / self.rate).ceil() as usize + 1
    }

    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
        if target == self.value {
            self.step = 0.0;
            self.active = false;
        } else {
            self.step = (target - self.value) * self.rate;
            self.active = true;
        }
    }

    #[inline]
    pub fn process(&mut self) -> f32 {
        if !self.active {
            return self.value;
        }
        let next = self.value + self.step;
        let reached = if self.step > 0.0 {
            next >= self.target
        } else {
            next <= self.target
        };
        if reached || next == self.value {
            self.value = self.target;
            self.step = 0.0;
            self.active = false;
        } else {
            self.value = next;
        }
        self.value
    }

    #[inline]
    pub fn snap_to_target(&mut self) {
        self.snap_to(self.target);
    }

    #[inline]
    pub fn snap_to(&mut self, value: f32) {
        self.value = value;
        self.target = value;
        self.step = 0.0;
        self.active = false;
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Start/end pair interpolated across one control block. `retarget` makes the
/// previous end the new start, so consecutive blocks join without steps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockRamp<T: Interpolate> {
    start: T,
    end: T,
}

impl<T: Interpolate> BlockRamp<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            start: value,
            end: value,
        }
    }

    #[inline]
    pub fn retarget(&mut self, end: T) {
        self.start = self.end;
        self.end = end;
    }

    /// Finishes the running block: the start catches up with the end.
    #[inline]
    pub fn conclude(&mut self) {
        self.start = self.end;
    }

    #[inline]
    pub fn snap(&mut self, value: T) {
        self.start = value;
        self.end = value;
    }

    /// Value for sample `index` of a block of `len` samples. The last sample
    /// of the block lands on the end value.
    #[inline]
    pub fn at(&self, index: usize, len: usize) -> T {
        let t = (index + 1) as f32 / len.max(1) as f32;
        self.start.lerp(&self.end, t)
    }

    #[inline]
    pub fn end(&self) -> T {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lag_spans_configured_time() {
        let mut lag = LinearLag::new(0.0);
        lag.set_rate(64.0, 48_000.0, 8);
        assert!((lag.rate() - 1.0 / 384.0).abs() < 1e-6);
        lag.set_target(1.0);
        let mut blocks = 0;
        while lag.is_active() {
            lag.process();
            blocks += 1;
        }
        assert_eq!(lag.value(), 1.0);
        assert!(blocks <= lag.max_blocks_to_settle());
        assert!(blocks >= 380);
    }

    #[test]
    fn block_ramp_joins_consecutive_blocks() {
        let mut ramp = BlockRamp::new(0.0f32);
        ramp.retarget(1.0);
        assert_eq!(ramp.at(7, 8), 1.0);
        ramp.retarget(1.0);
        assert_eq!(ramp.at(0, 8), 1.0);
    }
}
