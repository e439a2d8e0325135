//! Step-sequenced LFO.
//!
//! The engine keeps its own copy of the step levels. Edits to step
//! parameters only mark the copy stale; it is reloaded before the next
//! advance so the audio thread never reads half-applied storage.

use crate::patch::MAX_STEPS;

/// Tempo at which a synced LFO runs at its nominal rate.
pub const SYNC_REFERENCE_BPM: f64 = 120.0;

/// Steps per second for a rate knob value (log2 steps/s).
pub fn step_rate(rate: f32, tempo_sync: bool, tempo_bpm: f64) -> f32 {
    let base = 2.0f32.powf(rate);
    if tempo_sync {
        base * (tempo_bpm / SYNC_REFERENCE_BPM) as f32
    } else {
        base
    }
}

/// Output for `phase` (0..1) inside `step`: the step level, crossfaded into
/// the next step over the final `smooth` fraction of the step.
pub fn level_at(levels: &[f32; MAX_STEPS], count: usize, step: usize, phase: f32, smooth: f32) -> f32 {
    let count = count.clamp(1, MAX_STEPS);
    let step = step % count;
    let current = levels[step];
    let smooth = smooth.clamp(0.0, 1.0);
    let fade_start = 1.0 - smooth;
    if smooth <= 0.0 || phase <= fade_start {
        return current;
    }
    let next = levels[(step + 1) % count];
    let t = ((phase - fade_start) / smooth).min(1.0);
    current + (next - current) * t
}

/// Curve for the UI preview, `points_per_step` values per active step.
pub fn preview_curve(levels: &[f32; MAX_STEPS], count: usize, smooth: f32, points_per_step: usize) -> Vec<f32> {
    let count = count.clamp(1, MAX_STEPS);
    let points = points_per_step.max(1);
    let mut curve = Vec::with_capacity(count * points);
    for step in 0..count {
        for point in 0..points {
            let phase = point as f32 / points as f32;
            curve.push(level_at(levels, count, step, phase, smooth));
        }
    }
    curve
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLfo {
    levels: [f32; MAX_STEPS],
    count: usize,
    smooth: f32,
    step: usize,
    phase: f32,
    output: f32,
    stale: bool,
    retriggers: u64,
}

impl Default for StepLfo {
    fn default() -> Self {
        Self {
            levels: [0.0; MAX_STEPS],
            count: 1,
            smooth: 0.0,
            step: 0,
            phase: 0.0,
            output: 0.0,
            stale: true,
            retriggers: 0,
        }
    }
}

impl StepLfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn load_steps(&mut self, levels: [f32; MAX_STEPS], count: usize) {
        self.levels = levels;
        self.count = count.clamp(1, MAX_STEPS);
        self.step %= self.count;
        self.stale = false;
        self.output = self.current_level();
    }

    pub fn set_smooth(&mut self, smooth: f32) {
        self.smooth = smooth.clamp(0.0, 1.0);
    }

    /// Restarts the sequence at step 0.
    pub fn retrigger(&mut self) {
        self.step = 0;
        self.phase = 0.0;
        self.retriggers += 1;
        self.output = self.current_level();
    }

    /// Advances by one control block and returns the new output.
    pub fn advance(&mut self, steps_per_second: f32, block_seconds: f32) -> f32 {
        self.phase += (steps_per_second * block_seconds).max(0.0);
        if self.phase >= 1.0 {
            let whole = self.phase.floor();
            self.step = (self.step + whole as usize) % self.count;
            self.phase -= whole;
        }
        self.output = self.current_level();
        self.output
    }

    fn current_level(&self) -> f32 {
        level_at(&self.levels, self.count, self.step, self.phase, self.smooth)
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn retriggers(&self) -> u64 {
        self.retriggers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_levels() -> [f32; MAX_STEPS] {
        std::array::from_fn(|i| i as f32 / MAX_STEPS as f32)
    }

    #[test]
    fn advances_one_step_per_period() {
        let mut lfo = StepLfo::new();
        lfo.load_steps(ramp_levels(), 4);
        // 2 steps/s, 0.25 s per advance.
        lfo.advance(2.0, 0.25);
        assert_eq!(lfo.step(), 0);
        lfo.advance(2.0, 0.25);
        assert_eq!(lfo.step(), 1);
        for _ in 0..6 {
            lfo.advance(2.0, 0.25);
        }
        assert_eq!(lfo.step(), 0);
    }

    #[test]
    fn retrigger_returns_to_first_step() {
        let mut lfo = StepLfo::new();
        lfo.load_steps(ramp_levels(), 8);
        lfo.advance(1.0, 3.5);
        assert_eq!(lfo.step(), 3);
        lfo.retrigger();
        assert_eq!((lfo.step(), lfo.phase()), (0, 0.0));
        assert_eq!(lfo.output(), 0.0);
        assert_eq!(lfo.retriggers(), 1);
    }

    #[test]
    fn smoothing_crossfades_into_next_step() {
        let mut levels = [0.0; MAX_STEPS];
        levels[1] = 1.0;
        assert_eq!(level_at(&levels, 2, 0, 0.4, 0.5), 0.0);
        assert!((level_at(&levels, 2, 0, 0.75, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(level_at(&levels, 2, 0, 0.75, 0.0), 0.0);
    }

    #[test]
    fn tempo_sync_scales_rate() {
        assert_eq!(step_rate(1.0, false, 60.0), 2.0);
        assert_eq!(step_rate(1.0, true, 60.0), 1.0);
        assert_eq!(step_rate(0.0, true, 240.0), 2.0);
    }

    #[test]
    fn preview_has_points_per_step() {
        let curve = preview_curve(&ramp_levels(), 4, 0.0, 10);
        assert_eq!(curve.len(), 40);
        assert_eq!(curve[10], 1.0 / MAX_STEPS as f32);
    }
}
