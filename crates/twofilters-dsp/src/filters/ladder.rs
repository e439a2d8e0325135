use crate::saturator::soft_clip;
use crate::smoothing::Interpolate;

use super::one_pole::{OnePole, OnePoleCoefficients};
use super::prewarp;

/// Feedback amount reached at full resonance. Self-oscillation starts at 4.
pub const MAX_LADDER_FEEDBACK: f32 = 3.9;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LadderCoefficients {
    pub g: f32,
    pub k: f32,
}

impl LadderCoefficients {
    #[inline]
    pub fn new(sample_rate: f32, cutoff_hz: f32, resonance: f32) -> Self {
        let g = prewarp(sample_rate, cutoff_hz);
        Self {
            g: g / (1.0 + g),
            k: resonance.clamp(0.0, 1.0) * MAX_LADDER_FEEDBACK,
        }
    }

    /// Gain restoring unity passband level at this feedback amount.
    #[inline]
    pub fn compensation(&self) -> f32 {
        1.0 + self.k
    }
}

impl Interpolate for LadderCoefficients {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            g: self.g.lerp(&other.g, t),
            k: self.k.lerp(&other.k, t),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LadderOutputs {
    pub pole2: f32,
    pub pole4: f32,
}

/// Four cascaded one-pole sections with a one-sample delayed global feedback
/// path. The feedback is always bounded by the saturator, so the loop stays
/// stable for every coefficient set.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ladder {
    stages: [OnePole; 4],
    last: f32,
}

impl Ladder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
        self.last = 0.0;
    }

    #[inline]
    pub fn process(&mut self, coeffs: &LadderCoefficients, input: f32, drive: bool) -> LadderOutputs {
        let feedback = coeffs.k * self.last;
        let mut u = if drive {
            soft_clip(input - feedback)
        } else {
            input - soft_clip(feedback)
        };
        let pole = OnePoleCoefficients { g: coeffs.g };
        let mut pole2 = 0.0;
        for (index, stage) in self.stages.iter_mut().enumerate() {
            u = stage.process(&pole, u).low;
            if index == 1 {
                pole2 = u;
            }
        }
        self.last = u;
        LadderOutputs { pole2, pole4: u }
    }
}
