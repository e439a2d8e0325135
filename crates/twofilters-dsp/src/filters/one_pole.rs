use crate::smoothing::Interpolate;

use super::prewarp;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OnePoleCoefficients {
    pub g: f32,
}

impl OnePoleCoefficients {
    #[inline]
    pub fn new(sample_rate: f32, cutoff_hz: f32) -> Self {
        let g = prewarp(sample_rate, cutoff_hz);
        Self { g: g / (1.0 + g) }
    }
}

impl Interpolate for OnePoleCoefficients {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            g: self.g.lerp(&other.g, t),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OnePoleOutputs {
    pub low: f32,
    pub high: f32,
}

/// Zero-delay-feedback one-pole section (6 dB/oct).
#[derive(Clone, Copy, Debug, Default)]
pub struct OnePole {
    state: f32,
}

impl OnePole {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    #[inline]
    pub fn process(&mut self, coeffs: &OnePoleCoefficients, input: f32) -> OnePoleOutputs {
        let v = (input - self.state) * coeffs.g;
        let low = v + self.state;
        self.state = low + v;
        OnePoleOutputs {
            low,
            high: input - low,
        }
    }
}
