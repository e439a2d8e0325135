use crate::smoothing::Interpolate;

use super::prewarp;

/// Coefficients of the trapezoidal state-variable filter.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SvfCoefficients {
    pub k: f32,
    pub a1: f32,
    pub a2: f32,
    pub a3: f32,
}

impl SvfCoefficients {
    /// `damping` is `1 / Q`.
    #[inline]
    pub fn new(sample_rate: f32, cutoff_hz: f32, damping: f32) -> Self {
        let g = prewarp(sample_rate, cutoff_hz);
        let k = damping.max(0.02);
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        Self { k, a1, a2, a3 }
    }
}

impl Interpolate for SvfCoefficients {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            k: self.k.lerp(&other.k, t),
            a1: self.a1.lerp(&other.a1, t),
            a2: self.a2.lerp(&other.a2, t),
            a3: self.a3.lerp(&other.a3, t),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SvfOutputs {
    pub low: f32,
    pub band: f32,
    pub high: f32,
}

impl SvfOutputs {
    #[inline]
    pub fn notch(&self) -> f32 {
        self.low + self.high
    }

    /// Crossfades low -> band -> high as `morph` goes from 0 to 1.
    #[inline]
    pub fn morph(&self, morph: f32) -> f32 {
        let m = morph.clamp(0.0, 1.0) * 2.0;
        if m < 1.0 {
            self.low * (1.0 - m) + self.band * m
        } else {
            self.band * (2.0 - m) + self.high * (m - 1.0)
        }
    }
}

/// Per-channel state of a state-variable filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Svf {
    ic1eq: f32,
    ic2eq: f32,
}

impl Svf {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    #[inline]
    pub fn process(&mut self, coeffs: &SvfCoefficients, input: f32) -> SvfOutputs {
        let v3 = input - self.ic2eq;
        let v1 = coeffs.a1 * self.ic1eq + coeffs.a2 * v3;
        let v2 = self.ic2eq + coeffs.a2 * self.ic1eq + coeffs.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        SvfOutputs {
            low: v2,
            band: v1,
            high: input - coeffs.k * v1 - v2,
        }
    }
}
