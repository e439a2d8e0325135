//! Filter cores. Each core keeps only its delay state; the coefficient set is
//! passed per sample so one set can drive both channels and cascaded stages.

pub mod ladder;
pub mod one_pole;
pub mod svf;

pub use ladder::{Ladder, LadderCoefficients, LadderOutputs};
pub use one_pole::{OnePole, OnePoleCoefficients, OnePoleOutputs};
pub use svf::{Svf, SvfCoefficients, SvfOutputs};

/// Lowest and highest cutoff accepted by the filter cores, the latter as a
/// fraction of the sample rate.
pub const MIN_CUTOFF_HZ: f32 = 10.0;
pub const MAX_CUTOFF_RATIO: f32 = 0.45;

#[inline]
pub(crate) fn prewarp(sample_rate: f32, cutoff_hz: f32) -> f32 {
    let sr = sample_rate.max(1.0);
    let cutoff = cutoff_hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_RATIO * sr);
    (core::f32::consts::PI * cutoff / sr).tan()
}
