#![deny(unsafe_op_in_unsafe_fn)]

pub mod filters;
pub mod gain;
pub mod meter;
pub mod noise;
pub mod pan;
pub mod saturator;
pub mod smoothing;
pub mod utils;

pub use filters::{Ladder, LadderCoefficients, OnePole, OnePoleCoefficients, Svf, SvfCoefficients};
pub use saturator::soft_clip;
pub use smoothing::{BlockRamp, Interpolate, LinearLag};
