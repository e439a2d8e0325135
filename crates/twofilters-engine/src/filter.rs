//! Filter slots: model selection, sub-configuration and the live instance.
//!
//! A slot never mutates its instance across a model or configuration change.
//! It marks itself for rebuild and the block processor swaps in a fresh
//! instance between blocks.

use tracing::{debug, warn};
use twofilters_dsp::filters::{LadderOutputs, SvfOutputs};
use twofilters_dsp::{
    soft_clip, BlockRamp, Ladder, LadderCoefficients, OnePole, OnePoleCoefficients, Svf, SvfCoefficients,
};

use crate::error::FilterError;

/// Maps a normalized cutoff knob to Hz (20 Hz .. 20 kHz, exponential).
#[inline]
pub fn cutoff_to_hz(normalized: f32) -> f32 {
    20.0 * 1000.0f32.powf(normalized.clamp(0.0, 1.0))
}

/// Maps normalized resonance to SVF damping (`1 / Q`).
#[inline]
fn resonance_to_damping(resonance: f32) -> f32 {
    2.0 - 1.96 * resonance.clamp(0.0, 1.0)
}

macro_rules! encoded_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_u32(value: u32) -> Result<Self, FilterError> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err(FilterError::UnknownEncoding { field: $field, value }),
                }
            }
        }
    };
}

encoded_enum!(FilterModel, "model" { None = 0, OnePole = 1, Svf = 2, Ladder = 3 });
encoded_enum!(Passband, "passband" { LowPass = 0, HighPass = 1, BandPass = 2, Notch = 3, Morph = 4 });
encoded_enum!(Slope, "slope" { Slope6 = 0, Slope12 = 1, Slope24 = 2 });
encoded_enum!(DriveMode, "drive" { Clean = 0, Saturated = 1 });
encoded_enum!(
    /// Ladder variants; `Compensated` restores passband level at high resonance.
    SubModel, "sub-model" { Standard = 0, Compensated = 1 }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterConfig {
    pub passband: Passband,
    pub slope: Slope,
    pub drive: DriveMode,
    pub sub_model: SubModel,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            passband: Passband::LowPass,
            slope: Slope::Slope12,
            drive: DriveMode::Clean,
            sub_model: SubModel::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterSetup {
    pub model: FilterModel,
    pub config: FilterConfig,
}

impl FilterModel {
    pub fn supports(self, config: &FilterConfig) -> bool {
        use Passband::*;
        use Slope::*;

        let standard = config.sub_model == SubModel::Standard;
        match self {
            FilterModel::None => *config == FilterConfig::default(),
            FilterModel::OnePole => matches!(config.passband, LowPass | HighPass) && config.slope == Slope6 && standard,
            FilterModel::Svf => matches!(config.slope, Slope12 | Slope24) && standard,
            FilterModel::Ladder => config.passband == LowPass && matches!(config.slope, Slope12 | Slope24),
        }
    }

    /// Every advertised setup of this model.
    pub fn available_setups(self) -> Vec<FilterSetup> {
        let mut setups = Vec::new();
        for &passband in Passband::ALL {
            for &slope in Slope::ALL {
                for &drive in DriveMode::ALL {
                    for &sub_model in SubModel::ALL {
                        let config = FilterConfig {
                            passband,
                            slope,
                            drive,
                            sub_model,
                        };
                        if self.supports(&config) {
                            setups.push(FilterSetup { model: self, config });
                        }
                    }
                }
            }
        }
        setups
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterModel::None => "Off",
            FilterModel::OnePole => "One Pole",
            FilterModel::Svf => "SVF",
            FilterModel::Ladder => "Ladder",
        }
    }
}

impl FilterSetup {
    pub fn bypass() -> Self {
        Self {
            model: FilterModel::None,
            config: FilterConfig::default(),
        }
    }

    /// First advertised setup of `model`.
    pub fn default_for(model: FilterModel) -> Self {
        let config = match model {
            FilterModel::OnePole => FilterConfig {
                slope: Slope::Slope6,
                ..FilterConfig::default()
            },
            _ => FilterConfig::default(),
        };
        Self { model, config }
    }

    pub fn to_raw(&self) -> [u32; 5] {
        [
            self.model as u32,
            self.config.passband as u32,
            self.config.slope as u32,
            self.config.drive as u32,
            self.config.sub_model as u32,
        ]
    }

    pub fn from_raw(raw: [u32; 5]) -> Result<Self, FilterError> {
        Ok(Self {
            model: FilterModel::from_u32(raw[0])?,
            config: FilterConfig {
                passband: Passband::from_u32(raw[1])?,
                slope: Slope::from_u32(raw[2])?,
                drive: DriveMode::from_u32(raw[3])?,
                sub_model: SubModel::from_u32(raw[4])?,
            },
        })
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        if self.model.supports(&self.config) {
            Ok(())
        } else {
            Err(FilterError::Unsupported { setup: *self })
        }
    }

    pub fn uses_morph(&self) -> bool {
        self.model == FilterModel::Svf && self.config.passband == Passband::Morph
    }
}

#[derive(Debug, Clone, Copy)]
enum FilterCore {
    Bypass,
    OnePole {
        ramp: BlockRamp<OnePoleCoefficients>,
        state: [OnePole; 2],
    },
    Svf {
        ramp: BlockRamp<SvfCoefficients>,
        state: [[Svf; 2]; 2],
    },
    Ladder {
        ramp: BlockRamp<LadderCoefficients>,
        state: [Ladder; 2],
    },
}

/// Target of one control block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterInputs {
    pub cutoff_hz: f32,
    pub resonance: f32,
    pub morph: f32,
}

/// The running filter of a slot, built for one setup, sample rate and
/// oversampling factor.
#[derive(Debug, Clone, Copy)]
pub struct FilterInstance {
    setup: FilterSetup,
    core: FilterCore,
    sample_rate: f32,
    oversample: usize,
    morph: BlockRamp<f32>,
    last_input: [f32; 2],
}

impl FilterInstance {
    pub fn new(setup: FilterSetup, sample_rate: f32, oversample: usize, inputs: FilterInputs) -> Self {
        let oversample = oversample.clamp(1, 2);
        let sample_rate = sample_rate * oversample as f32;
        let core = match setup.model {
            FilterModel::None => FilterCore::Bypass,
            FilterModel::OnePole => FilterCore::OnePole {
                ramp: BlockRamp::new(OnePoleCoefficients::new(sample_rate, inputs.cutoff_hz)),
                state: [OnePole::new(); 2],
            },
            FilterModel::Svf => FilterCore::Svf {
                ramp: BlockRamp::new(svf_coefficients(sample_rate, &inputs)),
                state: [[Svf::new(); 2]; 2],
            },
            FilterModel::Ladder => FilterCore::Ladder {
                ramp: BlockRamp::new(LadderCoefficients::new(sample_rate, inputs.cutoff_hz, inputs.resonance)),
                state: [Ladder::new(); 2],
            },
        };
        Self {
            setup,
            core,
            sample_rate,
            oversample,
            morph: BlockRamp::new(inputs.morph),
            last_input: [0.0; 2],
        }
    }

    pub fn setup(&self) -> FilterSetup {
        self.setup
    }

    pub fn conclude_block(&mut self) {
        self.morph.conclude();
        match &mut self.core {
            FilterCore::Bypass => {}
            FilterCore::OnePole { ramp, .. } => ramp.conclude(),
            FilterCore::Svf { ramp, .. } => ramp.conclude(),
            FilterCore::Ladder { ramp, .. } => ramp.conclude(),
        }
    }

    /// Computes the coefficients the coming block interpolates towards.
    pub fn prepare_block(&mut self, inputs: FilterInputs) {
        let sr = self.sample_rate;
        self.morph.retarget(inputs.morph);
        match &mut self.core {
            FilterCore::Bypass => {}
            FilterCore::OnePole { ramp, .. } => ramp.retarget(OnePoleCoefficients::new(sr, inputs.cutoff_hz)),
            FilterCore::Svf { ramp, .. } => ramp.retarget(svf_coefficients(sr, &inputs)),
            FilterCore::Ladder { ramp, .. } => {
                ramp.retarget(LadderCoefficients::new(sr, inputs.cutoff_hz, inputs.resonance))
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_input = [0.0; 2];
        match &mut self.core {
            FilterCore::Bypass => {}
            FilterCore::OnePole { state, .. } => state.iter_mut().for_each(OnePole::reset),
            FilterCore::Svf { state, .. } => state.iter_mut().flatten().for_each(Svf::reset),
            FilterCore::Ladder { state, .. } => state.iter_mut().for_each(Ladder::reset),
        }
    }

    /// Filters one stereo frame; `index` of `len` picks the interpolated
    /// coefficients inside the block.
    #[inline]
    pub fn process_frame(&mut self, index: usize, len: usize, input: [f32; 2]) -> [f32; 2] {
        let config = self.setup.config;
        let drive = config.drive == DriveMode::Saturated;
        let morph = self.morph.at(index, len);
        let oversample = self.oversample;
        let last = &mut self.last_input;

        match &mut self.core {
            FilterCore::Bypass => input,
            FilterCore::OnePole { ramp, state } => {
                let coeffs = ramp.at(index, len);
                run_frame(oversample, last, input, |ch, x| {
                    let x = if drive { soft_clip(x) } else { x };
                    let out = state[ch].process(&coeffs, x);
                    match config.passband {
                        Passband::HighPass => out.high,
                        _ => out.low,
                    }
                })
            }
            FilterCore::Svf { ramp, state } => {
                let coeffs = ramp.at(index, len);
                let stages = if config.slope == Slope::Slope24 { 2 } else { 1 };
                run_frame(oversample, last, input, |ch, x| {
                    let mut y = if drive { soft_clip(x) } else { x };
                    for stage in state[ch].iter_mut().take(stages) {
                        y = select_svf(stage.process(&coeffs, y), config.passband, morph);
                    }
                    y
                })
            }
            FilterCore::Ladder { ramp, state } => {
                let coeffs = ramp.at(index, len);
                let gain = match config.sub_model {
                    SubModel::Compensated => coeffs.compensation(),
                    SubModel::Standard => 1.0,
                };
                run_frame(oversample, last, input, |ch, x| {
                    let LadderOutputs { pole2, pole4 } = state[ch].process(&coeffs, x, drive);
                    let y = if config.slope == Slope::Slope12 { pole2 } else { pole4 };
                    y * gain
                })
            }
        }
    }
}

fn svf_coefficients(sample_rate: f32, inputs: &FilterInputs) -> SvfCoefficients {
    SvfCoefficients::new(sample_rate, inputs.cutoff_hz, resonance_to_damping(inputs.resonance))
}

#[inline]
fn select_svf(out: SvfOutputs, passband: Passband, morph: f32) -> f32 {
    match passband {
        Passband::LowPass => out.low,
        Passband::HighPass => out.high,
        Passband::BandPass => out.band,
        Passband::Notch => out.notch(),
        Passband::Morph => out.morph(morph),
    }
}

/// Runs `tick` once per channel, or twice at 2x with a linearly
/// interpolated midpoint and averaged decimation.
#[inline]
fn run_frame(
    oversample: usize,
    last: &mut [f32; 2],
    input: [f32; 2],
    mut tick: impl FnMut(usize, f32) -> f32,
) -> [f32; 2] {
    let mut out = [0.0; 2];
    for ch in 0..2 {
        let x = input[ch];
        out[ch] = if oversample > 1 {
            let mid = 0.5 * (last[ch] + x);
            0.5 * (tick(ch, mid) + tick(ch, x))
        } else {
            tick(ch, x)
        };
        last[ch] = x;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Inactive,
    Configuring,
    Active,
}

/// One of the two filter positions in the routing graph.
#[derive(Debug, Clone)]
pub struct FilterSlot {
    index: usize,
    setup: FilterSetup,
    enabled: bool,
    oversample: usize,
    sample_rate: f32,
    state: SlotState,
    pending_rebuild: bool,
    rebuilds: u64,
    instance: FilterInstance,
}

impl FilterSlot {
    pub fn new(index: usize, setup: FilterSetup, sample_rate: f32) -> Self {
        let inputs = FilterInputs {
            cutoff_hz: 1000.0,
            resonance: 0.0,
            morph: 0.0,
        };
        Self {
            index,
            setup,
            enabled: true,
            oversample: 1,
            sample_rate,
            state: SlotState::Inactive,
            pending_rebuild: true,
            rebuilds: 0,
            instance: FilterInstance::new(setup, sample_rate, 1, inputs),
        }
    }

    pub fn setup(&self) -> FilterSetup {
        self.setup
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn oversample(&self) -> usize {
        self.oversample
    }

    pub fn rebuild_pending(&self) -> bool {
        self.pending_rebuild
    }

    /// Number of instances built so far.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Requests a new model/sub-configuration. Unavailable combinations are
    /// rejected and the current setup stays in place. Returns whether the
    /// setup changed.
    pub fn configure(&mut self, setup: FilterSetup) -> Result<bool, FilterError> {
        setup.validate()?;
        if setup == self.setup {
            return Ok(false);
        }
        self.setup = setup;
        self.pending_rebuild = true;
        Ok(true)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.enabled = enabled;
            self.pending_rebuild = true;
        }
    }

    pub fn set_oversample(&mut self, factor: usize) {
        let factor = factor.clamp(1, 2);
        if factor != self.oversample {
            self.oversample = factor;
            self.pending_rebuild = true;
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.pending_rebuild = true;
        }
    }

    /// Tears down and rebuilds the instance if anything structural changed.
    /// Call only between blocks.
    pub fn rebuild_if_pending(&mut self, inputs: FilterInputs) -> bool {
        if !self.pending_rebuild {
            return false;
        }
        self.state = SlotState::Configuring;
        self.instance = FilterInstance::new(self.setup, self.sample_rate, self.oversample, inputs);
        self.pending_rebuild = false;
        self.rebuilds += 1;
        self.state = if self.enabled && self.setup.model != FilterModel::None {
            SlotState::Active
        } else {
            SlotState::Inactive
        };
        debug!(slot = self.index, setup = ?self.setup, oversample = self.oversample, state = ?self.state, "filter slot rebuilt");
        self.state == SlotState::Active
    }

    pub fn conclude_block(&mut self) {
        self.instance.conclude_block();
    }

    pub fn prepare_block(&mut self, inputs: FilterInputs) {
        self.instance.prepare_block(inputs);
    }

    pub fn reset(&mut self) {
        self.instance.reset();
    }

    #[inline]
    pub fn process_frame(&mut self, index: usize, len: usize, input: [f32; 2]) -> [f32; 2] {
        if self.state == SlotState::Active {
            self.instance.process_frame(index, len, input)
        } else {
            input
        }
    }

    /// Logs and keeps the previous setup when `raw` is not available.
    pub fn configure_raw(&mut self, raw: [u32; 5]) -> Option<FilterSetup> {
        match FilterSetup::from_raw(raw).and_then(|setup| self.configure(setup).map(|_| setup)) {
            Ok(setup) => Some(setup),
            Err(err) => {
                warn!(slot = self.index, ?raw, %err, "filter configuration rejected; keeping previous setup");
                None
            }
        }
    }
}
