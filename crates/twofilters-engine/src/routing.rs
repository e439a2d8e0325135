//! Modulation matrix and the signal graph combining the two filter slots.

use twofilters_dsp::gain::cubic_amplitude;
use twofilters_dsp::noise::WhiteNoise;
use twofilters_dsp::pan::balance;
use twofilters_dsp::utils::sanitize;
use twofilters_dsp::{soft_clip, BlockRamp, Interpolate};

use crate::config::BLOCK_SIZE;
use crate::filter::{cutoff_to_hz, FilterInputs, FilterSlot};
use crate::patch::{Patch, MAX_GAIN_POSITION, NUM_FILTERS, NUM_LFOS};

pub const NUM_DESTINATIONS: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// Filter 1 feeds filter 2.
    Serial,
    /// Both filters see the input, no feedback path.
    Parallel,
    /// Both filters see the input plus one shared feedback signal.
    ParallelSharedFeedback,
    /// Each filter is fed back into itself.
    ParallelIndependentFeedback,
}

impl RoutingMode {
    pub const NAMES: &'static [&'static str] = &["Serial", "Parallel", "Parallel Shared FB", "Parallel Split FB"];

    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::Parallel,
            2 => Self::ParallelSharedFeedback,
            3 => Self::ParallelIndependentFeedback,
            _ => Self::Serial,
        }
    }

    pub fn has_feedback_path(self) -> bool {
        self != Self::Parallel
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    F1Cutoff,
    F1Resonance,
    F1Morph,
    F1Pan,
    F2Cutoff,
    F2Resonance,
    F2Morph,
    F2Pan,
    InputGain,
    OutputGain,
    NoiseLevel,
    FeedbackLevel,
    Mix,
    FilterBlend,
}

impl Destination {
    pub const ALL: [Destination; NUM_DESTINATIONS] = [
        Self::F1Cutoff,
        Self::F1Resonance,
        Self::F1Morph,
        Self::F1Pan,
        Self::F2Cutoff,
        Self::F2Resonance,
        Self::F2Morph,
        Self::F2Pan,
        Self::InputGain,
        Self::OutputGain,
        Self::NoiseLevel,
        Self::FeedbackLevel,
        Self::Mix,
        Self::FilterBlend,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::F1Cutoff => "F1 Cutoff",
            Self::F1Resonance => "F1 Resonance",
            Self::F1Morph => "F1 Morph",
            Self::F1Pan => "F1 Pan",
            Self::F2Cutoff => "F2 Cutoff",
            Self::F2Resonance => "F2 Resonance",
            Self::F2Morph => "F2 Morph",
            Self::F2Pan => "F2 Pan",
            Self::InputGain => "Input Gain",
            Self::OutputGain => "Output Gain",
            Self::NoiseLevel => "Noise",
            Self::FeedbackLevel => "Feedback",
            Self::Mix => "Mix",
            Self::FilterBlend => "Blend",
        }
    }

    pub fn range(self) -> (f32, f32) {
        match self {
            Self::F1Pan | Self::F2Pan => (-1.0, 1.0),
            Self::InputGain | Self::OutputGain => (0.0, MAX_GAIN_POSITION),
            _ => (0.0, 1.0),
        }
    }

    /// Parameter supplying the unmodulated value.
    fn base_param(self, patch: &Patch, mode: RoutingMode) -> usize {
        let [f1, f2] = &patch.filters;
        let routing = &patch.routing;
        match self {
            Self::F1Cutoff => f1.cutoff,
            Self::F1Resonance => f1.resonance,
            Self::F1Morph => f1.morph,
            Self::F1Pan => f1.pan,
            Self::F2Cutoff => f2.cutoff,
            Self::F2Resonance => f2.resonance,
            Self::F2Morph => f2.morph,
            Self::F2Pan => f2.pan,
            Self::InputGain => routing.input_gain,
            Self::OutputGain => routing.output_gain,
            Self::NoiseLevel => routing.noise_level,
            Self::FeedbackLevel => routing.feedback,
            Self::Mix => routing.mix,
            Self::FilterBlend => match mode {
                RoutingMode::Serial => routing.serial_blend,
                _ => routing.parallel_blend,
            },
        }
    }
}

/// Destination values after modulation, clamped to their ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulatedValues {
    values: [f32; NUM_DESTINATIONS],
}

impl ModulatedValues {
    /// `base + Σ lfo · depth · span` for every destination.
    pub fn compute(patch: &Patch, lfo_outputs: &[f32; NUM_LFOS]) -> Self {
        let mode = patch.routing_mode();
        let mut values = [0.0; NUM_DESTINATIONS];
        for (index, dest) in Destination::ALL.iter().enumerate() {
            let (min, max) = dest.range();
            let span = max - min;
            let base = patch.value(dest.base_param(patch, mode));
            let offset: f32 = lfo_outputs
                .iter()
                .zip(&patch.lfos)
                .map(|(output, node)| output * patch.value(node.depths[index]) * span)
                .sum();
            values[index] = (base + offset).clamp(min, max);
        }
        Self { values }
    }

    #[inline]
    pub fn get(&self, dest: Destination) -> f32 {
        self.values[dest.index()]
    }

    pub fn filter_inputs(&self, slot: usize) -> FilterInputs {
        let (cutoff, resonance, morph) = if slot == 0 {
            (Destination::F1Cutoff, Destination::F1Resonance, Destination::F1Morph)
        } else {
            (Destination::F2Cutoff, Destination::F2Resonance, Destination::F2Morph)
        };
        FilterInputs {
            cutoff_hz: cutoff_to_hz(self.get(cutoff)),
            resonance: self.get(resonance),
            morph: self.get(morph),
        }
    }
}

/// Serial blend: constant-power crossfade between the two stage outputs.
#[inline]
pub fn serial_blend_gains(blend: f32) -> (f32, f32) {
    let b = blend.clamp(0.0, 1.0);
    ((1.0 - b).sqrt(), b.sqrt())
}

/// Parallel blend: both filters at unity in the middle, one side fading out
/// towards either end.
#[inline]
pub fn parallel_blend_gains(blend: f32) -> (f32, f32) {
    let b = blend.clamp(0.0, 1.0);
    let law = |x: f32| (x.sqrt() * std::f32::consts::SQRT_2).min(1.0);
    (law(1.0 - b), law(b))
}

/// Per-block mixing coefficients, interpolated sample by sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct MixFrame {
    input_gain: f32,
    output_gain: f32,
    noise: f32,
    feedback: f32,
    mix: f32,
    /// Blend gain times pan gain, `[stage][channel]`.
    stage: [[f32; 2]; NUM_FILTERS],
}

impl Interpolate for MixFrame {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let stage = |s: usize, c: usize| self.stage[s][c].lerp(&other.stage[s][c], t);
        Self {
            input_gain: self.input_gain.lerp(&other.input_gain, t),
            output_gain: self.output_gain.lerp(&other.output_gain, t),
            noise: self.noise.lerp(&other.noise, t),
            feedback: self.feedback.lerp(&other.feedback, t),
            mix: self.mix.lerp(&other.mix, t),
            stage: [[stage(0, 0), stage(0, 1)], [stage(1, 0), stage(1, 1)]],
        }
    }
}

type Block = [[f32; BLOCK_SIZE]; 2];

pub struct RoutingGraph {
    mode: RoutingMode,
    coeffs: BlockRamp<MixFrame>,
    primed: bool,
    noise: WhiteNoise,
    wet_memory: Block,
    stage_memory: [Block; NUM_FILTERS],
}

impl Default for RoutingGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self {
            mode: RoutingMode::Serial,
            coeffs: BlockRamp::new(MixFrame::default()),
            primed: false,
            noise: WhiteNoise::default(),
            wet_memory: [[0.0; BLOCK_SIZE]; 2],
            stage_memory: [[[0.0; BLOCK_SIZE]; 2]; NUM_FILTERS],
        }
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// Clears the feedback memory.
    pub fn reset(&mut self) {
        self.wet_memory = [[0.0; BLOCK_SIZE]; 2];
        self.stage_memory = [[[0.0; BLOCK_SIZE]; 2]; NUM_FILTERS];
    }

    /// Makes the next `update` jump to its coefficients instead of ramping.
    pub fn snap_next_update(&mut self) {
        self.primed = false;
    }

    pub fn update(&mut self, patch: &Patch, values: &ModulatedValues) {
        let mode = patch.routing_mode();
        if mode != self.mode {
            self.reset();
            self.mode = mode;
        }
        let feedback_on = patch.bool_value(patch.routing.feedback_power) && mode.has_feedback_path();
        let noise_on = patch.bool_value(patch.routing.noise_power);

        let blend = values.get(Destination::FilterBlend);
        let (g1, g2) = match mode {
            RoutingMode::Serial => serial_blend_gains(blend),
            _ => parallel_blend_gains(blend),
        };
        let (l1, r1) = balance(values.get(Destination::F1Pan));
        let (l2, r2) = balance(values.get(Destination::F2Pan));

        let frame = MixFrame {
            input_gain: cubic_amplitude(values.get(Destination::InputGain)),
            output_gain: cubic_amplitude(values.get(Destination::OutputGain)),
            noise: if noise_on {
                cubic_amplitude(values.get(Destination::NoiseLevel))
            } else {
                0.0
            },
            feedback: if feedback_on {
                values.get(Destination::FeedbackLevel)
            } else {
                0.0
            },
            mix: values.get(Destination::Mix),
            stage: [[g1 * l1, g1 * r1], [g2 * l2, g2 * r2]],
        };
        if self.primed {
            self.coeffs.retarget(frame);
        } else {
            self.coeffs.snap(frame);
            self.primed = true;
        }
    }

    /// Renders one control block through `filters`.
    pub fn process(&mut self, filters: &mut [FilterSlot; NUM_FILTERS], input: &Block, output: &mut Block) {
        let [f1, f2] = filters;
        for i in 0..BLOCK_SIZE {
            let c = self.coeffs.at(i, BLOCK_SIZE);
            let noise = if c.noise > 0.0 {
                self.noise.next_sample() * c.noise
            } else {
                0.0
            };
            let dry = [input[0][i], input[1][i]];
            let x = dry.map(|s| s * c.input_gain + noise);
            let feed = |memory: &Block| [0, 1].map(|ch| soft_clip(memory[ch][i] * c.feedback));
            let add = |a: [f32; 2], b: [f32; 2]| [a[0] + b[0], a[1] + b[1]];

            let (s1, s2) = match self.mode {
                RoutingMode::Serial => {
                    let s1 = f1.process_frame(i, BLOCK_SIZE, add(x, feed(&self.wet_memory)));
                    (s1, f2.process_frame(i, BLOCK_SIZE, s1))
                }
                RoutingMode::Parallel => (f1.process_frame(i, BLOCK_SIZE, x), f2.process_frame(i, BLOCK_SIZE, x)),
                RoutingMode::ParallelSharedFeedback => {
                    let shared = add(x, feed(&self.wet_memory));
                    (
                        f1.process_frame(i, BLOCK_SIZE, shared),
                        f2.process_frame(i, BLOCK_SIZE, shared),
                    )
                }
                RoutingMode::ParallelIndependentFeedback => (
                    f1.process_frame(i, BLOCK_SIZE, add(x, feed(&self.stage_memory[0]))),
                    f2.process_frame(i, BLOCK_SIZE, add(x, feed(&self.stage_memory[1]))),
                ),
            };

            for ch in 0..2 {
                let wet = sanitize(c.stage[0][ch] * s1[ch] + c.stage[1][ch] * s2[ch]);
                output[ch][i] = sanitize(((1.0 - c.mix) * dry[ch] + c.mix * wet) * c.output_gain);
                self.wet_memory[ch][i] = wet;
                self.stage_memory[0][ch][i] = sanitize(s1[ch]);
                self.stage_memory[1][ch][i] = sanitize(s2[ch]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_blend_is_constant_power() {
        for blend in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let (a, b) = serial_blend_gains(blend);
            assert!((a * a + b * b - 1.0).abs() < 1e-6, "blend {blend}");
        }
        assert_eq!(serial_blend_gains(0.0), (1.0, 0.0));
        assert_eq!(serial_blend_gains(1.0), (0.0, 1.0));
    }

    #[test]
    fn parallel_blend_is_unity_in_the_middle() {
        let (a, b) = parallel_blend_gains(0.5);
        assert!((a - 1.0).abs() < 1e-6 && (b - 1.0).abs() < 1e-6);
        assert_eq!(parallel_blend_gains(0.0), (1.0, 0.0));
        assert_eq!(parallel_blend_gains(1.0), (0.0, 1.0));
    }

    #[test]
    fn lfo_depth_offsets_and_clamps() {
        let mut patch = Patch::new();
        let depth = patch.lfos[0].depths[Destination::F1Cutoff.index()];
        patch.set_value_direct(depth, 0.1);
        let values = ModulatedValues::compute(&patch, &[1.0, 0.0]);
        assert!((values.get(Destination::F1Cutoff) - 0.85).abs() < 1e-6);

        let pan_depth = patch.lfos[1].depths[Destination::F2Pan.index()];
        patch.set_value_direct(pan_depth, -1.0);
        let values = ModulatedValues::compute(&patch, &[1.0, 1.0]);
        assert_eq!(values.get(Destination::F2Pan), -1.0);
    }

    #[test]
    fn blend_destination_follows_routing_mode() {
        let mut patch = Patch::new();
        patch.set_value_direct(patch.routing.parallel_blend, 0.2);
        let serial = ModulatedValues::compute(&patch, &[0.0; NUM_LFOS]);
        assert_eq!(serial.get(Destination::FilterBlend), 1.0);
        patch.set_value_direct(patch.routing.routing_mode, 1.0);
        let parallel = ModulatedValues::compute(&patch, &[0.0; NUM_LFOS]);
        assert!((parallel.get(Destination::FilterBlend) - 0.2).abs() < 1e-6);
    }
}
