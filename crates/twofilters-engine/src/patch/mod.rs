//! The parameter set and its named sub-structures.
//!
//! Parameter ids encode the node they belong to (`base + stride * index +
//! offset`), so the schema only ever grows by appending ids.

mod migrate;
mod param;
pub mod state;
mod transfer;

use std::collections::HashMap;

use twofilters_rt::NameBuffer;

use crate::error::EngineError;
use crate::filter::{FilterModel, FilterSetup};
use crate::routing::{Destination, RoutingMode, NUM_DESTINATIONS};
use crate::transport::RetriggerMode;

pub use migrate::{migrate_filter_setup_from_version, migrate_param_value_from_version, PATCH_VERSION};
pub use param::{Display, Param, ParamKind, ParamMeta};
pub use state::PatchState;
pub use transfer::{bulk_load_len, send_entire_patch_to_audio};

pub const NUM_FILTERS: usize = 2;
pub const NUM_LFOS: usize = 2;
pub const MAX_STEPS: usize = 16;

pub const MAIN_GROUP: &str = "Main";

pub mod ids {
    pub const ROUTING_BASE: u32 = 500;
    pub const FILTER_BASE: u32 = 1000;
    pub const LFO_BASE: u32 = 2000;
    pub const NODE_STRIDE: u32 = 100;

    pub const ROUTING_MODE: u32 = 0;
    pub const RETRIGGER_MODE: u32 = 1;
    pub const FEEDBACK: u32 = 2;
    pub const INPUT_GAIN: u32 = 3;
    pub const OUTPUT_GAIN: u32 = 4;
    pub const MIX: u32 = 5;
    pub const NOISE_LEVEL: u32 = 6;
    pub const SERIAL_BLEND: u32 = 7;
    pub const PARALLEL_BLEND: u32 = 8;
    pub const FEEDBACK_POWER: u32 = 9;
    pub const NOISE_POWER: u32 = 10;
    pub const OVERSAMPLE: u32 = 11;

    pub const CUTOFF: u32 = 0;
    pub const RESONANCE: u32 = 1;
    pub const MORPH: u32 = 2;
    pub const PAN: u32 = 3;
    pub const ACTIVE: u32 = 4;

    pub const LFO_RATE: u32 = 0;
    pub const LFO_SMOOTH: u32 = 1;
    pub const LFO_STEP_COUNT: u32 = 2;
    pub const LFO_TEMPO_SYNC: u32 = 3;
    pub const LFO_STEPS: u32 = 10;
    pub const LFO_DEPTHS: u32 = 40;

    pub const fn routing(offset: u32) -> u32 {
        ROUTING_BASE + offset
    }

    pub const fn filter(slot: usize, offset: u32) -> u32 {
        FILTER_BASE + NODE_STRIDE * slot as u32 + offset
    }

    pub const fn lfo(lfo: usize, offset: u32) -> u32 {
        LFO_BASE + NODE_STRIDE * lfo as u32 + offset
    }
}

/// Node and offset decoded from a parameter id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamAddress {
    Routing(u32),
    Filter { slot: usize, offset: u32 },
    Lfo { lfo: usize, offset: u32 },
}

impl ParamAddress {
    pub fn of(id: u32) -> Option<Self> {
        let node = |base: u32, count: usize| {
            let rel = id.checked_sub(base)?;
            let index = (rel / ids::NODE_STRIDE) as usize;
            (index < count).then_some((index, rel % ids::NODE_STRIDE))
        };
        if (ids::ROUTING_BASE..ids::ROUTING_BASE + ids::NODE_STRIDE).contains(&id) {
            Some(Self::Routing(id - ids::ROUTING_BASE))
        } else if let Some((slot, offset)) = node(ids::FILTER_BASE, NUM_FILTERS) {
            Some(Self::Filter { slot, offset })
        } else {
            node(ids::LFO_BASE, NUM_LFOS).map(|(lfo, offset)| Self::Lfo { lfo, offset })
        }
    }
}

/// Parameter indices of the routing panel.
#[derive(Debug, Clone, Copy)]
pub struct RoutingNode {
    pub routing_mode: usize,
    pub retrigger_mode: usize,
    pub feedback: usize,
    pub input_gain: usize,
    pub output_gain: usize,
    pub mix: usize,
    pub noise_level: usize,
    pub serial_blend: usize,
    pub parallel_blend: usize,
    pub feedback_power: usize,
    pub noise_power: usize,
    pub oversample: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterNode {
    pub cutoff: usize,
    pub resonance: usize,
    pub morph: usize,
    pub pan: usize,
    pub active: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct StepLfoNode {
    pub rate: usize,
    pub smooth: usize,
    pub step_count: usize,
    pub tempo_sync: usize,
    pub steps: [usize; MAX_STEPS],
    pub depths: [usize; NUM_DESTINATIONS],
}

/// Highest gain knob position, about +6 dB under the cubic law.
pub const MAX_GAIN_POSITION: f32 = 1.26;

#[derive(Default)]
struct SchemaBuilder {
    params: Vec<Param>,
}

impl SchemaBuilder {
    fn add(&mut self, meta: ParamMeta) -> usize {
        self.params.push(Param::new(meta));
        self.params.len() - 1
    }
}

#[derive(Debug, Clone)]
pub struct Patch {
    pub(crate) params: Vec<Param>,
    index: HashMap<u32, usize>,
    pub routing: RoutingNode,
    pub filters: [FilterNode; NUM_FILTERS],
    pub lfos: [StepLfoNode; NUM_LFOS],
    pub filter_setups: [FilterSetup; NUM_FILTERS],
    pub name: NameBuffer,
    pub dirty: bool,
}

impl Default for Patch {
    fn default() -> Self {
        Self::new()
    }
}

impl Patch {
    pub fn new() -> Self {
        use ids::*;
        use ParamMeta as M;

        let mut b = SchemaBuilder::default();
        let gain_range = (0.0, MAX_GAIN_POSITION);
        let routing = RoutingNode {
            routing_mode: b.add(M::choice(routing(ROUTING_MODE), "Routing", MAIN_GROUP, RoutingMode::NAMES, 0)),
            retrigger_mode: b.add(M::choice(
                routing(RETRIGGER_MODE),
                "Retrigger",
                MAIN_GROUP,
                RetriggerMode::NAMES,
                0,
            )),
            feedback: b.add(M::continuous(routing(FEEDBACK), "Feedback", MAIN_GROUP, (0.0, 1.0), 0.0, Display::Percent)),
            input_gain: b.add(M::continuous(routing(INPUT_GAIN), "Input Gain", MAIN_GROUP, gain_range, 1.0, Display::CubicGain)),
            output_gain: b.add(M::continuous(routing(OUTPUT_GAIN), "Output Gain", MAIN_GROUP, gain_range, 1.0, Display::CubicGain)),
            mix: b.add(M::continuous(routing(MIX), "Mix", MAIN_GROUP, (0.0, 1.0), 1.0, Display::Percent)),
            noise_level: b.add(M::continuous(routing(NOISE_LEVEL), "Noise Level", MAIN_GROUP, (0.0, 1.0), 0.0, Display::CubicGain)),
            serial_blend: b.add(M::continuous(routing(SERIAL_BLEND), "Serial Blend", MAIN_GROUP, (0.0, 1.0), 1.0, Display::Percent)),
            parallel_blend: b.add(M::continuous(
                routing(PARALLEL_BLEND),
                "Parallel Blend",
                MAIN_GROUP,
                (0.0, 1.0),
                0.5,
                Display::Percent,
            )),
            feedback_power: b.add(M::boolean(routing(FEEDBACK_POWER), "Feedback Power", MAIN_GROUP, false)),
            noise_power: b.add(M::boolean(routing(NOISE_POWER), "Noise Power", MAIN_GROUP, false)),
            oversample: b.add(M::boolean(routing(OVERSAMPLE), "Oversample", MAIN_GROUP, false)),
        };

        let filters = std::array::from_fn(|slot| {
            let group = format!("Filter {}", slot + 1);
            let name = |label: &str| format!("F{} {label}", slot + 1);
            FilterNode {
                cutoff: b.add(M::continuous(filter(slot, CUTOFF), name("Cutoff"), &group, (0.0, 1.0), 0.75, Display::Cutoff)),
                resonance: b.add(M::continuous(
                    filter(slot, RESONANCE),
                    name("Resonance"),
                    &group,
                    (0.0, 1.0),
                    0.2,
                    Display::Percent,
                )),
                morph: b.add(M::continuous(filter(slot, MORPH), name("Morph"), &group, (0.0, 1.0), 0.0, Display::Percent)),
                pan: b.add(M::continuous(filter(slot, PAN), name("Pan"), &group, (-1.0, 1.0), 0.0, Display::Bipolar)),
                active: b.add(M::boolean(filter(slot, ACTIVE), name("Active"), &group, true)),
            }
        });

        let lfos = std::array::from_fn(|index| {
            let group = format!("LFO {}", index + 1);
            let name = |label: &str| format!("LFO{} {label}", index + 1);
            StepLfoNode {
                rate: b.add(M::continuous(lfo(index, LFO_RATE), name("Rate"), &group, (-3.0, 5.0), 0.0, Display::StepRate)),
                smooth: b.add(M::continuous(lfo(index, LFO_SMOOTH), name("Smooth"), &group, (0.0, 1.0), 0.0, Display::Percent)),
                step_count: b.add(M::count(
                    lfo(index, LFO_STEP_COUNT),
                    name("Steps"),
                    &group,
                    (1, MAX_STEPS as u32),
                    8,
                )),
                tempo_sync: b.add(M::boolean(lfo(index, LFO_TEMPO_SYNC), name("Tempo Sync"), &group, false)),
                steps: std::array::from_fn(|step| {
                    b.add(M::continuous(
                        lfo(index, LFO_STEPS + step as u32),
                        name(&format!("Step {}", step + 1)),
                        &group,
                        (-1.0, 1.0),
                        0.0,
                        Display::Bipolar,
                    ))
                }),
                depths: std::array::from_fn(|dest| {
                    let target = Destination::ALL[dest];
                    b.add(M::continuous(
                        lfo(index, LFO_DEPTHS + dest as u32),
                        name(&format!("> {}", target.name())),
                        &group,
                        (-1.0, 1.0),
                        0.0,
                        Display::Bipolar,
                    ))
                }),
            }
        });

        let index = b.params.iter().enumerate().map(|(i, p)| (p.id(), i)).collect();
        Self {
            params: b.params,
            index,
            routing,
            filters,
            lfos,
            filter_setups: Self::default_filter_setups(),
            name: NameBuffer::new("Init"),
            dirty: false,
        }
    }

    pub fn default_filter_setups() -> [FilterSetup; NUM_FILTERS] {
        [FilterSetup::default_for(FilterModel::Svf), FilterSetup::bypass()]
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline]
    pub fn param_index(&self, id: u32) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn param(&self, index: usize) -> &Param {
        &self.params[index]
    }

    pub fn param_by_id(&self, id: u32) -> Option<&Param> {
        self.param_index(id).map(|index| &self.params[index])
    }

    #[inline]
    pub fn value(&self, index: usize) -> f32 {
        self.params[index].value()
    }

    #[inline]
    pub fn bool_value(&self, index: usize) -> bool {
        self.params[index].value() > 0.5
    }

    #[inline]
    pub fn choice_value(&self, index: usize) -> usize {
        self.params[index].value().round().max(0.0) as usize
    }

    pub fn value_by_id(&self, id: u32) -> Option<f32> {
        self.param_by_id(id).map(Param::value)
    }

    pub fn set_value_direct(&mut self, index: usize, value: f32) {
        self.params[index].set_direct(value);
    }

    pub fn set_by_id_direct(&mut self, id: u32, value: f32) -> Result<(), EngineError> {
        let index = self.param_index(id).ok_or(EngineError::UnknownParam(id))?;
        self.set_value_direct(index, value);
        Ok(())
    }

    pub fn routing_mode(&self) -> RoutingMode {
        RoutingMode::from_index(self.choice_value(self.routing.routing_mode))
    }

    pub fn retrigger_mode(&self) -> RetriggerMode {
        RetriggerMode::from_index(self.choice_value(self.routing.retrigger_mode))
    }

    /// Current step levels and active step count of `lfo`.
    pub fn step_levels(&self, lfo: usize) -> ([f32; MAX_STEPS], usize) {
        let node = &self.lfos[lfo];
        let levels = node.steps.map(|index| self.value(index));
        (levels, self.choice_value(node.step_count))
    }

    pub fn reset_to_defaults(&mut self) {
        for param in &mut self.params {
            let default = param.meta.default;
            param.set_direct(default);
        }
        self.filter_setups = Self::default_filter_setups();
        self.name.set("Init");
        self.dirty = false;
    }

    /// Parameter indices with the main group first, then by group name,
    /// keeping schema order inside a group.
    pub fn presentation_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.params.len()).collect();
        order.sort_by(|&a, &b| {
            let (ga, gb) = (&self.params[a].meta.group, &self.params[b].meta.group);
            (ga != MAIN_GROUP, ga).cmp(&(gb != MAIN_GROUP, gb))
        });
        order
    }
}
