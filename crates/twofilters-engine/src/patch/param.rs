use twofilters_dsp::gain::{cubic_amplitude, linear_to_db};
use twofilters_dsp::LinearLag;
use twofilters_rt::{ActiveLink, Participant};

use crate::filter::cutoff_to_hz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Ramped through the parameter's lag.
    Continuous,
    /// Written directly; 0 or 1.
    Boolean,
    /// Written directly; whole numbers inside the range.
    Stepped,
}

/// How a raw value is shown to people.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Display {
    Percent,
    Bipolar,
    Cutoff,
    CubicGain,
    StepRate,
    OnOff,
    Choice(&'static [&'static str]),
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamMeta {
    pub id: u32,
    pub name: String,
    pub group: String,
    pub kind: ParamKind,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub display: Display,
}

impl ParamMeta {
    pub fn continuous(
        id: u32,
        name: impl Into<String>,
        group: impl Into<String>,
        range: (f32, f32),
        default: f32,
        display: Display,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            group: group.into(),
            kind: ParamKind::Continuous,
            min: range.0,
            max: range.1,
            default,
            display,
        }
    }

    pub fn boolean(id: u32, name: impl Into<String>, group: impl Into<String>, default: bool) -> Self {
        Self {
            id,
            name: name.into(),
            group: group.into(),
            kind: ParamKind::Boolean,
            min: 0.0,
            max: 1.0,
            default: if default { 1.0 } else { 0.0 },
            display: Display::OnOff,
        }
    }

    pub fn choice(
        id: u32,
        name: impl Into<String>,
        group: impl Into<String>,
        choices: &'static [&'static str],
        default: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            group: group.into(),
            kind: ParamKind::Stepped,
            min: 0.0,
            max: choices.len().saturating_sub(1) as f32,
            default: default as f32,
            display: Display::Choice(choices),
        }
    }

    pub fn count(id: u32, name: impl Into<String>, group: impl Into<String>, range: (u32, u32), default: u32) -> Self {
        Self {
            id,
            name: name.into(),
            group: group.into(),
            kind: ParamKind::Stepped,
            min: range.0 as f32,
            max: range.1 as f32,
            default: default as f32,
            display: Display::Count,
        }
    }

    /// Brings `value` into the range and onto the grid of this kind.
    pub fn clamp(&self, value: f32) -> f32 {
        let value = if value.is_nan() { self.default } else { value };
        match self.kind {
            ParamKind::Continuous => value.clamp(self.min, self.max),
            ParamKind::Boolean => {
                if value > 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ParamKind::Stepped => value.round().clamp(self.min, self.max),
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn format_value(&self, value: f32) -> String {
        match self.display {
            Display::Percent => format!("{:.1} %", value * 100.0),
            Display::Bipolar => format!("{:+.2}", value),
            Display::Cutoff => {
                let hz = cutoff_to_hz(value);
                if hz >= 1000.0 {
                    format!("{:.2} kHz", hz / 1000.0)
                } else {
                    format!("{:.1} Hz", hz)
                }
            }
            Display::CubicGain => {
                let amplitude = cubic_amplitude(value);
                if amplitude <= 0.0 {
                    "-inf dB".to_string()
                } else {
                    format!("{:.1} dB", linear_to_db(amplitude))
                }
            }
            Display::StepRate => format!("{:.2} steps/s", 2.0f32.powf(value)),
            Display::OnOff => if value > 0.5 { "On" } else { "Off" }.to_string(),
            Display::Choice(choices) => choices
                .get(value.round().max(0.0) as usize)
                .map_or_else(|| format!("{value}"), |choice| (*choice).to_string()),
            Display::Count => format!("{}", value.round() as i64),
        }
    }
}

/// A parameter of the patch: metadata plus its lag. The lag's current
/// output is the parameter value.
#[derive(Debug, Clone)]
pub struct Param {
    pub meta: ParamMeta,
    pub(crate) lag: LinearLag,
    link: ActiveLink,
}

impl Param {
    pub fn new(meta: ParamMeta) -> Self {
        let lag = LinearLag::new(meta.default);
        Self {
            meta,
            lag,
            link: ActiveLink::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.meta.id
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.lag.value()
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.lag.target()
    }

    pub fn is_ramping(&self) -> bool {
        self.lag.is_active()
    }

    /// Sets the value without ramping. Any running ramp is dropped.
    pub fn set_direct(&mut self, value: f32) {
        let value = self.meta.clamp(value);
        self.lag.snap_to(value);
    }
}

impl Participant for Param {
    fn link(&self) -> &ActiveLink {
        &self.link
    }

    fn link_mut(&mut self) -> &mut ActiveLink {
        &mut self.link
    }
}
