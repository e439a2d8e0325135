//! Fixed collection of lags for MIDI controller input.

use twofilters_dsp::LinearLag;
use twofilters_rt::{ActiveLink, ActiveSet, Participant};

/// 128 controllers, pitch bend and channel pressure.
pub const MIDI_LAG_COUNT: usize = 130;
pub const PITCH_BEND_LAG: usize = 128;
pub const CHANNEL_PRESSURE_LAG: usize = 129;

#[derive(Debug, Clone, Copy, Default)]
struct LagSlot {
    lag: LinearLag,
    link: ActiveLink,
}

impl Participant for LagSlot {
    fn link(&self) -> &ActiveLink {
        &self.link
    }

    fn link_mut(&mut self) -> &mut ActiveLink {
        &mut self.link
    }
}

pub struct LagCollection<const N: usize> {
    slots: [LagSlot; N],
    active: ActiveSet,
}

pub type MidiLags = LagCollection<MIDI_LAG_COUNT>;

impl<const N: usize> Default for LagCollection<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LagCollection<N> {
    pub fn new() -> Self {
        Self {
            slots: [LagSlot::default(); N],
            active: ActiveSet::new(),
        }
    }

    /// Applies the new rate to every lag and settles all of them.
    pub fn set_rate(&mut self, smoothing_ms: f32, sample_rate: f32, block_size: usize) {
        for slot in &mut self.slots {
            slot.lag.set_rate(smoothing_ms, sample_rate, block_size);
        }
        self.snap_all();
    }

    pub fn set_target(&mut self, index: usize, value: f32) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        slot.lag.set_target(value);
        if slot.lag.is_active() {
            self.active.insert(&mut self.slots, index);
        }
    }

    pub fn process_all(&mut self) {
        self.active.retain(&mut self.slots, |_, slot| {
            slot.lag.process();
            slot.lag.is_active()
        });
    }

    pub fn snap_all(&mut self) {
        self.active.retain(&mut self.slots, |_, slot| {
            slot.lag.snap_to_target();
            false
        });
    }

    pub fn value(&self, index: usize) -> f32 {
        self.slots.get(index).map_or(0.0, |slot| slot.lag.value())
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn max_blocks_to_settle(&self) -> usize {
        self.slots.first().map_or(0, |slot| slot.lag.max_blocks_to_settle())
    }
}
