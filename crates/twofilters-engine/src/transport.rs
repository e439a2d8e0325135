//! Host transport tracking and bar-aligned LFO retriggering.

use tracing::debug;

pub const MIN_TEMPO_BPM: f64 = 1.0;
pub const MAX_TEMPO_BPM: f64 = 1000.0;
pub const MAX_SONG_POS_BEATS: f64 = 1.0e9;

/// Transport snapshot delivered by the host once per processing call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportInfo {
    pub playing: bool,
    pub recording: bool,
    pub tempo_bpm: f64,
    pub time_sig_num: u16,
    pub time_sig_den: u16,
    pub song_pos_beats: Option<f64>,
}

impl Default for TransportInfo {
    fn default() -> Self {
        Self {
            playing: false,
            recording: false,
            tempo_bpm: 120.0,
            time_sig_num: 4,
            time_sig_den: 4,
            song_pos_beats: None,
        }
    }
}

impl TransportInfo {
    pub fn playing_at(tempo_bpm: f64) -> Self {
        Self {
            playing: true,
            tempo_bpm,
            ..Self::default()
        }
    }

    /// Copy with every host-supplied number made usable: a tempo that is not
    /// a positive finite number falls back to the default, finite tempos are
    /// clamped to `MIN_TEMPO_BPM..=MAX_TEMPO_BPM`. A song position that is
    /// not finite is dropped, others are clamped to `0..=MAX_SONG_POS_BEATS`.
    pub fn sanitized(self) -> Self {
        let tempo_bpm = if self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0 {
            self.tempo_bpm.clamp(MIN_TEMPO_BPM, MAX_TEMPO_BPM)
        } else {
            Self::default().tempo_bpm
        };
        Self {
            tempo_bpm,
            song_pos_beats: self
                .song_pos_beats
                .filter(|beats| beats.is_finite())
                .map(|beats| beats.clamp(0.0, MAX_SONG_POS_BEATS)),
            ..self
        }
    }

    /// Quarter-note beats per bar.
    pub fn bar_length_beats(&self) -> f64 {
        let num = f64::from(self.time_sig_num.max(1));
        let den = f64::from(self.time_sig_den.max(1));
        num * 4.0 / den
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetriggerMode {
    FreeRun,
    EveryBar,
    EveryTwoBars,
    EveryFourBars,
}

impl RetriggerMode {
    pub const NAMES: &'static [&'static str] = &["Free Run", "Every Bar", "Every 2 Bars", "Every 4 Bars"];

    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::EveryBar,
            2 => Self::EveryTwoBars,
            3 => Self::EveryFourBars,
            _ => Self::FreeRun,
        }
    }

    pub fn bars(self) -> Option<u64> {
        match self {
            Self::FreeRun => None,
            Self::EveryBar => Some(1),
            Self::EveryTwoBars => Some(2),
            Self::EveryFourBars => Some(4),
        }
    }
}

/// Tracks play state and elapsed beats.
///
/// Bar starts are advanced incrementally by the bar length in effect when the
/// boundary is crossed. A time signature change does not re-derive the last
/// bar start, so bars already elapsed keep their old length.
#[derive(Debug, Clone)]
pub struct TransportTracker {
    state: PlayState,
    info: TransportInfo,
    beats: f64,
    last_bar_start_beats: f64,
    bar_index: u64,
    did_reset_in_larger_block: bool,
}

impl Default for TransportTracker {
    fn default() -> Self {
        Self {
            state: PlayState::Stopped,
            info: TransportInfo::default(),
            beats: 0.0,
            last_bar_start_beats: 0.0,
            bar_index: 0,
            did_reset_in_larger_block: false,
        }
    }
}

impl TransportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn info(&self) -> &TransportInfo {
        &self.info
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.info.tempo_bpm
    }

    pub fn beats(&self) -> f64 {
        self.beats
    }

    pub fn bar_index(&self) -> u64 {
        self.bar_index
    }

    /// Starts a host processing call. Returns `true` on a
    /// `Stopped -> Playing` transition, which always retriggers.
    pub fn begin_host_block(&mut self, info: Option<TransportInfo>) -> bool {
        let info = info.unwrap_or_default().sanitized();
        self.did_reset_in_larger_block = false;
        let playing = info.playing || info.recording;
        let started = playing && self.state == PlayState::Stopped;
        if started {
            self.beats = info.song_pos_beats.unwrap_or(0.0).max(0.0);
            let bar = info.bar_length_beats();
            self.bar_index = (self.beats / bar).floor() as u64;
            self.last_bar_start_beats = self.bar_index as f64 * bar;
            debug!(beats = self.beats, tempo = info.tempo_bpm, "transport started");
        }
        self.state = if playing {
            PlayState::Playing
        } else {
            PlayState::Stopped
        };
        self.info = info;
        started
    }

    /// Accumulates one control block. Returns `true` when a bar boundary
    /// that is a multiple of the configured bar count was crossed; at most
    /// once per host block.
    pub fn tick(&mut self, frames: usize, sample_rate: f64, mode: RetriggerMode) -> bool {
        if self.state != PlayState::Playing {
            return false;
        }
        self.beats += self.info.tempo_bpm / 60.0 * frames as f64 / sample_rate.max(1.0);

        let bar = self.info.bar_length_beats();
        if self.beats < self.last_bar_start_beats + bar {
            return false;
        }
        let crossed = ((self.beats - self.last_bar_start_beats) / bar).floor();
        self.last_bar_start_beats += crossed * bar;
        self.bar_index = self.bar_index.saturating_add(crossed as u64);

        let Some(bars) = mode.bars() else {
            return false;
        };
        if self.did_reset_in_larger_block || self.bar_index % bars != 0 {
            return false;
        }
        self.did_reset_in_larger_block = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48_000.0;

    #[test]
    fn free_run_never_retriggers_on_bars() {
        let mut transport = TransportTracker::new();
        assert!(transport.begin_host_block(Some(TransportInfo::playing_at(120.0))));
        for _ in 0..48_000 {
            assert!(!transport.tick(8, SR, RetriggerMode::FreeRun));
        }
        assert!(transport.bar_index() >= 3);
    }

    #[test]
    fn every_two_bars_fires_on_even_bars() {
        let mut transport = TransportTracker::new();
        transport.begin_host_block(Some(TransportInfo::playing_at(120.0)));
        let mut fired_at = Vec::new();
        // 120 BPM 4/4: one bar is 2 s = 12_000 blocks of 8.
        for _ in 0..60_000 {
            transport.begin_host_block(Some(TransportInfo::playing_at(120.0)));
            if transport.tick(8, SR, RetriggerMode::EveryTwoBars) {
                fired_at.push(transport.bar_index());
            }
        }
        assert_eq!(fired_at, vec![2, 4]);
    }

    #[test]
    fn one_check_per_host_block() {
        let mut transport = TransportTracker::new();
        transport.begin_host_block(Some(TransportInfo {
            time_sig_num: 1,
            time_sig_den: 16,
            ..TransportInfo::playing_at(240.0)
        }));
        // A quarter-beat bar lasts 3000 samples; a long host block crosses many.
        let mut fired = 0;
        for _ in 0..2000 {
            if transport.tick(8, SR, RetriggerMode::EveryBar) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn unusable_tempos_fall_back_to_default() {
        assert_eq!(TransportInfo::playing_at(f64::INFINITY).sanitized().tempo_bpm, 120.0);
        assert_eq!(TransportInfo::playing_at(f64::NAN).sanitized().tempo_bpm, 120.0);
        assert_eq!(TransportInfo::playing_at(-60.0).sanitized().tempo_bpm, 120.0);
        assert_eq!(TransportInfo::playing_at(1e9).sanitized().tempo_bpm, MAX_TEMPO_BPM);
        let lost = TransportInfo {
            song_pos_beats: Some(f64::NEG_INFINITY),
            ..TransportInfo::playing_at(120.0)
        };
        assert_eq!(lost.sanitized().song_pos_beats, None);
    }

    #[test]
    fn long_block_counts_every_crossed_bar() {
        let mut transport = TransportTracker::new();
        transport.begin_host_block(Some(TransportInfo::playing_at(120.0)));
        // Five seconds at 120 BPM 4/4 is two and a half bars.
        assert!(transport.tick(5 * 48_000, SR, RetriggerMode::EveryTwoBars));
        assert_eq!(transport.bar_index(), 2);
        assert!((transport.beats() - 10.0).abs() < 1e-9);
    }

    proptest::proptest! {
        #[test]
        fn any_host_tempo_keeps_the_tracker_finite(
            tempo in proptest::num::f64::ANY,
            pos in proptest::num::f64::ANY,
            num in 0u16..32,
            den in 0u16..32,
        ) {
            let mut transport = TransportTracker::new();
            let info = TransportInfo {
                time_sig_num: num,
                time_sig_den: den,
                song_pos_beats: Some(pos),
                ..TransportInfo::playing_at(tempo)
            };
            for _ in 0..64 {
                transport.begin_host_block(Some(info));
                transport.tick(8, SR, RetriggerMode::EveryBar);
            }
            proptest::prop_assert!(transport.beats().is_finite());
            proptest::prop_assert!(transport.tempo_bpm().is_finite() && transport.tempo_bpm() > 0.0);
        }
    }

    #[test]
    fn starting_mid_song_aligns_bar_counter() {
        let mut transport = TransportTracker::new();
        transport.begin_host_block(Some(TransportInfo {
            song_pos_beats: Some(7.5),
            ..TransportInfo::playing_at(120.0)
        }));
        assert_eq!(transport.bar_index(), 1);
        let mut fired = false;
        // Half a beat to the bar line at beat 8: 0.25 s, 1500 blocks.
        for _ in 0..1600 {
            fired |= transport.tick(8, SR, RetriggerMode::EveryBar);
        }
        assert!(fired);
        assert_eq!(transport.bar_index(), 2);
    }
}
