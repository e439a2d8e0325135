use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Samples per control block. Parameter ramps, modulation and queue draining
/// all run once per block of this size.
pub const BLOCK_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub to_ui_capacity: usize,
    pub to_audio_capacity: usize,
    pub name_pool_slots: usize,
    pub param_smoothing_ms: f32,
    pub midi_smoothing_ms: f32,
    pub vu_frames_between_updates: f32,
    pub ui_frame_rate_hz: f32,
    pub vu_release_ms: f32,
    pub stream: StreamPrepConfig,
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            to_ui_capacity: 16 * 1024,
            to_audio_capacity: 64 * 1024,
            name_pool_slots: 128,
            param_smoothing_ms: 64.0,
            midi_smoothing_ms: 128.0,
            vu_frames_between_updates: 2.5,
            ui_frame_rate_hz: 60.0,
            vu_release_ms: 300.0,
            stream: StreamPrepConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_queue_capacities(mut self, to_ui: usize, to_audio: usize) -> Self {
        self.to_ui_capacity = to_ui;
        self.to_audio_capacity = to_audio;
        self
    }

    pub fn with_smoothing_ms(mut self, params: f32, midi: f32) -> Self {
        self.param_smoothing_ms = params;
        self.midi_smoothing_ms = midi;
        self
    }

    pub fn with_stream(mut self, stream: StreamPrepConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Control blocks between two VU pushes at `sample_rate`.
    pub fn vu_interval_blocks(&self, sample_rate: f64) -> u32 {
        let blocks = sample_rate * f64::from(self.vu_frames_between_updates)
            / f64::from(self.ui_frame_rate_hz.max(1.0))
            / BLOCK_SIZE as f64;
        (blocks.round() as u32).max(1)
    }
}

/// Bounds of the main-thread wait for a ramp-settled snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamPrepConfig {
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    /// Multiplier applied to the interval after every failed attempt.
    pub backoff: f32,
}

impl Default for StreamPrepConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval_ms: 4,
            backoff: 1.0,
        }
    }
}

impl StreamPrepConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Sleep before re-checking after failed attempt number `attempt`.
    pub fn attempt_interval(&self, attempt: u32) -> Duration {
        let factor = f64::from(self.backoff.max(1.0)).powi(attempt as i32);
        let micros = self.poll_interval_ms as f64 * 1000.0 * factor;
        Duration::from_micros(micros.round() as u64)
    }

    /// Longest total time the poll can sleep.
    pub fn budget(&self) -> Duration {
        (0..self.max_attempts).map(|attempt| self.attempt_interval(attempt)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emits a debug event for every applied message.
    pub verbose: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vu_interval_matches_display_rate() {
        let config = EngineConfig::default();
        assert_eq!(config.vu_interval_blocks(48_000.0), 250);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"param_smoothing_ms": 10.0}"#).unwrap();
        assert_eq!(config.param_smoothing_ms, 10.0);
        assert_eq!(config.to_audio_capacity, 64 * 1024);
        assert_eq!(config.stream.max_attempts, 5);
    }

    #[test]
    fn stream_budget_grows_with_backoff() {
        let flat = StreamPrepConfig::default();
        assert_eq!(flat.budget(), Duration::from_millis(20));
        let backoff = StreamPrepConfig {
            backoff: 2.0,
            ..flat
        };
        assert_eq!(backoff.budget(), Duration::from_millis(4 + 8 + 16 + 32 + 64));
    }
}
