//! Main-thread half of the stream snapshot handshake.
//!
//! The wait is a bounded poll. The audio thread only ever stores an atomic
//! flag, so it never has to wake a sleeping thread.

use std::time::Duration;

use tracing::{debug, warn};
use twofilters_rt::SharedFlags;

use crate::config::StreamPrepConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPrepOutcome {
    /// The audio thread settled the ramps; `attempts` polls were needed.
    Ready { attempts: u32 },
    /// The budget ran out and the caller must prepare the snapshot itself.
    Forced,
}

impl StreamPrepOutcome {
    pub fn is_forced(self) -> bool {
        self == Self::Forced
    }
}

/// Polls `ready_for_stream` up to `config.max_attempts` times, calling
/// `sleep` between polls. Always returns after at most `max_attempts + 1`
/// checks.
pub fn await_ready_for_stream(
    flags: &SharedFlags,
    config: &StreamPrepConfig,
    mut sleep: impl FnMut(Duration),
) -> StreamPrepOutcome {
    for attempt in 0..config.max_attempts {
        if flags.is_ready_for_stream() {
            debug!(attempt, "audio thread ready for stream");
            return StreamPrepOutcome::Ready { attempts: attempt };
        }
        sleep(config.attempt_interval(attempt));
    }
    if flags.is_ready_for_stream() {
        return StreamPrepOutcome::Ready {
            attempts: config.max_attempts,
        };
    }
    warn!(
        attempts = config.max_attempts,
        budget_ms = config.budget().as_millis() as u64,
        "audio thread did not prepare the stream in time; forcing snapshot"
    );
    StreamPrepOutcome::Forced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_flag_short_circuits() {
        let flags = SharedFlags::new();
        flags.set_ready_for_stream(true);
        let mut sleeps = 0;
        let outcome = await_ready_for_stream(&flags, &StreamPrepConfig::default(), |_| sleeps += 1);
        assert_eq!(outcome, StreamPrepOutcome::Ready { attempts: 0 });
        assert_eq!(sleeps, 0);
    }

    #[test]
    fn exhausted_budget_forces() {
        let flags = SharedFlags::new();
        let config = StreamPrepConfig {
            max_attempts: 3,
            poll_interval_ms: 2,
            backoff: 2.0,
        };
        let mut slept = Vec::new();
        let outcome = await_ready_for_stream(&flags, &config, |d| slept.push(d));
        assert!(outcome.is_forced());
        assert_eq!(
            slept,
            vec![Duration::from_millis(2), Duration::from_millis(4), Duration::from_millis(8)]
        );
        assert_eq!(slept.iter().sum::<Duration>(), config.budget());
    }

    #[test]
    fn flag_raised_during_wait_is_seen() {
        let flags = SharedFlags::new();
        let mut polls = 0;
        let outcome = await_ready_for_stream(&flags, &StreamPrepConfig::default(), |_| {
            polls += 1;
            if polls == 2 {
                flags.set_ready_for_stream(true);
            }
        });
        assert_eq!(outcome, StreamPrepOutcome::Ready { attempts: 2 });
    }
}
