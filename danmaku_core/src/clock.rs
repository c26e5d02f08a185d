// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host clock and media timeline binding.
//!
//! The engine reads two clocks:
//!
//! - the host's monotonic clock ([`HostClock`]), against which on-screen
//!   elapsed time is measured;
//! - optionally, a media timeline ([`TimelineBinding`]) whose position
//!   decides which comments are due.
//!
//! When no timeline is bound the host clock doubles as the timeline and the
//! playback rate is 1. [`ClockReading`] captures both in one snapshot.

use crate::time::{HostTime, Timebase};

/// A monotonic host clock.
pub trait HostClock {
    /// Current host time.
    fn now(&self) -> HostTime;

    /// Tick-to-nanosecond conversion for [`now`](Self::now).
    fn timebase(&self) -> Timebase;

    /// Current host time in seconds.
    fn now_secs(&self) -> f64 {
        self.now().to_secs(self.timebase())
    }
}

/// External playback clock the overlay follows.
pub trait TimelineBinding {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Current playback rate (1.0 is normal speed).
    fn playback_rate(&self) -> f64;

    /// Whether playback is paused.
    fn is_paused(&self) -> bool;

    /// Whether the timeline still exists. A detached binding is dropped and
    /// the engine falls back to the host clock.
    fn is_attached(&self) -> bool {
        true
    }

    /// Stops delivering events. Called once when the engine drops the
    /// binding.
    fn unsubscribe(&mut self) {}
}

/// Playback state changes forwarded from the timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimelineEvent {
    /// Playback started or resumed.
    Play,
    /// Playback paused or stalled.
    Pause,
    /// The position jumped.
    Seeking,
    /// The playback rate changed.
    RateChange,
}

/// Snapshot of the host clock and the timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockReading {
    /// Host time.
    pub host: HostTime,
    /// Host time in seconds.
    pub now: f64,
    /// Timeline position in seconds (`now` when unbound).
    pub current_time: f64,
    /// Sanitized playback rate (1.0 when unbound).
    pub playback_rate: f64,
    /// Whether a timeline is bound.
    pub bound: bool,
}

impl ClockReading {
    /// Reads `host` and, if present, `binding` at host time `at`.
    #[must_use]
    pub fn read(
        at: HostTime,
        timebase: Timebase,
        binding: Option<&dyn TimelineBinding>,
    ) -> Self {
        let now = at.to_secs(timebase);
        match binding {
            Some(b) => Self {
                host: at,
                now,
                current_time: sanitize_time(b.current_time()),
                playback_rate: sanitize_rate(b.playback_rate()),
                bound: true,
            },
            None => Self {
                host: at,
                now,
                current_time: now,
                playback_rate: 1.0,
                bound: false,
            },
        }
    }

    /// Reference time for a comment due at `time`, so that its elapsed
    /// on-screen time matches how long ago it was due.
    #[must_use]
    pub fn reference_for(&self, time: f64) -> f64 {
        if self.bound {
            self.now - (self.current_time - time)
        } else {
            time
        }
    }
}

/// Maps non-finite and non-positive rates to 1.0.
#[must_use]
pub fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        1.0
    }
}

fn sanitize_time(t: f64) -> f64 {
    if t.is_finite() { t } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        time: f64,
        rate: f64,
    }

    impl TimelineBinding for Fixed {
        fn current_time(&self) -> f64 {
            self.time
        }
        fn playback_rate(&self) -> f64 {
            self.rate
        }
        fn is_paused(&self) -> bool {
            false
        }
    }

    #[test]
    fn unbound_reading_uses_host_seconds() {
        let r = ClockReading::read(HostTime(3_000_000), Timebase::MICROS, None);
        assert_eq!(r.now, 3.0);
        assert_eq!(r.current_time, 3.0);
        assert_eq!(r.playback_rate, 1.0);
        assert!(!r.bound);
        assert_eq!(r.reference_for(2.5), 2.5, "unbound reference is the time");
    }

    #[test]
    fn bound_reading_maps_reference() {
        let media = Fixed {
            time: 10.0,
            rate: 2.0,
        };
        let r = ClockReading::read(HostTime(100_000_000), Timebase::MICROS, Some(&media));
        assert_eq!(r.current_time, 10.0);
        assert_eq!(r.playback_rate, 2.0);
        // Due 4s ago on the timeline, so the reference sits 4s before now.
        assert_eq!(r.reference_for(6.0), 96.0);
    }

    #[test]
    fn invalid_rates_are_sanitized() {
        assert_eq!(sanitize_rate(0.0), 1.0);
        assert_eq!(sanitize_rate(-2.0), 1.0);
        assert_eq!(sanitize_rate(f64::NAN), 1.0);
        assert_eq!(sanitize_rate(f64::INFINITY), 1.0);
        assert_eq!(sanitize_rate(0.5), 0.5);

        let media = Fixed {
            time: f64::NAN,
            rate: f64::NAN,
        };
        let r = ClockReading::read(HostTime(0), Timebase::NANOS, Some(&media));
        assert_eq!(r.current_time, 0.0);
        assert_eq!(r.playback_rate, 1.0);
    }
}
