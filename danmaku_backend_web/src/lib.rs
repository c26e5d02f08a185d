// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web backend for danmaku.
//!
//! This crate provides integration with browser APIs:
//!
//! - [`RafLoop`]: `requestAnimationFrame` frame source, with a
//!   [`RafScheduler`] handle for the engine
//! - [`CanvasSurface`]: Canvas 2D stage and per-comment rasters
//! - [`MediaBinding`] and [`MediaEvents`]: `HTMLMediaElement` timeline
//! - [`PerformanceClock`]: `performance.now()` host clock
//! - [`WebOverlay`]: all of the above wired to one engine

#![no_std]

extern crate alloc;

mod canvas;
mod media;
mod overlay;
mod raf;

pub use canvas::{CanvasSurface, DEFAULT_FILL};
pub use danmaku_core::backend::RenderSurface;
pub use media::{MEDIA_EVENTS, MediaBinding, MediaEvents, timeline_event};
pub use overlay::WebOverlay;
pub use raf::{RafLoop, RafScheduler};

use danmaku_core::clock::HostClock;
use danmaku_core::time::{HostTime, Timebase};

/// Returns the current host time from `performance.now()`.
///
/// The returned [`HostTime`] is in microsecond ticks. Use [`timebase`] to
/// convert to nanoseconds.
#[must_use]
pub fn now() -> HostTime {
    raf::ms_to_host_time(raf::performance_now())
}

/// Returns the web [`Timebase`]: 1 tick = 1 µs = 1000 ns.
#[must_use]
pub fn timebase() -> Timebase {
    Timebase::MICROS
}

/// [`HostClock`] backed by `performance.now()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerformanceClock;

impl HostClock for PerformanceClock {
    fn now(&self) -> HostTime {
        now()
    }

    fn timebase(&self) -> Timebase {
        timebase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timebase_is_microsecond() {
        let tb = timebase();
        // 1 tick = 1 µs = 1000 ns
        assert_eq!(tb.ticks_to_nanos(1), 1000, "one tick");
        assert_eq!(tb.ticks_to_nanos(1_000_000), 1_000_000_000, "one second");
    }

    #[test]
    fn timestamps_convert_to_microseconds() {
        assert_eq!(raf::ms_to_host_time(16.5), HostTime(16_500), "16.5 ms");
        assert_eq!(raf::ms_to_host_time(-1.0), HostTime(0), "negative");
        assert_eq!(raf::ms_to_host_time(f64::NAN), HostTime(0), "NaN");
    }
}
