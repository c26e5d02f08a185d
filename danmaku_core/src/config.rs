// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::clock::TimelineBinding;
use crate::comment::RawComment;

/// Scroll speed used when none (or an invalid one) is configured, in pixels
/// per second.
pub const DEFAULT_SPEED: f64 = 144.0;

/// On-stage duration in seconds before the stage width is known.
pub const DEFAULT_DURATION: f64 = 4.0;

/// Default cap on comments restored by a seek.
pub const DEFAULT_BACKFILL_MAX_COUNT: usize = 120;

/// Tunables for an [`Engine`](crate::engine::Engine).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Scroll speed in pixels per second. On-stage duration is the stage
    /// width divided by this.
    pub speed: f64,
    /// Whether a seek restores the comments that would be on stage at the
    /// new position.
    pub backfill_on_seek: bool,
    /// Most comments a seek restores; 0 means no limit.
    pub backfill_max_count: usize,
    /// Backfill window in seconds; `None` uses the on-stage duration.
    pub backfill_window: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            backfill_on_seek: true,
            backfill_max_count: DEFAULT_BACKFILL_MAX_COUNT,
            backfill_window: None,
        }
    }

    /// Sets the scroll speed.
    #[must_use]
    pub const fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Enables or disables seek backfill.
    #[must_use]
    pub const fn with_backfill_on_seek(mut self, enabled: bool) -> Self {
        self.backfill_on_seek = enabled;
        self
    }

    /// Sets the backfill cap.
    #[must_use]
    pub const fn with_backfill_max_count(mut self, count: usize) -> Self {
        self.backfill_max_count = count;
        self
    }

    /// Sets a fixed backfill window.
    #[must_use]
    pub const fn with_backfill_window(mut self, secs: f64) -> Self {
        self.backfill_window = Some(secs);
        self
    }

    /// Returns a copy with out-of-range values replaced by defaults.
    #[must_use]
    pub fn validated(self) -> Self {
        Self {
            speed: if is_valid_speed(self.speed) {
                self.speed
            } else {
                DEFAULT_SPEED
            },
            backfill_window: self.backfill_window.filter(|w| w.is_finite() && *w > 0.0),
            ..self
        }
    }
}

/// Whether `speed` can be used as a scroll speed.
#[must_use]
pub fn is_valid_speed(speed: f64) -> bool {
    speed.is_finite() && speed > 0.0
}

/// Everything needed to construct an [`Engine`](crate::engine::Engine)
/// besides its platform collaborators.
#[derive(Default)]
pub struct EngineOptions {
    /// Tunables.
    pub config: EngineConfig,
    /// Initial comments, in any order.
    pub comments: Vec<RawComment>,
    /// Timeline to follow; `None` runs free on the host clock.
    pub binding: Option<Box<dyn TimelineBinding>>,
}

impl core::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("config", &self.config)
            .field("comments", &self.comments.len())
            .field("bound", &self.binding.is_some())
            .finish()
    }
}
