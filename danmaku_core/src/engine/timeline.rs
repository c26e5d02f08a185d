// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Timeline synchronization: seek, rate changes, live replacement and
//! binding changes.

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::frame::{RATE_EPSILON, place_batch};
use super::{Engine, ReplaceOptions};
use crate::backend::RenderSurface;
use crate::clock::{ClockReading, TimelineBinding};
use crate::comment::{Comment, CommentId, RawComment};
use crate::lane::Lanes;
use crate::store::CommentStore;
use crate::trace::{LifecycleKind, RateChangeEvent, Rejection, ReplaceEvent, SeekEvent};

/// Comments with `target - window <= time <= target`, earliest first, at most
/// `cap` of them (0 means no limit).
fn backfill_pool(store: &CommentStore, target: f64, window: f64, cap: usize) -> Vec<Comment> {
    let range = store.backfill_range(target - window, target);
    let end = if cap == 0 {
        range.end
    } else {
        range.end.min(range.start.saturating_add(cap))
    };
    store.comments()[range.start..end].to_vec()
}

impl<S: RenderSurface> Engine<S> {
    /// Resynchronizes with the timeline after its position jumped.
    ///
    /// Drops everything on stage, repositions the cursor and, if enabled,
    /// restores the comments that would be on stage at the new position.
    /// Draws one static frame when playback is paused. Does nothing while
    /// unbound.
    pub fn seek(&mut self) {
        if self.destroyed || self.binding.is_none() {
            return;
        }
        let reading = self.read_clock();
        let target = reading.current_time;

        self.release_active();
        self.surface.clear();
        self.lanes.reset();

        let index = self.store.seek(target);
        let mut restored = 0;
        if self.visible && self.config.backfill_on_seek {
            let window = self.config.backfill_window.unwrap_or(self.duration);
            let pool = backfill_pool(
                &self.store,
                target,
                window,
                self.config.backfill_max_count,
            );
            restored = self.place(pool, &reading);
            self.store.set_cursor(index);
        }

        let static_frame = self.visible && (self.paused || self.media_paused());
        if static_frame {
            self.render(&reading);
        }

        let event = SeekEvent {
            at: reading.host,
            target,
            cursor: self.store.cursor(),
            restored,
            static_frame,
        };
        self.trace(|t| t.seek(&event));
    }

    /// Picks up a new playback rate.
    ///
    /// While playing, active comments are re-anchored so that none of them
    /// jumps. Does nothing while unbound.
    pub fn rate_change(&mut self) {
        if self.destroyed || self.binding.is_none() {
            return;
        }
        let reading = self.read_clock();
        if self.paused || (reading.playback_rate - self.last_rate).abs() <= RATE_EPSILON {
            self.last_rate = reading.playback_rate;
            return;
        }
        self.compensate_rate(&reading);
    }

    /// Rescales every reference time from `last_rate` to the reading's rate.
    pub(super) fn compensate_rate(&mut self, reading: &ClockReading) {
        let old_rate = self.last_rate;
        let new_rate = reading.playback_rate;
        for a in &mut self.active {
            a.reference_time = reading.now - (reading.now - a.reference_time) * old_rate / new_rate;
        }
        self.last_rate = new_rate;

        let event = RateChangeEvent {
            at: reading.host,
            old_rate,
            new_rate,
            compensated: self.active.len(),
        };
        self.trace(|t| t.rate_change(&event));
    }

    /// Swaps in a new comment set.
    ///
    /// The new set is laid out off to the side first and committed in one
    /// step, so no frame ever shows old and new comments together. A paused
    /// engine draws exactly one static frame of the new set; a hidden one
    /// draws nothing.
    pub fn replace_all(&mut self, comments: Vec<RawComment>, options: ReplaceOptions) {
        if self.destroyed {
            return;
        }
        let reading = self.read_clock();
        let first_new = CommentId(self.next_id);
        let (comments, dropped) = self.normalize_batch(comments, reading.current_time);
        let mut store = CommentStore::new();
        store.replace_all(comments, reading.current_time);

        let mut lanes = Lanes::new();
        let mut staged = Vec::new();
        if self.visible {
            let pool = backfill_pool(
                &store,
                reading.current_time,
                self.duration,
                self.config.backfill_max_count,
            );
            let ctx = self.lane_context(&reading);
            let (placed, failures) = place_batch(
                &mut self.glyphs,
                &mut self.surface,
                &mut lanes,
                pool,
                &reading,
                &ctx,
            );
            for _ in 0..failures {
                self.reject(Rejection::MeasureFailed);
            }
            staged = placed;
        }
        #[cfg(feature = "trace-rich")]
        self.trace_lanes(&staged);

        let admitted = staged.len();
        self.release_active();
        self.glyphs.forget_sizes_before(first_new);
        self.store = store;
        self.lanes = lanes;
        self.active = staged;
        self.paused_at = None;

        let was_running = !self.paused;
        let mut running = was_running;
        if self.visible {
            running = if options.preserve_state {
                was_running
            } else {
                !self.media_paused()
            };
            if running {
                self.play();
            } else {
                self.pause();
                self.render_static(&reading);
            }
        }

        let event = ReplaceEvent {
            at: reading.host,
            buffered: self.store.len(),
            dropped,
            admitted,
            running,
        };
        self.trace(|t| t.replace(&event));
    }

    /// Follows a new timeline, replacing any current binding.
    ///
    /// Resynchronizes with the new position and adopts its play state.
    pub fn bind(&mut self, binding: Box<dyn TimelineBinding>) {
        if self.destroyed {
            return;
        }
        if let Some(mut old) = self.binding.replace(binding) {
            old.unsubscribe();
        }
        self.paused_at = None;
        self.last_rate = self.read_clock().playback_rate;
        self.lifecycle(LifecycleKind::Bind);

        if self.media_paused() {
            self.pause();
            self.seek();
        } else {
            self.seek();
            self.play();
        }
    }

    /// Stops following the timeline and runs on the host clock.
    pub fn unbind(&mut self) {
        if self.destroyed || self.binding.is_none() {
            return;
        }
        self.drop_binding(LifecycleKind::Unbind);
    }

    /// Unsubscribes and forgets the binding. Lane records keyed to timeline
    /// time are meaningless on the host clock, so lanes start over.
    pub(super) fn drop_binding(&mut self, kind: LifecycleKind) {
        if let Some(mut binding) = self.binding.take() {
            binding.unsubscribe();
        }
        self.last_rate = 1.0;
        self.lanes.reset();
        if self.paused {
            self.paused_at = Some(self.host.now_secs());
        }
        self.lifecycle(kind);
    }

    fn media_paused(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.is_paused())
    }
}
