// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pipeline: evict, admit, render.

use alloc::vec::Vec;

use kurbo::{Point, Size};

use super::{ActiveComment, Engine};
use crate::backend::RenderSurface;
use crate::clock::ClockReading;
use crate::comment::{Comment, Mode};
use crate::glyph::GlyphCache;
use crate::lane::{Candidate, LaneContext, Lanes};
use crate::scheduler::FrameTick;
use crate::trace::{
    FrameSummaryBuilder, FrameTickEvent, LifecycleKind, PhaseBeginEvent, PhaseEndEvent, PhaseKind,
    Rejection,
};

/// Rates closer than this are considered equal.
pub(super) const RATE_EPSILON: f64 = 1e-6;

/// Horizontal position of a block `width` wide that has travelled
/// `travelled` pixels across a stage `stage_width` wide.
#[must_use]
pub fn layout_x(mode: Mode, stage_width: f64, width: f64, travelled: f64) -> f64 {
    match mode {
        Mode::Leftward => travelled - width,
        Mode::Rightward => stage_width - travelled,
        Mode::Top | Mode::Bottom => (stage_width - width) / 2.0,
    }
}

/// On-stage seconds since `reference`, scaled by the playback rate.
pub(super) fn elapsed(reading: &ClockReading, reference: f64) -> f64 {
    (reading.now - reference) * reading.playback_rate
}

fn travelled(stage_width: f64, duration: f64, width: f64, elapsed: f64) -> f64 {
    (stage_width + width) * elapsed / duration
}

/// Materializes `batch`, then allocates lanes in batch order.
///
/// Returns the placed comments and the number of failed measurements.
pub(super) fn place_batch<S: RenderSurface>(
    glyphs: &mut GlyphCache<S::Raster>,
    surface: &mut S,
    lanes: &mut Lanes,
    batch: Vec<Comment>,
    reading: &ClockReading,
    ctx: &LaneContext,
) -> (Vec<ActiveComment>, usize) {
    let mut failures = 0;
    let sized: Vec<(Comment, Size)> = batch
        .into_iter()
        .map(|comment| {
            let (size, outcome) = glyphs.materialize(&mut *surface, &comment);
            if outcome.measure_failed {
                failures += 1;
            }
            (comment, size)
        })
        .collect();

    let placed = sized
        .into_iter()
        .map(|(comment, size)| {
            let candidate = Candidate {
                entry_time: comment.time,
                size,
            };
            let y = lanes.allocate(comment.mode, &candidate, ctx);
            let reference_time = reading.reference_for(comment.time);
            let moved = travelled(
                ctx.stage.width,
                ctx.duration,
                size.width,
                elapsed(reading, reference_time),
            );
            let x = layout_x(comment.mode, ctx.stage.width, size.width, moved);
            ActiveComment {
                comment,
                size,
                reference_time,
                position: Point::new(x, y),
            }
        })
        .collect();
    (placed, failures)
}

impl<S: RenderSurface> Engine<S> {
    /// Runs one frame.
    ///
    /// Ignored unless the engine is visible, playing and alive. Evicts
    /// expired comments, admits due ones, redraws the stage and requests
    /// the next frame.
    pub fn tick(&mut self, tick: FrameTick) {
        if self.destroyed || !self.visible || self.paused {
            return;
        }
        self.frame_index = tick.frame_index;

        if self.binding.as_ref().is_some_and(|b| !b.is_attached()) {
            self.drop_binding(LifecycleKind::BindingLost);
        }
        let reading = self.read_clock_at(tick.now);
        if reading.bound && (reading.playback_rate - self.last_rate).abs() > RATE_EPSILON {
            self.compensate_rate(&reading);
        }

        let tick_event = FrameTickEvent::new(&tick, reading.current_time, reading.playback_rate);
        self.trace(|t| t.frame_tick(&tick_event));
        let mut summary = FrameSummaryBuilder::new(&tick_event);

        self.surface.clear();

        self.phase_begin(&mut summary, PhaseKind::Evict);
        let evicted = self.evict(&reading);
        self.phase_end(&mut summary, PhaseKind::Evict);

        self.phase_begin(&mut summary, PhaseKind::Admit);
        let (admitted, skipped) = self.admit_due(&reading);
        self.phase_end(&mut summary, PhaseKind::Admit);

        self.phase_begin(&mut summary, PhaseKind::Render);
        self.render(&reading);
        self.phase_end(&mut summary, PhaseKind::Render);

        summary.set_counts(admitted, evicted, skipped, self.active.len());
        let summary = summary.finish();
        self.trace(|t| t.frame_summary(&summary));

        self.scheduler.request_frame();
    }

    fn evict(&mut self, reading: &ClockReading) -> usize {
        let duration = self.duration;
        let glyphs = &mut self.glyphs;
        let surface = &mut self.surface;
        let before = self.active.len();
        self.active.retain(|a| {
            let live = elapsed(reading, a.reference_time) < duration;
            if !live {
                glyphs.release(&mut *surface, a.comment.id);
            }
            live
        });
        before - self.active.len()
    }

    /// Admits every comment due before the current time. Returns the
    /// admitted and skipped counts.
    fn admit_due(&mut self, reading: &ClockReading) -> (usize, usize) {
        let mut batch = Vec::new();
        let mut skipped = 0;
        while let Some(comment) = self.store.next_due(reading.current_time) {
            if reading.current_time - comment.time >= self.duration {
                skipped += 1;
            } else {
                batch.push(comment.clone());
            }
            self.store.advance();
        }
        (self.place(batch, reading), skipped)
    }

    /// Places `batch` on stage with the engine's lanes. Returns how many
    /// were placed.
    pub(super) fn place(&mut self, batch: Vec<Comment>, reading: &ClockReading) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let ctx = self.lane_context(reading);
        let (placed, failures) = place_batch(
            &mut self.glyphs,
            &mut self.surface,
            &mut self.lanes,
            batch,
            reading,
            &ctx,
        );
        for _ in 0..failures {
            self.reject(Rejection::MeasureFailed);
        }
        #[cfg(feature = "trace-rich")]
        self.trace_lanes(&placed);
        let count = placed.len();
        self.active.extend(placed);
        count
    }

    pub(super) fn lane_context(&self, reading: &ClockReading) -> LaneContext {
        LaneContext {
            current_time: reading.current_time,
            playback_rate: reading.playback_rate,
            stage: self.stage,
            duration: self.duration,
        }
    }

    /// Lays out and draws every active comment. Does not clear.
    pub(super) fn render(&mut self, reading: &ClockReading) {
        let stage_width = self.stage.width;
        let duration = self.duration;
        for a in &mut self.active {
            let moved = travelled(
                stage_width,
                duration,
                a.size.width,
                elapsed(reading, a.reference_time),
            );
            a.position.x = layout_x(a.comment.mode, stage_width, a.size.width, moved);
            if let Some(raster) = self.glyphs.raster(a.comment.id) {
                self.surface.draw(raster, a.position);
            }
        }
    }

    /// Clears the surface and draws one frame without advancing anything.
    pub(super) fn render_static(&mut self, reading: &ClockReading) {
        self.surface.clear();
        self.render(reading);
    }

    fn phase_begin(&mut self, summary: &mut FrameSummaryBuilder, phase: PhaseKind) {
        let timestamp = self.host.now();
        summary.phase_begin(phase, timestamp);
        let frame_index = self.frame_index;
        self.trace(|t| {
            t.phase_begin(&PhaseBeginEvent {
                frame_index,
                phase,
                timestamp,
            });
        });
    }

    fn phase_end(&mut self, summary: &mut FrameSummaryBuilder, phase: PhaseKind) {
        let timestamp = self.host.now();
        summary.phase_end(phase, timestamp);
        let frame_index = self.frame_index;
        self.trace(|t| {
            t.phase_end(&PhaseEndEvent {
                frame_index,
                phase,
                timestamp,
            });
        });
    }

    #[cfg(feature = "trace-rich")]
    pub(super) fn trace_lanes(&mut self, placed: &[ActiveComment]) {
        use crate::trace::LaneAssignment;

        if self.sink.is_none() || placed.is_empty() {
            return;
        }
        let lanes: Vec<LaneAssignment> = placed
            .iter()
            .map(|a| LaneAssignment {
                comment: a.comment.id,
                mode: a.comment.mode,
                y: a.position.y,
                height: a.size.height,
            })
            .collect();
        let frame_index = self.frame_index;
        self.trace(|t| t.lane_assignments(frame_index, &lanes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrolling_layout() {
        assert_eq!(
            layout_x(Mode::Rightward, 800.0, 100.0, 0.0),
            800.0,
            "rtl enters at the right edge"
        );
        assert_eq!(
            layout_x(Mode::Rightward, 800.0, 100.0, 900.0),
            -100.0,
            "rtl leaves fully past the left edge"
        );
        assert_eq!(
            layout_x(Mode::Leftward, 800.0, 100.0, 0.0),
            -100.0,
            "ltr enters from the left"
        );
        assert_eq!(
            layout_x(Mode::Leftward, 800.0, 100.0, 900.0),
            800.0,
            "ltr leaves past the right edge"
        );
    }

    #[test]
    fn fixed_layout_is_centered() {
        assert_eq!(layout_x(Mode::Top, 800.0, 100.0, 123.0), 350.0, "top");
        assert_eq!(layout_x(Mode::Bottom, 800.0, 100.0, 0.0), 350.0, "bottom");
    }

    #[test]
    fn travelled_spans_stage_plus_block() {
        assert_eq!(
            travelled(800.0, 4.0, 100.0, 4.0),
            900.0,
            "a full duration covers stage width plus block width"
        );
        assert_eq!(travelled(800.0, 4.0, 100.0, 2.0), 450.0, "half way");
    }
}
