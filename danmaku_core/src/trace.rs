// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the engine.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! engine calls at each stage of a frame and on every external event. All
//! method bodies default to no-ops, so implementing only the events you care
//! about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`FrameSummaryBuilder`] collects phase timestamps and counters during a
//! frame and produces a [`FrameSummary`] at the end.
//!
//! [`SharedSink`] lets a caller keep a handle on a sink the engine owns.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates per-comment [`LaneAssignment`]
//!   events and the corresponding `TraceSink` method.

use alloc::rc::Rc;
use core::cell::{Ref, RefCell, RefMut};

#[cfg(feature = "trace-rich")]
use crate::comment::{CommentId, Mode};
use crate::scheduler::FrameTick;
use crate::time::HostTime;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a frame is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Dropping comments whose on-stage time is over.
    Evict,
    /// Pulling due comments from the buffer and assigning lanes.
    Admit,
    /// Laying out and drawing active comments.
    Render,
}

/// A lifecycle transition of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    /// The frame loop started.
    Play,
    /// The frame loop stopped.
    Pause,
    /// The overlay became visible.
    Show,
    /// The overlay was hidden.
    Hide,
    /// Stage size or duration changed.
    Resize,
    /// A timeline was bound.
    Bind,
    /// The timeline was unbound on request.
    Unbind,
    /// The timeline disappeared; the engine now runs on the host clock.
    BindingLost,
    /// The engine was torn down.
    Destroy,
}

/// Why an input was ignored or defaulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// A comment without text was dropped.
    MalformedComment,
    /// A non-finite or non-positive speed was ignored.
    InvalidSpeed,
    /// Text could not be measured; a 1 px box was used.
    MeasureFailed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted at the start of every executed frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTickEvent {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Host time of the frame.
    pub now: HostTime,
    /// Timeline position in seconds.
    pub media_time: f64,
    /// Playback rate in effect.
    pub playback_rate: f64,
}

impl FrameTickEvent {
    /// Creates an event for `tick` at the given timeline state.
    #[must_use]
    pub fn new(tick: &FrameTick, media_time: f64, playback_rate: f64) -> Self {
        Self {
            frame_index: tick.frame_index,
            now: tick.now,
            media_time,
            playback_rate,
        }
    }
}

/// Marks the beginning of a frame phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a frame phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted after a seek has repositioned the cursor and restored comments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekEvent {
    /// Host time of the seek.
    pub at: HostTime,
    /// New timeline position in seconds.
    pub target: f64,
    /// Buffer cursor after the seek.
    pub cursor: usize,
    /// Comments restored onto the stage.
    pub restored: usize,
    /// Whether a static frame was drawn.
    pub static_frame: bool,
}

/// Emitted when the playback rate changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateChangeEvent {
    /// Host time of the change.
    pub at: HostTime,
    /// Rate before the change.
    pub old_rate: f64,
    /// Rate after the change.
    pub new_rate: f64,
    /// Active comments whose reference time was adjusted.
    pub compensated: usize,
}

/// Emitted after the comment set was replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplaceEvent {
    /// Host time of the replacement.
    pub at: HostTime,
    /// Comments now buffered.
    pub buffered: usize,
    /// Inputs dropped as malformed.
    pub dropped: usize,
    /// Comments placed on stage immediately.
    pub admitted: usize,
    /// Whether the frame loop kept running.
    pub running: bool,
}

/// Emitted on a lifecycle transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Host time of the transition.
    pub at: HostTime,
    /// What happened.
    pub kind: LifecycleKind,
}

/// Emitted when input is ignored or defaulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RejectionEvent {
    /// Host time of the rejection.
    pub at: HostTime,
    /// What was wrong.
    pub reason: Rejection,
}

/// Per-frame summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Host time of the frame.
    pub now: HostTime,
    /// Timeline position in seconds.
    pub media_time: f64,
    /// Active comments after the frame.
    pub active: u32,
    /// Comments admitted this frame.
    pub admitted: u32,
    /// Comments evicted this frame.
    pub evicted: u32,
    /// Due comments skipped as already stale.
    pub skipped: u32,
    /// Evict phase duration in ticks (0 if not measured).
    pub evict_ticks: u64,
    /// Admit phase duration in ticks (0 if not measured).
    pub admit_ticks: u64,
    /// Render phase duration in ticks (0 if not measured).
    pub render_ticks: u64,
}

/// A lane handed to one comment.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneAssignment {
    /// The comment.
    pub comment: CommentId,
    /// Its mode.
    pub mode: Mode,
    /// Top y coordinate of the lane.
    pub y: f64,
    /// Block height.
    pub height: f64,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the engine.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the start of an executed frame.
    fn on_frame_tick(&mut self, e: &FrameTickEvent) {
        _ = e;
    }

    /// Called at the beginning of a frame phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a frame phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after a seek.
    fn on_seek(&mut self, e: &SeekEvent) {
        _ = e;
    }

    /// Called after a playback rate change.
    fn on_rate_change(&mut self, e: &RateChangeEvent) {
        _ = e;
    }

    /// Called after the comment set was replaced.
    fn on_replace(&mut self, e: &ReplaceEvent) {
        _ = e;
    }

    /// Called on lifecycle transitions.
    fn on_lifecycle(&mut self, e: &LifecycleEvent) {
        _ = e;
    }

    /// Called when input is ignored or defaulted.
    fn on_rejection(&mut self, e: &RejectionEvent) {
        _ = e;
    }

    /// Called with a per-frame summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called with the lanes assigned in one batch (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_lane_assignments(&mut self, frame_index: u64, lanes: &[LaneAssignment]) {
        _ = (frame_index, lanes);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// SharedSink
// ---------------------------------------------------------------------------

/// A reference-counted sink handle.
///
/// Give one clone to the engine and keep another to inspect the sink.
#[derive(Debug, Default)]
pub struct SharedSink<T>(Rc<RefCell<T>>);

impl<T> Clone for SharedSink<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> SharedSink<T> {
    /// Wraps `sink`.
    #[must_use]
    pub fn new(sink: T) -> Self {
        Self(Rc::new(RefCell::new(sink)))
    }

    /// Borrows the sink.
    ///
    /// # Panics
    ///
    /// Panics if the sink is currently receiving an event.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutably borrows the sink.
    ///
    /// # Panics
    ///
    /// Panics if the sink is currently receiving an event.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }
}

impl<T: TraceSink> TraceSink for SharedSink<T> {
    fn on_frame_tick(&mut self, e: &FrameTickEvent) {
        self.0.borrow_mut().on_frame_tick(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.0.borrow_mut().on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.0.borrow_mut().on_phase_end(e);
    }

    fn on_seek(&mut self, e: &SeekEvent) {
        self.0.borrow_mut().on_seek(e);
    }

    fn on_rate_change(&mut self, e: &RateChangeEvent) {
        self.0.borrow_mut().on_rate_change(e);
    }

    fn on_replace(&mut self, e: &ReplaceEvent) {
        self.0.borrow_mut().on_replace(e);
    }

    fn on_lifecycle(&mut self, e: &LifecycleEvent) {
        self.0.borrow_mut().on_lifecycle(e);
    }

    fn on_rejection(&mut self, e: &RejectionEvent) {
        self.0.borrow_mut().on_rejection(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.0.borrow_mut().on_frame_summary(s);
    }

    #[cfg(feature = "trace-rich")]
    fn on_lane_assignments(&mut self, frame_index: u64, lanes: &[LaneAssignment]) {
        self.0.borrow_mut().on_lane_assignments(frame_index, lanes);
    }
}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

/// Generates `Tracer` methods that forward one event to the sink.
macro_rules! forward {
    ($(#[$doc:meta] $name:ident => $hook:ident($ty:ty);)*) => {
        $(
            #[$doc]
            #[inline]
            pub fn $name(&mut self, e: &$ty) {
                #[cfg(feature = "trace")]
                if let Some(s) = &mut self.sink {
                    s.$hook(e);
                }
                #[cfg(not(feature = "trace"))]
                {
                    _ = e;
                }
            }
        )*
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    forward! {
        /// Emits a [`FrameTickEvent`].
        frame_tick => on_frame_tick(FrameTickEvent);
        /// Emits a [`PhaseBeginEvent`].
        phase_begin => on_phase_begin(PhaseBeginEvent);
        /// Emits a [`PhaseEndEvent`].
        phase_end => on_phase_end(PhaseEndEvent);
        /// Emits a [`SeekEvent`].
        seek => on_seek(SeekEvent);
        /// Emits a [`RateChangeEvent`].
        rate_change => on_rate_change(RateChangeEvent);
        /// Emits a [`ReplaceEvent`].
        replace => on_replace(ReplaceEvent);
        /// Emits a [`LifecycleEvent`].
        lifecycle => on_lifecycle(LifecycleEvent);
        /// Emits a [`RejectionEvent`].
        rejection => on_rejection(RejectionEvent);
        /// Emits a [`FrameSummary`].
        frame_summary => on_frame_summary(FrameSummary);
    }

    /// Emits lane assignments (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn lane_assignments(&mut self, frame_index: u64, lanes: &[LaneAssignment]) {
        if let Some(s) = &mut self.sink {
            s.on_lane_assignments(frame_index, lanes);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps and counters during a frame and produces a
/// [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    tick: FrameTickEvent,
    phase_starts: [Option<HostTime>; 3],
    phase_ends: [Option<HostTime>; 3],
    admitted: u32,
    evicted: u32,
    skipped: u32,
    active: u32,
}

impl FrameSummaryBuilder {
    /// Starts building a summary for the given tick.
    #[must_use]
    pub fn new(tick: &FrameTickEvent) -> Self {
        Self {
            tick: *tick,
            phase_starts: [None; 3],
            phase_ends: [None; 3],
            admitted: 0,
            evicted: 0,
            skipped: 0,
            active: 0,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Records the frame's comment counters.
    pub fn set_counts(&mut self, admitted: usize, evicted: usize, skipped: usize, active: usize) {
        self.admitted = saturate(admitted);
        self.evicted = saturate(evicted);
        self.skipped = saturate(skipped);
        self.active = saturate(active);
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.tick.frame_index,
            now: self.tick.now,
            media_time: self.tick.media_time,
            active: self.active,
            admitted: self.admitted,
            evicted: self.evicted,
            skipped: self.skipped,
            evict_ticks: self.phase_duration(PhaseKind::Evict),
            admit_ticks: self.phase_duration(PhaseKind::Admit),
            render_ticks: self.phase_duration(PhaseKind::Render),
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_ticks_since(start),
            _ => 0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Evict => 0,
        PhaseKind::Admit => 1,
        PhaseKind::Render => 2,
    }
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tick() -> FrameTickEvent {
        FrameTickEvent {
            frame_index: 42,
            now: HostTime(1_000_000),
            media_time: 12.5,
            playback_rate: 1.0,
        }
    }

    #[test]
    fn frame_tick_event_from_frame_tick() {
        let tick = FrameTick {
            now: HostTime(100),
            frame_index: 7,
        };
        let evt = FrameTickEvent::new(&tick, 3.0, 1.5);
        assert_eq!(evt.frame_index, 7);
        assert_eq!(evt.now, HostTime(100));
        assert_eq!(evt.media_time, 3.0);
        assert_eq!(evt.playback_rate, 1.5);
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_frame_tick(&sample_tick());
        sink.on_lifecycle(&LifecycleEvent {
            at: HostTime(0),
            kind: LifecycleKind::Play,
        });
        sink.on_frame_summary(&FrameSummaryBuilder::new(&sample_tick()).finish());
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.frame_tick(&sample_tick());
        tracer.rejection(&RejectionEvent {
            at: HostTime(0),
            reason: Rejection::InvalidSpeed,
        });
    }

    #[test]
    fn summary_builder_computes_durations() {
        let mut builder = FrameSummaryBuilder::new(&sample_tick());
        builder.phase_begin(PhaseKind::Evict, HostTime(1_000_000));
        builder.phase_end(PhaseKind::Evict, HostTime(1_000_100));
        builder.phase_begin(PhaseKind::Admit, HostTime(1_000_100));
        builder.phase_end(PhaseKind::Admit, HostTime(1_000_500));
        builder.phase_begin(PhaseKind::Render, HostTime(1_000_500));
        builder.phase_end(PhaseKind::Render, HostTime(1_002_000));
        builder.set_counts(3, 1, 2, 9);

        let summary = builder.finish();
        assert_eq!(summary.evict_ticks, 100);
        assert_eq!(summary.admit_ticks, 400);
        assert_eq!(summary.render_ticks, 1500);
        assert_eq!(summary.admitted, 3);
        assert_eq!(summary.evicted, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.active, 9);
        assert_eq!(summary.frame_index, 42);
        assert_eq!(summary.media_time, 12.5);
    }

    #[test]
    fn summary_builder_missing_phases_are_zero() {
        let summary = FrameSummaryBuilder::new(&sample_tick()).finish();
        assert_eq!(summary.evict_ticks, 0);
        assert_eq!(summary.admit_ticks, 0);
        assert_eq!(summary.render_ticks, 0);
    }

    #[test]
    fn shared_sink_is_observable() {
        #[derive(Default)]
        struct Count(u32);
        impl TraceSink for Count {
            fn on_lifecycle(&mut self, _e: &LifecycleEvent) {
                self.0 += 1;
            }
        }

        let shared = SharedSink::new(Count::default());
        let mut handle = shared.clone();
        handle.on_lifecycle(&LifecycleEvent {
            at: HostTime(1),
            kind: LifecycleKind::Show,
        });
        assert_eq!(shared.borrow().0, 1, "event reached the shared sink");
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            ticks: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_frame_tick(&mut self, e: &FrameTickEvent) {
                self.ticks.push(e.frame_index);
            }
        }

        let mut sink = RecordingSink { ticks: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.frame_tick(&sample_tick());
        drop(tracer);
        assert_eq!(sink.ticks, &[42]);
    }
}
