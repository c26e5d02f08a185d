// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic collaborators for tests and headless runs.
//!
//! Every double is a cheap handle over shared state, so a test can keep one
//! clone while the engine owns another:
//!
//! - [`ManualClock`]: a [`HostClock`] advanced by hand (nanosecond ticks).
//! - [`ManualTimeline`]: a [`TimelineBinding`] with settable position, rate,
//!   pause state and attachment.
//! - [`ManualScheduler`]: a [`FrameScheduler`] that only records requests.
//! - [`RecordingSurface`]: a [`RenderSurface`] that logs every clear and draw.
//!
//! [`Simulation`] wires them to an [`Engine`] and pumps frames.
//!
//! Enabled for unit tests and by the `testing` feature.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use kurbo::{Point, Size};

use crate::backend::RenderSurface;
use crate::clock::{HostClock, TimelineBinding, TimelineEvent};
use crate::comment::{CommentStyle, RawComment};
use crate::config::{EngineConfig, EngineOptions};
use crate::engine::Engine;
use crate::font::{FontMetrics, LineHeightCache};
use crate::scheduler::{FrameScheduler, FrameTick};
use crate::time::{HostTime, Timebase};

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// A host clock that only moves when told to.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    /// Creates a clock reading `secs`.
    #[must_use]
    pub fn new(secs: f64) -> Self {
        Self(Rc::new(Cell::new(
            HostTime::from_secs(secs, Timebase::NANOS).ticks(),
        )))
    }

    /// Jumps to `secs`.
    pub fn set_secs(&self, secs: f64) {
        self.0.set(HostTime::from_secs(secs, Timebase::NANOS).ticks());
    }

    /// Moves forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let step = HostTime::from_secs(secs, Timebase::NANOS).ticks();
        self.0.set(self.0.get().saturating_add(step));
    }
}

impl HostClock for ManualClock {
    fn now(&self) -> HostTime {
        HostTime(self.0.get())
    }

    fn timebase(&self) -> Timebase {
        Timebase::NANOS
    }
}

// ---------------------------------------------------------------------------
// ManualTimeline
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct TimelineState {
    time: f64,
    rate: f64,
    paused: bool,
    attached: bool,
    unsubscribed: u32,
}

/// A media timeline driven by hand.
#[derive(Clone, Debug)]
pub struct ManualTimeline(Rc<RefCell<TimelineState>>);

impl ManualTimeline {
    /// A playing timeline at `time` with rate 1.
    #[must_use]
    pub fn new(time: f64) -> Self {
        Self(Rc::new(RefCell::new(TimelineState {
            time,
            rate: 1.0,
            paused: false,
            attached: true,
            unsubscribed: 0,
        })))
    }

    /// Sets the position.
    pub fn set_time(&self, time: f64) {
        self.0.borrow_mut().time = time;
    }

    /// Advances the position by `host_secs × rate` unless paused.
    pub fn advance(&self, host_secs: f64) {
        let mut s = self.0.borrow_mut();
        if !s.paused {
            s.time += host_secs * s.rate;
        }
    }

    /// Sets the playback rate.
    pub fn set_rate(&self, rate: f64) {
        self.0.borrow_mut().rate = rate;
    }

    /// Pauses or resumes.
    pub fn set_paused(&self, paused: bool) {
        self.0.borrow_mut().paused = paused;
    }

    /// Marks the timeline as gone.
    pub fn detach(&self) {
        self.0.borrow_mut().attached = false;
    }

    /// How many times the engine unsubscribed.
    #[must_use]
    pub fn unsubscribe_count(&self) -> u32 {
        self.0.borrow().unsubscribed
    }
}

impl TimelineBinding for ManualTimeline {
    fn current_time(&self) -> f64 {
        self.0.borrow().time
    }

    fn playback_rate(&self) -> f64 {
        self.0.borrow().rate
    }

    fn is_paused(&self) -> bool {
        self.0.borrow().paused
    }

    fn is_attached(&self) -> bool {
        self.0.borrow().attached
    }

    fn unsubscribe(&mut self) {
        self.0.borrow_mut().unsubscribed += 1;
    }
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SchedulerState {
    pending: Cell<bool>,
    requests: Cell<u32>,
    cancels: Cell<u32>,
}

/// A frame scheduler that records requests instead of acting on them.
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler(Rc<SchedulerState>);

impl ManualScheduler {
    /// Creates a scheduler with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a frame is requested.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.0.pending.get()
    }

    /// Consumes the pending request, returning whether there was one.
    pub fn take_pending(&self) -> bool {
        self.0.pending.replace(false)
    }

    /// Total `request_frame` calls.
    #[must_use]
    pub fn requests(&self) -> u32 {
        self.0.requests.get()
    }

    /// Total `cancel_frame` calls.
    #[must_use]
    pub fn cancels(&self) -> u32 {
        self.0.cancels.get()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) {
        self.0.requests.set(self.0.requests.get() + 1);
        self.0.pending.set(true);
    }

    fn cancel_frame(&mut self) {
        self.0.cancels.set(self.0.cancels.get() + 1);
        self.0.pending.set(false);
    }
}

// ---------------------------------------------------------------------------
// RecordingSurface
// ---------------------------------------------------------------------------

/// Raster handed out by [`RecordingSurface`].
#[derive(Clone, Debug, PartialEq)]
pub struct TestRaster {
    /// Rasterized text.
    pub text: String,
    /// Block size.
    pub size: Size,
}

/// One operation performed on a [`RecordingSurface`].
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceOp {
    /// The stage was cleared.
    Clear,
    /// A block was drawn.
    Draw {
        /// Text of the block.
        text: String,
        /// Top-left corner.
        origin: Point,
        /// Block size.
        size: Size,
    },
}

/// A render surface that measures text as `chars × char_width` by the font's
/// line height and logs what it is asked to draw.
#[derive(Debug)]
pub struct RecordingSurface {
    stage: Size,
    char_width: f64,
    metrics: FontMetrics,
    heights: LineHeightCache,
    measure_fails: bool,
    rasterize_fails: bool,
    ops: Vec<SurfaceOp>,
    measure_calls: u32,
    rasterize_calls: u32,
    live: usize,
}

impl RecordingSurface {
    /// Width of one character in pixels.
    pub const DEFAULT_CHAR_WIDTH: f64 = 10.0;

    /// Creates a surface with the given stage size.
    #[must_use]
    pub fn new(stage: Size) -> Self {
        Self {
            stage,
            char_width: Self::DEFAULT_CHAR_WIDTH,
            metrics: FontMetrics::default(),
            heights: LineHeightCache::new(),
            measure_fails: false,
            rasterize_fails: false,
            ops: Vec::new(),
            measure_calls: 0,
            rasterize_calls: 0,
            live: 0,
        }
    }

    /// Changes the stage size reported from now on.
    pub fn set_stage(&mut self, stage: Size) {
        self.stage = stage;
    }

    /// Makes every measurement fail (or succeed again).
    pub fn set_measure_fails(&mut self, fails: bool) {
        self.measure_fails = fails;
    }

    /// Makes every rasterization fail (or succeed again).
    pub fn set_rasterize_fails(&mut self, fails: bool) {
        self.rasterize_fails = fails;
    }

    /// Every operation so far.
    #[must_use]
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Forgets the operation log.
    pub fn clear_log(&mut self) {
        self.ops.clear();
    }

    /// Number of clears in the log.
    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == SurfaceOp::Clear).count()
    }

    /// Draws since the most recent clear, as `(text, origin)`.
    #[must_use]
    pub fn last_frame(&self) -> Vec<(String, Point)> {
        let start = self
            .ops
            .iter()
            .rposition(|op| *op == SurfaceOp::Clear)
            .map_or(0, |i| i + 1);
        self.ops[start..]
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Draw { text, origin, .. } => Some((text.clone(), *origin)),
                SurfaceOp::Clear => None,
            })
            .collect()
    }

    /// Number of `measure` calls.
    #[must_use]
    pub fn measure_calls(&self) -> u32 {
        self.measure_calls
    }

    /// Number of `rasterize` calls.
    #[must_use]
    pub fn rasterize_calls(&self) -> u32 {
        self.rasterize_calls
    }

    /// Rasters created and not yet released.
    #[must_use]
    pub fn live_rasters(&self) -> usize {
        self.live
    }
}

impl RenderSurface for RecordingSurface {
    type Raster = TestRaster;

    fn stage_size(&mut self) -> Size {
        self.stage
    }

    fn measure(&mut self, text: &str, style: &CommentStyle) -> Option<Size> {
        self.measure_calls += 1;
        if self.measure_fails {
            return None;
        }
        let width = text.chars().count() as f64 * self.char_width;
        Some(Size::new(
            width,
            self.heights.line_height(&style.font, self.metrics),
        ))
    }

    fn rasterize(&mut self, text: &str, _style: &CommentStyle, size: Size) -> Option<TestRaster> {
        self.rasterize_calls += 1;
        if self.rasterize_fails {
            return None;
        }
        self.live += 1;
        Some(TestRaster {
            text: String::from(text),
            size,
        })
    }

    fn draw(&mut self, raster: &TestRaster, origin: Point) {
        self.ops.push(SurfaceOp::Draw {
            text: raster.text.clone(),
            origin,
            size: raster.size,
        });
    }

    fn clear(&mut self) {
        self.ops.push(SurfaceOp::Clear);
    }

    fn release(&mut self, raster: TestRaster) {
        drop(raster);
        self.live = self.live.saturating_sub(1);
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// An engine on a [`RecordingSurface`] driven by manual doubles.
#[derive(Debug)]
pub struct Simulation {
    /// The engine under test.
    pub engine: Engine<RecordingSurface>,
    /// Host clock handle.
    pub clock: ManualClock,
    /// Timeline handle, if bound.
    pub timeline: Option<ManualTimeline>,
    /// Scheduler handle.
    pub scheduler: ManualScheduler,
    frame_index: u64,
}

impl Simulation {
    /// Host time every simulation starts at, in seconds.
    pub const START_SECS: f64 = 100.0;

    /// An engine bound to a timeline at `media_time`.
    #[must_use]
    pub fn bound(
        config: EngineConfig,
        comments: Vec<RawComment>,
        stage: Size,
        media_time: f64,
        paused: bool,
    ) -> Self {
        let timeline = ManualTimeline::new(media_time);
        timeline.set_paused(paused);
        Self::build(config, comments, stage, Some(timeline))
    }

    /// An engine running on the host clock alone.
    #[must_use]
    pub fn unbound(config: EngineConfig, comments: Vec<RawComment>, stage: Size) -> Self {
        Self::build(config, comments, stage, None)
    }

    fn build(
        config: EngineConfig,
        comments: Vec<RawComment>,
        stage: Size,
        timeline: Option<ManualTimeline>,
    ) -> Self {
        let clock = ManualClock::new(Self::START_SECS);
        let scheduler = ManualScheduler::new();
        let options = EngineOptions {
            config,
            comments,
            binding: timeline
                .clone()
                .map(|t| Box::new(t) as Box<dyn TimelineBinding>),
        };
        let engine = Engine::new(
            options,
            RecordingSurface::new(stage),
            Box::new(scheduler.clone()),
            Box::new(clock.clone()),
        );
        Self {
            engine,
            clock,
            timeline,
            scheduler,
            frame_index: 0,
        }
    }

    /// Current host time in seconds.
    #[must_use]
    pub fn now_secs(&self) -> f64 {
        self.clock.now_secs()
    }

    /// Advances host time (and a playing timeline) by `secs`, then delivers
    /// a frame if one was requested. Returns whether a frame was delivered.
    pub fn step(&mut self, secs: f64) -> bool {
        self.clock.advance(secs);
        if let Some(t) = &self.timeline {
            t.advance(secs);
        }
        self.deliver()
    }

    /// Delivers a pending frame without moving time.
    pub fn deliver(&mut self) -> bool {
        if !self.scheduler.take_pending() {
            return false;
        }
        let tick = FrameTick {
            now: self.clock.now(),
            frame_index: self.frame_index,
        };
        self.frame_index += 1;
        self.engine.tick(tick);
        true
    }

    /// Delivers a tick whether or not one was requested.
    pub fn force_tick(&mut self) {
        let tick = FrameTick {
            now: self.clock.now(),
            frame_index: self.frame_index,
        };
        self.frame_index += 1;
        self.engine.tick(tick);
    }

    /// Runs `frames` steps of `secs` each.
    pub fn run(&mut self, frames: usize, secs: f64) {
        for _ in 0..frames {
            self.step(secs);
        }
    }

    /// Moves the timeline to `time` and reports the seek.
    pub fn seek(&mut self, time: f64) {
        if let Some(t) = &self.timeline {
            t.set_time(time);
        }
        self.engine.handle_event(TimelineEvent::Seeking);
    }

    /// Pauses the timeline and reports it.
    pub fn pause(&mut self) {
        if let Some(t) = &self.timeline {
            t.set_paused(true);
        }
        self.engine.handle_event(TimelineEvent::Pause);
    }

    /// Resumes the timeline and reports it.
    pub fn play(&mut self) {
        if let Some(t) = &self.timeline {
            t.set_paused(false);
        }
        self.engine.handle_event(TimelineEvent::Play);
    }

    /// Changes the timeline rate and reports it.
    pub fn set_rate(&mut self, rate: f64) {
        if let Some(t) = &self.timeline {
            t.set_rate(rate);
        }
        self.engine.handle_event(TimelineEvent::RateChange);
    }
}
