// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The overlay engine.
//!
//! [`Engine`] owns the comment buffer, the active set, the per-mode lanes and
//! the glyph cache. The host drives it from two directions:
//!
//! - frame callbacks, delivered through [`Engine::tick`] after the engine
//!   asked its [`FrameScheduler`] for a frame;
//! - timeline events, delivered through [`Engine::handle_event`].
//!
//! Every operation is a no-op once [`Engine::destroy`] has run.

mod frame;
mod timeline;


use alloc::boxed::Box;
use alloc::vec::Vec;

use kurbo::{Point, Rect, Size};

use crate::backend::RenderSurface;
use crate::clock::{ClockReading, HostClock, TimelineBinding, TimelineEvent};
use crate::comment::{Comment, CommentId, RawComment};
use crate::config::{DEFAULT_DURATION, EngineConfig, EngineOptions, is_valid_speed};
use crate::glyph::GlyphCache;
use crate::lane::Lanes;
use crate::scheduler::FrameScheduler;
use crate::store::CommentStore;
use crate::time::HostTime;
use crate::trace::{
    LifecycleEvent, LifecycleKind, Rejection, RejectionEvent, TraceSink, Tracer,
};

pub use frame::layout_x;

/// A comment currently on stage.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveComment {
    /// The buffered comment.
    pub comment: Comment,
    /// Block size, padding included.
    pub size: Size,
    /// Host seconds against which elapsed on-stage time is measured.
    pub reference_time: f64,
    /// Top-left corner as of the last layout. `y` is fixed at admission.
    pub position: Point,
}

impl ActiveComment {
    /// The block's rectangle as of the last layout.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }
}

/// Options for [`Engine::replace_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaceOptions {
    /// Keep the engine's running or paused state. When `false` the state is
    /// re-derived from the timeline.
    pub preserve_state: bool,
}

/// Scrolling comment overlay over a [`RenderSurface`].
pub struct Engine<S: RenderSurface> {
    surface: S,
    glyphs: GlyphCache<S::Raster>,
    scheduler: Box<dyn FrameScheduler>,
    host: Box<dyn HostClock>,
    binding: Option<Box<dyn TimelineBinding>>,
    sink: Option<Box<dyn TraceSink>>,
    config: EngineConfig,
    store: CommentStore,
    active: Vec<ActiveComment>,
    lanes: Lanes,
    stage: Size,
    speed: f64,
    duration: f64,
    last_rate: f64,
    paused: bool,
    /// Host seconds of the last pause while unbound.
    paused_at: Option<f64>,
    visible: bool,
    destroyed: bool,
    next_id: u64,
    frame_index: u64,
}

impl<S: RenderSurface> core::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("buffered", &self.store.len())
            .field("cursor", &self.store.cursor())
            .field("active", &self.active.len())
            .field("stage", &self.stage)
            .field("speed", &self.speed)
            .field("duration", &self.duration)
            .field("last_rate", &self.last_rate)
            .field("paused", &self.paused)
            .field("visible", &self.visible)
            .field("destroyed", &self.destroyed)
            .field("bound", &self.binding.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: RenderSurface> Engine<S> {
    /// Creates an engine.
    ///
    /// Invalid configuration values fall back to their defaults. When no
    /// timeline is bound, or the bound timeline is playing, the engine seeks
    /// to the current position and starts its frame loop right away.
    pub fn new(
        options: EngineOptions,
        surface: S,
        scheduler: Box<dyn FrameScheduler>,
        host: Box<dyn HostClock>,
    ) -> Self {
        let EngineOptions {
            config,
            comments,
            binding,
        } = options;
        let config = config.validated();
        let mut engine = Self {
            surface,
            glyphs: GlyphCache::new(),
            scheduler,
            host,
            binding,
            sink: None,
            config,
            store: CommentStore::new(),
            active: Vec::new(),
            lanes: Lanes::new(),
            stage: Size::ZERO,
            speed: config.speed,
            duration: DEFAULT_DURATION,
            last_rate: 1.0,
            paused: true,
            paused_at: None,
            visible: true,
            destroyed: false,
            next_id: 0,
            frame_index: 0,
        };
        engine.resize();

        let reading = engine.read_clock();
        engine.last_rate = reading.playback_rate;
        let (comments, _) = engine.normalize_batch(comments, reading.current_time);
        engine.store.replace_all(comments, f64::NEG_INFINITY);

        let media_paused = engine.binding.as_ref().is_some_and(|b| b.is_paused());
        if !media_paused {
            engine.seek();
            engine.play();
        }
        engine
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Comments on stage, in draw order.
    #[must_use]
    pub fn active(&self) -> &[ActiveComment] {
        &self.active
    }

    /// Every buffered comment, sorted by time.
    #[must_use]
    pub fn buffer(&self) -> &[Comment] {
        self.store.comments()
    }

    /// Index of the next comment to consider for admission.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.store.cursor()
    }

    /// Seconds a comment stays on stage.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Scroll speed in pixels per second.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Stage size as of the last [`resize`](Self::resize).
    #[must_use]
    pub fn stage(&self) -> Size {
        self.stage
    }

    /// Whether the frame loop is stopped.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether comments are shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether [`destroy`](Self::destroy) has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Whether a timeline is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lane state of every mode.
    #[must_use]
    pub fn lanes(&self) -> &Lanes {
        &self.lanes
    }

    /// The render surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The render surface, mutably.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Installs a trace sink, returning the previous one.
    pub fn set_trace_sink(
        &mut self,
        sink: Option<Box<dyn TraceSink>>,
    ) -> Option<Box<dyn TraceSink>> {
        core::mem::replace(&mut self.sink, sink)
    }

    // -----------------------------------------------------------------------
    // Producer operations
    // -----------------------------------------------------------------------

    /// Buffers one comment. Returns `false` if it was malformed.
    ///
    /// While bound, a comment without a time is stamped with the current
    /// timeline position. While unbound every comment is stamped with the
    /// current host time.
    pub fn emit(&mut self, raw: RawComment) -> bool {
        if self.destroyed {
            return false;
        }
        let reading = self.read_clock();
        let id = self.allocate_id();
        let Some(mut comment) = Comment::normalize(raw, id, reading.current_time) else {
            self.reject(Rejection::MalformedComment);
            return false;
        };
        if !reading.bound {
            comment.time = reading.now;
        }
        self.store.insert(comment);
        true
    }

    /// Sets the scroll speed and returns the speed in effect.
    ///
    /// Non-positive or non-finite values are ignored.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        if self.destroyed {
            return self.speed;
        }
        if !is_valid_speed(speed) {
            self.reject(Rejection::InvalidSpeed);
            return self.speed;
        }
        self.speed = speed;
        if self.stage.width > 0.0 {
            self.duration = self.stage.width / speed;
        }
        self.speed
    }

    /// Re-reads the stage size and recomputes the on-stage duration.
    ///
    /// A stage without width keeps the previous duration. Comments already
    /// on stage are not repositioned.
    pub fn resize(&mut self) {
        if self.destroyed {
            return;
        }
        self.stage = self.surface.stage_size();
        if self.stage.width > 0.0 {
            self.duration = self.stage.width / self.speed;
        }
        self.lifecycle(LifecycleKind::Resize);
    }

    // -----------------------------------------------------------------------
    // Visibility and playback
    // -----------------------------------------------------------------------

    /// Shows comments again after [`hide`](Self::hide).
    ///
    /// Restores what would be on stage at the current position and resumes
    /// unless the timeline is paused.
    pub fn show(&mut self) {
        if self.destroyed || self.visible {
            return;
        }
        self.visible = true;
        self.lifecycle(LifecycleKind::Show);
        self.seek();
        let media_paused = self.binding.as_ref().is_some_and(|b| b.is_paused());
        if !media_paused {
            self.play();
        }
    }

    /// Stops the frame loop and clears the stage until [`show`](Self::show).
    pub fn hide(&mut self) {
        if self.destroyed || !self.visible {
            return;
        }
        self.pause();
        self.clear();
        self.visible = false;
        self.lifecycle(LifecycleKind::Hide);
    }

    /// Starts the frame loop.
    ///
    /// Active comments are re-anchored so that they continue from where
    /// they were when playback stopped.
    pub fn play(&mut self) {
        if self.destroyed || !self.visible || !self.paused {
            return;
        }
        let reading = self.read_clock();
        if reading.bound {
            for a in &mut self.active {
                a.reference_time = reading.reference_for(a.comment.time);
            }
            self.last_rate = reading.playback_rate;
        } else if let Some(at) = self.paused_at {
            let stalled = reading.now - at;
            for a in &mut self.active {
                a.reference_time += stalled;
            }
        }
        self.paused_at = None;
        self.paused = false;
        self.scheduler.request_frame();
        self.lifecycle(LifecycleKind::Play);
    }

    /// Stops the frame loop, leaving the last frame on the surface.
    pub fn pause(&mut self) {
        if self.destroyed || !self.visible || self.paused {
            return;
        }
        self.paused = true;
        if self.binding.is_none() {
            self.paused_at = Some(self.host.now_secs());
        }
        self.scheduler.cancel_frame();
        self.lifecycle(LifecycleKind::Pause);
    }

    /// Dispatches a timeline event.
    pub fn handle_event(&mut self, event: TimelineEvent) {
        match event {
            TimelineEvent::Play => self.play(),
            TimelineEvent::Pause => self.pause(),
            TimelineEvent::Seeking => self.seek(),
            TimelineEvent::RateChange => self.rate_change(),
        }
    }

    /// Removes every active comment without touching the buffer.
    pub fn clear(&mut self) {
        if self.destroyed {
            return;
        }
        self.release_active();
        self.surface.clear();
    }

    /// Top-most active comment containing `point`, as of the last layout.
    #[must_use]
    pub fn hit_test(&self, point: Point) -> Option<&ActiveComment> {
        self.active.iter().rev().find(|a| a.bounds().contains(point))
    }

    /// Tears the engine down.
    ///
    /// Cancels the frame loop, releases every raster, clears the surface and
    /// unsubscribes from the timeline. Every later call is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.scheduler.cancel_frame();
        self.paused = true;
        self.release_active();
        self.glyphs.release_all(&mut self.surface);
        self.glyphs.forget_sizes();
        self.surface.clear();
        self.store.clear();
        self.lanes.reset();
        if let Some(mut binding) = self.binding.take() {
            binding.unsubscribe();
        }
        self.lifecycle(LifecycleKind::Destroy);
        self.destroyed = true;
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn read_clock(&self) -> ClockReading {
        self.read_clock_at(self.host.now())
    }

    fn read_clock_at(&self, at: HostTime) -> ClockReading {
        ClockReading::read(at, self.host.timebase(), self.binding.as_deref())
    }

    fn allocate_id(&mut self) -> CommentId {
        let id = CommentId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Normalizes a batch, returning the comments and the number dropped.
    fn normalize_batch(
        &mut self,
        raws: Vec<RawComment>,
        default_time: f64,
    ) -> (Vec<Comment>, usize) {
        let mut comments = Vec::with_capacity(raws.len());
        let mut dropped = 0;
        for raw in raws {
            let id = self.allocate_id();
            match Comment::normalize(raw, id, default_time) {
                Some(c) => comments.push(c),
                None => dropped += 1,
            }
        }
        for _ in 0..dropped {
            self.reject(Rejection::MalformedComment);
        }
        (comments, dropped)
    }

    fn release_active(&mut self) {
        for a in self.active.drain(..) {
            self.glyphs.release(&mut self.surface, a.comment.id);
        }
    }

    fn trace(&mut self, f: impl FnOnce(&mut Tracer<'_>)) {
        if let Some(sink) = self.sink.as_deref_mut() {
            f(&mut Tracer::new(sink));
        }
    }

    fn lifecycle(&mut self, kind: LifecycleKind) {
        let at = self.host.now();
        self.trace(|t| t.lifecycle(&LifecycleEvent { at, kind }));
    }

    fn reject(&mut self, reason: Rejection) {
        let at = self.host.now();
        self.trace(|t| t.rejection(&RejectionEvent { at, reason }));
    }
}

impl<S: RenderSurface> Drop for Engine<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}
