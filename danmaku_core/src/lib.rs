// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-synchronized scrolling comment overlay engine.
//!
//! `danmaku_core` keeps a time-sorted buffer of short text comments and, on
//! every display frame, admits the ones that have come due on a media
//! timeline, assigns them non-overlapping horizontal lanes, animates them
//! across (or pins them to) the stage, and retires them once their on-stage
//! duration has elapsed. It is `no_std` compatible (with `alloc`) and talks
//! to the platform only through small traits.
//!
//! # Architecture
//!
//! ```text
//!   FrameScheduler (host)            TimelineBinding (media)
//!       │                                  │
//!       ▼                                  ▼
//!   FrameTick ──► Engine::tick() ◄── ClockReading ◄── HostClock
//!                     │
//!        ┌────────────┼──────────────────────┐
//!        ▼            ▼                      ▼
//!     evict      CommentStore::next_due   GlyphCache::materialize
//!                     │                      │
//!                     ▼                      ▼
//!                 Lanes::allocate ──► RenderSurface::draw
//! ```
//!
//! **[`engine`]**: the orchestrator. Owns the buffer, the active set, the
//! lanes and the glyph cache, and reacts to timeline events (play, pause,
//! seek, rate change).
//!
//! **[`store`]**: time-sorted comment buffer with a read cursor.
//!
//! **[`lane`]**: first-fit vertical lane allocation with one allocator per
//! movement mode.
//!
//! **[`glyph`]**: per-comment measurement and raster cache over a
//! [`RenderSurface`](backend::RenderSurface).
//!
//! **[`clock`]**: host clock and timeline binding seams.
//!
//! **[`scheduler`]**: frame request seam.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types, with
//! the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies.
//! - `trace-rich` (disabled by default, implies `trace`): Adds per-comment
//!   lane assignment events.
//! - `testing` (disabled by default): Exposes the deterministic doubles in
//!   [`testing`].

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod backend;
pub mod clock;
pub mod comment;
pub mod config;
pub mod engine;
pub mod font;
pub mod glyph;
pub mod lane;
pub mod scheduler;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod time;
pub mod trace;
