// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for platform integrations.
//!
//! The engine splits platform-specific work into *backend* crates. Each
//! backend provides the following pieces:
//!
//! - **Frame source**: delivers [`FrameTick`]s by calling
//!   [`Engine::tick`](crate::engine::Engine::tick) and implements
//!   [`FrameScheduler`](crate::scheduler::FrameScheduler) so the engine can
//!   request and cancel frames.
//!
//! - **Time**: a [`HostClock`](crate::clock::HostClock) reading the
//!   platform's monotonic clock, plus `now()`/`timebase()` free functions.
//!
//! - **Timeline**: a [`TimelineBinding`](crate::clock::TimelineBinding) for
//!   the media element the overlay follows, and a way to forward its events
//!   as [`TimelineEvent`](crate::clock::TimelineEvent)s.
//!
//! - **Surface**: implements [`RenderSurface`] to measure, rasterize and draw
//!   text blocks.
//!
//! # Crate boundaries
//!
//! `danmaku_core` owns the data model, lane allocation, scheduling and this
//! contract module. Backend crates depend on `danmaku_core` and provide
//! platform glue.
//!
//! [`FrameTick`]: crate::scheduler::FrameTick

use kurbo::{Point, Size};

use crate::comment::CommentStyle;

/// Measures, rasterizes and draws comment text.
///
/// Rasters are opaque to the engine. It creates one per admitted comment,
/// draws it every frame while the comment is on stage, and hands it back
/// through [`release`](Self::release) when the comment leaves.
///
/// # Frame pseudocode
///
/// ```rust,ignore
/// surface.clear();
/// for comment in active {
///     surface.draw(&raster_of(comment), comment.position);
/// }
/// ```
pub trait RenderSurface {
    /// Backend-specific rasterized text block.
    type Raster;

    /// Current stage size in logical pixels.
    fn stage_size(&mut self) -> Size;

    /// Measures the unpadded text box. `None` reports a measurement failure.
    fn measure(&mut self, text: &str, style: &CommentStyle) -> Option<Size>;

    /// Rasterizes `text` into a block of exactly `size` (stroke padding
    /// included). `None` means the block could not be created; the comment
    /// then keeps its lane but is not drawn.
    fn rasterize(&mut self, text: &str, style: &CommentStyle, size: Size) -> Option<Self::Raster>;

    /// Draws a block with its top-left corner at `origin`.
    fn draw(&mut self, raster: &Self::Raster, origin: Point);

    /// Clears the whole stage.
    fn clear(&mut self);

    /// Frees a block that is no longer on stage.
    fn release(&mut self, raster: Self::Raster) {
        drop(raster);
    }
}
