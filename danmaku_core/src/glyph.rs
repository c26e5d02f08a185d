// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text block sizing and raster lifetime.
//!
//! [`block_size`] pads a measured text box for its stroke. [`GlyphCache`]
//! remembers each comment's block size for as long as the comment is
//! buffered (a comment admitted again after a seek is not measured twice)
//! and owns each comment's raster while the comment is on stage.

use alloc::collections::BTreeMap;

use kurbo::Size;

#[cfg(not(any(test, feature = "std")))]
use kurbo::common::FloatFuncs as _;

use crate::backend::RenderSurface;
use crate::comment::{Comment, CommentId, CommentStyle};

/// Box used when a surface cannot measure text.
pub const FALLBACK_TEXT_SIZE: Size = Size::new(1.0, 1.0);

/// Pads a measured text box into a block size.
///
/// Width is rounded up and never below 1 px; height is rounded up. Both get
/// the stroke padding on each side. A missing or degenerate measurement
/// falls back to [`FALLBACK_TEXT_SIZE`].
#[must_use]
pub fn block_size(measured: Option<Size>, style: &CommentStyle) -> Size {
    let text = measured
        .filter(|s| s.is_finite() && s.width >= 0.0 && s.height > 0.0)
        .unwrap_or(FALLBACK_TEXT_SIZE);
    let pad = style.stroke_padding() * 2.0;
    Size::new(text.width.ceil().max(1.0) + pad, text.height.ceil() + pad)
}

/// Outcome of [`GlyphCache::materialize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Materialized {
    /// Whether the surface failed to measure the text.
    pub measure_failed: bool,
    /// Whether a raster now exists for the comment.
    pub rasterized: bool,
}

/// Per-comment block sizes and rasters.
pub struct GlyphCache<R> {
    sizes: BTreeMap<CommentId, Size>,
    rasters: BTreeMap<CommentId, R>,
}

impl<R> core::fmt::Debug for GlyphCache<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GlyphCache")
            .field("sizes", &self.sizes.len())
            .field("rasters", &self.rasters.len())
            .finish()
    }
}

impl<R> Default for GlyphCache<R> {
    fn default() -> Self {
        Self {
            sizes: BTreeMap::new(),
            rasters: BTreeMap::new(),
        }
    }
}

impl<R> GlyphCache<R> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached block size of a comment, if it was ever materialized.
    #[must_use]
    pub fn size(&self, id: CommentId) -> Option<Size> {
        self.sizes.get(&id).copied()
    }

    /// Raster of an on-stage comment.
    #[must_use]
    pub fn raster(&self, id: CommentId) -> Option<&R> {
        self.rasters.get(&id)
    }

    /// Number of live rasters.
    #[must_use]
    pub fn live_rasters(&self) -> usize {
        self.rasters.len()
    }

    /// Sizes a comment (once) and rasterizes it.
    ///
    /// Existing rasters are kept, so materializing twice is harmless.
    pub fn materialize<S>(&mut self, surface: &mut S, comment: &Comment) -> (Size, Materialized)
    where
        S: RenderSurface<Raster = R>,
    {
        let mut measure_failed = false;
        let size = match self.sizes.get(&comment.id) {
            Some(&size) => size,
            None => {
                let measured = surface.measure(&comment.text, &comment.style);
                measure_failed = measured.is_none();
                let size = block_size(measured, &comment.style);
                self.sizes.insert(comment.id, size);
                size
            }
        };

        if !self.rasters.contains_key(&comment.id)
            && let Some(raster) = surface.rasterize(&comment.text, &comment.style, size)
        {
            self.rasters.insert(comment.id, raster);
        }

        let rasterized = self.rasters.contains_key(&comment.id);
        (
            size,
            Materialized {
                measure_failed,
                rasterized,
            },
        )
    }

    /// Hands a comment's raster back to the surface. The size stays cached.
    pub fn release<S>(&mut self, surface: &mut S, id: CommentId)
    where
        S: RenderSurface<Raster = R>,
    {
        if let Some(raster) = self.rasters.remove(&id) {
            surface.release(raster);
        }
    }

    /// Releases every raster.
    pub fn release_all<S>(&mut self, surface: &mut S)
    where
        S: RenderSurface<Raster = R>,
    {
        while let Some((_, raster)) = self.rasters.pop_first() {
            surface.release(raster);
        }
    }

    /// Forgets cached sizes of comments with ids below `first_kept`.
    pub fn forget_sizes_before(&mut self, first_kept: CommentId) {
        self.sizes = self.sizes.split_off(&first_kept);
    }

    /// Forgets every cached size.
    pub fn forget_sizes(&mut self) {
        self.sizes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::RawComment;
    use crate::testing::RecordingSurface;

    fn comment(id: u64, text: &str) -> Comment {
        Comment::normalize(RawComment::new(text, 0.0), CommentId(id), 0.0).unwrap()
    }

    #[test]
    fn block_size_rounds_and_pads() {
        let mut style = CommentStyle::default();
        let s = block_size(Some(Size::new(99.2, 29.5)), &style);
        assert_eq!(s, Size::new(100.0, 30.0));

        style.stroke = Some("#000".into());
        let s = block_size(Some(Size::new(99.2, 29.5)), &style);
        assert_eq!(s, Size::new(102.0, 32.0), "1px stroke on each side");
    }

    #[test]
    fn block_size_has_minimum_width() {
        let s = block_size(Some(Size::new(0.0, 30.0)), &CommentStyle::default());
        assert_eq!(s.width, 1.0, "empty text still gets a 1px block");
    }

    #[test]
    fn failed_measurement_falls_back_to_one_pixel() {
        let style = CommentStyle::default();
        assert_eq!(block_size(None, &style), Size::new(1.0, 1.0));
        assert_eq!(
            block_size(Some(Size::new(f64::NAN, 10.0)), &style),
            Size::new(1.0, 1.0)
        );
    }

    #[test]
    fn size_is_measured_once() {
        let mut surface = RecordingSurface::new(Size::new(800.0, 600.0));
        let mut cache = GlyphCache::new();
        let c = comment(1, "hello");

        let (first, m) = cache.materialize(&mut surface, &c);
        assert!(m.rasterized);
        assert!(!m.measure_failed);
        cache.release(&mut surface, c.id);
        assert_eq!(cache.live_rasters(), 0);

        let (second, _) = cache.materialize(&mut surface, &c);
        assert_eq!(first, second);
        assert_eq!(surface.measure_calls(), 1, "size comes from the cache");
        assert_eq!(surface.rasterize_calls(), 2, "raster is rebuilt");
    }

    #[test]
    fn measure_failure_is_reported() {
        let mut surface = RecordingSurface::new(Size::new(800.0, 600.0));
        surface.set_measure_fails(true);
        let mut cache = GlyphCache::new();
        let (size, m) = cache.materialize(&mut surface, &comment(1, "x"));
        assert!(m.measure_failed);
        assert_eq!(size, Size::new(1.0, 1.0));
    }

    #[test]
    fn release_all_returns_every_raster() {
        let mut surface = RecordingSurface::new(Size::new(800.0, 600.0));
        let mut cache = GlyphCache::new();
        for id in 0..4 {
            cache.materialize(&mut surface, &comment(id, "abc"));
        }
        assert_eq!(cache.live_rasters(), 4);
        cache.release_all(&mut surface);
        assert_eq!(cache.live_rasters(), 0);
        assert_eq!(surface.live_rasters(), 0, "surface got every raster back");
    }

    #[test]
    fn forget_sizes_before_keeps_newer_ids() {
        let mut surface = RecordingSurface::new(Size::new(800.0, 600.0));
        let mut cache = GlyphCache::new();
        for id in 0..4 {
            cache.materialize(&mut surface, &comment(id, "abc"));
        }
        cache.forget_sizes_before(CommentId(2));
        assert!(cache.size(CommentId(1)).is_none());
        assert!(cache.size(CommentId(2)).is_some());
        cache.forget_sizes();
        assert!(cache.size(CommentId(3)).is_none());
    }
}
