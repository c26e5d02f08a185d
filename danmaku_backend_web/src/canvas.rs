// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canvas 2D render surface.
//!
//! The stage is a `<canvas>` appended to the overlay container and sized to
//! it in CSS pixels, with a backing store scaled by `devicePixelRatio`. Each
//! comment is rasterized once into its own offscreen canvas and blitted with
//! `drawImage` every frame.

use alloc::string::String;

use danmaku_core::backend::RenderSurface;
use danmaku_core::comment::{Baseline, CommentStyle};
use danmaku_core::font::{FontMetrics, LineHeightCache};
use kurbo::{Point, Size};
use wasm_bindgen::JsCast as _;
use web_sys::{CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, HtmlElement};

/// Fill used when a comment does not specify one.
pub const DEFAULT_FILL: &str = "#fff";

/// Draws comments onto a `<canvas>` stage inside a container element.
pub struct CanvasSurface {
    container: HtmlElement,
    document: Document,
    stage: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    dpr: f64,
    metrics: FontMetrics,
    heights: LineHeightCache,
}

impl core::fmt::Debug for CanvasSurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CanvasSurface")
            .field("container", &"HtmlElement")
            .field("dpr", &self.dpr)
            .field("metrics", &self.metrics)
            .field("cached_fonts", &self.heights.len())
            .finish_non_exhaustive()
    }
}

impl CanvasSurface {
    /// Creates the stage canvas and appends it to `container`.
    ///
    /// Returns `None` if the document or a 2D context is unavailable.
    #[must_use]
    pub fn mount(container: &HtmlElement) -> Option<Self> {
        let document = container.owner_document()?;
        let stage: HtmlCanvasElement = document.create_element("canvas").ok()?.dyn_into().ok()?;
        let context = context_2d(&stage)?;

        let s = stage.style();
        let _ = s.set_property("position", "absolute");
        let _ = s.set_property("left", "0");
        let _ = s.set_property("top", "0");
        let _ = s.set_property("pointer-events", "none");
        container.append_child(&stage).ok()?;

        let mut surface = Self {
            container: container.clone(),
            document,
            stage,
            context,
            dpr: 1.0,
            metrics: FontMetrics::default(),
            heights: LineHeightCache::new(),
        };
        surface.refresh_metrics();
        Some(surface)
    }

    /// The stage canvas.
    #[must_use]
    pub fn stage_element(&self) -> &HtmlCanvasElement {
        &self.stage
    }

    /// The container the stage lives in.
    #[must_use]
    pub fn container(&self) -> &HtmlElement {
        &self.container
    }

    /// Re-reads the device pixel ratio and the root and container font
    /// sizes, dropping cached line heights.
    pub fn refresh_metrics(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let dpr = window.device_pixel_ratio();
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };

        let defaults = FontMetrics::default();
        let root = self
            .document
            .document_element()
            .and_then(|el| computed_font_size(&window, &el))
            .unwrap_or(defaults.root);
        let container = computed_font_size(&window, &self.container).unwrap_or(defaults.container);
        self.metrics = FontMetrics { root, container };
        self.heights.clear();
    }

    /// Removes the stage canvas from the document.
    pub fn unmount(&self) {
        self.stage.remove();
    }
}

impl RenderSurface for CanvasSurface {
    type Raster = HtmlCanvasElement;

    fn stage_size(&mut self) -> Size {
        let width = f64::from(self.container.offset_width().max(0));
        let height = f64::from(self.container.offset_height().max(0));
        self.stage.set_width(device_px(width * self.dpr));
        self.stage.set_height(device_px(height * self.dpr));
        let s = self.stage.style();
        let _ = s.set_property("width", &px(width));
        let _ = s.set_property("height", &px(height));
        Size::new(width, height)
    }

    fn measure(&mut self, text: &str, style: &CommentStyle) -> Option<Size> {
        self.context.set_font(&style.font);
        let width = self.context.measure_text(text).ok()?.width();
        let height = self.heights.line_height(&style.font, self.metrics);
        Some(Size::new(width, height))
    }

    fn rasterize(&mut self, text: &str, style: &CommentStyle, size: Size) -> Option<HtmlCanvasElement> {
        let canvas: HtmlCanvasElement = self
            .document
            .create_element("canvas")
            .ok()?
            .dyn_into()
            .ok()?;
        canvas.set_width(device_px(size.width * self.dpr));
        canvas.set_height(device_px(size.height * self.dpr));
        let ctx = context_2d(&canvas)?;
        ctx.scale(self.dpr, self.dpr).ok()?;

        ctx.set_font(&style.font);
        ctx.set_text_baseline(style.baseline.as_str());
        ctx.set_fill_style_str(style.fill.as_deref().unwrap_or(DEFAULT_FILL));
        if let Some(width) = style.line_width.filter(|w| w.is_finite() && *w > 0.0) {
            ctx.set_line_width(width);
        }

        let pad = style.stroke_padding();
        let baseline = match style.baseline {
            Baseline::Top | Baseline::Hanging => pad,
            Baseline::Middle => f64::from(device_px(size.height) / 2),
            Baseline::Alphabetic | Baseline::Ideographic | Baseline::Bottom => size.height - pad,
        };
        if let Some(stroke) = &style.stroke {
            ctx.set_stroke_style_str(stroke);
            ctx.stroke_text(text, pad, baseline).ok()?;
        }
        ctx.fill_text(text, pad, baseline).ok()?;
        Some(canvas)
    }

    fn draw(&mut self, raster: &HtmlCanvasElement, origin: Point) {
        let _ = self.context.draw_image_with_html_canvas_element(
            raster,
            origin.x * self.dpr,
            origin.y * self.dpr,
        );
    }

    fn clear(&mut self) {
        self.context.clear_rect(
            0.0,
            0.0,
            f64::from(self.stage.width()),
            f64::from(self.stage.height()),
        );
    }
}

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
    canvas.get_context("2d").ok()??.dyn_into().ok()
}

/// Reads an element's computed `font-size` in pixels.
fn computed_font_size(window: &web_sys::Window, el: &Element) -> Option<f64> {
    let value = window
        .get_computed_style(el)
        .ok()??
        .get_property_value("font-size")
        .ok()?;
    let size: f64 = value.trim().strip_suffix("px")?.trim().parse().ok()?;
    (size.is_finite() && size > 0.0).then_some(size)
}

/// Rounds a device pixel extent up to a canvas dimension.
fn device_px(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "value is positive and finite; canvas sizes are far below u32::MAX"
    )]
    let whole = value as u32;
    if f64::from(whole) < value {
        whole.saturating_add(1)
    } else {
        whole
    }
}

fn px(value: f64) -> String {
    alloc::format!("{value}px")
}
