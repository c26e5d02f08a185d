// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Comment data model.
//!
//! Producers hand the engine [`RawComment`]s, in which every field is
//! optional. [`Comment::normalize`] turns one into an immutable [`Comment`]
//! or rejects it. Text and style are reference counted so that the buffer,
//! the active list and backfill pools can share them.

use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;

#[cfg(not(any(test, feature = "std")))]
use kurbo::common::FloatFuncs as _;

/// Stable identifier of a buffered comment, assigned in emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommentId(pub u64);

/// How a comment moves across the stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Enters at the left edge and travels to the right.
    Leftward,
    /// Enters at the right edge and travels to the left.
    #[default]
    Rightward,
    /// Centered horizontally, stacked from the top.
    Top,
    /// Centered horizontally, stacked from the bottom.
    Bottom,
}

impl Mode {
    /// All modes, in lane-allocator order.
    pub const ALL: [Self; 4] = [Self::Leftward, Self::Rightward, Self::Top, Self::Bottom];

    /// Parses a mode name. Unrecognized names fall back to
    /// [`Mode::Rightward`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case("ltr") || name.eq_ignore_ascii_case("leftward") {
            Self::Leftward
        } else if name.eq_ignore_ascii_case("top") {
            Self::Top
        } else if name.eq_ignore_ascii_case("bottom") {
            Self::Bottom
        } else {
            Self::Rightward
        }
    }

    /// Returns `true` for modes that stay horizontally centered.
    #[inline]
    #[must_use]
    pub const fn is_fixed(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }

    /// Short lowercase name, as used in wire formats.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leftward => "ltr",
            Self::Rightward => "rtl",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

/// Text baseline used when rasterizing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Baseline {
    /// Top of the em square.
    Top,
    /// Hanging baseline.
    Hanging,
    /// Middle of the em square.
    Middle,
    /// Alphabetic baseline.
    Alphabetic,
    /// Ideographic baseline.
    Ideographic,
    /// Bottom of the bounding box.
    #[default]
    Bottom,
}

impl Baseline {
    /// Parses a baseline keyword. Unknown keywords fall back to
    /// [`Baseline::Bottom`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "top" => Self::Top,
            "hanging" => Self::Hanging,
            "middle" => Self::Middle,
            "alphabetic" => Self::Alphabetic,
            "ideographic" => Self::Ideographic,
            _ => Self::Bottom,
        }
    }

    /// The CSS keyword for this baseline.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Hanging => "hanging",
            Self::Middle => "middle",
            Self::Alphabetic => "alphabetic",
            Self::Ideographic => "ideographic",
            Self::Bottom => "bottom",
        }
    }
}

/// Font and paint properties of a comment.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentStyle {
    /// CSS font shorthand, e.g. `"25px sans-serif"`.
    pub font: String,
    /// Fill paint, if any. Surfaces fall back to white.
    pub fill: Option<String>,
    /// Stroke paint, if any.
    pub stroke: Option<String>,
    /// Stroke width in pixels.
    pub line_width: Option<f64>,
    /// Text baseline.
    pub baseline: Baseline,
}

impl Default for CommentStyle {
    fn default() -> Self {
        Self {
            font: String::from(Self::DEFAULT_FONT),
            fill: None,
            stroke: None,
            line_width: None,
            baseline: Baseline::Bottom,
        }
    }
}

impl CommentStyle {
    /// Font used when a comment does not specify one.
    pub const DEFAULT_FONT: &'static str = "25px sans-serif";

    /// Stroke padding in whole pixels applied on every side of a block.
    ///
    /// An explicit positive line width wins; otherwise a stroke paint alone
    /// implies a 1 px stroke.
    #[must_use]
    pub fn stroke_padding(&self) -> f64 {
        match self.line_width {
            Some(w) if w.is_finite() && w > 0.0 => w.ceil(),
            _ if self.stroke.is_some() => 1.0,
            _ => 0.0,
        }
    }
}

/// Producer-facing comment input. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawComment {
    /// Mode name (`"ltr"`, `"rtl"`, `"top"`, `"bottom"`).
    pub mode: Option<String>,
    /// Seconds on the timeline.
    pub time: Option<f64>,
    /// Display text. Required.
    pub text: Option<String>,
    /// Optional style overrides.
    pub style: Option<CommentStyle>,
}

impl RawComment {
    /// A right-to-left comment with the given text and time.
    #[must_use]
    pub fn new(text: impl Into<String>, time: f64) -> Self {
        Self {
            mode: None,
            time: Some(time),
            text: Some(text.into()),
            style: None,
        }
    }

    /// Sets the mode name.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Sets the style.
    #[must_use]
    pub fn with_style(mut self, style: CommentStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// The time, if present and finite.
    #[must_use]
    pub fn finite_time(&self) -> Option<f64> {
        self.time.filter(|t| t.is_finite())
    }
}

/// An immutable buffered comment.
#[derive(Clone, PartialEq)]
pub struct Comment {
    /// Identifier assigned by the engine.
    pub id: CommentId,
    /// Movement mode.
    pub mode: Mode,
    /// Seconds on the timeline this comment is due at.
    pub time: f64,
    /// Display text.
    pub text: Rc<str>,
    /// Font and paint.
    pub style: Rc<CommentStyle>,
}

impl Comment {
    /// Normalizes a raw comment.
    ///
    /// Returns `None` when `raw` has no text. A missing or non-finite time is
    /// replaced by `default_time`.
    #[must_use]
    pub fn normalize(raw: RawComment, id: CommentId, default_time: f64) -> Option<Self> {
        let time = raw.finite_time().unwrap_or(default_time);
        let text = raw.text?;
        Some(Self {
            id,
            mode: raw.mode.as_deref().map(Mode::parse).unwrap_or_default(),
            time,
            text: Rc::from(text),
            style: Rc::new(raw.style.unwrap_or_default()),
        })
    }
}

impl fmt::Debug for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comment")
            .field("id", &self.id.0)
            .field("mode", &self.mode)
            .field("time", &self.time)
            .field("text", &&*self.text)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_defaults_to_rightward() {
        assert_eq!(Mode::parse("ltr"), Mode::Leftward);
        assert_eq!(Mode::parse("LTR"), Mode::Leftward);
        assert_eq!(Mode::parse("top"), Mode::Top);
        assert_eq!(Mode::parse(" Bottom "), Mode::Bottom);
        assert_eq!(Mode::parse("rtl"), Mode::Rightward);
        assert_eq!(Mode::parse("diagonal"), Mode::Rightward, "unknown → rtl");
        assert_eq!(Mode::parse(""), Mode::Rightward, "empty → rtl");
    }

    #[test]
    fn baseline_parse_falls_back_to_bottom() {
        assert_eq!(Baseline::parse("middle"), Baseline::Middle);
        assert_eq!(Baseline::parse("sideways"), Baseline::Bottom);
    }

    #[test]
    fn stroke_padding_rules() {
        let mut style = CommentStyle::default();
        assert_eq!(style.stroke_padding(), 0.0, "no stroke, no padding");

        style.stroke = Some("#000".into());
        assert_eq!(style.stroke_padding(), 1.0, "stroke paint implies 1px");

        style.line_width = Some(2.2);
        assert_eq!(style.stroke_padding(), 3.0, "line width is rounded up");

        style.line_width = Some(f64::NAN);
        assert_eq!(style.stroke_padding(), 1.0, "invalid width falls back");

        style.stroke = None;
        style.line_width = Some(-4.0);
        assert_eq!(style.stroke_padding(), 0.0, "negative width is ignored");
    }

    #[test]
    fn normalize_requires_text() {
        let raw = RawComment {
            time: Some(1.0),
            ..RawComment::default()
        };
        assert!(Comment::normalize(raw, CommentId(0), 0.0).is_none());
    }

    #[test]
    fn normalize_defaults_missing_fields() {
        let raw = RawComment {
            text: Some("hi".into()),
            time: Some(f64::NAN),
            ..RawComment::default()
        };
        let c = Comment::normalize(raw, CommentId(3), 7.5).unwrap();
        assert_eq!(c.time, 7.5, "non-finite time replaced by default");
        assert_eq!(c.mode, Mode::Rightward);
        assert_eq!(c.style.font, CommentStyle::DEFAULT_FONT);
        assert_eq!(&*c.text, "hi");
        assert_eq!(c.id, CommentId(3));
    }
}
