// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Line height from CSS font shorthands.
//!
//! Canvas-style surfaces can measure advance width but not line height, so the
//! block height is derived from the font string instead: the first
//! `<size><unit>` token, optionally followed by `/<line-height>[unit]`.
//! Sizes in `%` and `em` are relative to the container's font size, `rem` to
//! the root's.

use alloc::collections::BTreeMap;
use alloc::string::String;

/// Line height used when the font string has no recognizable size.
pub const FALLBACK_LINE_HEIGHT: f64 = 12.0;

const DEFAULT_LINE_HEIGHT_FACTOR: f64 = 1.2;
const ZERO_FONT_SIZE: f64 = 10.0;

/// Font sizes that relative units resolve against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontMetrics {
    /// Root element font size in pixels (`rem`).
    pub root: f64,
    /// Container font size in pixels (`em`, `%`).
    pub container: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            root: 16.0,
            container: 16.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unit {
    Px,
    Percent,
    Em,
    Rem,
}

/// Computes the line height in pixels for a CSS font shorthand.
#[must_use]
pub fn line_height(font: &str, metrics: FontMetrics) -> f64 {
    let Some((size, unit, rest)) = find_size(font.as_bytes()) else {
        return FALLBACK_LINE_HEIGHT;
    };
    let size = if size == 0.0 { ZERO_FONT_SIZE } else { size };
    let size = match unit {
        Unit::Px => size,
        Unit::Percent => size * metrics.container / 100.0,
        Unit::Em => size * metrics.container,
        Unit::Rem => size * metrics.root,
    };

    match parse_line_height(rest) {
        None => size * DEFAULT_LINE_HEIGHT_FACTOR,
        Some((lh, None)) => size * lh,
        Some((lh, Some(Unit::Px))) => lh,
        Some((lh, Some(Unit::Percent))) => size * lh / 100.0,
        Some((lh, Some(Unit::Em))) => size * lh,
        Some((lh, Some(Unit::Rem))) => metrics.root * lh,
    }
}

/// Memoizes [`line_height`] per font string.
///
/// Entries are keyed on the font only; call [`clear`](Self::clear) when the
/// metrics change.
#[derive(Clone, Debug, Default)]
pub struct LineHeightCache {
    entries: BTreeMap<String, f64>,
}

impl LineHeightCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached line height for `font`, computing it on a miss.
    pub fn line_height(&mut self, font: &str, metrics: FontMetrics) -> f64 {
        if let Some(&h) = self.entries.get(font) {
            return h;
        }
        let h = line_height(font, metrics);
        self.entries.insert(String::from(font), h);
        h
    }

    /// Number of cached fonts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Finds the leftmost `<number><unit>` token and returns the bytes after it.
fn find_size(bytes: &[u8]) -> Option<(f64, Unit, &[u8])> {
    for start in 0..bytes.len() {
        if !bytes[start].is_ascii_digit() {
            continue;
        }
        let int_end = digits_end(bytes, start);
        // Prefer the longer number, then retry without the fraction.
        if let Some(frac_end) = fraction_end(bytes, int_end)
            && let Some((unit, after)) = parse_unit(bytes, frac_end)
        {
            return Some((parse_number(&bytes[start..frac_end]), unit, &bytes[after..]));
        }
        if let Some((unit, after)) = parse_unit(bytes, int_end) {
            return Some((parse_number(&bytes[start..int_end]), unit, &bytes[after..]));
        }
    }
    None
}

/// Parses `\s*/\s*<number>[unit]` at the start of `rest`.
fn parse_line_height(rest: &[u8]) -> Option<(f64, Option<Unit>)> {
    let mut i = skip_spaces(rest, 0);
    if rest.get(i) != Some(&b'/') {
        return None;
    }
    i = skip_spaces(rest, i + 1);
    if !rest.get(i).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let int_end = digits_end(rest, i);
    let end = fraction_end(rest, int_end).unwrap_or(int_end);
    let value = parse_number(&rest[i..end]);
    let value = if value == 0.0 {
        DEFAULT_LINE_HEIGHT_FACTOR
    } else {
        value
    };
    Some((value, parse_unit(rest, end).map(|(unit, _)| unit)))
}

fn digits_end(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    i
}

fn fraction_end(bytes: &[u8], int_end: usize) -> Option<usize> {
    if bytes.get(int_end) == Some(&b'.') && bytes.get(int_end + 1).is_some_and(u8::is_ascii_digit)
    {
        Some(digits_end(bytes, int_end + 1))
    } else {
        None
    }
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    i
}

fn parse_unit(bytes: &[u8], at: usize) -> Option<(Unit, usize)> {
    let rest = bytes.get(at..)?;
    if rest.starts_with(b"px") {
        Some((Unit::Px, at + 2))
    } else if rest.starts_with(b"%") {
        Some((Unit::Percent, at + 1))
    } else if rest.starts_with(b"em") {
        Some((Unit::Em, at + 2))
    } else if rest.starts_with(b"rem") {
        Some((Unit::Rem, at + 3))
    } else {
        None
    }
}

/// Parses an ASCII `digits[.digits]` slice.
fn parse_number(bytes: &[u8]) -> f64 {
    core::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const METRICS: FontMetrics = FontMetrics {
        root: 20.0,
        container: 10.0,
    };

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn px_size_uses_default_factor() {
        assert!(close(line_height("25px sans-serif", METRICS), 30.0));
        assert!(close(line_height("bold 12.5px serif", METRICS), 15.0));
    }

    #[test]
    fn relative_sizes_resolve_against_metrics() {
        assert!(close(line_height("150% serif", METRICS), 15.0 * 1.2));
        assert!(close(line_height("2em serif", METRICS), 20.0 * 1.2));
        assert!(close(line_height("2rem serif", METRICS), 40.0 * 1.2));
    }

    #[test]
    fn explicit_line_heights() {
        assert!(close(line_height("20px/30px serif", METRICS), 30.0));
        assert!(close(line_height("20px / 1.5 serif", METRICS), 30.0));
        assert!(close(line_height("20px/150% serif", METRICS), 30.0));
        assert!(close(line_height("20px/2em serif", METRICS), 40.0));
        assert!(close(line_height("20px/2rem serif", METRICS), 40.0));
    }

    #[test]
    fn unparsable_fonts_fall_back() {
        assert_eq!(line_height("serif", METRICS), FALLBACK_LINE_HEIGHT);
        assert_eq!(line_height("", METRICS), FALLBACK_LINE_HEIGHT);
        assert_eq!(line_height("12pt serif", METRICS), FALLBACK_LINE_HEIGHT);
    }

    #[test]
    fn zero_size_is_treated_as_ten_pixels() {
        assert!(close(line_height("0px serif", METRICS), 12.0));
    }

    #[test]
    fn leftmost_sized_token_wins() {
        // "5.5." cannot be followed by a unit, the later token can.
        assert!(close(line_height("x5.5.5px", METRICS), 5.5 * 1.2));
        assert!(close(line_height("italic 700 16px/2 serif", METRICS), 32.0));
    }

    #[test]
    fn cache_memoizes_per_font() {
        let mut cache = LineHeightCache::new();
        assert!(cache.is_empty());
        let a = cache.line_height("25px sans-serif", METRICS);
        let b = cache.line_height("25px sans-serif", FontMetrics::default());
        assert_eq!(a, b, "second lookup is served from the cache");
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
