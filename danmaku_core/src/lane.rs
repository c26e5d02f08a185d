// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vertical lane allocation.
//!
//! Each movement mode owns an independent [`LaneAllocator`]. An allocator
//! keeps a list of [`LaneRecord`]s ordered by their lower edge (`boundary`),
//! bounded by a head sentinel at 0 and a tail sentinel at `f64::MAX`. A new
//! comment takes the first vertical gap that is tall enough, or else stacks
//! under the last record it would collide with.
//!
//! Whether two comments collide depends on the mode, so the allocator is
//! generic over a [`CollisionRule`]: [`Scrolling`] for the two horizontal
//! modes and [`Fixed`] for top and bottom. [`Lanes`] bundles one allocator
//! per [`Mode`] and turns channels into y coordinates.

use alloc::vec::Vec;
use core::marker::PhantomData;

use kurbo::Size;

use crate::comment::Mode;

/// Lower edge of one allocated comment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneRecord {
    /// Channel offset plus height: the lower edge of the comment.
    pub boundary: f64,
    /// Clock time the comment entered the stage.
    pub entry_time: f64,
    /// Block width in pixels.
    pub width: f64,
    /// Block height in pixels.
    pub height: f64,
}

impl LaneRecord {
    const HEAD: Self = Self {
        boundary: 0.0,
        entry_time: -f64::MAX,
        width: f64::MAX,
        height: 0.0,
    };

    const TAIL: Self = Self {
        boundary: f64::MAX,
        entry_time: f64::MAX,
        width: 0.0,
        height: 0.0,
    };
}

/// A comment asking for a lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// Clock time the comment is due at.
    pub entry_time: f64,
    /// Block size in pixels.
    pub size: Size,
}

/// Clock and stage state shared by every allocation in a batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneContext {
    /// Current clock time in seconds.
    pub current_time: f64,
    /// Current playback rate.
    pub playback_rate: f64,
    /// Stage size in pixels.
    pub stage: Size,
    /// Seconds a comment stays on stage.
    pub duration: f64,
}

/// Decides whether an existing record blocks a candidate.
pub trait CollisionRule {
    /// Extra vertical room a gap needs next to `record`.
    fn gap_padding(record: &LaneRecord) -> f64 {
        _ = record;
        0.0
    }

    /// Returns `true` if `candidate` cannot share a row with `record`.
    fn collides(record: &LaneRecord, candidate: &Candidate, ctx: &LaneContext) -> bool;
}

/// Collision rule for comments crossing the stage horizontally.
///
/// A record blocks while its tail has not fully entered the stage, or while
/// it would still be on stage when the candidate's head catches up with it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Scrolling;

impl CollisionRule for Scrolling {
    fn collides(record: &LaneRecord, candidate: &Candidate, ctx: &LaneContext) -> bool {
        let width = ctx.stage.width;
        let d = ctx.duration;

        let record_travel = (width + record.width) * (ctx.current_time - record.entry_time)
            * ctx.playback_rate
            / d;
        if record.width > record_travel {
            return true;
        }

        let record_clears_in = d + record.entry_time - ctx.current_time;
        let span = width + candidate.size.width;
        let travel = span * (ctx.current_time - candidate.entry_time) * ctx.playback_rate / d;
        let arrival_in = d * (width - travel) / span;
        record_clears_in > arrival_in
    }
}

/// Collision rule for horizontally centered comments: any record still on
/// stage blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fixed;

impl CollisionRule for Fixed {
    fn gap_padding(record: &LaneRecord) -> f64 {
        record.height
    }

    fn collides(record: &LaneRecord, _candidate: &Candidate, ctx: &LaneContext) -> bool {
        ctx.current_time - record.entry_time < ctx.duration
    }
}

/// Boundary-ordered lane records for one mode.
pub struct LaneAllocator<R> {
    records: Vec<LaneRecord>,
    _rule: PhantomData<R>,
}

impl<R> core::fmt::Debug for LaneAllocator<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LaneAllocator")
            .field("records", &self.records.len().saturating_sub(2))
            .finish_non_exhaustive()
    }
}

impl<R> Default for LaneAllocator<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for LaneAllocator<R> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            _rule: PhantomData,
        }
    }
}

impl<R> PartialEq for LaneAllocator<R> {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl<R> LaneAllocator<R> {
    /// Creates an allocator holding only the two sentinels.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: alloc::vec![LaneRecord::HEAD, LaneRecord::TAIL],
            _rule: PhantomData,
        }
    }

    /// Drops every record except the sentinels.
    pub fn reset(&mut self) {
        self.records.clear();
        self.records.push(LaneRecord::HEAD);
        self.records.push(LaneRecord::TAIL);
    }

    /// All records, sentinels included.
    #[must_use]
    pub fn records(&self) -> &[LaneRecord] {
        &self.records
    }

    /// Number of non-sentinel records.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.records.len() - 2
    }
}

impl<R: CollisionRule> LaneAllocator<R> {
    /// Allocates a lane for `candidate` and returns its channel offset.
    ///
    /// Non-blocking records between the chosen row and the gap that ended
    /// the scan are replaced by the new record, which keeps the list ordered
    /// by boundary.
    pub fn allocate(&mut self, candidate: &Candidate, ctx: &LaneContext) -> f64 {
        let height = candidate.size.height;
        let mut last = 0;
        let mut gap = self.records.len() - 1;

        for i in 1..self.records.len() {
            let record = &self.records[i];
            let required = height + R::gap_padding(record);
            if record.boundary - record.height - self.records[last].boundary >= required {
                gap = i;
                break;
            }
            if R::collides(record, candidate, ctx) {
                last = i;
            }
        }

        let channel = self.records[last].boundary;
        let entry = LaneRecord {
            boundary: channel + height,
            entry_time: candidate.entry_time,
            width: candidate.size.width,
            height,
        };
        self.records.splice(last + 1..gap, [entry]);
        channel
    }
}

/// One allocator per [`Mode`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lanes {
    leftward: LaneAllocator<Scrolling>,
    rightward: LaneAllocator<Scrolling>,
    top: LaneAllocator<Fixed>,
    bottom: LaneAllocator<Fixed>,
}

impl Lanes {
    /// Creates empty allocators for every mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every allocator.
    pub fn reset(&mut self) {
        self.leftward.reset();
        self.rightward.reset();
        self.top.reset();
        self.bottom.reset();
    }

    /// Allocates a lane for `candidate` and returns its top y coordinate.
    ///
    /// Bottom comments stack upwards from the lower stage edge. Channels wrap
    /// around the stage height once the stage is full.
    pub fn allocate(&mut self, mode: Mode, candidate: &Candidate, ctx: &LaneContext) -> f64 {
        let channel = match mode {
            Mode::Leftward => self.leftward.allocate(candidate, ctx),
            Mode::Rightward => self.rightward.allocate(candidate, ctx),
            Mode::Top => self.top.allocate(candidate, ctx),
            Mode::Bottom => self.bottom.allocate(candidate, ctx),
        };
        let stage_h = ctx.stage.height;
        let h = candidate.size.height;
        match mode {
            Mode::Bottom if stage_h > 0.0 => (stage_h - h - channel % stage_h).max(0.0),
            Mode::Bottom => 0.0,
            _ if stage_h > h => channel % (stage_h - h),
            _ => 0.0,
        }
    }

    /// Records of the allocator for `mode`, sentinels included.
    #[must_use]
    pub fn records(&self, mode: Mode) -> &[LaneRecord] {
        match mode {
            Mode::Leftward => self.leftward.records(),
            Mode::Rightward => self.rightward.records(),
            Mode::Top => self.top.records(),
            Mode::Bottom => self.bottom.records(),
        }
    }

    /// Total non-sentinel records across modes.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.leftward.occupied()
            + self.rightward.occupied()
            + self.top.occupied()
            + self.bottom.occupied()
    }
}
