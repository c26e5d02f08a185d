// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`], and [`RecordedEvent::replay`] feeds a
//! decoded event to another sink.
//!
//! Lane assignments ([`on_lane_assignments`](TraceSink::on_lane_assignments))
//! store only the count.

use danmaku_core::time::HostTime;
use danmaku_core::trace::{
    FrameSummary, FrameTickEvent, LaneAssignment, LifecycleEvent, LifecycleKind, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, RateChangeEvent, Rejection, RejectionEvent, ReplaceEvent, SeekEvent,
    TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_TICK: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_SEEK: u8 = 4;
const TAG_RATE_CHANGE: u8 = 5;
const TAG_REPLACE: u8 = 6;
const TAG_LIFECYCLE: u8 = 7;
const TAG_REJECTION: u8 = 8;
const TAG_FRAME_SUMMARY: u8 = 9;
const TAG_LANE_ASSIGNMENTS_COUNT: u8 = 10;

const LIFECYCLE_KINDS: [LifecycleKind; 9] = [
    LifecycleKind::Play,
    LifecycleKind::Pause,
    LifecycleKind::Show,
    LifecycleKind::Hide,
    LifecycleKind::Resize,
    LifecycleKind::Bind,
    LifecycleKind::Unbind,
    LifecycleKind::BindingLost,
    LifecycleKind::Destroy,
];

const REJECTIONS: [Rejection; 3] = [
    Rejection::MalformedComment,
    Rejection::InvalidSpeed,
    Rejection::MeasureFailed,
];

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_usize(&mut self, v: usize) {
        self.write_u64(u64::try_from(v).unwrap_or(u64::MAX));
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Evict => 0,
            PhaseKind::Admit => 1,
            PhaseKind::Render => 2,
        });
    }

    fn write_lifecycle(&mut self, kind: LifecycleKind) {
        self.write_u8(position(&LIFECYCLE_KINDS, kind));
    }

    fn write_rejection(&mut self, reason: Rejection) {
        self.write_u8(position(&REJECTIONS, reason));
    }
}

fn position<T: PartialEq + Copy, const N: usize>(table: &[T; N], value: T) -> u8 {
    table
        .iter()
        .position(|v| *v == value)
        .and_then(|i| u8::try_from(i).ok())
        .unwrap_or(u8::MAX)
}

impl TraceSink for RecorderSink {
    fn on_frame_tick(&mut self, e: &FrameTickEvent) {
        self.write_u8(TAG_FRAME_TICK);
        self.write_u64(e.frame_index);
        self.write_u64(e.now.ticks());
        self.write_f64(e.media_time);
        self.write_f64(e.playback_rate);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_seek(&mut self, e: &SeekEvent) {
        self.write_u8(TAG_SEEK);
        self.write_u64(e.at.ticks());
        self.write_f64(e.target);
        self.write_usize(e.cursor);
        self.write_usize(e.restored);
        self.write_bool(e.static_frame);
    }

    fn on_rate_change(&mut self, e: &RateChangeEvent) {
        self.write_u8(TAG_RATE_CHANGE);
        self.write_u64(e.at.ticks());
        self.write_f64(e.old_rate);
        self.write_f64(e.new_rate);
        self.write_usize(e.compensated);
    }

    fn on_replace(&mut self, e: &ReplaceEvent) {
        self.write_u8(TAG_REPLACE);
        self.write_u64(e.at.ticks());
        self.write_usize(e.buffered);
        self.write_usize(e.dropped);
        self.write_usize(e.admitted);
        self.write_bool(e.running);
    }

    fn on_lifecycle(&mut self, e: &LifecycleEvent) {
        self.write_u8(TAG_LIFECYCLE);
        self.write_u64(e.at.ticks());
        self.write_lifecycle(e.kind);
    }

    fn on_rejection(&mut self, e: &RejectionEvent) {
        self.write_u8(TAG_REJECTION);
        self.write_u64(e.at.ticks());
        self.write_rejection(e.reason);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        self.write_u64(s.now.ticks());
        self.write_f64(s.media_time);
        self.write_u32(s.active);
        self.write_u32(s.admitted);
        self.write_u32(s.evicted);
        self.write_u32(s.skipped);
        self.write_u64(s.evict_ticks);
        self.write_u64(s.admit_ticks);
        self.write_u64(s.render_ticks);
    }

    fn on_lane_assignments(&mut self, frame_index: u64, lanes: &[LaneAssignment]) {
        self.write_u8(TAG_LANE_ASSIGNMENTS_COUNT);
        self.write_u64(frame_index);
        self.write_u32(u32::try_from(lanes.len()).unwrap_or(u32::MAX));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A [`FrameTickEvent`].
    FrameTick(FrameTickEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`SeekEvent`].
    Seek(SeekEvent),
    /// A [`RateChangeEvent`].
    RateChange(RateChangeEvent),
    /// A [`ReplaceEvent`].
    Replace(ReplaceEvent),
    /// A [`LifecycleEvent`].
    Lifecycle(LifecycleEvent),
    /// A [`RejectionEvent`].
    Rejection(RejectionEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// Lane-assignment count for a batch.
    LaneAssignmentsCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of comments placed.
        count: u32,
    },
}

impl RecordedEvent {
    /// Delivers this event to `sink` as if the engine had emitted it.
    ///
    /// Lane-assignment counts carry no per-comment data and are skipped.
    pub fn replay(&self, sink: &mut dyn TraceSink) {
        match self {
            Self::FrameTick(e) => sink.on_frame_tick(e),
            Self::PhaseBegin(e) => sink.on_phase_begin(e),
            Self::PhaseEnd(e) => sink.on_phase_end(e),
            Self::Seek(e) => sink.on_seek(e),
            Self::RateChange(e) => sink.on_rate_change(e),
            Self::Replace(e) => sink.on_replace(e),
            Self::Lifecycle(e) => sink.on_lifecycle(e),
            Self::Rejection(e) => sink.on_rejection(e),
            Self::FrameSummary(s) => sink.on_frame_summary(s),
            Self::LaneAssignmentsCount { .. } => {}
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos.checked_add(N)?)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.take().map(f64::from_le_bytes)
    }

    fn read_usize(&mut self) -> Option<usize> {
        Some(usize::try_from(self.read_u64()?).unwrap_or(usize::MAX))
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|v| v != 0)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Evict,
            1 => PhaseKind::Admit,
            _ => PhaseKind::Render,
        })
    }

    fn read_lifecycle(&mut self) -> Option<LifecycleKind> {
        LIFECYCLE_KINDS.get(usize::from(self.read_u8()?)).copied()
    }

    fn read_rejection(&mut self) -> Option<Rejection> {
        REJECTIONS.get(usize::from(self.read_u8()?)).copied()
    }

    fn decode_frame_tick(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameTick(FrameTickEvent {
            frame_index: self.read_u64()?,
            now: self.read_time()?,
            media_time: self.read_f64()?,
            playback_rate: self.read_f64()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_seek(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Seek(SeekEvent {
            at: self.read_time()?,
            target: self.read_f64()?,
            cursor: self.read_usize()?,
            restored: self.read_usize()?,
            static_frame: self.read_bool()?,
        }))
    }

    fn decode_rate_change(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RateChange(RateChangeEvent {
            at: self.read_time()?,
            old_rate: self.read_f64()?,
            new_rate: self.read_f64()?,
            compensated: self.read_usize()?,
        }))
    }

    fn decode_replace(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Replace(ReplaceEvent {
            at: self.read_time()?,
            buffered: self.read_usize()?,
            dropped: self.read_usize()?,
            admitted: self.read_usize()?,
            running: self.read_bool()?,
        }))
    }

    fn decode_lifecycle(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Lifecycle(LifecycleEvent {
            at: self.read_time()?,
            kind: self.read_lifecycle()?,
        }))
    }

    fn decode_rejection(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Rejection(RejectionEvent {
            at: self.read_time()?,
            reason: self.read_rejection()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index: self.read_u64()?,
            now: self.read_time()?,
            media_time: self.read_f64()?,
            active: self.read_u32()?,
            admitted: self.read_u32()?,
            evicted: self.read_u32()?,
            skipped: self.read_u32()?,
            evict_ticks: self.read_u64()?,
            admit_ticks: self.read_u64()?,
            render_ticks: self.read_u64()?,
        }))
    }

    fn decode_lane_assignments_count(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let count = self.read_u32()?;
        Some(RecordedEvent::LaneAssignmentsCount { frame_index, count })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_FRAME_TICK => self.decode_frame_tick(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_SEEK => self.decode_seek(),
            TAG_RATE_CHANGE => self.decode_rate_change(),
            TAG_REPLACE => self.decode_replace(),
            TAG_LIFECYCLE => self.decode_lifecycle(),
            TAG_REJECTION => self.decode_rejection(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_LANE_ASSIGNMENTS_COUNT => self.decode_lane_assignments_count(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use danmaku_core::comment::{CommentId, Mode};

    fn sample_tick() -> FrameTickEvent {
        FrameTickEvent {
            frame_index: 7,
            now: HostTime(1_000_000),
            media_time: 12.25,
            playback_rate: 1.5,
        }
    }

    fn sample_summary() -> FrameSummary {
        FrameSummary {
            frame_index: 7,
            now: HostTime(1_000_000),
            media_time: 12.25,
            active: 9,
            admitted: 3,
            evicted: 1,
            skipped: 2,
            evict_ticks: 100,
            admit_ticks: 400,
            render_ticks: 1500,
        }
    }

    #[test]
    fn a_frame_decodes_in_order() {
        let mut rec = RecorderSink::new();
        rec.on_frame_tick(&sample_tick());
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 7,
            phase: PhaseKind::Admit,
            timestamp: HostTime(1_000_100),
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 7,
            phase: PhaseKind::Admit,
            timestamp: HostTime(1_000_500),
        });
        rec.on_frame_summary(&sample_summary());

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 4, "four records");
        assert_eq!(events[0], RecordedEvent::FrameTick(sample_tick()), "tick");
        match &events[1] {
            RecordedEvent::PhaseBegin(e) => {
                assert_eq!(e.phase, PhaseKind::Admit, "phase");
                assert_eq!(e.timestamp, HostTime(1_000_100), "timestamp");
            }
            other => panic!("expected PhaseBegin, got {other:?}"),
        }
        assert!(
            matches!(events[2], RecordedEvent::PhaseEnd(_)),
            "phase end third"
        );
        assert_eq!(
            events[3],
            RecordedEvent::FrameSummary(sample_summary()),
            "summary keeps counters and durations"
        );
    }

    #[test]
    fn timeline_events_keep_their_fields() {
        let mut rec = RecorderSink::new();
        let seek = SeekEvent {
            at: HostTime(5),
            target: 9.5,
            cursor: 4,
            restored: 3,
            static_frame: true,
        };
        let rate = RateChangeEvent {
            at: HostTime(6),
            old_rate: 1.0,
            new_rate: 0.5,
            compensated: 2,
        };
        let replace = ReplaceEvent {
            at: HostTime(7),
            buffered: 10,
            dropped: 1,
            admitted: 0,
            running: false,
        };
        rec.on_seek(&seek);
        rec.on_rate_change(&rate);
        rec.on_replace(&replace);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(
            events,
            vec![
                RecordedEvent::Seek(seek),
                RecordedEvent::RateChange(rate),
                RecordedEvent::Replace(replace),
            ],
            "seek, rate and replace survive recording"
        );
    }

    #[test]
    fn every_lifecycle_kind_and_rejection_is_encodable() {
        let mut rec = RecorderSink::new();
        for kind in LIFECYCLE_KINDS {
            rec.on_lifecycle(&LifecycleEvent {
                at: HostTime(1),
                kind,
            });
        }
        for reason in REJECTIONS {
            rec.on_rejection(&RejectionEvent {
                at: HostTime(2),
                reason,
            });
        }

        let mut kinds = Vec::new();
        let mut reasons = Vec::new();
        for event in decode(rec.as_bytes()) {
            match event {
                RecordedEvent::Lifecycle(e) => kinds.push(e.kind),
                RecordedEvent::Rejection(e) => reasons.push(e.reason),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(kinds, LIFECYCLE_KINDS, "lifecycle kinds");
        assert_eq!(reasons, REJECTIONS, "rejections");
    }

    #[test]
    fn lane_assignments_record_only_the_count() {
        let mut rec = RecorderSink::new();
        let lanes = [
            LaneAssignment {
                comment: CommentId(1),
                mode: Mode::Rightward,
                y: 0.0,
                height: 30.0,
            },
            LaneAssignment {
                comment: CommentId(2),
                mode: Mode::Bottom,
                y: 570.0,
                height: 30.0,
            },
        ];
        rec.on_lane_assignments(42, &lanes);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(
            events,
            vec![RecordedEvent::LaneAssignmentsCount {
                frame_index: 42,
                count: 2,
            }],
            "count only"
        );
    }

    #[test]
    fn truncated_record_ends_iteration() {
        let mut rec = RecorderSink::new();
        rec.on_frame_tick(&sample_tick());
        rec.on_frame_summary(&sample_summary());
        let bytes = rec.into_bytes();

        let events: Vec<_> = decode(&bytes[..bytes.len() - 3]).collect();
        assert_eq!(events.len(), 1, "the partial summary is dropped");
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty(), "no events");
    }

    #[test]
    fn replay_reaches_the_target_sink() {
        #[derive(Default)]
        struct Seen {
            seeks: Vec<f64>,
            lifecycle: Vec<LifecycleKind>,
        }
        impl TraceSink for Seen {
            fn on_seek(&mut self, e: &SeekEvent) {
                self.seeks.push(e.target);
            }
            fn on_lifecycle(&mut self, e: &LifecycleEvent) {
                self.lifecycle.push(e.kind);
            }
        }

        let mut rec = RecorderSink::new();
        rec.on_lifecycle(&LifecycleEvent {
            at: HostTime(0),
            kind: LifecycleKind::Play,
        });
        rec.on_seek(&SeekEvent {
            at: HostTime(1),
            target: 30.0,
            cursor: 0,
            restored: 0,
            static_frame: false,
        });
        rec.on_lane_assignments(0, &[]);

        let mut seen = Seen::default();
        for event in decode(rec.as_bytes()) {
            event.replay(&mut seen);
        }
        assert_eq!(seen.seeks, [30.0], "seek replayed");
        assert_eq!(seen.lifecycle, [LifecycleKind::Play], "lifecycle replayed");
    }
}
