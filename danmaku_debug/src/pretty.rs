// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Host
//! timestamps are converted to microseconds using a [`Timebase`].

use std::io::Write;

use danmaku_core::time::{HostTime, Timebase};
use danmaku_core::trace::{
    FrameSummary, FrameTickEvent, LaneAssignment, LifecycleEvent, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, RateChangeEvent, RejectionEvent, ReplaceEvent, SeekEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ticks_to_us(&self, ticks: u64) -> f64 {
        self.timebase.ticks_to_nanos(ticks) as f64 / 1000.0
    }

    fn host_us(&self, t: HostTime) -> f64 {
        self.ticks_to_us(t.ticks())
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Evict => "evict",
        PhaseKind::Admit => "admit",
        PhaseKind::Render => "render",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_tick(&mut self, e: &FrameTickEvent) {
        let _ = writeln!(
            self.writer,
            "[tick] frame={} now={:.1}µs media={:.3}s rate={}",
            e.frame_index,
            self.host_us(e.now),
            e.media_time,
            e.playback_rate,
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            phase_name(e.phase),
            self.host_us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            phase_name(e.phase),
            self.host_us(e.timestamp),
        );
    }

    fn on_seek(&mut self, e: &SeekEvent) {
        let frame = if e.static_frame { " static" } else { "" };
        let _ = writeln!(
            self.writer,
            "[seek] at {:.1}µs target={:.3}s cursor={} restored={}{frame}",
            self.host_us(e.at),
            e.target,
            e.cursor,
            e.restored,
        );
    }

    fn on_rate_change(&mut self, e: &RateChangeEvent) {
        let _ = writeln!(
            self.writer,
            "[rate] at {:.1}µs {} -> {} compensated={}",
            self.host_us(e.at),
            e.old_rate,
            e.new_rate,
            e.compensated,
        );
    }

    fn on_replace(&mut self, e: &ReplaceEvent) {
        let state = if e.running { "running" } else { "paused" };
        let _ = writeln!(
            self.writer,
            "[replace] at {:.1}µs buffered={} dropped={} admitted={} {state}",
            self.host_us(e.at),
            e.buffered,
            e.dropped,
            e.admitted,
        );
    }

    fn on_lifecycle(&mut self, e: &LifecycleEvent) {
        let _ = writeln!(
            self.writer,
            "[lifecycle] at {:.1}µs {:?}",
            self.host_us(e.at),
            e.kind,
        );
    }

    fn on_rejection(&mut self, e: &RejectionEvent) {
        let _ = writeln!(
            self.writer,
            "[reject] at {:.1}µs {:?}",
            self.host_us(e.at),
            e.reason,
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} media={:.3}s active={} +{} -{} skipped={} \
             evict={:.1}µs admit={:.1}µs render={:.1}µs",
            s.frame_index,
            s.media_time,
            s.active,
            s.admitted,
            s.evicted,
            s.skipped,
            self.ticks_to_us(s.evict_ticks),
            self.ticks_to_us(s.admit_ticks),
            self.ticks_to_us(s.render_ticks),
        );
    }

    fn on_lane_assignments(&mut self, frame_index: u64, lanes: &[LaneAssignment]) {
        let _ = writeln!(
            self.writer,
            "[lanes] frame={frame_index} assigned={}",
            lanes.len(),
        );
        for lane in lanes {
            let _ = writeln!(
                self.writer,
                "  #{} {:?} y={} h={}",
                lane.comment.0, lane.mode, lane.y, lane.height,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use danmaku_core::comment::{CommentId, Mode};
    use danmaku_core::trace::{LifecycleKind, Rejection};

    fn output(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_writer()).unwrap()
    }

    #[test]
    fn pretty_print_tick() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_frame_tick(&FrameTickEvent {
            frame_index: 1,
            now: HostTime(1_000_000),
            media_time: 2.5,
            playback_rate: 1.0,
        });
        let output = output(sink);
        assert!(output.contains("[tick]"), "got: {output}");
        assert!(output.contains("frame=1"), "got: {output}");
        assert!(output.contains("now=1000.0µs"), "got: {output}");
        assert!(output.contains("media=2.500s"), "got: {output}");
    }

    #[test]
    fn pretty_print_seek_marks_static_frames() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::MICROS);
        sink.on_seek(&SeekEvent {
            at: HostTime(10),
            target: 8.0,
            cursor: 3,
            restored: 2,
            static_frame: true,
        });
        let output = output(sink);
        assert!(
            output.starts_with("[seek] at 10.0µs target=8.000s cursor=3 restored=2 static"),
            "got: {output}"
        );
    }

    #[test]
    fn pretty_print_lifecycle_and_rejection() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_lifecycle(&LifecycleEvent {
            at: HostTime(0),
            kind: LifecycleKind::BindingLost,
        });
        sink.on_rejection(&RejectionEvent {
            at: HostTime(0),
            reason: Rejection::InvalidSpeed,
        });
        let output = output(sink);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "one line per event: {output}");
        assert!(lines[0].ends_with("BindingLost"), "got: {}", lines[0]);
        assert!(lines[1].ends_with("InvalidSpeed"), "got: {}", lines[1]);
    }

    #[test]
    fn pretty_print_lanes_lists_each_assignment() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        let lanes = [
            LaneAssignment {
                comment: CommentId(4),
                mode: Mode::Rightward,
                y: 0.0,
                height: 30.0,
            },
            LaneAssignment {
                comment: CommentId(5),
                mode: Mode::Top,
                y: 30.0,
                height: 30.0,
            },
        ];
        sink.on_lane_assignments(9, &lanes);
        let output = output(sink);
        assert_eq!(output.lines().count(), 3, "header plus one line each");
        assert!(output.contains("#5 Top y=30"), "got: {output}");
    }
}
