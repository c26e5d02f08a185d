// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use danmaku_core::time::Timebase;

use crate::recorder::{RecordedEvent, decode};

/// Track for frame phases and summaries.
const FRAME_TID: u32 = 0;
/// Track for timeline and lifecycle events.
const CONTROL_TID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
/// Lane-assignment counts carry no timestamp; they are placed at the most
/// recent frame tick.
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut last_tick_us = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::FrameTick(e) => {
                last_tick_us = ticks_to_us(e.now.ticks(), timebase);
                events.push(json!({
                    "ph": "i",
                    "name": "FrameTick",
                    "cat": "Frame",
                    "ts": last_tick_us,
                    "pid": 0,
                    "tid": FRAME_TID,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "media_time": e.media_time,
                        "playback_rate": e.playback_rate,
                    }
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "media_time",
                    "ts": last_tick_us,
                    "pid": 0,
                    "args": { "seconds": e.media_time }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.phase),
                    "cat": "Frame",
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": FRAME_TID,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.phase),
                    "cat": "Frame",
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": FRAME_TID,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::Seek(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Seek",
                    "cat": "Timeline",
                    "ts": ticks_to_us(e.at.ticks(), timebase),
                    "pid": 0,
                    "tid": CONTROL_TID,
                    "s": "p",
                    "args": {
                        "target": e.target,
                        "cursor": e.cursor,
                        "restored": e.restored,
                        "static_frame": e.static_frame,
                    }
                }));
            }
            RecordedEvent::RateChange(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RateChange",
                    "cat": "Timeline",
                    "ts": ticks_to_us(e.at.ticks(), timebase),
                    "pid": 0,
                    "tid": CONTROL_TID,
                    "s": "p",
                    "args": {
                        "old_rate": e.old_rate,
                        "new_rate": e.new_rate,
                        "compensated": e.compensated,
                    }
                }));
            }
            RecordedEvent::Replace(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Replace",
                    "cat": "Timeline",
                    "ts": ticks_to_us(e.at.ticks(), timebase),
                    "pid": 0,
                    "tid": CONTROL_TID,
                    "s": "p",
                    "args": {
                        "buffered": e.buffered,
                        "dropped": e.dropped,
                        "admitted": e.admitted,
                        "running": e.running,
                    }
                }));
            }
            RecordedEvent::Lifecycle(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.kind),
                    "cat": "Lifecycle",
                    "ts": ticks_to_us(e.at.ticks(), timebase),
                    "pid": 0,
                    "tid": CONTROL_TID,
                    "s": "p",
                }));
            }
            RecordedEvent::Rejection(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Rejection",
                    "cat": "Input",
                    "ts": ticks_to_us(e.at.ticks(), timebase),
                    "pid": 0,
                    "tid": CONTROL_TID,
                    "s": "t",
                    "args": {
                        "reason": format!("{:?}", e.reason),
                    }
                }));
            }
            RecordedEvent::FrameSummary(s) => {
                let ts = ticks_to_us(s.now.ticks(), timebase);
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSummary",
                    "cat": "Summary",
                    "ts": ts,
                    "pid": 0,
                    "tid": FRAME_TID,
                    "s": "t",
                    "args": {
                        "frame_index": s.frame_index,
                        "admitted": s.admitted,
                        "evicted": s.evicted,
                        "skipped": s.skipped,
                        "evict_us": ticks_to_us(s.evict_ticks, timebase),
                        "admit_us": ticks_to_us(s.admit_ticks, timebase),
                        "render_us": ticks_to_us(s.render_ticks, timebase),
                    }
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "active_comments",
                    "ts": ts,
                    "pid": 0,
                    "args": { "active": s.active }
                }));
            }
            RecordedEvent::LaneAssignmentsCount { frame_index, count } => {
                events.push(json!({
                    "ph": "i",
                    "name": "LaneAssignments",
                    "cat": "Rich",
                    "ts": last_tick_us,
                    "pid": 0,
                    "tid": FRAME_TID,
                    "s": "t",
                    "args": {
                        "frame_index": frame_index,
                        "count": count,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn ticks_to_us(ticks: u64, timebase: Timebase) -> f64 {
    timebase.ticks_to_nanos(ticks) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use danmaku_core::time::HostTime;
    use danmaku_core::trace::{
        FrameTickEvent, LifecycleEvent, LifecycleKind, PhaseBeginEvent, PhaseEndEvent, PhaseKind,
        SeekEvent, TraceSink,
    };

    fn export_to_values(bytes: &[u8]) -> Vec<Value> {
        let mut out = Vec::new();
        export(bytes, Timebase::MICROS, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        serde_json::from_str(&json_str).unwrap()
    }

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_frame_tick(&FrameTickEvent {
            frame_index: 0,
            now: HostTime(1_000),
            media_time: 4.0,
            playback_rate: 1.0,
        });
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 0,
            phase: PhaseKind::Evict,
            timestamp: HostTime(1_000),
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 0,
            phase: PhaseKind::Evict,
            timestamp: HostTime(1_100),
        });

        let parsed = export_to_values(rec.as_bytes());
        // Tick plus its media_time counter, then the phase pair.
        assert_eq!(parsed.len(), 4, "got: {parsed:?}");

        assert_eq!(parsed[0]["ph"], "i", "tick is an instant");
        assert_eq!(parsed[0]["name"], "FrameTick", "tick name");
        assert_eq!(parsed[0]["ts"], 1000.0, "µs timestamps");

        assert_eq!(parsed[1]["ph"], "C", "media time counter");
        assert_eq!(parsed[1]["args"]["seconds"], 4.0, "counter value");

        assert_eq!(parsed[2]["ph"], "B", "phase begin");
        assert_eq!(parsed[2]["name"], "Evict", "phase name");
        assert_eq!(parsed[3]["ph"], "E", "phase end");
        assert_eq!(parsed[3]["ts"], 1100.0, "phase end timestamp");
    }

    #[test]
    fn control_events_land_on_their_own_track() {
        let mut rec = RecorderSink::new();
        rec.on_seek(&SeekEvent {
            at: HostTime(2_000),
            target: 12.0,
            cursor: 5,
            restored: 2,
            static_frame: false,
        });
        rec.on_lifecycle(&LifecycleEvent {
            at: HostTime(3_000),
            kind: LifecycleKind::Hide,
        });

        let parsed = export_to_values(rec.as_bytes());
        assert_eq!(parsed.len(), 2, "got: {parsed:?}");
        assert_eq!(parsed[0]["name"], "Seek", "seek first");
        assert_eq!(parsed[0]["tid"], CONTROL_TID, "control track");
        assert_eq!(parsed[0]["args"]["restored"], 2, "restored count");
        assert_eq!(parsed[1]["name"], "Hide", "lifecycle named by kind");
    }

    #[test]
    fn export_empty_recording() {
        let parsed = export_to_values(&[]);
        assert!(parsed.is_empty(), "no events");
    }
}
