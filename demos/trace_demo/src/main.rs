// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated overlay session that exercises the tracing and diagnostics
//! pipeline.
//!
//! Binds an engine to a manual timeline, plays through a few seconds of
//! comments, then seeks, changes rate, pauses and swaps the comment set. Every
//! event goes to a [`RecorderSink`](danmaku_debug::recorder::RecorderSink).
//! The recording is replayed into a
//! [`PrettyPrintSink`](danmaku_debug::pretty::PrettyPrintSink) on stdout and
//! exported as a Chrome trace JSON file.

use std::fs::File;
use std::io::BufWriter;

use danmaku_core::comment::RawComment;
use danmaku_core::config::EngineConfig;
use danmaku_core::engine::ReplaceOptions;
use danmaku_core::testing::Simulation;
use danmaku_core::time::Timebase;
use danmaku_core::trace::SharedSink;
use kurbo::Size;

use danmaku_debug::pretty::PrettyPrintSink;
use danmaku_debug::recorder::{RecorderSink, decode};

/// One frame at 60 Hz.
const FRAME_SECS: f64 = 1.0 / 60.0;
const STAGE: Size = Size::new(640.0, 360.0);

fn comments() -> Vec<RawComment> {
    let mut comments: Vec<RawComment> = (0..40)
        .map(|i| RawComment::new(format!("comment #{i}"), f64::from(i) * 0.25))
        .collect();
    comments.push(RawComment::new("pinned to the top", 1.0).with_mode("top"));
    comments.push(RawComment::new("pinned to the bottom", 2.0).with_mode("bottom"));
    comments.push(RawComment::new("left to right", 3.0).with_mode("ltr"));
    comments
}

fn main() {
    let timebase = Timebase::NANOS;
    let recorder = SharedSink::new(RecorderSink::new());

    let mut sim = Simulation::bound(EngineConfig::default(), comments(), STAGE, 0.0, false);
    sim.engine.set_trace_sink(Some(Box::new(recorder.clone())));

    // -- play ------------------------------------------------------------
    sim.run(180, FRAME_SECS);

    // -- seek back and forth ---------------------------------------------
    sim.seek(8.0);
    sim.run(30, FRAME_SECS);
    sim.seek(1.5);
    sim.run(30, FRAME_SECS);

    // -- rate change -----------------------------------------------------
    sim.set_rate(2.0);
    sim.run(60, FRAME_SECS);
    sim.set_rate(1.0);

    // -- paused edits ----------------------------------------------------
    sim.pause();
    sim.engine.emit(RawComment::new("typed while paused", 0.0));
    sim.engine.replace_all(
        vec![
            RawComment::new("fresh batch", 5.0),
            RawComment::new("another", 5.5),
            RawComment {
                text: None,
                ..RawComment::new("", 6.0)
            },
        ],
        ReplaceOptions::default(),
    );
    sim.play();
    sim.run(60, FRAME_SECS);
    sim.engine.destroy();

    // -- pretty print ----------------------------------------------------
    let bytes = recorder.borrow().as_bytes().to_vec();
    let mut pretty = PrettyPrintSink::new(Box::new(std::io::stdout()), timebase);
    for event in decode(&bytes) {
        event.replay(&mut pretty);
    }

    // -- export Chrome trace ---------------------------------------------
    let path = "trace.json";
    let file = File::create(path).expect("failed to create trace.json");
    let mut writer = BufWriter::new(file);
    danmaku_debug::chrome::export(&bytes, timebase, &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path} ({} bytes recorded)", bytes.len());
}
