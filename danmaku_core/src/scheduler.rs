// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame scheduling seam.
//!
//! The engine never owns a timer. It asks an injected [`FrameScheduler`] for
//! a frame, and the host answers by calling
//! [`Engine::tick`](crate::engine::Engine::tick) with a [`FrameTick`]. The
//! engine cancels the pending request whenever it pauses, hides or is
//! destroyed, and ignores ticks that still arrive afterwards.

use crate::time::HostTime;

/// A frame callback delivered by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameTick {
    /// Host time when the frame started.
    pub now: HostTime,
    /// Monotonically increasing frame counter.
    pub frame_index: u64,
}

/// Requests and cancels frame callbacks.
///
/// At most one request is outstanding at a time: requesting while a request
/// is pending is a no-op, cancelling with nothing pending is a no-op.
pub trait FrameScheduler {
    /// Asks for one [`FrameTick`] to be delivered.
    fn request_frame(&mut self);

    /// Withdraws the outstanding request, if any.
    fn cancel_frame(&mut self);
}
