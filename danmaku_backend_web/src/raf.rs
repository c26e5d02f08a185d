// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `requestAnimationFrame` frame source.
//!
//! [`RafLoop`] turns one-shot `requestAnimationFrame` callbacks into
//! [`FrameTick`]s. Unlike a free-running loop it only registers a callback
//! when asked, which is what the engine's [`FrameScheduler`] contract wants:
//! the engine requests the next frame at the end of every tick and cancels
//! the pending one when it pauses.
//!
//! Each callback receives a [`DOMHighResTimeStamp`][mdn] (milliseconds from
//! `performance.now()`), converted to microsecond [`HostTime`] ticks.
//!
//! [mdn]: https://developer.mozilla.org/en-US/docs/Web/API/DOMHighResTimeStamp

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use danmaku_core::scheduler::{FrameScheduler, FrameTick};
use danmaku_core::time::HostTime;

// Direct global bindings instead of `web_sys::Window` methods. Avoids
// fetching the Window/Performance objects on every frame.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    pub(crate) fn performance_now() -> f64;

    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);
}

/// Converts a millisecond timestamp to microsecond ticks.
pub(crate) fn ms_to_host_time(ms: f64) -> HostTime {
    if !ms.is_finite() || ms <= 0.0 {
        return HostTime(0);
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "timestamp is a small positive f64; µs fits in u64"
    )]
    let us = (ms * 1000.0) as u64;
    HostTime(us)
}

type RafClosure = Closure<dyn FnMut(f64)>;

/// A one-shot `requestAnimationFrame` source that emits [`FrameTick`]s.
///
/// Install the frame handler with [`set_callback`](Self::set_callback) and
/// hand a [`scheduler`](Self::scheduler) to whoever decides when frames are
/// needed. Dropping the `RafLoop` cancels the pending callback and releases
/// the handler.
pub struct RafLoop {
    inner: Rc<RafInner>,
}

struct RafInner {
    /// The JS closure registered with `requestAnimationFrame`, created on the
    /// first request.
    closure: RefCell<Option<RafClosure>>,

    /// Receives every delivered [`FrameTick`].
    callback: RefCell<Option<Box<dyn FnMut(FrameTick)>>>,

    /// Becomes `FrameTick::frame_index`.
    frame_counter: Cell<u64>,

    /// Whether a callback is registered and not yet delivered.
    pending: Cell<bool>,

    /// The ID returned by the most recent `requestAnimationFrame` call.
    raf_id: Cell<i32>,
}

impl RafInner {
    fn request(self: &Rc<Self>) {
        if self.pending.get() {
            return;
        }
        if self.closure.borrow().is_none() {
            let weak = Rc::downgrade(self);
            let closure = Closure::wrap(Box::new(move |timestamp_ms: f64| {
                if let Some(inner) = weak.upgrade() {
                    inner.fire(timestamp_ms);
                }
            }) as Box<dyn FnMut(f64)>);
            *self.closure.borrow_mut() = Some(closure);
        }
        if let Some(ref closure) = *self.closure.borrow() {
            let id = request_animation_frame(closure.as_ref().unchecked_ref());
            self.raf_id.set(id);
            self.pending.set(true);
        }
    }

    fn cancel(&self) {
        if !self.pending.get() {
            return;
        }
        self.pending.set(false);
        cancel_animation_frame(self.raf_id.get());
    }

    fn fire(&self, timestamp_ms: f64) {
        if !self.pending.get() {
            return;
        }
        self.pending.set(false);

        let frame_index = self.frame_counter.get();
        self.frame_counter.set(frame_index + 1);
        let tick = FrameTick {
            now: ms_to_host_time(timestamp_ms),
            frame_index,
        };

        // The handler may request the next frame; that only touches
        // `closure`, `pending` and `raf_id`, never `callback`.
        if let Some(callback) = self.callback.borrow_mut().as_mut() {
            callback(tick);
        }
    }
}

impl Default for RafLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RafLoop {
    /// Creates a loop with no handler and nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RafInner {
                closure: RefCell::new(None),
                callback: RefCell::new(None),
                frame_counter: Cell::new(0),
                pending: Cell::new(false),
                raf_id: Cell::new(0),
            }),
        }
    }

    /// Installs the frame handler, replacing any previous one.
    pub fn set_callback(&self, callback: impl FnMut(FrameTick) + 'static) {
        *self.inner.callback.borrow_mut() = Some(Box::new(callback));
    }

    /// A [`FrameScheduler`] handle for this loop.
    ///
    /// The handle does not keep the loop alive; once the `RafLoop` is
    /// dropped its requests are ignored.
    #[must_use]
    pub fn scheduler(&self) -> RafScheduler {
        RafScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Registers a callback for the next animation frame unless one is
    /// already pending.
    pub fn request(&self) {
        self.inner.request();
    }

    /// Cancels the pending callback, if any.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` if a callback is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.get()
    }
}

impl Drop for RafLoop {
    fn drop(&mut self) {
        self.inner.cancel();
        // Drop the JS closure so it doesn't leak.
        self.inner.closure.borrow_mut().take();
        self.inner.callback.borrow_mut().take();
    }
}

impl core::fmt::Debug for RafLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RafLoop")
            .field("pending", &self.inner.pending.get())
            .field("frame_counter", &self.inner.frame_counter.get())
            .finish_non_exhaustive()
    }
}

/// [`FrameScheduler`] handle onto a [`RafLoop`].
#[derive(Clone)]
pub struct RafScheduler {
    inner: Weak<RafInner>,
}

impl core::fmt::Debug for RafScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RafScheduler")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl FrameScheduler for RafScheduler {
    fn request_frame(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.request();
        }
    }

    fn cancel_frame(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel();
        }
    }
}
