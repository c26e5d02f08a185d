// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-call wiring of an engine to a container and a media element.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use danmaku_core::clock::TimelineBinding;
use danmaku_core::comment::RawComment;
use danmaku_core::config::{EngineConfig, EngineOptions};
use danmaku_core::engine::Engine;
use kurbo::Point;
use web_sys::{HtmlElement, HtmlMediaElement};

use crate::canvas::CanvasSurface;
use crate::media::{MediaBinding, MediaEvents};
use crate::raf::RafLoop;
use crate::PerformanceClock;

type Slot = Rc<RefCell<Option<Engine<CanvasSurface>>>>;

/// An engine drawing into a canvas inside `container`, driven by
/// `requestAnimationFrame` and, optionally, a media element's events.
///
/// Event and frame callbacks hold only weak references to the engine, so
/// dropping the overlay tears everything down.
pub struct WebOverlay {
    engine: Slot,
    raf: RafLoop,
}

impl core::fmt::Debug for WebOverlay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebOverlay")
            .field("engine", &self.engine.try_borrow().ok())
            .field("raf", &self.raf)
            .finish()
    }
}

impl WebOverlay {
    /// Mounts an overlay. Returns `None` if no 2D canvas can be created.
    #[must_use]
    pub fn mount(
        container: &HtmlElement,
        media: Option<HtmlMediaElement>,
        config: EngineConfig,
        comments: Vec<RawComment>,
    ) -> Option<Self> {
        let surface = CanvasSurface::mount(container)?;
        let raf = RafLoop::new();
        let slot: Slot = Rc::new(RefCell::new(None));

        let binding = media.map(|media| {
            let weak = Rc::downgrade(&slot);
            let events = MediaEvents::subscribe(&media, move |event| {
                if let Some(slot) = weak.upgrade()
                    && let Ok(mut guard) = slot.try_borrow_mut()
                    && let Some(engine) = guard.as_mut()
                {
                    engine.handle_event(event);
                }
            });
            Box::new(MediaBinding::with_events(media, events)) as Box<dyn TimelineBinding>
        });

        let engine = Engine::new(
            EngineOptions {
                config,
                comments,
                binding,
            },
            surface,
            Box::new(raf.scheduler()),
            Box::new(PerformanceClock),
        );
        *slot.borrow_mut() = Some(engine);

        let weak = Rc::downgrade(&slot);
        raf.set_callback(move |tick| {
            if let Some(slot) = weak.upgrade()
                && let Ok(mut guard) = slot.try_borrow_mut()
                && let Some(engine) = guard.as_mut()
            {
                engine.tick(tick);
            }
        });

        Some(Self { engine: slot, raf })
    }

    /// Runs `f` on the engine. Returns `None` after [`destroy`](Self::destroy)
    /// or when called re-entrantly from an engine callback.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<CanvasSurface>) -> R) -> Option<R> {
        self.engine.try_borrow_mut().ok()?.as_mut().map(f)
    }

    /// Re-reads the container size and font metrics.
    pub fn resize(&self) {
        self.with_engine(|engine| {
            engine.surface_mut().refresh_metrics();
            engine.resize();
        });
    }

    /// Text of the top-most comment under a point in client coordinates.
    #[must_use]
    pub fn comment_at(&self, client_x: f64, client_y: f64) -> Option<String> {
        self.with_engine(|engine| {
            let rect = engine.surface().stage_element().get_bounding_client_rect();
            let point = Point::new(client_x - rect.left(), client_y - rect.top());
            engine
                .hit_test(point)
                .map(|active| String::from(&*active.comment.text))
        })
        .flatten()
    }

    /// Destroys the engine and removes the stage from the document.
    pub fn destroy(&self) {
        self.raf.cancel();
        let engine = self
            .engine
            .try_borrow_mut()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(mut engine) = engine {
            engine.destroy();
            engine.surface().unmount();
        }
    }
}

impl Drop for WebOverlay {
    fn drop(&mut self) {
        self.destroy();
    }
}
