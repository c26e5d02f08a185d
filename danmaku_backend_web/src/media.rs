// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `HTMLMediaElement` timeline binding.
//!
//! [`MediaBinding`] reads position, rate and pause state straight from the
//! element. [`MediaEvents`] forwards the element's playback events as
//! [`TimelineEvent`]s and removes its listeners when dropped.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use danmaku_core::clock::{TimelineBinding, TimelineEvent};
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use web_sys::{Event, HtmlMediaElement};

/// DOM event names and the timeline events they map to.
pub const MEDIA_EVENTS: [(&str, TimelineEvent); 6] = [
    ("play", TimelineEvent::Play),
    ("playing", TimelineEvent::Play),
    ("pause", TimelineEvent::Pause),
    ("waiting", TimelineEvent::Pause),
    ("seeking", TimelineEvent::Seeking),
    ("ratechange", TimelineEvent::RateChange),
];

/// Maps a DOM media event name to a [`TimelineEvent`].
#[must_use]
pub fn timeline_event(name: &str) -> Option<TimelineEvent> {
    MEDIA_EVENTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, event)| event)
}

type Listener = Closure<dyn FnMut(Event)>;

/// Event listeners on a media element. Dropping removes them.
pub struct MediaEvents {
    target: HtmlMediaElement,
    listeners: Vec<(&'static str, Listener)>,
}

impl core::fmt::Debug for MediaEvents {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MediaEvents")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl MediaEvents {
    /// Listens for playback events on `media` and forwards them to
    /// `handler`.
    pub fn subscribe(
        media: &HtmlMediaElement,
        handler: impl FnMut(TimelineEvent) + 'static,
    ) -> Self {
        let handler = Rc::new(RefCell::new(handler));
        let mut listeners = Vec::with_capacity(MEDIA_EVENTS.len());
        for (name, event) in MEDIA_EVENTS {
            let handler = Rc::clone(&handler);
            let closure = Closure::wrap(Box::new(move |_: Event| {
                if let Ok(mut handler) = handler.try_borrow_mut() {
                    (*handler)(event);
                }
            }) as Box<dyn FnMut(Event)>);
            if media
                .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
                .is_ok()
            {
                listeners.push((name, closure));
            }
        }
        Self {
            target: media.clone(),
            listeners,
        }
    }
}

impl Drop for MediaEvents {
    fn drop(&mut self) {
        for (name, closure) in self.listeners.drain(..) {
            let _ = self
                .target
                .remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
        }
    }
}

/// Whether an element is still attached, given whether it is connected now
/// and whether it was ever seen connected.
///
/// An element that has never been in the document (`new Audio()`, an
/// off-DOM `<video>`) stays attached. One that was connected and then
/// removed is lost.
fn still_attached(connected: bool, seen_connected: &Cell<bool>) -> bool {
    if connected {
        seen_connected.set(true);
        true
    } else {
        !seen_connected.get()
    }
}

/// A [`TimelineBinding`] over an `HTMLMediaElement`.
///
/// The binding counts as lost once the element leaves the document after
/// having been connected to it.
pub struct MediaBinding {
    media: HtmlMediaElement,
    events: Option<MediaEvents>,
    seen_connected: Cell<bool>,
}

impl core::fmt::Debug for MediaBinding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MediaBinding")
            .field("subscribed", &self.events.is_some())
            .field("seen_connected", &self.seen_connected.get())
            .finish_non_exhaustive()
    }
}

impl MediaBinding {
    /// Binds to `media` without listening for events.
    #[must_use]
    pub fn new(media: HtmlMediaElement) -> Self {
        let seen_connected = Cell::new(media.is_connected());
        Self {
            media,
            events: None,
            seen_connected,
        }
    }

    /// Binds to `media`, owning `events` until unsubscribed.
    #[must_use]
    pub fn with_events(media: HtmlMediaElement, events: MediaEvents) -> Self {
        let seen_connected = Cell::new(media.is_connected());
        Self {
            media,
            events: Some(events),
            seen_connected,
        }
    }

    /// The bound element.
    #[must_use]
    pub fn media(&self) -> &HtmlMediaElement {
        &self.media
    }
}

impl TimelineBinding for MediaBinding {
    fn current_time(&self) -> f64 {
        self.media.current_time()
    }

    fn playback_rate(&self) -> f64 {
        self.media.playback_rate()
    }

    fn is_paused(&self) -> bool {
        self.media.paused()
    }

    fn is_attached(&self) -> bool {
        still_attached(self.media.is_connected(), &self.seen_connected)
    }

    fn unsubscribe(&mut self) {
        self.events.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_map_to_timeline_events() {
        assert_eq!(timeline_event("play"), Some(TimelineEvent::Play), "play");
        assert_eq!(
            timeline_event("playing"),
            Some(TimelineEvent::Play),
            "playing resumes"
        );
        assert_eq!(
            timeline_event("waiting"),
            Some(TimelineEvent::Pause),
            "stalls pause"
        );
        assert_eq!(
            timeline_event("seeking"),
            Some(TimelineEvent::Seeking),
            "seeking"
        );
        assert_eq!(
            timeline_event("ratechange"),
            Some(TimelineEvent::RateChange),
            "ratechange"
        );
        assert_eq!(timeline_event("seeked"), None, "unmapped");
    }

    #[test]
    fn off_document_element_stays_attached() {
        let seen = Cell::new(false);
        assert!(still_attached(false, &seen), "never connected");
        assert!(still_attached(false, &seen), "still never connected");
        assert!(!seen.get(), "nothing observed");
    }

    #[test]
    fn removal_after_connection_is_a_loss() {
        let seen = Cell::new(false);
        assert!(still_attached(true, &seen), "connected");
        assert!(seen.get(), "connection observed");
        assert!(!still_attached(false, &seen), "removed from the document");
    }

    #[test]
    fn late_insertion_is_tracked() {
        let seen = Cell::new(false);
        assert!(still_attached(false, &seen), "created off-document");
        assert!(still_attached(true, &seen), "inserted later");
        assert!(!still_attached(false, &seen), "then removed");
    }
}
