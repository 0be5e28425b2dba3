// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live repositioning.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use bramble_dom::{Disposer, EventTarget, ListenerId, ListenerOptions, NodeId, ObserverId};
use bramble_scheduler::{Cache, ScheduledTask, Scheduler};

use crate::compute::{Position, PositionOptions, apply_position, calculate_position};

/// Configuration for [`auto_position`].
pub struct AutoPositionConfig {
    /// The element the floating element is anchored to.
    pub reference: NodeId,
    /// The element being positioned.
    pub floating: NodeId,
    /// Placement options.
    pub options: PositionOptions,
    /// Called after every applied update.
    pub on_update: Option<Box<dyn Fn(&Position)>>,
}

impl fmt::Debug for AutoPositionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoPositionConfig")
            .field("reference", &self.reference)
            .field("floating", &self.floating)
            .field("options", &self.options)
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

impl AutoPositionConfig {
    /// Anchor `floating` to `reference` with default options.
    pub fn new(reference: NodeId, floating: NodeId) -> Self {
        Self {
            reference,
            floating,
            options: PositionOptions::default(),
            on_update: None,
        }
    }

    /// Set the placement options.
    #[must_use]
    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    /// Observe every applied position.
    #[must_use]
    pub fn on_update(mut self, f: impl Fn(&Position) + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }
}

struct State {
    scheduler: Scheduler,
    cache: Cache,
    config: AutoPositionConfig,
    pending: Cell<Option<ScheduledTask>>,
    listeners: RefCell<Vec<ListenerId>>,
    observers: RefCell<Vec<ObserverId>>,
    stopped: Cell<bool>,
    last: Cell<Option<Position>>,
}

/// Handle returned by [`auto_position`].
#[derive(Clone)]
pub struct AutoPosition {
    state: Rc<State>,
}

impl fmt::Debug for AutoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoPosition")
            .field("config", &self.state.config)
            .field("stopped", &self.state.stopped.get())
            .field("last", &self.state.last.get())
            .finish_non_exhaustive()
    }
}

/// Keep `config.floating` positioned against `config.reference`.
///
/// Positions once immediately, then again on capture-phase scroll anywhere in the
/// document, on window resize, and whenever either element changes size. Updates are
/// coalesced to at most one per animation frame, and each one invalidates the cached
/// rects of both elements before measuring.
pub fn auto_position(scheduler: &Scheduler, cache: &Cache, config: AutoPositionConfig) -> AutoPosition {
    let doc = scheduler.document().clone();
    let (reference, floating) = (config.reference, config.floating);
    let state = Rc::new(State {
        scheduler: scheduler.clone(),
        cache: cache.clone(),
        config,
        pending: Cell::new(None),
        listeners: RefCell::new(Vec::new()),
        observers: RefCell::new(Vec::new()),
        stopped: Cell::new(false),
        last: Cell::new(None),
    });

    let weak = Rc::downgrade(&state);
    let on_scroll = doc.add_event_listener(
        EventTarget::Window,
        "scroll",
        ListenerOptions::capture().passive(),
        move |_| schedule(&weak),
    );
    let weak = Rc::downgrade(&state);
    let on_resize = doc.add_event_listener(
        EventTarget::Window,
        "resize",
        ListenerOptions::default().passive(),
        move |_| schedule(&weak),
    );
    state.listeners.borrow_mut().extend([on_scroll, on_resize]);

    for node in [reference, floating] {
        let weak = Rc::downgrade(&state);
        let id = doc.observe_resize(node, move |_, _| schedule(&weak));
        state.observers.borrow_mut().push(id);
    }

    let handle = AutoPosition { state };
    handle.update();
    handle
}

fn schedule(weak: &Weak<State>) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    if state.stopped.get() || state.pending.get().is_some() {
        return;
    }
    let weak = Rc::downgrade(&state);
    let task = state.scheduler.next_frame(move |_| {
        if let Some(state) = weak.upgrade() {
            state.pending.set(None);
            AutoPosition { state }.update();
        }
    });
    state.pending.set(Some(task));
}

impl AutoPosition {
    /// Re-measure and apply now. Returns `None` once stopped.
    pub fn update(&self) -> Option<Position> {
        let state = &self.state;
        if state.stopped.get() {
            return None;
        }
        let config = &state.config;
        let doc = state.scheduler.document();
        if !doc.is_connected(config.reference) || !doc.is_connected(config.floating) {
            tracing::trace!("auto position skipped: element not connected");
            return None;
        }
        state.cache.invalidate(config.reference);
        state.cache.invalidate(config.floating);
        let position = calculate_position(&state.cache, config.reference, config.floating, &config.options);
        apply_position(doc, config.floating, &position);
        state.last.set(Some(position));
        if let Some(on_update) = &config.on_update {
            on_update(&position);
        }
        Some(position)
    }

    /// The most recently applied position.
    pub fn last(&self) -> Option<Position> {
        self.state.last.get()
    }

    /// Whether [`AutoPosition::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.state.stopped.get()
    }

    /// Remove every listener and observer and cancel any pending frame. Idempotent.
    pub fn stop(&self) {
        let state = &self.state;
        if state.stopped.replace(true) {
            return;
        }
        let doc = state.scheduler.document();
        if let Some(task) = state.pending.take() {
            state.scheduler.cancel(task);
        }
        for id in state.listeners.take() {
            doc.remove_event_listener(id);
        }
        for id in state.observers.take() {
            doc.unobserve_resize(id);
        }
    }

    /// A disposer that stops this subscription.
    pub fn into_disposer(self) -> Disposer {
        Disposer::new(move || self.stop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bramble_dom::Document;
    use bramble_scheduler::CacheConfig;
    use kurbo::{Rect, Size};

    fn fixture() -> (Document, Scheduler, Cache, NodeId, NodeId) {
        let doc = Document::new();
        doc.set_viewport_size(Size::new(200.0, 150.0));
        let scheduler = Scheduler::new(doc.clone());
        let cache = Cache::new(doc.clone(), CacheConfig::default());
        let reference = doc.create_element("button");
        let floating = doc.create_element("div");
        doc.append_child(doc.body(), reference).unwrap();
        doc.append_child(doc.body(), floating).unwrap();
        doc.set_rect(reference, Rect::new(10.0, 10.0, 50.0, 30.0));
        doc.set_rect(floating, Rect::new(0.0, 0.0, 40.0, 20.0));
        (doc, scheduler, cache, reference, floating)
    }

    #[test]
    fn positions_immediately_and_coalesces_updates() {
        let (doc, scheduler, cache, reference, floating) = fixture();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let auto = auto_position(
            &scheduler,
            &cache,
            AutoPositionConfig::new(reference, floating).on_update(move |_| c.set(c.get() + 1)),
        );
        assert_eq!(count.get(), 1);
        assert_eq!(doc.style(floating, "top").as_deref(), Some("30px"));

        doc.set_rect(reference, Rect::new(10.0, 50.0, 50.0, 70.0));
        doc.dispatch_scroll(doc.body());
        doc.set_viewport_size(Size::new(300.0, 300.0));
        assert_eq!(count.get(), 1);
        doc.run_frame();
        assert_eq!(count.get(), 2);
        assert_eq!(doc.style(floating, "top").as_deref(), Some("70px"));

        auto.stop();
        doc.set_rect(reference, Rect::new(0.0, 0.0, 5.0, 5.0));
        doc.run_frame();
        assert_eq!(count.get(), 2);
        assert_eq!(doc.listener_count(EventTarget::Window), 1);
    }

    #[test]
    fn stop_cancels_a_pending_frame() {
        let (doc, scheduler, cache, reference, floating) = fixture();
        let auto = auto_position(&scheduler, &cache, AutoPositionConfig::new(reference, floating));
        doc.dispatch_scroll(reference);
        assert_eq!(doc.pending_frames(), 1);
        auto.into_disposer().dispose();
        assert_eq!(doc.pending_frames(), 0);
    }
}
