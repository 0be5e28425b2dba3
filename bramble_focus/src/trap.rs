// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Modal focus containment.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use bramble_dom::{Document, Event, ListenerId, ListenerOptions, NodeId};

use crate::focusable::focusable_elements;

/// What receives focus when a trap activates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InitialFocus {
    /// The first focusable descendant, or the container if there is none.
    #[default]
    First,
    /// A specific element.
    Node(NodeId),
    /// The container itself (made focusable with `tabindex="-1"` if needed).
    Container,
    /// Leave focus where it is.
    None,
}

/// Options for [`FocusTrap::new`].
#[derive(Clone, Default)]
pub struct FocusTrapOptions {
    /// Where focus goes on activation.
    pub initial_focus: InitialFocus,
    /// Restore the previously focused element on deactivation, if still connected.
    pub return_focus: bool,
    /// Report Escape through `on_escape`.
    pub escape_deactivates: bool,
    /// Called on Escape. The trap does not deactivate itself.
    pub on_escape: Option<Rc<dyn Fn()>>,
}

impl fmt::Debug for FocusTrapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusTrapOptions")
            .field("initial_focus", &self.initial_focus)
            .field("return_focus", &self.return_focus)
            .field("escape_deactivates", &self.escape_deactivates)
            .field("on_escape", &self.on_escape.is_some())
            .finish()
    }
}

struct TrapState {
    doc: Document,
    container: NodeId,
    options: FocusTrapOptions,
    active: Cell<bool>,
    paused: Cell<bool>,
    redirecting: Cell<bool>,
    previous: Cell<Option<NodeId>>,
    listeners: RefCell<Vec<ListenerId>>,
}

/// Keeps keyboard focus inside a container while active.
///
/// Tab from the last focusable element wraps to the first, Shift+Tab from the first
/// wraps to the last, and focus that lands outside the container is pulled back to
/// its first focusable element.
///
/// ```
/// use bramble_dom::{Document, Event};
/// use bramble_focus::{FocusTrap, FocusTrapOptions};
///
/// let doc = Document::new();
/// let dialog = doc.create_element("div");
/// doc.append_child(doc.body(), dialog).unwrap();
/// let buttons: Vec<_> = (0..3)
///     .map(|_| {
///         let b = doc.create_element("button");
///         doc.append_child(dialog, b).unwrap();
///         b
///     })
///     .collect();
///
/// let trap = FocusTrap::new(&doc, dialog, FocusTrapOptions::default());
/// trap.activate();
/// assert_eq!(doc.active_element(), Some(buttons[0]));
///
/// doc.focus(buttons[2]);
/// let not_prevented = doc.dispatch_event(buttons[2], &mut Event::keydown("Tab"));
/// assert!(!not_prevented);
/// assert_eq!(doc.active_element(), Some(buttons[0]));
/// ```
#[derive(Clone)]
pub struct FocusTrap {
    state: Rc<TrapState>,
}

impl fmt::Debug for FocusTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusTrap")
            .field("container", &self.state.container)
            .field("active", &self.state.active.get())
            .field("paused", &self.state.paused.get())
            .finish_non_exhaustive()
    }
}

impl FocusTrap {
    /// Create an inactive trap for `container`.
    pub fn new(doc: &Document, container: NodeId, options: FocusTrapOptions) -> Self {
        Self {
            state: Rc::new(TrapState {
                doc: doc.clone(),
                container,
                options,
                active: Cell::new(false),
                paused: Cell::new(false),
                redirecting: Cell::new(false),
                previous: Cell::new(None),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The trapped container.
    pub fn container(&self) -> NodeId {
        self.state.container
    }

    /// Whether the trap is active (paused or not).
    pub fn is_active(&self) -> bool {
        self.state.active.get()
    }

    /// Whether the trap is active but paused.
    pub fn is_paused(&self) -> bool {
        self.state.paused.get()
    }

    /// Start trapping focus. No-op if already active.
    pub fn activate(&self) {
        let state = &self.state;
        if state.active.replace(true) {
            return;
        }
        state.paused.set(false);
        let doc = &state.doc;
        if state.options.return_focus {
            state.previous.set(doc.active_element());
        }
        let root = doc.root();
        let weak = Rc::downgrade(state);
        let keydown = doc.add_event_listener(root, "keydown", ListenerOptions::capture(), move |e| {
            on_keydown(&weak, e);
        });
        let weak = Rc::downgrade(state);
        let focusin = doc.add_event_listener(root, "focusin", ListenerOptions::capture(), move |e| {
            on_focusin(&weak, e);
        });
        state.listeners.borrow_mut().extend([keydown, focusin]);
        tracing::debug!(container = ?state.container, "focus trap activated");
        state.focus_initial();
    }

    /// Stop trapping and, if configured, restore the previously focused element.
    pub fn deactivate(&self) {
        let state = &self.state;
        if !state.active.replace(false) {
            return;
        }
        state.paused.set(false);
        for id in state.listeners.take() {
            state.doc.remove_event_listener(id);
        }
        tracing::debug!(container = ?state.container, "focus trap deactivated");
        if let Some(previous) = state.previous.take()
            && state.doc.is_connected(previous)
        {
            state.doc.focus(previous);
        }
    }

    /// Suspend containment without tearing down, for example while a nested trap runs.
    pub fn pause(&self) {
        if self.state.active.get() {
            self.state.paused.set(true);
        }
    }

    /// Resume containment, pulling focus back inside if it wandered off.
    pub fn unpause(&self) {
        let state = &self.state;
        if !state.active.get() || !state.paused.replace(false) {
            return;
        }
        let inside = state
            .doc
            .active_element()
            .is_some_and(|a| state.doc.contains(state.container, a));
        if !inside {
            state.focus_initial();
        }
    }
}

impl TrapState {
    fn focus_first_or_container(&self) {
        match focusable_elements(&self.doc, self.container).first() {
            Some(&first) => {
                self.doc.focus(first);
            }
            None => self.focus_container(),
        }
    }

    fn focus_container(&self) {
        if !self.doc.has_attribute(self.container, "tabindex") {
            self.doc.set_attribute(self.container, "tabindex", "-1");
        }
        self.doc.focus(self.container);
    }

    fn focus_initial(&self) {
        match self.options.initial_focus {
            InitialFocus::First => self.focus_first_or_container(),
            InitialFocus::Node(node) => {
                if !self.doc.focus(node) {
                    self.focus_first_or_container();
                }
            }
            InitialFocus::Container => self.focus_container(),
            InitialFocus::None => {}
        }
    }

    fn live(weak: &Weak<Self>) -> Option<Rc<Self>> {
        weak.upgrade()
            .filter(|s| s.active.get() && !s.paused.get())
    }
}

fn on_keydown(weak: &Weak<TrapState>, event: &mut Event) {
    let Some(state) = TrapState::live(weak) else {
        return;
    };
    match event.key() {
        Some("Escape") if state.options.escape_deactivates => {
            if let Some(on_escape) = &state.options.on_escape {
                on_escape();
            }
        }
        Some("Tab") => {
            let doc = &state.doc;
            let items = focusable_elements(doc, state.container);
            let (Some(&first), Some(&last)) = (items.first(), items.last()) else {
                event.prevent_default();
                state.focus_container();
                return;
            };
            let active = doc.active_element();
            let inside = active.is_some_and(|a| doc.contains(state.container, a));
            if event.shift_key() {
                if !inside || active == Some(first) || active == Some(state.container) {
                    event.prevent_default();
                    doc.focus(last);
                }
            } else if !inside || active == Some(last) {
                event.prevent_default();
                doc.focus(first);
            }
        }
        _ => {}
    }
}

fn on_focusin(weak: &Weak<TrapState>, event: &mut Event) {
    let Some(state) = TrapState::live(weak) else {
        return;
    };
    let Some(target) = event.target_node() else {
        return;
    };
    if state.doc.contains(state.container, target) || state.redirecting.get() {
        return;
    }
    state.redirecting.set(true);
    state.focus_first_or_container();
    state.redirecting.set(false);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog(doc: &Document, n: usize) -> (NodeId, Vec<NodeId>) {
        let container = doc.create_element("div");
        doc.append_child(doc.body(), container).unwrap();
        let items = (0..n)
            .map(|_| {
                let b = doc.create_element("button");
                doc.append_child(container, b).unwrap();
                b
            })
            .collect();
        (container, items)
    }

    #[test]
    fn shift_tab_on_first_wraps_to_last() {
        let doc = Document::new();
        let (container, items) = dialog(&doc, 3);
        let trap = FocusTrap::new(&doc, container, FocusTrapOptions::default());
        trap.activate();
        let prevented = !doc.dispatch_event(items[0], &mut Event::keydown("Tab").with_shift(true));
        assert!(prevented);
        assert_eq!(doc.active_element(), Some(items[2]));
        // Tab in the middle is left to the host.
        doc.focus(items[1]);
        assert!(doc.dispatch_event(items[1], &mut Event::keydown("Tab")));
        assert_eq!(doc.active_element(), Some(items[1]));
    }

    #[test]
    fn focus_escaping_is_pulled_back() {
        let doc = Document::new();
        let outside = doc.create_element("button");
        doc.append_child(doc.body(), outside).unwrap();
        let (container, items) = dialog(&doc, 2);
        let trap = FocusTrap::new(&doc, container, FocusTrapOptions::default());
        trap.activate();
        doc.focus(outside);
        assert_eq!(doc.active_element(), Some(items[0]));

        trap.pause();
        doc.focus(outside);
        assert_eq!(doc.active_element(), Some(outside));
        trap.unpause();
        assert_eq!(doc.active_element(), Some(items[0]));
    }

    #[test]
    fn deactivate_restores_connected_focus() {
        let doc = Document::new();
        let opener = doc.create_element("button");
        doc.append_child(doc.body(), opener).unwrap();
        doc.focus(opener);
        let (container, items) = dialog(&doc, 1);
        let trap = FocusTrap::new(
            &doc,
            container,
            FocusTrapOptions {
                return_focus: true,
                ..FocusTrapOptions::default()
            },
        );
        trap.activate();
        assert_eq!(doc.active_element(), Some(items[0]));
        trap.deactivate();
        assert!(!trap.is_active());
        assert_eq!(doc.active_element(), Some(opener));
        assert_eq!(doc.listener_count(doc.root()), 0);
    }

    #[test]
    fn escape_reports_without_deactivating() {
        let doc = Document::new();
        let (container, items) = dialog(&doc, 1);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let trap = FocusTrap::new(
            &doc,
            container,
            FocusTrapOptions {
                escape_deactivates: true,
                on_escape: Some(Rc::new(move || h.set(h.get() + 1))),
                ..FocusTrapOptions::default()
            },
        );
        trap.activate();
        doc.dispatch_event(items[0], &mut Event::keydown("Escape"));
        assert_eq!(hits.get(), 1);
        assert!(trap.is_active());
    }

    #[test]
    fn empty_container_keeps_focus_on_itself() {
        let doc = Document::new();
        let (container, _) = dialog(&doc, 0);
        let trap = FocusTrap::new(&doc, container, FocusTrapOptions::default());
        trap.activate();
        assert_eq!(doc.active_element(), Some(container));
        assert!(!doc.dispatch_event(container, &mut Event::keydown("Tab")));
        assert_eq!(doc.active_element(), Some(container));
    }
}
