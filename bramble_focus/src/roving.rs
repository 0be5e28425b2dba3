// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Roving tabindex for composite widgets.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use bramble_dom::{Document, Event, ListenerId, ListenerOptions, NodeId};

/// Which arrow keys move through the items.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    /// Left and right.
    Horizontal,
    /// Up and down.
    #[default]
    Vertical,
    /// All four arrows.
    Both,
}

/// A movement request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Move {
    Next,
    Prev,
    First,
    Last,
}

impl Orientation {
    fn map_key(self, key: &str) -> Option<Move> {
        let horizontal = matches!(self, Self::Horizontal | Self::Both);
        let vertical = matches!(self, Self::Vertical | Self::Both);
        match key {
            "ArrowRight" if horizontal => Some(Move::Next),
            "ArrowLeft" if horizontal => Some(Move::Prev),
            "ArrowDown" if vertical => Some(Move::Next),
            "ArrowUp" if vertical => Some(Move::Prev),
            "Home" => Some(Move::First),
            "End" => Some(Move::Last),
            _ => None,
        }
    }
}

/// Options for [`RovingTabindex::new`].
#[derive(Clone)]
pub struct RovingOptions {
    /// Item that starts out focusable (clamped into range).
    pub initial_index: usize,
    /// Wrap past either end instead of stopping.
    pub wrap: bool,
    /// Arrow keys to respond to.
    pub orientation: Orientation,
    /// Called with the item and its index whenever the current item changes through focus.
    pub on_focus: Option<Rc<dyn Fn(NodeId, usize)>>,
}

impl Default for RovingOptions {
    fn default() -> Self {
        Self {
            initial_index: 0,
            wrap: true,
            orientation: Orientation::default(),
            on_focus: None,
        }
    }
}

impl fmt::Debug for RovingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RovingOptions")
            .field("initial_index", &self.initial_index)
            .field("wrap", &self.wrap)
            .field("orientation", &self.orientation)
            .field("on_focus", &self.on_focus.is_some())
            .finish()
    }
}

struct Bound {
    item: NodeId,
    keydown: ListenerId,
    focus: ListenerId,
}

struct RovingState {
    doc: Document,
    options: RovingOptions,
    items: RefCell<Vec<NodeId>>,
    current: Cell<usize>,
    bound: RefCell<Vec<Bound>>,
}

/// Keeps exactly one item of a composite widget in the Tab sequence.
///
/// The current item has `tabindex="0"` and every other item `tabindex="-1"`. Arrow
/// keys (per [`Orientation`]), `Home` and `End` move the current item and focus it.
///
/// ```
/// use bramble_dom::{Document, Event};
/// use bramble_focus::{RovingOptions, RovingTabindex};
///
/// let doc = Document::new();
/// let items: Vec<_> = (0..3)
///     .map(|_| {
///         let li = doc.create_element("li");
///         doc.append_child(doc.body(), li).unwrap();
///         li
///     })
///     .collect();
///
/// let roving = RovingTabindex::new(&doc, items.clone(), RovingOptions::default());
/// assert_eq!(doc.get_attribute(items[0], "tabindex").as_deref(), Some("0"));
///
/// doc.focus(items[0]);
/// doc.dispatch_event(items[0], &mut Event::keydown("ArrowDown"));
/// assert_eq!(roving.current_index(), 1);
/// assert_eq!(doc.active_element(), Some(items[1]));
/// assert_eq!(doc.get_attribute(items[0], "tabindex").as_deref(), Some("-1"));
/// ```
#[derive(Clone)]
pub struct RovingTabindex {
    state: Rc<RovingState>,
}

impl fmt::Debug for RovingTabindex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RovingTabindex")
            .field("items", &self.state.items.borrow().len())
            .field("current", &self.state.current.get())
            .field("options", &self.state.options)
            .finish_non_exhaustive()
    }
}

impl RovingTabindex {
    /// Manage `items` and attach keyboard and focus listeners to each.
    pub fn new(doc: &Document, items: Vec<NodeId>, options: RovingOptions) -> Self {
        let initial = options.initial_index;
        let roving = Self {
            state: Rc::new(RovingState {
                doc: doc.clone(),
                options,
                items: RefCell::new(Vec::new()),
                current: Cell::new(initial),
                bound: RefCell::new(Vec::new()),
            }),
        };
        roving.set_items(items);
        roving
    }

    /// Replace the managed items, rebinding listeners and clamping the current index.
    pub fn set_items(&self, items: Vec<NodeId>) {
        let state = &self.state;
        let doc = &state.doc;
        let stale: Vec<Bound> = {
            let mut bound = state.bound.borrow_mut();
            let (keep, stale): (Vec<_>, Vec<_>) =
                bound.drain(..).partition(|b| items.contains(&b.item));
            *bound = keep;
            stale
        };
        for b in stale {
            doc.remove_event_listener(b.keydown);
            doc.remove_event_listener(b.focus);
        }
        for &item in &items {
            if state.bound.borrow().iter().any(|b| b.item == item) {
                continue;
            }
            let weak = Rc::downgrade(state);
            let keydown = doc.add_event_listener(item, "keydown", ListenerOptions::default(), move |e| {
                on_keydown(&weak, item, e);
            });
            let weak = Rc::downgrade(state);
            let focus = doc.add_event_listener(item, "focus", ListenerOptions::default(), move |_| {
                on_item_focus(&weak, item);
            });
            state.bound.borrow_mut().push(Bound {
                item,
                keydown,
                focus,
            });
        }
        let len = items.len();
        *state.items.borrow_mut() = items;
        state.current.set(state.current.get().min(len.saturating_sub(1)));
        state.apply_tabindex();
    }

    /// The managed items.
    pub fn items(&self) -> Vec<NodeId> {
        self.state.items.borrow().clone()
    }

    /// Index of the item holding `tabindex="0"`.
    pub fn current_index(&self) -> usize {
        self.state.current.get()
    }

    /// The item holding `tabindex="0"`.
    pub fn current_item(&self) -> Option<NodeId> {
        self.state.items.borrow().get(self.state.current.get()).copied()
    }

    /// Make item `index` (clamped) current and focus it.
    pub fn focus_index(&self, index: usize) {
        self.state.focus_index(index);
    }

    /// Move to the next item.
    pub fn next(&self) {
        self.state.apply_move(Move::Next);
    }

    /// Move to the previous item.
    pub fn prev(&self) {
        self.state.apply_move(Move::Prev);
    }

    /// Move to the first item.
    pub fn first(&self) {
        self.state.apply_move(Move::First);
    }

    /// Move to the last item.
    pub fn last(&self) {
        self.state.apply_move(Move::Last);
    }

    /// Remove every listener. Tabindex attributes are left as they are.
    pub fn destroy(&self) {
        let bound = self.state.bound.take();
        for b in bound {
            self.state.doc.remove_event_listener(b.keydown);
            self.state.doc.remove_event_listener(b.focus);
        }
    }
}

/// The index `step` lands on from `current`, or `None` at an end without wrap.
fn target_index(len: usize, current: usize, step: Move, wrap: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match step {
        Move::First => Some(0),
        Move::Last => Some(len - 1),
        Move::Next if current + 1 < len => Some(current + 1),
        Move::Next => wrap.then_some(0),
        Move::Prev if current > 0 => Some(current - 1),
        Move::Prev => wrap.then_some(len - 1),
    }
}

impl RovingState {
    fn apply_tabindex(&self) {
        let current = self.current.get();
        let items = self.items.borrow().clone();
        for (i, item) in items.into_iter().enumerate() {
            let value = if i == current { "0" } else { "-1" };
            self.doc.set_attribute(item, "tabindex", value);
        }
    }

    fn apply_move(&self, step: Move) {
        let len = self.items.borrow().len();
        if let Some(index) = target_index(len, self.current.get(), step, self.options.wrap) {
            self.focus_index(index);
        }
    }

    fn focus_index(&self, index: usize) {
        let item = {
            let items = self.items.borrow();
            if items.is_empty() {
                return;
            }
            let index = index.min(items.len() - 1);
            self.current.set(index);
            items[index]
        };
        self.apply_tabindex();
        self.doc.focus(item);
        if let Some(on_focus) = &self.options.on_focus {
            on_focus(item, self.current.get());
        }
    }
}

fn on_keydown(weak: &Weak<RovingState>, item: NodeId, event: &mut Event) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let Some(step) = event.key().and_then(|k| state.options.orientation.map_key(k)) else {
        return;
    };
    event.prevent_default();
    let len = state.items.borrow().len();
    let from = state
        .items
        .borrow()
        .iter()
        .position(|&i| i == item)
        .unwrap_or(state.current.get());
    if let Some(index) = target_index(len, from, step, state.options.wrap) {
        state.focus_index(index);
    }
}

fn on_item_focus(weak: &Weak<RovingState>, item: NodeId) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let Some(index) = state.items.borrow().iter().position(|&i| i == item) else {
        return;
    };
    if index == state.current.get() {
        return;
    }
    state.current.set(index);
    state.apply_tabindex();
    if let Some(on_focus) = &state.options.on_focus {
        on_focus(item, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(doc: &Document, n: usize) -> Vec<NodeId> {
        (0..n)
            .map(|_| {
                let li = doc.create_element("li");
                doc.append_child(doc.body(), li).unwrap();
                li
            })
            .collect()
    }

    fn zero_count(doc: &Document, items: &[NodeId]) -> usize {
        items
            .iter()
            .filter(|&&i| doc.get_attribute(i, "tabindex").as_deref() == Some("0"))
            .count()
    }

    #[test]
    fn wraps_or_clamps_at_the_ends() {
        let doc = Document::new();
        let items = list(&doc, 3);
        let roving = RovingTabindex::new(&doc, items.clone(), RovingOptions::default());
        roving.prev();
        assert_eq!(roving.current_index(), 2);

        let doc = Document::new();
        let items = list(&doc, 3);
        let clamped = RovingTabindex::new(
            &doc,
            items,
            RovingOptions {
                wrap: false,
                initial_index: 2,
                ..RovingOptions::default()
            },
        );
        clamped.next();
        assert_eq!(clamped.current_index(), 2);
        clamped.first();
        assert_eq!(clamped.current_index(), 0);
    }

    #[test]
    fn orientation_filters_arrow_keys() {
        let doc = Document::new();
        let items = list(&doc, 3);
        let roving = RovingTabindex::new(
            &doc,
            items.clone(),
            RovingOptions {
                orientation: Orientation::Horizontal,
                ..RovingOptions::default()
            },
        );
        assert!(doc.dispatch_event(items[0], &mut Event::keydown("ArrowDown")));
        assert_eq!(roving.current_index(), 0);
        assert!(!doc.dispatch_event(items[0], &mut Event::keydown("ArrowRight")));
        assert_eq!(roving.current_index(), 1);
        doc.dispatch_event(items[1], &mut Event::keydown("End"));
        assert_eq!(roving.current_item(), Some(items[2]));
    }

    #[test]
    fn set_items_clamps_and_keeps_single_tab_stop() {
        let doc = Document::new();
        let items = list(&doc, 4);
        let roving = RovingTabindex::new(
            &doc,
            items.clone(),
            RovingOptions {
                initial_index: 3,
                ..RovingOptions::default()
            },
        );
        assert_eq!(zero_count(&doc, &items), 1);
        roving.set_items(items[..2].to_vec());
        assert_eq!(roving.current_index(), 1);
        assert_eq!(zero_count(&doc, &items[..2]), 1);
        assert_eq!(doc.listener_count(items[3]), 0);
        assert_eq!(doc.listener_count(items[0]), 2);
    }

    #[test]
    fn direct_focus_updates_current_and_reports() {
        let doc = Document::new();
        let items = list(&doc, 3);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let roving = RovingTabindex::new(
            &doc,
            items.clone(),
            RovingOptions {
                on_focus: Some(Rc::new(move |item, i| s.borrow_mut().push((item, i)))),
                ..RovingOptions::default()
            },
        );
        doc.focus(items[2]);
        assert_eq!(roving.current_index(), 2);
        assert_eq!(*seen.borrow(), vec![(items[2], 2)]);
        assert_eq!(zero_count(&doc, &items), 1);
        roving.destroy();
        assert_eq!(doc.listener_count(items[1]), 0);
    }
}
