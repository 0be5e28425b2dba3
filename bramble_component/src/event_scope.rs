// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delegated event handling under one root.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use bramble_dom::{
    CallbackResult, Document, DomError, Event, ListenerId, ListenerOptions, NodeId, SelectorList,
};
use hashbrown::HashMap;
use smallvec::SmallVec;

bitflags! {
    /// Per-binding modifiers.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventModifiers: u8 {
        /// Call `prevent_default` before the handler.
        const PREVENT = 1 << 0;
        /// Call `stop_propagation` before the handler.
        const STOP = 1 << 1;
        /// Listen in the capture phase.
        const CAPTURE = 1 << 2;
        /// Remove the binding after it fires once.
        const ONCE = 1 << 3;
    }
}

/// Identifies a binding registered with [`EventScope::on`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

type Handler = Rc<dyn Fn(&mut Event, NodeId) -> anyhow::Result<()>>;

struct Binding {
    id: BindingId,
    kind: String,
    selector: SelectorList,
    modifiers: EventModifiers,
    handler: Handler,
}

struct ScopeInner {
    doc: Document,
    root: NodeId,
    label: String,
    bindings: RefCell<Vec<Binding>>,
    listeners: RefCell<HashMap<(String, bool), ListenerId>>,
    next_id: Cell<u64>,
}

/// Delegated listeners for everything under one root element.
///
/// However many bindings are registered, the scope installs one native listener per
/// distinct `(event kind, capture)` pair on the root. When an event arrives, the
/// scope walks from the target up to the root and, at each node, fires every binding
/// whose selector matches that node (with `:scope` meaning the root).
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use bramble_component::{EventModifiers, EventScope};
/// use bramble_dom::{Document, Event};
///
/// let doc = Document::new();
/// let menu = doc.create_element("ul");
/// let item = doc.create_element("li");
/// doc.append_child(doc.body(), menu).unwrap();
/// doc.append_child(menu, item).unwrap();
///
/// let scope = EventScope::new(&doc, menu);
/// let hits = Rc::new(RefCell::new(Vec::new()));
/// let h = hits.clone();
/// scope
///     .on("click", "li", EventModifiers::PREVENT, move |_e, matched| h.borrow_mut().push(matched))
///     .unwrap();
///
/// assert!(!doc.dispatch_event(item, &mut Event::new("click")));
/// assert_eq!(*hits.borrow(), vec![item]);
/// scope.destroy();
/// assert_eq!(doc.listener_count(menu), 0);
/// ```
#[derive(Clone)]
pub struct EventScope {
    inner: Rc<ScopeInner>,
}

impl fmt::Debug for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventScope")
            .field("root", &self.inner.root)
            .field("bindings", &self.inner.bindings.borrow().len())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish_non_exhaustive()
    }
}

impl EventScope {
    /// Create an empty scope rooted at `root`.
    pub fn new(doc: &Document, root: NodeId) -> Self {
        Self::labelled(doc, root, "")
    }

    /// Create a scope whose handler failures are logged under `label` (the component tag).
    pub fn labelled(doc: &Document, root: NodeId, label: &str) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                doc: doc.clone(),
                root,
                label: label.to_owned(),
                bindings: RefCell::new(Vec::new()),
                listeners: RefCell::new(HashMap::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// Bind `handler` to `kind` events whose path passes through an element matching
    /// `selector`. The handler receives the event and the matched element.
    pub fn on<R: CallbackResult>(
        &self,
        kind: &str,
        selector: &str,
        modifiers: EventModifiers,
        handler: impl Fn(&mut Event, NodeId) -> R + 'static,
    ) -> Result<BindingId, DomError> {
        let selector = SelectorList::parse(selector)?;
        let inner = &self.inner;
        let id = BindingId(inner.next_id.get() + 1);
        inner.next_id.set(id.0);
        inner.bindings.borrow_mut().push(Binding {
            id,
            kind: kind.to_owned(),
            selector,
            modifiers,
            handler: Rc::new(move |e: &mut Event, n: NodeId| handler(e, n).into_result()),
        });
        let capture = modifiers.contains(EventModifiers::CAPTURE);
        let key = (kind.to_owned(), capture);
        if !inner.listeners.borrow().contains_key(&key) {
            let weak = Rc::downgrade(inner);
            let options = if capture {
                ListenerOptions::capture()
            } else {
                ListenerOptions::default()
            };
            let listener = inner.doc.add_event_listener(inner.root, kind, options, move |e| {
                dispatch(&weak, e, capture);
            });
            inner.listeners.borrow_mut().insert(key, listener);
        }
        Ok(id)
    }

    /// Remove a binding. The native listener goes once its last binding is gone.
    pub fn off(&self, id: BindingId) -> bool {
        let removed = {
            let mut bindings = self.inner.bindings.borrow_mut();
            let pos = bindings.iter().position(|b| b.id == id);
            pos.map(|p| bindings.remove(p))
        };
        match removed {
            Some(binding) => {
                let capture = binding.modifiers.contains(EventModifiers::CAPTURE);
                self.inner.release_if_unused(&binding.kind, capture);
                true
            }
            None => false,
        }
    }

    /// Number of live bindings.
    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    /// Number of native listeners installed on the root.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Remove every native listener and binding.
    pub fn destroy(&self) {
        self.inner.bindings.borrow_mut().clear();
        let listeners: Vec<ListenerId> = self
            .inner
            .listeners
            .borrow_mut()
            .drain()
            .map(|(_, id)| id)
            .collect();
        for id in listeners {
            self.inner.doc.remove_event_listener(id);
        }
    }
}

impl ScopeInner {
    fn release_if_unused(&self, kind: &str, capture: bool) {
        let used = self
            .bindings
            .borrow()
            .iter()
            .any(|b| b.kind == kind && b.modifiers.contains(EventModifiers::CAPTURE) == capture);
        if used {
            return;
        }
        let listener = self.listeners.borrow_mut().remove(&(kind.to_owned(), capture));
        if let Some(id) = listener {
            self.doc.remove_event_listener(id);
        }
    }
}

fn dispatch(weak: &Weak<ScopeInner>, event: &mut Event, capture: bool) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let Some(target) = event.target_node() else {
        return;
    };
    let doc = &inner.doc;
    let mut path: SmallVec<[NodeId; 8]> = SmallVec::new();
    let mut cursor = Some(target);
    while let Some(node) = cursor {
        path.push(node);
        if node == inner.root {
            break;
        }
        cursor = doc.parent(node);
    }
    if path.last() != Some(&inner.root) {
        return;
    }
    for node in path {
        let matched: Vec<(BindingId, EventModifiers, Handler)> = inner
            .bindings
            .borrow()
            .iter()
            .filter(|b| {
                b.kind == event.kind()
                    && b.modifiers.contains(EventModifiers::CAPTURE) == capture
                    && doc.matches_in_scope(node, &b.selector, inner.root)
            })
            .map(|b| (b.id, b.modifiers, b.handler.clone()))
            .collect();
        for (id, modifiers, handler) in matched {
            if !inner.bindings.borrow().iter().any(|b| b.id == id) {
                continue;
            }
            if modifiers.contains(EventModifiers::ONCE) {
                let scope = EventScope {
                    inner: inner.clone(),
                };
                scope.off(id);
            }
            if modifiers.contains(EventModifiers::PREVENT) {
                event.prevent_default();
            }
            if modifiers.contains(EventModifiers::STOP) {
                event.stop_propagation();
            }
            if let Err(err) = handler(event, node) {
                tracing::error!(
                    component = %inner.label,
                    phase = "event",
                    event = event.kind(),
                    error = %err,
                    "delegated handler failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        doc: Document,
        root: NodeId,
        item: NodeId,
        icon: NodeId,
    }

    fn fixture() -> Fixture {
        let doc = Document::new();
        let root = doc.create_element("div");
        let item = doc.create_element("button");
        let icon = doc.create_element("span");
        doc.set_attribute(item, "class", "item");
        doc.append_child(doc.body(), root).unwrap();
        doc.append_child(root, item).unwrap();
        doc.append_child(item, icon).unwrap();
        Fixture {
            doc,
            root,
            item,
            icon,
        }
    }

    #[test]
    fn one_native_listener_per_kind_and_phase() {
        let f = fixture();
        let scope = EventScope::new(&f.doc, f.root);
        for sel in [".item", "span", ":scope"] {
            scope.on("click", sel, EventModifiers::empty(), |_, _| {}).unwrap();
        }
        scope.on("keydown", ".item", EventModifiers::empty(), |_, _| {}).unwrap();
        let cap = scope.on("click", ".item", EventModifiers::CAPTURE, |_, _| {}).unwrap();
        assert_eq!(scope.binding_count(), 5);
        assert_eq!(scope.listener_count(), 3);
        assert_eq!(f.doc.listener_count(f.root), 3);
        assert!(scope.off(cap));
        assert_eq!(f.doc.listener_count(f.root), 2);
    }

    #[test]
    fn every_matching_ancestor_fires_innermost_first() {
        let f = fixture();
        let scope = EventScope::new(&f.doc, f.root);
        let log = Rc::new(RefCell::new(Vec::new()));
        for (sel, tag) in [(":scope", "root"), (".item", "item"), ("span", "icon")] {
            let log = log.clone();
            scope
                .on("click", sel, EventModifiers::empty(), move |_, n| {
                    log.borrow_mut().push((tag, n));
                })
                .unwrap();
        }
        f.doc.dispatch_event(f.icon, &mut Event::new("click"));
        assert_eq!(
            *log.borrow(),
            vec![("icon", f.icon), ("item", f.item), ("root", f.root)]
        );
    }

    #[test]
    fn once_and_stop() {
        let f = fixture();
        let scope = EventScope::new(&f.doc, f.root);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        scope
            .on("click", ".item", EventModifiers::ONCE | EventModifiers::STOP, move |_, _| {
                h.set(h.get() + 1);
            })
            .unwrap();
        let outer = Rc::new(Cell::new(0));
        let o = outer.clone();
        f.doc
            .add_event_listener(f.doc.body(), "click", ListenerOptions::default(), move |_| {
                o.set(o.get() + 1);
            });
        f.doc.dispatch_event(f.icon, &mut Event::new("click"));
        f.doc.dispatch_event(f.icon, &mut Event::new("click"));
        assert_eq!(hits.get(), 1);
        assert_eq!(outer.get(), 1);
        assert_eq!(scope.listener_count(), 0);
    }

    #[test]
    fn failing_handler_does_not_block_siblings() {
        let f = fixture();
        let scope = EventScope::labelled(&f.doc, f.root, "x-test");
        scope
            .on("click", ".item", EventModifiers::empty(), |_, _| -> anyhow::Result<()> {
                Err(anyhow::anyhow!("boom"))
            })
            .unwrap();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        scope
            .on("click", ".item", EventModifiers::empty(), move |_, _| h.set(h.get() + 1))
            .unwrap();
        f.doc.dispatch_event(f.item, &mut Event::new("click"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let f = fixture();
        let scope = EventScope::new(&f.doc, f.root);
        assert!(scope.on("click", "[", EventModifiers::empty(), |_, _| {}).is_err());
        assert_eq!(scope.listener_count(), 0);
    }

    #[test]
    fn destroy_clears_everything() {
        let f = fixture();
        let scope = EventScope::new(&f.doc, f.root);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        scope
            .on("click", ".item", EventModifiers::empty(), move |_, _| h.set(h.get() + 1))
            .unwrap();
        scope.destroy();
        f.doc.dispatch_event(f.item, &mut Event::new("click"));
        assert_eq!(hits.get(), 0);
        assert_eq!(scope.binding_count(), 0);
        assert_eq!(f.doc.listener_count(f.root), 0);
    }
}
