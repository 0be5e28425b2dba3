// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared document handle.
//!
//! [`Document`] is a cheap-to-clone handle over one node arena, its listeners,
//! custom-element definitions, observers and window queues. Every method takes
//! a short borrow of the shared state and releases it before calling back into
//! author code, so listeners, hooks and frame callbacks may freely call back
//! into the document.

use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use kurbo::{Rect, Size};

use crate::error::{CallbackResult, DomError};
use crate::event::{Event, ListenerOptions, emit_path};
use crate::selector::SelectorList;
use crate::tree::Tree;
use crate::types::{
    EventTarget, FrameHandle, IdleHandle, ListenerId, NodeId, NodeKind, ObserverId, TimerHandle,
};
use crate::window::{WindowConfig, WindowState};

/// Names the custom element grammar reserves.
const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Lifecycle reactions for a defined custom element.
///
/// Registered with [`Document::define`]. The document invokes these with no
/// internal borrows held, so implementations may mutate the document.
pub trait ElementHooks {
    /// The element became connected (inserted, moved, or upgraded by `define`).
    fn connected(&self, doc: &Document, node: NodeId);

    /// The element stopped being connected (removed, or moved; a move is
    /// reported as `disconnected` followed by `connected`).
    fn disconnected(&self, doc: &Document, node: NodeId);

    /// Attribute names for which [`ElementHooks::attribute_changed`] fires.
    fn observed_attributes(&self) -> &[String] {
        &[]
    }

    /// An observed attribute was set or removed. Fires even when the value is unchanged.
    fn attribute_changed(
        &self,
        doc: &Document,
        node: NodeId,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        let _ = (doc, node, name, old, new);
    }
}

/// Whether `name` is a valid custom element name.
///
/// It must start with a lowercase ASCII letter, contain a hyphen, contain no
/// uppercase ASCII letters, and not be one of the reserved names.
///
/// ```
/// use bramble_dom::is_valid_custom_element_name;
///
/// assert!(is_valid_custom_element_name("x-menu"));
/// assert!(!is_valid_custom_element_name("menu"));
/// assert!(!is_valid_custom_element_name("X-Menu"));
/// assert!(!is_valid_custom_element_name("font-face"));
/// ```
pub fn is_valid_custom_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && name.contains('-')
        && name
            .chars()
            .all(|c| !c.is_ascii_uppercase() && (c.is_alphanumeric() || "-._".contains(c)))
        && !RESERVED_NAMES.contains(&name)
}

type ListenerFn = Rc<dyn Fn(&mut Event) -> anyhow::Result<()>>;
type ResizeFn = Rc<dyn Fn(NodeId, Rect)>;
type DisposalFn = Rc<dyn Fn(NodeId)>;
type Reactions = Vec<(NodeId, Rc<dyn ElementHooks>)>;

struct Listener {
    id: ListenerId,
    target: EventTarget,
    kind: String,
    capture: bool,
    passive: bool,
    once: bool,
    callback: ListenerFn,
}

struct DocumentState {
    tree: Tree,
    window: WindowState,
    listeners: Vec<Listener>,
    next_id: u64,
    active: Option<NodeId>,
    definitions: HashMap<String, Rc<dyn ElementHooks>>,
    resize_observers: Vec<(ObserverId, NodeId, ResizeFn)>,
    disposal_hooks: Vec<(ObserverId, DisposalFn)>,
}

impl DocumentState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Defined custom elements in the subtree rooted at `root`, in tree order.
    fn reactions(&self, root: NodeId) -> Reactions {
        if self.definitions.is_empty() {
            return Vec::new();
        }
        self.tree
            .inclusive_descendants(root)
            .into_iter()
            .filter_map(|n| {
                let tag = self.tree.tag(n)?;
                self.definitions.get(tag).map(|h| (n, h.clone()))
            })
            .collect()
    }

    /// Drop focus if the active element is no longer connected.
    fn focus_fixup(&mut self) {
        if let Some(active) = self.active
            && !self.tree.is_connected(active)
        {
            self.active = None;
        }
    }
}

/// Shared handle to a headless document.
///
/// ```
/// use bramble_dom::Document;
///
/// let doc = Document::new();
/// let button = doc.create_element("button");
/// doc.append_child(doc.body(), button).unwrap();
/// doc.set_attribute(button, "class", "primary");
/// assert_eq!(doc.query_selector(doc.body(), "button.primary").unwrap(), Some(button));
/// ```
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentState>>,
}

/// Non-owning handle to a [`Document`], for closures the document itself stores.
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<RefCell<DocumentState>>,
}

impl fmt::Debug for WeakDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDocument")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl WeakDocument {
    /// Recover a strong handle while the document is alive.
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.inner.borrow();
        f.debug_struct("Document")
            .field("tree", &s.tree)
            .field("window", &s.window)
            .field("listeners", &s.listeners.len())
            .field("definitions", &s.definitions.len())
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with a default window.
    pub fn new() -> Self {
        Self::with_config(WindowConfig::default())
    }

    /// Create a document with an explicit window configuration.
    pub fn with_config(config: WindowConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DocumentState {
                tree: Tree::new(),
                window: WindowState::new(config),
                listeners: Vec::new(),
                next_id: 0,
                active: None,
                definitions: HashMap::new(),
                resize_observers: Vec::new(),
                disposal_hooks: Vec::new(),
            })),
        }
    }

    /// A weak handle for storing inside the document's own callbacks.
    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same document.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // --- structure ---

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.inner.borrow().tree.root()
    }

    /// The `<body>` element.
    pub fn body(&self) -> NodeId {
        self.inner.borrow().tree.body()
    }

    /// Create a detached element. Tags are lowercased.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .tree
            .insert(NodeKind::Element(tag.to_ascii_lowercase()))
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .tree
            .insert(NodeKind::Text(text.to_owned()))
    }

    /// Append `child` as the last child of `parent`, moving it if attached elsewhere.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or last when `reference` is
    /// `None` or not a child of `parent`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let (removed, added) = {
            let mut s = self.inner.borrow_mut();
            let was_connected = s.tree.is_connected(child);
            let removed = if was_connected {
                s.reactions(child)
            } else {
                Vec::new()
            };
            s.tree.insert_before(parent, child, reference)?;
            let added = if s.tree.is_connected(child) {
                s.reactions(child)
            } else {
                Vec::new()
            };
            (removed, added)
        };
        self.run_disconnected(removed);
        self.run_connected(added);
        Ok(())
    }

    /// Detach `node` from its parent. The node stays alive and can be reinserted.
    pub fn remove(&self, node: NodeId) {
        let removed = {
            let mut s = self.inner.borrow_mut();
            if s.tree.parent_of(node).is_none() {
                return;
            }
            let removed = if s.tree.is_connected(node) {
                s.reactions(node)
            } else {
                Vec::new()
            };
            s.tree.detach(node);
            s.focus_fixup();
            removed
        };
        self.run_disconnected(removed);
    }

    /// Detach and free `node` with its subtree.
    ///
    /// Listeners and resize observations on freed nodes are dropped, and every
    /// disposal hook runs once per freed node. The document node and `<body>`
    /// cannot be destroyed.
    pub fn destroy(&self, node: NodeId) {
        if node == self.root() || node == self.body() || !self.is_alive(node) {
            return;
        }
        self.remove(node);
        let (freed, hooks, _dropped_listeners, _dropped_observers) = {
            let mut s = self.inner.borrow_mut();
            let freed = s.tree.free_subtree(node);
            if freed.is_empty() {
                return;
            }
            let is_freed = |t: &EventTarget| matches!(t, EventTarget::Node(n) if freed.contains(n));
            let (dropped, kept): (Vec<_>, Vec<_>) = core::mem::take(&mut s.listeners)
                .into_iter()
                .partition(|l| is_freed(&l.target));
            s.listeners = kept;
            let (gone, live): (Vec<_>, Vec<_>) = core::mem::take(&mut s.resize_observers)
                .into_iter()
                .partition(|(_, n, _)| freed.contains(n));
            s.resize_observers = live;
            s.focus_fixup();
            let hooks: Vec<DisposalFn> = s.disposal_hooks.iter().map(|(_, h)| h.clone()).collect();
            (freed, hooks, dropped, gone)
        };
        tracing::trace!(count = freed.len(), "destroyed nodes");
        for n in freed {
            for hook in &hooks {
                hook(n);
            }
        }
    }

    fn run_disconnected(&self, reactions: Reactions) {
        for (node, hooks) in reactions {
            hooks.disconnected(self, node);
        }
    }

    fn run_connected(&self, reactions: Reactions) {
        for (node, hooks) in reactions {
            if self.is_connected(node) {
                hooks.connected(self, node);
            }
        }
    }

    /// Whether `node` is alive.
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.inner.borrow().tree.is_alive(node)
    }

    /// Node kind, for live nodes.
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.borrow().tree.kind(node).cloned()
    }

    /// Lowercase tag name for elements.
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.inner.borrow().tree.tag(node).map(str::to_owned)
    }

    /// Whether `node` is an element.
    pub fn is_element(&self, node: NodeId) -> bool {
        self.inner.borrow().tree.is_element(node)
    }

    /// Parent node.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().tree.parent_of(node)
    }

    /// Parent, when it is an element.
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let s = self.inner.borrow();
        s.tree.parent_of(node).filter(|&p| s.tree.is_element(p))
    }

    /// All child nodes in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.borrow().tree.children_of(node).to_vec()
    }

    /// Element children in order.
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        let s = self.inner.borrow();
        s.tree
            .children_of(node)
            .iter()
            .copied()
            .filter(|&c| s.tree.is_element(c))
            .collect()
    }

    /// The following sibling.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().tree.next_sibling(node)
    }

    /// Inclusive containment: `contains(a, a)` is true.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.borrow().tree.contains(ancestor, node)
    }

    /// Whether the node is reachable from the document node.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.inner.borrow().tree.is_connected(node)
    }

    /// Counter bumped by every child-list change anywhere in the document.
    pub fn mutation_epoch(&self) -> u64 {
        self.inner.borrow().tree.epoch()
    }

    // --- attributes ---

    /// Read an attribute.
    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .tree
            .attribute(node, name)
            .map(str::to_owned)
    }

    /// Whether the attribute is present.
    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner.borrow().tree.attribute(node, name).is_some()
    }

    /// All attributes in insertion order.
    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.inner.borrow().tree.attributes(node).to_vec()
    }

    /// Set an attribute on an element.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let reaction = {
            let mut s = self.inner.borrow_mut();
            if !s.tree.is_element(node) {
                return;
            }
            let old = s.tree.set_attribute(node, name, value);
            Self::attribute_reaction(&s, node, name).map(|hooks| (hooks, old))
        };
        if let Some((hooks, old)) = reaction {
            hooks.attribute_changed(self, node, name, old.as_deref(), Some(value));
        }
    }

    /// Remove an attribute from an element.
    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let reaction = {
            let mut s = self.inner.borrow_mut();
            let Some(old) = s.tree.remove_attribute(node, name) else {
                return;
            };
            Self::attribute_reaction(&s, node, name).map(|hooks| (hooks, old))
        };
        if let Some((hooks, old)) = reaction {
            hooks.attribute_changed(self, node, name, Some(&old), None);
        }
    }

    fn attribute_reaction(
        s: &DocumentState,
        node: NodeId,
        name: &str,
    ) -> Option<Rc<dyn ElementHooks>> {
        let hooks = s.definitions.get(s.tree.tag(node)?)?;
        hooks
            .observed_attributes()
            .iter()
            .any(|a| a == name)
            .then(|| hooks.clone())
    }

    /// Whether the `class` attribute lists `class`.
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.inner.borrow().tree.has_class(node, class)
    }

    /// Add a class if missing.
    pub fn add_class(&self, node: NodeId, class: &str) {
        if class.is_empty() || self.has_class(node, class) {
            return;
        }
        let mut list = self.get_attribute(node, "class").unwrap_or_default();
        if !list.trim().is_empty() {
            list.push(' ');
        }
        list.push_str(class);
        self.set_attribute(node, "class", list.trim());
    }

    /// Remove a class if present.
    pub fn remove_class(&self, node: NodeId, class: &str) {
        if !self.has_class(node, class) {
            return;
        }
        let list = self.get_attribute(node, "class").unwrap_or_default();
        let kept: Vec<&str> = list
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect();
        self.set_attribute(node, "class", &kept.join(" "));
    }

    /// Toggle a class, returning whether it is now present.
    pub fn toggle_class(&self, node: NodeId, class: &str, force: Option<bool>) -> bool {
        let on = force.unwrap_or(!self.has_class(node, class));
        if on {
            self.add_class(node, class);
        } else {
            self.remove_class(node, class);
        }
        on
    }

    /// First connected element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let s = self.inner.borrow();
        s.tree
            .descendants(s.tree.root())
            .into_iter()
            .find(|&n| s.tree.attribute(n, "id") == Some(id))
    }

    // --- style and layout ---

    /// Read an inline style property.
    pub fn style(&self, node: NodeId, prop: &str) -> Option<String> {
        self.inner.borrow().tree.style(node, prop).map(str::to_owned)
    }

    /// Set an inline style property.
    pub fn set_style(&self, node: NodeId, prop: &str, value: &str) {
        self.inner.borrow_mut().tree.set_style(node, prop, value);
    }

    /// Remove an inline style property.
    pub fn remove_style(&self, node: NodeId, prop: &str) {
        self.inner.borrow_mut().tree.remove_style(node, prop);
    }

    /// The border box in viewport coordinates, as last assigned by the host.
    pub fn bounding_client_rect(&self, node: NodeId) -> Rect {
        self.inner.borrow().tree.rect(node)
    }

    /// Assign a layout box. Resize observers on `node` fire when its size changes.
    pub fn set_rect(&self, node: NodeId, rect: Rect) {
        let observers: Vec<ResizeFn> = {
            let mut s = self.inner.borrow_mut();
            let Some(old) = s.tree.set_rect(node, rect) else {
                return;
            };
            if old.size() == rect.size() {
                return;
            }
            s.resize_observers
                .iter()
                .filter(|(_, n, _)| *n == node)
                .map(|(_, _, cb)| cb.clone())
                .collect()
        };
        for cb in observers {
            cb(node, rect);
        }
    }

    /// Connected and not inside a `display: none` subtree.
    pub fn is_rendered(&self, node: NodeId) -> bool {
        self.inner.borrow().tree.is_rendered(node)
    }

    /// Whether inherited `visibility` hides the node.
    pub fn is_visibility_hidden(&self, node: NodeId) -> bool {
        self.inner.borrow().tree.is_visibility_hidden(node)
    }

    /// Whether the element would report an offset parent.
    pub fn has_offset_parent(&self, node: NodeId) -> bool {
        self.inner.borrow().tree.has_offset_parent(node)
    }

    /// Whether [`Document::focus`] would accept this node.
    pub fn is_focusable_candidate(&self, node: NodeId) -> bool {
        self.inner.borrow().tree.is_focusable_candidate(node)
    }

    /// Watch `node` for size changes.
    pub fn observe_resize(&self, node: NodeId, callback: impl Fn(NodeId, Rect) + 'static) -> ObserverId {
        let mut s = self.inner.borrow_mut();
        let id = ObserverId(s.next_id());
        s.resize_observers.push((id, node, Rc::new(callback)));
        id
    }

    /// Stop a resize observation.
    pub fn unobserve_resize(&self, id: ObserverId) {
        let _removed = {
            let mut s = self.inner.borrow_mut();
            let pos = s.resize_observers.iter().position(|(i, _, _)| *i == id);
            pos.map(|p| s.resize_observers.remove(p))
        };
    }

    /// Run `hook` for every node freed by [`Document::destroy`].
    pub fn add_disposal_hook(&self, hook: impl Fn(NodeId) + 'static) -> ObserverId {
        let mut s = self.inner.borrow_mut();
        let id = ObserverId(s.next_id());
        s.disposal_hooks.push((id, Rc::new(hook)));
        id
    }

    /// Remove a disposal hook.
    pub fn remove_disposal_hook(&self, id: ObserverId) {
        let _removed = {
            let mut s = self.inner.borrow_mut();
            let pos = s.disposal_hooks.iter().position(|(i, _)| *i == id);
            pos.map(|p| s.disposal_hooks.remove(p))
        };
    }

    // --- selectors ---

    /// Whether `node` matches `selector`.
    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool, DomError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.matches_selector(node, &list))
    }

    /// Whether `node` matches a parsed selector (`:scope` is the node itself).
    pub fn matches_selector(&self, node: NodeId, selector: &SelectorList) -> bool {
        selector.matches(&self.inner.borrow().tree, node, Some(node))
    }

    /// Whether `node` matches a parsed selector with `:scope` bound to `scope`.
    pub fn matches_in_scope(&self, node: NodeId, selector: &SelectorList, scope: NodeId) -> bool {
        selector.matches(&self.inner.borrow().tree, node, Some(scope))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let list = SelectorList::parse(selector)?;
        let s = self.inner.borrow();
        let mut cur = Some(node);
        while let Some(c) = cur {
            if list.matches(&s.tree, c, Some(node)) {
                return Ok(Some(c));
            }
            cur = s.tree.parent_of(c);
        }
        Ok(None)
    }

    /// First descendant of `root` matching `selector`, in document order.
    pub fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_first(root, &list))
    }

    /// All descendants of `root` matching `selector`, in document order.
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_all(root, &list))
    }

    /// [`Document::query_selector`] with a parsed selector.
    pub fn select_first(&self, root: NodeId, selector: &SelectorList) -> Option<NodeId> {
        let s = self.inner.borrow();
        s.tree
            .descendants(root)
            .into_iter()
            .find(|&n| selector.matches(&s.tree, n, Some(root)))
    }

    /// [`Document::query_selector_all`] with a parsed selector.
    pub fn select_all(&self, root: NodeId, selector: &SelectorList) -> Vec<NodeId> {
        let s = self.inner.borrow();
        s.tree
            .descendants(root)
            .into_iter()
            .filter(|&n| selector.matches(&s.tree, n, Some(root)))
            .collect()
    }

    // --- events ---

    /// Register a listener. Returns a handle for [`Document::remove_event_listener`].
    ///
    /// A listener whose `signal` has already aborted is never registered.
    pub fn add_event_listener<R: CallbackResult>(
        &self,
        target: impl Into<EventTarget>,
        kind: &str,
        options: ListenerOptions,
        callback: impl Fn(&mut Event) -> R + 'static,
    ) -> ListenerId {
        let target = target.into();
        let id = {
            let mut s = self.inner.borrow_mut();
            let id = ListenerId(s.next_id());
            if options.signal.as_ref().is_some_and(|sig| sig.aborted()) {
                return id;
            }
            s.listeners.push(Listener {
                id,
                target,
                kind: kind.to_owned(),
                capture: options.capture,
                passive: options.passive,
                once: options.once,
                callback: Rc::new(move |e: &mut Event| callback(e).into_result()),
            });
            id
        };
        if let Some(signal) = options.signal {
            let weak = self.downgrade();
            signal.on_abort(move || {
                if let Some(doc) = weak.upgrade() {
                    doc.remove_event_listener(id);
                }
            });
        }
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let removed = {
            let mut s = self.inner.borrow_mut();
            let pos = s.listeners.iter().position(|l| l.id == id);
            pos.map(|p| s.listeners.remove(p))
        };
        removed.is_some()
    }

    /// Number of listeners registered on `target`.
    pub fn listener_count(&self, target: impl Into<EventTarget>) -> usize {
        let target = target.into();
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.target == target)
            .count()
    }

    /// Dispatch `event` to `target`. Returns `false` if a listener prevented the default.
    ///
    /// Listener failures are logged and do not stop propagation.
    pub fn dispatch_event(&self, target: impl Into<EventTarget>, event: &mut Event) -> bool {
        let target = target.into();
        let path: Vec<EventTarget> = {
            let s = self.inner.borrow();
            match target {
                EventTarget::Window => vec![EventTarget::Window],
                EventTarget::Node(n) => {
                    if !s.tree.is_alive(n) {
                        return true;
                    }
                    let mut path = Vec::new();
                    if s.tree.is_connected(n) {
                        path.push(EventTarget::Window);
                    }
                    path.extend(s.tree.path_to(n).into_iter().map(EventTarget::Node));
                    path
                }
            }
        };
        event.target = Some(target);
        for step in emit_path(&path, event.bubbles()) {
            let mut batch: Vec<(ListenerId, bool, bool, bool, ListenerFn)> = {
                let s = self.inner.borrow();
                s.listeners
                    .iter()
                    .filter(|l| {
                        l.target == step.target
                            && l.kind == event.kind()
                            && step.capture.is_none_or(|c| l.capture == c)
                    })
                    .map(|l| (l.id, l.capture, l.passive, l.once, l.callback.clone()))
                    .collect()
            };
            if step.capture.is_none() {
                // At the target, capture listeners run first.
                batch.sort_by_key(|(_, capture, ..)| !*capture);
            }
            event.phase = step.phase;
            event.current_target = Some(step.target);
            for (id, _, passive, once, callback) in batch {
                let live = self.inner.borrow().listeners.iter().any(|l| l.id == id);
                if !live {
                    continue;
                }
                if once {
                    self.remove_event_listener(id);
                }
                event.in_passive_listener = passive;
                if let Err(err) = callback(event) {
                    tracing::error!(event = event.kind(), error = %err, "event listener failed");
                }
                event.in_passive_listener = false;
                if event.immediate_stopped() {
                    break;
                }
            }
            if event.propagation_stopped() {
                break;
            }
        }
        event.reset_dispatch_flags();
        !event.default_prevented()
    }

    // --- focus ---

    /// The focused element.
    pub fn active_element(&self) -> Option<NodeId> {
        self.inner.borrow().active
    }

    /// Focus `node` if it is focusable, firing `blur`/`focusout` on the previous
    /// element and `focus`/`focusin` on the new one. Returns whether `node` ended up focused.
    pub fn focus(&self, node: NodeId) -> bool {
        let old = {
            let mut s = self.inner.borrow_mut();
            if !s.tree.is_focusable_candidate(node) {
                return false;
            }
            if s.active == Some(node) {
                return true;
            }
            s.active.replace(node)
        };
        if let Some(old) = old.filter(|&o| self.is_alive(o)) {
            self.dispatch_event(old, &mut Event::new("blur"));
            self.dispatch_event(old, &mut Event::new("focusout"));
        }
        if self.active_element() != Some(node) {
            return false;
        }
        self.dispatch_event(node, &mut Event::new("focus"));
        self.dispatch_event(node, &mut Event::new("focusin"));
        self.active_element() == Some(node)
    }

    /// Clear focus.
    pub fn blur(&self) {
        let old = self.inner.borrow_mut().active.take();
        if let Some(old) = old.filter(|&o| self.is_alive(o)) {
            self.dispatch_event(old, &mut Event::new("blur"));
            self.dispatch_event(old, &mut Event::new("focusout"));
        }
    }

    // --- custom elements ---

    /// Define a custom element. Already-connected elements with this tag are upgraded.
    pub fn define(&self, tag: &str, hooks: Rc<dyn ElementHooks>) -> Result<(), DomError> {
        if !is_valid_custom_element_name(tag) {
            return Err(DomError::InvalidName(tag.to_owned()));
        }
        let upgrades: Reactions = {
            let mut s = self.inner.borrow_mut();
            if s.definitions.contains_key(tag) {
                return Err(DomError::AlreadyDefined(tag.to_owned()));
            }
            s.definitions.insert(tag.to_owned(), hooks.clone());
            s.tree
                .descendants(s.tree.root())
                .into_iter()
                .filter(|&n| s.tree.tag(n) == Some(tag))
                .map(|n| (n, hooks.clone()))
                .collect()
        };
        self.run_connected(upgrades);
        Ok(())
    }

    /// Whether `tag` has been defined.
    pub fn is_defined(&self, tag: &str) -> bool {
        self.inner.borrow().definitions.contains_key(tag)
    }

    // --- window ---

    /// Milliseconds since the document was created, as driven by the host.
    pub fn now(&self) -> f64 {
        self.inner.borrow().window.now
    }

    /// Viewport size.
    pub fn viewport(&self) -> Size {
        self.inner.borrow().window.viewport
    }

    /// Resize the viewport and dispatch `resize` on the window.
    pub fn set_viewport_size(&self, size: Size) {
        self.inner.borrow_mut().window.viewport = size;
        self.dispatch_event(EventTarget::Window, &mut Event::new("resize"));
    }

    /// Dispatch a non-bubbling `scroll` event at `node`.
    pub fn dispatch_scroll(&self, node: NodeId) {
        self.dispatch_event(node, &mut Event::new("scroll"));
    }

    /// Schedule `callback` for the next frame.
    pub fn request_animation_frame(&self, callback: impl FnOnce(f64) + 'static) -> FrameHandle {
        self.inner
            .borrow_mut()
            .window
            .request_frame(Box::new(callback))
    }

    /// Cancel a pending frame callback.
    pub fn cancel_animation_frame(&self, handle: FrameHandle) {
        let _cancelled = self.inner.borrow_mut().window.cancel_frame(handle);
    }

    /// Number of frame callbacks waiting for the next frame.
    pub fn pending_frames(&self) -> usize {
        self.inner.borrow().window.pending_frames()
    }

    /// Run `callback` once `delay_ms` has elapsed.
    pub fn set_timeout(&self, callback: impl FnOnce() + 'static, delay_ms: f64) -> TimerHandle {
        self.inner
            .borrow_mut()
            .window
            .set_timeout(delay_ms, Box::new(callback))
    }

    /// Cancel a pending timer.
    pub fn clear_timeout(&self, handle: TimerHandle) {
        let _cancelled = self.inner.borrow_mut().window.clear_timeout(handle);
    }

    /// Number of timers that have not fired yet.
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().window.pending_timers()
    }

    /// Whether the host offers idle callbacks.
    pub fn supports_idle_callbacks(&self) -> bool {
        self.inner.borrow().window.config.idle_callbacks
    }

    /// Schedule an idle callback.
    ///
    /// Hosts without idle callbacks never run these; check
    /// [`Document::supports_idle_callbacks`] first.
    pub fn request_idle_callback(&self, callback: impl FnOnce() + 'static) -> IdleHandle {
        self.inner
            .borrow_mut()
            .window
            .request_idle(Box::new(callback))
    }

    /// Cancel a pending idle callback.
    pub fn cancel_idle_callback(&self, handle: IdleHandle) {
        let _cancelled = self.inner.borrow_mut().window.cancel_idle(handle);
    }

    /// Advance one frame: fire due timers, then the frame callbacks registered
    /// before this frame began, then idle callbacks.
    pub fn run_frame(&self) {
        let timers = {
            let mut s = self.inner.borrow_mut();
            s.window.now += s.window.config.frame_interval_ms;
            s.window.due_timers()
        };
        for handle in timers {
            let timer = self.inner.borrow_mut().window.clear_timeout(handle);
            if let Some(timer) = timer {
                timer();
            }
        }
        let (frames, now) = {
            let s = self.inner.borrow();
            (s.window.frame_batch(), s.window.now)
        };
        for handle in frames {
            let frame = self.inner.borrow_mut().window.cancel_frame(handle);
            if let Some(frame) = frame {
                frame(now);
            }
        }
        let idle = {
            let s = self.inner.borrow();
            if s.window.config.idle_callbacks {
                s.window.idle_batch()
            } else {
                Vec::new()
            }
        };
        for handle in idle {
            let cb = self.inner.borrow_mut().window.cancel_idle(handle);
            if let Some(cb) = cb {
                cb();
            }
        }
    }

    /// Run as many frames as it takes for `ms` milliseconds to elapse.
    pub fn advance(&self, ms: f64) {
        let interval = self.inner.borrow().window.config.frame_interval_ms;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "Frame counts are small and non-negative."
        )]
        let frames = (ms.max(0.0) / interval).ceil() as usize;
        for _ in 0..frames {
            self.run_frame();
        }
    }
}
