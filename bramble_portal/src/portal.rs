// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared portal container and its stacking order.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;

use bramble_dom::{Disposer, Document, NodeId};

/// Portal configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct PortalConfig {
    /// Stacked elements get `z_index_base + n` for increasing `n`.
    pub z_index_base: i32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self { z_index_base: 1000 }
    }
}

/// One stacked element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StackEntry {
    /// The floating element.
    pub node: NodeId,
    /// Its assigned z-index.
    pub z_index: i32,
}

struct PortalState {
    doc: Document,
    config: PortalConfig,
    container: Cell<Option<NodeId>>,
    stack: RefCell<Vec<StackEntry>>,
    counter: Cell<i32>,
}

/// Owner of the shared portal container and the z-index stack.
///
/// Z-indices come from a counter that only grows while anything is stacked, so the
/// most recently pushed element is always on top and an index is never handed out
/// twice to elements open at the same time. The counter restarts once the stack is
/// empty.
///
/// ```
/// use bramble_dom::Document;
/// use bramble_portal::{PortalConfig, PortalManager};
///
/// let doc = Document::new();
/// let portal = PortalManager::new(&doc, PortalConfig::default());
/// let (a, b) = (doc.create_element("div"), doc.create_element("div"));
///
/// assert_eq!(portal.push_stack(a), 1001);
/// assert_eq!(portal.push_stack(b), 1002);
/// portal.pop_stack(a);
/// assert_eq!(portal.top_stack(), Some(b));
/// assert_eq!(portal.push_stack(a), 1003);
/// ```
#[derive(Clone)]
pub struct PortalManager {
    state: Rc<PortalState>,
}

impl fmt::Debug for PortalManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalManager")
            .field("config", &self.state.config)
            .field("container", &self.state.container.get())
            .field("stack", &self.state.stack.borrow())
            .finish_non_exhaustive()
    }
}

impl PortalManager {
    /// Create a manager for `doc`. The container is created on first use.
    pub fn new(doc: &Document, config: PortalConfig) -> Self {
        Self {
            state: Rc::new(PortalState {
                doc: doc.clone(),
                config,
                container: Cell::new(None),
                stack: RefCell::new(Vec::new()),
                counter: Cell::new(0),
            }),
        }
    }

    /// The shared container: a fixed, zero-size, pointer-transparent `<div>` at the
    /// end of `<body>`. Created once and reattached if something removed it.
    pub fn get_portal_container(&self) -> NodeId {
        let doc = &self.state.doc;
        if let Some(container) = self.state.container.get()
            && doc.is_alive(container)
        {
            if !doc.is_connected(container) {
                self.attach_container(container);
            }
            return container;
        }
        let container = doc.create_element("div");
        doc.set_attribute(container, "data-bramble-portal", "");
        for (prop, value) in [
            ("position", "fixed"),
            ("top", "0"),
            ("left", "0"),
            ("width", "0"),
            ("height", "0"),
            ("pointer-events", "none"),
        ] {
            doc.set_style(container, prop, value);
        }
        self.attach_container(container);
        self.state.container.set(Some(container));
        tracing::debug!(?container, "portal container created");
        container
    }

    fn attach_container(&self, container: NodeId) {
        let doc = &self.state.doc;
        if let Err(err) = doc.append_child(doc.body(), container) {
            tracing::warn!(?container, error = %err, "portal container could not be attached");
        }
    }

    /// Push `node` on top of the stack and return its z-index. A node already on the
    /// stack is moved to the top with a fresh index.
    pub fn push_stack(&self, node: NodeId) -> i32 {
        let counter = self.state.counter.get() + 1;
        self.state.counter.set(counter);
        let z_index = self.state.config.z_index_base + counter;
        let mut stack = self.state.stack.borrow_mut();
        stack.retain(|e| e.node != node);
        stack.push(StackEntry { node, z_index });
        z_index
    }

    /// Remove `node` from the stack. Returns whether it was there.
    pub fn pop_stack(&self, node: NodeId) -> bool {
        let mut stack = self.state.stack.borrow_mut();
        let before = stack.len();
        stack.retain(|e| e.node != node);
        if stack.is_empty() {
            self.state.counter.set(0);
        }
        stack.len() != before
    }

    /// The most recently pushed element still on the stack.
    pub fn top_stack(&self) -> Option<NodeId> {
        self.state.stack.borrow().last().map(|e| e.node)
    }

    /// Whether `node` is on the stack.
    pub fn is_in_stack(&self, node: NodeId) -> bool {
        self.state.stack.borrow().iter().any(|e| e.node == node)
    }

    /// The z-index assigned to `node`, if stacked.
    pub fn z_index_of(&self, node: NodeId) -> Option<i32> {
        self.state
            .stack
            .borrow()
            .iter()
            .find(|e| e.node == node)
            .map(|e| e.z_index)
    }

    /// The stack, bottom first.
    pub fn stack(&self) -> Vec<StackEntry> {
        self.state.stack.borrow().clone()
    }

    /// Whether `node` currently lives inside the portal container.
    pub fn portal_contains(&self, node: NodeId) -> bool {
        self.state
            .container
            .get()
            .is_some_and(|c| self.state.doc.is_alive(c) && self.state.doc.contains(c, node))
    }

    /// Move `node` into the portal container on top of the stack.
    ///
    /// The returned [`Teleport`] puts it back where it was.
    pub fn teleport(&self, node: NodeId) -> Teleport {
        let doc = &self.state.doc;
        let parent = doc.parent(node);
        let next_sibling = doc.next_sibling(node);
        let saved_z = doc.style(node, "z-index");
        let saved_pointer = doc.style(node, "pointer-events");
        let z_index = self.push_stack(node);
        let container = self.get_portal_container();
        if let Err(err) = doc.append_child(container, node) {
            tracing::warn!(error = %err, "teleport failed");
        }
        doc.set_style(node, "z-index", &z_index.to_string());
        doc.set_style(node, "pointer-events", "auto");
        tracing::debug!(?node, z_index, "teleported");
        Teleport {
            manager: self.clone(),
            node,
            parent,
            next_sibling,
            saved_z,
            saved_pointer,
        }
    }
}

/// A teleported element, restored by [`Teleport::restore`].
///
/// Every teleport must be restored, or its stack entry stays behind.
#[must_use = "a teleported element stays in the portal until restored"]
pub struct Teleport {
    manager: PortalManager,
    node: NodeId,
    parent: Option<NodeId>,
    next_sibling: Option<NodeId>,
    saved_z: Option<String>,
    saved_pointer: Option<String>,
}

impl fmt::Debug for Teleport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teleport")
            .field("node", &self.node)
            .field("parent", &self.parent)
            .field("next_sibling", &self.next_sibling)
            .finish_non_exhaustive()
    }
}

impl Teleport {
    /// The teleported element.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Pop the element from the stack and put it back in its original place, or
    /// detach it if it had none.
    pub fn restore(self) {
        let doc = &self.manager.state.doc;
        let node = self.node;
        self.manager.pop_stack(node);
        if !doc.is_alive(node) {
            return;
        }
        match &self.saved_z {
            Some(z) => doc.set_style(node, "z-index", z),
            None => doc.remove_style(node, "z-index"),
        }
        match &self.saved_pointer {
            Some(p) => doc.set_style(node, "pointer-events", p),
            None => doc.remove_style(node, "pointer-events"),
        }
        match self.parent.filter(|&p| doc.is_alive(p)) {
            Some(parent) => {
                let reference = self.next_sibling.filter(|&s| doc.parent(s) == Some(parent));
                if let Err(err) = doc.insert_before(parent, node, reference) {
                    tracing::warn!(error = %err, "restoring teleported element failed");
                }
            }
            None => doc.remove(node),
        }
        tracing::debug!(?node, "restored from portal");
    }

    /// A disposer that restores this element.
    pub fn into_disposer(self) -> Disposer {
        Disposer::new(move || self.restore())
    }
}
