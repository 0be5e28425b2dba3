// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core node arena: structure, attributes, inline style and layout boxes.

use kurbo::Rect;

use crate::error::DomError;
use crate::types::{NodeId, NodeKind};

/// Tags that are focusable without an explicit `tabindex`.
const NATIVE_FOCUSABLE: &[&str] = &["button", "input", "select", "textarea", "summary", "iframe"];

/// Tags whose `disabled` attribute removes them from focus.
const DISABLEABLE: &[&str] = &["button", "input", "select", "textarea", "fieldset"];

#[derive(Clone, Debug)]
pub(crate) struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    attributes: Vec<(String, String)>,
    style: Vec<(String, String)>,
    rect: Rect,
}

impl Node {
    fn new(generation: u32, kind: NodeKind) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            kind,
            attributes: Vec::new(),
            style: Vec::new(),
            rect: Rect::ZERO,
        }
    }
}

/// Slot arena holding every node of one document.
///
/// Mirrors the DOM's structural rules: a node has at most one parent, moving a
/// node detaches it first, and detached nodes stay alive until destroyed.
#[derive(Debug)]
pub(crate) struct Tree {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: NodeId,
    body: NodeId,
    /// Bumped on every child-list change.
    epoch: u64,
}

impl Tree {
    pub(crate) fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 1),
            body: NodeId::new(0, 1),
            epoch: 0,
        };
        let root = tree.insert(NodeKind::Document);
        let body = tree.insert(NodeKind::Element("body".into()));
        tree.root = root;
        tree.body = body;
        tree.link(root, body, None);
        tree
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn body(&self) -> NodeId {
        self.body
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn insert(&mut self, kind: NodeKind) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, kind));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Node slots are addressed with 32-bit indices."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, kind)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Node slots are addressed with 32-bit indices."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        NodeId::new(idx, generation)
    }

    /// Returns true if `id` refers to a live node.
    pub(crate) fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .is_some_and(|n| n.generation == id.generation())
    }

    fn node_opt(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.idx())
            .and_then(|slot| slot.as_ref())
            .filter(|n| n.generation == id.generation())
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(id.idx())
            .and_then(|slot| slot.as_mut())
            .filter(|n| n.generation == id.generation())
    }

    /// Access a node; panics if `id` is stale.
    fn node(&self, id: NodeId) -> &Node {
        self.node_opt(id).expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.node_opt_mut(id).expect("dangling NodeId")
    }

    pub(crate) fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node_opt(id).map(|n| &n.kind)
    }

    pub(crate) fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element(tag) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub(crate) fn is_element(&self, id: NodeId) -> bool {
        self.tag(id).is_some()
    }

    pub(crate) fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    pub(crate) fn children_of(&self, id: NodeId) -> &[NodeId] {
        match self.node_opt(id) {
            Some(n) => &n.children,
            None => &[],
        }
    }

    pub(crate) fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        let siblings = self.children_of(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    pub(crate) fn prev_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        let siblings = self.children_of(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .find(|&s| self.is_element(s))
    }

    /// Inclusive ancestry check: a node contains itself.
    pub(crate) fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent_of(c);
        }
        false
    }

    pub(crate) fn is_connected(&self, id: NodeId) -> bool {
        self.is_alive(id) && self.contains(self.root, id)
    }

    /// Root→node path, inclusive.
    pub(crate) fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            out.push(c);
            cur = self.parent_of(c);
        }
        out.reverse();
        out
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub(crate) fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children_of(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children_of(n).iter().rev().copied());
        }
        out
    }

    /// `id` followed by its descendants, in document order.
    pub(crate) fn inclusive_descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        out.extend(self.descendants(id));
        out
    }

    /// Attach `child` under `parent` before `reference` (or at the end).
    ///
    /// The caller is responsible for having detached `child` first.
    fn link(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let children = &mut self.node_mut(parent).children;
        let pos = reference
            .and_then(|r| children.iter().position(|&c| c == r))
            .unwrap_or(children.len());
        children.insert(pos, child);
        self.node_mut(child).parent = Some(parent);
        self.epoch += 1;
    }

    /// Detach `child` from its parent, if any.
    pub(crate) fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.parent_of(child) else {
            return;
        };
        self.node_mut(parent).children.retain(|&c| c != child);
        self.node_mut(child).parent = None;
        self.epoch += 1;
    }

    /// Insert `child` under `parent`, before `reference` when it is a child of `parent`.
    pub(crate) fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.is_alive(parent) || !self.is_alive(child) {
            return Err(DomError::DeadNode);
        }
        if matches!(self.node(child).kind, NodeKind::Document) {
            return Err(DomError::Hierarchy("the document node cannot be inserted"));
        }
        if matches!(self.node(parent).kind, NodeKind::Text(_)) {
            return Err(DomError::Hierarchy("text nodes cannot have children"));
        }
        if self.contains(child, parent) {
            return Err(DomError::Hierarchy("a node cannot be inserted into itself"));
        }
        let reference = reference.filter(|&r| r != child && self.parent_of(r) == Some(parent));
        self.detach(child);
        self.link(parent, child, reference);
        Ok(())
    }

    /// Free `id` and its subtree, returning every freed id in document order.
    pub(crate) fn free_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.is_alive(id) || id == self.root || id == self.body {
            return Vec::new();
        }
        self.detach(id);
        let freed = self.inclusive_descendants(id);
        for &n in &freed {
            self.nodes[n.idx()] = None;
            self.free_list.push(n.idx());
        }
        freed
    }

    // --- attributes ---

    pub(crate) fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node_opt(id)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match self.node_opt(id) {
            Some(n) => &n.attributes,
            None => &[],
        }
    }

    /// Set an attribute, returning the previous value.
    pub(crate) fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Option<String> {
        let node = self.node_opt_mut(id)?;
        if let Some(slot) = node.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(core::mem::replace(&mut slot.1, value.to_owned()))
        } else {
            node.attributes.push((name.to_owned(), value.to_owned()));
            None
        }
    }

    /// Remove an attribute, returning the previous value.
    pub(crate) fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let node = self.node_opt_mut(id)?;
        let pos = node.attributes.iter().position(|(k, _)| k == name)?;
        Some(node.attributes.remove(pos).1)
    }

    pub(crate) fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    // --- style and layout ---

    pub(crate) fn style(&self, id: NodeId, prop: &str) -> Option<&str> {
        self.node_opt(id)?
            .style
            .iter()
            .find(|(k, _)| k == prop)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn set_style(&mut self, id: NodeId, prop: &str, value: &str) {
        let Some(node) = self.node_opt_mut(id) else {
            return;
        };
        if let Some(slot) = node.style.iter_mut().find(|(k, _)| k == prop) {
            slot.1 = value.to_owned();
        } else {
            node.style.push((prop.to_owned(), value.to_owned()));
        }
    }

    pub(crate) fn remove_style(&mut self, id: NodeId, prop: &str) {
        if let Some(node) = self.node_opt_mut(id) {
            node.style.retain(|(k, _)| k != prop);
        }
    }

    pub(crate) fn rect(&self, id: NodeId) -> Rect {
        self.node_opt(id).map(|n| n.rect).unwrap_or(Rect::ZERO)
    }

    /// Set the layout box, returning the previous one.
    pub(crate) fn set_rect(&mut self, id: NodeId, rect: Rect) -> Option<Rect> {
        let node = self.node_opt_mut(id)?;
        Some(core::mem::replace(&mut node.rect, rect))
    }

    /// Connected, and neither the node nor an ancestor is `display: none`.
    pub(crate) fn is_rendered(&self, id: NodeId) -> bool {
        self.is_connected(id)
            && self
                .path_to(id)
                .iter()
                .all(|&n| self.style(n, "display") != Some("none"))
    }

    /// Inherited `visibility: hidden` (the nearest explicit value wins).
    pub(crate) fn is_visibility_hidden(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.style(c, "visibility") {
                Some("hidden") | Some("collapse") => return true,
                Some("visible") => return false,
                _ => {}
            }
            cur = self.parent_of(c);
        }
        false
    }

    pub(crate) fn has_offset_parent(&self, id: NodeId) -> bool {
        self.is_element(id) && self.is_rendered(id) && self.style(id, "position") != Some("fixed")
    }

    fn is_disabled(&self, id: NodeId) -> bool {
        self.tag(id).is_some_and(|t| DISABLEABLE.contains(&t))
            && self.attribute(id, "disabled").is_some()
    }

    /// Whether the host would accept focus on this element at all.
    pub(crate) fn is_focusable_candidate(&self, id: NodeId) -> bool {
        let Some(tag) = self.tag(id) else {
            return false;
        };
        if !self.is_rendered(id) || self.is_disabled(id) {
            return false;
        }
        if self.attribute(id, "tabindex").is_some() {
            return true;
        }
        match tag {
            "a" | "area" => self.attribute(id, "href").is_some(),
            "input" => self.attribute(id, "type") != Some("hidden"),
            "audio" | "video" => self.attribute(id, "controls").is_some(),
            t if NATIVE_FOCUSABLE.contains(&t) => true,
            _ => self
                .attribute(id, "contenteditable")
                .is_some_and(|v| v != "false"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tree: &mut Tree, tag: &str) -> NodeId {
        tree.insert(NodeKind::Element(tag.into()))
    }

    #[test]
    fn new_tree_has_connected_body() {
        let tree = Tree::new();
        assert!(tree.is_connected(tree.body()));
        assert_eq!(tree.parent_of(tree.body()), Some(tree.root()));
    }

    #[test]
    fn insert_before_orders_children_and_moves_nodes() {
        let mut tree = Tree::new();
        let body = tree.body();
        let a = element(&mut tree, "div");
        let b = element(&mut tree, "div");
        let c = element(&mut tree, "div");
        tree.insert_before(body, a, None).unwrap();
        tree.insert_before(body, c, None).unwrap();
        tree.insert_before(body, b, Some(c)).unwrap();
        assert_eq!(tree.children_of(body), &[a, b, c]);

        // Moving `a` under `c` detaches it from body first.
        tree.insert_before(c, a, None).unwrap();
        assert_eq!(tree.children_of(body), &[b, c]);
        assert_eq!(tree.parent_of(a), Some(c));
        assert_eq!(tree.next_sibling(b), Some(c));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut tree = Tree::new();
        let a = element(&mut tree, "div");
        let b = element(&mut tree, "div");
        tree.insert_before(a, b, None).unwrap();
        assert!(matches!(
            tree.insert_before(b, a, None),
            Err(DomError::Hierarchy(_))
        ));
    }

    #[test]
    fn freed_slots_are_reused_with_new_generation() {
        let mut tree = Tree::new();
        let a = element(&mut tree, "div");
        let freed = tree.free_subtree(a);
        assert_eq!(freed, vec![a]);
        assert!(!tree.is_alive(a));
        let b = element(&mut tree, "span");
        assert_eq!(a.idx(), b.idx());
        assert_ne!(a, b);
        assert!(tree.tag(a).is_none());
        assert_eq!(tree.tag(b), Some("span"));
    }

    #[test]
    fn epoch_tracks_child_list_changes() {
        let mut tree = Tree::new();
        let before = tree.epoch();
        let a = element(&mut tree, "div");
        assert_eq!(tree.epoch(), before);
        tree.insert_before(tree.body(), a, None).unwrap();
        tree.detach(a);
        assert_eq!(tree.epoch(), before + 2);
    }

    #[test]
    fn display_none_ancestor_hides_descendants() {
        let mut tree = Tree::new();
        let wrap = element(&mut tree, "div");
        let button = element(&mut tree, "button");
        tree.insert_before(tree.body(), wrap, None).unwrap();
        tree.insert_before(wrap, button, None).unwrap();
        assert!(tree.is_focusable_candidate(button));
        tree.set_style(wrap, "display", "none");
        assert!(!tree.is_rendered(button));
        assert!(!tree.is_focusable_candidate(button));
    }

    #[test]
    fn focusability_follows_native_rules() {
        let mut tree = Tree::new();
        let body = tree.body();
        let link = element(&mut tree, "a");
        let div = element(&mut tree, "div");
        let hidden = element(&mut tree, "input");
        for n in [link, div, hidden] {
            tree.insert_before(body, n, None).unwrap();
        }
        tree.set_attribute(hidden, "type", "hidden");
        assert!(!tree.is_focusable_candidate(link));
        tree.set_attribute(link, "href", "#");
        assert!(tree.is_focusable_candidate(link));
        assert!(!tree.is_focusable_candidate(div));
        tree.set_attribute(div, "tabindex", "-1");
        assert!(tree.is_focusable_candidate(div));
        assert!(!tree.is_focusable_candidate(hidden));
    }
}
