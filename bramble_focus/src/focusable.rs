// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focusable-element discovery.

use bramble_dom::{Document, NodeId, SelectorList};

/// Elements that take part in sequential (Tab) navigation.
pub const FOCUSABLE_SELECTOR: &str = "a[href]:not([tabindex=\"-1\"]), \
    area[href]:not([tabindex=\"-1\"]), \
    button:not([disabled]):not([tabindex=\"-1\"]), \
    input:not([disabled]):not([type=hidden]):not([tabindex=\"-1\"]), \
    select:not([disabled]):not([tabindex=\"-1\"]), \
    textarea:not([disabled]):not([tabindex=\"-1\"]), \
    iframe:not([tabindex=\"-1\"]), \
    audio[controls]:not([tabindex=\"-1\"]), \
    video[controls]:not([tabindex=\"-1\"]), \
    summary:not([tabindex=\"-1\"]), \
    [contenteditable]:not([contenteditable=false]):not([tabindex=\"-1\"]), \
    [tabindex]:not([tabindex=\"-1\"])";

/// Tabbable descendants of `container`, in document order.
///
/// Elements that are not rendered (`display: none` on them or an ancestor), that
/// inherit `visibility: hidden`, or that have no offset parent without an explicit
/// `tabindex` are skipped.
///
/// ```
/// use bramble_dom::Document;
/// use bramble_focus::focusable_elements;
///
/// let doc = Document::new();
/// let a = doc.create_element("button");
/// let b = doc.create_element("button");
/// doc.append_child(doc.body(), a).unwrap();
/// doc.append_child(doc.body(), b).unwrap();
/// doc.set_style(b, "display", "none");
/// assert_eq!(focusable_elements(&doc, doc.body()), vec![a]);
/// ```
pub fn focusable_elements(doc: &Document, container: NodeId) -> Vec<NodeId> {
    let selector = match SelectorList::parse(FOCUSABLE_SELECTOR) {
        Ok(selector) => selector,
        Err(err) => {
            tracing::error!(error = %err, "focusable selector failed to parse");
            return Vec::new();
        }
    };
    doc.select_all(container, &selector)
        .into_iter()
        .filter(|&n| is_visible(doc, n))
        .collect()
}

fn is_visible(doc: &Document, node: NodeId) -> bool {
    doc.is_rendered(node)
        && !doc.is_visibility_hidden(node)
        && (doc.has_offset_parent(node) || doc.has_attribute(node, "tabindex"))
}
