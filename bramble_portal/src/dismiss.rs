// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Light-dismiss: outside presses and Escape.

use std::rc::Rc;

use bramble_dom::{CallbackResult, Disposer, Document, Event, ListenerOptions, NodeId};

use crate::portal::PortalManager;

/// Why a floating element asked to be dismissed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DismissReason {
    /// A pointer went down outside the element.
    OutsidePress,
    /// Escape was pressed.
    Escape,
}

/// Options for [`on_dismiss`].
#[derive(Clone, Debug)]
pub struct DismissOptions {
    /// Report presses outside the element.
    pub outside_press: bool,
    /// Report Escape.
    pub escape: bool,
    /// Extra nodes whose subtrees count as inside, such as the trigger button.
    pub inside: Vec<NodeId>,
    /// Presses inside the portal container count as inside.
    pub portal_is_inside: bool,
    /// Only react to Escape while the element is topmost on the portal stack.
    ///
    /// Elements that are not stacked at all always react.
    pub topmost_only: bool,
}

impl Default for DismissOptions {
    fn default() -> Self {
        Self {
            outside_press: true,
            escape: true,
            inside: Vec::new(),
            portal_is_inside: true,
            topmost_only: true,
        }
    }
}

impl DismissOptions {
    /// Add a node whose subtree counts as inside.
    #[must_use]
    pub fn with_inside(mut self, node: NodeId) -> Self {
        self.inside.push(node);
        self
    }
}

/// Call `callback` whenever `element` should be dismissed.
///
/// Outside presses are detected with a capture-phase `pointerdown` listener on the
/// document, Escape with a bubbling `keydown` listener on the document, so a widget
/// that handles Escape itself can stop propagation. Dispose the returned value to
/// remove both listeners.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use bramble_dom::{Document, Event};
/// use bramble_portal::{DismissOptions, DismissReason, PortalConfig, PortalManager, on_dismiss};
///
/// let doc = Document::new();
/// let portal = PortalManager::new(&doc, PortalConfig::default());
/// let popup = doc.create_element("div");
/// let elsewhere = doc.create_element("div");
/// doc.append_child(doc.body(), popup).unwrap();
/// doc.append_child(doc.body(), elsewhere).unwrap();
///
/// let last = Rc::new(Cell::new(None));
/// let l = last.clone();
/// let disposer = on_dismiss(&doc, &portal, popup, DismissOptions::default(), move |reason| {
///     l.set(Some(reason));
/// });
/// doc.dispatch_event(popup, &mut Event::new("pointerdown"));
/// assert_eq!(last.get(), None);
/// doc.dispatch_event(elsewhere, &mut Event::new("pointerdown"));
/// assert_eq!(last.get(), Some(DismissReason::OutsidePress));
/// disposer.dispose();
/// ```
pub fn on_dismiss<R: CallbackResult>(
    doc: &Document,
    portal: &PortalManager,
    element: NodeId,
    options: DismissOptions,
    callback: impl Fn(DismissReason) -> R + 'static,
) -> Disposer {
    let callback = Rc::new(callback);
    let options = Rc::new(options);
    let root = doc.root();
    let mut disposer = Disposer::noop();

    if options.outside_press {
        let weak = doc.downgrade();
        let portal = portal.clone();
        let opts = options.clone();
        let cb = callback.clone();
        let id = doc.add_event_listener(
            root,
            "pointerdown",
            ListenerOptions::capture(),
            move |e: &mut Event| -> anyhow::Result<()> {
                let (Some(doc), Some(target)) = (weak.upgrade(), e.target_node()) else {
                    return Ok(());
                };
                if is_inside(&doc, &portal, element, &opts, target) || !doc.is_connected(element)
                {
                    return Ok(());
                }
                tracing::debug!(?element, "dismiss: outside press");
                cb(DismissReason::OutsidePress).into_result()
            },
        );
        let weak = doc.downgrade();
        disposer.push(move || {
            if let Some(doc) = weak.upgrade() {
                doc.remove_event_listener(id);
            }
        });
    }

    if options.escape {
        let portal = portal.clone();
        let opts = options.clone();
        let cb = callback;
        let id = doc.add_event_listener(
            root,
            "keydown",
            ListenerOptions::default(),
            move |e: &mut Event| -> anyhow::Result<()> {
                if e.key() != Some("Escape") {
                    return Ok(());
                }
                if opts.topmost_only
                    && portal.is_in_stack(element)
                    && portal.top_stack() != Some(element)
                {
                    return Ok(());
                }
                tracing::debug!(?element, "dismiss: escape");
                cb(DismissReason::Escape).into_result()
            },
        );
        let weak = doc.downgrade();
        disposer.push(move || {
            if let Some(doc) = weak.upgrade() {
                doc.remove_event_listener(id);
            }
        });
    }

    disposer
}

fn is_inside(
    doc: &Document,
    portal: &PortalManager,
    element: NodeId,
    options: &DismissOptions,
    target: NodeId,
) -> bool {
    doc.contains(element, target)
        || options
            .inside
            .iter()
            .any(|&n| doc.is_alive(n) && doc.contains(n, target))
        || (options.portal_is_inside && portal.portal_contains(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortalConfig;
    use core::cell::RefCell;

    struct Fixture {
        doc: Document,
        portal: PortalManager,
        trigger: NodeId,
        popup: NodeId,
        outside: NodeId,
    }

    fn fixture() -> Fixture {
        let doc = Document::new();
        let portal = PortalManager::new(&doc, PortalConfig::default());
        let [trigger, popup, outside] = ["button", "div", "p"].map(|t| doc.create_element(t));
        for n in [trigger, popup, outside] {
            doc.append_child(doc.body(), n).unwrap();
        }
        Fixture {
            doc,
            portal,
            trigger,
            popup,
            outside,
        }
    }

    fn record(log: &Rc<RefCell<Vec<DismissReason>>>) -> impl Fn(DismissReason) + 'static {
        let log = log.clone();
        move |r| log.borrow_mut().push(r)
    }

    #[test]
    fn inside_nodes_do_not_dismiss() {
        let f = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        let d = on_dismiss(
            &f.doc,
            &f.portal,
            f.popup,
            DismissOptions::default().with_inside(f.trigger),
            record(&log),
        );
        f.doc.dispatch_event(f.trigger, &mut Event::new("pointerdown"));
        assert!(log.borrow().is_empty());
        f.doc.dispatch_event(f.outside, &mut Event::new("pointerdown"));
        assert_eq!(*log.borrow(), vec![DismissReason::OutsidePress]);
        d.dispose();
        f.doc.dispatch_event(f.outside, &mut Event::new("pointerdown"));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(f.doc.listener_count(f.doc.root()), 0);
    }

    #[test]
    fn portal_contents_count_as_inside() {
        let f = fixture();
        let nested = f.doc.create_element("div");
        f.doc.append_child(f.doc.body(), nested).unwrap();
        let t = f.portal.teleport(nested);
        let log = Rc::new(RefCell::new(Vec::new()));
        let d = on_dismiss(&f.doc, &f.portal, f.popup, DismissOptions::default(), record(&log));
        f.doc.dispatch_event(nested, &mut Event::new("pointerdown"));
        assert!(log.borrow().is_empty());
        d.dispose();

        let d = on_dismiss(
            &f.doc,
            &f.portal,
            f.popup,
            DismissOptions {
                portal_is_inside: false,
                ..DismissOptions::default()
            },
            record(&log),
        );
        f.doc.dispatch_event(nested, &mut Event::new("pointerdown"));
        assert_eq!(log.borrow().len(), 1);
        d.dispose();
        t.restore();
    }

    #[test]
    fn escape_only_reaches_the_topmost_element() {
        let f = fixture();
        let ta = f.portal.teleport(f.popup);
        let tb = f.portal.teleport(f.outside);
        let log_a = Rc::new(RefCell::new(Vec::new()));
        let log_b = Rc::new(RefCell::new(Vec::new()));
        let da = on_dismiss(&f.doc, &f.portal, f.popup, DismissOptions::default(), record(&log_a));
        let db = on_dismiss(&f.doc, &f.portal, f.outside, DismissOptions::default(), record(&log_b));

        f.doc.dispatch_event(f.trigger, &mut Event::keydown("Escape"));
        assert!(log_a.borrow().is_empty());
        assert_eq!(*log_b.borrow(), vec![DismissReason::Escape]);

        tb.restore();
        f.doc.dispatch_event(f.trigger, &mut Event::keydown("Escape"));
        assert_eq!(*log_a.borrow(), vec![DismissReason::Escape]);

        f.doc.dispatch_event(f.trigger, &mut Event::keydown("Enter"));
        assert_eq!(log_a.borrow().len(), 1);
        da.and(db).dispose();
        ta.restore();
    }

    #[test]
    fn disabled_channels_install_nothing() {
        let f = fixture();
        let d = on_dismiss(
            &f.doc,
            &f.portal,
            f.popup,
            DismissOptions {
                outside_press: false,
                escape: false,
                ..DismissOptions::default()
            },
            |_| {},
        );
        assert_eq!(f.doc.listener_count(f.doc.root()), 0);
        d.dispose();
    }
}
