// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focus, portal and dismiss helpers used through a component context.

use std::cell::RefCell;
use std::rc::Rc;

use bramble_component::{ComponentSchema, Runtime, RuntimeConfig};
use bramble_dom::{Document, Event, ListenerOptions, NodeId, json};
use bramble_focus::FocusTrapOptions;
use bramble_portal::DismissOptions;

struct Dialog {
    host: NodeId,
    panel: NodeId,
    buttons: Vec<NodeId>,
    outside: NodeId,
}

fn dialog_schema() -> ComponentSchema {
    ComponentSchema::new("x-dialog")
        .child("panel", ":scope > [role=\"dialog\"]")
        .setup(|ctx| {
            let Some(panel) = ctx.child("panel") else {
                return;
            };
            ctx.focus_trap(panel, FocusTrapOptions::default()).activate();
            let teleport = ctx.portal().teleport(panel);
            ctx.on_cleanup(move || teleport.restore());
            let emitter = ctx.clone();
            ctx.on_dismiss(panel, DismissOptions::default(), move |reason| {
                emitter.emit("close", json!(format!("{reason:?}")));
            });
        })
}

fn build(doc: &Document) -> Dialog {
    let host = doc.create_element("x-dialog");
    let panel = doc.create_element("div");
    doc.set_attribute(panel, "role", "dialog");
    doc.append_child(host, panel).unwrap();
    let buttons: Vec<NodeId> = (0..2)
        .map(|_| {
            let b = doc.create_element("button");
            doc.append_child(panel, b).unwrap();
            b
        })
        .collect();
    let outside = doc.create_element("button");
    doc.append_child(doc.body(), outside).unwrap();
    doc.append_child(doc.body(), host).unwrap();
    Dialog {
        host,
        panel,
        buttons,
        outside,
    }
}

fn record_closes(doc: &Document) -> Rc<RefCell<Vec<String>>> {
    let closes = Rc::new(RefCell::new(Vec::new()));
    let c = closes.clone();
    let _listener = doc.add_event_listener(
        doc.root(),
        "close",
        ListenerOptions::default(),
        move |event: &mut Event| {
            let reason = event.detail().as_str().unwrap_or_default().to_owned();
            c.borrow_mut().push(reason);
        },
    );
    closes
}

#[test]
fn dialog_traps_focus_inside_the_portal() {
    let rt = Runtime::new(RuntimeConfig::default());
    rt.define_component(dialog_schema()).unwrap();
    let doc = rt.document();
    let d = build(doc);

    assert!(rt.portal().portal_contains(d.panel));
    assert!(rt.portal().is_in_stack(d.panel));
    assert_eq!(doc.active_element(), Some(d.buttons[0]));

    doc.focus(d.buttons[1]);
    assert!(!doc.dispatch_event(d.buttons[1], &mut Event::keydown("Tab")));
    assert_eq!(doc.active_element(), Some(d.buttons[0]));
}

#[test]
fn dismissal_reasons_are_emitted_until_disconnect() {
    let rt = Runtime::new(RuntimeConfig::default());
    rt.define_component(dialog_schema()).unwrap();
    let doc = rt.document();
    let closes = record_closes(doc);
    let d = build(doc);

    doc.dispatch_event(d.buttons[0], &mut Event::new("pointerdown"));
    doc.dispatch_event(d.outside, &mut Event::new("pointerdown"));
    doc.dispatch_event(d.buttons[0], &mut Event::keydown("Escape"));
    assert_eq!(*closes.borrow(), vec!["OutsidePress", "Escape"]);

    doc.remove(d.host);
    assert!(!rt.portal().portal_contains(d.panel));
    assert_eq!(doc.parent(d.panel), Some(d.host));
    assert!(rt.portal().stack().is_empty());

    doc.dispatch_event(d.outside, &mut Event::new("pointerdown"));
    assert_eq!(closes.borrow().len(), 2);
}
