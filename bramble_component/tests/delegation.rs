// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delegated events, custom events and inline handlers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bramble_component::{ChildConfig, ComponentSchema, EventModifiers, Runtime, RuntimeConfig};
use bramble_dom::{Event, ListenerOptions, NodeId, json};

fn list_schema(log: &Rc<RefCell<Vec<String>>>) -> ComponentSchema {
    let items = log.clone();
    let any = log.clone();
    ComponentSchema::new("x-list")
        .child("items", ChildConfig::all("li"))
        .on("click", "li", "item", EventModifiers::empty())
        .on("click", "ul", "list", EventModifiers::empty())
        .on("click", "li.broken", "broken", EventModifiers::empty())
        .handler("item", move |ctx, _, li| -> anyhow::Result<()> {
            let index = ctx.children("items").iter().position(|&n| n == li);
            items.borrow_mut().push(format!("item {index:?}"));
            Ok(())
        })
        .handler("list", move |_, _, _| -> anyhow::Result<()> {
            any.borrow_mut().push("list".to_owned());
            Ok(())
        })
        .handler("broken", |_, _, _| -> anyhow::Result<()> {
            anyhow::bail!("handler exploded")
        })
}

fn build_list(rt: &Runtime) -> (NodeId, Vec<NodeId>) {
    let doc = rt.document();
    let host = doc.create_element("x-list");
    let ul = doc.create_element("ul");
    doc.append_child(host, ul).unwrap();
    let items: Vec<NodeId> = (0..3)
        .map(|_| {
            let li = doc.create_element("li");
            doc.append_child(ul, li).unwrap();
            li
        })
        .collect();
    doc.append_child(doc.body(), host).unwrap();
    (host, items)
}

#[test]
fn one_listener_serves_every_binding() {
    let rt = Runtime::new(RuntimeConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    rt.define_component(list_schema(&log)).unwrap();
    let doc = rt.document();
    let (host, items) = build_list(&rt);
    assert_eq!(doc.listener_count(host), 1);

    doc.add_class(items[1], "broken");
    doc.dispatch_event(items[1], &mut Event::new("click"));
    assert_eq!(*log.borrow(), vec!["item Some(1)", "list"]);
}

#[test]
fn clicks_outside_the_host_are_ignored() {
    let rt = Runtime::new(RuntimeConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    rt.define_component(list_schema(&log)).unwrap();
    let doc = rt.document();
    build_list(&rt);
    let stray = doc.create_element("li");
    doc.append_child(doc.body(), stray).unwrap();
    doc.dispatch_event(stray, &mut Event::new("click"));
    assert!(log.borrow().is_empty());
}

#[test]
fn modifiers_apply_before_the_handler() {
    let rt = Runtime::new(RuntimeConfig::default());
    let seen = Rc::new(Cell::new(0));
    let s = seen.clone();
    rt.define_component(
        ComponentSchema::new("x-link")
            .on("click", "a", "go", EventModifiers::PREVENT | EventModifiers::ONCE)
            .handler("go", move |_, event, _| -> anyhow::Result<()> {
                assert!(event.default_prevented());
                s.set(s.get() + 1);
                Ok(())
            }),
    )
    .unwrap();
    let doc = rt.document();
    let host = doc.create_element("x-link");
    let a = doc.create_element("a");
    doc.append_child(host, a).unwrap();
    doc.append_child(doc.body(), host).unwrap();

    assert!(!doc.dispatch_event(a, &mut Event::new("click")));
    assert!(doc.dispatch_event(a, &mut Event::new("click")));
    assert_eq!(seen.get(), 1);
    assert_eq!(doc.listener_count(host), 0);
}

#[test]
fn emit_reaches_listeners_and_inline_handler() {
    let rt = Runtime::new(RuntimeConfig::default());
    rt.define_component(
        ComponentSchema::new("x-picker")
            .method("pick", |ctx, args| -> anyhow::Result<_> {
                Ok(json!(ctx.emit("pick", args.clone())))
            }),
    )
    .unwrap();
    let doc = rt.document();
    let host = doc.create_element("x-picker");
    doc.set_attribute(host, "onpick", "remember");
    doc.append_child(doc.body(), host).unwrap();

    let picked = Rc::new(RefCell::new(Vec::new()));
    let p = picked.clone();
    rt.register_inline_handler("remember", move |event: &mut Event, node| {
        assert_eq!(node, host);
        p.borrow_mut().push(event.detail().clone());
    });
    let bubbled = Rc::new(Cell::new(false));
    let b = bubbled.clone();
    let _listener = doc.add_event_listener(
        doc.body(),
        "pick",
        ListenerOptions::default(),
        move |event: &mut Event| {
            b.set(true);
            if event.detail() == &json!("veto") {
                event.prevent_default();
            }
        },
    );

    assert_eq!(rt.call(host, "pick", &json!("a")).unwrap(), json!(true));
    assert_eq!(rt.call(host, "pick", &json!("veto")).unwrap(), json!(false));
    assert!(bubbled.get());
    assert_eq!(*picked.borrow(), vec![json!("a"), json!("veto")]);
}
