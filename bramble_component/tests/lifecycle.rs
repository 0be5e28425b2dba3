// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Connection, disconnection and reconnection of component instances.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bramble_component::{
    ComponentSchema, EventModifiers, Runtime, RuntimeConfig, TransitionConfig, TransitionOutcome,
};
use bramble_dom::{Disposer, Event, EventTarget, NodeId, Size};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn mount(rt: &Runtime, tag: &str) -> NodeId {
    let doc = rt.document();
    let el = doc.create_element(tag);
    doc.append_child(doc.body(), el).unwrap();
    el
}

fn widget(log: &Log) -> ComponentSchema {
    let log = log.clone();
    ComponentSchema::new("x-widget")
        .on("click", "button", "press", EventModifiers::empty())
        .on("keydown", "button", "press", EventModifiers::empty())
        .handler("press", |_, _, _| -> anyhow::Result<()> { Ok(()) })
        .transition("fade", TransitionConfig::named("fade"))
        .setup(move |ctx| {
            let on_abort = log.clone();
            ctx.signal().on_abort(move || on_abort.borrow_mut().push("abort"));
            let on_cleanup = log.clone();
            ctx.on_cleanup(move || on_cleanup.borrow_mut().push("cleanup"));
            let on_teardown = log.clone();
            Disposer::new(move || on_teardown.borrow_mut().push("teardown"))
        })
}

#[test]
fn disconnection_runs_teardown_in_order() {
    let rt = Runtime::new(RuntimeConfig::default());
    let log = Log::default();
    rt.define_component(widget(&log)).unwrap();
    let doc = rt.document();
    let el = mount(&rt, "x-widget");
    assert_eq!(doc.listener_count(el), 2, "one listener per event kind");

    let ctx = rt.instance_context(el).unwrap();
    let entering = ctx.transition("fade").unwrap().enter();
    assert!(doc.has_class(el, "fade-enter-active"));

    doc.remove(el);
    assert_eq!(*log.borrow(), vec!["abort", "teardown", "cleanup"]);
    assert_eq!(doc.listener_count(el), 0);
    assert_eq!(entering.value(), Some(TransitionOutcome::Cancelled));
    assert!(!doc.has_class(el, "fade-enter-active"));
    assert!(ctx.signal().aborted());
    assert!(rt.instance_context(el).is_none());
}

#[test]
fn reconnection_gets_a_fresh_instance() {
    let rt = Runtime::new(RuntimeConfig::default());
    let log = Log::default();
    rt.define_component(widget(&log)).unwrap();
    let doc = rt.document();
    let el = mount(&rt, "x-widget");
    let first = rt.instance_context(el).unwrap();

    let other = doc.create_element("section");
    doc.append_child(doc.body(), other).unwrap();
    doc.append_child(other, el).unwrap();

    let second = rt.instance_context(el).unwrap();
    assert!(!first.ptr_eq(&second));
    assert!(first.signal().aborted());
    assert!(!second.signal().aborted());
    assert_eq!(doc.listener_count(el), 2);
    assert_eq!(rt.registry().instance_count(), 1);
}

#[test]
fn failing_cleanup_does_not_block_the_rest() {
    let rt = Runtime::new(RuntimeConfig::default());
    let ran = Rc::new(Cell::new(0));
    let r = ran.clone();
    rt.define_component(ComponentSchema::new("x-fragile").setup(move |ctx| {
        let first = r.clone();
        ctx.on_cleanup(move || first.set(first.get() + 1));
        ctx.on_cleanup(|| -> anyhow::Result<()> { anyhow::bail!("cleanup exploded") });
        let last = r.clone();
        ctx.on_cleanup(move || last.set(last.get() + 1));
    }))
    .unwrap();
    let el = mount(&rt, "x-fragile");
    rt.document().remove(el);
    assert_eq!(ran.get(), 2);
}

#[test]
fn state_is_per_instance() {
    let rt = Runtime::new(RuntimeConfig::default());
    rt.define_component(
        ComponentSchema::new("x-counter")
            .on("click", ":scope", "bump", EventModifiers::empty())
            .handler("bump", |ctx, _, _| -> anyhow::Result<()> {
                ctx.state("count", || 0_u32).update(|n| n + 1);
                Ok(())
            }),
    )
    .unwrap();
    let doc = rt.document();
    let a = mount(&rt, "x-counter");
    let b = mount(&rt, "x-counter");
    doc.dispatch_event(a, &mut Event::new("click"));
    doc.dispatch_event(a, &mut Event::new("click"));
    doc.dispatch_event(b, &mut Event::new("click"));

    let count = |el| rt.instance_context(el).unwrap().state("count", || 0_u32).get();
    assert_eq!(count(a), 2);
    assert_eq!(count(b), 1);
}

#[test]
fn viewport_handler_runs_once_per_frame() {
    let rt = Runtime::new(RuntimeConfig::default());
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    rt.define_component(
        ComponentSchema::new("x-sticky")
            .track_viewport("reflow")
            .handler("reflow", move |_, event, _| -> anyhow::Result<()> {
                assert!(event.kind() == "scroll" || event.kind() == "resize");
                h.set(h.get() + 1);
                Ok(())
            }),
    )
    .unwrap();
    let doc = rt.document();
    let baseline = doc.listener_count(EventTarget::Window);
    let el = mount(&rt, "x-sticky");
    assert_eq!(doc.listener_count(EventTarget::Window), baseline + 2);

    doc.dispatch_scroll(doc.body());
    doc.dispatch_scroll(doc.body());
    doc.set_viewport_size(Size::new(800.0, 600.0));
    assert_eq!(hits.get(), 0, "handler waits for the read phase");
    rt.run_frame();
    assert_eq!(hits.get(), 1);

    doc.dispatch_scroll(doc.body());
    rt.run_frame();
    assert_eq!(hits.get(), 2);

    doc.remove(el);
    assert_eq!(doc.listener_count(EventTarget::Window), baseline);
    doc.dispatch_scroll(doc.body());
    rt.run_frame();
    assert_eq!(hits.get(), 2);
}
