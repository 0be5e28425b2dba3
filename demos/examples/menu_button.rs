// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A menu button built from the Bramble primitives.
//!
//! While open, the menu is teleported into the portal layer, positioned under its
//! trigger, keeps exactly one item tabbable, fades with a transition and closes on
//! selection, an outside press or Escape.
//!
//! Run:
//! - `cargo run -p bramble_demos --example menu_button`
//! - `RUST_LOG=debug cargo run -p bramble_demos --example menu_button` to watch the lifecycle.

use std::cell::RefCell;
use std::rc::Rc;

use bramble_component::{
    ChildConfig, ComponentContext, ComponentSchema, EventModifiers, EventScope, PropDefinition,
    Runtime, RuntimeConfig, TransitionConfig, TransitionOutcome,
};
use bramble_dom::{Disposer, Document, Event, NodeId, Rect, Value, json};
use bramble_focus::{RovingOptions, RovingTabindex};
use bramble_portal::{DismissOptions, DismissReason, Teleport, on_dismiss};
use bramble_position::{AutoPosition, AutoPositionConfig, Placement, PositionOptions, auto_position};
use tracing_subscriber::EnvFilter;

/// Everything that only exists while the menu is open.
struct Opened {
    teleport: Teleport,
    position: AutoPosition,
    dismiss: Disposer,
}

impl Opened {
    fn close(self) {
        self.dismiss.dispose();
        self.position.stop();
        self.teleport.restore();
    }
}

type OpenSlot = Rc<RefCell<Option<Opened>>>;

fn menu_button() -> ComponentSchema {
    ComponentSchema::new("x-menu-button")
        .prop(PropDefinition::boolean("open"))
        .prop(PropDefinition::string("placement").with_default("bottom-start"))
        .child("trigger", ":scope > button")
        .child("menu", ":scope > [role=\"menu\"]")
        .child("items", ChildConfig::all("[role=\"menuitem\"]"))
        .transition("fade", TransitionConfig::named("menu-fade").on_child("menu"))
        .role("group")
        .on("click", ":scope > button", "toggle", EventModifiers::PREVENT)
        .handler("toggle", |ctx, _, _| {
            let open = ctx.prop("open").and_then(|v| v.as_bool()).unwrap_or(false);
            ctx.set_prop("open", !open)
        })
        .method("close", |ctx, _| ctx.set_prop("open", false).map(|()| Value::Null))
        .setup(setup)
}

fn setup(ctx: &ComponentContext) -> Option<Disposer> {
    let (Some(trigger), Some(menu)) = (ctx.child("trigger"), ctx.child("menu")) else {
        tracing::warn!(component = ctx.tag(), "menu button needs a trigger and a menu");
        return None;
    };
    let doc = ctx.document();
    ctx.set_aria(trigger, "haspopup", "menu");
    ctx.set_expanded(trigger, false);
    ctx.aria_controls(trigger, menu);
    ctx.aria_labelledby(menu, trigger);
    doc.set_style(menu, "display", "none");

    let roving = ctx.roving_tabindex(ctx.children("items"), RovingOptions::default());

    // Items are clicked while the menu sits in the portal, outside the host's scope.
    let menu_events = EventScope::labelled(doc, menu, ctx.tag());
    let selecting = ctx.clone();
    let bound = menu_events.on(
        "click",
        "[role=\"menuitem\"]",
        EventModifiers::empty(),
        move |_: &mut Event, item: NodeId| {
            let value = selecting
                .document()
                .get_attribute(item, "data-value")
                .unwrap_or_default();
            selecting.emit("select", json!(value));
            selecting.set_prop("open", false)
        },
    );
    if let Err(err) = bound {
        tracing::error!(component = ctx.tag(), error = %err, "menu item binding failed");
    }
    ctx.on_cleanup(move || menu_events.destroy());

    let opened = OpenSlot::default();
    let watcher = ctx.clone();
    let slot = opened.clone();
    ctx.on_prop_change("open", move |now, _| {
        if now.as_bool() == Some(true) {
            show(&watcher, trigger, menu, &roving, &slot);
        } else {
            hide(&watcher, trigger, menu, &slot);
        }
    });

    Some(Disposer::new(move || {
        if let Some(opened) = opened.borrow_mut().take() {
            opened.close();
        }
    }))
}

fn show(
    ctx: &ComponentContext,
    trigger: NodeId,
    menu: NodeId,
    roving: &RovingTabindex,
    slot: &OpenSlot,
) {
    if slot.borrow().is_some() {
        return;
    }
    let doc = ctx.document();
    let teleport = ctx.portal().teleport(menu);
    doc.remove_style(menu, "display");
    ctx.set_expanded(trigger, true);

    let placement = ctx
        .prop("placement")
        .and_then(|v| v.as_str().and_then(|s| s.parse::<Placement>().ok()))
        .unwrap_or_default();
    let position = auto_position(
        ctx.scheduler(),
        ctx.cache(),
        AutoPositionConfig::new(trigger, menu).with_options(PositionOptions {
            placement,
            offset: 4.0,
            ..PositionOptions::default()
        }),
    );

    let closer = ctx.clone();
    let dismiss = on_dismiss(
        doc,
        ctx.portal(),
        menu,
        DismissOptions::default().with_inside(ctx.element()),
        move |reason: DismissReason| {
            tracing::info!(?reason, "menu dismissed");
            closer.set_prop("open", false)
        },
    );

    *slot.borrow_mut() = Some(Opened {
        teleport,
        position,
        dismiss,
    });
    roving.first();
    if let Some(fade) = ctx.transition("fade") {
        let _entering = fade.enter();
    }
}

fn hide(ctx: &ComponentContext, trigger: NodeId, menu: NodeId, slot: &OpenSlot) {
    let Some(opened) = slot.borrow_mut().take() else {
        return;
    };
    opened.close();
    ctx.set_expanded(trigger, false);
    ctx.document().focus(trigger);

    let doc = ctx.document().clone();
    let still_closed = slot.clone();
    let conceal = move || {
        if still_closed.borrow().is_none() {
            doc.set_style(menu, "display", "none");
        }
    };
    match ctx.transition("fade") {
        Some(fade) => fade.leave().then(move |outcome| {
            if matches!(outcome, Ok(TransitionOutcome::Completed)) {
                conceal();
            }
        }),
        None => conceal(),
    }
}

fn build(doc: &Document) -> anyhow::Result<(NodeId, NodeId, Vec<NodeId>)> {
    let host = doc.create_element("x-menu-button");
    doc.set_attribute(host, "onselect", "announce");

    let trigger = doc.create_element("button");
    let label = doc.create_text("Actions");
    doc.append_child(trigger, label)?;
    doc.append_child(host, trigger)?;

    let menu = doc.create_element("ul");
    doc.set_attribute(menu, "role", "menu");
    doc.set_style(menu, "transition-duration", "120ms");
    doc.append_child(host, menu)?;
    let mut items = Vec::new();
    for value in ["copy", "rename", "delete"] {
        let item = doc.create_element("li");
        doc.set_attribute(item, "role", "menuitem");
        doc.set_attribute(item, "data-value", value);
        doc.append_child(menu, item)?;
        items.push(item);
    }

    doc.set_rect(trigger, Rect::new(100.0, 100.0, 180.0, 124.0));
    doc.set_rect(menu, Rect::new(0.0, 0.0, 160.0, 90.0));
    doc.append_child(doc.body(), host)?;
    Ok((host, trigger, items))
}

fn report(doc: &Document, rt: &Runtime, trigger: NodeId, step: &str) {
    let menu = doc
        .get_attribute(trigger, "aria-controls")
        .and_then(|id| doc.element_by_id(&id));
    let portaled = menu.is_some_and(|m| rt.portal().portal_contains(m));
    println!(
        "{step:>18}: expanded={} portaled={portaled} stack={} left={} top={} placement={}",
        doc.get_attribute(trigger, "aria-expanded").unwrap_or_default(),
        rt.portal().stack().len(),
        menu.and_then(|m| doc.style(m, "left")).unwrap_or_default(),
        menu.and_then(|m| doc.style(m, "top")).unwrap_or_default(),
        menu.and_then(|m| doc.get_attribute(m, "data-placement"))
            .unwrap_or_default(),
    );
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = Runtime::new(RuntimeConfig::default());
    rt.define_component(menu_button())?;
    rt.register_inline_handler("announce", |event: &mut Event, _| {
        println!("{:>18}: {}", "selected", event.detail());
    });

    let doc = rt.document();
    let (host, trigger, items) = build(doc)?;
    report(doc, &rt, trigger, "mounted");

    doc.dispatch_event(trigger, &mut Event::new("click"));
    doc.advance(150.0);
    report(doc, &rt, trigger, "opened");

    if let Some(active) = doc.active_element() {
        doc.dispatch_event(active, &mut Event::keydown("ArrowDown"));
    }
    let current = doc.active_element();
    println!(
        "{:>18}: {}",
        "arrow down",
        current
            .and_then(|n| doc.get_attribute(n, "data-value"))
            .unwrap_or_default()
    );

    doc.dispatch_event(items[1], &mut Event::new("click"));
    doc.advance(150.0);
    report(doc, &rt, trigger, "after selection");

    doc.dispatch_event(trigger, &mut Event::new("click"));
    doc.dispatch_event(doc.body(), &mut Event::new("pointerdown"));
    report(doc, &rt, trigger, "outside press");

    doc.dispatch_event(trigger, &mut Event::new("click"));
    doc.dispatch_event(trigger, &mut Event::keydown("Escape"));
    report(doc, &rt, trigger, "escape");

    doc.dispatch_event(trigger, &mut Event::new("click"));
    rt.call(host, "close", &Value::Null)?;
    report(doc, &rt, trigger, "closed by method");

    doc.destroy(host);
    println!("{:>18}: instances={}", "destroyed", rt.registry().instance_count());
    Ok(())
}
