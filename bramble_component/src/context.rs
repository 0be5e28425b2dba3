// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The facade a component's setup, handlers and methods work through.

use core::any::Any;
use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use bramble_dom::{AbortSignal, CallbackResult, Document, Event, NodeId, SelectorList, Value};
use bramble_focus::{FocusTrap, FocusTrapOptions, RovingOptions, RovingTabindex};
use bramble_portal::{DismissOptions, DismissReason, PortalManager, on_dismiss};
use bramble_position::{AutoPosition, AutoPositionConfig, auto_position};
use bramble_scheduler::{Cache, Scheduler};
use hashbrown::HashMap;

use crate::error::ComponentError;
use crate::event_scope::EventScope;
use crate::props::PropValue;
use crate::registry::{RegistryInner, Services};
use crate::schema::Definition;
use crate::state::State;
use crate::transition::Transition;

type Cleanup = Box<dyn FnOnce() -> anyhow::Result<()>>;
type PropWatcher = Rc<dyn Fn(&PropValue, &PropValue) -> anyhow::Result<()>>;

pub(crate) struct ContextInner {
    services: Services,
    registry: Weak<RegistryInner>,
    definition: Rc<Definition>,
    element: NodeId,
    signal: AbortSignal,
    scope: EventScope,
    states: RefCell<HashMap<String, Rc<dyn Any>>>,
    children: RefCell<HashMap<String, Vec<NodeId>>>,
    transitions: RefCell<HashMap<String, Transition>>,
    cleanups: RefCell<Vec<Cleanup>>,
    prop_watchers: RefCell<Vec<(String, PropWatcher)>>,
}

/// Everything one connected component instance may touch.
///
/// A context is created when its element connects and torn down when it disconnects;
/// a reconnection gets a fresh one. Clones share the same instance.
#[derive(Clone)]
pub struct ComponentContext {
    inner: Rc<ContextInner>,
}

#[derive(Clone)]
pub(crate) struct WeakContext(Weak<ContextInner>);

impl WeakContext {
    pub(crate) fn upgrade(&self) -> Option<ComponentContext> {
        self.0.upgrade().map(|inner| ComponentContext { inner })
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("tag", &self.tag())
            .field("element", &self.inner.element)
            .field("aborted", &self.inner.signal.aborted())
            .finish_non_exhaustive()
    }
}

impl ComponentContext {
    pub(crate) fn new(
        registry: &Rc<RegistryInner>,
        definition: Rc<Definition>,
        element: NodeId,
        signal: AbortSignal,
        scope: EventScope,
    ) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                services: registry.services().clone(),
                registry: Rc::downgrade(registry),
                definition,
                element,
                signal,
                scope,
                states: RefCell::default(),
                children: RefCell::default(),
                transitions: RefCell::default(),
                cleanups: RefCell::default(),
                prop_watchers: RefCell::default(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext(Rc::downgrade(&self.inner))
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The host element.
    pub fn element(&self) -> NodeId {
        self.inner.element
    }

    /// The component tag.
    pub fn tag(&self) -> &str {
        self.inner.definition.tag()
    }

    /// The document.
    pub fn document(&self) -> &Document {
        &self.inner.services.doc
    }

    /// Aborted when the instance disconnects.
    pub fn signal(&self) -> AbortSignal {
        self.inner.signal.clone()
    }

    /// The shared read/write scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.services.scheduler
    }

    /// The shared layout cache.
    pub fn cache(&self) -> &Cache {
        &self.inner.services.cache
    }

    /// The shared portal.
    pub fn portal(&self) -> &PortalManager {
        &self.inner.services.portal
    }

    /// The instance's delegated event scope. It is destroyed on disconnection.
    pub fn events(&self) -> &EventScope {
        &self.inner.scope
    }

    /// The state named `name`, created with `init` on first use.
    ///
    /// Asking for an existing name with a different type replaces it.
    pub fn state<T: Clone + PartialEq + 'static>(
        &self,
        name: &str,
        init: impl FnOnce() -> T,
    ) -> State<T> {
        if let Some(existing) = self.inner.states.borrow().get(name)
            && let Some(state) = existing.downcast_ref::<State<T>>()
        {
            return state.clone();
        }
        if self.inner.states.borrow().contains_key(name) {
            tracing::warn!(
                component = %self.tag(),
                state = name,
                "state replaced with a different type"
            );
        }
        let state = State::labelled(init(), self.tag());
        self.inner
            .states
            .borrow_mut()
            .insert(name.to_owned(), Rc::new(state.clone()));
        state
    }

    /// The first element of the named child lookup.
    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.resolve_children(name).first().copied()
    }

    /// Every element of the named child lookup.
    pub fn children(&self, name: &str) -> Vec<NodeId> {
        self.resolve_children(name)
    }

    fn resolve_children(&self, name: &str) -> Vec<NodeId> {
        let Some(query) = self.inner.definition.children.get(name) else {
            tracing::warn!(component = %self.tag(), child = name, "unknown child");
            return Vec::new();
        };
        if !query.observe
            && let Some(cached) = self.inner.children.borrow().get(name)
        {
            return cached.clone();
        }
        let cache = self.cache();
        let host = self.inner.element;
        let found = match &query.slot {
            Some(slot) => cache.children(host, Some(slot)).map(|nodes| {
                SelectorList::parse(&query.selector).map_or_else(
                    |_| Vec::new(),
                    |list| {
                        nodes
                            .into_iter()
                            .filter(|&n| self.document().matches_in_scope(n, &list, host))
                            .collect()
                    },
                )
            }),
            None if query.multiple => cache.query_all(host, &query.selector),
            None => cache
                .query_one(host, &query.selector)
                .map(|n| n.into_iter().collect()),
        };
        let mut found = match found {
            Ok(found) => found,
            Err(err) => {
                tracing::error!(
                    component = %self.tag(),
                    child = name,
                    error = %err,
                    "child lookup failed"
                );
                return Vec::new();
            }
        };
        if !query.multiple {
            found.truncate(1);
        }
        if !query.observe && !found.is_empty() {
            self.inner
                .children
                .borrow_mut()
                .insert(name.to_owned(), found.clone());
        }
        found
    }

    /// The named transition, created on first use.
    ///
    /// `None` if the schema declares no such transition or its target child is missing.
    pub fn transition(&self, name: &str) -> Option<Transition> {
        if let Some(t) = self.inner.transitions.borrow().get(name) {
            return Some(t.clone());
        }
        let config = self
            .inner
            .definition
            .schema
            .transitions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.clone());
        let Some(config) = config else {
            tracing::warn!(component = %self.tag(), transition = name, "unknown transition");
            return None;
        };
        let target = match &config.target {
            Some(child) => self.child(child)?,
            None => self.inner.element,
        };
        let transition = Transition::labelled(self.document(), target, config, self.tag());
        self.inner
            .transitions
            .borrow_mut()
            .insert(name.to_owned(), transition.clone());
        Some(transition)
    }

    /// Run `f` when the instance disconnects. Failures are logged.
    pub fn on_cleanup<R: CallbackResult>(&self, f: impl FnOnce() -> R + 'static) {
        self.inner
            .cleanups
            .borrow_mut()
            .push(Box::new(move || f().into_result()));
    }

    /// First descendant matching `selector`, through the cache.
    pub fn query(&self, selector: &str) -> Option<NodeId> {
        self.cache()
            .query_one(self.inner.element, selector)
            .unwrap_or_else(|err| {
                tracing::error!(component = %self.tag(), error = %err, "query failed");
                None
            })
    }

    /// Every descendant matching `selector`, through the cache.
    pub fn query_all(&self, selector: &str) -> Vec<NodeId> {
        self.cache()
            .query_all(self.inner.element, selector)
            .unwrap_or_else(|err| {
                tracing::error!(component = %self.tag(), error = %err, "query failed");
                Vec::new()
            })
    }

    /// Dispatch a bubbling custom event from the host.
    ///
    /// If the host has an `on{name}` attribute naming a registered inline handler, that
    /// handler also runs, after the listeners. Returns `false` if anything prevented
    /// the default.
    pub fn emit(&self, name: &str, detail: Value) -> bool {
        let doc = self.document();
        let host = self.inner.element;
        let mut event = Event::custom(name, detail);
        doc.dispatch_event(host, &mut event);
        if let Some(handler_name) = doc.get_attribute(host, &format!("on{name}")) {
            let handler = self
                .inner
                .registry
                .upgrade()
                .and_then(|r| r.inline_handler(&handler_name));
            match handler {
                Some(handler) => {
                    if let Err(err) = handler(&mut event, host) {
                        tracing::error!(
                            component = %self.tag(),
                            phase = "inline-handler",
                            handler = %handler_name,
                            error = %err,
                            "inline handler failed"
                        );
                    }
                }
                None => {
                    tracing::warn!(
                        component = %self.tag(),
                        handler = %handler_name,
                        "unknown inline handler"
                    );
                }
            }
        }
        !event.default_prevented()
    }

    /// The current value of a declared property.
    pub fn prop(&self, name: &str) -> Option<PropValue> {
        let registry = self.inner.registry.upgrade()?;
        registry.prop(self.inner.element, name).ok()
    }

    /// Assign a declared property.
    pub fn set_prop(&self, name: &str, value: impl Into<PropValue>) -> Result<(), ComponentError> {
        let Some(registry) = self.inner.registry.upgrade() else {
            return Err(ComponentError::NotConnected {
                tag: self.tag().to_owned(),
            });
        };
        registry.set_prop(self.inner.element, name, value.into())
    }

    /// Call `f(new, previous)` whenever the named property's value changes, whether
    /// through [`ComponentContext::set_prop`] or a direct attribute change.
    pub fn on_prop_change<R: CallbackResult>(
        &self,
        name: &str,
        f: impl Fn(&PropValue, &PropValue) -> R + 'static,
    ) {
        self.inner.prop_watchers.borrow_mut().push((
            name.to_owned(),
            Rc::new(move |a: &PropValue, b: &PropValue| f(a, b).into_result()),
        ));
    }

    pub(crate) fn notify_prop_change(&self, name: &str, new: &PropValue, previous: &PropValue) {
        let watchers: Vec<PropWatcher> = self
            .inner
            .prop_watchers
            .borrow()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, w)| w.clone())
            .collect();
        for watcher in watchers {
            if let Err(err) = watcher(new, previous) {
                tracing::error!(
                    component = %self.tag(),
                    phase = "prop-change",
                    prop = name,
                    error = %err,
                    "property watcher failed"
                );
            }
        }
    }

    // --- ARIA ---

    /// Set `aria-{name}` (the prefix is optional) on `node`.
    pub fn set_aria(&self, node: NodeId, name: &str, value: impl fmt::Display) {
        let attr = if name.starts_with("aria-") {
            name.to_owned()
        } else {
            format!("aria-{name}")
        };
        self.document().set_attribute(node, &attr, &value.to_string());
    }

    /// `aria-expanded`.
    pub fn set_expanded(&self, node: NodeId, expanded: bool) {
        self.set_aria(node, "expanded", expanded);
    }

    /// `aria-selected`.
    pub fn set_selected(&self, node: NodeId, selected: bool) {
        self.set_aria(node, "selected", selected);
    }

    /// `aria-hidden`, removed rather than set to `false`.
    pub fn set_hidden(&self, node: NodeId, hidden: bool) {
        if hidden {
            self.set_aria(node, "hidden", true);
        } else {
            self.document().remove_attribute(node, "aria-hidden");
        }
    }

    /// The element's `id`, assigning a generated one if it has none.
    pub fn ensure_id(&self, node: NodeId) -> String {
        if let Some(id) = self.document().get_attribute(node, "id")
            && !id.is_empty()
        {
            return id;
        }
        let id = self.inner.services.ids.generate(self.document());
        self.document().set_attribute(node, "id", &id);
        id
    }

    /// Point `owner`'s `aria-controls` at `controlled`.
    pub fn aria_controls(&self, owner: NodeId, controlled: NodeId) {
        let id = self.ensure_id(controlled);
        self.document().set_attribute(owner, "aria-controls", &id);
    }

    /// Point `node`'s `aria-labelledby` at `label`.
    pub fn aria_labelledby(&self, node: NodeId, label: NodeId) {
        let id = self.ensure_id(label);
        self.document().set_attribute(node, "aria-labelledby", &id);
    }

    // --- instance-scoped infrastructure ---

    /// Start auto-positioning; stopped on disconnection.
    pub fn auto_position(&self, config: AutoPositionConfig) -> AutoPosition {
        let handle = auto_position(self.scheduler(), self.cache(), config);
        let stop = handle.clone();
        self.on_cleanup(move || stop.stop());
        handle
    }

    /// Create a focus trap; deactivated on disconnection.
    pub fn focus_trap(&self, container: NodeId, options: FocusTrapOptions) -> FocusTrap {
        let trap = FocusTrap::new(self.document(), container, options);
        let t = trap.clone();
        self.on_cleanup(move || t.deactivate());
        trap
    }

    /// Create a roving tabindex; destroyed on disconnection.
    pub fn roving_tabindex(&self, items: Vec<NodeId>, options: RovingOptions) -> RovingTabindex {
        let roving = RovingTabindex::new(self.document(), items, options);
        let r = roving.clone();
        self.on_cleanup(move || r.destroy());
        roving
    }

    /// Watch for light-dismiss of `element`; removed on disconnection.
    pub fn on_dismiss<R: CallbackResult>(
        &self,
        element: NodeId,
        options: DismissOptions,
        callback: impl Fn(DismissReason) -> R + 'static,
    ) {
        let disposer = on_dismiss(self.document(), self.portal(), element, options, callback);
        self.on_cleanup(move || disposer.dispose());
    }

    /// Tear down everything the instance registered.
    pub(crate) fn teardown(&self) {
        let inner = &self.inner;
        inner.scope.destroy();
        let transitions: Vec<Transition> = inner
            .transitions
            .borrow_mut()
            .drain()
            .map(|(_, t)| t)
            .collect();
        for transition in transitions {
            transition.destroy();
        }
        let cleanups = core::mem::take(&mut *inner.cleanups.borrow_mut());
        for cleanup in cleanups {
            if let Err(err) = cleanup() {
                tracing::error!(
                    component = %self.tag(),
                    phase = "cleanup",
                    error = %err,
                    "cleanup failed"
                );
            }
        }
        inner.states.borrow_mut().clear();
        inner.children.borrow_mut().clear();
        inner.prop_watchers.borrow_mut().clear();
    }
}
