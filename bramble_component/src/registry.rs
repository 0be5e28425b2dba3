// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component registration and per-instance lifecycle.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use bramble_dom::{
    AbortController, CallbackResult, Disposer, Document, ElementHooks, Event, EventTarget,
    ListenerOptions, NodeId, ObserverId, Value,
};
use bramble_portal::PortalManager;
use bramble_scheduler::{Cache, Scheduler};
use hashbrown::HashMap;

use crate::context::{ComponentContext, WeakContext};
use crate::error::ComponentError;
use crate::event_scope::EventScope;
use crate::props::{PropDefinition, PropValue};
use crate::schema::{ComponentSchema, Definition, HandlerFn};

/// Registration policy.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct RegistryConfig {
    /// Queue definitions until [`ComponentRegistry::init`] instead of defining them at once.
    pub defer_registration: bool,
    /// Prefix for generated element ids.
    pub id_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            defer_registration: false,
            id_prefix: "bramble".to_owned(),
        }
    }
}

/// Unique element id generator.
#[derive(Clone, Debug)]
pub(crate) struct IdGenerator {
    prefix: Rc<str>,
    next: Rc<Cell<u64>>,
}

impl IdGenerator {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.into(),
            next: Rc::new(Cell::new(0)),
        }
    }

    /// The next `{prefix}-{n}` not already used by a connected element.
    pub(crate) fn generate(&self, doc: &Document) -> String {
        loop {
            let n = self.next.get() + 1;
            self.next.set(n);
            let id = format!("{}-{n}", self.prefix);
            if doc.element_by_id(&id).is_none() {
                return id;
            }
        }
    }
}

/// Shared services every instance context hands out.
#[derive(Clone, Debug)]
pub(crate) struct Services {
    pub(crate) doc: Document,
    pub(crate) scheduler: Scheduler,
    pub(crate) cache: Cache,
    pub(crate) portal: PortalManager,
    pub(crate) ids: IdGenerator,
}

type InlineHandler = Rc<dyn Fn(&mut Event, NodeId) -> anyhow::Result<()>>;

struct Instance {
    ctx: ComponentContext,
    controller: AbortController,
    cleanup: Option<Disposer>,
}

pub(crate) struct RegistryInner {
    services: Services,
    config: RegistryConfig,
    definitions: RefCell<HashMap<String, Rc<Definition>>>,
    pending: RefCell<Vec<Rc<Definition>>>,
    instances: RefCell<HashMap<NodeId, Instance>>,
    stored_props: RefCell<HashMap<NodeId, HashMap<String, PropValue>>>,
    inline_handlers: RefCell<HashMap<String, InlineHandler>>,
    disposal_hook: Cell<Option<ObserverId>>,
}

/// Component definitions and the live instances created from them.
///
/// Defining a component registers a custom element with the document. From then on,
/// every element with that tag gets an instance when it connects: delegated events,
/// viewport tracking, ARIA defaults and the schema's setup. Disconnection tears the
/// instance down again.
#[derive(Clone)]
pub struct ComponentRegistry {
    inner: Rc<RegistryInner>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("config", &self.inner.config)
            .field("definitions", &self.inner.definitions.borrow().len())
            .field("pending", &self.inner.pending.borrow().len())
            .field("instances", &self.inner.instances.borrow().len())
            .finish_non_exhaustive()
    }
}

struct ComponentHooks {
    registry: Weak<RegistryInner>,
    definition: Rc<Definition>,
}

impl ElementHooks for ComponentHooks {
    fn connected(&self, _doc: &Document, node: NodeId) {
        if let Some(registry) = self.registry.upgrade() {
            registry.connect(&self.definition, node);
        }
    }

    fn disconnected(&self, _doc: &Document, node: NodeId) {
        if let Some(registry) = self.registry.upgrade() {
            registry.disconnect(node);
        }
    }

    fn observed_attributes(&self) -> &[String] {
        &self.definition.observed
    }

    fn attribute_changed(
        &self,
        _doc: &Document,
        node: NodeId,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        if old == new {
            return;
        }
        if let Some(registry) = self.registry.upgrade()
            && let Some(prop) = self.definition.prop_for_attribute(name)
        {
            registry.attribute_changed(node, prop, old, new);
        }
    }
}

impl ComponentRegistry {
    pub(crate) fn new(
        doc: &Document,
        scheduler: Scheduler,
        cache: Cache,
        portal: PortalManager,
        config: RegistryConfig,
    ) -> Self {
        let services = Services {
            doc: doc.clone(),
            scheduler,
            cache,
            portal,
            ids: IdGenerator::new(&config.id_prefix),
        };
        let inner = Rc::new(RegistryInner {
            services,
            config,
            definitions: RefCell::default(),
            pending: RefCell::default(),
            instances: RefCell::default(),
            stored_props: RefCell::default(),
            inline_handlers: RefCell::default(),
            disposal_hook: Cell::new(None),
        });
        let weak = Rc::downgrade(&inner);
        let hook = doc.add_disposal_hook(move |node| {
            if let Some(inner) = weak.upgrade() {
                inner.stored_props.borrow_mut().remove(&node);
            }
        });
        inner.disposal_hook.set(Some(hook));
        Self { inner }
    }

    /// Validate `schema` and define it, or queue it when registration is deferred.
    ///
    /// Fails for an invalid tag, an invalid selector, or a tag this registry already knows.
    pub fn define_component(&self, schema: ComponentSchema) -> Result<(), ComponentError> {
        let definition = Rc::new(schema.resolve()?);
        let tag = definition.tag().to_owned();
        {
            let mut definitions = self.inner.definitions.borrow_mut();
            if definitions.contains_key(&tag) {
                return Err(ComponentError::AlreadyDefined(tag));
            }
            definitions.insert(tag.clone(), definition.clone());
        }
        if self.inner.config.defer_registration {
            tracing::debug!(component = %tag, "component queued");
            self.inner.pending.borrow_mut().push(definition);
        } else {
            self.inner.register(definition);
        }
        Ok(())
    }

    /// Define every queued component. Idempotent.
    pub fn init(&self) {
        let pending = core::mem::take(&mut *self.inner.pending.borrow_mut());
        for definition in pending {
            self.inner.register(definition);
        }
    }

    /// Whether this registry knows `tag` (defined or queued).
    pub fn is_registered(&self, tag: &str) -> bool {
        self.inner.definitions.borrow().contains_key(tag)
    }

    /// Number of definitions waiting for [`ComponentRegistry::init`].
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.inner.instances.borrow().len()
    }

    /// Register a handler that `on{event}="name"` attributes can refer to.
    pub fn register_inline_handler<R: CallbackResult>(
        &self,
        name: &str,
        f: impl Fn(&mut Event, NodeId) -> R + 'static,
    ) {
        self.inner.inline_handlers.borrow_mut().insert(
            name.to_owned(),
            Rc::new(move |e: &mut Event, n: NodeId| f(e, n).into_result()),
        );
    }

    /// Read a property of a component element.
    pub fn prop(&self, node: NodeId, name: &str) -> Result<PropValue, ComponentError> {
        self.inner.prop(node, name)
    }

    /// Assign a property of a component element.
    pub fn set_prop(
        &self,
        node: NodeId,
        name: &str,
        value: impl Into<PropValue>,
    ) -> Result<(), ComponentError> {
        self.inner.set_prop(node, name, value.into())
    }

    /// Invoke a schema method on a connected component element.
    pub fn call(&self, node: NodeId, method: &str, args: &Value) -> Result<Value, ComponentError> {
        let definition = self.inner.definition_of(node)?;
        let Some(f) = definition.schema.methods.get(method).cloned() else {
            return Err(ComponentError::UnknownMethod {
                tag: definition.tag().to_owned(),
                method: method.to_owned(),
            });
        };
        let Some(ctx) = self.instance_context(node) else {
            return Err(ComponentError::NotConnected {
                tag: definition.tag().to_owned(),
            });
        };
        f(&ctx, args).map_err(|err| ComponentError::Method {
            tag: definition.tag().to_owned(),
            method: method.to_owned(),
            message: format!("{err:#}"),
        })
    }

    /// The context of the live instance on `node`.
    pub fn instance_context(&self, node: NodeId) -> Option<ComponentContext> {
        self.inner
            .instances
            .borrow()
            .get(&node)
            .map(|i| i.ctx.clone())
    }

    /// Remove the document hook installed by this registry.
    pub fn detach(&self) {
        if let Some(hook) = self.inner.disposal_hook.take() {
            self.inner.services.doc.remove_disposal_hook(hook);
        }
    }

    pub(crate) fn services(&self) -> &Services {
        &self.inner.services
    }
}

impl RegistryInner {
    pub(crate) fn services(&self) -> &Services {
        &self.services
    }

    pub(crate) fn inline_handler(&self, name: &str) -> Option<InlineHandler> {
        self.inline_handlers.borrow().get(name).cloned()
    }

    fn register(self: &Rc<Self>, definition: Rc<Definition>) {
        let doc = &self.services.doc;
        let tag = definition.tag().to_owned();
        if doc.is_defined(&tag) {
            tracing::warn!(component = %tag, "already defined in the document; skipped");
            return;
        }
        let hooks = Rc::new(ComponentHooks {
            registry: Rc::downgrade(self),
            definition,
        });
        match doc.define(&tag, hooks) {
            Ok(()) => tracing::debug!(component = %tag, "component defined"),
            Err(err) => tracing::warn!(component = %tag, error = %err, "component not defined"),
        }
    }

    fn definition_of(&self, node: NodeId) -> Result<Rc<Definition>, ComponentError> {
        self.services
            .doc
            .tag_name(node)
            .and_then(|tag| self.definitions.borrow().get(&tag).cloned())
            .ok_or(ComponentError::NotAComponent(node))
    }

    fn connect(self: &Rc<Self>, definition: &Rc<Definition>, node: NodeId) {
        if self.instances.borrow().contains_key(&node) {
            self.disconnect(node);
        }
        let doc = &self.services.doc;
        let tag = definition.tag();
        let controller = AbortController::new();
        let scope = EventScope::labelled(doc, node, tag);
        let ctx = ComponentContext::new(
            self,
            definition.clone(),
            node,
            controller.signal(),
            scope.clone(),
        );
        let schema = &definition.schema;

        for binding in &schema.events {
            let Some(handler) = schema.handlers.get(&binding.handler).cloned() else {
                tracing::warn!(
                    component = %tag,
                    handler = %binding.handler,
                    "unknown handler; binding skipped"
                );
                continue;
            };
            let weak = ctx.downgrade();
            let bound = scope.on(
                &binding.event,
                &binding.selector,
                binding.modifiers,
                move |e: &mut Event, matched: NodeId| -> anyhow::Result<()> {
                    match weak.upgrade() {
                        Some(ctx) => handler(&ctx, e, matched),
                        None => Ok(()),
                    }
                },
            );
            if let Err(err) = bound {
                tracing::error!(component = %tag, error = %err, "event binding failed");
            }
        }

        if let Some(name) = &schema.viewport_handler {
            match schema.handlers.get(name) {
                Some(handler) => self.track_viewport(&ctx, handler.clone()),
                None => {
                    tracing::warn!(component = %tag, handler = %name, "unknown viewport handler");
                }
            }
        }

        if let Some(role) = &schema.role
            && !doc.has_attribute(node, "role")
        {
            doc.set_attribute(node, "role", role);
        }
        for (name, value) in &schema.aria {
            if !doc.has_attribute(node, name) {
                doc.set_attribute(node, name, value);
            }
        }

        self.instances.borrow_mut().insert(
            node,
            Instance {
                ctx: ctx.clone(),
                controller,
                cleanup: None,
            },
        );
        tracing::debug!(component = %tag, ?node, "connected");

        if let Some(setup) = schema.setup.clone() {
            let cleanup = setup(&ctx);
            let orphaned = match self.instances.borrow_mut().get_mut(&node) {
                Some(instance) if instance.ctx.ptr_eq(&ctx) => {
                    instance.cleanup = cleanup;
                    None
                }
                _ => cleanup,
            };
            // Setup disconnected its own element.
            if let Some(cleanup) = orphaned {
                cleanup.dispose();
            }
        }
    }

    fn track_viewport(&self, ctx: &ComponentContext, handler: HandlerFn) {
        let doc = &self.services.doc;
        let pending = Rc::new(Cell::new(false));
        for (kind, capture) in [("scroll", true), ("resize", false)] {
            let mut options = if capture {
                ListenerOptions::capture()
            } else {
                ListenerOptions::default()
            };
            options = options.passive().with_signal(ctx.signal());
            let weak = ctx.downgrade();
            let pending = pending.clone();
            let handler = handler.clone();
            let scheduler = self.services.scheduler.clone();
            let _listener =
                doc.add_event_listener(EventTarget::Window, kind, options, move |_: &mut Event| {
                    if pending.replace(true) {
                        return;
                    }
                    schedule_viewport_read(
                        &scheduler,
                        weak.clone(),
                        pending.clone(),
                        handler.clone(),
                        kind,
                    );
                });
        }
    }

    fn disconnect(&self, node: NodeId) {
        let Some(instance) = self.instances.borrow_mut().remove(&node) else {
            return;
        };
        let tag = instance.ctx.tag().to_owned();
        instance.controller.abort();
        if let Some(cleanup) = instance.cleanup {
            cleanup.dispose();
        }
        instance.ctx.teardown();
        tracing::debug!(component = %tag, ?node, "disconnected");
    }

    fn attribute_changed(
        &self,
        node: NodeId,
        prop: &PropDefinition,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        let parsed = prop.parse(new);
        let previous = if prop.reflects() {
            prop.parse(old)
        } else {
            self.stored_props
                .borrow_mut()
                .entry(node)
                .or_default()
                .insert(prop.name().to_owned(), parsed.clone())
                .unwrap_or_else(|| prop.parse(old))
        };
        if parsed != previous {
            self.notify(node, prop.name(), &parsed, &previous);
        }
    }

    fn notify(&self, node: NodeId, name: &str, new: &PropValue, previous: &PropValue) {
        let ctx = self.instances.borrow().get(&node).map(|i| i.ctx.clone());
        if let Some(ctx) = ctx {
            ctx.notify_prop_change(name, new, previous);
        }
    }

    fn prop_definition(&self, node: NodeId, name: &str) -> Result<PropDefinition, ComponentError> {
        let definition = self.definition_of(node)?;
        definition
            .prop(name)
            .cloned()
            .ok_or_else(|| ComponentError::UnknownProp {
                tag: definition.tag().to_owned(),
                prop: name.to_owned(),
            })
    }

    fn current_value(&self, node: NodeId, prop: &PropDefinition) -> PropValue {
        if !prop.reflects()
            && let Some(value) = self
                .stored_props
                .borrow()
                .get(&node)
                .and_then(|m| m.get(prop.name()))
        {
            return value.clone();
        }
        let raw = self.services.doc.get_attribute(node, &prop.attribute_name());
        prop.parse(raw.as_deref())
    }

    pub(crate) fn prop(&self, node: NodeId, name: &str) -> Result<PropValue, ComponentError> {
        let prop = self.prop_definition(node, name)?;
        Ok(self.current_value(node, &prop))
    }

    pub(crate) fn set_prop(
        &self,
        node: NodeId,
        name: &str,
        value: PropValue,
    ) -> Result<(), ComponentError> {
        let prop = self.prop_definition(node, name)?;
        if !value.fits(prop.kind()) {
            return Err(ComponentError::PropType {
                prop: name.to_owned(),
                expected: prop.kind(),
            });
        }
        if prop.reflects() {
            let doc = &self.services.doc;
            let attribute = prop.attribute_name();
            match prop.serialize(&value) {
                Some(text) => doc.set_attribute(node, &attribute, &text),
                None => doc.remove_attribute(node, &attribute),
            }
            return Ok(());
        }
        let previous = self.current_value(node, &prop);
        self.stored_props
            .borrow_mut()
            .entry(node)
            .or_default()
            .insert(prop.name().to_owned(), value.clone());
        if previous != value {
            self.notify(node, prop.name(), &value, &previous);
        }
        Ok(())
    }
}

fn schedule_viewport_read(
    scheduler: &Scheduler,
    ctx: WeakContext,
    pending: Rc<Cell<bool>>,
    handler: HandlerFn,
    kind: &'static str,
) {
    let _read = scheduler.try_read(move || -> anyhow::Result<()> {
        pending.set(false);
        let Some(ctx) = ctx.upgrade() else {
            return Ok(());
        };
        if ctx.signal().aborted() {
            return Ok(());
        }
        let host = ctx.element();
        handler(&ctx, &mut Event::new(kind), host)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bramble_dom::json;
    use bramble_portal::PortalConfig;
    use bramble_scheduler::CacheConfig;

    fn registry(doc: &Document, config: RegistryConfig) -> ComponentRegistry {
        ComponentRegistry::new(
            doc,
            Scheduler::new(doc.clone()),
            Cache::new(doc.clone(), CacheConfig::default()),
            PortalManager::new(doc, PortalConfig::default()),
            config,
        )
    }

    fn mount(doc: &Document, tag: &str) -> NodeId {
        let el = doc.create_element(tag);
        doc.append_child(doc.body(), el).unwrap();
        el
    }

    #[test]
    fn invalid_and_duplicate_tags_fail() {
        let doc = Document::new();
        let reg = registry(&doc, RegistryConfig::default());
        assert!(matches!(
            reg.define_component(ComponentSchema::new("Nope")),
            Err(ComponentError::InvalidTag(_))
        ));
        reg.define_component(ComponentSchema::new("x-one")).unwrap();
        assert!(matches!(
            reg.define_component(ComponentSchema::new("x-one")),
            Err(ComponentError::AlreadyDefined(tag)) if tag == "x-one"
        ));
        assert!(reg.is_registered("x-one"));
        assert!(doc.is_defined("x-one"));
    }

    #[test]
    fn deferred_registration_waits_for_init() {
        let doc = Document::new();
        let reg = registry(
            &doc,
            RegistryConfig {
                defer_registration: true,
                ..RegistryConfig::default()
            },
        );
        reg.define_component(ComponentSchema::new("x-late").role("note"))
            .unwrap();
        let el = mount(&doc, "x-late");
        assert_eq!(reg.pending_count(), 1);
        assert!(!doc.has_attribute(el, "role"));

        reg.init();
        reg.init();
        assert_eq!(reg.pending_count(), 0);
        assert_eq!(doc.get_attribute(el, "role").as_deref(), Some("note"));
        assert_eq!(reg.instance_count(), 1);
    }

    #[test]
    fn init_skips_tags_defined_elsewhere() {
        let doc = Document::new();
        let first = registry(&doc, RegistryConfig::default());
        first
            .define_component(ComponentSchema::new("x-shared").role("group"))
            .unwrap();
        let second = registry(
            &doc,
            RegistryConfig {
                defer_registration: true,
                ..RegistryConfig::default()
            },
        );
        second
            .define_component(ComponentSchema::new("x-shared").role("list"))
            .unwrap();
        second.init();
        let el = mount(&doc, "x-shared");
        assert_eq!(doc.get_attribute(el, "role").as_deref(), Some("group"));
        assert_eq!(second.instance_count(), 0);
    }

    #[test]
    fn defaults_do_not_override_author_attributes() {
        let doc = Document::new();
        let reg = registry(&doc, RegistryConfig::default());
        reg.define_component(
            ComponentSchema::new("x-panel")
                .role("region")
                .aria("aria-live", "polite"),
        )
        .unwrap();
        let el = doc.create_element("x-panel");
        doc.set_attribute(el, "role", "alert");
        doc.append_child(doc.body(), el).unwrap();
        assert_eq!(doc.get_attribute(el, "role").as_deref(), Some("alert"));
        assert_eq!(doc.get_attribute(el, "aria-live").as_deref(), Some("polite"));
    }

    #[test]
    fn unreflected_props_are_stored_and_evicted() {
        let doc = Document::new();
        let reg = registry(&doc, RegistryConfig::default());
        reg.define_component(
            ComponentSchema::new("x-list")
                .prop(PropDefinition::array("items").without_reflection()),
        )
        .unwrap();
        let el = mount(&doc, "x-list");
        let ctx = reg.instance_context(el).unwrap();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        ctx.on_prop_change("items", move |_, _| s.set(s.get() + 1));

        reg.set_prop(el, "items", json!([1, 2])).unwrap();
        reg.set_prop(el, "items", json!([1, 2])).unwrap();
        assert_eq!(seen.get(), 1);
        assert!(!doc.has_attribute(el, "items"));
        assert_eq!(reg.prop(el, "items").unwrap(), PropValue::Json(json!([1, 2])));
        assert!(matches!(
            reg.set_prop(el, "items", "nope"),
            Err(ComponentError::PropType { .. })
        ));

        doc.destroy(el);
        assert!(reg.inner.stored_props.borrow().is_empty());
    }

    #[test]
    fn call_reports_each_failure() {
        let doc = Document::new();
        let reg = registry(&doc, RegistryConfig::default());
        reg.define_component(
            ComponentSchema::new("x-calc")
                .method("double", |_ctx, args| -> anyhow::Result<Value> {
                    let n = args
                        .as_f64()
                        .ok_or_else(|| anyhow::anyhow!("expected a number"))?;
                    Ok(json!(n * 2.0))
                }),
        )
        .unwrap();
        let plain = mount(&doc, "div");
        assert!(matches!(
            reg.call(plain, "double", &json!(1)),
            Err(ComponentError::NotAComponent(_))
        ));

        let el = doc.create_element("x-calc");
        assert!(matches!(
            reg.call(el, "double", &json!(1)),
            Err(ComponentError::NotConnected { .. })
        ));
        doc.append_child(doc.body(), el).unwrap();
        assert_eq!(reg.call(el, "double", &json!(4)).unwrap(), json!(8.0));
        assert!(matches!(
            reg.call(el, "triple", &json!(4)),
            Err(ComponentError::UnknownMethod { .. })
        ));
        assert!(matches!(
            reg.call(el, "double", &json!("x")),
            Err(ComponentError::Method { message, .. }) if message == "expected a number"
        ));
    }

    #[test]
    fn setup_that_removes_its_host_is_cleaned_up() {
        let doc = Document::new();
        let reg = registry(&doc, RegistryConfig::default());
        let disposed = Rc::new(Cell::new(false));
        let d = disposed.clone();
        reg.define_component(ComponentSchema::new("x-once").setup(move |ctx| {
            let d = d.clone();
            ctx.document().remove(ctx.element());
            Disposer::new(move || d.set(true))
        }))
        .unwrap();
        mount(&doc, "x-once");
        assert!(disposed.get());
        assert_eq!(reg.instance_count(), 0);
    }

    #[test]
    fn generated_ids_skip_existing_ones() {
        let doc = Document::new();
        let ids = IdGenerator::new("bramble");
        let taken = mount(&doc, "div");
        doc.set_attribute(taken, "id", "bramble-1");
        assert_eq!(ids.generate(&doc), "bramble-2");
        assert_eq!(ids.generate(&doc), "bramble-3");
    }
}
