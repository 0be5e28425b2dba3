// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The runtime: one document together with the scheduler, layout cache, portal
//! manager and component registry that serve it.
//!
//! Hosts build a [`Runtime`] from a [`RuntimeConfig`], define components on it and
//! drive time with [`Runtime::run_frame`].

use bramble_dom::{CallbackResult, Document, Event, NodeId, Value, WindowConfig};
use bramble_portal::{PortalConfig, PortalManager};
use bramble_scheduler::{Cache, CacheConfig, Scheduler};

use crate::context::ComponentContext;
use crate::error::ComponentError;
use crate::props::PropValue;
use crate::registry::{ComponentRegistry, RegistryConfig};
use crate::schema::ComponentSchema;

/// Configuration for every service a [`Runtime`] owns.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct RuntimeConfig {
    /// Window used when the runtime creates its own document.
    pub window: WindowConfig,
    /// Cache lifetimes.
    pub cache: CacheConfig,
    /// Portal stacking.
    pub portal: PortalConfig,
    /// Registration policy.
    pub registry: RegistryConfig,
}

/// A document together with the scheduler, cache, portal manager and component
/// registry that operate on it.
///
/// ```
/// use bramble_component::{ComponentSchema, PropDefinition, PropValue, Runtime, RuntimeConfig};
///
/// let rt = Runtime::new(RuntimeConfig::default());
/// rt.define_component(
///     ComponentSchema::new("x-switch").prop(PropDefinition::boolean("checked")),
/// )
/// .unwrap();
///
/// let doc = rt.document();
/// let el = doc.create_element("x-switch");
/// doc.append_child(doc.body(), el).unwrap();
/// rt.set_prop(el, "checked", true).unwrap();
/// assert_eq!(doc.get_attribute(el, "checked").as_deref(), Some(""));
/// assert_eq!(rt.prop(el, "checked").unwrap(), PropValue::Boolean(true));
/// ```
#[derive(Clone, Debug)]
pub struct Runtime {
    doc: Document,
    registry: ComponentRegistry,
}

impl Runtime {
    /// A runtime over a fresh document built from `config.window`.
    pub fn new(config: RuntimeConfig) -> Self {
        let doc = Document::with_config(config.window.clone());
        Self::with_document(&doc, config)
    }

    /// A runtime over an existing document. `config.window` is ignored.
    pub fn with_document(doc: &Document, config: RuntimeConfig) -> Self {
        let scheduler = Scheduler::new(doc.clone());
        let cache = Cache::new(doc.clone(), config.cache);
        let portal = PortalManager::new(doc, config.portal);
        let registry = ComponentRegistry::new(doc, scheduler, cache, portal, config.registry);
        Self {
            doc: doc.clone(),
            registry,
        }
    }

    /// The document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The read/write scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.registry.services().scheduler
    }

    /// The layout cache.
    pub fn cache(&self) -> &Cache {
        &self.registry.services().cache
    }

    /// The portal manager.
    pub fn portal(&self) -> &PortalManager {
        &self.registry.services().portal
    }

    /// The component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// See [`ComponentRegistry::define_component`].
    pub fn define_component(&self, schema: ComponentSchema) -> Result<(), ComponentError> {
        self.registry.define_component(schema)
    }

    /// See [`ComponentRegistry::init`].
    pub fn init(&self) {
        self.registry.init();
    }

    /// See [`ComponentRegistry::register_inline_handler`].
    pub fn register_inline_handler<R: CallbackResult>(
        &self,
        name: &str,
        f: impl Fn(&mut Event, NodeId) -> R + 'static,
    ) {
        self.registry.register_inline_handler(name, f);
    }

    /// See [`ComponentRegistry::prop`].
    pub fn prop(&self, node: NodeId, name: &str) -> Result<PropValue, ComponentError> {
        self.registry.prop(node, name)
    }

    /// See [`ComponentRegistry::set_prop`].
    pub fn set_prop(
        &self,
        node: NodeId,
        name: &str,
        value: impl Into<PropValue>,
    ) -> Result<(), ComponentError> {
        self.registry.set_prop(node, name, value)
    }

    /// See [`ComponentRegistry::call`].
    pub fn call(&self, node: NodeId, method: &str, args: &Value) -> Result<Value, ComponentError> {
        self.registry.call(node, method, args)
    }

    /// See [`ComponentRegistry::instance_context`].
    pub fn instance_context(&self, node: NodeId) -> Option<ComponentContext> {
        self.registry.instance_context(node)
    }

    /// Run one window frame: timers, animation frames (including the scheduler's
    /// flush) and idle callbacks.
    pub fn run_frame(&self) {
        self.doc.run_frame();
    }
}
