// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component schemas: the static description of a component kind.

use core::fmt;
use std::rc::Rc;

use bramble_dom::{Disposer, Event, NodeId, SelectorList, Value, is_valid_custom_element_name};
use hashbrown::HashMap;

use crate::context::ComponentContext;
use crate::error::ComponentError;
use crate::event_scope::EventModifiers;
use crate::props::PropDefinition;
use crate::transition::TransitionConfig;

pub(crate) type HandlerFn = Rc<dyn Fn(&ComponentContext, &mut Event, NodeId) -> anyhow::Result<()>>;
pub(crate) type MethodFn = Rc<dyn Fn(&ComponentContext, &Value) -> anyhow::Result<Value>>;
pub(crate) type SetupFn = Rc<dyn Fn(&ComponentContext) -> Option<Disposer>>;

/// What a setup function may return.
///
/// Returning a [`Disposer`] registers it as the instance's teardown, run first on
/// disconnection.
pub trait SetupOutput {
    /// The teardown to keep, if any.
    fn into_cleanup(self) -> Option<Disposer>;
}

impl SetupOutput for () {
    fn into_cleanup(self) -> Option<Disposer> {
        None
    }
}

impl SetupOutput for Disposer {
    fn into_cleanup(self) -> Option<Disposer> {
        Some(self)
    }
}

impl SetupOutput for Option<Disposer> {
    fn into_cleanup(self) -> Option<Disposer> {
        self
    }
}

/// How a named child is found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildSpec {
    /// The first descendant matching a selector, resolved once and cached.
    Selector(String),
    /// Full control over cardinality, caching and slots.
    Config(ChildConfig),
}

impl From<&str> for ChildSpec {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_owned())
    }
}

impl From<ChildConfig> for ChildSpec {
    fn from(config: ChildConfig) -> Self {
        Self::Config(config)
    }
}

/// Detailed child lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildConfig {
    /// Selector matched against descendants (`:scope` is the host).
    pub selector: String,
    /// Resolve every match instead of the first.
    pub multiple: bool,
    /// Re-query on every access instead of caching the first non-empty result.
    pub observe: bool,
    /// Only direct children with this `slot` attribute.
    pub slot: Option<String>,
}

impl ChildConfig {
    /// The first match for `selector`.
    pub fn one(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            multiple: false,
            observe: false,
            slot: None,
        }
    }

    /// Every match for `selector`.
    pub fn all(selector: impl Into<String>) -> Self {
        Self {
            multiple: true,
            ..Self::one(selector)
        }
    }

    /// Re-query on every access.
    #[must_use]
    pub fn observing(mut self) -> Self {
        self.observe = true;
        self
    }

    /// Restrict to direct children in `slot`.
    #[must_use]
    pub fn in_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }
}

/// One delegated event binding: `event` on descendants matching `selector` calls the
/// handler registered under `handler`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBinding {
    /// Event kind.
    pub event: String,
    /// Selector for the delegating element.
    pub selector: String,
    /// Name of a handler registered with [`ComponentSchema::handler`].
    pub handler: String,
    /// Modifiers applied around the handler.
    pub modifiers: EventModifiers,
}

/// The static description of a component kind.
///
/// ```
/// use bramble_component::{ChildConfig, ComponentSchema, EventModifiers, PropDefinition};
///
/// let schema = ComponentSchema::new("x-disclosure")
///     .prop(PropDefinition::boolean("open"))
///     .child("trigger", "button")
///     .child("panels", ChildConfig::all("[data-panel]"))
///     .on("click", "button", "toggle", EventModifiers::PREVENT)
///     .handler("toggle", |ctx, _event, _button| {
///         let open = ctx.prop("open").and_then(|v| v.as_bool()).unwrap_or(false);
///         ctx.set_prop("open", !open)
///     })
///     .role("group");
/// assert_eq!(schema.tag(), "x-disclosure");
/// ```
#[derive(Clone)]
pub struct ComponentSchema {
    pub(crate) tag: String,
    pub(crate) props: Vec<PropDefinition>,
    pub(crate) children: Vec<(String, ChildSpec)>,
    pub(crate) events: Vec<EventBinding>,
    pub(crate) handlers: HashMap<String, HandlerFn>,
    pub(crate) transitions: Vec<(String, TransitionConfig)>,
    pub(crate) role: Option<String>,
    pub(crate) aria: Vec<(String, String)>,
    pub(crate) setup: Option<SetupFn>,
    pub(crate) methods: HashMap<String, MethodFn>,
    pub(crate) viewport_handler: Option<String>,
}

impl fmt::Debug for ComponentSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSchema")
            .field("tag", &self.tag)
            .field("props", &self.props)
            .field("children", &self.children)
            .field("events", &self.events)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("transitions", &self.transitions)
            .field("role", &self.role)
            .field("aria", &self.aria)
            .field("setup", &self.setup.is_some())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("viewport_handler", &self.viewport_handler)
            .finish()
    }
}

impl ComponentSchema {
    /// An empty schema for `tag`. The tag is validated on registration.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            props: Vec::new(),
            children: Vec::new(),
            events: Vec::new(),
            handlers: HashMap::new(),
            transitions: Vec::new(),
            role: None,
            aria: Vec::new(),
            setup: None,
            methods: HashMap::new(),
            viewport_handler: None,
        }
    }

    /// The element tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Declare a property.
    #[must_use]
    pub fn prop(mut self, prop: PropDefinition) -> Self {
        self.props.push(prop);
        self
    }

    /// Declare a named child lookup.
    #[must_use]
    pub fn child(mut self, name: impl Into<String>, spec: impl Into<ChildSpec>) -> Self {
        self.children.push((name.into(), spec.into()));
        self
    }

    /// Delegate `event` on elements matching `selector` to the handler named `handler`.
    #[must_use]
    pub fn on(
        mut self,
        event: impl Into<String>,
        selector: impl Into<String>,
        handler: impl Into<String>,
        modifiers: EventModifiers,
    ) -> Self {
        self.events.push(EventBinding {
            event: event.into(),
            selector: selector.into(),
            handler: handler.into(),
            modifiers,
        });
        self
    }

    /// Register a handler method for event bindings and viewport tracking.
    ///
    /// The handler receives the instance context, the event and the element that matched.
    #[must_use]
    pub fn handler<E>(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&ComponentContext, &mut Event, NodeId) -> Result<(), E> + 'static,
    ) -> Self
    where
        E: Into<anyhow::Error>,
    {
        self.handlers.insert(
            name.into(),
            Rc::new(move |ctx: &ComponentContext, e: &mut Event, n: NodeId| {
                f(ctx, e, n).map_err(Into::into)
            }),
        );
        self
    }

    /// Declare a named transition.
    #[must_use]
    pub fn transition(mut self, name: impl Into<String>, config: TransitionConfig) -> Self {
        self.transitions.push((name.into(), config));
        self
    }

    /// The ARIA role applied on connection unless the element already has one.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// A default attribute (typically `aria-*`) applied on connection if absent.
    #[must_use]
    pub fn aria(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.aria.push((name.into(), value.into()));
        self
    }

    /// The setup function, run on every connection.
    ///
    /// Panics in setup are not caught.
    #[must_use]
    pub fn setup<S: SetupOutput>(mut self, f: impl Fn(&ComponentContext) -> S + 'static) -> Self {
        self.setup = Some(Rc::new(move |ctx: &ComponentContext| f(ctx).into_cleanup()));
        self
    }

    /// A method callable through [`Runtime::call`](crate::Runtime::call).
    #[must_use]
    pub fn method<E>(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&ComponentContext, &Value) -> Result<Value, E> + 'static,
    ) -> Self
    where
        E: Into<anyhow::Error>,
    {
        self.methods.insert(
            name.into(),
            Rc::new(move |ctx: &ComponentContext, args: &Value| f(ctx, args).map_err(Into::into)),
        );
        self
    }

    /// Call the named handler, during the scheduler's read phase, at most once per
    /// frame while the window scrolls or resizes.
    #[must_use]
    pub fn track_viewport(mut self, handler: impl Into<String>) -> Self {
        self.viewport_handler = Some(handler.into());
        self
    }

    /// Validate and resolve into a registered definition.
    pub(crate) fn resolve(self) -> Result<Definition, ComponentError> {
        if !is_valid_custom_element_name(&self.tag) {
            return Err(ComponentError::InvalidTag(self.tag));
        }
        let mut children = HashMap::new();
        for (name, spec) in &self.children {
            let query = match spec {
                ChildSpec::Selector(selector) => ChildConfig::one(selector.clone()),
                ChildSpec::Config(config) => config.clone(),
            };
            SelectorList::parse(&query.selector)?;
            children.insert(name.clone(), query);
        }
        for binding in &self.events {
            SelectorList::parse(&binding.selector)?;
            if !self.handlers.contains_key(&binding.handler) {
                tracing::warn!(
                    component = %self.tag,
                    handler = %binding.handler,
                    "event binding names an unknown handler"
                );
            }
        }
        if let Some(handler) = &self.viewport_handler
            && !self.handlers.contains_key(handler)
        {
            tracing::warn!(component = %self.tag, %handler, "viewport tracking names an unknown handler");
        }
        let observed = self.props.iter().map(PropDefinition::attribute_name).collect();
        Ok(Definition {
            schema: self,
            children,
            observed,
        })
    }
}

/// A validated schema with its lookups resolved.
pub(crate) struct Definition {
    pub(crate) schema: ComponentSchema,
    pub(crate) children: HashMap<String, ChildConfig>,
    pub(crate) observed: Vec<String>,
}

impl Definition {
    pub(crate) fn tag(&self) -> &str {
        &self.schema.tag
    }

    pub(crate) fn prop(&self, name: &str) -> Option<&PropDefinition> {
        self.schema.props.iter().find(|p| p.name() == name)
    }

    pub(crate) fn prop_for_attribute(&self, attribute: &str) -> Option<&PropDefinition> {
        self.schema
            .props
            .iter()
            .find(|p| p.attribute_name() == attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_resolve_to_configs() {
        let def = ComponentSchema::new("x-tabs")
            .child("list", "[role=tablist]")
            .child("tabs", ChildConfig::all("[role=tab]").observing())
            .child("icon", ChildConfig::one("*").in_slot("icon"))
            .resolve()
            .unwrap();
        assert_eq!(def.children["list"], ChildConfig::one("[role=tablist]"));
        assert!(def.children["tabs"].multiple && def.children["tabs"].observe);
        assert_eq!(def.children["icon"].slot.as_deref(), Some("icon"));
    }

    #[test]
    fn invalid_tag_and_selectors_are_rejected() {
        assert!(matches!(
            ComponentSchema::new("tabs").resolve(),
            Err(ComponentError::InvalidTag(_))
        ));
        assert!(matches!(
            ComponentSchema::new("x-tabs").child("bad", "[").resolve(),
            Err(ComponentError::Dom(_))
        ));
        assert!(matches!(
            ComponentSchema::new("x-tabs")
                .on("click", "::", "go", EventModifiers::empty())
                .resolve(),
            Err(ComponentError::Dom(_))
        ));
    }

    #[test]
    fn observed_attributes_follow_props() {
        let def = ComponentSchema::new("x-slider")
            .prop(PropDefinition::number("minValue"))
            .prop(PropDefinition::string("label").with_attribute("aria-label"))
            .resolve()
            .unwrap();
        assert_eq!(def.observed, vec!["min-value", "aria-label"]);
        assert_eq!(def.prop_for_attribute("min-value").map(PropDefinition::name), Some("minValue"));
        assert!(def.prop("label").is_some());
    }
}
