// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bramble Component: schema-driven custom elements.
//!
//! A widget is described once by a [`ComponentSchema`]: its tag, typed properties,
//! named children, delegated events, transitions, ARIA defaults, a setup function and
//! callable methods. Defining the schema with a [`ComponentRegistry`] (usually through
//! a [`Runtime`]) turns every matching element into a live instance while it is
//! connected to the document.
//!
//! ## Instances
//!
//! When an element connects, the registry:
//!
//! 1. creates an abort signal and an [`EventScope`] rooted at the element,
//! 2. installs one delegated listener per event kind for the schema's bindings,
//! 3. optionally tracks window scroll/resize, calling a handler in the scheduler's
//!    read phase at most once per frame,
//! 4. applies the default role and ARIA attributes the element does not already carry,
//! 5. runs `setup` with a fresh [`ComponentContext`] and keeps its returned teardown.
//!
//! Disconnection reverses all of it: the signal aborts, the teardown runs, the scope
//! and every [`Transition`] are destroyed and each registered cleanup runs. Cleanups
//! and handlers that fail are logged with the component's tag and never stop their
//! siblings. Setup is not isolated; a panic in setup reaches whoever connected the
//! element.
//!
//! ## Properties
//!
//! Each [`PropDefinition`] is backed by an attribute (its kebab-case name) unless it
//! opts out of reflection. Reads parse the attribute by [`PropKind`]; writes serialize
//! back, with a `false` boolean removing the attribute. See [`parse_attribute`] and
//! [`serialize_value`].
//!
//! ```
//! use bramble_component::{ComponentSchema, EventModifiers, PropDefinition, Runtime};
//! use bramble_dom::Event;
//!
//! let rt = Runtime::new(Default::default());
//! rt.define_component(
//!     ComponentSchema::new("x-toggle")
//!         .prop(PropDefinition::boolean("pressed"))
//!         .role("button")
//!         .on("click", ":scope", "toggle", EventModifiers::empty())
//!         .handler("toggle", |ctx, _event, _host| {
//!             let pressed = ctx.prop("pressed").and_then(|v| v.as_bool()).unwrap_or(false);
//!             ctx.set_prop("pressed", !pressed)
//!         }),
//! )
//! .unwrap();
//!
//! let doc = rt.document();
//! let el = doc.create_element("x-toggle");
//! doc.append_child(doc.body(), el).unwrap();
//! assert_eq!(doc.get_attribute(el, "role").as_deref(), Some("button"));
//!
//! doc.dispatch_event(el, &mut Event::new("click"));
//! assert!(doc.has_attribute(el, "pressed"));
//! ```

mod context;
mod error;
mod event_scope;
mod props;
mod registry;
mod runtime;
mod schema;
mod state;
mod transition;

pub use context::ComponentContext;
pub use error::ComponentError;
pub use event_scope::{BindingId, EventModifiers, EventScope};
pub use props::{PropDefinition, PropKind, PropValue, kebab_case, parse_attribute, serialize_value};
pub use registry::{ComponentRegistry, RegistryConfig};
pub use runtime::{Runtime, RuntimeConfig};
pub use schema::{ChildConfig, ChildSpec, ComponentSchema, EventBinding, SetupOutput};
pub use state::State;
pub use transition::{
    Transition, TransitionConfig, TransitionOutcome, TransitionState, transition_time_ms,
};
