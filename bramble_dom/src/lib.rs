// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bramble DOM: a headless host document for the Bramble component runtime.
//!
//! Everything above this crate (scheduler, positioning, focus management, portals,
//! components) only ever talks to a [`Document`]. The document is an in-memory
//! model of the parts of a browser page that interactive components depend on:
//!
//! - A node arena with DOM structural rules: one parent per node, moves detach first,
//!   detached nodes stay alive until [`Document::destroy`].
//! - Attributes, classes and inline style, plus a layout box per node that the host
//!   assigns with [`Document::set_rect`].
//! - A small CSS selector engine ([`SelectorList`]) for `matches`, `closest` and
//!   `query_selector_all`.
//! - Event dispatch with capture, target and bubble phases, `once`/`passive`/signal
//!   listener options, and focus tracking with `focusin`/`focusout`.
//! - Custom element definitions with connected, disconnected and attribute-changed
//!   reactions ([`ElementHooks`]).
//! - A deterministic window: viewport, clock, animation frames, timers and idle
//!   callbacks, advanced explicitly with [`Document::run_frame`] / [`Document::advance`].
//!
//! ## Not a browser
//!
//! There is no layout engine, no styling cascade and no rendering. Layout boxes are
//! whatever the host last assigned, and "rendered" means connected and not inside a
//! `display: none` subtree.
//!
//! ## Re-entrancy
//!
//! [`Document`] is a shared handle over `Rc<RefCell<..>>`. Each method borrows the
//! state briefly and releases it before invoking any callback, so listeners, hooks and
//! frame callbacks may call back into the document. Closures that the document itself
//! stores should hold a [`WeakDocument`].
//!
//! ## Example
//!
//! ```
//! use bramble_dom::{Document, Event, ListenerOptions};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let doc = Document::new();
//! let list = doc.create_element("ul");
//! let item = doc.create_element("li");
//! doc.append_child(doc.body(), list).unwrap();
//! doc.append_child(list, item).unwrap();
//!
//! let clicks = Rc::new(Cell::new(0));
//! let c = clicks.clone();
//! doc.add_event_listener(list, "click", ListenerOptions::default(), move |_| {
//!     c.set(c.get() + 1);
//! });
//! doc.dispatch_event(item, &mut Event::new("click"));
//! assert_eq!(clicks.get(), 1);
//! ```

mod abort;
mod disposer;
mod document;
mod error;
mod event;
mod selector;
mod tree;
mod types;
mod window;

pub use abort::{AbortController, AbortSignal};
pub use disposer::Disposer;
pub use document::{Document, ElementHooks, WeakDocument, is_valid_custom_element_name};
pub use error::{CallbackResult, DomError};
pub use event::{Event, ListenerOptions, Phase};
pub use selector::SelectorList;
pub use types::{
    EventTarget, FrameHandle, IdleHandle, ListenerId, NodeId, NodeKind, ObserverId, TimerHandle,
};
pub use window::WindowConfig;

pub use kurbo::{Point, Rect, Size};
pub use serde_json::{Value, json};
