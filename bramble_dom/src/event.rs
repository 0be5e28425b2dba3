// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Events, listener options and propagation paths.
//!
//! ## Propagation
//!
//! Dispatch to a node follows the DOM's three phases over the path
//! window → document → … → target:
//!
//! - **Capture**: every ancestor, outermost first, running capture listeners.
//! - **Target**: the target itself, capture listeners first, then the rest.
//! - **Bubble**: every ancestor, innermost first, running non-capture listeners.
//!   Skipped entirely for events that do not bubble.
//!
//! [`Event::stop_propagation`] finishes the current step and skips the rest;
//! [`Event::stop_immediate_propagation`] skips even the remaining listeners of
//! the current step.

use serde_json::Value;

use crate::abort::AbortSignal;
use crate::types::{EventTarget, NodeId};

/// Kinds that do not bubble when created through [`Event::new`].
const NON_BUBBLING: &[&str] = &[
    "focus",
    "blur",
    "scroll",
    "resize",
    "load",
    "mouseenter",
    "mouseleave",
    "pointerenter",
    "pointerleave",
];

/// Phase of event propagation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not currently being dispatched.
    None,
    /// Walking from the window towards the target.
    Capture,
    /// At the target.
    Target,
    /// Walking from the target back up to the window.
    Bubble,
}

/// An event travelling through the document.
#[derive(Clone, Debug)]
pub struct Event {
    kind: String,
    bubbles: bool,
    key: Option<String>,
    shift_key: bool,
    detail: Value,
    pub(crate) target: Option<EventTarget>,
    pub(crate) current_target: Option<EventTarget>,
    pub(crate) phase: Phase,
    pub(crate) in_passive_listener: bool,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_stopped: bool,
}

impl Event {
    /// Create an event; well-known non-bubbling kinds (`focus`, `scroll`, …) do not bubble.
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let bubbles = !NON_BUBBLING.contains(&kind.as_str());
        Self {
            kind,
            bubbles,
            key: None,
            shift_key: false,
            detail: Value::Null,
            target: None,
            current_target: None,
            phase: Phase::None,
            in_passive_listener: false,
            default_prevented: false,
            propagation_stopped: false,
            immediate_stopped: false,
        }
    }

    /// A bubbling custom event carrying `detail`.
    pub fn custom(kind: impl Into<String>, detail: Value) -> Self {
        let mut event = Self::new(kind);
        event.bubbles = true;
        event.detail = detail;
        event
    }

    /// A `keydown` event for `key` (`"Tab"`, `"Escape"`, `"ArrowDown"`, …).
    pub fn keydown(key: impl Into<String>) -> Self {
        Self::new("keydown").with_key(key)
    }

    /// Set the key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the shift modifier.
    #[must_use]
    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift_key = shift;
        self
    }

    /// Override whether the event bubbles.
    #[must_use]
    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    /// The event type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether the event bubbles.
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// The key for keyboard events.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether shift was held.
    pub fn shift_key(&self) -> bool {
        self.shift_key
    }

    /// Custom event payload (`Null` for native events).
    pub fn detail(&self) -> &Value {
        &self.detail
    }

    /// The dispatch target.
    pub fn target(&self) -> Option<EventTarget> {
        self.target
    }

    /// The dispatch target when it is a node.
    pub fn target_node(&self) -> Option<NodeId> {
        match self.target? {
            EventTarget::Node(n) => Some(n),
            EventTarget::Window => None,
        }
    }

    /// The target whose listeners are currently running.
    pub fn current_target(&self) -> Option<EventTarget> {
        self.current_target
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Cancel the default action. Ignored inside passive listeners.
    pub fn prevent_default(&mut self) {
        if !self.in_passive_listener {
            self.default_prevented = true;
        }
    }

    /// Whether the default action was cancelled.
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop after the listeners of the current target have run.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Stop now, skipping even the remaining listeners of the current target.
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_stopped = true;
    }

    /// Whether propagation was stopped.
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub(crate) fn immediate_stopped(&self) -> bool {
        self.immediate_stopped
    }

    pub(crate) fn reset_dispatch_flags(&mut self) {
        self.phase = Phase::None;
        self.current_target = None;
        self.in_passive_listener = false;
    }
}

/// Options for [`Document::add_event_listener`](crate::Document::add_event_listener).
#[derive(Clone, Debug, Default)]
pub struct ListenerOptions {
    /// Run during the capture phase instead of the bubble phase.
    pub capture: bool,
    /// The listener never cancels the default action.
    pub passive: bool,
    /// Remove the listener after its first invocation.
    pub once: bool,
    /// Remove the listener when this signal aborts.
    pub signal: Option<AbortSignal>,
}

impl ListenerOptions {
    /// Capture-phase options.
    pub fn capture() -> Self {
        Self {
            capture: true,
            ..Self::default()
        }
    }

    /// Mark passive.
    #[must_use]
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Mark once.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Tie the listener's lifetime to `signal`.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// One step of a propagation sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) phase: Phase,
    pub(crate) target: EventTarget,
    /// Which listeners run at this step: capture-only, bubble-only or both (target).
    pub(crate) capture: Option<bool>,
}

/// Emit the capture → target → bubble sequence for a root→target path.
pub(crate) fn emit_path(path: &[EventTarget], bubbles: bool) -> Vec<Step> {
    let mut out = Vec::new();
    let Some((target, ancestors)) = path.split_last() else {
        return out;
    };
    for &t in ancestors {
        out.push(Step {
            phase: Phase::Capture,
            target: t,
            capture: Some(true),
        });
    }
    out.push(Step {
        phase: Phase::Target,
        target: *target,
        capture: None,
    });
    if bubbles {
        for &t in ancestors.iter().rev() {
            out.push(Step {
                phase: Phase::Bubble,
                target: t,
                capture: Some(false),
            });
        }
    }
    out
}
