// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explicit teardown handles.

use core::fmt;

/// A one-shot teardown action.
///
/// Dropping a `Disposer` does nothing; call [`Disposer::dispose`]. Teardown often
/// touches the document, and running it from `Drop` would make it fire at
/// points where the document is already borrowed.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use bramble_dom::Disposer;
///
/// let hits = Rc::new(Cell::new(0));
/// let h = hits.clone();
/// let a = Disposer::new(move || h.set(h.get() + 1));
/// let h = hits.clone();
/// let both = a.and(Disposer::new(move || h.set(h.get() + 10)));
/// both.dispose();
/// assert_eq!(hits.get(), 11);
/// ```
#[must_use = "a disposer does nothing until `dispose` is called"]
#[derive(Default)]
pub struct Disposer {
    actions: Vec<Box<dyn FnOnce()>>,
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Disposer {
    /// Wrap a teardown action.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            actions: vec![Box::new(action)],
        }
    }

    /// A disposer with nothing to do.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Chain another disposer; actions run in the order they were added.
    pub fn and(mut self, other: Self) -> Self {
        self.actions.extend(other.actions);
        self
    }

    /// Add an action in place.
    pub fn push(&mut self, action: impl FnOnce() + 'static) {
        self.actions.push(Box::new(action));
    }

    /// Run every action.
    pub fn dispose(self) {
        for action in self.actions {
            action();
        }
    }
}
