// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observable per-instance state.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;

use bramble_dom::{CallbackResult, Disposer};

type Subscriber<T> = Rc<dyn Fn(&T, &T) -> anyhow::Result<()>>;

struct StateInner<T> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<(u64, Subscriber<T>)>>,
    next_id: Cell<u64>,
    label: String,
}

/// A shared value that notifies subscribers when it changes.
///
/// Subscribers receive the new and the previous value. They run after the value has
/// been stored, with no borrow held, so they may read or set the state again. A failing
/// subscriber is logged and the rest still run.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use bramble_component::State;
///
/// let open = State::new(false);
/// let seen = Rc::new(Cell::new(0));
/// let s = seen.clone();
/// let sub = open.subscribe(move |now, _before| {
///     if *now {
///         s.set(s.get() + 1);
///     }
/// });
/// open.set(true);
/// open.set(true);
/// assert_eq!(seen.get(), 1);
/// sub.dispose();
/// open.set(false);
/// open.set(true);
/// assert_eq!(seen.get(), 1);
/// ```
pub struct State<T> {
    inner: Rc<StateInner<T>>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("value", &self.inner.value.borrow())
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq + 'static> State<T> {
    /// A state holding `value`.
    pub fn new(value: T) -> Self {
        Self::labelled(value, "")
    }

    /// A state whose subscriber failures are logged under `label`.
    pub fn labelled(value: T, label: &str) -> Self {
        Self {
            inner: Rc::new(StateInner {
                value: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                label: label.to_owned(),
            }),
        }
    }

    /// A copy of the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value`, notifying subscribers if it differs from the current one.
    pub fn set(&self, value: T) {
        let previous = {
            let mut slot = self.inner.value.borrow_mut();
            if *slot == value {
                return;
            }
            core::mem::replace(&mut *slot, value.clone())
        };
        let subscribers: Vec<Subscriber<T>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        for subscriber in subscribers {
            if let Err(err) = subscriber(&value, &previous) {
                tracing::error!(
                    component = %self.inner.label,
                    phase = "state",
                    error = %err,
                    "state subscriber failed"
                );
            }
        }
    }

    /// Replace the value with `f(current)`.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Call `f(new, previous)` after every change. Dispose the result to unsubscribe.
    pub fn subscribe<R: CallbackResult>(&self, f: impl Fn(&T, &T) -> R + 'static) -> Disposer {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(move |a: &T, b: &T| f(a, b).into_result())));
        let weak = Rc::downgrade(&self.inner);
        Disposer::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}
