// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded one-shot completions.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Why a [`Deferred`] did not produce a value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    /// Superseded by a newer request. Not a failure.
    #[error("cancelled")]
    Cancelled,
    /// The producing task failed.
    #[error("failed: {0}")]
    Failed(String),
}

type Waiter<T> = Box<dyn FnOnce(Result<&T, &Rejection>)>;

struct Inner<T> {
    settled: Option<Rc<Result<T, Rejection>>>,
    waiters: Vec<Waiter<T>>,
}

/// A value that becomes available later, exactly once.
///
/// Clones share the same slot. Continuations registered with [`Deferred::then`]
/// run when the value settles, or immediately if it already has.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use bramble_scheduler::Deferred;
///
/// let d = Deferred::new();
/// let seen = Rc::new(Cell::new(0));
/// let s = seen.clone();
/// d.then(move |r| s.set(*r.unwrap()));
/// assert!(d.resolve(7));
/// assert!(!d.resolve(8));
/// assert_eq!(seen.get(), 7);
/// assert_eq!(d.value(), Some(7));
/// ```
pub struct Deferred<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Deferred")
            .field("settled", &inner.settled)
            .field("waiters", &inner.waiters.len())
            .finish()
    }
}

impl<T: 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Deferred<T> {
    /// A pending completion.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                settled: None,
                waiters: Vec::new(),
            })),
        }
    }

    /// An already-resolved completion.
    pub fn resolved(value: T) -> Self {
        let d = Self::new();
        d.resolve(value);
        d
    }

    /// Settle with a value. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with a rejection. Returns `false` if already settled.
    pub fn reject(&self, reason: Rejection) -> bool {
        self.settle(Err(reason))
    }

    fn settle(&self, result: Result<T, Rejection>) -> bool {
        let (settled, waiters) = {
            let mut inner = self.inner.borrow_mut();
            if inner.settled.is_some() {
                return false;
            }
            let settled = Rc::new(result);
            inner.settled = Some(settled.clone());
            (settled, core::mem::take(&mut inner.waiters))
        };
        for waiter in waiters {
            waiter((*settled).as_ref());
        }
        true
    }

    /// Whether a value or rejection has arrived.
    pub fn is_settled(&self) -> bool {
        self.inner.borrow().settled.is_some()
    }

    /// Whether this was rejected as [`Rejection::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.inner.borrow().settled.as_deref(),
            Some(Err(Rejection::Cancelled))
        )
    }

    /// Run `f` once settled.
    pub fn then(&self, f: impl FnOnce(Result<&T, &Rejection>) + 'static) {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            match &inner.settled {
                Some(settled) => settled.clone(),
                None => {
                    inner.waiters.push(Box::new(f));
                    return;
                }
            }
        };
        f((*settled).as_ref());
    }

    /// The rejection, if rejected.
    pub fn rejection(&self) -> Option<Rejection> {
        match self.inner.borrow().settled.as_deref() {
            Some(Err(reason)) => Some(reason.clone()),
            _ => None,
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// The resolved value, if any.
    pub fn value(&self) -> Option<T> {
        match self.inner.borrow().settled.as_deref() {
            Some(Ok(v)) => Some(v.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuations_registered_late_run_immediately() {
        let d = Deferred::resolved("x");
        let hit = Rc::new(RefCell::new(None));
        let h = hit.clone();
        d.then(move |r| *h.borrow_mut() = r.ok().copied());
        assert_eq!(*hit.borrow(), Some("x"));
    }

    #[test]
    fn rejection_is_reported_once() {
        let d: Deferred<u8> = Deferred::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        d.then(move |r| {
            assert_eq!(r, Err(&Rejection::Cancelled), "expected a cancellation");
            *c.borrow_mut() += 1;
        });
        assert!(d.reject(Rejection::Cancelled));
        assert!(!d.reject(Rejection::Failed("late".into())));
        assert!(d.is_cancelled());
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn continuation_may_chain_on_the_same_deferred() {
        let d = Deferred::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (d2, l) = (d.clone(), log.clone());
        d.then(move |_| {
            let l = l.clone();
            d2.then(move |r| l.borrow_mut().push(*r.unwrap()));
        });
        d.resolve(3);
        assert_eq!(*log.borrow(), vec![3]);
    }
}
