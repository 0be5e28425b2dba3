// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cancellation scopes.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;

type AbortCallback = Box<dyn FnOnce()>;

#[derive(Default)]
struct AbortInner {
    aborted: Cell<bool>,
    callbacks: RefCell<Vec<AbortCallback>>,
}

/// Read side of an [`AbortController`]; cheap to clone.
#[derive(Clone, Default)]
pub struct AbortSignal(Rc<AbortInner>);

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.aborted())
            .finish_non_exhaustive()
    }
}

impl AbortSignal {
    /// Whether the owning controller has aborted.
    pub fn aborted(&self) -> bool {
        self.0.aborted.get()
    }

    /// Run `f` once when the signal aborts; runs immediately if it already has.
    pub fn on_abort(&self, f: impl FnOnce() + 'static) {
        if self.aborted() {
            f();
        } else {
            self.0.callbacks.borrow_mut().push(Box::new(f));
        }
    }
}

/// Owner of a cancellation scope.
///
/// ```
/// use bramble_dom::AbortController;
///
/// let controller = AbortController::new();
/// let signal = controller.signal();
/// assert!(!signal.aborted());
/// controller.abort();
/// assert!(signal.aborted());
/// ```
#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    /// Create a live controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle observers can hold.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Abort the scope, running registered callbacks in order. Idempotent.
    pub fn abort(&self) {
        let inner = &self.signal.0;
        if inner.aborted.replace(true) {
            return;
        }
        let callbacks = core::mem::take(&mut *inner.callbacks.borrow_mut());
        for cb in callbacks {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_run_once_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let controller = AbortController::new();
        let signal = controller.signal();
        for i in 0..3 {
            let log = log.clone();
            signal.on_abort(move || log.borrow_mut().push(i));
        }
        controller.abort();
        controller.abort();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn late_registration_runs_immediately() {
        let controller = AbortController::new();
        controller.abort();
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        controller.signal().on_abort(move || h.set(true));
        assert!(hit.get());
    }
}
