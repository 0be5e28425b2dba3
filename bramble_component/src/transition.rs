// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Class-driven enter/leave transitions.
//!
//! A transition moves one element through
//!
//! ```text
//! Idle ──enter──▶ Entering ──▶ Entered ──leave──▶ Leaving ──▶ Left
//!   └──────────────────leave───────────────────────▲
//! ```
//!
//! Each attempt adds the `*-from` and `*-active` classes, swaps `*-from` for `*-to` on
//! the next animation frame, waits for the element's inline transition time and then
//! strips the classes. Starting the opposite direction mid-flight cancels the running
//! attempt first: its wait is aborted, its classes are removed and its result settles
//! as [`TransitionOutcome::Cancelled`].

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use bramble_dom::{AbortController, Document, FrameHandle, NodeId, TimerHandle};
use bramble_scheduler::Deferred;

/// Where a transition is in its lifecycle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransitionState {
    /// Never run.
    #[default]
    Idle,
    /// Enter classes applied, waiting for the transition time.
    Entering,
    /// Enter finished.
    Entered,
    /// Leave classes applied, waiting for the transition time.
    Leaving,
    /// Leave finished.
    Left,
}

/// How an `enter` or `leave` call ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransitionOutcome {
    /// The element reached `Entered` or `Left`.
    Completed,
    /// A newer request superseded this one, or the transition was destroyed.
    Cancelled,
}

/// Class names for one transition.
///
/// Empty names are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionConfig {
    /// Child name (from the component's child map) to animate; the host when `None`.
    pub target: Option<String>,
    /// Added at the start of enter, removed on the next frame.
    pub enter_from: String,
    /// Present for the whole enter.
    pub enter_active: String,
    /// Added on the frame after enter starts.
    pub enter_to: String,
    /// Added at the start of leave, removed on the next frame.
    pub leave_from: String,
    /// Present for the whole leave.
    pub leave_active: String,
    /// Added on the frame after leave starts.
    pub leave_to: String,
}

impl TransitionConfig {
    /// `{name}-enter-from`, `{name}-enter-active`, … for a named transition.
    ///
    /// ```
    /// use bramble_component::TransitionConfig;
    ///
    /// let fade = TransitionConfig::named("fade");
    /// assert_eq!(fade.enter_active, "fade-enter-active");
    /// assert_eq!(fade.leave_to, "fade-leave-to");
    /// ```
    pub fn named(name: &str) -> Self {
        Self {
            target: None,
            enter_from: format!("{name}-enter-from"),
            enter_active: format!("{name}-enter-active"),
            enter_to: format!("{name}-enter-to"),
            leave_from: format!("{name}-leave-from"),
            leave_active: format!("{name}-leave-active"),
            leave_to: format!("{name}-leave-to"),
        }
    }

    /// Animate the named child instead of the host.
    #[must_use]
    pub fn on_child(mut self, child: impl Into<String>) -> Self {
        self.target = Some(child.into());
        self
    }

    fn classes(&self, direction: Direction) -> [&str; 3] {
        match direction {
            Direction::Enter => [&self.enter_from, &self.enter_active, &self.enter_to],
            Direction::Leave => [&self.leave_from, &self.leave_active, &self.leave_to],
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Direction {
    Enter,
    Leave,
}

struct Attempt {
    direction: Direction,
    controller: AbortController,
    result: Deferred<TransitionOutcome>,
    frame: Cell<Option<FrameHandle>>,
    timer: Cell<Option<TimerHandle>>,
}

type Hook = Rc<dyn Fn()>;

struct TransitionInner {
    doc: Document,
    element: NodeId,
    config: TransitionConfig,
    label: String,
    state: Cell<TransitionState>,
    attempt: RefCell<Option<Rc<Attempt>>>,
    on_entered: RefCell<Vec<Hook>>,
    on_left: RefCell<Vec<Hook>>,
    destroyed: Cell<bool>,
}

/// A cancellable enter/leave state machine bound to one element.
///
/// ```
/// use bramble_component::{Transition, TransitionConfig, TransitionOutcome, TransitionState};
/// use bramble_dom::Document;
///
/// let doc = Document::new();
/// let panel = doc.create_element("div");
/// doc.append_child(doc.body(), panel).unwrap();
/// doc.set_style(panel, "transition-duration", "100ms");
///
/// let fade = Transition::new(&doc, panel, TransitionConfig::named("fade"));
/// let entered = fade.enter();
/// assert!(doc.has_class(panel, "fade-enter-from"));
///
/// doc.run_frame();
/// assert!(doc.has_class(panel, "fade-enter-to"));
/// doc.advance(100.0);
/// assert_eq!(fade.state(), TransitionState::Entered);
/// assert_eq!(entered.value(), Some(TransitionOutcome::Completed));
/// assert!(!doc.has_class(panel, "fade-enter-active"));
/// ```
#[derive(Clone)]
pub struct Transition {
    inner: Rc<TransitionInner>,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("element", &self.inner.element)
            .field("state", &self.inner.state.get())
            .field("destroyed", &self.inner.destroyed.get())
            .finish_non_exhaustive()
    }
}

impl Transition {
    /// A transition for `element`, starting `Idle`.
    pub fn new(doc: &Document, element: NodeId, config: TransitionConfig) -> Self {
        Self::labelled(doc, element, config, "")
    }

    pub(crate) fn labelled(
        doc: &Document,
        element: NodeId,
        config: TransitionConfig,
        label: &str,
    ) -> Self {
        Self {
            inner: Rc::new(TransitionInner {
                doc: doc.clone(),
                element,
                config,
                label: label.to_owned(),
                state: Cell::new(TransitionState::Idle),
                attempt: RefCell::new(None),
                on_entered: RefCell::new(Vec::new()),
                on_left: RefCell::new(Vec::new()),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// The animated element.
    pub fn element(&self) -> NodeId {
        self.inner.element
    }

    /// The current state.
    pub fn state(&self) -> TransitionState {
        self.inner.state.get()
    }

    /// Whether an attempt is in flight.
    pub fn is_running(&self) -> bool {
        self.inner.attempt.borrow().is_some()
    }

    /// Run `f` each time an enter completes.
    pub fn on_entered(&self, f: impl Fn() + 'static) {
        self.inner.on_entered.borrow_mut().push(Rc::new(f));
    }

    /// Run `f` each time a leave completes.
    pub fn on_left(&self, f: impl Fn() + 'static) {
        self.inner.on_left.borrow_mut().push(Rc::new(f));
    }

    /// Start entering.
    ///
    /// While already entering this returns the running attempt's result; once entered it
    /// completes immediately. A running leave is cancelled first.
    pub fn enter(&self) -> Deferred<TransitionOutcome> {
        self.run(Direction::Enter)
    }

    /// Start leaving. Mirrors [`Transition::enter`].
    pub fn leave(&self) -> Deferred<TransitionOutcome> {
        self.run(Direction::Leave)
    }

    /// Cancel any running attempt, strip its classes and ignore further requests.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner.cancel_running();
        self.inner.on_entered.borrow_mut().clear();
        self.inner.on_left.borrow_mut().clear();
    }

    fn run(&self, direction: Direction) -> Deferred<TransitionOutcome> {
        let inner = &self.inner;
        if inner.destroyed.get() {
            return Deferred::resolved(TransitionOutcome::Cancelled);
        }
        let (running, done) = match direction {
            Direction::Enter => (TransitionState::Entering, TransitionState::Entered),
            Direction::Leave => (TransitionState::Leaving, TransitionState::Left),
        };
        let state = inner.state.get();
        if state == done {
            return Deferred::resolved(TransitionOutcome::Completed);
        }
        if state == running
            && let Some(attempt) = inner.attempt.borrow().as_ref()
        {
            return attempt.result.clone();
        }
        inner.cancel_running();
        inner.start(direction)
    }
}

impl TransitionInner {
    fn start(self: &Rc<Self>, direction: Direction) -> Deferred<TransitionOutcome> {
        let attempt = Rc::new(Attempt {
            direction,
            controller: AbortController::new(),
            result: Deferred::new(),
            frame: Cell::new(None),
            timer: Cell::new(None),
        });
        self.state.set(match direction {
            Direction::Enter => TransitionState::Entering,
            Direction::Leave => TransitionState::Leaving,
        });
        let [from, active, _] = self.config.classes(direction);
        self.add_class(from);
        self.add_class(active);
        tracing::debug!(
            component = %self.label,
            element = ?self.element,
            ?direction,
            "transition started"
        );

        let weak_attempt = Rc::downgrade(&attempt);
        let doc = self.doc.clone();
        attempt.controller.signal().on_abort(move || {
            if let Some(attempt) = weak_attempt.upgrade() {
                if let Some(frame) = attempt.frame.take() {
                    doc.cancel_animation_frame(frame);
                }
                if let Some(timer) = attempt.timer.take() {
                    doc.clear_timeout(timer);
                }
            }
        });

        let weak = Rc::downgrade(self);
        let frame_attempt = attempt.clone();
        let frame = self.doc.request_animation_frame(move |_| {
            on_frame(&weak, &frame_attempt);
        });
        attempt.frame.set(Some(frame));
        let result = attempt.result.clone();
        *self.attempt.borrow_mut() = Some(attempt);
        result
    }

    fn cancel_running(&self) {
        let Some(attempt) = self.attempt.borrow_mut().take() else {
            return;
        };
        attempt.controller.abort();
        for class in self.config.classes(attempt.direction) {
            self.remove_class(class);
        }
        tracing::debug!(component = %self.label, element = ?self.element, "transition cancelled");
        attempt.result.resolve(TransitionOutcome::Cancelled);
    }

    fn finish(&self, attempt: &Rc<Attempt>) {
        let current = self.attempt.borrow().as_ref().is_some_and(|a| Rc::ptr_eq(a, attempt));
        if !current {
            return;
        }
        self.attempt.borrow_mut().take();
        let [_, active, to] = self.config.classes(attempt.direction);
        self.remove_class(active);
        self.remove_class(to);
        let (state, hooks) = match attempt.direction {
            Direction::Enter => (TransitionState::Entered, self.on_entered.borrow().clone()),
            Direction::Leave => (TransitionState::Left, self.on_left.borrow().clone()),
        };
        self.state.set(state);
        for hook in hooks {
            hook();
        }
        attempt.result.resolve(TransitionOutcome::Completed);
    }

    fn add_class(&self, class: &str) {
        if !class.is_empty() {
            self.doc.add_class(self.element, class);
        }
    }

    fn remove_class(&self, class: &str) {
        if !class.is_empty() {
            self.doc.remove_class(self.element, class);
        }
    }
}

fn on_frame(weak: &Weak<TransitionInner>, attempt: &Rc<Attempt>) {
    attempt.frame.set(None);
    let Some(inner) = weak.upgrade() else {
        return;
    };
    if attempt.controller.signal().aborted() {
        return;
    }
    let [from, _, to] = inner.config.classes(attempt.direction);
    inner.remove_class(from);
    inner.add_class(to);
    let wait = transition_time_ms(&inner.doc, inner.element);
    if wait <= 0.0 {
        inner.finish(attempt);
        return;
    }
    let weak = weak.clone();
    let timer_attempt = attempt.clone();
    let timer = inner.doc.set_timeout(
        move || {
            timer_attempt.timer.set(None);
            if let Some(inner) = weak.upgrade()
                && !timer_attempt.controller.signal().aborted()
            {
                inner.finish(&timer_attempt);
            }
        },
        wait,
    );
    attempt.timer.set(Some(timer));
}

/// The longest `duration + delay` pair from the element's inline
/// `transition-duration` and `transition-delay`, in milliseconds.
///
/// Lists pair up by index, with the shorter list repeating.
///
/// ```
/// use bramble_component::transition_time_ms;
/// use bramble_dom::Document;
///
/// let doc = Document::new();
/// let el = doc.create_element("div");
/// doc.set_style(el, "transition-duration", "0.2s, 150ms");
/// doc.set_style(el, "transition-delay", "50ms");
/// assert_eq!(transition_time_ms(&doc, el), 250.0);
/// ```
pub fn transition_time_ms(doc: &Document, element: NodeId) -> f64 {
    let durations = parse_times(doc.style(element, "transition-duration").as_deref());
    let delays = parse_times(doc.style(element, "transition-delay").as_deref());
    let pairs = durations.len().max(delays.len());
    (0..pairs)
        .map(|i| {
            let d = durations.get(i % durations.len().max(1)).copied().unwrap_or(0.0);
            let w = delays.get(i % delays.len().max(1)).copied().unwrap_or(0.0);
            d + w
        })
        .fold(0.0, f64::max)
}

fn parse_times(value: Option<&str>) -> Vec<f64> {
    value
        .unwrap_or_default()
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if let Some(ms) = part.strip_suffix("ms") {
                ms.trim().parse::<f64>().ok()
            } else if let Some(s) = part.strip_suffix('s') {
                s.trim().parse::<f64>().ok().map(|s| s * 1000.0)
            } else {
                None
            }
        })
        .collect()
}
