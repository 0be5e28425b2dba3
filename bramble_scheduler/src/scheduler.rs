// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-batched layout reads and writes.

use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use bramble_dom::{CallbackResult, Document, FrameHandle, IdleHandle, TimerHandle};

use crate::deferred::{Deferred, Rejection};

/// Runs a read and hands back the step that settles its [`Deferred`].
type ReadTask = Box<dyn FnOnce() -> Settle>;
type Settle = Box<dyn FnOnce()>;
type WriteTask = Box<dyn FnOnce() -> anyhow::Result<()>>;

#[derive(Default)]
struct Queues {
    reads: Vec<ReadTask>,
    writes: Vec<WriteTask>,
    frame: Option<FrameHandle>,
}

struct Shared {
    doc: Document,
    queues: RefCell<Queues>,
}

/// A cancellable task from [`Scheduler::next_frame`] or [`Scheduler::idle`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScheduledTask {
    /// An animation-frame callback.
    Frame(FrameHandle),
    /// An idle callback.
    Idle(IdleHandle),
    /// A timer standing in for an idle callback.
    Timer(TimerHandle),
}

/// Batches layout reads and writes into animation-frame phases.
///
/// Every read queued before a flush runs before every write queued before it, so
/// reads never observe writes from the same cycle. Work queued while a flush is
/// running waits for the next one. At most one animation frame is requested at
/// a time.
///
/// Read results are delivered through [`Deferred`]. Their continuations run after
/// the write phase of the flush that performed the read.
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use bramble_dom::Document;
/// use bramble_scheduler::Scheduler;
///
/// let doc = Document::new();
/// let scheduler = Scheduler::new(doc.clone());
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let l = log.clone();
/// scheduler.write(move || l.borrow_mut().push("write"));
/// let l = log.clone();
/// let width = scheduler.read(move || {
///     l.borrow_mut().push("read");
///     5
/// });
///
/// doc.run_frame();
/// assert_eq!(*log.borrow(), ["read", "write"]);
/// assert_eq!(width.value(), Some(5));
/// ```
#[derive(Clone)]
pub struct Scheduler {
    shared: Rc<Shared>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.shared.queues.borrow();
        f.debug_struct("Scheduler")
            .field("reads", &q.reads.len())
            .field("writes", &q.writes.len())
            .field("frame", &q.frame)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler driven by `doc`'s animation frames.
    pub fn new(doc: Document) -> Self {
        Self {
            shared: Rc::new(Shared {
                doc,
                queues: RefCell::default(),
            }),
        }
    }

    /// The document this scheduler drives.
    pub fn document(&self) -> &Document {
        &self.shared.doc
    }

    /// Queue a measurement; the result arrives after the next flush.
    pub fn read<T: 'static>(&self, f: impl FnOnce() -> T + 'static) -> Deferred<T> {
        self.try_read(move || Ok::<T, anyhow::Error>(f()))
    }

    /// Queue a fallible measurement. Failures are logged and reject the result.
    pub fn try_read<T, E>(&self, f: impl FnOnce() -> Result<T, E> + 'static) -> Deferred<T>
    where
        T: 'static,
        E: Into<anyhow::Error>,
    {
        let deferred = Deferred::new();
        let settle_into = deferred.clone();
        self.enqueue(|q| {
            q.reads.push(Box::new(move || {
                let result = f().map_err(Into::into);
                Box::new(move || match result {
                    Ok(value) => {
                        settle_into.resolve(value);
                    }
                    Err(err) => {
                        tracing::error!(phase = "read", error = %err, "scheduled read failed");
                        settle_into.reject(Rejection::Failed(err.to_string()));
                    }
                })
            }));
        });
        deferred
    }

    /// Queue a mutation.
    pub fn write<R: CallbackResult>(&self, f: impl FnOnce() -> R + 'static) {
        self.enqueue(|q| q.writes.push(Box::new(move || f().into_result())));
    }

    /// Alias of [`Scheduler::write`] for closures that return a `Result`.
    pub fn try_write<E>(&self, f: impl FnOnce() -> Result<(), E> + 'static)
    where
        E: Into<anyhow::Error>,
    {
        self.write(f);
    }

    /// Read, then act on the value once it arrives.
    pub fn measure<T: 'static>(
        &self,
        read: impl FnOnce() -> T + 'static,
        write: impl FnOnce(&T) + 'static,
    ) -> Deferred<T> {
        let deferred = self.read(read);
        deferred.then(move |result| {
            if let Ok(value) = result {
                write(value);
            }
        });
        deferred
    }

    fn enqueue(&self, push: impl FnOnce(&mut Queues)) {
        let needs_frame = {
            let mut q = self.shared.queues.borrow_mut();
            push(&mut q);
            q.frame.is_none()
        };
        if needs_frame {
            let weak: Weak<Shared> = Rc::downgrade(&self.shared);
            let handle = self.shared.doc.request_animation_frame(move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.queues.borrow_mut().frame = None;
                    Self { shared }.drain();
                }
            });
            self.shared.queues.borrow_mut().frame = Some(handle);
        }
    }

    /// Cancel any pending frame and run one cycle synchronously.
    pub fn flush(&self) {
        let pending = self.shared.queues.borrow_mut().frame.take();
        if let Some(handle) = pending {
            self.shared.doc.cancel_animation_frame(handle);
        }
        self.drain();
    }

    fn drain(&self) {
        let (reads, writes) = {
            let mut q = self.shared.queues.borrow_mut();
            (
                core::mem::take(&mut q.reads),
                core::mem::take(&mut q.writes),
            )
        };
        if reads.is_empty() && writes.is_empty() {
            return;
        }
        tracing::trace!(reads = reads.len(), writes = writes.len(), "flush");
        let settles: Vec<Settle> = reads.into_iter().map(|read| read()).collect();
        for write in writes {
            if let Err(err) = write() {
                tracing::error!(phase = "write", error = %err, "scheduled write failed");
            }
        }
        for settle in settles {
            settle();
        }
    }

    /// Whether any reads or writes are waiting.
    pub fn has_pending(&self) -> bool {
        let q = self.shared.queues.borrow();
        !q.reads.is_empty() || !q.writes.is_empty()
    }

    /// Whether an animation frame is currently requested.
    pub fn frame_requested(&self) -> bool {
        self.shared.queues.borrow().frame.is_some()
    }

    /// Run `f` on the next animation frame.
    pub fn next_frame(&self, f: impl FnOnce(f64) + 'static) -> ScheduledTask {
        ScheduledTask::Frame(self.shared.doc.request_animation_frame(f))
    }

    /// Run `f` when the host is idle, or after 1ms where idle callbacks are unavailable.
    pub fn idle(&self, f: impl FnOnce() + 'static) -> ScheduledTask {
        let doc = &self.shared.doc;
        if doc.supports_idle_callbacks() {
            ScheduledTask::Idle(doc.request_idle_callback(f))
        } else {
            ScheduledTask::Timer(doc.set_timeout(f, 1.0))
        }
    }

    /// Cancel a task from [`Scheduler::next_frame`] or [`Scheduler::idle`].
    pub fn cancel(&self, task: ScheduledTask) {
        let doc = &self.shared.doc;
        match task {
            ScheduledTask::Frame(h) => doc.cancel_animation_frame(h),
            ScheduledTask::Idle(h) => doc.cancel_idle_callback(h),
            ScheduledTask::Timer(h) => doc.clear_timeout(h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bramble_dom::WindowConfig;

    #[test]
    fn reads_run_before_writes_regardless_of_order() {
        let doc = Document::new();
        let s = Scheduler::new(doc.clone());
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let l = log.clone();
            s.write(move || l.borrow_mut().push(format!("w{i}")));
            let l = log.clone();
            s.read(move || l.borrow_mut().push(format!("r{i}")));
        }
        assert_eq!(doc.pending_frames(), 1);
        doc.run_frame();
        assert_eq!(*log.borrow(), ["r0", "r1", "r2", "w0", "w1", "w2"]);
    }

    #[test]
    fn write_queued_during_read_waits_for_next_flush() {
        let doc = Document::new();
        let s = Scheduler::new(doc.clone());
        let log = Rc::new(RefCell::new(Vec::new()));
        let (s2, l) = (s.clone(), log.clone());
        s.read(move || {
            let l2 = l.clone();
            s2.write(move || l2.borrow_mut().push("late write"));
            l.borrow_mut().push("read");
        });
        let l = log.clone();
        s.write(move || l.borrow_mut().push("write"));
        s.flush();
        assert_eq!(*log.borrow(), ["read", "write"]);
        assert!(s.frame_requested());
        doc.run_frame();
        assert_eq!(*log.borrow(), ["read", "write", "late write"]);
    }

    #[test]
    fn read_continuation_runs_after_writes() {
        let doc = Document::new();
        let s = Scheduler::new(doc);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        s.read(|| 5).then(move |v| l.borrow_mut().push(format!("resolved {}", v.unwrap())));
        let l = log.clone();
        s.write(move || l.borrow_mut().push("side effect".to_owned()));
        s.flush();
        assert_eq!(*log.borrow(), ["side effect", "resolved 5"]);
    }

    #[test]
    fn flush_cancels_pending_frame() {
        let doc = Document::new();
        let s = Scheduler::new(doc.clone());
        s.write(|| {});
        assert_eq!(doc.pending_frames(), 1);
        s.flush();
        assert_eq!(doc.pending_frames(), 0);
        assert!(!s.has_pending());
    }

    #[test]
    fn flush_from_an_earlier_frame_callback_keeps_one_frame_outstanding() {
        let doc = Document::new();
        let s = Scheduler::new(doc.clone());
        let log = Rc::new(RefCell::new(Vec::new()));
        let (s2, l) = (s.clone(), log.clone());
        doc.request_animation_frame(move |_| {
            s2.flush();
            let l = l.clone();
            s2.write(move || l.borrow_mut().push("next frame"));
        });
        let l = log.clone();
        s.write(move || l.borrow_mut().push("flushed"));

        doc.run_frame();
        assert_eq!(*log.borrow(), ["flushed"]);
        assert!(s.frame_requested());
        assert_eq!(doc.pending_frames(), 1);

        let l = log.clone();
        s.write(move || l.borrow_mut().push("joins"));
        assert_eq!(doc.pending_frames(), 1);
        doc.run_frame();
        assert_eq!(*log.borrow(), ["flushed", "next frame", "joins"]);
    }

    #[test]
    fn failures_are_isolated() {
        let doc = Document::new();
        let s = Scheduler::new(doc);
        let bad = s.try_read(|| Err::<u8, _>(anyhow::anyhow!("layout gone")));
        let good = s.read(|| 1_u8);
        s.try_write(|| Err(anyhow::anyhow!("write failed")));
        let ran = Rc::new(RefCell::new(false));
        let r = ran.clone();
        s.write(move || *r.borrow_mut() = true);
        s.flush();
        assert!(matches!(bad.rejection(), Some(Rejection::Failed(_))));
        assert_eq!(good.value(), Some(1));
        assert!(*ran.borrow());
    }

    #[test]
    fn idle_falls_back_to_a_timer() {
        let doc = Document::with_config(WindowConfig {
            idle_callbacks: false,
            ..WindowConfig::default()
        });
        let s = Scheduler::new(doc.clone());
        let hit = Rc::new(RefCell::new(false));
        let h = hit.clone();
        let task = s.idle(move || *h.borrow_mut() = true);
        assert!(matches!(task, ScheduledTask::Timer(_)));
        doc.run_frame();
        assert!(*hit.borrow());
    }
}
