// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless window: viewport, clock, animation frames, timers and idle callbacks.
//!
//! Time only moves when the host drives it with
//! [`Document::run_frame`](crate::Document::run_frame) or
//! [`Document::advance`](crate::Document::advance), which keeps everything built on
//! frames and timers deterministic.

use kurbo::Size;

use crate::types::{FrameHandle, IdleHandle, TimerHandle};

pub(crate) type FrameCallback = Box<dyn FnOnce(f64)>;
pub(crate) type TaskCallback = Box<dyn FnOnce()>;

/// Window configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct WindowConfig {
    /// Milliseconds per animation frame.
    pub frame_interval_ms: f64,
    /// Whether the host offers idle callbacks.
    pub idle_callbacks: bool,
    /// Initial viewport size.
    pub viewport: Size,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16.0,
            idle_callbacks: true,
            viewport: Size::new(1024.0, 768.0),
        }
    }
}

struct Timer {
    handle: TimerHandle,
    due: f64,
    callback: TaskCallback,
}

/// Queues owned by the window.
pub(crate) struct WindowState {
    pub(crate) config: WindowConfig,
    pub(crate) now: f64,
    pub(crate) viewport: Size,
    next_handle: u64,
    frames: Vec<(FrameHandle, FrameCallback)>,
    timers: Vec<Timer>,
    idle: Vec<(IdleHandle, TaskCallback)>,
}

impl core::fmt::Debug for WindowState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WindowState")
            .field("now", &self.now)
            .field("viewport", &self.viewport)
            .field("frames", &self.frames.len())
            .field("timers", &self.timers.len())
            .field("idle", &self.idle.len())
            .finish_non_exhaustive()
    }
}

impl WindowState {
    pub(crate) fn new(config: WindowConfig) -> Self {
        Self {
            viewport: config.viewport,
            config,
            now: 0.0,
            next_handle: 0,
            frames: Vec::new(),
            timers: Vec::new(),
            idle: Vec::new(),
        }
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub(crate) fn request_frame(&mut self, cb: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next());
        self.frames.push((handle, cb));
        handle
    }

    pub(crate) fn cancel_frame(&mut self, handle: FrameHandle) -> Option<FrameCallback> {
        let pos = self.frames.iter().position(|(h, _)| *h == handle)?;
        Some(self.frames.remove(pos).1)
    }

    pub(crate) fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn set_timeout(&mut self, delay_ms: f64, cb: TaskCallback) -> TimerHandle {
        let handle = TimerHandle(self.next());
        self.timers.push(Timer {
            handle,
            due: self.now + delay_ms.max(0.0),
            callback: cb,
        });
        handle
    }

    pub(crate) fn clear_timeout(&mut self, handle: TimerHandle) -> Option<TaskCallback> {
        let pos = self.timers.iter().position(|t| t.handle == handle)?;
        Some(self.timers.remove(pos).callback)
    }

    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub(crate) fn request_idle(&mut self, cb: TaskCallback) -> IdleHandle {
        let handle = IdleHandle(self.next());
        self.idle.push((handle, cb));
        handle
    }

    pub(crate) fn cancel_idle(&mut self, handle: IdleHandle) -> Option<TaskCallback> {
        let pos = self.idle.iter().position(|(h, _)| *h == handle)?;
        Some(self.idle.remove(pos).1)
    }

    /// Handles of the timers due at the current time, in due order.
    ///
    /// Timers with equal due times keep their registration order. Callers take
    /// each callback with [`clear_timeout`](Self::clear_timeout) right before
    /// running it, so a timer cleared by an earlier one in the batch is skipped.
    pub(crate) fn due_timers(&self) -> Vec<TimerHandle> {
        let mut due: Vec<(f64, TimerHandle)> = self
            .timers
            .iter()
            .filter(|t| t.due <= self.now)
            .map(|t| (t.due, t.handle))
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        due.into_iter().map(|(_, handle)| handle).collect()
    }

    /// Handles of the frame callbacks requested so far.
    pub(crate) fn frame_batch(&self) -> Vec<FrameHandle> {
        self.frames.iter().map(|(h, _)| *h).collect()
    }

    /// Handles of the idle callbacks requested so far.
    pub(crate) fn idle_batch(&self) -> Vec<IdleHandle> {
        self.idle.iter().map(|(h, _)| *h).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn due_timers_come_out_in_due_then_registration_order() {
        let mut w = WindowState::new(WindowConfig::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(30.0, "c"), (10.0, "a"), (10.0, "b"), (99.0, "late")] {
            let log = log.clone();
            w.set_timeout(delay, Box::new(move || log.borrow_mut().push(tag)));
        }
        w.now = 40.0;
        for handle in w.due_timers() {
            if let Some(cb) = w.clear_timeout(handle) {
                cb();
            }
        }
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(w.pending_timers(), 1);
    }

    #[test]
    fn cancelled_frames_never_run() {
        let mut w = WindowState::new(WindowConfig::default());
        let h = w.request_frame(Box::new(|_| panic!("cancelled frame ran")));
        assert!(w.cancel_frame(h).is_some());
        assert!(w.frame_batch().is_empty());
    }

    #[test]
    fn batches_only_name_what_is_pending() {
        let mut w = WindowState::new(WindowConfig::default());
        let first = w.request_frame(Box::new(|_| {}));
        let second = w.request_frame(Box::new(|_| {}));
        let batch = w.frame_batch();
        assert_eq!(batch, vec![first, second]);
        assert!(w.cancel_frame(second).is_some());
        assert!(w.cancel_frame(batch[1]).is_none());
        assert_eq!(w.pending_frames(), 1);
    }
}
