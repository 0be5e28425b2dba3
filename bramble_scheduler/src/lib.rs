// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bramble Scheduler: frame-batched layout access for Bramble components.
//!
//! Reading a bounding rect forces layout; doing it between writes forces it again.
//! This crate keeps those reads cheap and ordered:
//!
//! - [`Scheduler`] queues reads and writes and drains them once per animation frame,
//!   reads first. [`Scheduler::flush`] drains synchronously, for tests and for work
//!   that must not wait a frame.
//! - [`Cache`] memoizes rects, selector queries and arbitrary per-node values for a
//!   short time ([`CacheConfig`]), so collaborating primitives reading the same
//!   rect in one interaction measure it once.
//! - [`Deferred`] is the one-shot completion that read results, and anything else
//!   that finishes later, are delivered through.
//!
//! Both services are cheap-to-clone handles over a [`bramble_dom::Document`].

mod cache;
mod deferred;
mod scheduler;

pub use cache::{Cache, CacheConfig};
pub use deferred::{Deferred, Rejection};
pub use scheduler::{ScheduledTask, Scheduler};
