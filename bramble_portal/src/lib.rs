// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bramble Portal: shared overlay container, stacking and light-dismiss.
//!
//! Floating elements (menus, popovers, tooltips, dialogs) are moved out of their
//! original position into one container at the end of `<body>` so that ancestor
//! clipping and stacking contexts cannot hide them. A [`PortalManager`] owns that
//! container and a stack of the elements it currently holds; each gets a z-index above
//! every element opened before it.
//!
//! [`on_dismiss`] reports when a floating element should close: a press outside it,
//! or Escape while it is topmost.
//!
//! A manager is an ordinary value. Widgets share one by cloning the handle, and tests
//! construct their own.

mod dismiss;
mod portal;

pub use dismiss::{DismissOptions, DismissReason, on_dismiss};
pub use portal::{PortalConfig, PortalManager, StackEntry, Teleport};
