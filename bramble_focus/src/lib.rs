// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bramble Focus: keyboard focus management for Bramble widgets.
//!
//! - [`focusable_elements`] lists the tabbable descendants of a container in
//!   document order, skipping anything hidden.
//! - [`FocusTrap`] contains focus inside a modal container: Tab and Shift+Tab wrap at
//!   the ends, and focus that escapes is pulled back. Escape is reported to the
//!   caller, never acted on.
//! - [`RovingTabindex`] keeps exactly one item of a composite widget (menu, listbox,
//!   toolbar, tree) in the Tab sequence and moves it with arrow keys.
//!
//! All three act on a [`bramble_dom::Document`] through ordinary listeners and leave no
//! state behind once deactivated or destroyed.

mod focusable;
mod roving;
mod trap;

pub use focusable::{FOCUSABLE_SELECTOR, focusable_elements};
pub use roving::{Orientation, RovingOptions, RovingTabindex};
pub use trap::{FocusTrap, FocusTrapOptions, InitialFocus};
