// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bramble Position: placement of floating elements (menus, tooltips, popovers).
//!
//! A floating element is placed on one [`Side`] of a reference element with an
//! [`Alignment`] along the cross axis, inside a [`Boundary`]. The core is the pure
//! [`compute_position`]; everything else wires it to a document:
//!
//! - [`calculate_position`] measures both elements through a [`bramble_scheduler::Cache`].
//! - [`apply_position`] writes the result as fixed positioning plus `data-placement`.
//! - [`auto_position`] keeps the two in sync across scrolls, resizes and size
//!   changes, at most once per animation frame.
//!
//! ## Flip and constrain
//!
//! Flipping is a single attempt per axis: the opposite side is adopted only if it
//! fits, so a box that fits on neither side never oscillates. Constraining runs last
//! and wins over the placement preference.

mod auto;
mod compute;
mod placement;

pub use auto::{AutoPosition, AutoPositionConfig, auto_position};
pub use compute::{
    Boundary, Position, PositionOptions, apply_position, boundary_rect, calculate_position,
    compute_position,
};
pub use placement::{Alignment, Placement, PlacementParseError, Side};
