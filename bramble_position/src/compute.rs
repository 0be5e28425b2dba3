// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Placement arithmetic and its application to the document.

use bramble_dom::{Document, NodeId};
use bramble_scheduler::Cache;
use kurbo::{Point, Rect, Size};

use crate::placement::{Alignment, Placement, Side};

/// The region the floating element has to fit in.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Boundary {
    /// The viewport.
    #[default]
    Viewport,
    /// An explicit rectangle in viewport coordinates.
    Rect(Rect),
    /// The bounding rect of an element.
    Node(NodeId),
}

/// Inputs to [`compute_position`] besides the geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionOptions {
    /// Preferred placement.
    pub placement: Placement,
    /// Gap between reference and floating element along the main axis.
    pub offset: f64,
    /// Try the opposite side (and, for `top`/`bottom`, the opposite alignment) on overflow.
    pub flip: bool,
    /// Clamp the result into the boundary.
    pub constrain: bool,
    /// The region to stay within.
    pub boundary: Boundary,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            placement: Placement::default(),
            offset: 0.0,
            flip: true,
            constrain: true,
            boundary: Boundary::Viewport,
        }
    }
}

/// A computed placement: top-left corner in viewport coordinates and the placement used.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Position {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Final placement after any flip.
    pub placement: Placement,
}

impl Position {
    /// The top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

fn naive(reference: Rect, floating: Size, placement: Placement, offset: f64) -> Point {
    let cross = |start: f64, end: f64, len: f64| match placement.alignment {
        Alignment::Start => start,
        Alignment::Center => start + ((end - start) - len) / 2.0,
        Alignment::End => end - len,
    };
    match placement.side {
        Side::Top => Point::new(
            cross(reference.x0, reference.x1, floating.width),
            reference.y0 - floating.height - offset,
        ),
        Side::Bottom => Point::new(
            cross(reference.x0, reference.x1, floating.width),
            reference.y1 + offset,
        ),
        Side::Left => Point::new(
            reference.x0 - floating.width - offset,
            cross(reference.y0, reference.y1, floating.height),
        ),
        Side::Right => Point::new(
            reference.x1 + offset,
            cross(reference.y0, reference.y1, floating.height),
        ),
    }
}

/// Whether the box at `at` crosses the boundary edge that `side` faces.
fn overflows_side(at: Point, floating: Size, boundary: Rect, side: Side) -> bool {
    match side {
        Side::Top => at.y < boundary.y0,
        Side::Bottom => at.y + floating.height > boundary.y1,
        Side::Left => at.x < boundary.x0,
        Side::Right => at.x + floating.width > boundary.x1,
    }
}

/// Whether the box at `at` crosses either boundary edge on the cross axis of `side`.
fn overflows_cross(at: Point, floating: Size, boundary: Rect, side: Side) -> bool {
    if side.is_vertical() {
        at.x < boundary.x0 || at.x + floating.width > boundary.x1
    } else {
        at.y < boundary.y0 || at.y + floating.height > boundary.y1
    }
}

/// Place a `floating` box against `reference` inside `boundary`. Pure.
///
/// 1. The naive position puts the box on the preferred side, `offset` away, aligned
///    on the cross axis.
/// 2. With `flip`, if the box crosses the boundary edge its side faces, the opposite
///    side is tried once and adopted only if it fits on that axis. Separately, a
///    `start`/`end` alignment on a `top`/`bottom` placement whose cross axis
///    overflows tries the opposite alignment under the same rule.
/// 3. With `constrain`, the result is clamped into the boundary, even if that makes
///    it overlap the reference.
///
/// ```
/// use bramble_position::{compute_position, PositionOptions, Side};
/// use kurbo::{Rect, Size};
///
/// let reference = Rect::new(100.0, 100.0, 150.0, 120.0);
/// let boundary = Rect::new(0.0, 0.0, 200.0, 150.0);
/// let options = PositionOptions { placement: Side::Bottom.into(), offset: 8.0, ..Default::default() };
///
/// // Neither side fits: keep `bottom`, then clamp into the boundary.
/// let p = compute_position(reference, Size::new(40.0, 100.0), boundary, &options);
/// assert_eq!((p.x, p.y, p.placement.side), (105.0, 50.0, Side::Bottom));
/// ```
pub fn compute_position(
    reference: Rect,
    floating: Size,
    boundary: Rect,
    options: &PositionOptions,
) -> Position {
    let mut placement = options.placement;
    let mut at = naive(reference, floating, placement, options.offset);

    if options.flip {
        if overflows_side(at, floating, boundary, placement.side) {
            let flipped = placement.flip_side();
            let candidate = naive(reference, floating, flipped, options.offset);
            if !overflows_side(candidate, floating, boundary, flipped.side) {
                placement = flipped;
                at = candidate;
            }
        }
        if placement.side.is_vertical()
            && placement.alignment != Alignment::Center
            && overflows_cross(at, floating, boundary, placement.side)
        {
            let flipped = placement.flip_alignment();
            let candidate = naive(reference, floating, flipped, options.offset);
            if !overflows_cross(candidate, floating, boundary, flipped.side) {
                placement = flipped;
                at = candidate;
            }
        }
    }

    if options.constrain {
        at.x = at.x.min(boundary.x1 - floating.width).max(boundary.x0);
        at.y = at.y.min(boundary.y1 - floating.height).max(boundary.y0);
    }

    Position {
        x: at.x,
        y: at.y,
        placement,
    }
}

/// Resolve a [`Boundary`] to a rectangle in viewport coordinates.
pub fn boundary_rect(cache: &Cache, boundary: Boundary) -> Rect {
    match boundary {
        Boundary::Viewport => cache.viewport().to_rect(),
        Boundary::Rect(rect) => rect,
        Boundary::Node(node) => cache.dimensions(node),
    }
}

/// Measure `reference` and `floating` (through `cache`) and compute a position.
/// Does not touch the document.
pub fn calculate_position(
    cache: &Cache,
    reference: NodeId,
    floating: NodeId,
    options: &PositionOptions,
) -> Position {
    let reference = cache.dimensions(reference);
    let floating = cache.dimensions(floating).size();
    let boundary = boundary_rect(cache, options.boundary);
    compute_position(reference, floating, boundary, options)
}

/// Write `position` to `floating`: fixed positioning, `left`/`top` in px, and a
/// `data-placement` attribute naming the final placement.
pub fn apply_position(doc: &Document, floating: NodeId, position: &Position) {
    doc.set_style(floating, "position", "fixed");
    doc.set_style(floating, "left", &format!("{}px", position.x));
    doc.set_style(floating, "top", &format!("{}px", position.y));
    doc.set_attribute(floating, "data-placement", &position.placement.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 200.0, 150.0);
    const REFERENCE: Rect = Rect::new(100.0, 100.0, 150.0, 120.0);

    fn opts(placement: &str, offset: f64) -> PositionOptions {
        PositionOptions {
            placement: placement.parse().unwrap(),
            offset,
            ..PositionOptions::default()
        }
    }

    #[test]
    fn flips_when_the_opposite_side_fits() {
        let p = compute_position(REFERENCE, Size::new(40.0, 30.0), VIEWPORT, &opts("bottom", 8.0));
        assert_eq!(p.placement, Placement::new(Side::Top, Alignment::Center));
        assert_eq!((p.x, p.y), (105.0, 62.0));
    }

    #[test]
    fn keeps_side_when_both_overflow_then_constrains() {
        let p = compute_position(REFERENCE, Size::new(40.0, 100.0), VIEWPORT, &opts("bottom", 8.0));
        assert_eq!(p.placement.side, Side::Bottom);
        assert_eq!(p.y, 50.0);

        let unconstrained = PositionOptions {
            constrain: false,
            ..opts("bottom", 8.0)
        };
        let p = compute_position(REFERENCE, Size::new(40.0, 100.0), VIEWPORT, &unconstrained);
        assert_eq!(p.y, 128.0);
    }

    #[test]
    fn no_flip_without_the_option() {
        let options = PositionOptions {
            flip: false,
            constrain: false,
            ..opts("bottom", 8.0)
        };
        let p = compute_position(REFERENCE, Size::new(40.0, 30.0), VIEWPORT, &options);
        assert_eq!(p.placement.side, Side::Bottom);
        assert_eq!(p.y, 128.0);
    }

    #[test]
    fn alignment_flips_on_cross_axis_overflow() {
        let reference = Rect::new(180.0, 20.0, 190.0, 30.0);
        let p = compute_position(reference, Size::new(40.0, 20.0), VIEWPORT, &opts("bottom-start", 0.0));
        assert_eq!(p.placement, "bottom-end".parse().unwrap());
        assert_eq!(p.x, 150.0);
    }

    #[test]
    fn side_placements_do_not_flip_alignment() {
        let reference = Rect::new(20.0, 140.0, 30.0, 145.0);
        let options = PositionOptions {
            constrain: false,
            ..opts("right-start", 4.0)
        };
        let p = compute_position(reference, Size::new(20.0, 40.0), VIEWPORT, &options);
        assert_eq!(p.placement, "right-start".parse().unwrap());
        assert_eq!((p.x, p.y), (34.0, 140.0));
    }

    #[test]
    fn apply_writes_style_and_placement() {
        let doc = Document::new();
        let el = doc.create_element("div");
        apply_position(
            &doc,
            el,
            &Position {
                x: 12.5,
                y: 40.0,
                placement: "top-end".parse().unwrap(),
            },
        );
        assert_eq!(doc.style(el, "position").as_deref(), Some("fixed"));
        assert_eq!(doc.style(el, "left").as_deref(), Some("12.5px"));
        assert_eq!(doc.style(el, "top").as_deref(), Some("40px"));
        assert_eq!(doc.get_attribute(el, "data-placement").as_deref(), Some("top-end"));
    }
}
