// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Placement vocabulary: sides, alignments and their string forms.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// Which side of the reference the floating element sits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Above the reference.
    Top,
    /// Below the reference.
    Bottom,
    /// Left of the reference.
    Left,
    /// Right of the reference.
    Right,
}

impl Side {
    /// The side across the reference.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Whether the main axis is vertical (`top`/`bottom`).
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Where along the cross axis the floating element lines up with the reference.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Alignment {
    /// Leading edges aligned.
    Start,
    /// Centred.
    #[default]
    Center,
    /// Trailing edges aligned.
    End,
}

impl Alignment {
    /// `Start` ↔ `End`; `Center` stays put.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Start => Self::End,
            Self::Center => Self::Center,
            Self::End => Self::Start,
        }
    }
}

/// A side plus an alignment, written `"bottom"` or `"bottom-start"`.
///
/// ```
/// use bramble_position::{Alignment, Placement, Side};
///
/// let p: Placement = "left-end".parse().unwrap();
/// assert_eq!(p, Placement::new(Side::Left, Alignment::End));
/// assert_eq!(p.to_string(), "left-end");
/// assert_eq!("top".parse::<Placement>().unwrap().to_string(), "top");
/// assert!("middle".parse::<Placement>().is_err());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Placement {
    /// Main-axis side.
    pub side: Side,
    /// Cross-axis alignment.
    pub alignment: Alignment,
}

impl Placement {
    /// Combine a side and an alignment.
    pub const fn new(side: Side, alignment: Alignment) -> Self {
        Self { side, alignment }
    }

    /// Same alignment on the opposite side.
    #[must_use]
    pub const fn flip_side(self) -> Self {
        Self::new(self.side.opposite(), self.alignment)
    }

    /// Same side with the opposite alignment.
    #[must_use]
    pub const fn flip_alignment(self) -> Self {
        Self::new(self.side, self.alignment.opposite())
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::new(Side::Bottom, Alignment::Center)
    }
}

impl From<Side> for Placement {
    fn from(side: Side) -> Self {
        Self::new(side, Alignment::Center)
    }
}

/// A placement string that is not `side` or `side-start`/`side-end`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown placement {0:?}")]
pub struct PlacementParseError(pub String);

impl FromStr for Placement {
    type Err = PlacementParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (side, align) = match s.split_once('-') {
            Some((side, align)) => (side, Some(align)),
            None => (s, None),
        };
        let side = match side {
            "top" => Side::Top,
            "bottom" => Side::Bottom,
            "left" => Side::Left,
            "right" => Side::Right,
            _ => return Err(PlacementParseError(s.to_owned())),
        };
        let alignment = match align {
            None => Alignment::Center,
            Some("start") => Alignment::Start,
            Some("end") => Alignment::End,
            Some(_) => return Err(PlacementParseError(s.to_owned())),
        };
        Ok(Self::new(side, alignment))
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.side.as_str())?;
        match self.alignment {
            Alignment::Center => Ok(()),
            Alignment::Start => f.write_str("-start"),
            Alignment::End => f.write_str("-end"),
        }
    }
}
