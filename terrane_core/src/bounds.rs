// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel rectangles.
//!
//! All damage tracking and region geometry uses [`Bounds`]: axis-aligned
//! rectangles with `i32` position and extent in pixel space. A rectangle with
//! zero or negative extent is *empty* and never contributes damage.
//!
//! Float-space clipping (shape clamp bounds) uses [`kurbo::Rect`]; the
//! conversions at the bottom bridge the two.

use core::fmt;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// An axis-aligned integer rectangle: position plus extent.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bounds {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Horizontal extent.
    pub width: i32,
    /// Vertical extent.
    pub height: i32,
}

impl Bounds {
    /// Creates a rectangle from position and extent.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The empty rectangle at the origin.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Right edge (exclusive).
    #[must_use]
    pub const fn right(self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[must_use]
    pub const fn bottom(self) -> i32 {
        self.y + self.height
    }

    /// Whether the rectangle covers no pixels.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Area in pixels, zero for empty rectangles.
    #[must_use]
    pub const fn area(self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Whether two rectangles share at least one pixel.
    ///
    /// Empty rectangles overlap nothing.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Whether `other` lies entirely within `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        !other.is_empty()
            && other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// The overlapping area of two rectangles, or `None` if disjoint.
    #[must_use]
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let result = Self::new(x, y, right - x, bottom - y);
        if result.is_empty() { None } else { Some(result) }
    }

    /// The smallest rectangle covering both inputs.
    ///
    /// An empty input contributes nothing; the union of two empty rectangles
    /// is empty.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }

    /// The rectangle moved by the given offset.
    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Converts to a float rectangle for clip computations.
    #[must_use]
    pub fn to_rect(self) -> kurbo::Rect {
        kurbo::Rect::new(
            self.x as f64,
            self.y as f64,
            self.right() as f64,
            self.bottom() as f64,
        )
    }

    /// The smallest integer rectangle covering a float rectangle.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "pixel coordinates fit comfortably in i32"
    )]
    #[must_use]
    pub fn from_rect(rect: kurbo::Rect) -> Self {
        let x = rect.x0.floor() as i32;
        let y = rect.y0.floor() as i32;
        let right = rect.x1.ceil() as i32;
        let bottom = rect.y1.ceil() as i32;
        Self::new(x, y, right - x, bottom - y)
    }
}

impl fmt::Debug for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bounds({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}
