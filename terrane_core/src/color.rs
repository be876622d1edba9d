// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packed colors and per-corner quad gradients.
//!
//! Shapes carry a [`QuadColor`]: one [`Rgba`] per quad corner, which the
//! device interpolates across the primitive. Solid fills use the same color
//! at every corner; the gradient constructors cover the common two-stop
//! horizontal and vertical cases.

use core::fmt;

/// A packed 8-bit-per-channel color in `0xAARRGGBB` order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgba(pub u32);

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self(0);

    /// Creates a color from individual channels.
    #[must_use]
    pub const fn new(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Self(
            ((alpha as u32) << 24) | ((red as u32) << 16) | ((green as u32) << 8) | (blue as u32),
        )
    }

    /// Alpha channel.
    #[must_use]
    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Red channel.
    #[must_use]
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Green channel.
    #[must_use]
    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Blue channel.
    #[must_use]
    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Linear interpolation per channel, `t` clamped to `[0, 1]`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "channel math stays within u8 range"
    )]
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 {
            let value = f32::from(a) + (f32::from(b) - f32::from(a)) * t;
            (value + 0.5) as u8
        };
        Self::new(
            mix(self.alpha(), other.alpha()),
            mix(self.red(), other.red()),
            mix(self.green(), other.green()),
            mix(self.blue(), other.blue()),
        )
    }
}

impl From<u32> for Rgba {
    fn from(packed: u32) -> Self {
        Self(packed)
    }
}

impl fmt::Debug for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rgba(#{:08x})", self.0)
    }
}

/// One color per quad corner, in top-left, top-right, bottom-left,
/// bottom-right order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QuadColor {
    /// Corner colors: `[top_left, top_right, bottom_left, bottom_right]`.
    pub corners: [Rgba; 4],
}

impl QuadColor {
    /// The same color at every corner.
    #[must_use]
    pub const fn solid(color: Rgba) -> Self {
        Self {
            corners: [color; 4],
        }
    }

    /// A left-to-right gradient.
    #[must_use]
    pub const fn horizontal(left: Rgba, right: Rgba) -> Self {
        Self {
            corners: [left, right, left, right],
        }
    }

    /// A top-to-bottom gradient.
    #[must_use]
    pub const fn vertical(top: Rgba, bottom: Rgba) -> Self {
        Self {
            corners: [top, top, bottom, bottom],
        }
    }

    /// Interpolates corner-wise toward `other`.
    #[must_use]
    pub fn interpolate(self, other: Self, t: f32) -> Self {
        let mut corners = [Rgba::TRANSPARENT; 4];
        for (slot, (a, b)) in corners
            .iter_mut()
            .zip(self.corners.iter().zip(other.corners.iter()))
        {
            *slot = a.lerp(*b, t);
        }
        Self { corners }
    }
}

impl From<u32> for QuadColor {
    fn from(packed: u32) -> Self {
        Self::solid(Rgba(packed))
    }
}

impl From<Rgba> for QuadColor {
    fn from(color: Rgba) -> Self {
        Self::solid(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_accessors_match_packing() {
        let c = Rgba::new(0x80, 0x11, 0x22, 0x33);
        assert_eq!(c.0, 0x8011_2233);
        assert_eq!(c.alpha(), 0x80);
        assert_eq!(c.red(), 0x11);
        assert_eq!(c.green(), 0x22);
        assert_eq!(c.blue(), 0x33);
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let a = Rgba(0xff00_0000);
        let b = Rgba(0xffff_ffff);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }

    #[test]
    fn gradients_place_colors_at_expected_corners() {
        let a = Rgba(0xff11_1111);
        let b = Rgba(0xff22_2222);
        let h = QuadColor::horizontal(a, b);
        assert_eq!(h.corners, [a, b, a, b]);
        let v = QuadColor::vertical(a, b);
        assert_eq!(v.corners, [a, a, b, b]);
    }

    #[test]
    fn quad_color_from_rgba_is_solid() {
        let c = Rgba(0xff12_3456);
        assert_eq!(QuadColor::from(c), QuadColor::solid(c));
        assert_eq!(QuadColor::from(0xff12_3456_u32), QuadColor::solid(c));
    }

    #[test]
    fn interpolate_midpoint_mixes_each_corner() {
        let a = QuadColor::solid(Rgba::new(0, 0, 0, 0));
        let b = QuadColor::solid(Rgba::new(200, 100, 50, 10));
        let mid = a.interpolate(b, 0.5);
        assert_eq!(mid.corners[0], Rgba::new(100, 50, 25, 5));
    }
}
