// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawable primitives.
//!
//! The set of shape kinds is closed: each variant of [`ShapeData`] maps to
//! one draw pipeline on the device, identified by [`ShapeKind`]. Shapes share
//! resolved fields (absolute position, clamp rectangle, corner colors) and
//! the batcher only ever inspects the category tag, so there is no dynamic
//! dispatch anywhere on the submission path.
//!
//! Text, icons, shaders, and polylines reference collaborator-owned data
//! through opaque handles; the compositor manages their placement and blend
//! parameters only.

use core::fmt;

use crate::backend::TargetId;
use crate::bounds::Bounds;
use crate::color::QuadColor;

/// How a primitive blends into its target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Standard source-over alpha compositing.
    #[default]
    Alpha,
    /// Additive blending.
    Add,
    /// Subtractive blending.
    Sub,
    /// Multiplicative blending.
    Mult,
}

/// A cardinal orientation for triangles and text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Pointing or reading upward.
    #[default]
    Up,
    /// Pointing or reading downward.
    Down,
    /// Pointing or reading left.
    Left,
    /// Pointing or reading right.
    Right,
}

/// Opaque handle to a prepared text block owned by the text collaborator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextId(pub u32);

/// Opaque handle to a font known to the text collaborator.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FontId(pub u32);

/// Opaque handle to a custom shader program.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

/// Opaque handle to a polyline owned by the caller.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineId(pub u32);

/// Opaque handle to a post-processing effect applied when compositing a
/// promoted region's subtree.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostEffectId(pub u32);

impl fmt::Debug for TextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextId({})", self.0)
    }
}

impl fmt::Debug for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FontId({})", self.0)
    }
}

impl fmt::Debug for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderId({})", self.0)
    }
}

impl fmt::Debug for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineId({})", self.0)
    }
}

impl fmt::Debug for PostEffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostEffectId({})", self.0)
    }
}

/// Identifies a rasterized icon: the source plus the requested raster
/// parameters. The icon collaborator caches bitmaps by this key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IconKey {
    /// Hash of the source data (e.g. SVG bytes).
    pub source: u64,
    /// Raster width in pixels.
    pub width: i32,
    /// Raster height in pixels.
    pub height: i32,
    /// Gaussian blur radius baked into the raster.
    pub blur_radius: i32,
}

/// The draw-pipeline category of a shape.
///
/// A batch never mixes categories, since each category maps to a distinct
/// pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Axis-aligned solid quad.
    Fill,
    /// Circle, ring, or faded circle.
    Circle,
    /// Rectangle with rounded corners, optionally hollow.
    RoundedRect,
    /// Circular arc with flat or rounded caps.
    Arc,
    /// Thick line segment between two points.
    Segment,
    /// Rotary control (value arc plus thumb).
    Rotary,
    /// Axis-aligned isosceles triangle.
    Triangle,
    /// Prepared text block.
    Text,
    /// Rasterized icon quad.
    Icon,
    /// Caller-provided shader over a quad.
    Shader,
    /// Polyline strip.
    Line,
    /// Quad sampling another layer's packed texture.
    Sample,
}

/// Per-kind shape parameters.
///
/// Geometry shared by every kind (position, size, clamp, color) lives on
/// [`Shape`]; only the parameters that vary by pipeline live here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeData {
    /// Solid quad.
    Fill,
    /// Circle. `thickness` of zero draws a disc, otherwise a ring;
    /// `fade` widens the antialiased edge.
    Circle {
        /// Ring thickness, zero for a filled disc.
        thickness: f32,
        /// Antialias width in pixels.
        fade: f32,
    },
    /// Rounded rectangle. `thickness` of zero fills, otherwise a border.
    RoundedRect {
        /// Corner radius, at least one pixel.
        rounding: f32,
        /// Border thickness, zero for a filled rectangle.
        thickness: f32,
    },
    /// Circular arc.
    Arc {
        /// Stroke thickness.
        thickness: f32,
        /// Angle of the arc's center direction, radians.
        center_radians: f32,
        /// Half-angle swept to each side, radians.
        radians: f32,
        /// Whether the caps are rounded.
        rounded: bool,
    },
    /// Thick segment; endpoints are in normalized quad space.
    Segment {
        /// First endpoint, `[-1, 1]` quad space.
        a: (f32, f32),
        /// Second endpoint, `[-1, 1]` quad space.
        b: (f32, f32),
        /// Stroke thickness in pixels.
        thickness: f32,
        /// Whether the caps are rounded.
        rounded: bool,
    },
    /// Rotary control.
    Rotary {
        /// Control value in `[0, 1]`.
        value: f32,
        /// Whether the value arc is centered rather than anchored left.
        bipolar: bool,
        /// Hover emphasis in `[0, 1]`.
        hover_amount: f32,
        /// Thickness of the value arc.
        arc_thickness: f32,
    },
    /// Triangle pointing in `direction`.
    Triangle {
        /// Which way the apex points.
        direction: Direction,
    },
    /// Prepared text block.
    Text {
        /// The prepared text handle.
        text: TextId,
        /// The font the block was shaped with.
        font: FontId,
        /// Reading orientation.
        direction: Direction,
    },
    /// Rasterized icon.
    Icon {
        /// Raster cache key.
        key: IconKey,
    },
    /// Custom shader quad.
    Shader {
        /// The shader program to run.
        shader: ShaderId,
    },
    /// Polyline strip.
    Line {
        /// The polyline data handle.
        line: LineId,
        /// Stroke width in pixels.
        line_width: f32,
        /// Fill position for partial fills, `[0, 1]`; negative disables.
        fill_position: f32,
    },
    /// Quad sampling the packed texture of a promoted subtree.
    Sample {
        /// Target holding the subtree's pixels.
        source_target: TargetId,
        /// Rectangle of the source layer's texture to sample.
        source: Bounds,
        /// Post effect applied while compositing, if any.
        post_effect: Option<PostEffectId>,
    },
}

impl ShapeData {
    /// The draw-pipeline category of this shape.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        match self {
            Self::Fill => ShapeKind::Fill,
            Self::Circle { .. } => ShapeKind::Circle,
            Self::RoundedRect { .. } => ShapeKind::RoundedRect,
            Self::Arc { .. } => ShapeKind::Arc,
            Self::Segment { .. } => ShapeKind::Segment,
            Self::Rotary { .. } => ShapeKind::Rotary,
            Self::Triangle { .. } => ShapeKind::Triangle,
            Self::Text { .. } => ShapeKind::Text,
            Self::Icon { .. } => ShapeKind::Icon,
            Self::Shader { .. } => ShapeKind::Shader,
            Self::Line { .. } => ShapeKind::Line,
            Self::Sample { .. } => ShapeKind::Sample,
        }
    }
}

/// A fully resolved draw primitive.
///
/// Position and clamp are region-local: the canvas resolves the draw-state
/// offset and clip before constructing the shape, and the region's placement
/// within its layer is applied at submission time. That keeps a region's
/// batches valid wherever the region ends up, including inside a packed
/// atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shape {
    /// Clip rectangle in region space.
    pub clamp: kurbo::Rect,
    /// Corner colors.
    pub color: QuadColor,
    /// Left edge in region space.
    pub x: f32,
    /// Top edge in region space.
    pub y: f32,
    /// Horizontal extent.
    pub width: f32,
    /// Vertical extent.
    pub height: f32,
    /// Kind-specific parameters.
    pub data: ShapeData,
}

impl Shape {
    /// The draw-pipeline category of this shape.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        self.data.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(ShapeData::Fill.kind(), ShapeKind::Fill);
        assert_eq!(
            ShapeData::Circle {
                thickness: 0.0,
                fade: 1.0
            }
            .kind(),
            ShapeKind::Circle
        );
        assert_eq!(
            ShapeData::Sample {
                source_target: TargetId(1),
                source: Bounds::new(0, 0, 8, 8),
                post_effect: None
            }
            .kind(),
            ShapeKind::Sample
        );
    }
}
