// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grouping of draw primitives into device-submittable batches.
//!
//! A batch is a maximal run of consecutive shapes sharing one
//! [`ShapeKind`] and one [`BlendMode`]; a new batch opens exactly when
//! either differs from the previous shape. Order within a batch is the
//! submission order, which is what makes painter's-algorithm stacking work
//! for overlapping shapes of the same category.
//!
//! Batch storage is recycled across frames: [`ShapeBatcher::clear`] resets
//! counts without releasing the backing vectors.

use alloc::vec::Vec;

use bytemuck::{Pod, Zeroable};

use crate::shape::{BlendMode, Shape, ShapeData, ShapeKind};

/// One quad corner handed to the device.
///
/// Four vertices per shape, in top-left, top-right, bottom-left,
/// bottom-right order. `coord` spans `[-1, 1]` across the quad so shader
/// pipelines can evaluate distance fields without extra uniforms.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ShapeVertex {
    /// Position in layer space.
    pub position: [f32; 2],
    /// Normalized quad coordinate.
    pub coord: [f32; 2],
    /// Clamp rectangle as `[left, top, right, bottom]`.
    pub clamp: [f32; 4],
    /// Kind-specific parameters.
    pub params: [f32; 4],
    /// Packed corner color.
    pub color: u32,
}

/// A maximal run of same-kind, same-blend shapes.
#[derive(Clone, Debug)]
pub struct SubmitBatch {
    /// Draw-pipeline category of every shape in the batch.
    pub kind: ShapeKind,
    /// Blend mode of every shape in the batch.
    pub blend: BlendMode,
    /// Shapes in submission order.
    pub shapes: Vec<Shape>,
}

impl SubmitBatch {
    fn new(kind: ShapeKind, blend: BlendMode) -> Self {
        Self {
            kind,
            blend,
            shapes: Vec::new(),
        }
    }

    /// Appends quad vertices for every shape to `out`.
    pub fn write_vertices(&self, out: &mut Vec<ShapeVertex>) {
        self.write_vertices_at(0.0, 0.0, out);
    }

    /// Appends quad vertices for every shape to `out`, translating both
    /// positions and clamp rectangles by `(dx, dy)`.
    ///
    /// Shapes are stored in region space; this is how a region's placement
    /// within its layer (tree position or atlas slot) is applied.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "clamp rectangles are pixel-sized and fit in f32"
    )]
    pub fn write_vertices_at(&self, dx: f32, dy: f32, out: &mut Vec<ShapeVertex>) {
        for shape in &self.shapes {
            let clamp = [
                shape.clamp.x0 as f32 + dx,
                shape.clamp.y0 as f32 + dy,
                shape.clamp.x1 as f32 + dx,
                shape.clamp.y1 as f32 + dy,
            ];
            let params = shape_params(&shape.data);
            let x = shape.x + dx;
            let y = shape.y + dy;
            let corners = [
                ([x, y], [-1.0, -1.0]),
                ([x + shape.width, y], [1.0, -1.0]),
                ([x, y + shape.height], [-1.0, 1.0]),
                ([x + shape.width, y + shape.height], [1.0, 1.0]),
            ];
            for (index, (position, coord)) in corners.into_iter().enumerate() {
                out.push(ShapeVertex {
                    position,
                    coord,
                    clamp,
                    params,
                    color: shape.color.corners[index].0,
                });
            }
        }
    }
}

fn shape_params(data: &ShapeData) -> [f32; 4] {
    match *data {
        ShapeData::Fill | ShapeData::Text { .. } | ShapeData::Icon { .. } => [0.0; 4],
        ShapeData::Circle { thickness, fade } => [thickness, fade, 0.0, 0.0],
        ShapeData::RoundedRect {
            rounding,
            thickness,
        } => [rounding, thickness, 0.0, 0.0],
        ShapeData::Arc {
            thickness,
            center_radians,
            radians,
            rounded,
        } => [thickness, center_radians, radians, if rounded { 1.0 } else { 0.0 }],
        // Endpoints fill all four slots; thickness and caps are read from the
        // shape data by pipelines that need them.
        ShapeData::Segment { a, b, .. } => [a.0, a.1, b.0, b.1],
        ShapeData::Rotary {
            value,
            bipolar,
            hover_amount,
            arc_thickness,
        } => [value, if bipolar { 1.0 } else { 0.0 }, hover_amount, arc_thickness],
        ShapeData::Triangle { direction } => [direction_param(direction), 0.0, 0.0, 0.0],
        ShapeData::Shader { shader } => [shader.0 as f32, 0.0, 0.0, 0.0],
        ShapeData::Line {
            line,
            line_width,
            fill_position,
        } => [line.0 as f32, line_width, fill_position, 0.0],
        // Source rectangle within the sampled target; the target and post
        // effect are read from the shape data.
        ShapeData::Sample { source, .. } => [
            source.x as f32,
            source.y as f32,
            source.width as f32,
            source.height as f32,
        ],
    }
}

fn direction_param(direction: crate::shape::Direction) -> f32 {
    match direction {
        crate::shape::Direction::Up => 0.0,
        crate::shape::Direction::Down => 1.0,
        crate::shape::Direction::Left => 2.0,
        crate::shape::Direction::Right => 3.0,
    }
}

/// Builds ordered batches from a stream of shapes.
///
/// Owned by each region; reset every time the region is redrawn.
#[derive(Clone, Debug, Default)]
pub struct ShapeBatcher {
    batches: Vec<SubmitBatch>,
    live: usize,
}

impl ShapeBatcher {
    /// Creates an empty batcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a shape, opening a new batch if the kind or blend mode
    /// differs from the previous shape.
    pub fn add_shape(&mut self, shape: Shape, blend: BlendMode) {
        let kind = shape.kind();
        let continues = self
            .live
            .checked_sub(1)
            .map(|last| {
                let batch = &self.batches[last];
                batch.kind == kind && batch.blend == blend
            })
            .unwrap_or(false);

        if !continues {
            if self.live < self.batches.len() {
                // Recycle a cleared batch slot.
                let batch = &mut self.batches[self.live];
                batch.kind = kind;
                batch.blend = blend;
                debug_assert!(batch.shapes.is_empty(), "recycled batch must be empty");
            } else {
                self.batches.push(SubmitBatch::new(kind, blend));
            }
            self.live += 1;
        }
        self.batches[self.live - 1].shapes.push(shape);
    }

    /// The live batches, in submission order.
    #[must_use]
    pub fn batches(&self) -> &[SubmitBatch] {
        &self.batches[..self.live]
    }

    /// Number of live batches.
    #[must_use]
    pub fn num_batches(&self) -> usize {
        self.live
    }

    /// Total number of shapes across live batches.
    #[must_use]
    pub fn num_shapes(&self) -> usize {
        self.batches().iter().map(|b| b.shapes.len()).sum()
    }

    /// Whether every live batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches().iter().all(|b| b.shapes.is_empty())
    }

    /// Resets all batches, retaining backing storage for reuse.
    pub fn clear(&mut self) {
        for batch in &mut self.batches {
            batch.shapes.clear();
        }
        self.live = 0;
    }
}
