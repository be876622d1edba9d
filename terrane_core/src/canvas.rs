// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The canvas: draw state, region management, and the frame driver.
//!
//! A [`Canvas`] owns the region tree and one layer stack. Depth 0 is the
//! composite layer paired to the window; each deeper depth backs promoted
//! regions, packing them into a shared atlas texture with dedicated targets
//! as a fallback for regions too large to pack. Frame submission resolves
//! the deepest layers first so every sampled texture is ready before its
//! consumer draws.
//!
//! Drawing goes through a saved/restored draw state (origin, clamp, color,
//! blend, current region). [`begin_region`](Canvas::begin_region) resets
//! the state so a region's drawing code is independent of where the region
//! is mounted.

use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

use crate::backend::{Device, TargetId, WindowHandle};
use crate::bounds::Bounds;
use crate::color::{QuadColor, Rgba};
use crate::layer::{DamageMemory, Layer};
use crate::region::{RegionId, RegionStore};
use crate::shape::{
    BlendMode, Direction, FontId, IconKey, LineId, PostEffectId, ShaderId, Shape, ShapeData,
    TextId,
};
use crate::trace::{FrameBeginEvent, FrameEndEvent, Tracer};

/// Snapshot of the draw state, saved and restored as a stack.
#[derive(Clone, Copy, Debug)]
struct State {
    x: f32,
    y: f32,
    clamp: kurbo::Rect,
    color: QuadColor,
    blend: BlendMode,
    region: RegionId,
}

/// A retained scene: region tree, layers, draw state, and frame bookkeeping.
#[derive(Debug)]
pub struct Canvas {
    store: RegionStore,
    root: RegionId,
    /// `layers[depth]`: depth 0 is the composite layer alone; deeper depths
    /// hold one shared packed layer followed by dedicated fallback layers.
    layers: Vec<Vec<Layer>>,
    next_target: u32,
    retired_targets: Vec<TargetId>,
    state: State,
    state_stack: Vec<State>,
    packed_fonts: BTreeSet<FontId>,
    width: i32,
    height: i32,
    dpi_scale: f32,
    time: f64,
    delta_time: f64,
    frame_count: u64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    /// Creates a canvas remembering [`DamageMemory::DOUBLE_BUFFERED`] frames
    /// of composite damage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_damage_memory(DamageMemory::DOUBLE_BUFFERED)
    }

    /// Creates a canvas with an explicit damage memory for the composite
    /// layer. Intermediate layers render in place and always use
    /// [`DamageMemory::SINGLE`].
    #[must_use]
    pub fn with_damage_memory(memory: DamageMemory) -> Self {
        let mut store = RegionStore::new();
        let root = store.create_region();
        store.set_attached_recursive(root.index(), true);
        let mut composite = Layer::composite(TargetId(0), memory);
        composite.add_region(root);
        Self {
            store,
            root,
            layers: vec![vec![composite]],
            next_target: 1,
            retired_targets: Vec::new(),
            state: State {
                x: 0.0,
                y: 0.0,
                clamp: kurbo::Rect::ZERO,
                color: QuadColor::solid(Rgba(0xffff_ffff)),
                blend: BlendMode::Alpha,
                region: root,
            },
            state_stack: Vec::new(),
            packed_fonts: BTreeSet::new(),
            width: 0,
            height: 0,
            dpi_scale: 1.0,
            time: 0.0,
            delta_time: 0.0,
            frame_count: 0,
        }
    }

    // -- Accessors --

    /// The root region covering the whole canvas.
    #[must_use]
    pub fn root(&self) -> RegionId {
        self.root
    }

    /// Read access to the region tree.
    #[must_use]
    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    /// The layer stack, outermost depth first. Read-only; useful for
    /// diagnostics and tests.
    #[must_use]
    pub fn layers(&self) -> &[Vec<Layer>] {
        &self.layers
    }

    /// Canvas width in physical pixels.
    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Canvas height in physical pixels.
    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Scale factor between logical and physical pixels.
    #[must_use]
    pub fn dpi_scale(&self) -> f32 {
        self.dpi_scale
    }

    /// Canvas time in seconds, as of the last [`update_time`](Self::update_time).
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Seconds elapsed between the two most recent time updates.
    #[must_use]
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Number of rendered frames.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    // -- Region lifecycle --

    /// Creates a detached region.
    pub fn create_region(&mut self) -> RegionId {
        self.store.create_region()
    }

    /// Destroys a region, demoting it first if it renders into its own
    /// layer.
    ///
    /// # Panics
    ///
    /// Panics if the region still has children.
    pub fn destroy_region(&mut self, region: RegionId) {
        if self.store.needs_layer(region) {
            self.set_needs_layer(region, false);
        }
        if self.store.parent(region).is_some() {
            self.remove_region(region);
        }
        self.store.destroy_region(region);
    }

    /// Adds a region as the top-most child of the root.
    pub fn add_region(&mut self, region: RegionId) {
        self.add_region_to(self.root, region);
    }

    /// Adds `child` as the top-most child of `parent`, re-homing any
    /// promoted regions in the subtree to their new depths and damaging the
    /// area the subtree now covers.
    pub fn add_region_to(&mut self, parent: RegionId, child: RegionId) {
        let promoted = self.collect_promoted(child, true);
        for &(region, depth) in &promoted {
            self.remove_from_depth(region, depth as usize);
        }
        self.store.add_region(parent, child);
        if self.store.attached(child) {
            for &(region, _) in &promoted {
                self.place_region(region);
            }
        }
        self.invalidate_region_area(child);
        self.prune_layers();
    }

    /// Removes a region from its parent, damaging the area it covered.
    /// Promoted regions in the subtree give up their layer slots until the
    /// subtree is attached again.
    pub fn remove_region(&mut self, child: RegionId) {
        self.invalidate_region_area(child);
        let promoted = self.collect_promoted(child, true);
        for &(region, depth) in &promoted {
            self.remove_from_depth(region, depth as usize);
        }
        self.store.remove_region(child);
        self.prune_layers();
    }

    /// Moves or resizes a region. The old and new areas are both damaged;
    /// a promoted region is repacked at its new size.
    pub fn set_bounds(&mut self, region: RegionId, bounds: Bounds) {
        let old = self.store.bounds(region);
        if old == bounds {
            return;
        }
        self.invalidate_region_area(region);
        self.store.set_bounds_raw(region.index(), bounds);
        if self.store.needs_layer(region) && self.store.attached(region) {
            let depth = self.store.layer_index(region) as usize;
            self.remove_from_depth(region, depth);
            self.place_region(region);
        }
        self.invalidate_region_area(region);
    }

    /// Shows or hides a region, damaging its area on a change.
    pub fn set_visible(&mut self, region: RegionId, visible: bool) {
        if self.store.visible(region) == visible {
            return;
        }
        self.store.set_visible(region, visible);
        self.invalidate_region_area(region);
    }

    /// Promotes a region to its own layer, or demotes it back into its
    /// parent's.
    ///
    /// Promotion shifts the subtree one layer deeper, allocates the
    /// sampled-quad companion, and packs the region into the depth's shared
    /// atlas. A region too large to pack even after atlas growth gets a
    /// dedicated layer instead; promotion never fails. Demotion reverses
    /// all of it. Both fully damage the region's area.
    pub fn set_needs_layer(&mut self, region: RegionId, needs_layer: bool) {
        if needs_layer == self.store.needs_layer(region) {
            return;
        }
        if needs_layer {
            let nested = self.collect_promoted(region, false);
            for &(r, depth) in &nested {
                self.remove_from_depth(r, depth as usize);
            }
            self.store.shift_layer_index_recursive(region.index(), 1);
            let companion = self.store.create_region();
            self.store.link_intermediate(region, companion);
            if region == self.root {
                // The composite hands the root's slot to the companion, so
                // it composites the sampled quad instead of the raw content.
                self.layers[0][0].remove_region(region);
                self.layers[0][0].add_region(companion);
            }
            if self.store.attached(region) {
                self.place_region(region);
                for &(r, _) in &nested {
                    self.place_region(r);
                }
            }
        } else {
            let nested = self.collect_promoted(region, false);
            for &(r, depth) in &nested {
                self.remove_from_depth(r, depth as usize);
            }
            let depth = self.store.layer_index(region) as usize;
            self.remove_from_depth(region, depth);
            if let Some(companion) = self.store.unlink_intermediate(region) {
                if region == self.root {
                    self.layers[0][0].remove_region(companion);
                    self.layers[0][0].add_region(region);
                }
                self.store.destroy_region(companion);
            }
            self.store.shift_layer_index_recursive(region.index(), -1);
            if self.store.attached(region) {
                for &(r, _) in &nested {
                    self.place_region(r);
                }
            }
            self.prune_layers();
        }
        self.invalidate_region_area(region);
    }

    /// Sets the post effect applied when the region's subtree composites.
    /// Setting an effect promotes the region if it is not already promoted.
    pub fn set_post_effect(&mut self, region: RegionId, effect: Option<PostEffectId>) {
        self.store.validate(region);
        self.store.set_post_effect_raw(region.index(), effect);
        if effect.is_some() && !self.store.needs_layer(region) {
            self.set_needs_layer(region, true);
        } else {
            self.invalidate_region_area(region);
        }
    }

    // -- Damage --

    /// Marks a region-local rectangle stale, propagating the damage to
    /// every layer that has to redraw because of it.
    ///
    /// The rectangle climbs the ancestor chain accumulating offsets. At
    /// each promoted ancestor it damages the packed layer holding that
    /// subtree's pixels *and* keeps climbing, so the consuming layers
    /// redraw their sampled quads too. Detached regions and rectangles
    /// outside the region are no-ops.
    pub fn invalidate_rect_in_region(&mut self, region: RegionId, rect: Bounds) {
        if !self.store.attached(region) {
            return;
        }
        let bounds = self.store.bounds(region);
        let Some(mut rect) = rect.intersection(Bounds::new(0, 0, bounds.width, bounds.height))
        else {
            return;
        };

        let mut current = region;
        loop {
            if self.store.needs_layer(current) {
                let depth = self.store.layer_index(current) as usize;
                if let Some(index) = self.layer_owning(depth, current) {
                    let origin = self.layers[depth][index]
                        .coordinates_for_region(current)
                        .map_or((0, 0), |slot| (slot.x, slot.y));
                    self.layers[depth][index]
                        .invalidate_rect(rect.translated(origin.0, origin.1));
                }
            }
            let bounds = self.store.bounds(current);
            rect = rect.translated(bounds.x, bounds.y);
            match self.store.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        if current == self.root {
            self.layers[0][0].invalidate_rect(rect);
        }
    }

    /// Marks a region's whole area stale.
    pub fn invalidate_region_area(&mut self, region: RegionId) {
        let bounds = self.store.bounds(region);
        self.invalidate_rect_in_region(region, Bounds::new(0, 0, bounds.width, bounds.height));
    }

    // -- Window plumbing --

    /// Pairs the composite layer to a window at the given size.
    pub fn pair_to_window(&mut self, window: WindowHandle, width: i32, height: i32) {
        self.layers[0][0].pair_to_window(window);
        self.set_dimensions(width, height);
    }

    /// Unpairs the composite layer from its window.
    pub fn remove_from_window(&mut self) {
        self.layers[0][0].remove_from_window();
    }

    /// Resizes the canvas. Same size is a no-op.
    pub fn set_dimensions(&mut self, width: i32, height: i32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.store
            .set_bounds_raw(self.root.index(), Bounds::new(0, 0, width, height));
        if self.store.needs_layer(self.root) {
            // A promoted root needs a slot at the new size.
            let depth = self.store.layer_index(self.root) as usize;
            self.remove_from_depth(self.root, depth);
            self.place_region(self.root);
            self.invalidate_region_area(self.root);
        }
        self.layers[0][0].set_dimensions(width, height);
    }

    /// Switches the composite target between standard and extended range.
    pub fn set_hdr(&mut self, hdr: bool) {
        self.layers[0][0].set_hdr(hdr);
    }

    /// Sets the logical-to-physical pixel scale. A change repaints
    /// everything.
    pub fn set_dpi_scale(&mut self, scale: f32) {
        if (scale - self.dpi_scale).abs() < f32::EPSILON {
            return;
        }
        self.dpi_scale = scale;
        for depth in &mut self.layers {
            for layer in depth {
                layer.invalidate();
            }
        }
    }

    // -- Draw state --

    /// Pushes the current draw state.
    pub fn save_state(&mut self) {
        self.state_stack.push(self.state);
    }

    /// Pops the most recently saved draw state.
    ///
    /// # Panics
    ///
    /// Panics if no state is saved.
    pub fn restore_state(&mut self) {
        let Some(state) = self.state_stack.pop() else {
            panic!("restore_state without matching save_state");
        };
        self.state = state;
    }

    /// Translates the draw origin.
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.state.x += x;
        self.state.y += y;
    }

    /// Sets the clamp rectangle, in current draw-origin coordinates.
    pub fn set_clamp_bounds(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let x = f64::from(self.state.x + x);
        let y = f64::from(self.state.y + y);
        self.state.clamp = kurbo::Rect::new(x, y, x + f64::from(width), y + f64::from(height));
    }

    /// Intersects the clamp rectangle with another, never widening it.
    pub fn trim_clamp_bounds(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let x = f64::from(self.state.x + x);
        let y = f64::from(self.state.y + y);
        let rect = kurbo::Rect::new(x, y, x + f64::from(width), y + f64::from(height));
        self.state.clamp = self.state.clamp.intersect(rect);
    }

    /// Sets the draw color.
    pub fn set_color(&mut self, color: impl Into<QuadColor>) {
        self.state.color = color.into();
    }

    /// Sets the blend mode for subsequent shapes.
    pub fn set_blend_mode(&mut self, blend: BlendMode) {
        self.state.blend = blend;
    }

    /// Starts redrawing a region: saves the draw state, clears the region's
    /// shapes, and resets origin, clamp, and color to the region's local
    /// space.
    pub fn begin_region(&mut self, region: RegionId) {
        self.save_state();
        let bounds = self.store.bounds(region);
        self.store.clear_shapes(region);
        self.state = State {
            x: 0.0,
            y: 0.0,
            clamp: kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(bounds.width),
                f64::from(bounds.height),
            ),
            color: QuadColor::solid(Rgba(0xffff_ffff)),
            blend: BlendMode::Alpha,
            region,
        };
    }

    /// Finishes redrawing a region, restoring the outer draw state.
    ///
    /// # Panics
    ///
    /// Panics if there is no matching [`begin_region`](Self::begin_region).
    pub fn end_region(&mut self) {
        let Some(state) = self.state_stack.pop() else {
            panic!("end_region without matching begin_region");
        };
        self.state = state;
    }

    // -- Drawing --

    /// Solid quad.
    pub fn fill(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.add_shape(x, y, width, height, ShapeData::Fill);
    }

    /// Filled disc with the given diameter.
    pub fn circle(&mut self, x: f32, y: f32, diameter: f32) {
        self.add_shape(
            x,
            y,
            diameter,
            diameter,
            ShapeData::Circle {
                thickness: 0.0,
                fade: 1.0,
            },
        );
    }

    /// Circular outline of the given thickness.
    pub fn ring(&mut self, x: f32, y: f32, diameter: f32, thickness: f32) {
        self.add_shape(
            x,
            y,
            diameter,
            diameter,
            ShapeData::Circle {
                thickness,
                fade: 1.0,
            },
        );
    }

    /// Disc with a widened antialiased edge.
    pub fn fade_circle(&mut self, x: f32, y: f32, diameter: f32, fade: f32) {
        self.add_shape(
            x,
            y,
            diameter,
            diameter,
            ShapeData::Circle {
                thickness: 0.0,
                fade,
            },
        );
    }

    /// Filled rectangle with rounded corners.
    pub fn rounded_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32, rounding: f32) {
        self.add_shape(
            x,
            y,
            width,
            height,
            ShapeData::RoundedRect {
                rounding: rounding.max(1.0),
                thickness: 0.0,
            },
        );
    }

    /// Rounded-rectangle outline.
    ///
    /// Drawn as four passes, each clamped to one edge strip, so the border
    /// never double-covers a pixel under additive blending.
    pub fn rounded_rectangle_border(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rounding: f32,
        thickness: f32,
    ) {
        let rounding = rounding.max(1.0);
        let band = rounding.max(thickness);
        let strips = [
            (x, y, width, band),
            (x, y + height - band, width, band),
            (x, y + band, band, height - 2.0 * band),
            (x + width - band, y + band, band, height - 2.0 * band),
        ];
        for (sx, sy, sw, sh) in strips {
            self.save_state();
            self.trim_clamp_bounds(sx, sy, sw, sh);
            self.add_shape(
                x,
                y,
                width,
                height,
                ShapeData::RoundedRect {
                    rounding,
                    thickness,
                },
            );
            self.restore_state();
        }
    }

    /// Arc with flat caps. The quad is `width` square; `center_radians`
    /// points at the arc's middle and `radians` sweeps to each side.
    pub fn arc(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        thickness: f32,
        center_radians: f32,
        radians: f32,
    ) {
        self.add_shape(
            x,
            y,
            width,
            width,
            ShapeData::Arc {
                thickness,
                center_radians,
                radians,
                rounded: false,
            },
        );
    }

    /// Arc with rounded caps.
    pub fn rounded_arc(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        thickness: f32,
        center_radians: f32,
        radians: f32,
    ) {
        self.add_shape(
            x,
            y,
            width,
            width,
            ShapeData::Arc {
                thickness,
                center_radians,
                radians,
                rounded: true,
            },
        );
    }

    /// Thick line segment between two points, flat caps.
    pub fn segment(&mut self, ax: f32, ay: f32, bx: f32, by: f32, thickness: f32) {
        self.segment_shape(ax, ay, bx, by, thickness, false);
    }

    /// Thick line segment between two points, rounded caps.
    pub fn rounded_segment(&mut self, ax: f32, ay: f32, bx: f32, by: f32, thickness: f32) {
        self.segment_shape(ax, ay, bx, by, thickness, true);
    }

    fn segment_shape(&mut self, ax: f32, ay: f32, bx: f32, by: f32, thickness: f32, rounded: bool) {
        // Quad bounding both endpoints, padded for the stroke and its
        // antialiased edge.
        let pad = thickness * 0.5 + 1.0;
        let x = ax.min(bx) - pad;
        let y = ay.min(by) - pad;
        let width = (ax - bx).abs() + 2.0 * pad;
        let height = (ay - by).abs() + 2.0 * pad;
        let cx = x + width * 0.5;
        let cy = y + height * 0.5;
        let a = ((ax - cx) / (width * 0.5), (ay - cy) / (height * 0.5));
        let b = ((bx - cx) / (width * 0.5), (by - cy) / (height * 0.5));
        self.add_shape(
            x,
            y,
            width,
            height,
            ShapeData::Segment {
                a,
                b,
                thickness,
                rounded,
            },
        );
    }

    /// Rotary control in a `width` square quad.
    pub fn rotary(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        value: f32,
        bipolar: bool,
        hover_amount: f32,
        arc_thickness: f32,
    ) {
        self.add_shape(
            x,
            y,
            width,
            width,
            ShapeData::Rotary {
                value,
                bipolar,
                hover_amount,
                arc_thickness,
            },
        );
    }

    /// Axis-aligned triangle pointing in `direction`.
    pub fn triangle(&mut self, x: f32, y: f32, width: f32, height: f32, direction: Direction) {
        self.add_shape(x, y, width, height, ShapeData::Triangle { direction });
    }

    /// Registers a font as packed and ready for drawing.
    pub fn pack_font(&mut self, font: FontId) {
        self.packed_fonts.insert(font);
    }

    /// Prepared text block.
    ///
    /// # Panics
    ///
    /// Panics if `font` has not been packed with [`pack_font`](Self::pack_font).
    pub fn text(
        &mut self,
        text: TextId,
        font: FontId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        direction: Direction,
    ) {
        assert!(
            self.packed_fonts.contains(&font),
            "font not packed before drawing text"
        );
        self.store.add_text(self.state.region, text, font);
        self.add_shape(
            x,
            y,
            width,
            height,
            ShapeData::Text {
                text,
                font,
                direction,
            },
        );
    }

    /// Rasterized icon at its natural size.
    #[expect(
        clippy::cast_precision_loss,
        reason = "icon rasters are pixel-sized and fit in f32"
    )]
    pub fn icon(&mut self, key: IconKey, x: f32, y: f32) {
        self.add_shape(
            x,
            y,
            key.width as f32,
            key.height as f32,
            ShapeData::Icon { key },
        );
    }

    /// Custom shader quad.
    pub fn shader(&mut self, shader: ShaderId, x: f32, y: f32, width: f32, height: f32) {
        self.add_shape(x, y, width, height, ShapeData::Shader { shader });
    }

    /// Polyline stroke.
    pub fn line(&mut self, line: LineId, x: f32, y: f32, width: f32, height: f32, line_width: f32) {
        self.add_shape(
            x,
            y,
            width,
            height,
            ShapeData::Line {
                line,
                line_width,
                fill_position: -1.0,
            },
        );
    }

    /// Fill under a polyline, down to `fill_position` in `[0, 1]`.
    pub fn line_fill(
        &mut self,
        line: LineId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill_position: f32,
    ) {
        self.add_shape(
            x,
            y,
            width,
            height,
            ShapeData::Line {
                line,
                line_width: 0.0,
                fill_position,
            },
        );
    }

    fn add_shape(&mut self, x: f32, y: f32, width: f32, height: f32, data: ShapeData) {
        let state = self.state;
        self.store.batcher_mut(state.region).add_shape(
            Shape {
                clamp: state.clamp,
                color: state.color,
                x: state.x + x,
                y: state.y + y,
                width,
                height,
                data,
            },
            state.blend,
        );
    }

    // -- Frame driver --

    /// Advances canvas time and bumps the frame counter. Time never runs
    /// backwards; a smaller timestamp yields a zero delta.
    pub fn update_time(&mut self, time: f64) {
        self.delta_time = (time - self.time).max(0.0);
        self.time = time;
        self.frame_count += 1;
    }

    /// Submits every stale layer, deepest first, and returns the next pass
    /// index.
    pub fn submit(&mut self, pass: usize, device: &mut dyn Device) -> usize {
        self.submit_traced(pass, device, &mut Tracer::none())
    }

    /// [`submit`](Self::submit) with trace instrumentation.
    pub fn submit_traced(
        &mut self,
        pass: usize,
        device: &mut dyn Device,
        tracer: &mut Tracer<'_>,
    ) -> usize {
        tracer.frame_begin(&FrameBeginEvent {
            frame_index: self.frame_count,
            time: self.time,
        });
        for target in self.retired_targets.drain(..) {
            device.destroy_target(target);
        }
        self.refresh_companions();

        let mut pass = pass;
        let start = pass;
        for depth in (0..self.layers.len()).rev() {
            for layer in &mut self.layers[depth] {
                pass = layer.submit(pass, device, &self.store, tracer);
            }
        }
        tracer.frame_end(&FrameEndEvent {
            frame_index: self.frame_count,
            passes: pass - start,
        });
        pass
    }

    /// Advances time and submits a frame starting at pass 0.
    pub fn render(&mut self, time: f64, device: &mut dyn Device) -> usize {
        self.update_time(time);
        self.submit(0, device)
    }

    /// Rebuilds every promoted region's sampled quad so it reflects the
    /// current atlas slot, bounds, and post effect.
    fn refresh_companions(&mut self) {
        for layers in self.layers.iter().skip(1) {
            for layer in layers {
                for &region in layer.regions() {
                    let Some(companion) = self.store.intermediate(region) else {
                        continue;
                    };
                    let bounds = self.store.bounds(region);
                    let source = layer.coordinates_for_region(region).unwrap_or(Bounds::new(
                        0,
                        0,
                        bounds.width,
                        bounds.height,
                    ));
                    let post_effect = self.store.post_effect(region);
                    // The extent must mirror the region's, for layers that
                    // draw the companion directly (the promoted root).
                    self.store.set_bounds_raw(companion.index(), bounds);
                    self.store.clear_shapes(companion);
                    #[expect(
                        clippy::cast_precision_loss,
                        reason = "region extents are pixel-sized and fit in f32"
                    )]
                    self.store.batcher_mut(companion).add_shape(
                        Shape {
                            clamp: kurbo::Rect::new(
                                0.0,
                                0.0,
                                f64::from(bounds.width),
                                f64::from(bounds.height),
                            ),
                            color: QuadColor::solid(Rgba(0xffff_ffff)),
                            x: 0.0,
                            y: 0.0,
                            width: bounds.width as f32,
                            height: bounds.height as f32,
                            data: ShapeData::Sample {
                                source_target: layer.target(),
                                source,
                                post_effect,
                            },
                        },
                        BlendMode::Alpha,
                    );
                }
            }
        }
    }

    // -- Layer bookkeeping --

    fn alloc_target(&mut self) -> TargetId {
        let target = TargetId(self.next_target);
        self.next_target += 1;
        target
    }

    /// Promoted regions in `region`'s subtree with their current depths.
    /// `include_self` controls whether `region` itself may appear.
    fn collect_promoted(&self, region: RegionId, include_self: bool) -> Vec<(RegionId, u32)> {
        let mut found = Vec::new();
        self.collect_promoted_into(region, include_self, &mut found);
        found
    }

    fn collect_promoted_into(
        &self,
        region: RegionId,
        include_self: bool,
        found: &mut Vec<(RegionId, u32)>,
    ) {
        if include_self && self.store.needs_layer(region) {
            found.push((region, self.store.layer_index(region)));
        }
        for child in self.store.children(region) {
            self.collect_promoted_into(child, true, found);
        }
    }

    /// Index within `layers[depth]` of the layer owning `region`.
    fn layer_owning(&self, depth: usize, region: RegionId) -> Option<usize> {
        self.layers
            .get(depth)?
            .iter()
            .position(|layer| layer.regions().contains(&region))
    }

    fn remove_from_depth(&mut self, region: RegionId, depth: usize) {
        let Some(index) = self.layer_owning(depth, region) else {
            return;
        };
        self.layers[depth][index].remove_region(region);
        // Dedicated fallback layers exist for exactly one region.
        if index > 0 && self.layers[depth][index].regions().is_empty() {
            let layer = self.layers[depth].remove(index);
            self.retired_targets.push(layer.target());
        }
    }

    /// Ensures `region` has a slot at its layer depth: packed into the
    /// shared atlas when it fits, a dedicated layer otherwise.
    fn place_region(&mut self, region: RegionId) {
        let depth = self.store.layer_index(region) as usize;
        self.ensure_depth(depth);
        let bounds = self.store.bounds(region);
        if bounds.width > 0 && bounds.height > 0 {
            let packed =
                self.layers[depth][0].add_packed_region(region, bounds.width, bounds.height);
            if packed.is_ok() {
                return;
            }
        }
        let target = self.alloc_target();
        let mut layer = Layer::dedicated(target, DamageMemory::SINGLE);
        layer.set_dimensions(bounds.width.max(0), bounds.height.max(0));
        layer.add_region(region);
        self.layers[depth].push(layer);
    }

    fn ensure_depth(&mut self, depth: usize) {
        while self.layers.len() <= depth {
            let target = self.alloc_target();
            self.layers
                .push(vec![Layer::packed(target, DamageMemory::SINGLE)]);
        }
    }

    /// Drops trailing depths with no owned regions, retiring their targets.
    fn prune_layers(&mut self) {
        while self.layers.len() > 1 {
            let last = self
                .layers
                .last()
                .is_some_and(|layers| layers.iter().all(|l| l.regions().is_empty()));
            if !last {
                break;
            }
            for layer in self.layers.pop().into_iter().flatten() {
                self.retired_targets.push(layer.target());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::backend::TargetSpec;
    use crate::batch::{ShapeVertex, SubmitBatch};
    use crate::shape::ShapeKind;

    #[derive(Default)]
    struct TestDevice {
        destroyed: Vec<TargetId>,
        batches: Vec<(usize, TargetId, ShapeKind)>,
    }

    impl Device for TestDevice {
        fn ensure_target(&mut self, _target: TargetId, _spec: &TargetSpec) {}

        fn destroy_target(&mut self, target: TargetId) {
            self.destroyed.push(target);
        }

        fn clear_areas(&mut self, _pass: usize, _target: TargetId, _areas: &[Bounds]) {}

        fn submit_batch(
            &mut self,
            pass: usize,
            target: TargetId,
            batch: &SubmitBatch,
            _vertices: &[ShapeVertex],
            _scissors: &[Bounds],
        ) {
            self.batches.push((pass, target, batch.kind));
        }
    }

    fn canvas_with_region(w: i32, h: i32) -> (Canvas, RegionId) {
        let mut canvas = Canvas::new();
        canvas.set_dimensions(400, 400);
        let region = canvas.create_region();
        canvas.add_region(region);
        canvas.set_bounds(region, Bounds::new(20, 30, w, h));
        (canvas, region)
    }

    #[test]
    fn save_restore_round_trips_state() {
        let mut canvas = Canvas::new();
        canvas.set_position(10.0, 20.0);
        canvas.set_color(Rgba(0xff12_3456));
        canvas.save_state();
        canvas.set_position(5.0, 5.0);
        canvas.set_color(Rgba(0xffab_cdef));
        canvas.set_blend_mode(BlendMode::Add);
        canvas.restore_state();

        assert_eq!(canvas.state.x, 10.0);
        assert_eq!(canvas.state.y, 20.0);
        assert_eq!(canvas.state.color, QuadColor::solid(Rgba(0xff12_3456)));
        assert_eq!(canvas.state.blend, BlendMode::Alpha);
    }

    #[test]
    #[should_panic(expected = "restore_state without matching save_state")]
    fn restore_on_empty_stack_panics() {
        let mut canvas = Canvas::new();
        canvas.restore_state();
    }

    #[test]
    fn begin_region_resets_local_space() {
        let (mut canvas, region) = canvas_with_region(100, 100);
        canvas.set_position(50.0, 60.0);
        canvas.set_color(Rgba(0xff00_00ff));

        canvas.begin_region(region);
        canvas.fill(5.0, 6.0, 10.0, 10.0);
        canvas.end_region();

        let batch = &canvas.store().batcher(region).batches()[0];
        let shape = batch.shapes[0];
        // Mount-independent: the outer position offset does not leak in.
        assert_eq!((shape.x, shape.y), (5.0, 6.0));
        assert_eq!(shape.clamp, kurbo::Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(shape.color, QuadColor::solid(Rgba(0xffff_ffff)));

        // The outer state is back.
        assert_eq!(canvas.state.x, 50.0);
        assert_eq!(canvas.state.color, QuadColor::solid(Rgba(0xff00_00ff)));
    }

    #[test]
    fn begin_region_clears_previous_shapes() {
        let (mut canvas, region) = canvas_with_region(100, 100);
        canvas.begin_region(region);
        canvas.fill(0.0, 0.0, 10.0, 10.0);
        canvas.end_region();
        canvas.begin_region(region);
        canvas.circle(0.0, 0.0, 8.0);
        canvas.end_region();

        let batches = canvas.store().batcher(region).batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].kind, ShapeKind::Circle);
    }

    #[test]
    fn rounded_rectangle_border_draws_four_clamped_passes() {
        let (mut canvas, region) = canvas_with_region(100, 100);
        canvas.begin_region(region);
        canvas.rounded_rectangle_border(10.0, 10.0, 80.0, 60.0, 8.0, 2.0);
        canvas.end_region();

        let batches = canvas.store().batcher(region).batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].shapes.len(), 4);
        // All four passes cover the full rectangle but clamp differently.
        let clamps: Vec<_> = batches[0].shapes.iter().map(|s| s.clamp).collect();
        for shape in &batches[0].shapes {
            assert_eq!((shape.x, shape.y), (10.0, 10.0));
        }
        assert!(clamps.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    #[should_panic(expected = "font not packed")]
    fn text_requires_packed_font() {
        let (mut canvas, region) = canvas_with_region(100, 100);
        canvas.begin_region(region);
        canvas.text(
            TextId(1),
            FontId(9),
            0.0,
            0.0,
            50.0,
            20.0,
            Direction::Up,
        );
    }

    #[test]
    fn packed_font_allows_text() {
        let (mut canvas, region) = canvas_with_region(100, 100);
        canvas.pack_font(FontId(9));
        canvas.begin_region(region);
        canvas.text(
            TextId(1),
            FontId(9),
            0.0,
            0.0,
            50.0,
            20.0,
            Direction::Up,
        );
        canvas.end_region();
        assert_eq!(canvas.store().batcher(region).num_shapes(), 1);
    }

    #[test]
    fn add_region_attaches_and_damages() {
        let mut canvas = Canvas::new();
        canvas.set_dimensions(400, 400);
        // Flush initial damage.
        let mut device = TestDevice::default();
        canvas.submit(0, &mut device);
        canvas.submit(0, &mut device);
        canvas.submit(0, &mut device);
        assert!(canvas.layers()[0][0].current_damage().is_empty());

        let region = canvas.create_region();
        canvas.set_bounds(region, Bounds::new(10, 10, 50, 50));
        assert!(canvas.layers()[0][0].current_damage().is_empty());

        canvas.add_region(region);
        assert!(canvas.store().attached(region));
        assert_eq!(
            canvas.layers()[0][0].current_damage(),
            &[Bounds::new(10, 10, 50, 50)]
        );
    }

    #[test]
    fn out_of_bounds_invalidate_is_a_noop() {
        let (mut canvas, region) = canvas_with_region(100, 100);
        let before = canvas.layers()[0][0].current_damage().to_vec();
        canvas.invalidate_rect_in_region(region, Bounds::new(200, 0, 10, 10));
        assert_eq!(canvas.layers()[0][0].current_damage(), &before[..]);
    }

    #[test]
    fn set_bounds_damages_old_and_new_areas() {
        let (mut canvas, region) = canvas_with_region(50, 50);
        let mut device = TestDevice::default();
        for _ in 0..3 {
            canvas.submit(0, &mut device);
        }

        canvas.set_bounds(region, Bounds::new(100, 100, 60, 60));
        let damage = canvas.layers()[0][0].current_damage();
        assert!(damage.contains(&Bounds::new(20, 30, 50, 50)));
        assert!(damage.contains(&Bounds::new(100, 100, 60, 60)));
    }

    #[test]
    fn same_bounds_is_a_noop() {
        let (mut canvas, region) = canvas_with_region(50, 50);
        let mut device = TestDevice::default();
        for _ in 0..3 {
            canvas.submit(0, &mut device);
        }
        canvas.set_bounds(region, Bounds::new(20, 30, 50, 50));
        assert!(canvas.layers()[0][0].current_damage().is_empty());
    }

    #[test]
    fn promotion_moves_the_subtree_one_layer_deeper() {
        let (mut canvas, region) = canvas_with_region(50, 50);
        let child = canvas.create_region();
        canvas.add_region_to(region, child);

        canvas.set_needs_layer(region, true);
        assert!(canvas.store().needs_layer(region));
        assert_eq!(canvas.store().layer_index(region), 1);
        assert_eq!(canvas.store().layer_index(child), 1);
        assert_eq!(canvas.layers().len(), 2);
        assert!(
            canvas.layers()[1][0]
                .coordinates_for_region(region)
                .is_some()
        );

        canvas.set_needs_layer(region, false);
        assert!(!canvas.store().needs_layer(region));
        assert_eq!(canvas.store().layer_index(region), 0);
        assert_eq!(canvas.store().layer_index(child), 0);
        assert_eq!(canvas.layers().len(), 1);
    }

    #[test]
    fn damage_crosses_the_promotion_boundary() {
        let (mut canvas, region) = canvas_with_region(50, 50);
        canvas.set_needs_layer(region, true);
        let mut device = TestDevice::default();
        for _ in 0..3 {
            canvas.submit(0, &mut device);
        }

        canvas.invalidate_rect_in_region(region, Bounds::new(5, 5, 10, 10));
        let slot = canvas.layers()[1][0]
            .coordinates_for_region(region)
            .unwrap();
        // The packed layer redraws the region's pixels...
        assert_eq!(
            canvas.layers()[1][0].current_damage(),
            &[Bounds::new(slot.x + 5, slot.y + 5, 10, 10)]
        );
        // ...and the composite redraws the sampled quad's area.
        assert_eq!(
            canvas.layers()[0][0].current_damage(),
            &[Bounds::new(25, 35, 10, 10)]
        );
    }

    #[test]
    fn submit_resolves_intermediate_layers_first() {
        let (mut canvas, region) = canvas_with_region(50, 50);
        canvas.begin_region(region);
        canvas.fill(0.0, 0.0, 50.0, 50.0);
        canvas.end_region();
        canvas.set_needs_layer(region, true);

        let mut device = TestDevice::default();
        let passes = canvas.submit(0, &mut device);
        assert_eq!(passes, 2);

        // The region's fill lands on the intermediate target first, then the
        // composite draws the sampled quad.
        let fill_pass = device
            .batches
            .iter()
            .find(|(_, _, kind)| *kind == ShapeKind::Fill)
            .unwrap()
            .0;
        let sample_pass = device
            .batches
            .iter()
            .find(|(_, _, kind)| *kind == ShapeKind::Sample)
            .unwrap()
            .0;
        assert!(fill_pass < sample_pass);
    }

    #[test]
    fn demotion_retires_intermediate_targets() {
        let (mut canvas, region) = canvas_with_region(50, 50);
        canvas.set_needs_layer(region, true);
        let intermediate_target = canvas.layers()[1][0].target();
        canvas.set_needs_layer(region, false);

        let mut device = TestDevice::default();
        canvas.submit(0, &mut device);
        assert_eq!(device.destroyed, &[intermediate_target]);
    }

    #[test]
    fn promoted_root_composites_its_sampled_quad() {
        let mut canvas = Canvas::new();
        canvas.set_dimensions(400, 300);
        let root = canvas.root();
        canvas.begin_region(root);
        canvas.fill(0.0, 0.0, 400.0, 300.0);
        canvas.end_region();

        canvas.set_needs_layer(root, true);
        let mut device = TestDevice::default();
        canvas.submit(0, &mut device);

        // The composite draws only the sampled quad; the raw content lands
        // on the intermediate target.
        let composite: Vec<ShapeKind> = device
            .batches
            .iter()
            .filter(|(_, target, _)| *target == TargetId(0))
            .map(|(_, _, kind)| *kind)
            .collect();
        assert_eq!(composite, [ShapeKind::Sample]);
        assert!(
            device
                .batches
                .iter()
                .any(|(_, target, kind)| *target != TargetId(0) && *kind == ShapeKind::Fill)
        );

        // Demotion puts the root's own content back on the composite.
        canvas.set_needs_layer(root, false);
        let mut device = TestDevice::default();
        canvas.submit(0, &mut device);
        let kinds: Vec<ShapeKind> = device.batches.iter().map(|(_, _, kind)| *kind).collect();
        assert_eq!(kinds, [ShapeKind::Fill]);
    }

    #[test]
    fn oversized_region_falls_back_to_a_dedicated_layer() {
        let mut canvas = Canvas::new();
        canvas.set_dimensions(20_000, 20_000);
        let region = canvas.create_region();
        canvas.add_region(region);
        canvas.set_bounds(region, Bounds::new(0, 0, 10_000, 10_000));

        canvas.set_needs_layer(region, true);
        assert!(canvas.store().needs_layer(region));
        // Too large for the atlas even at maximum size.
        assert_eq!(canvas.layers()[1].len(), 2);
        assert!(canvas.layers()[1][1].regions().contains(&region));
    }

    #[test]
    fn update_time_tracks_delta_and_frames() {
        let mut canvas = Canvas::new();
        canvas.update_time(1.0);
        canvas.update_time(1.25);
        assert_eq!(canvas.delta_time(), 0.25);
        assert_eq!(canvas.frame_count(), 2);

        // Time never runs backwards.
        canvas.update_time(1.0);
        assert_eq!(canvas.delta_time(), 0.0);
        assert_eq!(canvas.time(), 1.0);
    }

    #[test]
    fn set_visible_damages_once_per_change() {
        let (mut canvas, region) = canvas_with_region(50, 50);
        let mut device = TestDevice::default();
        for _ in 0..3 {
            canvas.submit(0, &mut device);
        }

        canvas.set_visible(region, true);
        assert!(canvas.layers()[0][0].current_damage().is_empty());

        canvas.set_visible(region, false);
        assert_eq!(
            canvas.layers()[0][0].current_damage(),
            &[Bounds::new(20, 30, 50, 50)]
        );
    }
}
