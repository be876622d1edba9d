// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer damage tracking and submission.
//!
//! A [`Layer`] is one render target's worth of work: it knows which areas of
//! its target are stale, which regions draw into it, and how to turn both
//! into scissored device calls. The composite layer is paired to a window;
//! intermediate layers back promoted regions, usually packing several of
//! them into one texture atlas.
//!
//! # Damage memory
//!
//! Presentation double- or triple-buffers the target, so the buffer being
//! drawn this frame was last touched several frames ago. A layer therefore
//! remembers the damage of the previous [`DamageMemory`] frames and redraws
//! the union of the current and remembered rectangles. The rectangle lists
//! are coarse by design: overlapping rectangles repaint some pixels twice,
//! which is cheaper than maintaining an exact region union.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::atlas::{AtlasFull, PackedAtlas};
use crate::backend::{Device, TargetId, TargetSpec, WindowHandle};
use crate::batch::{ShapeBatcher, ShapeVertex};
use crate::bounds::Bounds;
use crate::region::{RegionId, RegionStore};
use crate::trace::{
    AtlasGrowEvent, BatchSubmitEvent, LayerClearEvent, RegionSkippedEvent, Tracer,
};

/// Initial edge length of a packed layer's atlas.
const ATLAS_INITIAL_SIZE: i32 = 512;

/// Hard upper bound on a packed atlas edge.
const ATLAS_MAX_SIZE: i32 = 8192;

/// How many previous frames of damage a layer remembers.
///
/// The right depth depends on the presentation strategy: a double-buffered
/// swapchain needs the previous frame, a triple-buffered one the previous
/// two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DamageMemory(usize);

impl DamageMemory {
    /// Remembers the two previous frames; safe for swapchains up to three
    /// buffers deep.
    pub const DOUBLE_BUFFERED: Self = Self(2);

    /// Remembers no previous frames; only valid when the target is a single
    /// persistent texture (intermediate layers rendered in place).
    pub const SINGLE: Self = Self(0);

    /// Creates a memory of `frames` previous frames.
    #[must_use]
    pub const fn new(frames: usize) -> Self {
        Self(frames)
    }

    /// The number of previous frames remembered.
    #[must_use]
    pub const fn frames(self) -> usize {
        self.0
    }
}

impl Default for DamageMemory {
    fn default() -> Self {
        Self::DOUBLE_BUFFERED
    }
}

/// One render target's damage state, owned regions, and submission logic.
#[derive(Debug)]
pub struct Layer {
    width: i32,
    height: i32,
    hdr: bool,
    window: Option<WindowHandle>,
    target: TargetId,
    target_ready: bool,
    regions: Vec<RegionId>,
    atlas: Option<PackedAtlas<RegionId>>,
    pending_grow: bool,
    invalid_rects: Vec<Bounds>,
    history: VecDeque<Vec<Bounds>>,
    memory: DamageMemory,
}

impl Layer {
    /// Creates the composite layer: draws the region tree at its tree
    /// positions, pairs to a window.
    #[must_use]
    pub fn composite(target: TargetId, memory: DamageMemory) -> Self {
        Self::bare(target, memory, None)
    }

    /// Creates a packed intermediate layer: promoted regions share one
    /// atlas texture.
    #[must_use]
    pub fn packed(target: TargetId, memory: DamageMemory) -> Self {
        let atlas = PackedAtlas::new(
            ATLAS_INITIAL_SIZE,
            ATLAS_INITIAL_SIZE,
            ATLAS_MAX_SIZE,
            ATLAS_MAX_SIZE,
        );
        let mut layer = Self::bare(target, memory, Some(atlas));
        layer.width = ATLAS_INITIAL_SIZE;
        layer.height = ATLAS_INITIAL_SIZE;
        layer
    }

    /// Creates a dedicated intermediate layer for a single region too large
    /// to pack.
    #[must_use]
    pub fn dedicated(target: TargetId, memory: DamageMemory) -> Self {
        Self::bare(target, memory, None)
    }

    fn bare(target: TargetId, memory: DamageMemory, atlas: Option<PackedAtlas<RegionId>>) -> Self {
        Self {
            width: 0,
            height: 0,
            hdr: false,
            window: None,
            target,
            target_ready: false,
            regions: Vec::new(),
            atlas,
            pending_grow: false,
            invalid_rects: Vec::new(),
            history: VecDeque::new(),
            memory,
        }
    }

    // -- Accessors --

    /// The layer's render target.
    #[must_use]
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Width in physical pixels.
    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in physical pixels.
    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Whether the layer presents to a window.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.window.is_some()
    }

    /// Whether the layer packs promoted regions into an atlas.
    #[must_use]
    pub fn is_packing(&self) -> bool {
        self.atlas.is_some()
    }

    /// The regions that draw directly into this layer.
    #[must_use]
    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    /// The damage accumulated since the last submission.
    #[must_use]
    pub fn current_damage(&self) -> &[Bounds] {
        &self.invalid_rects
    }

    /// Current damage plus all remembered frames' damage; what the next
    /// submission will redraw. Coarse: rectangles may overlap.
    #[must_use]
    pub fn damaged_areas(&self) -> Vec<Bounds> {
        let mut areas = self.invalid_rects.clone();
        for frame in &self.history {
            areas.extend_from_slice(frame);
        }
        areas
    }

    // -- Damage --

    /// Marks the whole layer stale.
    pub fn invalidate(&mut self) {
        if self.width <= 0 || self.height <= 0 {
            return;
        }
        self.invalid_rects.clear();
        self.invalid_rects
            .push(Bounds::new(0, 0, self.width, self.height));
    }

    /// Marks a rectangle stale. Clipped to the layer; a rectangle entirely
    /// outside is a no-op.
    ///
    /// Accumulation is O(rects), not an exact union: a rectangle already
    /// covered by an existing one is dropped, and existing rectangles
    /// covered by the new one are removed, but partial overlaps are kept
    /// as-is.
    pub fn invalidate_rect(&mut self, rect: Bounds) {
        let Some(rect) = rect.intersection(Bounds::new(0, 0, self.width, self.height)) else {
            return;
        };
        if self.invalid_rects.iter().any(|r| r.contains(rect)) {
            return;
        }
        self.invalid_rects.retain(|r| !rect.contains(*r));
        self.invalid_rects.push(rect);
    }

    // -- Target configuration --

    /// Resizes the layer. Same size is a no-op; otherwise the backing
    /// target is recreated lazily and the whole layer is stale.
    pub fn set_dimensions(&mut self, width: i32, height: i32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.target_ready = false;
        self.history.clear();
        self.invalidate();
    }

    /// Switches the target's pixel format between standard and extended
    /// range.
    pub fn set_hdr(&mut self, hdr: bool) {
        if hdr == self.hdr {
            return;
        }
        self.hdr = hdr;
        self.target_ready = false;
        self.invalidate();
    }

    /// Pairs the layer to a platform window.
    pub fn pair_to_window(&mut self, window: WindowHandle) {
        self.window = Some(window);
        self.target_ready = false;
        self.invalidate();
    }

    /// Unpairs the layer from its window.
    pub fn remove_from_window(&mut self) {
        self.window = None;
        self.target_ready = false;
    }

    // -- Region membership --

    /// Adds a region drawn at its tree position.
    ///
    /// # Panics
    ///
    /// Panics if the region is already owned by this layer.
    pub fn add_region(&mut self, region: RegionId) {
        assert!(
            !self.regions.contains(&region),
            "region already owned by this layer"
        );
        self.regions.push(region);
    }

    /// Removes a region (and its atlas slot, if packed). Returns whether it
    /// was owned.
    pub fn remove_region(&mut self, region: RegionId) -> bool {
        if let Some(atlas) = &mut self.atlas {
            atlas.remove(region);
        }
        let before = self.regions.len();
        self.regions.retain(|&r| r != region);
        self.regions.len() != before
    }

    /// Adds a region into the atlas, growing it as needed.
    ///
    /// Growth repacks every slot, so all previously returned coordinates
    /// are stale and the layer is fully invalidated; the grow is reported
    /// on the next traced submission. Fails only when the region cannot
    /// fit even at the maximum atlas size.
    ///
    /// # Panics
    ///
    /// Panics if this layer has no atlas.
    pub fn add_packed_region(
        &mut self,
        region: RegionId,
        width: i32,
        height: i32,
    ) -> Result<Bounds, AtlasFull> {
        let Some(atlas) = &mut self.atlas else {
            panic!("add_packed_region on a layer without an atlas");
        };
        let result = loop {
            match atlas.add(region, width, height) {
                Ok(slot) => break Ok(slot),
                Err(AtlasFull) => {
                    if atlas.grow().is_err() {
                        break Err(AtlasFull);
                    }
                }
            }
        };
        // Growth repacks even on an eventual failure, so the dimensions must
        // stay in sync either way.
        let (atlas_width, atlas_height) = (atlas.width(), atlas.height());
        if atlas_width != self.width || atlas_height != self.height {
            self.width = atlas_width;
            self.height = atlas_height;
            self.target_ready = false;
            self.pending_grow = true;
            self.history.clear();
            self.invalidate();
        }
        if result.is_ok() {
            self.regions.push(region);
        }
        result
    }

    /// Removes a region's atlas slot and ownership. Returns whether it was
    /// packed.
    pub fn remove_packed_region(&mut self, region: RegionId) -> bool {
        self.remove_region(region)
    }

    /// Where a packed region sits in the atlas, if it is packed here.
    #[must_use]
    pub fn coordinates_for_region(&self, region: RegionId) -> Option<Bounds> {
        self.atlas.as_ref()?.coordinates_for(region)
    }

    // -- Submission --

    /// Ensures the backing target exists and matches the current
    /// dimensions, pairing, and pixel format. Idempotent.
    pub fn check_frame_buffer(&mut self, device: &mut dyn Device) {
        if self.target_ready || self.width <= 0 || self.height <= 0 {
            return;
        }
        device.ensure_target(
            self.target,
            &TargetSpec {
                width: self.width,
                height: self.height,
                hdr: self.hdr,
                window: self.window,
            },
        );
        self.target_ready = true;
    }

    /// Clears every damaged area (current frame plus remembered frames) to
    /// transparent black.
    pub fn clear_invalid_rect_areas(
        &self,
        pass: usize,
        device: &mut dyn Device,
        tracer: &mut Tracer<'_>,
    ) {
        let areas = self.damaged_areas();
        if areas.is_empty() {
            return;
        }
        tracer.layer_clear(&LayerClearEvent {
            target: self.target,
            rects: areas.len(),
        });
        device.clear_areas(pass, self.target, &areas);
    }

    /// Redraws the damaged areas of this layer and returns the next pass
    /// index.
    ///
    /// Walks owned regions back-to-front, recursing through sub-regions.
    /// Promoted sub-regions draw their sampled quad instead of their
    /// content. A region whose extent misses every damaged area skips its
    /// own batches, but its children are still visited: a child's bounds
    /// may lie outside its parent's footprint. Every batch is scissored to
    /// its intersections with the damage.
    ///
    /// A layer with nothing to redraw (or non-positive dimensions) consumes
    /// no pass. Otherwise the current damage rolls into the history and the
    /// oldest remembered frame is evicted.
    pub fn submit(
        &mut self,
        pass: usize,
        device: &mut dyn Device,
        store: &RegionStore,
        tracer: &mut Tracer<'_>,
    ) -> usize {
        if self.width <= 0 || self.height <= 0 {
            return pass;
        }
        let damage = self.damaged_areas();
        if damage.is_empty() {
            return pass;
        }

        self.check_frame_buffer(device);
        if self.pending_grow {
            tracer.atlas_grow(&AtlasGrowEvent {
                target: self.target,
                width: self.width,
                height: self.height,
            });
            self.pending_grow = false;
        }
        self.clear_invalid_rect_areas(pass, device, tracer);

        for &region in &self.regions {
            // Packed regions draw at their atlas slot; the composite root and
            // dedicated-layer regions draw at the target's origin.
            let origin = self
                .coordinates_for_region(region)
                .map_or((0, 0), |slot| (slot.x, slot.y));
            self.submit_region(store, region, origin.0, origin.1, &damage, pass, device, tracer);
        }

        self.roll_history();
        pass + 1
    }

    fn roll_history(&mut self) {
        let current = core::mem::take(&mut self.invalid_rects);
        self.history.push_back(current);
        while self.history.len() > self.memory.frames() {
            self.history.pop_front();
        }
    }

    fn submit_region(
        &self,
        store: &RegionStore,
        region: RegionId,
        x: i32,
        y: i32,
        damage: &[Bounds],
        pass: usize,
        device: &mut dyn Device,
        tracer: &mut Tracer<'_>,
    ) {
        if !store.visible(region) {
            return;
        }
        let bounds = store.bounds(region);
        let extent = Bounds::new(x, y, bounds.width, bounds.height);
        let scissors: Vec<Bounds> = damage
            .iter()
            .filter_map(|d| d.intersection(extent))
            .collect();
        if scissors.is_empty() {
            // Only this region's batches are skipped; children can overlap
            // the damage from outside the parent's extent.
            tracer.region_skipped(&RegionSkippedEvent {
                region,
                target: self.target,
            });
        } else {
            self.submit_batches(store.batcher(region), x, y, &scissors, pass, device, tracer);
        }

        for child in store.children(region) {
            let child_bounds = store.bounds(child);
            let (cx, cy) = (x + child_bounds.x, y + child_bounds.y);
            if let Some(companion) = store.intermediate(child) {
                // Promoted: the subtree's pixels live in another layer; draw
                // the quad that samples them.
                if !store.visible(child) {
                    continue;
                }
                let child_extent = Bounds::new(cx, cy, child_bounds.width, child_bounds.height);
                let child_scissors: Vec<Bounds> = damage
                    .iter()
                    .filter_map(|d| d.intersection(child_extent))
                    .collect();
                if child_scissors.is_empty() {
                    tracer.region_skipped(&RegionSkippedEvent {
                        region: child,
                        target: self.target,
                    });
                    continue;
                }
                self.submit_batches(
                    store.batcher(companion),
                    cx,
                    cy,
                    &child_scissors,
                    pass,
                    device,
                    tracer,
                );
            } else {
                self.submit_region(store, child, cx, cy, damage, pass, device, tracer);
            }
        }
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "layer offsets are pixel-sized and fit in f32"
    )]
    fn submit_batches(
        &self,
        batcher: &ShapeBatcher,
        x: i32,
        y: i32,
        scissors: &[Bounds],
        pass: usize,
        device: &mut dyn Device,
        tracer: &mut Tracer<'_>,
    ) {
        let mut vertices: Vec<ShapeVertex> = Vec::new();
        for batch in batcher.batches() {
            if batch.shapes.is_empty() {
                continue;
            }
            vertices.clear();
            batch.write_vertices_at(x as f32, y as f32, &mut vertices);
            tracer.batch_submit(&BatchSubmitEvent {
                target: self.target,
                kind: batch.kind,
                blend: batch.blend,
                shapes: batch.shapes.len(),
                scissors: scissors.len(),
            });
            device.submit_batch(pass, self.target, batch, &vertices, scissors);
        }
    }
}
