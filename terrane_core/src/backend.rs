// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for rendering devices.
//!
//! Terrane splits platform-specific work into *device* crates. The core
//! decides **what** to redraw — damaged areas per layer, scissored shape
//! batches in paint order — and a [`Device`] implementation owns the GPU
//! resources and actually draws.
//!
//! Calls are fire-and-forget and ordered by pass index: the canvas submits
//! intermediate layers at lower pass indices than the layers that sample
//! them, so a device that executes passes in order never reads an
//! unresolved texture.
//!
//! # Crate boundaries
//!
//! `terrane_core` owns the region tree, damage tracking, batching, and this
//! contract module. Device crates depend on `terrane_core` and provide GPU
//! glue. Application code depends on both and wires them together in a frame
//! loop, calling [`Canvas::render`](crate::Canvas::render) once per tick.

use core::fmt;

use crate::batch::{ShapeVertex, SubmitBatch};
use crate::bounds::Bounds;

/// Identifies a render target (a texture or a swapchain surface) owned by
/// the device.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(pub u32);

/// Opaque handle to a platform window supplied by the embedder.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetId({})", self.0)
    }
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WindowHandle({:#x})", self.0)
    }
}

/// Describes the backing store a layer needs from the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetSpec {
    /// Width in physical pixels.
    pub width: i32,
    /// Height in physical pixels.
    pub height: i32,
    /// Whether the target needs an extended-range pixel format.
    pub hdr: bool,
    /// Window to present to; `None` for offscreen intermediate targets.
    pub window: Option<WindowHandle>,
}

/// Executes draw work produced by the canvas.
///
/// Both GPU devices and test doubles implement this trait, enabling generic
/// frame loops and recorded-call assertions.
pub trait Device {
    /// Creates or recreates the backing store for `target` to match `spec`.
    ///
    /// Called lazily before a layer's first submission after its dimensions,
    /// pixel format, or window pairing changed. Idempotent for an unchanged
    /// spec.
    fn ensure_target(&mut self, target: TargetId, spec: &TargetSpec);

    /// Releases the backing store for `target`.
    fn destroy_target(&mut self, target: TargetId);

    /// Clears the given areas of `target` to transparent black.
    fn clear_areas(&mut self, pass: usize, target: TargetId, areas: &[Bounds]);

    /// Draws one batch into `target`, restricted to the scissor rectangles.
    ///
    /// `vertices` holds four vertices per shape in the batch, already
    /// translated into layer space.
    fn submit_batch(
        &mut self,
        pass: usize,
        target: TargetId,
        batch: &SubmitBatch,
        vertices: &[ShapeVertex],
        scissors: &[Bounds],
    );
}
