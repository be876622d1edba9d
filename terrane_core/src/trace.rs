// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the submission loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! submission instrumentation calls at each stage. All method bodies default
//! to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace`
//! feature is **off**, every `Tracer` method compiles to nothing (zero
//! overhead). When **on**, each method performs a single `Option` branch
//! before dispatching.

use crate::backend::TargetId;
use crate::region::RegionId;
use crate::shape::{BlendMode, ShapeKind};

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a frame submission begins.
#[derive(Clone, Copy, Debug)]
pub struct FrameBeginEvent {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Canvas time in seconds.
    pub time: f64,
}

/// Emitted when a layer clears its damaged areas before redrawing.
#[derive(Clone, Copy, Debug)]
pub struct LayerClearEvent {
    /// The layer's render target.
    pub target: TargetId,
    /// Number of rectangles cleared (current damage plus remembered frames).
    pub rects: usize,
}

/// Emitted for each batch handed to the device.
#[derive(Clone, Copy, Debug)]
pub struct BatchSubmitEvent {
    /// The layer's render target.
    pub target: TargetId,
    /// Draw-pipeline category of the batch.
    pub kind: ShapeKind,
    /// Blend mode of the batch.
    pub blend: BlendMode,
    /// Number of shapes in the batch.
    pub shapes: usize,
    /// Number of scissor rectangles the batch is restricted to.
    pub scissors: usize,
}

/// Emitted when a region's own batches are skipped because its extent
/// misses all damaged areas. Its children are still visited.
#[derive(Clone, Copy, Debug)]
pub struct RegionSkippedEvent {
    /// The skipped region.
    pub region: RegionId,
    /// The layer's render target.
    pub target: TargetId,
}

/// Emitted when a packed layer's atlas grows and forces a full repack.
#[derive(Clone, Copy, Debug)]
pub struct AtlasGrowEvent {
    /// The layer's render target.
    pub target: TargetId,
    /// New atlas width.
    pub width: i32,
    /// New atlas height.
    pub height: i32,
}

/// Emitted when a frame submission completes.
#[derive(Clone, Copy, Debug)]
pub struct FrameEndEvent {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Total passes consumed by the frame.
    pub passes: usize,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the submission loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a frame submission begins.
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        _ = e;
    }

    /// Called when a layer clears its damaged areas.
    fn on_layer_clear(&mut self, e: &LayerClearEvent) {
        _ = e;
    }

    /// Called for each batch handed to the device.
    fn on_batch_submit(&mut self, e: &BatchSubmitEvent) {
        _ = e;
    }

    /// Called when a region is skipped during submission.
    fn on_region_skipped(&mut self, e: &RegionSkippedEvent) {
        _ = e;
    }

    /// Called when a packed layer's atlas grows.
    fn on_atlas_grow(&mut self, e: &AtlasGrowEvent) {
        _ = e;
    }

    /// Called when a frame submission completes.
    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        _ = e;
    }
}

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing.
/// When **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`FrameBeginEvent`].
    #[inline]
    pub fn frame_begin(&mut self, e: &FrameBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LayerClearEvent`].
    #[inline]
    pub fn layer_clear(&mut self, e: &LayerClearEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_layer_clear(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`BatchSubmitEvent`].
    #[inline]
    pub fn batch_submit(&mut self, e: &BatchSubmitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_batch_submit(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RegionSkippedEvent`].
    #[inline]
    pub fn region_skipped(&mut self, e: &RegionSkippedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_region_skipped(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`AtlasGrowEvent`].
    #[inline]
    pub fn atlas_grow(&mut self, e: &AtlasGrowEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_atlas_grow(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameEndEvent`].
    #[inline]
    pub fn frame_end(&mut self, e: &FrameEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}
