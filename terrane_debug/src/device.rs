// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Call-recording device double.

use terrane_core::backend::{Device, TargetId, TargetSpec};
use terrane_core::batch::{ShapeVertex, SubmitBatch};
use terrane_core::bounds::Bounds;
use terrane_core::shape::{BlendMode, ShapeKind};

/// One recorded device call.
#[derive(Clone, Debug)]
pub enum DeviceCall {
    /// A target was created or recreated.
    EnsureTarget {
        /// The target.
        target: TargetId,
        /// The requested backing store.
        spec: TargetSpec,
    },
    /// A target was released.
    DestroyTarget {
        /// The target.
        target: TargetId,
    },
    /// Areas of a target were cleared.
    ClearAreas {
        /// Pass index.
        pass: usize,
        /// The target.
        target: TargetId,
        /// Cleared rectangles.
        areas: Vec<Bounds>,
    },
    /// A batch was drawn.
    SubmitBatch {
        /// Pass index.
        pass: usize,
        /// The target.
        target: TargetId,
        /// Draw-pipeline category of the batch.
        kind: ShapeKind,
        /// Blend mode of the batch.
        blend: BlendMode,
        /// Emitted vertices, four per shape.
        vertices: Vec<ShapeVertex>,
        /// Scissor rectangles.
        scissors: Vec<Bounds>,
    },
}

/// A [`Device`] that records every call instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
}

impl RecordingDevice {
    /// Creates an empty recording device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded calls, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// The batch submissions only, as `(pass, target, kind)`.
    #[must_use]
    pub fn batches(&self) -> Vec<(usize, TargetId, ShapeKind)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::SubmitBatch {
                    pass,
                    target,
                    kind,
                    ..
                } => Some((*pass, *target, *kind)),
                _ => None,
            })
            .collect()
    }

    /// The clear calls only, as `(pass, target, areas)`.
    #[must_use]
    pub fn clears(&self) -> Vec<(usize, TargetId, Vec<Bounds>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::ClearAreas {
                    pass,
                    target,
                    areas,
                } => Some((*pass, *target, areas.clone())),
                _ => None,
            })
            .collect()
    }

    /// Targets that were ensured, in order, with repeats.
    #[must_use]
    pub fn ensured_targets(&self) -> Vec<TargetId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::EnsureTarget { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    /// Drops all recorded calls.
    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Device for RecordingDevice {
    fn ensure_target(&mut self, target: TargetId, spec: &TargetSpec) {
        self.calls.push(DeviceCall::EnsureTarget {
            target,
            spec: *spec,
        });
    }

    fn destroy_target(&mut self, target: TargetId) {
        self.calls.push(DeviceCall::DestroyTarget { target });
    }

    fn clear_areas(&mut self, pass: usize, target: TargetId, areas: &[Bounds]) {
        self.calls.push(DeviceCall::ClearAreas {
            pass,
            target,
            areas: areas.to_vec(),
        });
    }

    fn submit_batch(
        &mut self,
        pass: usize,
        target: TargetId,
        batch: &SubmitBatch,
        vertices: &[ShapeVertex],
        scissors: &[Bounds],
    ) {
        self.calls.push(DeviceCall::SubmitBatch {
            pass,
            target,
            kind: batch.kind,
            blend: batch.blend,
            vertices: vertices.to_vec(),
            scissors: scissors.to_vec(),
        });
    }
}
