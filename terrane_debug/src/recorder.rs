// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event-collecting trace sink.

use terrane_core::trace::{
    AtlasGrowEvent, BatchSubmitEvent, FrameBeginEvent, FrameEndEvent, LayerClearEvent,
    RegionSkippedEvent, TraceSink,
};

/// One recorded submission-loop event.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A frame submission began.
    FrameBegin(FrameBeginEvent),
    /// A layer cleared its damaged areas.
    LayerClear(LayerClearEvent),
    /// A batch was handed to the device.
    BatchSubmit(BatchSubmitEvent),
    /// A region was skipped for missing all damage.
    RegionSkipped(RegionSkippedEvent),
    /// A packed atlas grew.
    AtlasGrow(AtlasGrowEvent),
    /// A frame submission completed.
    FrameEnd(FrameEndEvent),
}

/// A [`TraceSink`] that keeps every event in order.
#[derive(Debug, Default)]
pub struct RecorderSink {
    events: Vec<RecordedEvent>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Consumes the recorder, returning the events.
    #[must_use]
    pub fn into_events(self) -> Vec<RecordedEvent> {
        self.events
    }

    /// Number of completed frames seen.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, RecordedEvent::FrameEnd(_)))
            .count()
    }

    /// Drops all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        self.events.push(RecordedEvent::FrameBegin(*e));
    }

    fn on_layer_clear(&mut self, e: &LayerClearEvent) {
        self.events.push(RecordedEvent::LayerClear(*e));
    }

    fn on_batch_submit(&mut self, e: &BatchSubmitEvent) {
        self.events.push(RecordedEvent::BatchSubmit(*e));
    }

    fn on_region_skipped(&mut self, e: &RegionSkippedEvent) {
        self.events.push(RecordedEvent::RegionSkipped(*e));
    }

    fn on_atlas_grow(&mut self, e: &AtlasGrowEvent) {
        self.events.push(RecordedEvent::AtlasGrow(*e));
    }

    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        self.events.push(RecordedEvent::FrameEnd(*e));
    }
}
