// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integration tests driving the full invalidate → batch → submit pipeline.

use terrane_core::Canvas;
use terrane_core::backend::WindowHandle;
use terrane_core::bounds::Bounds;
use terrane_core::region::RegionId;
use terrane_core::shape::ShapeKind;
use terrane_core::trace::Tracer;

use crate::device::{DeviceCall, RecordingDevice};
use crate::recorder::{RecordedEvent, RecorderSink};

fn paired_canvas() -> Canvas {
    let mut canvas = Canvas::new();
    canvas.pair_to_window(WindowHandle(0x1), 400, 300);
    canvas
}

fn filled_region(canvas: &mut Canvas, bounds: Bounds) -> RegionId {
    let region = canvas.create_region();
    canvas.add_region(region);
    canvas.set_bounds(region, bounds);
    canvas.begin_region(region);
    canvas.fill(0.0, 0.0, bounds.width as f32, bounds.height as f32);
    canvas.end_region();
    region
}

/// Renders until the composite damage memory drains.
fn settle(canvas: &mut Canvas, device: &mut RecordingDevice) {
    for _ in 0..4 {
        canvas.submit(0, device);
    }
    device.clear();
}

#[test]
fn first_frame_ensures_clears_then_draws() {
    let mut canvas = paired_canvas();
    filled_region(&mut canvas, Bounds::new(10, 10, 50, 50));

    let mut device = RecordingDevice::new();
    let passes = canvas.render(0.016, &mut device);
    assert_eq!(passes, 1);

    let kinds: Vec<_> = device
        .calls()
        .iter()
        .map(|call| match call {
            DeviceCall::EnsureTarget { .. } => "ensure",
            DeviceCall::DestroyTarget { .. } => "destroy",
            DeviceCall::ClearAreas { .. } => "clear",
            DeviceCall::SubmitBatch { .. } => "batch",
        })
        .collect();
    assert_eq!(kinds, ["ensure", "clear", "batch"]);
}

#[test]
fn damage_memory_drains_after_two_quiet_frames() {
    let mut canvas = paired_canvas();
    let region = filled_region(&mut canvas, Bounds::new(10, 10, 50, 50));
    let mut device = RecordingDevice::new();
    settle(&mut canvas, &mut device);

    canvas.invalidate_rect_in_region(region, Bounds::new(0, 0, 10, 10));
    // The damaged frame plus two remembered frames redraw, then quiet.
    for expected_clears in [1, 1, 1, 0, 0] {
        device.clear();
        canvas.submit(0, &mut device);
        assert_eq!(device.clears().len(), expected_clears);
    }
}

#[test]
fn promoted_region_resolves_before_its_consumer() {
    let mut canvas = paired_canvas();
    let region = filled_region(&mut canvas, Bounds::new(10, 10, 50, 50));
    canvas.set_needs_layer(region, true);
    let intermediate_target = canvas.layers()[1][0].target();

    let mut device = RecordingDevice::new();
    canvas.submit(0, &mut device);

    let batches = device.batches();
    let fill = batches
        .iter()
        .find(|(_, _, kind)| *kind == ShapeKind::Fill)
        .expect("region content batch");
    let sample = batches
        .iter()
        .find(|(_, _, kind)| *kind == ShapeKind::Sample)
        .expect("sampled quad batch");
    assert_eq!(fill.1, intermediate_target);
    assert_ne!(sample.1, intermediate_target);
    assert!(fill.0 < sample.0);
}

#[test]
fn damage_in_a_promoted_region_reaches_both_targets() {
    let mut canvas = paired_canvas();
    let region = filled_region(&mut canvas, Bounds::new(10, 10, 50, 50));
    canvas.set_needs_layer(region, true);
    let intermediate_target = canvas.layers()[1][0].target();
    let composite_target = canvas.layers()[0][0].target();

    let mut device = RecordingDevice::new();
    settle(&mut canvas, &mut device);

    canvas.invalidate_rect_in_region(region, Bounds::new(5, 5, 10, 10));
    canvas.submit(0, &mut device);

    let cleared: Vec<_> = device.clears().iter().map(|c| c.1).collect();
    assert!(cleared.contains(&intermediate_target));
    assert!(cleared.contains(&composite_target));
}

#[test]
fn child_past_its_parent_footprint_is_redrawn() {
    let mut canvas = paired_canvas();
    let parent = filled_region(&mut canvas, Bounds::new(0, 0, 50, 50));
    let child = canvas.create_region();
    canvas.add_region_to(parent, child);
    canvas.set_bounds(child, Bounds::new(60, 0, 20, 20));
    canvas.begin_region(child);
    canvas.fill(0.0, 0.0, 20.0, 20.0);
    canvas.end_region();

    let mut device = RecordingDevice::new();
    settle(&mut canvas, &mut device);

    // The child sits entirely outside its parent's 50x50 footprint; its
    // damage must still be redrawn after the composite clears it.
    canvas.invalidate_rect_in_region(child, Bounds::new(0, 0, 20, 20));
    canvas.submit(0, &mut device);
    assert_eq!(device.clears().len(), 1);
    assert_eq!(device.batches().len(), 1);
}

#[test]
fn atlas_growth_is_traced_at_submission() {
    let mut canvas = paired_canvas();
    let first = filled_region(&mut canvas, Bounds::new(0, 0, 300, 300));
    let second = filled_region(&mut canvas, Bounds::new(0, 0, 300, 300));
    // Two 300x300 slots cannot share the initial atlas.
    canvas.set_needs_layer(first, true);
    canvas.set_needs_layer(second, true);

    let mut sink = RecorderSink::new();
    let mut device = RecordingDevice::new();
    canvas.update_time(0.016);
    canvas.submit_traced(0, &mut device, &mut Tracer::new(&mut sink));

    assert!(
        sink.events()
            .iter()
            .any(|e| matches!(e, RecordedEvent::AtlasGrow(_)))
    );
}

#[test]
fn trace_records_the_frame_lifecycle() {
    let mut canvas = paired_canvas();
    filled_region(&mut canvas, Bounds::new(10, 10, 50, 50));

    let mut sink = RecorderSink::new();
    let mut device = RecordingDevice::new();
    canvas.update_time(0.016);
    canvas.submit_traced(0, &mut device, &mut Tracer::new(&mut sink));

    let events = sink.events();
    assert!(matches!(events.first(), Some(RecordedEvent::FrameBegin(_))));
    assert!(matches!(events.last(), Some(RecordedEvent::FrameEnd(_))));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, RecordedEvent::LayerClear(_)))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, RecordedEvent::BatchSubmit(_)))
    );
}

#[test]
fn undamaged_region_is_skipped_and_traced() {
    let mut canvas = paired_canvas();
    let damaged = filled_region(&mut canvas, Bounds::new(0, 0, 50, 50));
    let quiet = filled_region(&mut canvas, Bounds::new(200, 200, 50, 50));

    let mut device = RecordingDevice::new();
    settle(&mut canvas, &mut device);

    canvas.invalidate_rect_in_region(damaged, Bounds::new(0, 0, 10, 10));
    let mut sink = RecorderSink::new();
    canvas.submit_traced(0, &mut device, &mut Tracer::new(&mut sink));

    assert!(sink.events().iter().any(|e| matches!(
        e,
        RecordedEvent::RegionSkipped(skip) if skip.region == quiet
    )));
    assert_eq!(device.batches().len(), 1);
}

#[test]
fn detached_drawing_appears_once_attached() {
    let mut canvas = paired_canvas();
    let mut device = RecordingDevice::new();
    settle(&mut canvas, &mut device);

    let region = canvas.create_region();
    canvas.set_bounds(region, Bounds::new(10, 10, 40, 40));
    canvas.begin_region(region);
    canvas.circle(0.0, 0.0, 40.0);
    canvas.end_region();

    canvas.submit(0, &mut device);
    assert!(device.batches().is_empty());

    canvas.add_region(region);
    canvas.submit(0, &mut device);
    assert!(
        device
            .batches()
            .iter()
            .any(|(_, _, kind)| *kind == ShapeKind::Circle)
    );
}

#[test]
fn same_size_resize_recreates_nothing() {
    let mut canvas = paired_canvas();
    let region = filled_region(&mut canvas, Bounds::new(10, 10, 50, 50));
    let mut device = RecordingDevice::new();
    settle(&mut canvas, &mut device);

    canvas.set_dimensions(400, 300);
    canvas.invalidate_rect_in_region(region, Bounds::new(0, 0, 5, 5));
    canvas.submit(0, &mut device);
    assert!(device.ensured_targets().is_empty());
}

#[test]
fn save_restore_survives_region_redraw() {
    let mut canvas = paired_canvas();
    let outer = filled_region(&mut canvas, Bounds::new(0, 0, 100, 100));
    let inner = canvas.create_region();
    canvas.add_region_to(outer, inner);
    canvas.set_bounds(inner, Bounds::new(10, 10, 20, 20));

    canvas.set_position(7.0, 9.0);
    canvas.begin_region(inner);
    canvas.fill(1.0, 1.0, 5.0, 5.0);
    canvas.end_region();

    // The inner redraw did not disturb the outer offset.
    canvas.begin_region(outer);
    canvas.fill(0.0, 0.0, 1.0, 1.0);
    canvas.end_region();

    let shape = canvas.store().batcher(inner).batches()[0].shapes[0];
    assert_eq!((shape.x, shape.y), (1.0, 1.0));
}
