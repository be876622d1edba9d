// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording trace sinks and device doubles for terrane diagnostics.
//!
//! This crate provides std-side test and inspection tooling:
//!
//! - [`recorder::RecorderSink`] — a
//!   [`TraceSink`](terrane_core::trace::TraceSink) that keeps every event
//!   for later assertions or pretty-printing.
//! - [`device::RecordingDevice`] — a
//!   [`Device`](terrane_core::backend::Device) that records clears and
//!   batch submissions per pass instead of touching a GPU.

pub mod device;
pub mod recorder;

#[cfg(test)]
mod pipeline;
