// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Region tree, damage tracking, and shape batching for retained-mode 2D
//! compositing.
//!
//! `terrane_core` owns the CPU side of a partial-redraw compositor: a tree
//! of rectangular regions holding batched draw primitives, per-layer damage
//! rectangles with multi-frame memory, and a packed texture atlas for
//! regions promoted to their own layer. It is `no_std` compatible (with
//! `alloc`) and uses array-based struct-of-arrays storage with generational
//! index handles for cache-friendly traversal.
//!
//! # Architecture
//!
//! Each frame flows from damage accumulation to ordered device passes:
//!
//! ```text
//!   Canvas::invalidate_rect_in_region() ──► per-Layer damage rects
//!                                               │
//!   Canvas::begin_region()/draw ops ──► ShapeBatcher (per region)
//!                                               │
//!                 ┌─────────────────────────────┘
//!                 ▼
//!   Canvas::submit() ──► Layer::submit() (deepest first)
//!                            │
//!                            ▼
//!          Device::clear_areas() + Device::submit_batch()
//! ```
//!
//! **[`region`]** — Struct-of-arrays region tree with generational handles.
//! Ordered children draw back-to-front; attachment to the canvas propagates
//! through the tree.
//!
//! **[`layer`]** — Per-target damage tracking with a configurable memory of
//! previous frames' damage, and the submission walk that turns regions into
//! scissored batches.
//!
//! **[`canvas`]** — The orchestrator: saved/restored draw state, region
//! management, layer promotion, and the frame driver.
//!
//! **[`shape`]** / **[`batch`]** — The closed primitive set and the batcher
//! that groups consecutive same-kind, same-blend shapes for submission.
//!
//! **[`atlas`]** — Best-fit rectangle packing with removal, coalescing, and
//! bounded growth, used to share one texture among promoted regions.
//!
//! **[`backend`]** — The [`Device`](backend::Device) trait that GPU
//! backends implement to execute clears and batch draws.
//!
//! **[`bounds`]** / **[`color`]** — Integer pixel rectangles and packed
//! per-corner quad colors.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types
//! for submission instrumentation, with zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one
//!   branch per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod atlas;
pub mod backend;
pub mod batch;
pub mod bounds;
pub mod canvas;
pub mod color;
pub mod layer;
pub mod region;
pub mod shape;
pub mod trace;

pub use canvas::Canvas;
pub use layer::{DamageMemory, Layer};
pub use region::{RegionId, RegionStore};
