// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The region tree.
//!
//! A region is a rectangular subtree node of the scene: it has
//! parent-relative bounds, a visibility flag, an ordered list of children
//! (back-to-front draw order), and a batch of shapes drawn into it this
//! frame. Regions live in a [`RegionStore`] and are addressed by
//! generational [`RegionId`] handles.
//!
//! The store is pure structure. Damage propagation, layer promotion, and
//! device submission are orchestrated by [`Canvas`](crate::Canvas).

mod id;
mod store;
mod traverse;

pub use id::RegionId;
pub use store::RegionStore;
pub use traverse::Children;
