// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, RegionId};
use super::store::RegionStore;

/// An iterator over the direct children of a region, in draw order
/// (back-to-front).
///
/// Created by [`RegionStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a RegionStore,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a RegionStore, first: u32) -> Self {
        Self {
            store,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = RegionId;

    fn next(&mut self) -> Option<RegionId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.store.next_sibling[idx as usize];
        Some(RegionId {
            idx,
            generation: self.store.generation[idx as usize],
        })
    }
}
