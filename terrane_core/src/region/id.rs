// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Region identity.

use core::fmt;

/// Sentinel value meaning "no region" in index fields.
pub(crate) const INVALID: u32 = u32::MAX;

/// A handle to a region in a [`RegionStore`](super::RegionStore).
///
/// Carries a slot index plus a generation counter, so handles left over
/// from a destroyed region fail validation instead of silently addressing
/// whatever reused the slot. A handle is stable for the region's whole
/// lifetime.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId {
    /// Slot index into the store's arrays.
    pub(crate) idx: u32,
    /// Generation counter, must match the store's counter for the slot.
    pub(crate) generation: u32,
}

impl RegionId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionId({}@gen{})", self.idx, self.generation)
    }
}
