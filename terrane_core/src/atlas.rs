// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic rectangle packing for shared off-screen targets.
//!
//! A [`PackedAtlas`] subdivides one texture among many keyed slots so that
//! small off-screen regions share a single render target. Packing is
//! guillotine-style over an explicit free list: insertion picks the
//! smallest free rectangle that fits (best fit by area, ties broken in
//! top-left scan order for determinism) and splits the remainder; removal
//! returns the slot to the free list and opportunistically merges adjacent
//! free rectangles.
//!
//! Insertion failure is reported, never absorbed: the caller decides whether
//! to [`grow`](PackedAtlas::grow) the atlas or fall back to a dedicated
//! target.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::bounds::Bounds;

/// Gap kept between slots so bilinear sampling never bleeds across them.
const SLOT_PADDING: i32 = 1;

/// The atlas has no free rectangle large enough for the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasFull;

impl fmt::Display for AtlasFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no atlas slot large enough for the requested rectangle")
    }
}

impl core::error::Error for AtlasFull {}

/// A bin-packed mapping from opaque keys to texture-space rectangles.
#[derive(Clone, Debug)]
pub struct PackedAtlas<K> {
    width: i32,
    height: i32,
    max_width: i32,
    max_height: i32,
    free: Vec<Bounds>,
    slots: BTreeMap<K, Bounds>,
}

impl<K: Copy + Ord> PackedAtlas<K> {
    /// Creates an empty atlas with initial and maximum dimensions.
    ///
    /// # Panics
    ///
    /// Panics if any dimension is non-positive or the maximum is smaller
    /// than the initial size.
    #[must_use]
    pub fn new(width: i32, height: i32, max_width: i32, max_height: i32) -> Self {
        assert!(width > 0 && height > 0, "atlas dimensions must be positive");
        assert!(
            max_width >= width && max_height >= height,
            "atlas maximum must cover the initial size"
        );
        let mut free = Vec::new();
        free.push(Bounds::new(0, 0, width, height));
        Self {
            width,
            height,
            max_width,
            max_height,
            free,
            slots: BTreeMap::new(),
        }
    }

    /// Current atlas width.
    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Current atlas height.
    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of live slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the atlas holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The usable rectangle last assigned to `key`, if present.
    #[must_use]
    pub fn coordinates_for(&self, key: K) -> Option<Bounds> {
        self.slots.get(&key).map(|slot| {
            Bounds::new(
                slot.x,
                slot.y,
                slot.width - SLOT_PADDING,
                slot.height - SLOT_PADDING,
            )
        })
    }

    /// The live `(key, usable rectangle)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (K, Bounds)> + '_ {
        self.slots.keys().map(|&key| {
            (
                key,
                self.coordinates_for(key)
                    .expect("key taken from the slot map"),
            )
        })
    }

    /// Assigns a rectangle of the given size to `key`.
    ///
    /// Returns the usable rectangle on success. On [`AtlasFull`] the atlas
    /// is unchanged; the caller must [`grow`](Self::grow) or place the key
    /// elsewhere.
    ///
    /// # Panics
    ///
    /// Panics if `key` already has a slot or the requested size is empty.
    pub fn add(&mut self, key: K, width: i32, height: i32) -> Result<Bounds, AtlasFull> {
        assert!(
            !self.slots.contains_key(&key),
            "key already packed in this atlas"
        );
        assert!(width > 0 && height > 0, "packed size must be positive");

        let padded_width = width + SLOT_PADDING;
        let padded_height = height + SLOT_PADDING;
        let index = self
            .find_best_fit(padded_width, padded_height)
            .ok_or(AtlasFull)?;

        let chosen = self.free.swap_remove(index);
        let slot = Bounds::new(chosen.x, chosen.y, padded_width, padded_height);
        self.split_remainder(chosen, slot);
        self.slots.insert(key, slot);
        Ok(Bounds::new(slot.x, slot.y, width, height))
    }

    /// Releases the slot assigned to `key`, returning whether one existed.
    ///
    /// Freed space is merged with adjacent free rectangles where possible.
    pub fn remove(&mut self, key: K) -> bool {
        let Some(slot) = self.slots.remove(&key) else {
            return false;
        };
        self.free.push(slot);
        self.coalesce();
        true
    }

    /// Doubles the shorter edge (bounded by the maximum) and repacks all
    /// live slots.
    ///
    /// Existing keys keep their sizes but generally move; callers must treat
    /// every packed slot's pixels as stale afterward. Fails without side
    /// effects when the atlas is already at its maximum or the repack cannot
    /// place every slot.
    pub fn grow(&mut self) -> Result<(), AtlasFull> {
        let (new_width, new_height) = if self.width <= self.height {
            ((self.width * 2).min(self.max_width), self.height)
        } else {
            (self.width, (self.height * 2).min(self.max_height))
        };
        if new_width == self.width && new_height == self.height {
            return Err(AtlasFull);
        }

        // Repack into a candidate so failure leaves this atlas untouched.
        let mut candidate = Self::new(new_width, new_height, self.max_width, self.max_height);
        let mut entries: Vec<(K, Bounds)> = self.entries().collect();
        // Tall-first placement packs tighter and keeps the order stable.
        entries.sort_by(|a, b| (b.1.height, b.1.width).cmp(&(a.1.height, a.1.width)));
        for (key, rect) in entries {
            candidate.add(key, rect.width, rect.height)?;
        }
        *self = candidate;
        Ok(())
    }

    fn find_best_fit(&self, width: i32, height: i32) -> Option<usize> {
        let mut best: Option<(i64, i32, i32, usize)> = None;
        for (index, rect) in self.free.iter().enumerate() {
            if rect.width < width || rect.height < height {
                continue;
            }
            let score = (rect.area(), rect.y, rect.x, index);
            let better = match best {
                None => true,
                Some((area, y, x, _)) => (score.0, score.1, score.2) < (area, y, x),
            };
            if better {
                best = Some(score);
            }
        }
        best.map(|(_, _, _, index)| index)
    }

    /// Splits what remains of `chosen` after carving out `slot`, keeping the
    /// larger leftover whole.
    fn split_remainder(&mut self, chosen: Bounds, slot: Bounds) {
        let right_whole = Bounds::new(
            slot.right(),
            chosen.y,
            chosen.right() - slot.right(),
            chosen.height,
        );
        let bottom_under = Bounds::new(
            chosen.x,
            slot.bottom(),
            slot.width,
            chosen.bottom() - slot.bottom(),
        );
        let right_beside = Bounds::new(
            slot.right(),
            chosen.y,
            chosen.right() - slot.right(),
            slot.height,
        );
        let bottom_whole = Bounds::new(
            chosen.x,
            slot.bottom(),
            chosen.width,
            chosen.bottom() - slot.bottom(),
        );

        let (a, b) = if right_whole.area() >= bottom_whole.area() {
            (right_whole, bottom_under)
        } else {
            (bottom_whole, right_beside)
        };
        if !a.is_empty() {
            self.free.push(a);
        }
        if !b.is_empty() {
            self.free.push(b);
        }
    }

    /// Merges free rectangles that share a full edge until no pair merges.
    fn coalesce(&mut self) {
        loop {
            let mut merged = None;
            'scan: for i in 0..self.free.len() {
                for j in (i + 1)..self.free.len() {
                    if let Some(joined) = join(self.free[i], self.free[j]) {
                        merged = Some((i, j, joined));
                        break 'scan;
                    }
                }
            }
            match merged {
                Some((i, j, joined)) => {
                    // `j > i`, so removing `j` first leaves `i` in place.
                    self.free.swap_remove(j);
                    self.free.swap_remove(i);
                    self.free.push(joined);
                }
                None => break,
            }
        }
    }
}

/// Joins two rectangles sharing a full vertical or horizontal edge.
fn join(a: Bounds, b: Bounds) -> Option<Bounds> {
    if a.y == b.y && a.height == b.height {
        if a.right() == b.x {
            return Some(Bounds::new(a.x, a.y, a.width + b.width, a.height));
        }
        if b.right() == a.x {
            return Some(Bounds::new(b.x, b.y, a.width + b.width, a.height));
        }
    }
    if a.x == b.x && a.width == b.width {
        if a.bottom() == b.y {
            return Some(Bounds::new(a.x, a.y, a.width, a.height + b.height));
        }
        if b.bottom() == a.y {
            return Some(Bounds::new(b.x, b.y, a.width, a.height + b.height));
        }
    }
    None
}
