// Copyright 2026 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays region storage with allocation, topology, and property
//! management.

use alloc::vec::Vec;

use crate::batch::ShapeBatcher;
use crate::bounds::Bounds;
use crate::shape::{FontId, PostEffectId, TextId};

use super::id::{INVALID, RegionId};
use super::traverse::Children;

/// Struct-of-arrays storage for all regions of one canvas.
///
/// Regions are addressed by [`RegionId`] handles. Each region occupies a
/// slot in parallel arrays; destroyed regions are recycled via a free list
/// with generation counters guarding against stale handles.
///
/// The store holds topology and per-region properties only. Damage
/// propagation and layer assignment are the canvas's business; the store
/// never talks to layers or the device.
#[derive(Debug, Default)]
pub struct RegionStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Geometry and flags --
    pub(crate) x: Vec<i32>,
    pub(crate) y: Vec<i32>,
    pub(crate) width: Vec<i32>,
    pub(crate) height: Vec<i32>,
    pub(crate) visible: Vec<bool>,

    // -- Canvas association --
    pub(crate) attached: Vec<bool>,
    pub(crate) layer_index: Vec<u32>,

    // -- Promotion --
    pub(crate) post_effect: Vec<Option<PostEffectId>>,
    /// Slot of the owned intermediate region, or `INVALID`.
    pub(crate) intermediate: Vec<u32>,
    /// Slot of the promoted owner when this region *is* an intermediate.
    pub(crate) intermediate_for: Vec<u32>,

    // -- Content --
    pub(crate) batcher: Vec<ShapeBatcher>,
    pub(crate) texts: Vec<Vec<(TextId, FontId)>>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,
}

impl RegionStore {
    /// Creates an empty region store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Allocation API --

    /// Creates a new region and returns its handle.
    ///
    /// The region starts at the origin with zero size, visible, detached,
    /// and with an empty shape batch.
    pub fn create_region(&mut self) -> RegionId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.x[i] = 0;
            self.y[i] = 0;
            self.width[i] = 0;
            self.height[i] = 0;
            self.visible[i] = true;
            self.attached[i] = false;
            self.layer_index[i] = 0;
            self.post_effect[i] = None;
            self.intermediate[i] = INVALID;
            self.intermediate_for[i] = INVALID;
            self.batcher[i].clear();
            self.texts[i].clear();
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.x.push(0);
            self.y.push(0);
            self.width.push(0);
            self.height.push(0);
            self.visible.push(true);
            self.attached.push(false);
            self.layer_index.push(0);
            self.post_effect.push(None);
            self.intermediate.push(INVALID);
            self.intermediate_for.push(INVALID);
            self.batcher.push(ShapeBatcher::new());
            self.texts.push(Vec::new());
            self.generation.push(0);
            idx
        };

        RegionId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a region, freeing its slot for reuse.
    ///
    /// The compositor never calls this on its own; region lifetime belongs
    /// to the owning application code.
    ///
    /// # Panics
    ///
    /// Panics if the region still has children or if the handle is stale.
    pub fn destroy_region(&mut self, id: RegionId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy region with children"
        );
        if self.parent[idx as usize] != INVALID {
            self.unlink_from_parent(idx);
        }
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
    }

    /// Returns whether the given handle refers to a live region.
    #[must_use]
    pub fn is_alive(&self, id: RegionId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent`: it draws above all
    /// current siblings.
    ///
    /// Propagates the parent's canvas attachment through `child`'s subtree.
    /// Subtrees already in the target attachment state are skipped, so
    /// re-adding a large tree to the same canvas does no redundant walking.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale or `child` already has a parent.
    pub fn add_region(&mut self, parent: RegionId, child: RegionId) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "region already has a parent"
        );

        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        // The child draws into its parent's layer, one deeper if promoted.
        // Shifting (rather than assigning) keeps nested promoted subtrees at
        // their relative depths.
        let base = if self.intermediate[c as usize] != INVALID {
            self.layer_index[p as usize] + 1
        } else {
            self.layer_index[p as usize]
        };
        let delta = i64::from(base) - i64::from(self.layer_index[c as usize]);
        if delta != 0 {
            #[expect(clippy::cast_possible_truncation, reason = "layer depths are small")]
            self.shift_layer_index_recursive(c, delta as i32);
        }
        if self.attached[p as usize] {
            self.set_attached_recursive(c, true);
        }
    }

    /// Removes `child` from its parent and clears canvas attachment through
    /// its subtree.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the region has no parent.
    pub fn remove_region(&mut self, child: RegionId) {
        self.validate(child);
        let c = child.idx;
        assert!(self.parent[c as usize] != INVALID, "region has no parent");
        self.unlink_from_parent(c);
        self.set_attached_recursive(c, false);
    }

    /// Returns the parent of a region, if any.
    #[must_use]
    pub fn parent(&self, id: RegionId) -> Option<RegionId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| RegionId {
            idx: p,
            generation: self.generation[p as usize],
        })
    }

    /// Returns an iterator over the direct children of a region in draw
    /// order.
    #[must_use]
    pub fn children(&self, id: RegionId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    // -- Property accessors --

    /// The region's bounds in parent-relative pixel space.
    #[must_use]
    pub fn bounds(&self, id: RegionId) -> Bounds {
        self.validate(id);
        self.bounds_at(id.idx)
    }

    /// Whether the region is marked visible.
    #[must_use]
    pub fn visible(&self, id: RegionId) -> bool {
        self.validate(id);
        self.visible[id.idx as usize]
    }

    /// Sets the visibility flag. Damage is the canvas's concern.
    pub fn set_visible(&mut self, id: RegionId, visible: bool) {
        self.validate(id);
        self.visible[id.idx as usize] = visible;
    }

    /// Whether the region is attached to the canvas (directly or through an
    /// ancestor).
    #[must_use]
    pub fn attached(&self, id: RegionId) -> bool {
        self.validate(id);
        self.attached[id.idx as usize]
    }

    /// Axis-aligned overlap test between two siblings' bounds.
    ///
    /// Painter's-algorithm redraw uses this: damage on one region forces
    /// every overlapping sibling to redraw the shared area in order.
    #[must_use]
    pub fn overlaps(&self, a: RegionId, b: RegionId) -> bool {
        self.bounds(a).overlaps(self.bounds(b))
    }

    /// The index of the layer this region draws into.
    #[must_use]
    pub fn layer_index(&self, id: RegionId) -> u32 {
        self.validate(id);
        self.layer_index[id.idx as usize]
    }

    /// The post effect applied when this region's subtree is composited.
    #[must_use]
    pub fn post_effect(&self, id: RegionId) -> Option<PostEffectId> {
        self.validate(id);
        self.post_effect[id.idx as usize]
    }

    /// The owned intermediate region, present while promoted.
    #[must_use]
    pub fn intermediate(&self, id: RegionId) -> Option<RegionId> {
        self.validate(id);
        let i = self.intermediate[id.idx as usize];
        (i != INVALID).then(|| RegionId {
            idx: i,
            generation: self.generation[i as usize],
        })
    }

    /// Whether the region renders into its own layer.
    #[must_use]
    pub fn needs_layer(&self, id: RegionId) -> bool {
        self.intermediate(id).is_some()
    }

    // -- Content --

    /// Read access to the region's shape batches.
    #[must_use]
    pub fn batcher(&self, id: RegionId) -> &ShapeBatcher {
        self.validate(id);
        &self.batcher[id.idx as usize]
    }

    /// Mutable access to the region's shape batches.
    #[must_use]
    pub fn batcher_mut(&mut self, id: RegionId) -> &mut ShapeBatcher {
        self.validate(id);
        &mut self.batcher[id.idx as usize]
    }

    /// Stores a prepared-text handle with the region for the frame.
    pub fn add_text(&mut self, id: RegionId, text: TextId, font: FontId) {
        self.validate(id);
        self.texts[id.idx as usize].push((text, font));
    }

    /// Clears the region's drawn shapes and stored text handles.
    pub fn clear_shapes(&mut self, id: RegionId) {
        self.validate(id);
        self.batcher[id.idx as usize].clear();
        self.texts[id.idx as usize].clear();
    }

    /// Whether the region has no drawn shapes.
    #[must_use]
    pub fn is_empty(&self, id: RegionId) -> bool {
        self.batcher(id).is_empty()
    }

    // -- Crate-internal mutation (orchestrated by the canvas) --

    pub(crate) fn set_post_effect_raw(&mut self, idx: u32, effect: Option<PostEffectId>) {
        self.post_effect[idx as usize] = effect;
    }

    /// Links `companion` as the intermediate region holding `owner`'s
    /// sampled quad.
    pub(crate) fn link_intermediate(&mut self, owner: RegionId, companion: RegionId) {
        self.validate(owner);
        self.validate(companion);
        self.intermediate[owner.idx as usize] = companion.idx;
        self.intermediate_for[companion.idx as usize] = owner.idx;
        if self.attached[owner.idx as usize] {
            self.set_attached_recursive(companion.idx, true);
        }
    }

    /// Severs the intermediate link, returning the companion for disposal.
    pub(crate) fn unlink_intermediate(&mut self, owner: RegionId) -> Option<RegionId> {
        self.validate(owner);
        let c = self.intermediate[owner.idx as usize];
        if c == INVALID {
            return None;
        }
        self.intermediate[owner.idx as usize] = INVALID;
        self.intermediate_for[c as usize] = INVALID;
        Some(RegionId {
            idx: c,
            generation: self.generation[c as usize],
        })
    }

    pub(crate) fn bounds_at(&self, idx: u32) -> Bounds {
        let i = idx as usize;
        Bounds::new(self.x[i], self.y[i], self.width[i], self.height[i])
    }

    pub(crate) fn set_bounds_raw(&mut self, idx: u32, bounds: Bounds) {
        let i = idx as usize;
        self.x[i] = bounds.x;
        self.y[i] = bounds.y;
        self.width[i] = bounds.width;
        self.height[i] = bounds.height;
    }

    /// Marks a whole subtree attached or detached.
    ///
    /// Skips subtrees already in the target state; attachment is inherited,
    /// so an already-correct root implies a correct subtree.
    pub(crate) fn set_attached_recursive(&mut self, idx: u32, attached: bool) {
        if self.attached[idx as usize] == attached {
            return;
        }
        self.attached[idx as usize] = attached;
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.set_attached_recursive(child, attached);
            child = self.next_sibling[child as usize];
        }
        // The intermediate companion mirrors its owner's attachment.
        let intermediate = self.intermediate[idx as usize];
        if intermediate != INVALID {
            self.set_attached_recursive(intermediate, attached);
        }
    }

    /// Shifts the layer index of a whole subtree by `delta` (promotion and
    /// demotion of an ancestor).
    pub(crate) fn shift_layer_index_recursive(&mut self, idx: u32, delta: i32) {
        let shifted = i64::from(self.layer_index[idx as usize]) + i64::from(delta);
        debug_assert!(shifted >= 0, "layer index underflow");
        #[expect(clippy::cast_possible_truncation, reason = "layer depths are small")]
        {
            self.layer_index[idx as usize] = shifted as u32;
        }
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.shift_layer_index_recursive(child, delta);
            child = self.next_sibling[child as usize];
        }
    }

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: RegionId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale RegionId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn create_and_destroy() {
        let mut store = RegionStore::new();
        let id = store.create_region();
        assert!(store.is_alive(id));
        store.destroy_region(id);
        assert!(!store.is_alive(id));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = RegionStore::new();
        let id1 = store.create_region();
        store.destroy_region(id1);
        let id2 = store.create_region();
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut store = RegionStore::new();
        let parent = store.create_region();
        let a = store.create_region();
        let b = store.create_region();
        let c = store.create_region();
        store.add_region(parent, a);
        store.add_region(parent, b);
        store.add_region(parent, c);
        let kids: Vec<_> = store.children(parent).collect();
        assert_eq!(kids, vec![a, b, c]);
    }

    #[test]
    #[should_panic(expected = "region already has a parent")]
    fn reparenting_without_removal_panics() {
        let mut store = RegionStore::new();
        let p1 = store.create_region();
        let p2 = store.create_region();
        let child = store.create_region();
        store.add_region(p1, child);
        store.add_region(p2, child);
    }

    #[test]
    fn remove_region_detaches_and_preserves_siblings() {
        let mut store = RegionStore::new();
        let parent = store.create_region();
        let a = store.create_region();
        let b = store.create_region();
        let c = store.create_region();
        store.add_region(parent, a);
        store.add_region(parent, b);
        store.add_region(parent, c);

        store.remove_region(b);
        assert_eq!(store.parent(b), None);
        let kids: Vec<_> = store.children(parent).collect();
        assert_eq!(kids, vec![a, c]);
    }

    #[test]
    fn attachment_propagates_to_descendants() {
        let mut store = RegionStore::new();
        let root = store.create_region();
        let mid = store.create_region();
        let leaf = store.create_region();
        store.add_region(mid, leaf);

        store.set_attached_recursive(root.idx, true);
        store.add_region(root, mid);

        assert!(store.attached(mid));
        assert!(store.attached(leaf));

        store.remove_region(mid);
        assert!(!store.attached(mid));
        assert!(!store.attached(leaf));
        assert!(store.attached(root));
    }

    #[test]
    fn attachment_matches_nearest_ancestor_after_arbitrary_mutations() {
        let mut store = RegionStore::new();
        let root = store.create_region();
        store.set_attached_recursive(root.idx, true);

        let mut nodes = vec![root];
        for step in 0..40_u32 {
            if step % 5 == 4 && nodes.len() > 1 {
                let victim = nodes[1 + (step as usize * 7) % (nodes.len() - 1)];
                if store.parent(victim).is_some() {
                    store.remove_region(victim);
                }
            } else {
                let parent = nodes[(step as usize * 3) % nodes.len()];
                let child = store.create_region();
                store.add_region(parent, child);
                nodes.push(child);
            }

            // Invariant: attached iff the parent chain reaches the root.
            for &node in &nodes {
                let mut cursor = node;
                let mut reaches_root = node == root;
                while let Some(parent) = store.parent(cursor) {
                    if parent == root {
                        reaches_root = true;
                        break;
                    }
                    cursor = parent;
                }
                assert_eq!(
                    store.attached(node),
                    reaches_root,
                    "attachment out of sync for {node:?}"
                );
            }
        }
    }

    #[test]
    fn overlaps_is_an_open_interval_test() {
        let mut store = RegionStore::new();
        let a = store.create_region();
        let b = store.create_region();
        store.set_bounds_raw(a.idx, Bounds::new(0, 0, 10, 10));
        store.set_bounds_raw(b.idx, Bounds::new(10, 0, 10, 10));
        assert!(!store.overlaps(a, b));
        store.set_bounds_raw(b.idx, Bounds::new(9, 9, 10, 10));
        assert!(store.overlaps(a, b));
    }

    #[test]
    #[should_panic(expected = "stale RegionId")]
    fn destroyed_handle_panics_on_bounds() {
        let mut store = RegionStore::new();
        let id = store.create_region();
        store.destroy_region(id);
        let _ = store.bounds(id);
    }

    #[test]
    #[should_panic(expected = "cannot destroy region with children")]
    fn destroy_with_children_panics() {
        let mut store = RegionStore::new();
        let parent = store.create_region();
        let child = store.create_region();
        store.add_region(parent, child);
        store.destroy_region(parent);
    }

    #[test]
    fn clear_shapes_empties_content() {
        use crate::color::QuadColor;
        use crate::shape::{BlendMode, Shape, ShapeData};

        let mut store = RegionStore::new();
        let id = store.create_region();
        store.batcher_mut(id).add_shape(
            Shape {
                clamp: kurbo::Rect::new(0.0, 0.0, 10.0, 10.0),
                color: QuadColor::default(),
                x: 0.0,
                y: 0.0,
                width: 5.0,
                height: 5.0,
                data: ShapeData::Fill,
            },
            BlendMode::Alpha,
        );
        store.add_text(id, TextId(3), FontId(1));
        assert!(!store.is_empty(id));

        store.clear_shapes(id);
        assert!(store.is_empty(id));
    }
}
