use std::mem;

use geometry::Aabb;
use slotmap::{Key, SecondaryMap};
use tracing::{debug, trace};

use crate::{
    Bvh, MIN_LEAF_SIZE, SPLIT_THRESHOLD,
    node::{BvhNode, List, NodeKey},
};

impl<K: Key> Bvh<K> {
    /// Flattens the whole tree into the root and splits it again from scratch.
    #[tracing::instrument(skip_all, fields(items = self.items.len()))]
    pub fn rebuild(&mut self) {
        let Some(root) = self.root else {
            return;
        };

        self.absorb_children(root);
        self.recalculate_bounds(root);

        let mut work = vec![root];
        while let Some(node) = work.pop() {
            if let Some(children) = self.subdivide(node) {
                work.extend(children);
            }
        }

        debug!(nodes = self.nodes.len(), "rebuilt bvh");

        #[cfg(debug_assertions)]
        self.assert_consistent();
    }

    /// Flattens the tree into the root and drops every item not in `seen`. Clears the tree when
    /// nothing is left.
    pub(crate) fn retain_seen(&mut self, seen: &SecondaryMap<K, ()>) {
        let Some(root) = self.root else {
            return;
        };

        self.absorb_children(root);

        let list = mem::take(&mut self.nodes[root].list);
        let mut kept = List::default();
        let mut dropped = 0_usize;

        let mut cursor = list.first;
        while let Some(item) = cursor {
            cursor = self.items[item].next;

            if seen.contains_key(item) {
                kept.push_back(&mut self.items, item);
            } else {
                self.items.remove(item);
                dropped += 1;
            }
        }

        trace!(dropped, kept = kept.count, "dropped items missing from refresh");

        if kept.count == 0 {
            self.clear();
            return;
        }

        self.nodes[root].list = kept;
        self.recalculate_bounds(root);
    }

    /// Splits a leaf around the mean position on its longest axis. The split is undone when
    /// either side would hold fewer than [`MIN_LEAF_SIZE`] items.
    fn subdivide(&mut self, key: NodeKey) -> Option<[NodeKey; 2]> {
        let node = &mut self.nodes[key];
        debug_assert!(node.is_leaf());

        if node.list.count < SPLIT_THRESHOLD {
            return None;
        }

        let axis = node.aabb.longest_axis();
        let list = mem::take(&mut node.list);

        let sum: f64 = list
            .iter(&self.items)
            .map(|item| f64::from(self.items[item].position[axis]))
            .sum();
        let mean = sum / list.count as f64;

        let mut left = (List::default(), Aabb::NULL);
        let mut right = (List::default(), Aabb::NULL);

        let mut cursor = list.first;
        while let Some(item) = cursor {
            let link = &self.items[item];
            cursor = link.next;
            let position = link.position;

            let (side, aabb) = if f64::from(position[axis]) < mean {
                &mut left
            } else {
                &mut right
            };

            side.push_back(&mut self.items, item);
            aabb.expand_to_point(position);
        }

        if left.0.count < MIN_LEAF_SIZE || right.0.count < MIN_LEAF_SIZE {
            let (mut list, _) = left;
            let (mut rest, _) = right;
            list.append(&mut self.items, &mut rest);
            self.nodes[key].list = list;
            return None;
        }

        let children = [left, right].map(|(list, aabb)| self.adopt(key, list, aabb));
        self.nodes[key].children = Some(children);

        Some(children)
    }

    /// Creates a child of `parent` owning every item of `list`.
    fn adopt(&mut self, parent: NodeKey, list: List<K>, aabb: Aabb) -> NodeKey {
        let child = self.nodes.insert(BvhNode {
            aabb,
            list,
            children: None,
            parent: Some(parent),
        });

        let mut cursor = list.first;
        while let Some(item) = cursor {
            let link = &mut self.items[item];
            link.owner = child;
            cursor = link.next;
        }

        child
    }
}
