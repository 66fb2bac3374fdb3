//! Binary bounding volume hierarchy over moving points.
//!
//! Inserts land in the root's item list and stay there until [`Bvh::rebuild`], which flattens the
//! whole tree and splits it again around the mean on the longest axis. Removals unlink a single
//! item and collapse undersized leaves into their parent.

use geometry::Aabb;
use glam::Vec3;
use slotmap::{Key, SecondaryMap, SlotMap};
use tracing::trace;

use crate::node::{BvhNode, ItemLink, NodeKey};

mod build;
mod node;
pub mod query;

pub use query::RadiusIter;

/// A leaf holding fewer items than this is merged back into its parent.
pub const MIN_LEAF_SIZE: usize = 16;

/// Nodes below this count are not split: a mean split rarely divides evenly.
pub const SPLIT_THRESHOLD: usize = 3 * MIN_LEAF_SIZE;

#[derive(Debug, Clone)]
pub struct Bvh<K: Key> {
    nodes: SlotMap<NodeKey, BvhNode<K>>,
    items: SecondaryMap<K, ItemLink<K>>,
    root: Option<NodeKey>,
}

/// Read-only view of a leaf, for visualizers and invariant checks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LeafInfo {
    pub aabb: Aabb,
    pub items: usize,
    pub is_root: bool,
}

impl<K: Key> Default for Bvh<K> {
    fn default() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            items: SecondaryMap::new(),
            root: None,
        }
    }
}

impl<K: Key> Bvh<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.items.contains_key(key)
    }

    /// The position snapshot the tree currently holds for `key`.
    #[must_use]
    pub fn position(&self, key: K) -> Option<Vec3> {
        self.items.get(key).map(|link| link.position)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bounds of the whole tree, or `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        self.root.map(|root| self.nodes[root].aabb)
    }

    /// Adds `key` to the root's list, growing the root bounds. Returns `false` if `key` is
    /// already in the tree.
    pub fn insert(&mut self, key: K, position: Vec3) -> bool {
        if self.items.contains_key(key) {
            return false;
        }

        let root = match self.root {
            Some(root) => {
                self.nodes[root].aabb.expand_to_point(position);
                root
            }
            None => {
                let root = self.nodes.insert(BvhNode::new(Aabb::point(position), None));
                self.root = Some(root);
                root
            }
        };

        self.items.insert(key, ItemLink {
            position,
            owner: root,
            next: None,
        });
        self.nodes[root].list.push_back(&mut self.items, key);

        true
    }

    /// Unlinks `key` from its owner and collapses undersized leaves toward the root. Returns
    /// `false` if `key` is not in the tree.
    pub fn remove(&mut self, key: K) -> bool {
        let Some(link) = self.items.get(key) else {
            return false;
        };
        let owner = link.owner;

        let unlinked = self.nodes[owner].list.unlink(&mut self.items, key);
        debug_assert!(unlinked, "item link points at a node that does not list it");

        self.items.remove(key);
        self.collapse_from(owner);

        true
    }

    /// Moves the snapshot of `key` to `position`, growing its owner's and every ancestor's
    /// bounds. Returns `false` if `key` is not in the tree.
    pub fn update(&mut self, key: K, position: Vec3) -> bool {
        let Some(link) = self.items.get_mut(key) else {
            return false;
        };
        link.position = position;

        let mut cursor = Some(link.owner);
        while let Some(node) = cursor {
            let node = &mut self.nodes[node];
            node.aabb.expand_to_point(position);
            cursor = node.parent;
        }

        true
    }

    /// Per-frame refresh: updates every known key, inserts unknown ones, drops keys missing from
    /// `items`, then rebuilds. Afterwards the tree holds exactly the keys of `items`.
    pub fn refresh(&mut self, items: impl IntoIterator<Item = (K, Vec3)>) {
        let mut seen = SecondaryMap::new();

        for (key, position) in items {
            if !self.update(key, position) {
                self.insert(key, position);
            }
            seen.insert(key, ());
        }

        if seen.len() < self.items.len() {
            self.retain_seen(&seen);
        }

        self.rebuild();
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.items.clear();
        self.root = None;
    }

    fn collapse_from(&mut self, start: NodeKey) {
        let mut current = start;

        loop {
            let node = &self.nodes[current];

            if node.is_leaf() && node.list.count < MIN_LEAF_SIZE {
                if let Some(parent) = node.parent {
                    trace!(items = node.list.count, "collapsing undersized leaf");
                    self.absorb_children(parent);
                    current = parent;
                    continue;
                }

                if node.list.count == 0 {
                    self.nodes.remove(current);
                    self.root = None;
                    return;
                }
            }

            break;
        }

        self.refit_upwards(current);
    }

    /// Moves every item of every descendant of `parent` into `parent`'s own list and frees the
    /// descendants. `parent` becomes a leaf.
    fn absorb_children(&mut self, parent: NodeKey) {
        let Some(children) = self.nodes[parent].children.take() else {
            return;
        };

        let mut stack = Vec::from(children);

        while let Some(child) = stack.pop() {
            let Some(mut node) = self.nodes.remove(child) else {
                debug_assert!(false, "child node missing from arena");
                continue;
            };

            if let Some(grandchildren) = node.children {
                stack.extend(grandchildren);
            }

            let mut cursor = node.list.first;
            while let Some(key) = cursor {
                let link = &mut self.items[key];
                link.owner = parent;
                cursor = link.next;
            }

            self.nodes[parent]
                .list
                .append(&mut self.items, &mut node.list);
        }
    }

    /// Recomputes tight bounds from the node's own items and its children's bounds.
    fn recalculate_bounds(&mut self, key: NodeKey) {
        let node = &self.nodes[key];

        let mut aabb: Aabb = node
            .list
            .iter(&self.items)
            .map(|item| self.items[item].position)
            .collect();

        if let Some(children) = node.children {
            for child in children {
                aabb.expand_to_fit(&self.nodes[child].aabb);
            }
        }

        self.nodes[key].aabb = aabb;
    }

    /// Tightens bounds from `start` up to the root. Only this path is checked in debug builds,
    /// so removals stay proportional to depth.
    fn refit_upwards(&mut self, start: NodeKey) {
        let mut cursor = Some(start);
        while let Some(key) = cursor {
            self.recalculate_bounds(key);

            let node = &self.nodes[key];
            debug_assert!(
                node.children.is_none_or(|[left, right]| {
                    self.nodes[left].parent == Some(key) && self.nodes[right].parent == Some(key)
                }),
                "children do not point back at their parent"
            );
            debug_assert!(
                node.parent.is_some() || self.root == Some(key),
                "refit walked off a detached node"
            );

            cursor = node.parent;
        }
    }

    pub fn leaves(&self) -> impl Iterator<Item = LeafInfo> + '_ {
        self.nodes
            .iter()
            .filter(|(_, node)| node.is_leaf())
            .map(|(key, node)| LeafInfo {
                aabb: node.aabb,
                items: node.list.count,
                is_root: Some(key) == self.root,
            })
    }

    pub fn leaf_bounds(&self) -> impl Iterator<Item = Aabb> + '_ {
        self.leaves().map(|leaf| leaf.aabb)
    }

    /// Every item with its position snapshot, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (K, Vec3)> + '_ {
        self.items.iter().map(|(key, link)| (key, link.position))
    }

    #[cfg(debug_assertions)]
    fn assert_consistent(&self) {
        let Some(root) = self.root else {
            assert!(self.nodes.is_empty(), "empty tree still holds nodes");
            assert!(self.items.is_empty(), "empty tree still holds items");
            return;
        };

        assert!(self.nodes[root].parent.is_none());

        let mut listed = 0;

        for (key, node) in &self.nodes {
            if let Some([left, right]) = node.children {
                assert_ne!(left, right);
                assert_eq!(self.nodes[left].parent, Some(key));
                assert_eq!(self.nodes[right].parent, Some(key));
            }

            let mut count = 0;
            for item in node.list.iter(&self.items) {
                let link = &self.items[item];
                assert_eq!(link.owner, key, "item listed under a node that does not own it");

                let mut ancestor = Some(key);
                while let Some(a) = ancestor {
                    assert!(
                        self.nodes[a].aabb.contains_point(link.position),
                        "node bounds {} miss item at {}",
                        self.nodes[a].aabb,
                        link.position
                    );
                    ancestor = self.nodes[a].parent;
                }

                count += 1;
            }

            assert_eq!(count, node.list.count);
            listed += count;
        }

        assert_eq!(listed, self.items.len(), "items missing from every list");
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geometry::Sphere;
    use glam::Vec3;
    use slotmap::{DefaultKey, SlotMap};

    use super::*;

    /// `n` points packed into a small grid around `center`.
    fn cluster(center: Vec3, n: usize) -> impl Iterator<Item = Vec3> {
        (0..n).map(move |i| {
            let offset = Vec3::new((i % 4) as f32, ((i / 4) % 4) as f32, (i / 16) as f32);
            center + offset * 0.1
        })
    }

    fn build(points: impl IntoIterator<Item = Vec3>) -> (Bvh<DefaultKey>, Vec<DefaultKey>) {
        let mut keys = SlotMap::new();
        let mut bvh = Bvh::new();

        let keys = points
            .into_iter()
            .map(|point| {
                let key = keys.insert(());
                assert!(bvh.insert(key, point));
                key
            })
            .collect();

        bvh.rebuild();
        (bvh, keys)
    }

    #[test]
    fn inserts_accumulate_at_root() {
        let mut keys = SlotMap::<DefaultKey, ()>::new();
        let mut bvh = Bvh::new();

        for point in cluster(Vec3::ZERO, 100) {
            bvh.insert(keys.insert(()), point);
        }

        assert_eq!(bvh.node_count(), 1);
        assert_eq!(bvh.len(), 100);

        let leaves: Vec<_> = bvh.leaves().collect();
        assert_eq!(leaves.len(), 1);
        assert!(leaves[0].is_root);
        assert_eq!(leaves[0].items, 100);
    }

    #[test]
    fn double_insert_is_a_no_op() {
        let (mut bvh, keys) = build(cluster(Vec3::ZERO, 3));

        assert!(!bvh.insert(keys[0], Vec3::splat(100.0)));
        assert_eq!(bvh.len(), 3);
        assert_eq!(bvh.position(keys[0]), Some(Vec3::ZERO));
        assert!(!bvh.bounds().unwrap().contains_point(Vec3::splat(100.0)));
    }

    #[test]
    fn remove_absent_is_a_no_op() {
        let (mut bvh, keys) = build(cluster(Vec3::ZERO, 3));

        assert!(bvh.remove(keys[1]));
        assert!(!bvh.remove(keys[1]));
        assert_eq!(bvh.len(), 2);

        assert!(!bvh.remove(DefaultKey::null()));
        assert_eq!(bvh.len(), 2);
    }

    #[test]
    fn ten_items_stay_in_one_leaf() {
        let (bvh, _) = build(cluster(Vec3::ZERO, 10));

        let leaves: Vec<_> = bvh.leaves().collect();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].items, 10);
        assert!(leaves[0].is_root);
    }

    #[test]
    fn two_clusters_split_into_two_tight_leaves() {
        let left = Vec3::new(-10.0, 0.0, 0.0);
        let right = Vec3::new(10.0, 0.0, 0.0);
        let (bvh, _) = build(cluster(left, 25).chain(cluster(right, 25)));

        let mut leaves: Vec<_> = bvh.leaves().collect();
        leaves.sort_by(|a, b| a.aabb.min.x.total_cmp(&b.aabb.min.x));

        assert_eq!(leaves.len(), 2);
        assert_eq!(bvh.node_count(), 3);

        let expected_left: Aabb = cluster(left, 25).collect();
        let expected_right: Aabb = cluster(right, 25).collect();

        assert_eq!(leaves[0].aabb, expected_left);
        assert_eq!(leaves[1].aabb, expected_right);
        assert_eq!(leaves[0].items, 25);
        assert_eq!(leaves[1].items, 25);

        // each leaf spans only its own 4x4x2 grid of 0.1 spacing
        for (leaf, center) in leaves.iter().zip([left, right]) {
            let size = leaf.aabb.max - leaf.aabb.min;
            assert_relative_eq!(size.x, 0.3, epsilon = 1e-5);
            assert_relative_eq!(size.y, 0.3, epsilon = 1e-5);
            assert_relative_eq!(size.z, 0.1, epsilon = 1e-5);
            assert_relative_eq!(leaf.aabb.min.x, center.x, epsilon = 1e-5);
        }
    }

    #[test]
    fn identical_points_are_never_split() {
        let (bvh, _) = build(std::iter::repeat_n(Vec3::ONE, 200));

        assert_eq!(bvh.node_count(), 1);
        assert_eq!(bvh.bounds(), Some(Aabb::point(Vec3::ONE)));
    }

    #[test]
    fn removing_below_min_collapses_siblings_into_parent() {
        let (mut bvh, keys) = build(
            cluster(Vec3::new(-10.0, 0.0, 0.0), 16).chain(cluster(Vec3::new(10.0, 0.0, 0.0), 32)),
        );

        let mut sizes: Vec<_> = bvh.leaves().map(|leaf| leaf.items).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![16, 32]);

        assert!(bvh.remove(keys[0]));

        let leaves: Vec<_> = bvh.leaves().collect();
        assert_eq!(leaves.len(), 1);
        assert!(leaves[0].is_root);
        assert_eq!(leaves[0].items, 47);
        assert_eq!(bvh.node_count(), 1);

        let expected: Aabb = cluster(Vec3::new(-10.0, 0.0, 0.0), 16)
            .skip(1)
            .chain(cluster(Vec3::new(10.0, 0.0, 0.0), 32))
            .collect();
        assert_eq!(leaves[0].aabb, expected);
    }

    #[test]
    fn removing_everything_empties_the_tree() {
        let (mut bvh, keys) = build(
            cluster(Vec3::new(-5.0, 0.0, 0.0), 60).chain(cluster(Vec3::new(5.0, 0.0, 0.0), 60)),
        );
        assert!(bvh.node_count() > 1);

        for key in keys.iter().rev() {
            assert!(bvh.remove(*key));
        }

        assert!(bvh.is_empty());
        assert_eq!(bvh.node_count(), 0);
        assert_eq!(bvh.bounds(), None);
    }

    #[test]
    fn update_grows_bounds_until_rebuild() {
        let (mut bvh, keys) = build(cluster(Vec3::ZERO, 60).chain(cluster(Vec3::splat(20.0), 60)));

        let far = Vec3::new(-50.0, 3.0, 3.0);
        assert!(bvh.update(keys[0], far));
        assert!(bvh.bounds().unwrap().contains_point(far));

        bvh.rebuild();
        assert!(bvh.bounds().unwrap().contains_point(far));
        assert_eq!(bvh.position(keys[0]), Some(far));

        bvh.update(keys[0], Vec3::ZERO);
        bvh.rebuild();
        assert!(!bvh.bounds().unwrap().contains_point(far));
    }

    #[test]
    fn refresh_inserts_unknown_keys() {
        let mut slots = SlotMap::<DefaultKey, ()>::new();
        let keys: Vec<_> = (0..50).map(|_| slots.insert(())).collect();

        let mut bvh = Bvh::new();
        bvh.refresh(keys.iter().zip(cluster(Vec3::ZERO, 50)).map(|(k, p)| (*k, p)));
        assert_eq!(bvh.len(), 50);

        bvh.refresh(keys.iter().map(|k| (*k, Vec3::ONE)));
        assert_eq!(bvh.len(), 50);
        assert_eq!(bvh.bounds(), Some(Aabb::point(Vec3::ONE)));
    }

    #[test]
    fn refresh_drops_keys_it_was_not_given() {
        let (mut bvh, keys) = build(cluster(Vec3::ZERO, 40).chain(cluster(Vec3::splat(20.0), 40)));

        let kept = &keys[..30];
        bvh.refresh(kept.iter().zip(cluster(Vec3::ZERO, 30)).map(|(k, p)| (*k, p)));

        assert_eq!(bvh.len(), 30);
        assert!(kept.iter().all(|key| bvh.contains(*key)));
        assert!(keys[30..].iter().all(|key| !bvh.contains(*key)));
        assert_eq!(bvh.query_radius(Sphere::new(Vec3::ZERO, 1e4)).count(), 30);
        assert_eq!(bvh.bounds(), Some(cluster(Vec3::ZERO, 30).collect()));

        bvh.refresh(std::iter::empty());
        assert!(bvh.is_empty());
        assert_eq!(bvh.len(), 0);
        assert_eq!(bvh.node_count(), 0);
    }

    #[test]
    fn refresh_with_repeated_keys_keeps_them_once() {
        let (mut bvh, keys) = build(cluster(Vec3::ZERO, 3));

        bvh.refresh([(keys[0], Vec3::ZERO), (keys[0], Vec3::ONE), (keys[1], Vec3::ZERO)]);

        assert_eq!(bvh.len(), 2);
        assert_eq!(bvh.position(keys[0]), Some(Vec3::ONE));
        assert!(!bvh.contains(keys[2]));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn removals_keep_every_link_consistent() {
        let (mut bvh, keys) = build(
            cluster(Vec3::new(-5.0, 0.0, 0.0), 70).chain(cluster(Vec3::new(5.0, 0.0, 0.0), 70)),
        );

        for (i, key) in keys.iter().enumerate() {
            assert!(bvh.remove(*key));
            if i % 7 == 0 {
                bvh.assert_consistent();
            }
        }

        bvh.assert_consistent();
        assert!(bvh.is_empty());
    }
}
