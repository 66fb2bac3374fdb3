//! Bucketed octree over moving points, rebuilt from scratch every frame.
//!
//! Each node owns a fixed-capacity bucket. Once a bucket is full the node is split into eight
//! equal octants and further inserts descend into them; items already in the bucket stay where
//! they are. Nodes at `max_depth` never split and accept any number of items.

use geometry::{Aabb, Sphere};
use glam::Vec3;
use tracing::debug;

use crate::{
    idx::{Idx, OptionalIdx},
    node::{Entry, Node, octant},
};

mod idx;
pub mod iter;
mod node;

pub use iter::RadiusIter;

/// Subtrees holding fewer items than this are scanned directly during a radius query instead of
/// testing each descendant's bounds.
pub const BRUTE_FORCE_THRESHOLD: u32 = 30;

pub const DEFAULT_CAPACITY: usize = 8;
pub const DEFAULT_MAX_DEPTH: u8 = 8;

const ROOT: Idx = 0;

#[derive(Debug, Clone)]
pub struct Octree<K> {
    nodes: Vec<Node<K>>,
    capacity: usize,
    max_depth: u8,
}

/// Read-only view of one node, for visualizers and invariant checks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NodeInfo {
    pub aabb: Aabb,
    pub depth: u8,
    /// Items stored directly in this node's bucket.
    pub items: usize,
    pub subdivided: bool,
}

impl<K: Copy> Octree<K> {
    /// Creates an empty tree covering `boundary`. Inserts outside of it are rejected.
    #[must_use]
    pub fn new(boundary: Aabb, capacity: usize, max_depth: u8) -> Self {
        debug_assert!(capacity > 0, "octree capacity must be positive");

        Self {
            nodes: vec![Node::new(boundary, 0)],
            capacity,
            max_depth,
        }
    }

    #[must_use]
    pub fn boundary(&self) -> Aabb {
        self.root().aabb
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn max_depth(&self) -> u8 {
        self.max_depth
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.root().count as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root().count == 0
    }

    fn root(&self) -> &Node<K> {
        &self.nodes[ROOT as usize]
    }

    /// Inserts `key` at `position`. Returns `false`, leaving the tree untouched, when the
    /// position lies outside the root boundary.
    pub fn insert(&mut self, key: K, position: Vec3) -> bool {
        if !self.root().aabb.contains_point(position) {
            return false;
        }

        self.insert_at(ROOT, Entry { key, position })
    }

    fn insert_at(&mut self, idx: Idx, entry: Entry<K>) -> bool {
        let node = &mut self.nodes[idx as usize];

        if node.bucket.len() < self.capacity || node.depth >= self.max_depth {
            node.bucket.push(entry);
            node.count += 1;
            return true;
        }

        let first_child = match node.first_child.inner() {
            Some(first_child) => first_child,
            None => self.subdivide(idx),
        };

        let child = (first_child..first_child + 8)
            .find(|&child| self.nodes[child as usize].aabb.contains_point(entry.position));

        // only reachable through float rounding at the octant seams
        let Some(child) = child else {
            return false;
        };

        let inserted = self.insert_at(child, entry);
        if inserted {
            self.nodes[idx as usize].count += 1;
        }
        inserted
    }

    fn subdivide(&mut self, idx: Idx) -> Idx {
        let first_child = Idx::try_from(self.nodes.len()).expect("octree node count overflow");

        let parent = &self.nodes[idx as usize];
        let (aabb, depth) = (parent.aabb, parent.depth + 1);

        self.nodes
            .extend((0..8).map(|i| Node::new(octant(&aabb, i), depth)));
        self.nodes[idx as usize].first_child = OptionalIdx::some(first_child);

        first_child
    }

    /// Drops every node below the root and empties the root bucket.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);

        let root = &mut self.nodes[ROOT as usize];
        root.bucket.clear();
        root.first_child = OptionalIdx::NONE;
        root.count = 0;
    }

    /// Per-frame rebuild: clear, then insert every item again. Returns how many items were
    /// rejected for lying outside the boundary.
    #[tracing::instrument(skip_all, fields(capacity = self.capacity, max_depth = self.max_depth))]
    pub fn rebuild(&mut self, items: impl IntoIterator<Item = (K, Vec3)>) -> usize {
        self.clear();

        let mut rejected = 0;
        for (key, position) in items {
            if !self.insert(key, position) {
                rejected += 1;
            }
        }

        if rejected > 0 {
            debug!(rejected, boundary = %self.boundary(), "items outside octree boundary");
        }

        rejected
    }

    /// Every item within `sphere`, each exactly once, in no particular order.
    pub fn query_radius(&self, sphere: Sphere) -> RadiusIter<'_, K> {
        RadiusIter::new(self, sphere)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeInfo> + '_ {
        self.nodes.iter().map(|node| NodeInfo {
            aabb: node.aabb,
            depth: node.depth,
            items: node.bucket.len(),
            subdivided: node.is_subdivided(),
        })
    }

    /// Bounds of every node currently holding items.
    pub fn occupied_bounds(&self) -> impl Iterator<Item = Aabb> + '_ {
        self.nodes
            .iter()
            .filter(|node| !node.bucket.is_empty())
            .map(|node| node.aabb)
    }

    /// Every stored item with the position it was inserted at.
    pub fn iter(&self) -> impl Iterator<Item = (K, Vec3)> + '_ {
        self.nodes
            .iter()
            .flat_map(|node| node.bucket.iter().map(|entry| (entry.key, entry.position)))
    }
}

#[cfg(test)]
mod tests {
    use geometry::{Aabb, Sphere};
    use glam::Vec3;

    use super::*;

    fn unit_tree(capacity: usize, max_depth: u8) -> Octree<usize> {
        Octree::new(Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)), capacity, max_depth)
    }

    #[test]
    fn insert_outside_boundary_fails() {
        let mut tree = unit_tree(4, 4);

        assert!(!tree.insert(0, Vec3::new(1.5, 0.0, 0.0)));
        assert!(tree.is_empty());
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn insert_on_boundary_succeeds() {
        let mut tree = unit_tree(4, 4);
        assert!(tree.insert(0, Vec3::splat(1.0)));
        assert!(tree.insert(1, Vec3::splat(-1.0)));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn fills_root_before_subdividing() {
        let mut tree = unit_tree(4, 4);

        for i in 0..4 {
            assert!(tree.insert(i, Vec3::ZERO));
        }
        assert!(!tree.root().is_subdivided());

        assert!(tree.insert(4, Vec3::ZERO));
        assert!(tree.root().is_subdivided());
        assert_eq!(tree.nodes.len(), 9);
        assert_eq!(tree.root().bucket.len(), 4);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn identical_points_pile_up_at_max_depth() {
        let mut tree = unit_tree(4, 4);

        for i in 0..40 {
            assert!(tree.insert(i, Vec3::ZERO));
        }

        let deepest = tree
            .nodes
            .iter()
            .filter(|node| node.depth == 4 && !node.bucket.is_empty())
            .collect::<Vec<_>>();

        assert_eq!(deepest.len(), 1);
        // 4 levels of 4 above it
        assert_eq!(deepest[0].bucket.len(), 40 - 16);
        assert!(!deepest[0].is_subdivided());
    }

    #[test]
    fn five_identical_points_are_all_found() {
        let mut tree = unit_tree(4, 4);

        for i in 0..5 {
            assert!(tree.insert(i, Vec3::ZERO));
        }

        let mut found: Vec<_> = tree.query_radius(Sphere::new(Vec3::ZERO, 0.1)).collect();
        found.sort_unstable();
        assert_eq!(found, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clear_keeps_root() {
        let mut tree = unit_tree(2, 4);
        for i in 0..20 {
            let t = i as f32 / 20.0;
            tree.insert(i, Vec3::new(t, -t, t * 0.5));
        }
        assert!(tree.nodes.len() > 1);

        tree.clear();

        assert!(tree.is_empty());
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.query_radius(Sphere::new(Vec3::ZERO, 10.0)).count(), 0);
        assert!(tree.insert(0, Vec3::ZERO));
    }

    #[test]
    fn rebuild_counts_rejections() {
        let mut tree = unit_tree(4, 4);
        let items = [
            (0, Vec3::ZERO),
            (1, Vec3::new(0.5, 0.5, 0.5)),
            (2, Vec3::new(3.0, 0.0, 0.0)),
        ];

        assert_eq!(tree.rebuild(items), 1);
        assert_eq!(tree.len(), 2);

        // a second rebuild replaces rather than accumulates
        assert_eq!(tree.rebuild(items), 1);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn occupied_bounds_cover_items() {
        let mut tree = unit_tree(1, 3);
        let points = [
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
            Vec3::new(-0.5, -0.5, 0.5),
        ];

        for (i, point) in points.iter().enumerate() {
            tree.insert(i, *point);
        }

        let bounds: Vec<_> = tree.occupied_bounds().collect();
        assert_eq!(bounds.len(), 3);
        for point in points {
            assert!(bounds.iter().any(|aabb| aabb.contains_point(point)));
        }
    }
}
