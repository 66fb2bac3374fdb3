use geometry::Sphere;
use slotmap::Key;

use crate::{Bvh, node::NodeKey};

/// Explicit-stack radius query over a [`Bvh`].
///
/// A node whose bounds lie entirely inside the sphere yields its whole subtree without distance
/// checks. Otherwise its own items are checked exactly and its children are queued.
pub struct RadiusIter<'a, K: Key> {
    bvh: &'a Bvh<K>,
    sphere: Sphere,
    /// Pending nodes, flagged when an ancestor was already found to be inside the sphere.
    stack: Vec<(NodeKey, bool)>,
    cursor: Option<K>,
    check: bool,
}

impl<'a, K: Key> RadiusIter<'a, K> {
    pub(crate) fn new(bvh: &'a Bvh<K>, sphere: Sphere) -> Self {
        Self {
            bvh,
            sphere,
            stack: bvh.root.map(|root| (root, false)).into_iter().collect(),
            cursor: None,
            check: true,
        }
    }
}

impl<K: Key> Iterator for RadiusIter<'_, K> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        let bvh = self.bvh;

        loop {
            while let Some(key) = self.cursor {
                let link = &bvh.items[key];
                self.cursor = link.next;

                if !self.check || self.sphere.contains_point(link.position) {
                    return Some(key);
                }
            }

            let (node_key, inside) = self.stack.pop()?;
            let node = &bvh.nodes[node_key];

            let inside = if inside {
                true
            } else if self.sphere.intersects_aabb(&node.aabb) {
                self.sphere.contains_aabb(&node.aabb)
            } else {
                continue;
            };

            if let Some(children) = node.children {
                self.stack.extend(children.map(|child| (child, inside)));
            }

            self.cursor = node.list.first;
            self.check = !inside;
        }
    }
}
