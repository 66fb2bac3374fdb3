use std::slice;

use geometry::Sphere;

use crate::{BRUTE_FORCE_THRESHOLD, Octree, ROOT, idx::Idx, node::Entry};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    /// Bounds not yet classified against the sphere.
    Test,
    /// Small subtree: skip bounds tests, check every item exactly.
    Exact,
    /// Subtree fully inside the sphere: yield everything.
    All,
}

/// Radius query over an [`Octree`].
///
/// Traversal uses three tiers per node: subtrees whose bounds lie entirely inside the sphere are
/// yielded without distance checks, subtrees holding fewer than [`BRUTE_FORCE_THRESHOLD`] items
/// are scanned with exact checks and no further bounds tests, and everything else checks its own
/// bucket exactly and descends.
pub struct RadiusIter<'a, K> {
    tree: &'a Octree<K>,
    sphere: Sphere,
    stack: Vec<(Idx, Mode)>,
    bucket: slice::Iter<'a, Entry<K>>,
    check_bucket: bool,
}

impl<'a, K: Copy> RadiusIter<'a, K> {
    pub(crate) fn new(tree: &'a Octree<K>, sphere: Sphere) -> Self {
        let stack = if tree.is_empty() {
            Vec::new()
        } else {
            vec![(ROOT, Mode::Test)]
        };

        Self {
            tree,
            sphere,
            stack,
            bucket: slice::Iter::default(),
            check_bucket: true,
        }
    }
}

impl<K: Copy> Iterator for RadiusIter<'_, K> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for entry in self.bucket.by_ref() {
                if !self.check_bucket || self.sphere.contains_point(entry.position) {
                    return Some(entry.key);
                }
            }

            let (idx, mode) = self.stack.pop()?;
            let tree = self.tree;
            let node = &tree.nodes[idx as usize];

            if node.count == 0 {
                continue;
            }

            let mode = match mode {
                Mode::Test => {
                    if !self.sphere.intersects_aabb(&node.aabb) {
                        continue;
                    }

                    if self.sphere.contains_aabb(&node.aabb) {
                        Mode::All
                    } else if node.count < BRUTE_FORCE_THRESHOLD {
                        Mode::Exact
                    } else {
                        Mode::Test
                    }
                }
                other => other,
            };

            if let Some(first_child) = node.first_child.inner() {
                self.stack
                    .extend((first_child..first_child + 8).map(|child| (child, mode)));
            }

            self.bucket = node.bucket.iter();
            self.check_bucket = mode != Mode::All;
        }
    }
}
