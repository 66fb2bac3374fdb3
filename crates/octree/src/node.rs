use geometry::Aabb;
use glam::Vec3;

use crate::idx::OptionalIdx;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Entry<K> {
    pub key: K,
    pub position: Vec3,
}

#[derive(Debug, Clone)]
pub struct Node<K> {
    pub aabb: Aabb,
    pub depth: u8,
    pub bucket: Vec<Entry<K>>,

    /// The eight children occupy `first_child..first_child + 8`, ordered by [`octant`].
    pub first_child: OptionalIdx,

    /// Items in this node and all of its descendants.
    pub count: u32,
}

impl<K> Node<K> {
    pub const fn new(aabb: Aabb, depth: u8) -> Self {
        Self {
            aabb,
            depth,
            bucket: Vec::new(),
            first_child: OptionalIdx::NONE,
            count: 0,
        }
    }

    pub const fn is_subdivided(&self) -> bool {
        !self.first_child.is_null()
    }
}

/// Bounds of octant `index` of `aabb`; bit 0 selects the upper x half, bit 1 y, bit 2 z.
pub fn octant(aabb: &Aabb, index: usize) -> Aabb {
    debug_assert!(index < 8);

    let mid = aabb.mid();
    let mut min = aabb.min;
    let mut max = mid;

    for axis in 0..3 {
        if index & (1 << axis) != 0 {
            min[axis] = mid[axis];
            max[axis] = aabb.max[axis];
        }
    }

    Aabb { min, max }
}
