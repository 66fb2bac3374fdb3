use geometry::Sphere;
use slotmap::Key;

use crate::Bvh;

mod radius;

pub use radius::RadiusIter;

impl<K: Key> Bvh<K> {
    /// Every item within `sphere`, each exactly once, in no particular order.
    pub fn query_radius(&self, sphere: Sphere) -> RadiusIter<'_, K> {
        RadiusIter::new(self, sphere)
    }
}
