use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;

/// Query shape for radius searches. Never stored inside an index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    #[must_use]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    fn radius2(&self) -> f64 {
        let radius = f64::from(self.radius);
        radius * radius
    }

    /// Exact containment, boundary included.
    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.center.as_dvec3().distance_squared(point.as_dvec3()) <= self.radius2()
    }

    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        aabb.dist2(self.center) <= self.radius2()
    }

    /// True when every point of `aabb` lies inside the sphere (all eight corners within radius).
    #[must_use]
    pub fn contains_aabb(&self, aabb: &Aabb) -> bool {
        aabb.farthest_dist2(self.center) <= self.radius2()
    }

    /// The cheap face test: the center lies inside `aabb` and each of the six distances from
    /// the center to the box faces is at most the radius.
    ///
    /// This is weaker than [`Self::contains_aabb`]: the corners of a box can lie outside a
    /// sphere that passes it, so it must not gate an unchecked visit of the box contents.
    #[must_use]
    pub fn reaches_all_faces(&self, aabb: &Aabb) -> bool {
        if !aabb.contains_point(self.center) {
            return false;
        }

        let to_min = self.center - aabb.min;
        let to_max = aabb.max - self.center;

        to_min.max(to_max).max_element() <= self.radius
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::cube(self.center, self.radius)
    }
}
