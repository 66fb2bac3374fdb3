use std::fmt::{Debug, Display};

use arrayvec::ArrayVec;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ray::{LineHit, Ray, RayHit};

#[derive(Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl From<[f32; 6]> for Aabb {
    fn from(value: [f32; 6]) -> Self {
        let [min_x, min_y, min_z, max_x, max_y, max_z] = value;
        let min = Vec3::new(min_x, min_y, min_z);
        let max = Vec3::new(max_x, max_y, max_z);

        Self { min, max }
    }
}

impl FromIterator<Self> for Aabb {
    fn from_iter<T: IntoIterator<Item = Self>>(iter: T) -> Self {
        let mut result = Self::NULL;

        for aabb in iter {
            result.expand_to_fit(&aabb);
        }

        result
    }
}

impl FromIterator<Vec3> for Aabb {
    fn from_iter<T: IntoIterator<Item = Vec3>>(iter: T) -> Self {
        let mut result = Self::NULL;

        for point in iter {
            result.expand_to_point(point);
        }

        result
    }
}

impl Debug for Aabb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for Aabb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // write [0.00, 0.00, 0.00] -> [1.00, 1.00, 1.00]
        write!(
            f,
            "[{:.2}, {:.2}, {:.2}] -> [{:.2}, {:.2}, {:.2}]",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::NULL
    }
}

/// Per-axis slab test result for a line through `origin` along `direction`.
struct Slabs {
    t_min: f32,
    t_max: f32,
    entry_axis: usize,
    exit_axis: usize,
}

impl Aabb {
    /// Unbounded box. Passing this where a clip region is expected means "no clipping".
    pub const EVERYTHING: Self = Self {
        min: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        max: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
    };
    /// Empty box; the identity for [`Self::expand_to_fit`].
    pub const NULL: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    #[must_use]
    pub fn new(min: impl Into<Vec3>, max: impl Into<Vec3>) -> Self {
        let min = min.into();
        let max = max.into();
        debug_assert!(
            min.cmple(max).all(),
            "aabb min {min} must not exceed max {max}"
        );
        Self { min, max }
    }

    /// Zero-volume box around a single point.
    #[must_use]
    pub const fn point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Cube centered at `center` with the given half extent.
    #[must_use]
    pub fn cube(center: Vec3, half_extent: f32) -> Self {
        Self::new(center - half_extent, center + half_extent)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Check if a point is inside the AABB, boundary included.
    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn expand_to_fit(&mut self, other: &Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn expand_to_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    #[must_use]
    pub fn mid(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    #[must_use]
    pub fn lens(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index (0 = x, 1 = y, 2 = z) of the longest side. Ties resolve toward x.
    #[must_use]
    pub fn longest_axis(&self) -> usize {
        let lens = self.lens();

        if lens.x >= lens.y && lens.x >= lens.z {
            0
        } else if lens.y >= lens.z {
            1
        } else {
            2
        }
    }

    /// Squared distance from `point` to the closest point of the box; zero when inside.
    #[must_use]
    pub fn dist2(&self, point: Vec3) -> f64 {
        let point = point.as_dvec3();
        // Clamp the point into the box volume.
        let clamped = point.clamp(self.min.as_dvec3(), self.max.as_dvec3());

        (point - clamped).length_squared()
    }

    /// Squared distance from `point` to the farthest corner of the box.
    #[must_use]
    pub fn farthest_dist2(&self, point: Vec3) -> f64 {
        let point = point.as_dvec3();
        let to_min = (point - self.min.as_dvec3()).abs();
        let to_max = (point - self.max.as_dvec3()).abs();

        to_min.max(to_max).length_squared()
    }

    fn slabs(&self, ray: &Ray) -> Option<Slabs> {
        let origin = ray.origin();
        let dir = ray.direction();

        let mut slabs = Slabs {
            t_min: f32::NEG_INFINITY,
            t_max: f32::INFINITY,
            entry_axis: 0,
            exit_axis: 0,
        };

        for axis in 0..3 {
            let (o, d) = (origin[axis], dir[axis]);
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d == 0.0 {
                // parallel to this slab; no constraint unless outside it
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let t1 = (lo - o) * inv;
            let t2 = (hi - o) * inv;
            let (near, far) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };

            if near > slabs.t_min {
                slabs.t_min = near;
                slabs.entry_axis = axis;
            }
            if far < slabs.t_max {
                slabs.t_max = far;
                slabs.exit_axis = axis;
            }

            if slabs.t_min > slabs.t_max {
                return None;
            }
        }

        Some(slabs)
    }

    /// Intersects the infinite line through `ray.origin()` along `ray.direction()` with the box.
    ///
    /// Returns either no hits or both, ordered by `|t|` so that the hit nearest the origin comes
    /// first regardless of whether it lies ahead of or behind the origin.
    #[must_use]
    pub fn intersect_line(&self, ray: &Ray) -> ArrayVec<LineHit, 2> {
        let mut hits = ArrayVec::new();

        let Some(slabs) = self.slabs(ray) else {
            return hits;
        };

        if !slabs.t_min.is_finite() || !slabs.t_max.is_finite() {
            return hits;
        }

        let (first, second) = if slabs.t_max.abs() < slabs.t_min.abs() {
            (slabs.t_max, slabs.t_min)
        } else {
            (slabs.t_min, slabs.t_max)
        };

        hits.push(LineHit::new(first, ray.at(first)));
        hits.push(LineHit::new(second, ray.at(second)));

        hits
    }

    /// Nearest boundary hit of a ray travelling forward at most `max_length` world units.
    ///
    /// From outside, the hit is the entry point and the normal is the outward normal of the
    /// entered face. From inside, the hit is the exit point and the normal is the inward normal
    /// of the exited face. Either way the normal points back against the ray.
    ///
    /// `epsilon` is the tolerance for treating an exit slightly behind the origin, or an entry
    /// slightly beyond `max_length`, as a hit.
    #[must_use]
    pub fn intersect_ray(&self, ray: &Ray, max_length: f32, epsilon: f32) -> Option<RayHit> {
        let slabs = self.slabs(ray)?;

        if slabs.t_max < -epsilon {
            // box is entirely behind the origin
            return None;
        }

        let (t, axis) = if self.contains_point(ray.origin()) {
            (slabs.t_max, slabs.exit_axis)
        } else {
            (slabs.t_min.max(0.0), slabs.entry_axis)
        };

        if !t.is_finite() {
            return None;
        }

        let length = ray.direction().length();
        if t * length > max_length + epsilon {
            return None;
        }

        let mut normal = Vec3::ZERO;
        normal[axis] = -ray.direction()[axis].signum();

        Some(RayHit {
            t,
            point: ray.at(t),
            normal,
        })
    }
}
