//! Point-versus-box boundary helpers used to keep agents inside a world box.

use glam::Vec3;

use crate::aabb::Aabb;

/// Shortest vector from `point` to the boundary of `aabb`.
///
/// Outside the box this points at the nearest point of the box. Inside it points at the nearest
/// of the six faces: its length is the smallest face distance and its direction is that face's
/// outward normal.
#[must_use]
pub fn nearest_boundary_vector(point: Vec3, aabb: &Aabb) -> Vec3 {
    if !aabb.contains_point(point) {
        return point.clamp(aabb.min, aabb.max) - point;
    }

    let to_min = point - aabb.min;
    let to_max = aabb.max - point;

    let mut best = f32::INFINITY;
    let mut result = Vec3::ZERO;

    for axis in 0..3 {
        if to_min[axis] < best {
            best = to_min[axis];
            result = Vec3::ZERO;
            result[axis] = -to_min[axis];
        }
        if to_max[axis] < best {
            best = to_max[axis];
            result = Vec3::ZERO;
            result[axis] = to_max[axis];
        }
    }

    result
}

/// Push that moves `point` at least `epsilon` away from every face it is closer than `epsilon`
/// to. Zero when the point is outside the box or already clear of all faces.
#[must_use]
pub fn vector_away_from_boundary(point: Vec3, aabb: &Aabb, epsilon: f32) -> Vec3 {
    if !aabb.contains_point(point) {
        return Vec3::ZERO;
    }

    let to_min = point - aabb.min;
    let to_max = aabb.max - point;

    let mut result = Vec3::ZERO;

    for axis in 0..3 {
        if to_min[axis] < epsilon {
            result[axis] += epsilon - to_min[axis];
        }
        if to_max[axis] < epsilon {
            result[axis] -= epsilon - to_max[axis];
        }
    }

    result
}

/// Wraps `point` around `aabb`: the distance by which it overshoots a face on an axis is carried
/// over from the opposite face. Axes are handled independently; inside points are unchanged.
#[must_use]
pub fn mirror_across_boundary(point: Vec3, aabb: &Aabb) -> Vec3 {
    let mut result = point;

    for axis in 0..3 {
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if point[axis] < lo {
            result[axis] = hi - (lo - point[axis]);
        } else if point[axis] > hi {
            result[axis] = lo + (point[axis] - hi);
        }
    }

    result
}
