use geometry::{Aabb, Sphere, boundary::mirror_across_boundary};
use glam::Vec3;
use proptest::prelude::*;

fn aabb_strategy() -> impl Strategy<Value = Aabb> {
    (
        -100.0..100.0f32,
        -100.0..100.0f32,
        -100.0..100.0f32,
        -100.0..100.0f32,
        -100.0..100.0f32,
        -100.0..100.0f32,
    )
        .prop_map(|(x1, y1, z1, x2, y2, z2)| {
            Aabb::from([
                x1.min(x2),
                y1.min(y2),
                z1.min(z2),
                x1.max(x2),
                y1.max(y2),
                z1.max(z2),
            ])
        })
}

fn corners(aabb: &Aabb) -> impl Iterator<Item = Vec3> + '_ {
    (0..8).map(|i| {
        Vec3::new(
            if i & 1 == 0 { aabb.min.x } else { aabb.max.x },
            if i & 2 == 0 { aabb.min.y } else { aabb.max.y },
            if i & 4 == 0 { aabb.min.z } else { aabb.max.z },
        )
    })
}

proptest! {
    #[test]
    fn contained_box_has_every_corner_inside(
        aabb in aabb_strategy(),
        center in (-100.0..100.0f32, -100.0..100.0f32, -100.0..100.0f32),
        radius in 0.0..300.0f32,
    ) {
        let sphere = Sphere::new(Vec3::new(center.0, center.1, center.2), radius);

        if sphere.contains_aabb(&aabb) {
            for corner in corners(&aabb) {
                prop_assert!(sphere.contains_point(corner), "corner {corner} escapes {sphere:?}");
            }
            prop_assert!(sphere.intersects_aabb(&aabb));
        }
    }

    #[test]
    fn intersection_agrees_with_clamped_point(
        aabb in aabb_strategy(),
        center in (-100.0..100.0f32, -100.0..100.0f32, -100.0..100.0f32),
        radius in 0.0..100.0f32,
    ) {
        let center = Vec3::new(center.0, center.1, center.2);
        let sphere = Sphere::new(center, radius);
        let closest = center.clamp(aabb.min, aabb.max);

        prop_assert_eq!(sphere.intersects_aabb(&aabb), sphere.contains_point(closest));
    }

    #[test]
    fn mirrored_points_land_inside(
        aabb in aabb_strategy(),
        offset in (-1.0..1.0f32, -1.0..1.0f32, -1.0..1.0f32),
    ) {
        // overshoot by less than one box length on each axis
        let lens = aabb.lens();
        let point = aabb.mid() + Vec3::new(offset.0, offset.1, offset.2) * lens;
        let wrapped = mirror_across_boundary(point, &aabb);

        let slack = Vec3::splat(1e-3);
        prop_assert!(
            wrapped.cmpge(aabb.min - slack).all() && wrapped.cmple(aabb.max + slack).all(),
            "{point} wrapped to {wrapped} outside {aabb}"
        );
    }
}
