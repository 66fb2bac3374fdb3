//! Steering behaviors. Each one turns what a boid can see of its neighbors into a force.

use std::fmt::Debug;

use geometry::{Aabb, Ray, boundary::vector_away_from_boundary};
use glam::Vec3;
use slotmap::SlotMap;
use spatial::{Index, Neighborhood};

use crate::boid::{Boid, BoidKey, Limits};

/// Everything a behavior may read while steering one boid. Built once per boid per frame.
pub struct SteerContext<'a> {
    pub boids: &'a SlotMap<BoidKey, Boid>,
    pub neighborhood: Neighborhood<'a, BoidKey, Index<BoidKey>>,
    pub world: Aabb,
    pub limits: Limits,
}

impl SteerContext<'_> {
    /// Other boids within `radius` of `boid`.
    pub fn neighbors(
        &self,
        key: BoidKey,
        boid: &Boid,
        radius: f32,
    ) -> impl Iterator<Item = &Boid> + '_ {
        let boids = self.boids;

        self.neighborhood
            .neighbors(boid.position, radius, move |other| {
                boids.get(other).map_or(Vec3::NAN, |other| other.position)
            })
            .filter(move |other| *other != key)
            .filter_map(move |other| boids.get(other))
    }

    /// Reynolds steering: the change that turns `velocity` toward `direction` at full speed,
    /// capped at the maximum force.
    #[must_use]
    pub fn steer_towards(&self, direction: Vec3, velocity: Vec3) -> Vec3 {
        let Some(direction) = direction.try_normalize() else {
            return Vec3::ZERO;
        };

        (direction * self.limits.max_speed - velocity).clamp_length_max(self.limits.max_force)
    }
}

/// A pluggable steering rule.
pub trait Behavior: Debug + Send + Sync {
    /// Perception radius. Zero for behaviors that ignore neighbors.
    fn radius(&self) -> f32;

    fn weight(&self) -> f32;

    /// Unweighted steering force for `boid`.
    fn steer(&self, key: BoidKey, boid: &Boid, cx: &SteerContext<'_>) -> Vec3;
}

/// Moves away from crowding neighbors, harder the closer they are.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Separation {
    pub radius: f32,
    pub weight: f32,
}

impl Behavior for Separation {
    fn radius(&self) -> f32 {
        self.radius
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn steer(&self, key: BoidKey, boid: &Boid, cx: &SteerContext<'_>) -> Vec3 {
        let mut push = Vec3::ZERO;

        for other in cx.neighbors(key, boid, self.radius) {
            let away = boid.position - other.position;
            let distance_squared = away.length_squared();

            // coincident boids have no direction to separate along
            if distance_squared > f32::EPSILON {
                push += away / distance_squared;
            }
        }

        cx.steer_towards(push, boid.velocity)
    }
}

/// Matches the mean heading of neighbors.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Alignment {
    pub radius: f32,
    pub weight: f32,
}

impl Behavior for Alignment {
    fn radius(&self) -> f32 {
        self.radius
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn steer(&self, key: BoidKey, boid: &Boid, cx: &SteerContext<'_>) -> Vec3 {
        let heading: Vec3 = cx
            .neighbors(key, boid, self.radius)
            .map(Boid::heading)
            .sum();

        cx.steer_towards(heading, boid.velocity)
    }
}

/// Seeks the centroid of neighbors.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Cohesion {
    pub radius: f32,
    pub weight: f32,
}

impl Behavior for Cohesion {
    fn radius(&self) -> f32 {
        self.radius
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn steer(&self, key: BoidKey, boid: &Boid, cx: &SteerContext<'_>) -> Vec3 {
        let (sum, count) = cx
            .neighbors(key, boid, self.radius)
            .fold((Vec3::ZERO, 0u32), |(sum, count), other| {
                (sum + other.position, count + 1)
            });

        if count == 0 {
            return Vec3::ZERO;
        }

        let centroid = sum / count as f32;
        cx.steer_towards(centroid - boid.position, boid.velocity)
    }
}

/// Keeps boids off the world walls.
///
/// Looks `look_ahead` units along the heading; if that ray leaves the world, steers along the
/// inward normal of the wall it would cross, harder the sooner it would hit. Boids already
/// within `margin` of a wall are also pushed straight back in.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Containment {
    pub look_ahead: f32,
    pub margin: f32,
    pub weight: f32,
}

impl Behavior for Containment {
    fn radius(&self) -> f32 {
        0.0
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn steer(&self, _key: BoidKey, boid: &Boid, cx: &SteerContext<'_>) -> Vec3 {
        let mut force = Vec3::ZERO;

        let heading = boid.heading();
        if heading != Vec3::ZERO {
            let ray = Ray::new(boid.position, heading);

            if let Some(hit) = cx.world.intersect_ray(&ray, self.look_ahead, 1e-4) {
                let urgency = 1.0 - (hit.t / self.look_ahead).clamp(0.0, 1.0);
                force += cx.steer_towards(hit.normal, boid.velocity) * urgency;
            }
        }

        let away = vector_away_from_boundary(boid.position, &cx.world, self.margin);
        if away != Vec3::ZERO {
            force += cx.steer_towards(away, boid.velocity);
        }

        force.clamp_length_max(cx.limits.max_force)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geometry::Aabb;
    use glam::Vec3;
    use slotmap::SlotMap;
    use spatial::{Index, IndexConfig, IndexKind, Neighborhood, SpatialIndex};

    use super::*;

    const LIMITS: Limits = Limits {
        min_speed: 0.0,
        max_speed: 2.0,
        max_force: 1.0,
    };

    struct Scene {
        boids: SlotMap<BoidKey, Boid>,
        index: Index<BoidKey>,
        world: Aabb,
    }

    impl Scene {
        fn new(boids: &[Boid]) -> (Self, Vec<BoidKey>) {
            let world = Aabb::cube(Vec3::ZERO, 20.0);
            let mut slots = SlotMap::with_key();
            let keys = boids.iter().map(|boid| slots.insert(*boid)).collect();

            let config = IndexConfig {
                kind: IndexKind::Binary,
                ..IndexConfig::default()
            };
            let mut index = Index::new(&config, world);
            index.rebuild(slots.iter().map(|(key, boid)| (key, boid.position)));

            (
                Self {
                    boids: slots,
                    index,
                    world,
                },
                keys,
            )
        }

        fn steer(&self, behavior: &dyn Behavior, key: BoidKey) -> Vec3 {
            let cx = SteerContext {
                boids: &self.boids,
                neighborhood: Neighborhood::new(&self.index),
                world: self.world,
                limits: LIMITS,
            };
            behavior.steer(key, &self.boids[key], &cx)
        }
    }

    fn still(position: Vec3) -> Boid {
        Boid::new(position, Vec3::ZERO)
    }

    #[test]
    fn separation_pushes_away_from_close_neighbor() {
        let (scene, keys) = Scene::new(&[still(Vec3::ZERO), still(Vec3::new(1.0, 0.0, 0.0))]);
        let behavior = Separation {
            radius: 2.0,
            weight: 1.0,
        };

        let force = scene.steer(&behavior, keys[0]);
        assert!(force.x < 0.0);
        assert_relative_eq!(force.length(), LIMITS.max_force, epsilon = 1e-5);
    }

    #[test]
    fn separation_ignores_coincident_and_distant_boids() {
        let (scene, keys) = Scene::new(&[
            still(Vec3::ZERO),
            still(Vec3::ZERO),
            still(Vec3::new(5.0, 0.0, 0.0)),
        ]);
        let behavior = Separation {
            radius: 2.0,
            weight: 1.0,
        };

        assert_eq!(scene.steer(&behavior, keys[0]), Vec3::ZERO);
    }

    #[test]
    fn cohesion_seeks_centroid() {
        let (scene, keys) = Scene::new(&[
            still(Vec3::ZERO),
            still(Vec3::new(0.0, 2.0, 0.0)),
            still(Vec3::new(0.0, 4.0, 0.0)),
        ]);
        let behavior = Cohesion {
            radius: 5.0,
            weight: 1.0,
        };

        let force = scene.steer(&behavior, keys[0]);
        assert!(force.y > 0.0);
        assert_relative_eq!(force.x, 0.0);
        assert_relative_eq!(force.z, 0.0);
    }

    #[test]
    fn lonely_boid_feels_nothing() {
        let (scene, keys) = Scene::new(&[still(Vec3::ZERO), still(Vec3::splat(15.0))]);

        assert_eq!(
            scene.steer(&Cohesion { radius: 3.0, weight: 1.0 }, keys[0]),
            Vec3::ZERO
        );
        assert_eq!(
            scene.steer(&Alignment { radius: 3.0, weight: 1.0 }, keys[0]),
            Vec3::ZERO
        );
    }

    #[test]
    fn alignment_turns_toward_neighbors_heading() {
        let (scene, keys) = Scene::new(&[
            Boid::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)),
            Boid::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0)),
        ]);
        let behavior = Alignment {
            radius: 3.0,
            weight: 1.0,
        };

        let force = scene.steer(&behavior, keys[0]);
        assert!(force.z > 0.0);
        assert!(force.x < 0.0);
    }

    #[test]
    fn containment_turns_back_before_the_wall() {
        let (scene, keys) = Scene::new(&[
            Boid::new(Vec3::new(17.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)),
            Boid::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)),
        ]);
        let behavior = Containment {
            look_ahead: 5.0,
            margin: 1.0,
            weight: 1.0,
        };

        let near_wall = scene.steer(&behavior, keys[0]);
        assert!(near_wall.x < 0.0);

        // wall is 20 away, outside the look-ahead
        assert_eq!(scene.steer(&behavior, keys[1]), Vec3::ZERO);
    }

    #[test]
    fn containment_pushes_out_of_the_margin() {
        let (scene, keys) = Scene::new(&[Boid::new(
            Vec3::new(0.0, -19.5, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
        )]);
        let behavior = Containment {
            look_ahead: 1.0,
            margin: 1.0,
            weight: 1.0,
        };

        let force = scene.steer(&behavior, keys[0]);
        assert!(force.y > 0.0);
    }
}
