use geometry::Sphere;
use glam::Vec3;
use rayon::iter::Either;
use slotmap::Key;

use crate::SpatialIndex;

/// Superset of neighbors gathered once and filtered by several behaviors with smaller radii.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedCandidates<K> {
    pub keys: Vec<K>,
    /// Radius the keys were gathered with. Only queries at or below it may use them.
    pub radius: f32,
}

impl<K: Key> SharedCandidates<K> {
    pub fn gather(index: &impl SpatialIndex<K>, center: Vec3, radius: f32) -> Self {
        Self {
            keys: index.query_radius(Sphere::new(center, radius)).collect(),
            radius,
        }
    }

    /// Refills in place, reusing the allocation.
    pub fn regather(&mut self, index: &impl SpatialIndex<K>, center: Vec3, radius: f32) {
        self.keys.clear();
        self.keys
            .extend(index.query_radius(Sphere::new(center, radius)));
        self.radius = radius;
    }
}

/// What a steering behavior sees of the index for one agent in one frame.
#[derive(Debug)]
pub struct Neighborhood<'a, K, I> {
    index: &'a I,
    shared: Option<&'a SharedCandidates<K>>,
}

impl<K, I> Clone for Neighborhood<'_, K, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, I> Copy for Neighborhood<'_, K, I> {}

impl<'a, K: Key, I: SpatialIndex<K>> Neighborhood<'a, K, I> {
    pub const fn new(index: &'a I) -> Self {
        Self {
            index,
            shared: None,
        }
    }

    pub const fn with_shared(index: &'a I, shared: &'a SharedCandidates<K>) -> Self {
        Self {
            index,
            shared: Some(shared),
        }
    }

    pub const fn index(&self) -> &'a I {
        self.index
    }

    pub const fn shared(&self) -> Option<&'a SharedCandidates<K>> {
        self.shared
    }

    /// Items within `radius` of `center`, judged against `position_of`.
    ///
    /// Filters the shared candidates when they were gathered with at least `radius`. A larger
    /// radius falls back to querying the index, since the shared list may miss items.
    pub fn neighbors<F>(&self, center: Vec3, radius: f32, position_of: F) -> impl Iterator<Item = K>
    where
        F: Fn(K) -> Vec3,
    {
        let sphere = Sphere::new(center, radius);

        match self.shared {
            Some(shared) if radius <= shared.radius => Either::Left(
                shared
                    .keys
                    .iter()
                    .copied()
                    .filter(move |key| sphere.contains_point(position_of(*key))),
            ),
            _ => Either::Right(self.index.query_radius(sphere)),
        }
    }
}
