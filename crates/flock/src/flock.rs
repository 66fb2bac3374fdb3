use geometry::{Aabb, boundary::mirror_across_boundary};
use glam::Vec3;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use slotmap::SlotMap;
use spatial::{Index, Neighborhood, SharedCandidates, SpatialIndex};
use tracing::{debug, instrument, trace};

use crate::{
    behavior::{Behavior, SteerContext},
    boid::{Boid, BoidKey, Limits},
    config::FlockConfig,
};

/// The simulation: boids, the index over their positions, and the behaviors that steer them.
#[derive(Debug)]
pub struct Flock {
    boids: SlotMap<BoidKey, Boid>,
    index: Index<BoidKey>,
    behaviors: Vec<Box<dyn Behavior>>,
    world: Aabb,
    limits: Limits,
    max_dt: f32,
    sharing_radius: f32,
    parallel: bool,
    frame: u64,
}

impl Flock {
    /// An empty flock with the configured index and the standard behaviors.
    #[must_use]
    pub fn new(config: &FlockConfig) -> Self {
        let world = config.world();

        Self {
            boids: SlotMap::with_key(),
            index: Index::new(&config.index, world),
            behaviors: config.behaviors(),
            world,
            limits: config.limits(),
            max_dt: config.max_dt,
            sharing_radius: config.sharing_radius,
            parallel: config.parallel,
            frame: 0,
        }
    }

    /// A flock of `config.count` boids at seeded random positions and headings.
    #[must_use]
    pub fn populated(config: &FlockConfig) -> Self {
        let mut flock = Self::new(config);
        let mut rng = fastrand::Rng::with_seed(config.seed);

        let speed = (config.min_speed + config.max_speed) * 0.5;

        for _ in 0..config.count {
            let position = random_in(&mut rng, &flock.world);
            let direction = random_unit(&mut rng);
            flock.spawn(Boid::new(position, direction * speed));
        }

        debug!(count = flock.len(), kind = ?flock.index.kind(), "populated flock");
        flock
    }

    pub fn spawn(&mut self, boid: Boid) -> BoidKey {
        let key = self.boids.insert(boid);

        if !self.index.insert(key, boid.position) {
            trace!(?key, position = %boid.position, "boid not indexed until next frame");
        }

        key
    }

    /// Removes a boid from the flock, and from the index when it supports single removals.
    pub fn despawn(&mut self, key: BoidKey) -> Option<Boid> {
        let boid = self.boids.remove(key)?;
        self.index.remove(key);
        Some(boid)
    }

    pub fn push_behavior(&mut self, behavior: Box<dyn Behavior>) {
        self.behaviors.push(behavior);
    }

    pub fn clear_behaviors(&mut self) {
        self.behaviors.clear();
    }

    #[must_use]
    pub fn behaviors(&self) -> &[Box<dyn Behavior>] {
        &self.behaviors
    }

    #[must_use]
    pub fn get(&self, key: BoidKey) -> Option<&Boid> {
        self.boids.get(key)
    }

    pub fn boids(&self) -> impl Iterator<Item = (BoidKey, &Boid)> + '_ {
        self.boids.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    #[must_use]
    pub const fn index(&self) -> &Index<BoidKey> {
        &self.index
    }

    #[must_use]
    pub const fn world(&self) -> Aabb {
        self.world
    }

    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Bounds of the index's leaves as of the last step, for visualizers.
    #[must_use]
    pub fn leaf_bounds(&self) -> Vec<Aabb> {
        self.index.leaf_bounds()
    }

    /// Mean position of every boid.
    #[must_use]
    pub fn centroid(&self) -> Option<Vec3> {
        if self.boids.is_empty() {
            return None;
        }

        let sum: Vec3 = self.boids.values().map(|boid| boid.position).sum();
        Some(sum / self.boids.len() as f32)
    }

    #[must_use]
    pub fn mean_speed(&self) -> f32 {
        if self.boids.is_empty() {
            return 0.0;
        }

        let sum: f32 = self.boids.values().map(|boid| boid.velocity.length()).sum();
        sum / self.boids.len() as f32
    }

    /// Largest behavior radius within the sharing radius. Behaviors at or below it reuse one
    /// query per boid; larger ones query the index themselves.
    #[must_use]
    pub fn shared_radius(&self) -> Option<f32> {
        if self.sharing_radius <= 0.0 {
            return None;
        }

        self.behaviors
            .iter()
            .map(|behavior| behavior.radius())
            .filter(|radius| *radius > 0.0 && *radius <= self.sharing_radius)
            .reduce(f32::max)
    }

    /// Advances the simulation by `dt` seconds, clamped to `[0, max_dt]`.
    ///
    /// The index is rebuilt from the current positions first, then every boid's steering force is
    /// computed against that snapshot, and only then are boids moved.
    #[instrument(skip_all, fields(frame = self.frame, boids = self.boids.len()))]
    pub fn step(&mut self, dt: f32) {
        let dt = dt.clamp(0.0, self.max_dt);
        if dt < self.max_dt {
            trace!(dt, "stepping");
        } else {
            debug!(dt, max_dt = self.max_dt, "time step clamped");
        }

        self.index.rebuild(
            self.boids
                .iter()
                .map(|(key, boid)| (key, boid.position)),
        );

        let shared_radius = self.shared_radius();
        let keys: Vec<BoidKey> = self.boids.keys().collect();

        let forces: Vec<Vec3> = if self.parallel {
            keys.par_iter()
                .map(|key| self.steering_force(*key, shared_radius))
                .collect()
        } else {
            keys.iter()
                .map(|key| self.steering_force(*key, shared_radius))
                .collect()
        };

        for (key, force) in keys.into_iter().zip(forces) {
            let boid = &mut self.boids[key];
            boid.integrate(force, dt, &self.limits);
            boid.position = mirror_across_boundary(boid.position, &self.world);
        }

        self.frame += 1;
    }

    /// Weighted sum of every behavior's force on one boid.
    fn steering_force(&self, key: BoidKey, shared_radius: Option<f32>) -> Vec3 {
        let boid = &self.boids[key];

        let shared = shared_radius
            .map(|radius| SharedCandidates::gather(&self.index, boid.position, radius));

        let neighborhood = match &shared {
            Some(shared) => Neighborhood::with_shared(&self.index, shared),
            None => Neighborhood::new(&self.index),
        };

        let cx = SteerContext {
            boids: &self.boids,
            neighborhood,
            world: self.world,
            limits: self.limits,
        };

        self.behaviors
            .iter()
            .map(|behavior| behavior.steer(key, boid, &cx) * behavior.weight())
            .sum()
    }
}

fn random_in(rng: &mut fastrand::Rng, aabb: &Aabb) -> Vec3 {
    let unit = Vec3::new(rng.f32(), rng.f32(), rng.f32());
    aabb.min + unit * aabb.lens()
}

fn random_unit(rng: &mut fastrand::Rng) -> Vec3 {
    loop {
        let candidate = Vec3::new(rng.f32(), rng.f32(), rng.f32()) * 2.0 - 1.0;
        let length_squared = candidate.length_squared();

        if length_squared > 1e-4 && length_squared <= 1.0 {
            return candidate / length_squared.sqrt();
        }
    }
}
