//! One interface over both neighbor indexes, so the flock driver can swap them at runtime.

use bvh_region::Bvh;
use geometry::{Aabb, Sphere};
use glam::Vec3;
use octree::Octree;
use rayon::iter::Either;
use serde::{Deserialize, Serialize};
use slotmap::Key;

mod neighborhood;

pub use neighborhood::{Neighborhood, SharedCandidates};

/// Point index answering "which items lie within this sphere".
pub trait SpatialIndex<K: Key> {
    /// Returns `false` when the item was not added: outside the octree boundary, or already
    /// present in the BVH.
    fn insert(&mut self, key: K, position: Vec3) -> bool;

    /// Single-item removal. Returns `false` when there was nothing to remove or the index only
    /// supports wholesale rebuilds.
    fn remove(&mut self, key: K) -> bool;

    fn clear(&mut self);

    /// Per-frame refresh from the current positions of every item.
    fn rebuild(&mut self, items: impl IntoIterator<Item = (K, Vec3)>);

    /// Every item within `sphere`, each exactly once, in no particular order.
    fn query_radius(&self, sphere: Sphere) -> impl Iterator<Item = K> + '_;

    fn for_each_in_radius(&self, sphere: Sphere, mut visit: impl FnMut(K)) {
        for key in self.query_radius(sphere) {
            visit(key);
        }
    }

    /// Bounds of occupied octree nodes or BVH leaves.
    fn leaf_bounds(&self) -> Vec<Aabb>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Key> SpatialIndex<K> for Octree<K> {
    fn insert(&mut self, key: K, position: Vec3) -> bool {
        Self::insert(self, key, position)
    }

    fn remove(&mut self, _key: K) -> bool {
        false
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn rebuild(&mut self, items: impl IntoIterator<Item = (K, Vec3)>) {
        Self::rebuild(self, items);
    }

    fn query_radius(&self, sphere: Sphere) -> impl Iterator<Item = K> + '_ {
        Self::query_radius(self, sphere)
    }

    fn leaf_bounds(&self) -> Vec<Aabb> {
        self.occupied_bounds().collect()
    }

    fn len(&self) -> usize {
        Self::len(self)
    }
}

impl<K: Key> SpatialIndex<K> for Bvh<K> {
    fn insert(&mut self, key: K, position: Vec3) -> bool {
        Self::insert(self, key, position)
    }

    fn remove(&mut self, key: K) -> bool {
        Self::remove(self, key)
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn rebuild(&mut self, items: impl IntoIterator<Item = (K, Vec3)>) {
        self.refresh(items);
    }

    fn query_radius(&self, sphere: Sphere) -> impl Iterator<Item = K> + '_ {
        Self::query_radius(self, sphere)
    }

    fn leaf_bounds(&self) -> Vec<Aabb> {
        Self::leaf_bounds(self).collect()
    }

    fn len(&self) -> usize {
        Self::len(self)
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Fixed-octant bucketed octree, rebuilt from scratch each frame.
    #[default]
    Octree,
    /// Mean-split binary BVH with incremental insert and removal.
    Binary,
}

/// Construction parameters for an [`Index`]. The octree fields are ignored by the BVH.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub kind: IndexKind,
    pub capacity: usize,
    pub max_depth: u8,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexKind::default(),
            capacity: octree::DEFAULT_CAPACITY,
            max_depth: octree::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Either index, chosen at construction.
#[derive(Debug, Clone)]
pub enum Index<K: Key> {
    Octree(Octree<K>),
    Binary(Bvh<K>),
}

impl<K: Key> Index<K> {
    /// `boundary` is the octree root; items outside it are dropped on insert.
    #[must_use]
    pub fn new(config: &IndexConfig, boundary: Aabb) -> Self {
        match config.kind {
            IndexKind::Octree => Self::Octree(Octree::new(
                boundary,
                config.capacity,
                config.max_depth,
            )),
            IndexKind::Binary => Self::Binary(Bvh::new()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> IndexKind {
        match self {
            Self::Octree(_) => IndexKind::Octree,
            Self::Binary(_) => IndexKind::Binary,
        }
    }
}

impl<K: Key> SpatialIndex<K> for Index<K> {
    fn insert(&mut self, key: K, position: Vec3) -> bool {
        match self {
            Self::Octree(tree) => SpatialIndex::insert(tree, key, position),
            Self::Binary(bvh) => SpatialIndex::insert(bvh, key, position),
        }
    }

    fn remove(&mut self, key: K) -> bool {
        match self {
            Self::Octree(tree) => SpatialIndex::remove(tree, key),
            Self::Binary(bvh) => SpatialIndex::remove(bvh, key),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Octree(tree) => SpatialIndex::clear(tree),
            Self::Binary(bvh) => SpatialIndex::clear(bvh),
        }
    }

    #[tracing::instrument(skip_all, fields(kind = ?self.kind()))]
    fn rebuild(&mut self, items: impl IntoIterator<Item = (K, Vec3)>) {
        match self {
            Self::Octree(tree) => SpatialIndex::rebuild(tree, items),
            Self::Binary(bvh) => SpatialIndex::rebuild(bvh, items),
        }
    }

    fn query_radius(&self, sphere: Sphere) -> impl Iterator<Item = K> + '_ {
        match self {
            Self::Octree(tree) => Either::Left(tree.query_radius(sphere)),
            Self::Binary(bvh) => Either::Right(bvh.query_radius(sphere)),
        }
    }

    fn leaf_bounds(&self) -> Vec<Aabb> {
        match self {
            Self::Octree(tree) => SpatialIndex::leaf_bounds(tree),
            Self::Binary(bvh) => SpatialIndex::leaf_bounds(bvh),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Octree(tree) => tree.len(),
            Self::Binary(bvh) => bvh.len(),
        }
    }
}
