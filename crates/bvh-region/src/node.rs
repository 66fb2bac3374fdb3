use geometry::Aabb;
use glam::Vec3;
use slotmap::{Key, SecondaryMap, new_key_type};

new_key_type! {
    /// Handle of a node in the [`crate::Bvh`] arena.
    pub struct NodeKey;
}

/// Where an item currently lives. Present in the link map iff the item is in the tree.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ItemLink<K> {
    /// Snapshot read by queries and subdivision; refreshed by `update`/`refresh`.
    pub position: Vec3,
    pub owner: NodeKey,
    /// Successor in the owner's list.
    pub next: Option<K>,
}

/// Head of a singly linked list threaded through [`ItemLink::next`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct List<K> {
    pub first: Option<K>,
    pub last: Option<K>,
    pub count: usize,
}

impl<K> Default for List<K> {
    fn default() -> Self {
        Self {
            first: None,
            last: None,
            count: 0,
        }
    }
}

impl<K: Key> List<K> {
    /// Appends `key` without touching its owner.
    pub fn push_back(&mut self, items: &mut SecondaryMap<K, ItemLink<K>>, key: K) {
        items[key].next = None;

        match self.last {
            Some(last) => items[last].next = Some(key),
            None => self.first = Some(key),
        }

        self.last = Some(key);
        self.count += 1;
    }

    /// Moves every item of `other` to the end of `self`. `other` is left empty.
    pub fn append(&mut self, items: &mut SecondaryMap<K, ItemLink<K>>, other: &mut Self) {
        let Some(other_first) = other.first else {
            return;
        };

        match self.last {
            Some(last) => items[last].next = Some(other_first),
            None => self.first = Some(other_first),
        }

        self.last = other.last;
        self.count += other.count;
        *other = Self::default();
    }

    /// Unlinks `key`, scanning for its predecessor. Returns `false` if it is not in the list.
    pub fn unlink(&mut self, items: &mut SecondaryMap<K, ItemLink<K>>, key: K) -> bool {
        let mut prev = None;
        let mut cursor = self.first;

        while let Some(current) = cursor {
            if current == key {
                let next = items[key].next.take();

                match prev {
                    Some(prev) => items[prev].next = next,
                    None => self.first = next,
                }

                if self.last == Some(key) {
                    self.last = prev;
                }

                self.count -= 1;
                return true;
            }

            prev = Some(current);
            cursor = items[current].next;
        }

        false
    }

    pub fn iter<'a>(&self, items: &'a SecondaryMap<K, ItemLink<K>>) -> ListIter<'a, K> {
        ListIter {
            items,
            cursor: self.first,
        }
    }
}

pub struct ListIter<'a, K: Key> {
    items: &'a SecondaryMap<K, ItemLink<K>>,
    cursor: Option<K>,
}

impl<K: Key> Iterator for ListIter<'_, K> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        self.cursor = self.items[key].next;
        Some(key)
    }
}

#[derive(Debug, Clone)]
pub struct BvhNode<K> {
    /// Tight bounds of the node's own items and its children, except right after inserts and
    /// updates, which only ever grow them.
    pub aabb: Aabb,
    pub list: List<K>,
    /// Either no children or exactly two.
    pub children: Option<[NodeKey; 2]>,
    pub parent: Option<NodeKey>,
}

impl<K> BvhNode<K> {
    pub fn new(aabb: Aabb, parent: Option<NodeKey>) -> Self {
        Self {
            aabb,
            list: List::default(),
            children: None,
            parent,
        }
    }

    pub const fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}
