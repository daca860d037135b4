//! Tile-bucketed spatial index.
//!
//! Every object is stored once in a slot arena and referenced from each tile
//! its footprint touches (the broad box rounded outward to whole tiles).
//! Queries visit only the buckets under the query region and de-duplicate
//! objects that span several buckets.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use u_layout_core::{BoundingBox, Position, Shape, TilePosition};

/// An object that can live in a [`SpatialIndex`].
pub trait Spatial {
    /// Reference position (used by circle queries).
    fn position(&self) -> Position;

    /// Collision shape in absolute coordinates.
    fn shape(&self) -> Shape;

    /// Tiles occupied by the object.
    fn footprint(&self) -> Vec<TilePosition> {
        self.shape().broad_box().tiles()
    }
}

/// Spatial index keyed by occupied tiles.
#[derive(Debug, Clone)]
pub struct SpatialIndex<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
    lookup: HashMap<T, usize>,
    buckets: HashMap<TilePosition, Vec<usize>>,
}

impl<T> SpatialIndex<T>
where
    T: Spatial + Clone + Eq + Hash,
{
    /// Creates a new empty spatial index.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            lookup: HashMap::new(),
            buckets: HashMap::new(),
        }
    }

    /// Creates a spatial index with the given objects.
    pub fn with_objects(objects: impl IntoIterator<Item = T>) -> Self {
        let mut index = Self::new();
        for object in objects {
            index.add(object);
        }
        index
    }

    /// Inserts an object; returns false if it was already present.
    pub fn add(&mut self, object: T) -> bool {
        if self.lookup.contains_key(&object) {
            return false;
        }
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        for tile in object.footprint() {
            self.buckets.entry(tile).or_default().push(slot);
        }
        self.lookup.insert(object.clone(), slot);
        self.slots[slot] = Some(object);
        true
    }

    /// Removes an object; returns false if it was not present.
    pub fn remove(&mut self, object: &T) -> bool {
        let Some(slot) = self.lookup.remove(object) else {
            return false;
        };
        if let Some(stored) = self.slots[slot].take() {
            for tile in stored.footprint() {
                if let Some(bucket) = self.buckets.get_mut(&tile) {
                    bucket.retain(|&s| s != slot);
                    if bucket.is_empty() {
                        self.buckets.remove(&tile);
                    }
                }
            }
        }
        self.free.push(slot);
        true
    }

    /// Removes all objects.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.lookup.clear();
        self.buckets.clear();
    }

    /// Returns the number of objects in the index.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Returns true if the object is in the index.
    pub fn contains(&self, object: &T) -> bool {
        self.lookup.contains_key(object)
    }

    /// Returns an iterator over all objects in the index.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Objects whose shape intersects `area`.
    pub fn get_in_area(&self, area: &BoundingBox) -> Vec<&T> {
        self.collect_from(area.tiles(), |object| object.shape().intersects_box(area))
    }

    /// Objects whose footprint covers `tile`.
    pub fn get_in_tile(&self, tile: TilePosition) -> Vec<&T> {
        self.collect_from([tile], |_| true)
    }

    /// Objects whose exact shape contains `point`.
    pub fn get_at_point(&self, point: Position) -> Vec<&T> {
        let point_box = BoundingBox::new(point.x, point.y, point.x, point.y).expand(1e-6);
        self.collect_from(point_box.tiles(), |object| object.shape().contains(&point))
    }

    /// Objects whose *position* lies within `radius` of `center`.
    pub fn get_pos_in_circle(&self, center: Position, radius: f64) -> Vec<&T> {
        // One extra tile of slack: a position on a footprint's far edge may sit
        // in a tile the footprint does not cover.
        let area = BoundingBox::around(center, radius, radius).expand(1.0);
        let r2 = radius * radius + 1e-9;
        self.collect_from(area.tiles(), |object| {
            object.position().distance_squared(&center) <= r2
        })
    }

    /// Objects colliding with `shape`: broad box first, exact test second.
    pub fn get_colliding(&self, shape: &Shape) -> Vec<&T> {
        let broad = shape.broad_box();
        self.collect_from(broad.tiles(), |object| {
            let other = object.shape();
            other.broad_box().intersects(&broad)
                && (other.is_axis_aligned() && shape.is_axis_aligned()
                    || other.intersects(shape))
        })
    }

    /// Tiles with at least one resident object.
    pub fn occupied_tiles(&self) -> impl Iterator<Item = TilePosition> + '_ {
        self.buckets.keys().copied()
    }

    /// Minimal box covering every resident's shape, `None` when empty.
    pub fn enclosing_box(&self) -> Option<BoundingBox> {
        self.iter()
            .map(|object| object.shape().broad_box())
            .reduce(|acc, b| acc.union(&b))
    }

    fn collect_from<'a, I, F>(&'a self, tiles: I, keep: F) -> Vec<&'a T>
    where
        I: IntoIterator<Item = TilePosition>,
        F: Fn(&T) -> bool,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for tile in tiles {
            let Some(bucket) = self.buckets.get(&tile) else {
                continue;
            };
            for &slot in bucket {
                if !seen.insert(slot) {
                    continue;
                }
                if let Some(object) = self.slots[slot].as_ref() {
                    if keep(object) {
                        out.push(object);
                    }
                }
            }
        }
        out
    }
}

impl<T> Default for SpatialIndex<T>
where
    T: Spatial + Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
