//! Read-only prototype metadata.
//!
//! Prototypes describe the static properties of an entity type: its collision
//! box, power-network ranges and underground reach. The catalog is supplied by
//! the caller and never mutated by the optimizer.

use crate::geometry::{BoundingBox, CollisionCategory};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Electric pole ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoleSpec {
    /// Half side of the square supply area, measured from the pole position.
    pub supply_radius: f64,
    /// Maximum wire length to another pole.
    pub wire_reach: f64,
}

/// Underground belt reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UndergroundSpec {
    /// Largest tile distance between an entrance and its exit.
    pub max_distance: u32,
}

/// Static description of an entity type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityPrototype {
    /// Prototype name.
    pub name: String,
    /// Collision box relative to the entity position, facing north.
    pub collision_box: BoundingBox,
    /// Footprint width in tiles, facing north.
    pub tile_width: u32,
    /// Footprint height in tiles, facing north.
    pub tile_height: u32,
    /// Coarse collision class.
    pub category: CollisionCategory,
    /// Cost of placing one instance.
    pub cost: f64,
    /// Whether the entity needs to be inside a pole's supply area.
    pub consumes_power: bool,
    /// Present for electric poles.
    pub pole: Option<PoleSpec>,
    /// Present for underground belts.
    pub underground: Option<UndergroundSpec>,
}

impl EntityPrototype {
    /// Creates a prototype with a centred collision box slightly smaller than
    /// its tile footprint.
    pub fn new(name: impl Into<String>, tile_width: u32, tile_height: u32) -> Self {
        let hw = tile_width as f64 * 0.5 - 0.1;
        let hh = tile_height as f64 * 0.5 - 0.1;
        Self {
            name: name.into(),
            collision_box: BoundingBox::new(-hw, -hh, hw, hh),
            tile_width,
            tile_height,
            category: CollisionCategory::Object,
            cost: 1.0,
            consumes_power: false,
            pole: None,
            underground: None,
        }
    }

    /// Sets the collision box.
    pub fn with_collision_box(mut self, collision_box: BoundingBox) -> Self {
        self.collision_box = collision_box;
        self
    }

    /// Sets the collision category.
    pub fn with_category(mut self, category: CollisionCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets the placement cost.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Marks the prototype as a power consumer.
    pub fn with_power_consumption(mut self) -> Self {
        self.consumes_power = true;
        self
    }

    /// Makes the prototype an electric pole.
    pub fn with_pole(mut self, supply_radius: f64, wire_reach: f64) -> Self {
        self.pole = Some(PoleSpec {
            supply_radius,
            wire_reach,
        });
        self.category = CollisionCategory::Electric;
        self
    }

    /// Makes the prototype an underground belt.
    pub fn with_underground(mut self, max_distance: u32) -> Self {
        self.underground = Some(UndergroundSpec { max_distance });
        self.category = CollisionCategory::Transport;
        self
    }

    /// Returns true for electric poles.
    pub fn is_pole(&self) -> bool {
        self.pole.is_some()
    }

    /// Returns true for belts and underground belts.
    pub fn is_transport(&self) -> bool {
        self.category == CollisionCategory::Transport
    }

    /// Small wooden-style pole: 1×1, supply 2.5, wire 7.5.
    pub fn small_pole() -> Self {
        Self::new("small-electric-pole", 1, 1)
            .with_collision_box(BoundingBox::new(-0.15, -0.15, 0.15, 0.15))
            .with_pole(2.5, 7.5)
    }

    /// Medium pole: 1×1, supply 3.5, wire 9.
    pub fn medium_pole() -> Self {
        Self::new("medium-electric-pole", 1, 1)
            .with_collision_box(BoundingBox::new(-0.15, -0.15, 0.15, 0.15))
            .with_pole(3.5, 9.0)
    }

    /// Substation: 2×2, supply 9, wire 18.
    pub fn substation() -> Self {
        Self::new("substation", 2, 2)
            .with_collision_box(BoundingBox::new(-0.7, -0.7, 0.7, 0.7))
            .with_pole(9.0, 18.0)
    }

    /// Plain transport belt.
    pub fn transport_belt() -> Self {
        Self::new("transport-belt", 1, 1)
            .with_collision_box(BoundingBox::new(-0.4, -0.4, 0.4, 0.4))
            .with_category(CollisionCategory::Transport)
    }

    /// Underground belt with a reach of five tiles.
    pub fn underground_belt() -> Self {
        Self::new("underground-belt", 1, 1)
            .with_collision_box(BoundingBox::new(-0.4, -0.4, 0.4, 0.4))
            .with_underground(5)
    }
}

/// Name-indexed prototype lookup.
#[derive(Debug, Clone, Default)]
pub struct PrototypeCatalog {
    prototypes: HashMap<String, Arc<EntityPrototype>>,
}

impl PrototypeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in poles and belts.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.insert(EntityPrototype::small_pole());
        catalog.insert(EntityPrototype::medium_pole());
        catalog.insert(EntityPrototype::substation());
        catalog.insert(EntityPrototype::transport_belt());
        catalog.insert(EntityPrototype::underground_belt());
        catalog
    }

    /// Adds or replaces a prototype and returns the shared handle.
    pub fn insert(&mut self, prototype: EntityPrototype) -> Arc<EntityPrototype> {
        let proto = Arc::new(prototype);
        self.prototypes.insert(proto.name.clone(), Arc::clone(&proto));
        proto
    }

    /// Looks up a prototype by name.
    pub fn get(&self, name: &str) -> Result<Arc<EntityPrototype>> {
        self.prototypes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownPrototype(name.to_string()))
    }

    /// All pole prototypes, sorted by name.
    pub fn poles(&self) -> Vec<Arc<EntityPrototype>> {
        let mut poles: Vec<_> = self
            .prototypes
            .values()
            .filter(|p| p.is_pole())
            .cloned()
            .collect();
        poles.sort_by(|a, b| a.name.cmp(&b.name));
        poles
    }

    /// Number of prototypes.
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    /// Returns true if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = PrototypeCatalog::with_defaults();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.poles().len(), 3);

        let ug = catalog.get("underground-belt").unwrap();
        assert_eq!(ug.underground.map(|u| u.max_distance), Some(5));
        assert!(ug.is_transport());
    }

    #[test]
    fn test_unknown_prototype() {
        let catalog = PrototypeCatalog::new();
        assert_eq!(
            catalog.get("assembler").unwrap_err(),
            Error::UnknownPrototype("assembler".into())
        );
    }
}
