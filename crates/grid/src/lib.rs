//! # U-Layout Grid
//!
//! Tile-grid placement optimization for the U-Layout engine.
//!
//! Entities are placed on an integer tile grid. A [`PlacementModel`] holds the
//! existing layout (fixed candidates) and every optional placement the
//! subproblems propose; one MILP decides which optional candidates to build.
//!
//! ## Features
//!
//! - Tile-bucketed [`SpatialIndex`] with tile, area, circle and collision
//!   queries, plus an R-tree backed [`ProximityGraph`] for wire reach
//! - Lazily created decision variables, safe to reference from many threads
//! - Cardinality, implication and linear constraint helpers with constant
//!   folding
//! - Power network subproblem: pole coverage and wire connectivity
//! - Belt line subproblem: surface belts and underground pairs per line
//! - Time-limited solve with progress reporting
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use u_layout_core::{Direction, EntityPrototype, ExactConfig, PrototypeCatalog, TilePosition};
//! use u_layout_grid::{Entity, PlacementModel, PowerConfig, PowerNetwork};
//!
//! let lamp = Arc::new(EntityPrototype::new("lamp", 1, 1).with_power_consumption());
//! let mut model = PlacementModel::new();
//! model.add_fixed_entity(Entity::at_tile(lamp.clone(), TilePosition::new(0, 0), Direction::North));
//! model.add_fixed_entity(Entity::at_tile(lamp, TilePosition::new(3, 0), Direction::North));
//!
//! let catalog = PrototypeCatalog::with_defaults();
//! let config = PowerConfig::new().with_pole_prototype("small-electric-pole");
//! let exact = ExactConfig::default();
//! let network = PowerNetwork::build(&mut model, &catalog, &config, &exact).unwrap();
//! model.add_non_overlapping_constraint().unwrap();
//! model.set_objective();
//!
//! let result = model.solve(&exact, None);
//! assert!(result.is_successful());
//! assert_eq!(network.selected_poles(&result).len(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization of configurations

pub mod belt;
pub mod entity;
pub mod graph;
pub mod model;
pub mod power;
pub mod spatial_index;

// Re-exports
pub use belt::{
    BeltConfig, BeltLine, BeltOption, BeltProblem, BeltTier, HeuristicMode, LineTerminal, Variant,
};
pub use entity::Entity;
pub use graph::{GraphNode, ProximityGraph};
pub use model::{Candidate, Cmp, Footprint, Lit, ModelStats, PlacementModel};
pub use power::{ConnectivityMode, ConnectivityStrategy, PowerConfig, PowerNetwork, PowerReport};
pub use spatial_index::{Spatial, SpatialIndex};
