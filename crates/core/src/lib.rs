//! # U-Layout Core
//!
//! Core types shared by the U-Layout grid placement optimizer.
//!
//! This crate carries no solver dependency. It defines the vocabulary the
//! optimization crates speak: grid geometry, prototype metadata, candidate
//! handles, solve configuration, statuses and results.
//!
//! ## Core Components
//!
//! - **Geometry**: [`Position`], [`TilePosition`], [`Direction`],
//!   [`BoundingBox`], [`Shape`]
//! - **Prototypes**: [`EntityPrototype`], [`PoleSpec`], [`UndergroundSpec`],
//!   [`PrototypeCatalog`]
//! - **Solving**: [`ExactConfig`], [`SolutionStatus`], [`SolveResult`],
//!   [`ProgressCallback`]
//!
//! ## Configuration
//!
//! ```rust
//! use u_layout_core::ExactConfig;
//!
//! let config = ExactConfig::new()
//!     .with_time_limit_ms(30_000)
//!     .with_threads(8);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod error;
pub mod exact;
pub mod geometry;
pub mod placement;
pub mod prototype;
pub mod result;
pub mod solver;

// Re-exports
pub use error::{Error, Result};
pub use exact::{ExactConfig, SolutionStatus};
pub use geometry::{
    BoundingBox, CollisionCategory, Direction, Position, Shape, TilePosition, EPSILON,
};
pub use placement::{CandidateId, CandidateKind};
pub use prototype::{EntityPrototype, PoleSpec, PrototypeCatalog, UndergroundSpec};
pub use result::{SolveResult, SolveSummary};
pub use solver::{ProgressCallback, ProgressInfo, SolvePhase};
