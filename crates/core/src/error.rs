//! Error types for U-Layout.

use crate::geometry::TilePosition;
use crate::placement::CandidateId;
use thiserror::Error;

/// Result type alias for U-Layout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Modeling errors raised while building a placement problem.
///
/// These indicate misuse of the model and are raised immediately. Solver
/// outcomes such as infeasibility or running out of time are not errors; they
/// are reported through [`SolutionStatus`](crate::SolutionStatus).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A cardinality constraint was requested over zero literals.
    #[error("{kind} constraint over zero literals")]
    EmptyConstraint {
        /// Which constraint was requested.
        kind: &'static str,
    },

    /// The candidate's decision variable already exists in the solver model.
    #[error("candidate {0} already has a decision variable and cannot be removed")]
    VariableAlreadyBound(CandidateId),

    /// The candidate is not (or no longer) registered in the model.
    #[error("unknown candidate {0}")]
    UnknownCandidate(CandidateId),

    /// Placement costs must be finite and non-negative.
    #[error("invalid placement cost {0}")]
    InvalidCost(f64),

    /// A belt line failed validation.
    #[error("invalid belt line: {0}")]
    InvalidLine(String),

    /// A cell that must be filled has no admissible option.
    #[error("no valid options at required tile {0}")]
    NoValidOptions(TilePosition),

    /// A prototype lookup failed.
    #[error("unknown prototype: {0}")]
    UnknownPrototype(String),

    /// A pole was expected but the prototype has no pole ranges.
    #[error("prototype {0} is not an electric pole")]
    NotAPole(String),

    /// Degenerate or malformed geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}
