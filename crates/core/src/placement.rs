//! Placement candidate identifiers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handle to a placement candidate registered in a placement model.
///
/// Identifiers are assigned sequentially and never reused within one model,
/// so they stay stable when other candidates are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CandidateId(usize);

impl CandidateId {
    /// Creates an identifier from a raw index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a candidate is part of the existing layout or a placement option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CandidateKind {
    /// Existing entity; always selected.
    Fixed,
    /// Optional placement decided by the solver.
    Optional,
}

impl CandidateKind {
    /// Returns true for fixed candidates.
    pub fn is_fixed(self) -> bool {
        matches!(self, Self::Fixed)
    }
}
