//! Exact solver configuration and status types.
//!
//! Placement models are solved as mixed-integer programs. The solver either
//! proves optimality, returns the best assignment it found within the time
//! limit, proves infeasibility, or gives up.
//!
//! # Example
//!
//! ```
//! use u_layout_core::exact::{ExactConfig, SolutionStatus};
//!
//! let config = ExactConfig::default()
//!     .with_time_limit_ms(10_000)
//!     .with_threads(4);
//! assert_eq!(config.time_limit().map(|d| d.as_secs()), Some(10));
//! assert!(SolutionStatus::Feasible.has_solution());
//! ```

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Solution status from the exact solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolutionStatus {
    /// Proven optimal solution found.
    Optimal,
    /// Feasible solution found, but optimality not proven.
    Feasible,
    /// No assignment satisfies the constraints.
    Infeasible,
    /// Time limit reached without finding any feasible solution.
    Timeout,
    /// The solver backend failed.
    Error,
    /// Solution status unknown or not applicable.
    #[default]
    Unknown,
}

impl SolutionStatus {
    /// Returns true if the status carries a usable assignment.
    pub fn has_solution(self) -> bool {
        matches!(self, Self::Optimal | Self::Feasible)
    }
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimal => write!(f, "Optimal"),
            Self::Feasible => write!(f, "Feasible"),
            Self::Infeasible => write!(f, "Infeasible"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Error => write!(f, "Error"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Configuration for building and solving a placement model.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExactConfig {
    /// Wall-clock limit for the solve in milliseconds (0 = unlimited).
    pub time_limit_ms: u64,

    /// Worker threads for candidate generation (0 = rayon default).
    pub threads: usize,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 60000, // 1 minute default
            threads: 0,
        }
    }
}

impl ExactConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set time limit in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Set the number of candidate-generation threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Time limit as a duration, `None` when unlimited.
    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_ms > 0).then(|| Duration::from_millis(self.time_limit_ms))
    }
}
