//! Solve result representation.

use crate::exact::SolutionStatus;
use crate::placement::CandidateId;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of solving a placement model.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolveResult {
    /// Solver status.
    pub status: SolutionStatus,

    /// Selection state of every optional candidate still in the model.
    /// Empty unless the status carries a solution.
    pub selection: BTreeMap<CandidateId, bool>,

    /// Objective value of the returned assignment.
    pub objective_value: Option<f64>,

    /// Best proven bound on the objective.
    pub best_bound: Option<f64>,

    /// Computation time in milliseconds.
    pub computation_time_ms: u64,

    /// Number of decision variables in the model.
    pub variables: usize,

    /// Number of constraints in the model.
    pub constraints: usize,
}

impl SolveResult {
    /// Creates an empty result with the given status.
    pub fn with_status(status: SolutionStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Returns true if the result carries an assignment.
    pub fn is_successful(&self) -> bool {
        self.status.has_solution()
    }

    /// Returns true if the candidate was selected.
    ///
    /// Candidates unknown to the result (fixed entities, removed candidates)
    /// report `false`.
    pub fn is_selected(&self, id: CandidateId) -> bool {
        self.selection.get(&id).copied().unwrap_or(false)
    }

    /// Iterates over the selected candidates in id order.
    pub fn selected(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.selection
            .iter()
            .filter_map(|(id, &on)| on.then_some(*id))
    }

    /// Number of selected candidates.
    pub fn selected_count(&self) -> usize {
        self.selected().count()
    }

    /// Relative gap between objective and bound, 0 when proven optimal.
    pub fn gap(&self) -> Option<f64> {
        match (self.objective_value, self.best_bound) {
            (Some(obj), Some(bound)) if obj.abs() > 1e-12 => {
                Some(((obj - bound) / obj).abs())
            }
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        }
    }
}

/// Summary statistics for a solve result.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolveSummary {
    /// Solver status.
    pub status: SolutionStatus,
    /// Total optional candidates in the result.
    pub candidates: usize,
    /// Selected candidates.
    pub selected: usize,
    /// Objective value, if any.
    pub objective: Option<f64>,
    /// Computation time in milliseconds.
    pub time_ms: u64,
}

impl From<&SolveResult> for SolveSummary {
    fn from(result: &SolveResult) -> Self {
        Self {
            status: result.status,
            candidates: result.selection.len(),
            selected: result.selected_count(),
            objective: result.objective_value,
            time_ms: result.computation_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_new() {
        let result = SolveResult::with_status(SolutionStatus::Infeasible);
        assert!(result.selection.is_empty());
        assert!(!result.is_successful());
        assert!(!result.is_selected(CandidateId::new(0)));
    }

    #[test]
    fn test_selected_iteration() {
        let mut result = SolveResult::with_status(SolutionStatus::Optimal);
        result.selection.insert(CandidateId::new(3), true);
        result.selection.insert(CandidateId::new(1), false);
        result.selection.insert(CandidateId::new(2), true);
        result.objective_value = Some(2.0);
        result.best_bound = Some(2.0);

        let selected: Vec<_> = result.selected().collect();
        assert_eq!(selected, vec![CandidateId::new(2), CandidateId::new(3)]);
        assert_eq!(result.gap(), Some(0.0));

        let summary = SolveSummary::from(&result);
        assert_eq!(summary.candidates, 3);
        assert_eq!(summary.selected, 2);
    }
}
