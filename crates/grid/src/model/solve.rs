//! Solving a placement model.
//!
//! The MILP runs on a dedicated worker thread; the caller waits at most the
//! configured time limit. The backend cannot be interrupted, so on timeout the
//! worker is detached and its eventual answer discarded.

use super::PlacementModel;
use good_lp::{default_solver, Expression, ResolutionError, Solution, SolverModel, Variable};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::PoisonError;
use std::thread;
use std::time::Instant;
use u_layout_core::{
    CandidateId, ExactConfig, ProgressCallback, ProgressInfo, SolutionStatus, SolvePhase,
    SolveResult,
};

/// Variable values in tracking order, or the backend's refusal.
type Outcome = std::result::Result<Vec<f64>, ResolutionError>;

struct Decision {
    id: CandidateId,
    cost: f64,
    variable: Option<Variable>,
}

impl PlacementModel {
    /// Solves the model, consuming it.
    ///
    /// Progress reports arrive in order: `Building` once the model is
    /// assembled, `Incumbent` when an assignment is available and `Finished`
    /// when the call returns.
    ///
    /// When the time limit expires the result is `Timeout` with an empty
    /// selection, but the `u-layout-milp` worker thread is not stopped. It
    /// keeps its CPU core and memory until the backend returns on its own, and
    /// its answer is then dropped. Callers that solve repeatedly under tight
    /// limits should expect such threads to pile up.
    pub fn solve(self, config: &ExactConfig, progress: Option<&ProgressCallback>) -> SolveResult {
        let start = Instant::now();
        let stats = self.model_stats();
        let report = |info: ProgressInfo| {
            if let Some(callback) = progress {
                callback(
                    info.with_elapsed(start.elapsed().as_millis() as u64)
                        .with_model_size(stats.variables, stats.constraints),
                );
            }
        };
        report(ProgressInfo::new(SolvePhase::Building));
        log::info!(
            "Solving placement model: {} fixed, {} optional, {} variables, {} constraints",
            stats.fixed,
            stats.optional,
            stats.variables,
            stats.constraints
        );

        let PlacementModel {
            candidates,
            variables,
            constraints,
            extra_objective,
            minimize_cost,
            infeasible,
            ..
        } = self;

        let decisions: Vec<Decision> = candidates
            .into_iter()
            .flatten()
            .filter(|c| !c.is_fixed())
            .map(|c| Decision {
                id: c.id,
                cost: c.cost,
                variable: if c.forbidden { None } else { c.variable.into_inner() },
            })
            .collect();

        let finish = |status: SolutionStatus, values: Option<&[f64]>| {
            let mut result = SolveResult::with_status(status);
            result.variables = stats.variables;
            result.constraints = stats.constraints;
            if let Some(values) = values {
                let mut objective = 0.0;
                let mut next = values.iter();
                for decision in &decisions {
                    let on = decision.variable.is_some()
                        && next.next().is_some_and(|&v| v > 0.5);
                    if on {
                        objective += decision.cost;
                    }
                    result.selection.insert(decision.id, on);
                }
                for ((coef, _), value) in extra_objective.iter().zip(next) {
                    objective += coef * value.round();
                }
                result.objective_value = Some(objective);
                if status == SolutionStatus::Optimal {
                    result.best_bound = Some(objective);
                }
            }
            result.computation_time_ms = start.elapsed().as_millis() as u64;
            result
        };

        if let Some(reason) = infeasible {
            log::info!("Model infeasible before solving: {}", reason);
            report(ProgressInfo::new(SolvePhase::Finished));
            return finish(SolutionStatus::Infeasible, None);
        }

        let tracked: Vec<Variable> = decisions
            .iter()
            .filter_map(|d| d.variable)
            .chain(extra_objective.iter().map(|&(_, v)| v))
            .collect();
        let store = variables.into_inner().unwrap_or_else(PoisonError::into_inner);

        if store.count == 0 {
            // Nothing to decide: every constraint folded away.
            let result = finish(SolutionStatus::Optimal, Some(&[]));
            report(ProgressInfo::new(SolvePhase::Finished).with_objective(0.0, 0.0));
            return result;
        }

        let mut objective = Expression::from(0.0);
        if minimize_cost {
            for decision in &decisions {
                if let Some(var) = decision.variable {
                    objective += decision.cost * var;
                }
            }
            for &(coef, var) in &extra_objective {
                objective += coef * var;
            }
        }

        let (tx, rx) = mpsc::channel::<Outcome>();
        let spawned = thread::Builder::new()
            .name("u-layout-milp".into())
            .spawn(move || {
                let mut problem = store.problem.minimise(objective).using(default_solver);
                for c in constraints {
                    problem = problem.with(c);
                }
                let outcome = problem
                    .solve()
                    .map(|solution| tracked.iter().map(|&v| solution.value(v)).collect());
                // The receiver is gone after a timeout.
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            log::error!("Failed to start solver thread: {}", e);
            return finish(SolutionStatus::Error, None);
        }

        let received = match config.time_limit() {
            Some(limit) => rx.recv_timeout(limit.saturating_sub(start.elapsed())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let result = match received {
            Ok(Ok(values)) => finish(SolutionStatus::Optimal, Some(&values)),
            Ok(Err(ResolutionError::Infeasible)) => finish(SolutionStatus::Infeasible, None),
            Ok(Err(ResolutionError::Unbounded)) => {
                log::warn!("Placement model is unbounded");
                finish(SolutionStatus::Unknown, None)
            }
            Ok(Err(e)) => {
                log::error!("MILP solver error: {:?}", e);
                finish(SolutionStatus::Error, None)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Solver did not finish within {} ms",
                    config.time_limit_ms
                );
                finish(SolutionStatus::Timeout, None)
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("Solver thread exited without an answer");
                finish(SolutionStatus::Error, None)
            }
        };

        if let Some(objective) = result.objective_value {
            report(ProgressInfo::new(SolvePhase::Incumbent).with_objective(objective, objective));
        }
        let mut done = ProgressInfo::new(SolvePhase::Finished);
        if let Some(objective) = result.objective_value {
            done = done.with_objective(objective, result.best_bound.unwrap_or(objective));
        }
        report(done);

        log::info!(
            "Solve finished: status={}, selected={}, objective={:?}, time={}ms",
            result.status,
            result.selected_count(),
            result.objective_value,
            result.computation_time_ms
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::entity::Entity;
    use crate::model::PlacementModel;
    use std::sync::{Arc, Mutex};
    use u_layout_core::{
        Direction, EntityPrototype, ExactConfig, ProgressCallback, SolutionStatus, SolvePhase,
        TilePosition,
    };

    fn pole_at(x: i32) -> Entity {
        Entity::at_tile(
            Arc::new(EntityPrototype::small_pole()),
            TilePosition::new(x, 0),
            Direction::North,
        )
    }

    #[test]
    fn test_cheapest_cover() {
        let mut model = PlacementModel::new();
        let cheap = model.add_placement(pole_at(0), 1.0).unwrap();
        let dear = model.add_placement(pole_at(1), 3.0).unwrap();
        let lits = vec![model.literal(cheap).unwrap(), model.literal(dear).unwrap()];
        model.add_at_least_one(&lits).unwrap();
        model.set_objective();

        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(result.status, SolutionStatus::Optimal);
        assert_eq!(result.selected().collect::<Vec<_>>(), vec![cheap]);
        assert_eq!(result.objective_value, Some(1.0));
        assert_eq!(result.gap(), Some(0.0));
    }

    #[test]
    fn test_uninstantiated_never_selected() {
        let mut model = PlacementModel::new();
        let a = model.add_placement(pole_at(0), 1.0).unwrap();
        let untouched = model.add_placement(pole_at(5), 1.0).unwrap();
        let lit = model.literal(a).unwrap();
        model.add_at_least_one(&[lit]).unwrap();
        model.set_objective();

        let result = model.solve(&ExactConfig::default(), None);
        assert!(result.is_selected(a));
        assert!(!result.is_selected(untouched));
    }

    #[test]
    fn test_empty_model() {
        let model = PlacementModel::new();
        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(result.status, SolutionStatus::Optimal);
        assert_eq!(result.selected_count(), 0);
    }

    #[test]
    fn test_objective_terms() {
        let mut model = PlacementModel::new();
        let a = model.add_placement(pole_at(0), 1.0).unwrap();
        let b = model.add_placement(pole_at(1), 1.0).unwrap();
        let la = model.literal(a).unwrap();
        let lb = model.literal(b).unwrap();
        model.add_at_least_one(&[la, lb]).unwrap();
        let penalty = model.new_binary();
        // Choosing `a` drags in a penalty of 5.
        model.add_implies(la, penalty.into());
        model.add_objective_term(5.0, penalty.into());
        model.set_objective();

        let result = model.solve(&ExactConfig::default(), None);
        assert!(result.is_selected(b));
        assert!(!result.is_selected(a));
        assert_eq!(result.objective_value, Some(1.0));
    }

    #[test]
    fn test_progress_order() {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let callback: ProgressCallback = Box::new(move |info| {
            sink.lock().unwrap().push((info.phase, info.elapsed_ms));
        });

        let mut model = PlacementModel::new();
        let a = model.add_placement(pole_at(0), 2.0).unwrap();
        let lit = model.literal(a).unwrap();
        model.add_at_least_one(&[lit]).unwrap();
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), Some(&callback));
        assert_eq!(result.status, SolutionStatus::Optimal);

        let phases = phases.lock().unwrap();
        let order: Vec<_> = phases.iter().map(|(p, _)| *p).collect();
        assert_eq!(
            order,
            vec![SolvePhase::Building, SolvePhase::Incumbent, SolvePhase::Finished]
        );
        assert!(phases.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_time_limit_expires() {
        // A long chain of pairwise covers; the backend needs far longer than
        // the limit.
        let mut model = PlacementModel::new();
        let lits: Vec<_> = (0..1000)
            .map(|x| {
                let id = model.add_placement(pole_at(x), 1.0 + (x % 3) as f64).unwrap();
                model.literal(id).unwrap()
            })
            .collect();
        for pair in lits.windows(2) {
            model.add_at_least_one(pair).unwrap();
        }
        model.set_objective();

        let config = ExactConfig::new().with_time_limit_ms(1);
        let result = model.solve(&config, None);
        assert_eq!(result.status, SolutionStatus::Timeout);
        assert_eq!(result.selected_count(), 0);
        assert!(result.objective_value.is_none());
    }
}
