//! Placement model: candidates, decision variables and the shared solver
//! instance.
//!
//! The model owns every placement candidate. Fixed candidates stand for the
//! existing layout and are constant-true; optional candidates carry a cost and
//! a binary decision variable that is only created the first time a
//! constraint (or the objective) refers to it. Subproblems keep
//! [`CandidateId`]s and add derived constraints through the helpers in
//! [`constraints`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use u_layout_core::{Direction, EntityPrototype, ExactConfig, TilePosition};
//! use u_layout_grid::{Entity, PlacementModel};
//!
//! let pole = Arc::new(EntityPrototype::small_pole());
//! let mut model = PlacementModel::new();
//! let a = model
//!     .add_placement(Entity::at_tile(pole.clone(), TilePosition::new(0, 0), Direction::North), 1.0)
//!     .unwrap();
//! let a_lit = model.literal(a).unwrap();
//! model.add_at_least_one(&[a_lit]).unwrap();
//! model.set_objective();
//!
//! let result = model.solve(&ExactConfig::default(), None);
//! assert!(result.is_selected(a));
//! ```

pub mod constraints;
mod solve;

pub use constraints::{reduce_cardinality, Cardinality, Cmp, Lit, Reduction};

use crate::entity::Entity;
use crate::spatial_index::{Spatial, SpatialIndex};
use good_lp::{variable, Constraint, ProblemVariables, Variable};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, OnceLock, PoisonError};
use u_layout_core::{CandidateId, CandidateKind, Error, Position, Result, Shape, TilePosition};

/// Spatial handle of a candidate stored in the model's index.
#[derive(Debug, Clone)]
pub struct Footprint {
    /// Candidate the footprint belongs to.
    pub id: CandidateId,
    /// Entity position.
    pub position: Position,
    /// Entity collision shape.
    pub shape: Shape,
}

impl Footprint {
    /// Footprint of an entity registered under `id`.
    pub fn of(id: CandidateId, entity: &Entity) -> Self {
        Self {
            id,
            position: entity.position(),
            shape: *entity.shape(),
        }
    }
}

impl PartialEq for Footprint {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Footprint {}

impl Hash for Footprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Spatial for Footprint {
    fn position(&self) -> Position {
        self.position
    }

    fn shape(&self) -> Shape {
        self.shape
    }
}

/// A registered placement candidate.
#[derive(Debug)]
pub struct Candidate {
    id: CandidateId,
    entity: Entity,
    cost: f64,
    kind: CandidateKind,
    variable: OnceLock<Variable>,
    forbidden: bool,
}

impl Candidate {
    /// Candidate identifier.
    pub fn id(&self) -> CandidateId {
        self.id
    }

    /// The entity this candidate would place.
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Placement cost (0 for fixed candidates).
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Fixed or optional.
    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    /// Returns true for fixed candidates.
    pub fn is_fixed(&self) -> bool {
        self.kind.is_fixed()
    }

    /// Returns true once the decision variable exists.
    pub fn has_variable(&self) -> bool {
        self.variable.get().is_some()
    }

    /// Returns true if a fixed co-resident rules this candidate out.
    pub fn is_forbidden(&self) -> bool {
        self.forbidden
    }
}

/// Size of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelStats {
    /// Fixed candidates.
    pub fixed: usize,
    /// Optional candidates.
    pub optional: usize,
    /// Instantiated solver variables (including auxiliaries).
    pub variables: usize,
    /// Emitted constraints.
    pub constraints: usize,
}

struct VariableStore {
    problem: ProblemVariables,
    count: usize,
}

/// Registry translating placement candidates into solver decision variables.
pub struct PlacementModel {
    candidates: Vec<Option<Candidate>>,
    index: SpatialIndex<Footprint>,
    variables: Mutex<VariableStore>,
    constraints: Vec<Constraint>,
    extra_objective: Vec<(f64, Variable)>,
    minimize_cost: bool,
    infeasible: Option<String>,
}

impl PlacementModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
            index: SpatialIndex::new(),
            variables: Mutex::new(VariableStore {
                problem: ProblemVariables::new(),
                count: 0,
            }),
            constraints: Vec::new(),
            extra_objective: Vec::new(),
            minimize_cost: false,
            infeasible: None,
        }
    }

    /// Registers an existing entity. Its literal is constant true.
    pub fn add_fixed_entity(&mut self, entity: Entity) -> CandidateId {
        self.register(entity, 0.0, CandidateKind::Fixed)
    }

    /// Registers an optional placement with the given cost.
    ///
    /// The decision variable is created lazily on first reference.
    pub fn add_placement(&mut self, entity: Entity, cost: f64) -> Result<CandidateId> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(Error::InvalidCost(cost));
        }
        Ok(self.register(entity, cost, CandidateKind::Optional))
    }

    fn register(&mut self, entity: Entity, cost: f64, kind: CandidateKind) -> CandidateId {
        let id = CandidateId::new(self.candidates.len());
        self.index.add(Footprint::of(id, &entity));
        self.candidates.push(Some(Candidate {
            id,
            entity,
            cost,
            kind,
            variable: OnceLock::new(),
            forbidden: false,
        }));
        id
    }

    /// Returns true if no fixed candidate collides with `shape`.
    pub fn can_place(&self, shape: &Shape) -> bool {
        !self
            .index
            .get_colliding(shape)
            .into_iter()
            .any(|f| self.candidate(f.id).is_some_and(Candidate::is_fixed))
    }

    /// Removes a candidate before it reaches the solver.
    ///
    /// Fails with [`Error::VariableAlreadyBound`] once the decision variable
    /// exists, since constraints may already refer to it.
    pub fn remove_placement(&mut self, id: CandidateId) -> Result<()> {
        let candidate = self.candidate(id).ok_or(Error::UnknownCandidate(id))?;
        if candidate.has_variable() {
            return Err(Error::VariableAlreadyBound(id));
        }
        let footprint = Footprint::of(id, &candidate.entity);
        self.index.remove(&footprint);
        self.candidates[id.index()] = None;
        Ok(())
    }

    /// Looks up a candidate.
    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.get(id.index()).and_then(Option::as_ref)
    }

    /// Iterates over all live candidates.
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter_map(Option::as_ref)
    }

    /// Spatial index of all candidate footprints.
    pub fn index(&self) -> &SpatialIndex<Footprint> {
        &self.index
    }

    /// Candidates whose footprint covers `tile`, in id order.
    pub fn candidates_in_tile(&self, tile: TilePosition) -> Vec<CandidateId> {
        let mut ids: Vec<_> = self.index.get_in_tile(tile).into_iter().map(|f| f.id).collect();
        ids.sort();
        ids
    }

    /// The candidate's literal, creating its variable on first use.
    ///
    /// Safe to call from several threads: the variable is memoized per
    /// candidate and created under the store lock, so racing first
    /// references observe the same variable.
    pub fn literal(&self, id: CandidateId) -> Result<Lit> {
        let candidate = self.candidate(id).ok_or(Error::UnknownCandidate(id))?;
        if candidate.is_fixed() {
            return Ok(Lit::TRUE);
        }
        if candidate.forbidden {
            return Ok(Lit::FALSE);
        }
        let var = candidate
            .variable
            .get_or_init(|| self.create_variable(|| variable().binary()));
        Ok(Lit::Var(*var))
    }

    /// Creates an auxiliary binary variable.
    pub fn new_binary(&self) -> Variable {
        self.create_variable(|| variable().binary())
    }

    /// Creates an auxiliary integer variable in `[min, max]`.
    pub fn new_integer(&self, min: i64, max: i64) -> Variable {
        self.create_variable(|| variable().integer().min(min as f64).max(max as f64))
    }

    fn create_variable<F>(&self, definition: F) -> Variable
    where
        F: FnOnce() -> good_lp::VariableDefinition,
    {
        let mut store = self.variables.lock().unwrap_or_else(PoisonError::into_inner);
        store.count += 1;
        store.problem.add(definition())
    }

    /// Rules out an optional candidate.
    pub fn forbid(&mut self, id: CandidateId) -> Result<()> {
        let existing = {
            let candidate = self
                .candidates
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .ok_or(Error::UnknownCandidate(id))?;
            if candidate.is_fixed() {
                return Ok(());
            }
            candidate.forbidden = true;
            candidate.variable.get().copied()
        };
        if let Some(var) = existing {
            self.fix(var, false);
        }
        Ok(())
    }

    /// One object per tile.
    ///
    /// On a tile with a fixed resident every optional co-resident is
    /// forbidden; on an all-optional tile at most one resident is selected.
    /// Collision masks are not consulted: any two footprints sharing a tile
    /// conflict.
    pub fn add_non_overlapping_constraint(&mut self) -> Result<()> {
        let mut tiles: Vec<TilePosition> = self.index.occupied_tiles().collect();
        tiles.sort();

        let mut forbidden = BTreeSet::new();
        let mut shared = Vec::new();
        for tile in tiles {
            let residents = self.candidates_in_tile(tile);
            if residents.len() < 2 {
                continue;
            }
            let has_fixed = residents
                .iter()
                .any(|id| self.candidate(*id).is_some_and(Candidate::is_fixed));
            if has_fixed {
                forbidden.extend(
                    residents
                        .into_iter()
                        .filter(|id| self.candidate(*id).is_some_and(|c| !c.is_fixed())),
                );
            } else {
                shared.push(residents);
            }
        }

        log::debug!(
            "non-overlap: {} forbidden candidates, {} shared tiles",
            forbidden.len(),
            shared.len()
        );
        for id in forbidden {
            self.forbid(id)?;
        }
        for residents in shared {
            let lits = residents
                .into_iter()
                .map(|id| self.literal(id))
                .collect::<Result<Vec<_>>>()?;
            self.add_at_most_one(&lits)?;
        }
        Ok(())
    }

    /// Minimize the total cost of selected optional candidates plus any
    /// registered objective terms.
    ///
    /// The objective is assembled at solve time over instantiated variables;
    /// a candidate never referenced by any constraint is left unselected.
    /// Without this call the model is solved as a feasibility problem.
    pub fn set_objective(&mut self) {
        self.minimize_cost = true;
    }

    /// Adds `coef · lit` to the cost objective.
    ///
    /// Subproblems use this to price auxiliary variables. Constant literals
    /// only shift the objective and are dropped.
    pub fn add_objective_term(&mut self, coef: f64, lit: Lit) {
        if let Lit::Var(var) = lit {
            self.extra_objective.push((coef, var));
        }
    }

    /// Model size.
    pub fn model_stats(&self) -> ModelStats {
        let fixed = self.candidates().filter(|c| c.is_fixed()).count();
        let store = self.variables.lock().unwrap_or_else(PoisonError::into_inner);
        ModelStats {
            fixed,
            optional: self.candidates().count() - fixed,
            variables: store.count,
            constraints: self.constraints.len(),
        }
    }

    /// Returns the reason if a constraint folded to a contradiction.
    pub fn infeasibility(&self) -> Option<&str> {
        self.infeasible.as_deref()
    }

    fn mark_infeasible(&mut self, reason: String) {
        if self.infeasible.is_none() {
            log::debug!("model is trivially infeasible: {}", reason);
            self.infeasible = Some(reason);
        }
    }
}

impl std::fmt::Debug for PlacementModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementModel")
            .field("stats", &self.model_stats())
            .field("minimize_cost", &self.minimize_cost)
            .field("infeasible", &self.infeasible)
            .finish()
    }
}

impl Default for PlacementModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::Arc;
    use u_layout_core::{Direction, EntityPrototype, ExactConfig, SolutionStatus};

    fn belt_at(x: i32, y: i32) -> Entity {
        Entity::at_tile(
            Arc::new(EntityPrototype::transport_belt()),
            TilePosition::new(x, y),
            Direction::East,
        )
    }

    #[test]
    fn test_lazy_variables() {
        let mut model = PlacementModel::new();
        let a = model.add_placement(belt_at(0, 0), 1.0).unwrap();
        let b = model.add_placement(belt_at(1, 0), 1.0).unwrap();
        assert_eq!(model.model_stats().variables, 0);

        let lit = model.literal(a).unwrap();
        assert_eq!(model.literal(a).unwrap(), lit);
        assert_eq!(model.model_stats().variables, 1);
        assert!(model.candidate(a).unwrap().has_variable());
        assert!(!model.candidate(b).unwrap().has_variable());
    }

    #[test]
    fn test_concurrent_first_reference() {
        let mut model = PlacementModel::new();
        let ids: Vec<_> = (0..16)
            .map(|i| model.add_placement(belt_at(i, 0), 1.0).unwrap())
            .collect();

        let lits: Vec<Lit> = (0..256)
            .into_par_iter()
            .map(|i| model.literal(ids[i % ids.len()]).unwrap())
            .collect();

        assert_eq!(model.model_stats().variables, ids.len());
        for (i, lit) in lits.iter().enumerate() {
            assert_eq!(*lit, model.literal(ids[i % ids.len()]).unwrap());
        }
    }

    #[test]
    fn test_remove_placement() {
        let mut model = PlacementModel::new();
        let a = model.add_placement(belt_at(0, 0), 1.0).unwrap();
        let b = model.add_placement(belt_at(1, 0), 1.0).unwrap();

        model.literal(b).unwrap();
        assert_eq!(model.remove_placement(b), Err(Error::VariableAlreadyBound(b)));

        assert!(model.remove_placement(a).is_ok());
        assert_eq!(model.remove_placement(a), Err(Error::UnknownCandidate(a)));
        assert!(model.candidates_in_tile(TilePosition::new(0, 0)).is_empty());
    }

    #[test]
    fn test_invalid_cost() {
        let mut model = PlacementModel::new();
        assert_eq!(
            model.add_placement(belt_at(0, 0), -1.0).unwrap_err(),
            Error::InvalidCost(-1.0)
        );
        assert!(model.add_placement(belt_at(0, 0), f64::NAN).is_err());
    }

    #[test]
    fn test_can_place_ignores_optional() {
        let mut model = PlacementModel::new();
        model.add_placement(belt_at(0, 0), 1.0).unwrap();
        assert!(model.can_place(belt_at(0, 0).shape()));

        model.add_fixed_entity(belt_at(1, 0));
        assert!(!model.can_place(belt_at(1, 0).shape()));
        assert!(model.can_place(belt_at(2, 0).shape()));
    }

    #[test]
    fn test_non_overlap_with_fixed_resident() {
        let mut model = PlacementModel::new();
        model.add_fixed_entity(belt_at(0, 0));
        let blocked = model.add_placement(belt_at(0, 0), 1.0).unwrap();
        let free = model.add_placement(belt_at(1, 0), 1.0).unwrap();

        model.add_non_overlapping_constraint().unwrap();
        assert_eq!(model.literal(blocked).unwrap(), Lit::FALSE);
        assert!(!model.candidate(blocked).unwrap().has_variable());

        let free_lit = model.literal(free).unwrap();
        model.add_at_least_one(&[free_lit]).unwrap();
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(result.status, SolutionStatus::Optimal);
        assert!(result.is_selected(free));
        assert!(!result.is_selected(blocked));
    }

    #[test]
    fn test_non_overlap_between_optionals() {
        let mut model = PlacementModel::new();
        let a = model.add_placement(belt_at(0, 0), 1.0).unwrap();
        let b = model.add_placement(belt_at(0, 0), 2.0).unwrap();
        let lits = vec![model.literal(a).unwrap(), model.literal(b).unwrap()];

        model.add_non_overlapping_constraint().unwrap();
        model.add_exactly_one(&lits).unwrap();
        model.set_objective();
        let result = model.solve(&ExactConfig::default(), None);

        assert_eq!(result.status, SolutionStatus::Optimal);
        assert!(result.is_selected(a));
        assert!(!result.is_selected(b));
        assert_eq!(result.objective_value, Some(1.0));
    }

    #[test]
    fn test_trivial_infeasibility() {
        let mut model = PlacementModel::new();
        let fixed = model.add_fixed_entity(belt_at(0, 0));
        let lit = model.literal(fixed).unwrap();
        model.add_at_most_one(&[lit, Lit::TRUE]).unwrap();
        assert!(model.infeasibility().is_some());

        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(result.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_solver_infeasibility() {
        let mut model = PlacementModel::new();
        let a = model.add_placement(belt_at(0, 0), 1.0).unwrap();
        let b = model.add_placement(belt_at(0, 0), 1.0).unwrap();
        let lits = vec![model.literal(a).unwrap(), model.literal(b).unwrap()];
        model.add_at_least_one(&lits[..1]).unwrap();
        model.add_at_least_one(&lits[1..]).unwrap();
        model.add_non_overlapping_constraint().unwrap();

        let result = model.solve(&ExactConfig::default(), None);
        assert_eq!(result.status, SolutionStatus::Infeasible);
        assert!(result.selection.is_empty());
    }
}
