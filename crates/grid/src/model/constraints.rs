//! Literals and constraint emission.
//!
//! Every helper funnels its degenerate cases through [`reduce_cardinality`]:
//! solver backends read "exactly one of nothing" as unsatisfiable, so empty
//! and single-literal inputs are resolved here before anything reaches the
//! model.

use super::PlacementModel;
use good_lp::{constraint, Expression, Variable};
use u_layout_core::{Error, Result};

/// A model term: a constant truth value or a solver variable.
///
/// Fixed candidates and forbidden candidates resolve to constants; optional
/// candidates and auxiliary variables resolve to `Var`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lit {
    /// Constant 1 (`true`) or 0 (`false`).
    Const(bool),
    /// Decision variable.
    Var(Variable),
}

impl Lit {
    /// Constant true.
    pub const TRUE: Lit = Lit::Const(true);
    /// Constant false.
    pub const FALSE: Lit = Lit::Const(false);

    /// Linear expression of the literal.
    pub fn expr(self) -> Expression {
        match self {
            Lit::Const(true) => Expression::from(1.0),
            Lit::Const(false) => Expression::from(0.0),
            Lit::Var(v) => Expression::from(v),
        }
    }
}

impl From<Variable> for Lit {
    fn from(v: Variable) -> Self {
        Lit::Var(v)
    }
}

/// Cardinality constraint kinds over boolean literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one literal true.
    AtMostOne,
    /// Exactly one literal true.
    ExactlyOne,
    /// At least one literal true.
    AtLeastOne,
}

impl Cardinality {
    fn name(self) -> &'static str {
        match self {
            Self::AtMostOne => "at-most-one",
            Self::ExactlyOne => "exactly-one",
            Self::AtLeastOne => "at-least-one",
        }
    }
}

/// Comparison of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// `lhs <= rhs`
    Le,
    /// `lhs == rhs`
    Eq,
    /// `lhs >= rhs`
    Ge,
}

impl Cmp {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        const TOL: f64 = 1e-9;
        match self {
            Cmp::Le => lhs <= rhs + TOL,
            Cmp::Eq => (lhs - rhs).abs() <= TOL,
            Cmp::Ge => lhs >= rhs - TOL,
        }
    }
}

/// What a cardinality constraint reduces to once constants are folded.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// Always satisfied; emit nothing.
    Vacuous,
    /// Never satisfiable.
    Unsatisfiable,
    /// Fix each variable to the given value.
    Fix(Vec<(Variable, bool)>),
    /// `sum(vars) cmp 1`.
    Sum(Vec<Variable>, Cmp),
}

/// Folds constant literals and resolves 0/1-variable cases.
///
/// Returns [`Error::EmptyConstraint`] for exactly-one or at-least-one over an
/// empty literal list: asking for that is a modeling bug, not an
/// infeasibility.
pub fn reduce_cardinality(kind: Cardinality, lits: &[Lit]) -> Result<Reduction> {
    if lits.is_empty() && kind != Cardinality::AtMostOne {
        return Err(Error::EmptyConstraint { kind: kind.name() });
    }

    let trues = lits.iter().filter(|l| **l == Lit::TRUE).count();
    let mut vars: Vec<Variable> = lits
        .iter()
        .filter_map(|l| match l {
            Lit::Var(v) => Some(*v),
            Lit::Const(_) => None,
        })
        .collect();
    let all_false = |vars: Vec<Variable>| {
        if vars.is_empty() {
            Reduction::Vacuous
        } else {
            Reduction::Fix(vars.into_iter().map(|v| (v, false)).collect())
        }
    };

    let reduction = match kind {
        Cardinality::AtMostOne => match trues {
            0 if vars.len() <= 1 => Reduction::Vacuous,
            0 => Reduction::Sum(vars, Cmp::Le),
            1 => all_false(vars),
            _ => Reduction::Unsatisfiable,
        },
        Cardinality::ExactlyOne => match trues {
            0 if vars.is_empty() => Reduction::Unsatisfiable,
            0 if vars.len() == 1 => Reduction::Fix(vec![(vars.remove(0), true)]),
            0 => Reduction::Sum(vars, Cmp::Eq),
            1 => all_false(vars),
            _ => Reduction::Unsatisfiable,
        },
        Cardinality::AtLeastOne => match trues {
            0 if vars.is_empty() => Reduction::Unsatisfiable,
            0 if vars.len() == 1 => Reduction::Fix(vec![(vars.remove(0), true)]),
            0 => Reduction::Sum(vars, Cmp::Ge),
            _ => Reduction::Vacuous,
        },
    };
    Ok(reduction)
}

impl PlacementModel {
    /// At most one of `lits` is true.
    pub fn add_at_most_one(&mut self, lits: &[Lit]) -> Result<()> {
        self.apply(Cardinality::AtMostOne, lits)
    }

    /// Exactly one of `lits` is true.
    pub fn add_exactly_one(&mut self, lits: &[Lit]) -> Result<()> {
        self.apply(Cardinality::ExactlyOne, lits)
    }

    /// At least one of `lits` is true.
    pub fn add_at_least_one(&mut self, lits: &[Lit]) -> Result<()> {
        self.apply(Cardinality::AtLeastOne, lits)
    }

    /// `a ⇒ b`.
    pub fn add_implies(&mut self, a: Lit, b: Lit) {
        self.add_implies_any(a, &[b]);
    }

    /// `a ⇒ OR(bs)`. With no `bs`, `a` is forced false.
    pub fn add_implies_any(&mut self, a: Lit, bs: &[Lit]) {
        if a == Lit::FALSE || bs.contains(&Lit::TRUE) {
            return;
        }
        let mut terms = Vec::with_capacity(bs.len() + 1);
        terms.push((1.0, a));
        terms.extend(bs.iter().map(|&b| (-1.0, b)));
        self.add_linear(&terms, Cmp::Le, 0.0);
    }

    /// `Σ coef·term cmp rhs`, with constant terms folded into `rhs`.
    ///
    /// A constraint with no variable left is checked immediately; if it does
    /// not hold the model is marked infeasible.
    pub fn add_linear(&mut self, terms: &[(f64, Lit)], cmp: Cmp, rhs: f64) {
        let mut rhs = rhs;
        let mut expr = Expression::from(0.0);
        let mut has_var = false;
        for &(coef, term) in terms {
            match term {
                Lit::Const(true) => rhs -= coef,
                Lit::Const(false) => {}
                Lit::Var(v) => {
                    expr += coef * v;
                    has_var = true;
                }
            }
        }
        if !has_var {
            if !cmp.holds(0.0, rhs) {
                self.mark_infeasible(format!("constant constraint 0 {cmp:?} {rhs}"));
            }
            return;
        }
        let c = match cmp {
            Cmp::Le => constraint!(expr <= rhs),
            Cmp::Eq => constraint!(expr == rhs),
            Cmp::Ge => constraint!(expr >= rhs),
        };
        self.constraints.push(c);
    }

    /// Fixes a variable to 0 or 1.
    pub fn fix(&mut self, var: Variable, value: bool) {
        let target = if value { 1.0 } else { 0.0 };
        self.constraints.push(constraint!(var == target));
    }

    fn apply(&mut self, kind: Cardinality, lits: &[Lit]) -> Result<()> {
        match reduce_cardinality(kind, lits)? {
            Reduction::Vacuous => {}
            Reduction::Unsatisfiable => {
                self.mark_infeasible(format!("{} over constants", kind.name()));
            }
            Reduction::Fix(fixings) => {
                for (var, value) in fixings {
                    self.fix(var, value);
                }
            }
            Reduction::Sum(vars, cmp) => {
                let terms: Vec<(f64, Lit)> = vars.into_iter().map(|v| (1.0, Lit::Var(v))).collect();
                self.add_linear(&terms, cmp, 1.0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::{variable, ProblemVariables};

    fn vars(n: usize) -> Vec<Variable> {
        let mut pv = ProblemVariables::new();
        (0..n).map(|_| pv.add(variable().binary())).collect()
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(
            reduce_cardinality(Cardinality::AtMostOne, &[]).unwrap(),
            Reduction::Vacuous
        );
        assert!(matches!(
            reduce_cardinality(Cardinality::ExactlyOne, &[]),
            Err(Error::EmptyConstraint { kind: "exactly-one" })
        ));
        assert!(matches!(
            reduce_cardinality(Cardinality::AtLeastOne, &[]),
            Err(Error::EmptyConstraint { .. })
        ));
    }

    #[test]
    fn test_single_variable() {
        let v = vars(1);
        let lits = [Lit::Var(v[0])];
        assert_eq!(
            reduce_cardinality(Cardinality::AtMostOne, &lits).unwrap(),
            Reduction::Vacuous
        );
        assert_eq!(
            reduce_cardinality(Cardinality::ExactlyOne, &lits).unwrap(),
            Reduction::Fix(vec![(v[0], true)])
        );
        assert_eq!(
            reduce_cardinality(Cardinality::AtLeastOne, &lits).unwrap(),
            Reduction::Fix(vec![(v[0], true)])
        );
    }

    #[test]
    fn test_constant_folding() {
        let v = vars(2);
        let with_true = [Lit::TRUE, Lit::Var(v[0]), Lit::Var(v[1])];
        assert_eq!(
            reduce_cardinality(Cardinality::AtMostOne, &with_true).unwrap(),
            Reduction::Fix(vec![(v[0], false), (v[1], false)])
        );
        assert_eq!(
            reduce_cardinality(Cardinality::AtLeastOne, &with_true).unwrap(),
            Reduction::Vacuous
        );
        assert_eq!(
            reduce_cardinality(Cardinality::ExactlyOne, &[Lit::TRUE, Lit::TRUE]).unwrap(),
            Reduction::Unsatisfiable
        );
        assert_eq!(
            reduce_cardinality(Cardinality::AtLeastOne, &[Lit::FALSE]).unwrap(),
            Reduction::Unsatisfiable
        );
        assert_eq!(
            reduce_cardinality(Cardinality::ExactlyOne, &[Lit::FALSE, Lit::Var(v[0]), Lit::Var(v[1])])
                .unwrap(),
            Reduction::Sum(v.clone(), Cmp::Eq)
        );
    }
}
