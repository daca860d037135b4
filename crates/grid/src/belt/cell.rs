//! Grid cells and per-cell belt options.

use crate::model::{Cmp, Lit, PlacementModel};
use good_lp::Variable;
use u_layout_core::{CandidateId, Direction, TilePosition};

/// What an option places on its tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Surface belt.
    Belt,
    /// Underground entrance paired with an exit on the problem.
    Entrance,
    /// Underground exit paired with an entrance on the problem.
    Exit,
    /// Entrance whose exit lies off the problem.
    IsolatedEntrance,
    /// Exit whose entrance lies off the problem.
    IsolatedExit,
}

impl Variant {
    /// Returns true for underground pieces.
    pub fn is_underground(self) -> bool {
        self != Self::Belt
    }

    /// Returns true for entrances, isolated or not.
    pub fn is_entrance(self) -> bool {
        matches!(self, Self::Entrance | Self::IsolatedEntrance)
    }

    /// Returns true for exits, isolated or not.
    pub fn is_exit(self) -> bool {
        matches!(self, Self::Exit | Self::IsolatedExit)
    }

    /// Returns true for the off-problem variants.
    pub fn is_isolated(self) -> bool {
        matches!(self, Self::IsolatedEntrance | Self::IsolatedExit)
    }

    /// Display symbol: `=` belt, `>` entrance, `<` exit.
    pub fn symbol(self) -> char {
        match self {
            Self::Belt => '=',
            Self::Entrance | Self::IsolatedEntrance => '>',
            Self::Exit | Self::IsolatedExit => '<',
        }
    }
}

/// One placement choice at one cell.
#[derive(Debug, Clone)]
pub struct BeltOption {
    /// Backing placement candidate.
    pub candidate: CandidateId,
    /// Line the option belongs to.
    pub line: u32,
    /// Tier index within the line.
    pub tier: usize,
    /// Underground prototype name; pieces pair only within one kind.
    pub kind: String,
    /// Underground reach of the tier.
    pub max_distance: u32,
    /// Facing.
    pub facing: Direction,
    /// What is placed.
    pub variant: Variant,
    /// Placement cost.
    pub cost: f64,
    /// Direction surface flow enters the tile, if any.
    pub input: Option<Direction>,
    /// Direction surface flow leaves the tile, if any.
    pub output: Option<Direction>,
    /// Owning cell.
    pub cell: usize,
}

impl BeltOption {
    /// Returns true if `other` is an underground of the same kind on the
    /// same axis, the pieces that end an underground search.
    pub fn blocks(&self, other: &BeltOption) -> bool {
        other.variant.is_underground()
            && other.kind == self.kind
            && (other.facing == self.facing || other.facing == self.facing.opposite())
    }
}

/// Line identity of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Identity {
    /// Every option at the cell belongs to this line.
    Const(u32),
    /// Integer variable over the admissible line ids.
    Var(Variable),
}

impl Identity {
    fn push_terms(self, sign: f64, terms: &mut Vec<(f64, Lit)>, rhs: &mut f64) {
        match self {
            Identity::Const(id) => *rhs -= sign * id as f64,
            Identity::Var(v) => terms.push((sign, Lit::Var(v))),
        }
    }
}

/// A tile of the belt problem.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Tile.
    pub tile: TilePosition,
    /// Indices of the options at this tile.
    pub options: Vec<usize>,
    /// Must not be left empty.
    pub forced: bool,
    /// Line identity, set once options are known.
    pub identity: Option<Identity>,
}

impl Cell {
    /// An empty cell.
    pub fn new(tile: TilePosition) -> Self {
        Self {
            tile,
            options: Vec::new(),
            forced: false,
            identity: None,
        }
    }
}

/// `identity(cell) == line` whenever `guard` is selected.
pub(crate) fn tie_to_line(model: &mut PlacementModel, identity: Identity, line: u32, guard: Lit, big_m: f64) {
    if identity == Identity::Const(line) {
        return;
    }
    tie(model, identity, Identity::Const(line), &[guard], big_m);
}

/// `a == b` whenever one of `guards` (pairwise exclusive) is selected.
///
/// Encoded as `±(a − b) + M·Σguards ≤ M`.
pub(crate) fn tie(model: &mut PlacementModel, a: Identity, b: Identity, guards: &[Lit], big_m: f64) {
    if a == b || guards.is_empty() {
        return;
    }
    for sign in [1.0, -1.0] {
        let mut terms = Vec::with_capacity(guards.len() + 2);
        let mut rhs = big_m;
        a.push_terms(sign, &mut terms, &mut rhs);
        b.push_terms(-sign, &mut terms, &mut rhs);
        terms.extend(guards.iter().map(|&g| (big_m, g)));
        model.add_linear(&terms, Cmp::Le, rhs);
    }
}
