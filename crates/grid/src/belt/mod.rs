//! Belt line subproblem.
//!
//! Given logical transport lines (consecutive tiles carrying one stream),
//! chooses per tile: nothing, a belt, or an underground entrance/exit of some
//! tier, minimizing cost while keeping every line connected end to end.
//!
//! Each line tile becomes a [`Cell`]; each admissible choice at a cell is an
//! optional placement candidate ([`BeltOption`]). The constraints are:
//!
//! - at most one option per cell (exactly one on forced cells),
//! - a line identity per cell, tied to whichever option is selected,
//! - surface flow: what leaves a cell in direction `D` enters its
//!   `D`-neighbor, and connected cells carry the same identity,
//! - underground pairing: an entrance pairs with the nearest same-kind exit
//!   within reach, with no same-kind piece in between,
//! - isolated pieces at underground terminals have no partner in range,
//! - open terminals carry flow in and out of the line.
//!
//! [`BeltProblem::build`] emits only these constraints. A heuristic layout per
//! line can then be injected with [`BeltProblem::apply_heuristic`], once every
//! other subproblem sharing the model has added its candidates.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use u_layout_core::{Direction, EntityPrototype, ExactConfig, TilePosition};
//! use u_layout_grid::{BeltConfig, BeltLine, BeltProblem, BeltTier, PlacementModel};
//!
//! let tier = BeltTier::new(
//!     Arc::new(EntityPrototype::transport_belt()),
//!     Arc::new(EntityPrototype::underground_belt()),
//! )
//! .with_costs(1.0, 2.5);
//! let line = BeltLine::straight(1, TilePosition::new(0, 0), Direction::East, 6, vec![tier]);
//!
//! let mut model = PlacementModel::new();
//! let mut belts = BeltProblem::new(BeltConfig::default());
//! belts.add_line(line).unwrap();
//! belts.build(&mut model).unwrap();
//! model.set_objective();
//!
//! let result = model.solve(&ExactConfig::default(), None);
//! assert_eq!(belts.tile_string(1, &result).unwrap(), ">    <");
//! ```

mod cell;
pub mod heuristic;
mod line;

pub use cell::{BeltOption, Cell, Identity, Variant};
pub use heuristic::{layout_line, LineLayout, Piece};
pub use line::{BeltLine, BeltTier, LineTerminal};

use crate::entity::Entity;
use crate::model::{Cmp, Lit, PlacementModel};
use cell::{tie, tie_to_line};
use std::collections::{HashMap, HashSet};
use u_layout_core::{CandidateId, Direction, Error, Result, SolveResult, TilePosition};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the heuristic layout feeds the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeuristicMode {
    /// Do not run the heuristic.
    #[default]
    Off,
    /// Bound each line's cost by its heuristic cost.
    UpperBound,
    /// Pre-assign the heuristic layout.
    Fix,
}

/// Belt subproblem configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeltConfig {
    /// Heuristic injection mode.
    pub heuristic: HeuristicMode,
}

impl BeltConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the heuristic mode.
    pub fn with_heuristic(mut self, heuristic: HeuristicMode) -> Self {
        self.heuristic = heuristic;
        self
    }
}

type OptionKey = (usize, usize, usize, Variant);

/// Belt lines built against a [`PlacementModel`].
#[derive(Debug, Default)]
pub struct BeltProblem {
    config: BeltConfig,
    lines: Vec<BeltLine>,
    cells: Vec<Cell>,
    lookup: HashMap<TilePosition, usize>,
    options: Vec<BeltOption>,
    literals: Vec<Lit>,
    keys: HashMap<OptionKey, usize>,
    // Options fed from / draining to the off-problem side of an open terminal.
    fed: HashSet<usize>,
    drained: HashSet<usize>,
    layouts: Vec<Option<LineLayout>>,
    heuristic_applied: bool,
}

impl BeltProblem {
    /// Creates an empty problem.
    pub fn new(config: BeltConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Adds a line after validating it.
    pub fn add_line(&mut self, line: BeltLine) -> Result<()> {
        line.validate()?;
        if self.lines.iter().any(|l| l.id == line.id) {
            return Err(Error::InvalidLine(format!("duplicate line id {}", line.id)));
        }
        self.lines.push(line);
        Ok(())
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[BeltLine] {
        &self.lines
    }

    /// Cells in creation order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// All options.
    pub fn options(&self) -> &[BeltOption] {
        &self.options
    }

    /// Heuristic layout of a line, if one was found.
    pub fn layout(&self, line: u32) -> Option<&LineLayout> {
        let index = self.lines.iter().position(|l| l.id == line)?;
        self.layouts.get(index)?.as_ref()
    }

    /// Returns true if a heuristic layout was injected for some line.
    pub fn heuristic_applied(&self) -> bool {
        self.heuristic_applied
    }

    /// Emits the candidates and constraints of every line into `model`.
    pub fn build(&mut self, model: &mut PlacementModel) -> Result<()> {
        self.register_cells();
        self.create_options(model)?;
        self.check_required_cells()?;
        self.literals = self
            .options
            .iter()
            .map(|o| model.literal(o.candidate))
            .collect::<Result<Vec<_>>>()?;

        self.add_cell_constraints(model)?;
        self.add_identities(model);
        self.add_flow_constraints(model);
        self.add_terminal_constraints(model)?;
        self.add_pairing_constraints(model);
        self.add_isolated_constraints(model);

        log::debug!(
            "belt problem: {} lines, {} cells, {} options",
            self.lines.len(),
            self.cells.len(),
            self.options.len()
        );
        Ok(())
    }

    fn register_cells(&mut self) {
        for line in &self.lines {
            for (i, &tile) in line.tiles.iter().enumerate() {
                let next = self.cells.len();
                let c = *self.lookup.entry(tile).or_insert(next);
                if c == next {
                    self.cells.push(Cell::new(tile));
                }
                if line.is_forced(i) {
                    self.cells[c].forced = true;
                }
            }
        }
    }

    fn create_options(&mut self, model: &mut PlacementModel) -> Result<()> {
        for li in 0..self.lines.len() {
            let line = &self.lines[li];
            let last = line.len() - 1;
            let mut staged = Vec::new();
            for (i, &tile) in line.tiles.iter().enumerate() {
                let facing = line.direction_at(i);
                let entering = line.input_direction_at(i);
                let straight = entering == facing;
                for (t, tier) in line.tiers.iter().enumerate() {
                    let reach = tier.max_distance() as i32;
                    let reaches = |dir: Direction| {
                        (1..=reach).any(|k| self.lookup.contains_key(&tile.step(dir, k)))
                    };
                    let mut push = |variant: Variant, input, output| {
                        staged.push((i, t, variant, tile, facing, input, output));
                    };
                    push(Variant::Belt, Some(entering), Some(facing));
                    if straight && i < last && reaches(facing) {
                        push(Variant::Entrance, Some(facing), None);
                    }
                    if i > 0 && reaches(facing.opposite()) {
                        push(Variant::Exit, None, Some(facing));
                    }
                    if i == 0 && line.start == (LineTerminal::Underground { tier: t }) {
                        push(Variant::IsolatedExit, None, Some(facing));
                    }
                    if i == last && straight && line.end == (LineTerminal::Underground { tier: t }) {
                        push(Variant::IsolatedEntrance, Some(facing), None);
                    }
                }
            }

            for (i, t, variant, tile, facing, input, output) in staged {
                let line = &self.lines[li];
                let tier = &line.tiers[t];
                let (proto, cost) = match variant {
                    Variant::Belt => (&tier.belt, tier.belt_cost),
                    _ => (&tier.underground, tier.underground_cost()),
                };
                let entity = Entity::at_tile(proto.clone(), tile, facing);
                if !model.can_place(entity.shape()) {
                    continue;
                }
                let option = BeltOption {
                    candidate: model.add_placement(entity, cost)?,
                    line: line.id,
                    tier: t,
                    kind: tier.underground.name.clone(),
                    max_distance: tier.max_distance(),
                    facing,
                    variant,
                    cost,
                    input,
                    output,
                    cell: self.lookup[&tile],
                };
                let index = self.options.len();
                if i == 0 && line.start == LineTerminal::Open && input.is_some() {
                    self.fed.insert(index);
                }
                if i == line.len() - 1 && line.end == LineTerminal::Open && output.is_some() {
                    self.drained.insert(index);
                }
                self.cells[option.cell].options.push(index);
                self.keys.insert((li, i, t, variant), index);
                self.options.push(option);
            }
        }
        Ok(())
    }

    /// Forced and terminal tiles need at least one option of their line.
    fn check_required_cells(&self) -> Result<()> {
        for line in &self.lines {
            let last = line.len() - 1;
            for (i, tile) in line.tiles.iter().enumerate() {
                if !(i == 0 || i == last || line.is_forced(i)) {
                    continue;
                }
                let cell = &self.cells[self.lookup[tile]];
                if !cell.options.iter().any(|&o| self.options[o].line == line.id) {
                    return Err(Error::NoValidOptions(*tile));
                }
            }
        }
        Ok(())
    }

    fn cell_literals(&self, cell: usize, keep: impl Fn(&BeltOption) -> bool) -> Vec<Lit> {
        self.cells[cell]
            .options
            .iter()
            .filter(|&&o| keep(&self.options[o]))
            .map(|&o| self.literals[o])
            .collect()
    }

    fn add_cell_constraints(&self, model: &mut PlacementModel) -> Result<()> {
        for (c, cell) in self.cells.iter().enumerate() {
            let lits = self.cell_literals(c, |_| true);
            if cell.forced {
                model.add_exactly_one(&lits)?;
            } else {
                model.add_at_most_one(&lits)?;
            }
        }
        Ok(())
    }

    fn big_m(&self) -> f64 {
        self.lines.iter().map(|l| l.id).max().unwrap_or(1) as f64
    }

    fn add_identities(&mut self, model: &mut PlacementModel) {
        let big_m = self.big_m();
        for c in 0..self.cells.len() {
            let ids: Vec<u32> = self.cells[c]
                .options
                .iter()
                .map(|&o| self.options[o].line)
                .collect();
            let (Some(&lo), Some(&hi)) = (ids.iter().min(), ids.iter().max()) else {
                continue;
            };
            let identity = if lo == hi {
                Identity::Const(lo)
            } else {
                Identity::Var(model.new_integer(lo as i64, hi as i64))
            };
            for &o in &self.cells[c].options {
                tie_to_line(model, identity, self.options[o].line, self.literals[o], big_m);
            }
            self.cells[c].identity = Some(identity);
        }
    }

    fn add_flow_constraints(&self, model: &mut PlacementModel) {
        let big_m = self.big_m();
        for (x, cell) in self.cells.iter().enumerate() {
            for dir in Direction::ALL {
                let Some(&y) = self.lookup.get(&cell.tile.neighbor(dir)) else {
                    continue;
                };
                let outs: Vec<Lit> = self.cells[x]
                    .options
                    .iter()
                    .filter(|&&o| self.options[o].output == Some(dir) && !self.drained.contains(&o))
                    .map(|&o| self.literals[o])
                    .collect();
                let ins: Vec<Lit> = self.cells[y]
                    .options
                    .iter()
                    .filter(|&&o| self.options[o].input == Some(dir) && !self.fed.contains(&o))
                    .map(|&o| self.literals[o])
                    .collect();
                if outs.is_empty() && ins.is_empty() {
                    continue;
                }
                let terms: Vec<(f64, Lit)> = outs
                    .iter()
                    .map(|&l| (1.0, l))
                    .chain(ins.iter().map(|&l| (-1.0, l)))
                    .collect();
                model.add_linear(&terms, Cmp::Eq, 0.0);
                if let (Some(a), Some(b)) = (cell.identity, self.cells[y].identity) {
                    tie(model, a, b, &outs, big_m);
                }
            }
        }
    }

    fn add_terminal_constraints(&self, model: &mut PlacementModel) -> Result<()> {
        for line in &self.lines {
            let last = line.len() - 1;
            let first_cell = self.lookup[&line.tiles[0]];
            let last_cell = self.lookup[&line.tiles[last]];

            let start = match line.start {
                LineTerminal::Open => {
                    let entering = line.input_direction_at(0);
                    self.cell_literals(first_cell, |o| {
                        o.line == line.id && o.input == Some(entering)
                    })
                }
                LineTerminal::Underground { tier } => self.cell_literals(first_cell, |o| {
                    o.line == line.id && o.tier == tier && o.variant == Variant::IsolatedExit
                }),
            };
            if start.is_empty() {
                return Err(Error::NoValidOptions(line.tiles[0]));
            }
            model.add_exactly_one(&start)?;

            let end = match line.end {
                LineTerminal::Open => self.cell_literals(last_cell, |o| {
                    o.line == line.id && o.output == Some(line.exit)
                }),
                LineTerminal::Underground { tier } => self.cell_literals(last_cell, |o| {
                    o.line == line.id && o.tier == tier && o.variant == Variant::IsolatedEntrance
                }),
            };
            if end.is_empty() {
                return Err(Error::NoValidOptions(line.tiles[last]));
            }
            model.add_exactly_one(&end)?;
        }
        Ok(())
    }

    /// Pieces at `cell` that end an underground search by `piece`.
    fn blockers_at(&self, piece: &BeltOption, cell: usize) -> Vec<Lit> {
        self.cell_literals(cell, |o| piece.blocks(o))
    }

    fn add_pairing_constraints(&self, model: &mut PlacementModel) {
        let big_m = self.big_m();
        // (exit option) -> pair variables that land on it.
        let mut incoming: HashMap<usize, Vec<Lit>> = HashMap::new();

        for (a, entrance) in self.options.iter().enumerate() {
            if entrance.variant != Variant::Entrance {
                continue;
            }
            let u = self.literals[a];
            let origin = self.cells[entrance.cell].tile;
            let mut between: Vec<Vec<Lit>> = Vec::new();
            let mut pairs = Vec::new();

            for k in 1..=entrance.max_distance as i32 {
                let Some(&y) = self.lookup.get(&origin.step(entrance.facing, k)) else {
                    continue;
                };
                let targets: Vec<usize> = self.cells[y]
                    .options
                    .iter()
                    .copied()
                    .filter(|&o| {
                        let exit = &self.options[o];
                        exit.variant == Variant::Exit
                            && exit.kind == entrance.kind
                            && exit.facing == entrance.facing
                    })
                    .collect();

                if !targets.is_empty() {
                    let pair = Lit::Var(model.new_binary());
                    model.add_implies(pair, u);
                    let target_lits: Vec<Lit> = targets.iter().map(|&o| self.literals[o]).collect();
                    model.add_implies_any(pair, &target_lits);
                    for blockers in &between {
                        let mut terms = vec![(1.0, pair)];
                        terms.extend(blockers.iter().map(|&b| (1.0, b)));
                        model.add_linear(&terms, Cmp::Le, 1.0);
                    }
                    if let (Some(ia), Some(ib)) =
                        (self.cells[entrance.cell].identity, self.cells[y].identity)
                    {
                        tie(model, ia, ib, &[pair], big_m);
                    }
                    for o in targets {
                        incoming.entry(o).or_default().push(pair);
                    }
                    pairs.push(pair);
                }

                let blockers = self.blockers_at(entrance, y);
                if !blockers.is_empty() {
                    between.push(blockers);
                }
            }
            model.add_implies_any(u, &pairs);
        }

        for (o, exit) in self.options.iter().enumerate() {
            if exit.variant == Variant::Exit {
                let pairs = incoming.remove(&o).unwrap_or_default();
                model.add_implies_any(self.literals[o], &pairs);
            }
        }
    }

    /// An isolated piece must not find a partner in range: for every
    /// distance, the piece, a candidate partner there and no blocker in
    /// between cannot all hold.
    fn add_isolated_constraints(&self, model: &mut PlacementModel) {
        for (a, piece) in self.options.iter().enumerate() {
            let (search, wants_entrance) = match piece.variant {
                Variant::IsolatedEntrance => (piece.facing, false),
                Variant::IsolatedExit => (piece.facing.opposite(), true),
                _ => continue,
            };
            let origin = self.cells[piece.cell].tile;
            let mut between: Vec<Lit> = Vec::new();
            for k in 1..=piece.max_distance as i32 {
                let Some(&y) = self.lookup.get(&origin.step(search, k)) else {
                    continue;
                };
                let partners = self.cell_literals(y, |o| {
                    o.kind == piece.kind
                        && o.facing == piece.facing
                        && if wants_entrance {
                            o.variant.is_entrance()
                        } else {
                            o.variant.is_exit()
                        }
                });
                if !partners.is_empty() {
                    let mut terms = vec![(1.0, self.literals[a])];
                    terms.extend(partners.iter().map(|&p| (1.0, p)));
                    terms.extend(between.iter().map(|&b| (-1.0, b)));
                    model.add_linear(&terms, Cmp::Le, 1.0);
                }
                between.extend(self.blockers_at(piece, y));
            }
        }
    }

    /// Injects the heuristic layouts in the configured mode and returns how
    /// many lines received one.
    ///
    /// Call once every subproblem sharing `model` has added its candidates.
    /// A layout only bounds a line that nothing else can touch, so a line is
    /// skipped when an optional candidate outside this problem occupies one of
    /// its tiles, or when another line has options on or within underground
    /// reach of its tiles.
    pub fn apply_heuristic(&mut self, model: &mut PlacementModel) -> Result<usize> {
        if self.config.heuristic == HeuristicMode::Off {
            return Ok(0);
        }
        self.layouts = self
            .lines
            .iter()
            .enumerate()
            .map(|(li, line)| {
                layout_line(line, |i, t, v| self.keys.contains_key(&(li, i, t, v)))
            })
            .collect();

        let own: HashSet<CandidateId> = self.options.iter().map(|o| o.candidate).collect();
        let mut applied = 0;
        for (li, layout) in self.layouts.iter().enumerate() {
            let line_id = self.lines[li].id;
            let Some(layout) = layout else {
                log::warn!("No heuristic layout for line {}", line_id);
                continue;
            };
            if !self.is_independent(li, model, &own) {
                log::debug!("line {} interacts with other placements, no heuristic", line_id);
                continue;
            }
            match self.config.heuristic {
                HeuristicMode::UpperBound => {
                    let terms: Vec<(f64, Lit)> = self
                        .options
                        .iter()
                        .enumerate()
                        .filter(|(_, o)| o.line == line_id)
                        .map(|(o, opt)| (opt.cost, self.literals[o]))
                        .collect();
                    model.add_linear(&terms, Cmp::Le, layout.cost + 1e-6);
                }
                HeuristicMode::Fix => {
                    for piece in &layout.pieces {
                        let key = (li, piece.index, piece.tier, piece.variant);
                        if let Some(&o) = self.keys.get(&key) {
                            model.add_at_least_one(&[self.literals[o]])?;
                        }
                    }
                }
                HeuristicMode::Off => {}
            }
            applied += 1;
        }
        self.heuristic_applied |= applied > 0;
        log::debug!(
            "heuristic layouts applied as {:?} to {} of {} lines",
            self.config.heuristic,
            applied,
            self.lines.len()
        );
        Ok(applied)
    }

    /// True if no foreign optional candidate sits on line `li` and no other
    /// line has options on or within reach of its tiles.
    fn is_independent(
        &self,
        li: usize,
        model: &PlacementModel,
        own: &HashSet<CandidateId>,
    ) -> bool {
        let line = &self.lines[li];
        let reach = self
            .options
            .iter()
            .map(|o| o.max_distance)
            .max()
            .unwrap_or(0)
            .max(1) as i32;
        line.tiles.iter().all(|&tile| {
            let crowded = model.candidates_in_tile(tile).into_iter().any(|id| {
                !own.contains(&id) && model.candidate(id).is_some_and(|c| !c.is_fixed())
            });
            let mut near = std::iter::once(tile).chain(
                Direction::ALL
                    .into_iter()
                    .flat_map(move |d| (1..=reach).map(move |k| tile.step(d, k))),
            );
            !crowded
                && near.all(|t| {
                    self.lookup.get(&t).map_or(true, |&c| {
                        self.cells[c]
                            .options
                            .iter()
                            .all(|&o| self.options[o].line == line.id)
                    })
                })
        })
    }

    /// Options selected in `result`.
    pub fn selected(&self, result: &SolveResult) -> Vec<&BeltOption> {
        self.options
            .iter()
            .filter(|o| result.is_selected(o.candidate))
            .collect()
    }

    /// One character per tile of `line`: `' '` empty, `'='` belt, `'>'`
    /// entrance, `'<'` exit.
    pub fn tile_string(&self, line: u32, result: &SolveResult) -> Result<String> {
        let spec = self
            .lines
            .iter()
            .find(|l| l.id == line)
            .ok_or_else(|| Error::InvalidLine(format!("unknown line {}", line)))?;
        Ok(spec
            .tiles
            .iter()
            .map(|tile| {
                self.lookup
                    .get(tile)
                    .and_then(|&c| {
                        self.cells[c].options.iter().find(|&&o| {
                            self.options[o].line == line
                                && result.is_selected(self.options[o].candidate)
                        })
                    })
                    .map_or(' ', |&o| self.options[o].variant.symbol())
            })
            .collect())
    }
}
