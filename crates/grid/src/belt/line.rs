//! Logical transport lines.

use std::collections::HashSet;
use std::sync::Arc;
use u_layout_core::{Direction, EntityPrototype, Error, Result, TilePosition};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A belt tier: a belt prototype and its matching underground.
#[derive(Debug, Clone, PartialEq)]
pub struct BeltTier {
    /// Surface belt prototype.
    pub belt: Arc<EntityPrototype>,
    /// Underground belt prototype (must carry an `UndergroundSpec`).
    pub underground: Arc<EntityPrototype>,
    /// Cost of one belt tile.
    pub belt_cost: f64,
    /// Cost of an entrance/exit pair.
    pub underground_pair_cost: f64,
}

impl BeltTier {
    /// Tier with costs taken from the prototypes.
    pub fn new(belt: Arc<EntityPrototype>, underground: Arc<EntityPrototype>) -> Self {
        let belt_cost = belt.cost;
        let underground_pair_cost = underground.cost * 2.0;
        Self {
            belt,
            underground,
            belt_cost,
            underground_pair_cost,
        }
    }

    /// Overrides both costs.
    pub fn with_costs(mut self, belt_cost: f64, underground_pair_cost: f64) -> Self {
        self.belt_cost = belt_cost;
        self.underground_pair_cost = underground_pair_cost;
        self
    }

    /// Largest entrance-to-exit distance in tiles.
    pub fn max_distance(&self) -> u32 {
        self.underground
            .underground
            .map(|u| u.max_distance)
            .unwrap_or(0)
    }

    /// Cost of a single underground piece.
    pub fn underground_cost(&self) -> f64 {
        self.underground_pair_cost * 0.5
    }
}

/// How a line ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LineTerminal {
    /// Surface belt flow enters / leaves the line.
    #[default]
    Open,
    /// The line starts at an underground exit (or ends at an entrance) whose
    /// partner lies off the line.
    Underground {
        /// Tier index of the off-line underground.
        tier: usize,
    },
}

/// A logical transport line: consecutive tiles carrying one item stream.
#[derive(Debug, Clone, PartialEq)]
pub struct BeltLine {
    /// Line identity (≥ 1).
    pub id: u32,
    /// Tiles in flow order.
    pub tiles: Vec<TilePosition>,
    /// Direction flow leaves the last tile.
    pub exit: Direction,
    /// Admissible tiers.
    pub tiers: Vec<BeltTier>,
    /// Start terminal.
    pub start: LineTerminal,
    /// End terminal.
    pub end: LineTerminal,
    /// Indices of tiles that must not be left empty.
    pub forced: Vec<usize>,
}

impl BeltLine {
    /// Creates an open-ended line.
    pub fn new(id: u32, tiles: Vec<TilePosition>, exit: Direction, tiers: Vec<BeltTier>) -> Self {
        Self {
            id,
            tiles,
            exit,
            tiers,
            start: LineTerminal::Open,
            end: LineTerminal::Open,
            forced: Vec::new(),
        }
    }

    /// A straight line of `length` tiles from `origin` in `direction`.
    pub fn straight(
        id: u32,
        origin: TilePosition,
        direction: Direction,
        length: usize,
        tiers: Vec<BeltTier>,
    ) -> Self {
        let tiles = (0..length as i32).map(|k| origin.step(direction, k)).collect();
        Self::new(id, tiles, direction, tiers)
    }

    /// Sets the start terminal.
    pub fn with_start(mut self, start: LineTerminal) -> Self {
        self.start = start;
        self
    }

    /// Sets the end terminal.
    pub fn with_end(mut self, end: LineTerminal) -> Self {
        self.end = end;
        self
    }

    /// Forces the tile at `index` to be non-empty.
    pub fn with_forced(mut self, index: usize) -> Self {
        self.forced.push(index);
        self
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns true if the line has no tiles.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Direction flow leaves tile `index`.
    pub fn direction_at(&self, index: usize) -> Direction {
        match self.tiles.get(index + 1) {
            Some(&next) => Direction::between(self.tiles[index], next).unwrap_or(self.exit),
            None => self.exit,
        }
    }

    /// Direction flow enters tile `index`.
    pub fn input_direction_at(&self, index: usize) -> Direction {
        if index == 0 {
            self.direction_at(0)
        } else {
            self.direction_at(index - 1)
        }
    }

    /// Returns true if tile `index` must be filled.
    pub fn is_forced(&self, index: usize) -> bool {
        self.forced.contains(&index)
    }

    /// Checks the line's structural invariants.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::InvalidLine(format!("line {}: {}", self.id, msg)));
        if self.id == 0 {
            return fail("identity must be at least 1".into());
        }
        if self.tiles.is_empty() {
            return fail("no tiles".into());
        }
        if self.tiers.is_empty() {
            return fail("no belt tiers".into());
        }
        for (t, tier) in self.tiers.iter().enumerate() {
            if tier.underground.underground.is_none() {
                return fail(format!("tier {} has no underground reach", t));
            }
            let valid = |c: f64| c.is_finite() && c >= 0.0;
            if !valid(tier.belt_cost) || !valid(tier.underground_pair_cost) {
                return fail(format!("tier {} has an invalid cost", t));
            }
        }
        let mut seen = HashSet::new();
        for (i, tile) in self.tiles.iter().enumerate() {
            if !seen.insert(*tile) {
                return fail(format!("tile {} repeats", tile));
            }
            if i > 0 && Direction::between(self.tiles[i - 1], *tile).is_none() {
                return fail(format!("tiles {} and {} are not adjacent", self.tiles[i - 1], tile));
            }
        }
        if let Some(&bad) = self.forced.iter().find(|&&i| i >= self.tiles.len()) {
            return fail(format!("forced index {} out of range", bad));
        }
        for terminal in [self.start, self.end] {
            if let LineTerminal::Underground { tier } = terminal {
                if tier >= self.tiers.len() {
                    return fail(format!("terminal tier {} out of range", tier));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier() -> BeltTier {
        BeltTier::new(
            Arc::new(EntityPrototype::transport_belt()),
            Arc::new(EntityPrototype::underground_belt()),
        )
    }

    #[test]
    fn test_directions_follow_turns() {
        let line = BeltLine::new(
            1,
            vec![
                TilePosition::new(0, 0),
                TilePosition::new(1, 0),
                TilePosition::new(1, 1),
            ],
            Direction::West,
            vec![tier()],
        );
        assert!(line.validate().is_ok());
        assert_eq!(line.direction_at(0), Direction::East);
        assert_eq!(line.direction_at(1), Direction::South);
        assert_eq!(line.direction_at(2), Direction::West);
        assert_eq!(line.input_direction_at(0), Direction::East);
        assert_eq!(line.input_direction_at(2), Direction::South);
    }

    #[test]
    fn test_validation() {
        let ok = BeltLine::straight(1, TilePosition::new(0, 0), Direction::East, 4, vec![tier()]);
        assert!(ok.validate().is_ok());

        let mut zero = ok.clone();
        zero.id = 0;
        assert!(matches!(zero.validate(), Err(Error::InvalidLine(_))));

        let mut gap = ok.clone();
        gap.tiles[2] = TilePosition::new(5, 5);
        assert!(gap.validate().is_err());

        let mut repeat = ok.clone();
        repeat.tiles.push(TilePosition::new(2, 0));
        assert!(repeat.validate().is_err());

        assert!(ok.clone().with_forced(4).validate().is_err());
        assert!(ok
            .clone()
            .with_end(LineTerminal::Underground { tier: 1 })
            .validate()
            .is_err());

        let mut no_reach = ok;
        no_reach.tiers[0].underground = Arc::new(EntityPrototype::transport_belt());
        assert!(no_reach.validate().is_err());
    }

    #[test]
    fn test_tier_costs() {
        let t = tier().with_costs(1.0, 2.5);
        assert_eq!(t.max_distance(), 5);
        assert_eq!(t.underground_cost(), 1.25);
    }
}
