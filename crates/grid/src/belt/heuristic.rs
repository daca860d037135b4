//! Single-line layout by dynamic programming.
//!
//! Walks a line back to front computing the cheapest way to carry flow that
//! arrives at each tile to the line's end, choosing per step between a
//! surface belt and an underground skip. Skipped tiles are left empty, so
//! forced tiles are never skipped; unavailable options (blocked tiles, bent
//! runs) are reported by the caller.

use super::cell::Variant;
use super::line::{BeltLine, LineTerminal};

/// One piece of a heuristic layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// Tile index within the line.
    pub index: usize,
    /// Tier index.
    pub tier: usize,
    /// Variant placed.
    pub variant: Variant,
}

/// A complete layout of one line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineLayout {
    /// Pieces in tile order.
    pub pieces: Vec<Piece>,
    /// Total cost.
    pub cost: f64,
}

impl LineLayout {
    /// Tile-type string of the layout over `len` tiles.
    pub fn symbols(&self, len: usize) -> String {
        let mut chars = vec![' '; len];
        for piece in &self.pieces {
            chars[piece.index] = piece.variant.symbol();
        }
        chars.into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Belt(usize),
    Skip { tier: usize, exit: usize },
    IsolatedEntrance(usize),
}

/// Cheapest layout of `line`, or `None` if the line cannot be completed.
///
/// `available(index, tier, variant)` reports whether that option exists.
pub fn layout_line<F>(line: &BeltLine, available: F) -> Option<LineLayout>
where
    F: Fn(usize, usize, Variant) -> bool,
{
    let n = line.len();
    if n == 0 {
        return None;
    }

    // best[i]: cost of carrying flow that arrives at tile i to the line end.
    let mut best = vec![f64::INFINITY; n + 1];
    let mut step: Vec<Option<Step>> = vec![None; n + 1];
    if line.end == LineTerminal::Open {
        best[n] = 0.0;
    }

    for i in (0..n).rev() {
        let mut here: (f64, Option<Step>) = (f64::INFINITY, None);
        let mut consider = |cost: f64, s: Step| {
            if cost < here.0 {
                here = (cost, Some(s));
            }
        };

        for (t, tier) in line.tiers.iter().enumerate() {
            if available(i, t, Variant::Belt) {
                consider(tier.belt_cost + best[i + 1], Step::Belt(t));
            }

            if i + 1 == n {
                if let LineTerminal::Underground { tier: end_tier } = line.end {
                    if end_tier == t && available(i, t, Variant::IsolatedEntrance) {
                        consider(tier.underground_cost(), Step::IsolatedEntrance(t));
                    }
                }
            }

            if !available(i, t, Variant::Entrance) {
                continue;
            }
            let d = line.direction_at(i);
            for k in 1..=tier.max_distance() as usize {
                let j = i + k;
                if j >= n
                    || line.tiles[j] != line.tiles[i].step(d, k as i32)
                    || line.is_forced(j - 1) && j - 1 > i
                {
                    break;
                }
                if line.direction_at(j) == d && available(j, t, Variant::Exit) {
                    consider(
                        tier.underground_pair_cost + best[j + 1],
                        Step::Skip { tier: t, exit: j },
                    );
                }
            }
        }
        (best[i], step[i]) = here;
    }

    let (mut i, mut pieces, cost) = match line.start {
        LineTerminal::Open => (0, Vec::new(), best[0]),
        LineTerminal::Underground { tier } => {
            if !available(0, tier, Variant::IsolatedExit) || n < 2 && line.end != LineTerminal::Open {
                return None;
            }
            let piece = Piece {
                index: 0,
                tier,
                variant: Variant::IsolatedExit,
            };
            (1, vec![piece], line.tiers[tier].underground_cost() + best[1])
        }
    };
    if !cost.is_finite() {
        return None;
    }

    while i < n {
        match step[i]? {
            Step::Belt(tier) => {
                pieces.push(Piece {
                    index: i,
                    tier,
                    variant: Variant::Belt,
                });
                i += 1;
            }
            Step::Skip { tier, exit } => {
                pieces.push(Piece {
                    index: i,
                    tier,
                    variant: Variant::Entrance,
                });
                pieces.push(Piece {
                    index: exit,
                    tier,
                    variant: Variant::Exit,
                });
                i = exit + 1;
            }
            Step::IsolatedEntrance(tier) => {
                pieces.push(Piece {
                    index: i,
                    tier,
                    variant: Variant::IsolatedEntrance,
                });
                i += 1;
            }
        }
    }
    Some(LineLayout { pieces, cost })
}
