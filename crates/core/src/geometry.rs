//! Grid geometry primitives.
//!
//! Coordinates follow the usual factory-grid convention: `x` grows east, `y`
//! grows south, and tile `(x, y)` spans `[x, x + 1) × [y, y + 1)`. Entity
//! positions are continuous and usually sit on tile centres.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used by all geometric comparisons.
pub const EPSILON: f64 = 1e-9;

/// A continuous 2D position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    /// East coordinate.
    pub x: f64,
    /// South coordinate.
    pub y: f64,
}

impl Position {
    /// Creates a position.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance.
    pub fn distance_squared(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Position) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns the tile containing this position.
    pub fn tile(&self) -> TilePosition {
        TilePosition::new(self.x.floor() as i32, self.y.floor() as i32)
    }

    /// Translates the position.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Integer coordinates of a grid tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TilePosition {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePosition {
    /// Creates a tile position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Centre of the tile.
    pub fn center(&self) -> Position {
        Position::new(self.x as f64 + 0.5, self.y as f64 + 0.5)
    }

    /// Top-left corner of the tile.
    pub fn corner(&self) -> Position {
        Position::new(self.x as f64, self.y as f64)
    }

    /// The tile `steps` tiles away in `direction`.
    pub fn step(&self, direction: Direction, steps: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx * steps, self.y + dy * steps)
    }

    /// The adjacent tile in `direction`.
    pub fn neighbor(&self, direction: Direction) -> Self {
        self.step(direction, 1)
    }

    /// The unit tile box.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.x as f64,
            self.y as f64,
            self.x as f64 + 1.0,
            self.y as f64 + 1.0,
        )
    }
}

impl std::fmt::Display for TilePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal facing of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Towards negative `y`.
    #[default]
    North,
    /// Towards positive `x`.
    East,
    /// Towards positive `y`.
    South,
    /// Towards negative `x`.
    West,
}

impl Direction {
    /// All directions in clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Tile offset of one step in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// The direction of a unit step between adjacent tiles.
    pub fn between(from: TilePosition, to: TilePosition) -> Option<Direction> {
        match (to.x - from.x, to.y - from.y) {
            (0, -1) => Some(Self::North),
            (1, 0) => Some(Self::East),
            (0, 1) => Some(Self::South),
            (-1, 0) => Some(Self::West),
            _ => None,
        }
    }

    /// The opposite direction.
    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Rotates a north-relative offset into this direction.
    pub fn rotate(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::North => (x, y),
            Self::East => (-y, x),
            Self::South => (-x, -y),
            Self::West => (y, -x),
        }
    }

    /// Returns true for east and west.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::East | Self::West)
    }
}

/// Axis-aligned bounding box.
///
/// Intersection is strict: boxes that only share an edge do not intersect,
/// which matches how adjacent entities are allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Position,
    /// Maximum corner.
    pub max: Position,
}

impl BoundingBox {
    /// Creates a box from its corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: Position::new(min_x.min(max_x), min_y.min(max_y)),
            max: Position::new(min_x.max(max_x), min_y.max(max_y)),
        }
    }

    /// Creates a box centred on `center` with the given half extents.
    pub fn around(center: Position, half_width: f64, half_height: f64) -> Self {
        Self::new(
            center.x - half_width,
            center.y - half_height,
            center.x + half_width,
            center.y + half_height,
        )
    }

    /// Width of the box.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Height of the box.
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Centre of the box.
    pub fn center(&self) -> Position {
        Position::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    /// Strict interior intersection test.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.x < other.max.x - EPSILON
            && other.min.x < self.max.x - EPSILON
            && self.min.y < other.max.y - EPSILON
            && other.min.y < self.max.y - EPSILON
    }

    /// Inclusive point containment.
    pub fn contains(&self, point: &Position) -> bool {
        point.x >= self.min.x - EPSILON
            && point.x <= self.max.x + EPSILON
            && point.y >= self.min.y - EPSILON
            && point.y <= self.max.y + EPSILON
    }

    /// Expands the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.min.x - margin,
            self.min.y - margin,
            self.max.x + margin,
            self.max.y + margin,
        )
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self::new(
            self.min.x.min(other.min.x),
            self.min.y.min(other.min.y),
            self.max.x.max(other.max.x),
            self.max.y.max(other.max.y),
        )
    }

    /// Translates the box by a position vector.
    pub fn translate(&self, by: Position) -> Self {
        Self::new(
            self.min.x + by.x,
            self.min.y + by.y,
            self.max.x + by.x,
            self.max.y + by.y,
        )
    }

    /// Rotates a north-relative box around the origin into `direction`.
    pub fn rotate(&self, direction: Direction) -> Self {
        let (ax, ay) = direction.rotate(self.min.x, self.min.y);
        let (bx, by) = direction.rotate(self.max.x, self.max.y);
        Self::new(ax, ay, bx, by)
    }

    /// Rounds the box outward to whole tiles.
    pub fn round_out(&self) -> Self {
        let (x0, x1) = tile_span(self.min.x, self.max.x);
        let (y0, y1) = tile_span(self.min.y, self.max.y);
        Self::new(x0 as f64, y0 as f64, (x1 + 1) as f64, (y1 + 1) as f64)
    }

    /// Tiles touched by the box interior, rounding outward.
    pub fn tiles(&self) -> Vec<TilePosition> {
        let (x0, x1) = tile_span(self.min.x, self.max.x);
        let (y0, y1) = tile_span(self.min.y, self.max.y);
        let mut tiles = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)).max(0) as usize);
        for y in y0..=y1 {
            for x in x0..=x1 {
                tiles.push(TilePosition::new(x, y));
            }
        }
        tiles
    }
}

/// Inclusive tile range covered by `[min, max]`; a degenerate span still
/// yields the tile containing `min`.
fn tile_span(min: f64, max: f64) -> (i32, i32) {
    let lo = (min + EPSILON).floor() as i32;
    let hi = (max - EPSILON).ceil() as i32 - 1;
    (lo, hi.max(lo))
}

/// Collision shape of a spatial object.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Axis-aligned box in absolute coordinates.
    Rect(BoundingBox),
    /// Rotated rectangle (e.g. diagonal track pieces).
    Oriented {
        /// Centre of the rectangle.
        center: Position,
        /// Half width and half height before rotation.
        half_extents: [f64; 2],
        /// Rotation in radians, clockwise in grid coordinates.
        angle: f64,
    },
}

impl Shape {
    /// Broad-phase box enclosing the shape.
    pub fn broad_box(&self) -> BoundingBox {
        match self {
            Shape::Rect(b) => *b,
            Shape::Oriented { .. } => {
                let corners = self.corners();
                corners[1..].iter().fold(
                    BoundingBox::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y),
                    |acc, c| acc.union(&BoundingBox::new(c.x, c.y, c.x, c.y)),
                )
            }
        }
    }

    /// Returns true for axis-aligned rectangles.
    pub fn is_axis_aligned(&self) -> bool {
        matches!(self, Shape::Rect(_))
    }

    /// Exact point containment (inclusive of the boundary).
    pub fn contains(&self, point: &Position) -> bool {
        match self {
            Shape::Rect(b) => b.contains(point),
            Shape::Oriented {
                center,
                half_extents,
                angle,
            } => {
                let (u, v) = axes(*angle);
                let dx = point.x - center.x;
                let dy = point.y - center.y;
                let lx = dx * u.0 + dy * u.1;
                let ly = dx * v.0 + dy * v.1;
                lx.abs() <= half_extents[0] + EPSILON && ly.abs() <= half_extents[1] + EPSILON
            }
        }
    }

    /// Exact strict intersection with another shape.
    pub fn intersects(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Rect(a), Shape::Rect(b)) => a.intersects(b),
            _ => {
                if !self.broad_box().intersects(&other.broad_box()) {
                    return false;
                }
                let a = self.corners();
                let b = other.corners();
                self.separating_axes()
                    .into_iter()
                    .chain(other.separating_axes())
                    .all(|axis| overlaps_on(axis, &a, &b))
            }
        }
    }

    /// Exact strict intersection with an axis-aligned box.
    pub fn intersects_box(&self, other: &BoundingBox) -> bool {
        self.intersects(&Shape::Rect(*other))
    }

    /// Translates the shape.
    pub fn translate(&self, by: Position) -> Shape {
        match *self {
            Shape::Rect(b) => Shape::Rect(b.translate(by)),
            Shape::Oriented {
                center,
                half_extents,
                angle,
            } => Shape::Oriented {
                center: center.offset(by.x, by.y),
                half_extents,
                angle,
            },
        }
    }

    fn corners(&self) -> [Position; 4] {
        match self {
            Shape::Rect(b) => [
                b.min,
                Position::new(b.max.x, b.min.y),
                b.max,
                Position::new(b.min.x, b.max.y),
            ],
            Shape::Oriented {
                center,
                half_extents,
                angle,
            } => {
                let (u, v) = axes(*angle);
                let [hx, hy] = *half_extents;
                let corner = |sx: f64, sy: f64| {
                    Position::new(
                        center.x + sx * hx * u.0 + sy * hy * v.0,
                        center.y + sx * hx * u.1 + sy * hy * v.1,
                    )
                };
                [
                    corner(-1.0, -1.0),
                    corner(1.0, -1.0),
                    corner(1.0, 1.0),
                    corner(-1.0, 1.0),
                ]
            }
        }
    }

    fn separating_axes(&self) -> [(f64, f64); 2] {
        match self {
            Shape::Rect(_) => [(1.0, 0.0), (0.0, 1.0)],
            Shape::Oriented { angle, .. } => {
                let (u, v) = axes(*angle);
                [u, v]
            }
        }
    }
}

impl From<BoundingBox> for Shape {
    fn from(b: BoundingBox) -> Self {
        Shape::Rect(b)
    }
}

fn axes(angle: f64) -> ((f64, f64), (f64, f64)) {
    let (s, c) = angle.sin_cos();
    ((c, s), (-s, c))
}

fn overlaps_on(axis: (f64, f64), a: &[Position; 4], b: &[Position; 4]) -> bool {
    let project = |pts: &[Position; 4]| {
        pts.iter()
            .map(|p| p.x * axis.0 + p.y * axis.1)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
                (lo.min(d), hi.max(d))
            })
    };
    let (a_min, a_max) = project(a);
    let (b_min, b_max) = project(b);
    a_min < b_max - EPSILON && b_min < a_max - EPSILON
}

/// Coarse collision class of a prototype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionCategory {
    /// Machines, chests and other ordinary objects.
    #[default]
    Object,
    /// Belts and underground belts.
    Transport,
    /// Power poles.
    Electric,
    /// Impassable terrain or reserved tiles.
    Obstacle,
}
