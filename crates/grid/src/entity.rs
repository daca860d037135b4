//! Placed entities.

use std::sync::Arc;
use u_layout_core::{BoundingBox, Direction, EntityPrototype, Position, Shape, TilePosition};

/// An entity instance: a prototype placed at a position with a facing.
#[derive(Debug, Clone)]
pub struct Entity {
    prototype: Arc<EntityPrototype>,
    position: Position,
    direction: Direction,
    shape: Shape,
}

impl Entity {
    /// Places `prototype` at `position`, rotating its collision box to
    /// `direction`.
    pub fn new(prototype: Arc<EntityPrototype>, position: Position, direction: Direction) -> Self {
        let shape = Shape::Rect(prototype.collision_box.rotate(direction).translate(position));
        Self {
            prototype,
            position,
            direction,
            shape,
        }
    }

    /// Places `prototype` so that its footprint's top-left tile is `tile`.
    pub fn at_tile(prototype: Arc<EntityPrototype>, tile: TilePosition, direction: Direction) -> Self {
        let (w, h) = if direction.is_horizontal() {
            (prototype.tile_height, prototype.tile_width)
        } else {
            (prototype.tile_width, prototype.tile_height)
        };
        let position = tile.corner().offset(w as f64 * 0.5, h as f64 * 0.5);
        Self::new(prototype, position, direction)
    }

    /// Overrides the collision shape (for non-axis-aligned entities).
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// The entity's prototype.
    pub fn prototype(&self) -> &Arc<EntityPrototype> {
        &self.prototype
    }

    /// Prototype name.
    pub fn name(&self) -> &str {
        &self.prototype.name
    }

    /// Entity position.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Entity facing.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Collision shape in absolute coordinates.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Broad-phase collision box.
    pub fn bounding_box(&self) -> BoundingBox {
        self.shape.broad_box()
    }

    /// Tiles covered by the footprint.
    pub fn tiles(&self) -> Vec<TilePosition> {
        self.bounding_box().tiles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_at_tile_centres_footprint() {
        let substation = Arc::new(EntityPrototype::substation());
        let entity = Entity::at_tile(substation, TilePosition::new(4, 4), Direction::North);
        assert_relative_eq!(entity.position().x, 5.0);
        assert_relative_eq!(entity.position().y, 5.0);
        assert_eq!(entity.tiles().len(), 4);
    }

    #[test]
    fn test_rotated_footprint() {
        let proto = Arc::new(EntityPrototype::new("inserter-long", 1, 2));
        let north = Entity::at_tile(Arc::clone(&proto), TilePosition::new(0, 0), Direction::North);
        let east = Entity::at_tile(proto, TilePosition::new(0, 0), Direction::East);
        assert_eq!(
            north.tiles(),
            vec![TilePosition::new(0, 0), TilePosition::new(0, 1)]
        );
        assert_eq!(
            east.tiles(),
            vec![TilePosition::new(0, 0), TilePosition::new(1, 0)]
        );
    }
}
