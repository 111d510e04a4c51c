//! Per-entity behaviour hooks and the renderable capability.
//!
//! Game-specific entity kinds implement [`EntityBehavior`] and hand it to
//! [`Entity::with_behavior`](crate::entity::Entity::with_behavior). The world
//! calls the hooks at fixed points of the frame:
//!
//! - [`update`](EntityBehavior::update) during the chunk pass, only for
//!   entities resident in an active chunk;
//! - [`on_ready`](EntityBehavior::on_ready) once, after every aspect has run
//!   in the frame the entity was spawned.
//!
//! While a hook runs, its behaviour is detached from the entity record, so
//! [`World::behavior`](crate::world::World::behavior) returns `None` for the
//! entity being processed.

use glam::Vec2;

use crate::component::AsAny;
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

/// Hooks for script-defined entity kinds.
pub trait EntityBehavior: AsAny {
    /// Per-frame update for entities in active chunks.
    fn update(&mut self, entity: EntityId, world: &mut World, dt: f32) -> Result<(), EcsError> {
        let _ = (entity, world, dt);
        Ok(())
    }

    /// Fired once at the end of the frame in which the entity was spawned.
    fn on_ready(&mut self, entity: EntityId, world: &mut World) -> Result<(), EcsError> {
        let _ = (entity, world);
        Ok(())
    }

    /// The renderable capability, if this behaviour draws itself.
    ///
    /// Checked when a renderable marker component is attached, so that a
    /// missing capability fails at setup instead of mid-frame.
    fn as_renderable(&self) -> Option<&dyn Renderable> {
        None
    }
}

/// Capability for behaviours that produce their own draw calls.
pub trait Renderable {
    fn render(&self, entity: EntityId, world: &World, out: &mut Vec<DrawCall>);
}

/// A presentation-agnostic draw request. The renderer that consumes these is
/// outside the simulation core.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    /// A sprite blitted with its top-left corner at `top_left`.
    Sprite {
        entity: EntityId,
        texture: String,
        top_left: Vec2,
        size: Vec2,
    },
    /// A map tile.
    Tile {
        texture: String,
        top_left: Vec2,
        size: Vec2,
    },
    /// A filled circle.
    Circle {
        center: Vec2,
        radius: f32,
        color: [u8; 3],
    },
    /// A closed polygon outline.
    Polygon { points: Vec<Vec2>, color: [u8; 3] },
}
