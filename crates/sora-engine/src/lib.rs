//! Sora Engine -- collision, movement, rendering aspects, particles, and
//! the scene/frame driver on top of [`sora_ecs`].
//!
//! # Quick Start
//!
//! ```
//! use sora_engine::prelude::*;
//!
//! let mut world = World::new(SpatialConfig::default());
//! sora_engine::add_default_aspects(&mut world);
//!
//! let left = world
//!     .spawn(
//!         Entity::new()
//!             .with_velocity(Vec2::new(10.0, 0.0))
//!             .with_component(Shape::aabb(10.0, 10.0))
//!             .with_component(Collider::default()),
//!     )
//!     .unwrap();
//! let right = world
//!     .spawn(
//!         Entity::new()
//!             .at(Vec2::new(5.0, 0.0))
//!             .with_velocity(Vec2::new(-10.0, 0.0))
//!             .with_component(Shape::aabb(10.0, 10.0))
//!             .with_component(Collider::default()),
//!     )
//!     .unwrap();
//!
//! world.update(0.1).unwrap();
//!
//! // Equal masses trade velocities.
//! assert_eq!(world.entity(left).unwrap().velocity(), Vec2::new(-10.0, 0.0));
//! assert_eq!(world.entity(right).unwrap().velocity(), Vec2::new(10.0, 0.0));
//! ```

#![deny(unsafe_code)]

pub mod collision;
pub mod frame;
pub mod movement;
pub mod particles;
pub mod render;
pub mod scene;
pub mod shape;
pub mod tilemap;

use sora_ecs::component::ComponentRegistry;
use sora_ecs::world::World;

/// Re-export the ECS crate for convenience.
pub use sora_ecs;

/// Register every component type this crate defines under its canonical
/// name. Aspect constructors do this for the types they need, so calling it
/// is only required when components are attached before any aspect exists.
pub fn register_components(registry: &mut ComponentRegistry) {
    registry.register::<shape::Shape>("shape");
    registry.register::<collision::Collider>("collider");
    registry.register::<movement::Movement>("movement");
    registry.register::<render::Sprite>("sprite");
    registry.register::<render::SpriteRenderer>("sprite_renderer");
    registry.register::<render::RenderableTag>("renderable");
}

/// Add the movement, collision, renderable, and sprite aspects to `world`.
pub fn add_default_aspects(world: &mut World) {
    let movement = movement::MovementAspect::new(world.registry_mut());
    let collision = collision::CollisionAspect::new(world.registry_mut());
    let renderables = render::RenderableAspect::new(world.registry_mut());
    let sprites = render::SpriteRenderAspect::new(world.registry_mut());
    world.add_aspect(movement);
    world.add_aspect(collision);
    world.add_aspect(renderables);
    world.add_aspect(sprites);
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use sora_ecs::prelude::*;

    pub use crate::collision::{Collider, Collision, CollisionAspect, CollisionError, ResolverRegistry};
    pub use crate::frame::{FrameConfig, FrameLoop};
    pub use crate::movement::{Movement, MovementAspect};
    pub use crate::particles::{ParticleConfig, ParticleEmitter, ParticleRegistry};
    pub use crate::render::{RenderableAspect, RenderableTag, Sprite, SpriteRenderAspect, SpriteRenderer};
    pub use crate::scene::{Scene, SceneStack};
    pub use crate::shape::{Aabb, RotatedBox, Shape, ShapeKind};
    pub use crate::tilemap::TileMap;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
