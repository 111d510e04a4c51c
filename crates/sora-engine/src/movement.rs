//! Velocity integration for entities that do not take part in collisions.

use sora_ecs::aspect::{Aspect, AspectCore};
use sora_ecs::component::{Component, ComponentRegistry, ComponentTypeId};
use sora_ecs::entity::EntityId;
use sora_ecs::world::World;
use sora_ecs::EcsError;

use crate::collision::Collider;

/// Priority of the movement aspect. Runs before collision.
pub const MOVEMENT_PRIORITY: i32 = 20;

/// Marks an entity as moving under its own velocity each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Movement;

impl Component for Movement {}

/// Advance `entity` by `velocity * dt`, re-syncing its rectangle and chunk.
pub fn integrate(world: &mut World, entity: EntityId, dt: f32) -> Result<(), EcsError> {
    let record = world
        .entity(entity)
        .ok_or(EcsError::StaleEntity { entity })?;
    let next = record.position() + record.velocity() * dt;
    world.set_position(entity, next)
}

/// Integrates every [`Movement`] entity. Entities that also own a
/// [`Collider`] are left to the collision aspect, which moves them through
/// their projected position.
#[derive(Debug)]
pub struct MovementAspect {
    core: AspectCore,
    collider: ComponentTypeId,
}

impl MovementAspect {
    /// Registers [`Movement`] and [`Collider`] if needed.
    pub fn new(registry: &mut ComponentRegistry) -> Self {
        let movement = registry.register::<Movement>("movement");
        let collider = registry.register::<Collider>("collider");
        Self {
            core: AspectCore::new(movement, MOVEMENT_PRIORITY),
            collider,
        }
    }
}

impl Aspect for MovementAspect {
    fn target(&self) -> Option<ComponentTypeId> {
        self.core.target()
    }

    fn priority(&self) -> i32 {
        self.core.priority()
    }

    fn name(&self) -> &str {
        "movement"
    }

    fn handle(&mut self, world: &mut World, dt: f32) -> Result<(), EcsError> {
        for entity in self.core.snapshot(world) {
            if world.has_component_id(entity, self.collider) {
                continue;
            }
            integrate(world, entity, dt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use sora_ecs::prelude::*;

    fn setup_world() -> World {
        let mut world = World::new(SpatialConfig::default());
        let aspect = MovementAspect::new(world.registry_mut());
        world.add_aspect(aspect);
        world.register_component::<Shape>("shape");
        world
    }

    #[test]
    fn moves_by_velocity_times_dt() {
        let mut world = setup_world();
        let e = world
            .spawn(
                Entity::new()
                    .with_velocity(Vec2::new(10.0, -4.0))
                    .with_component(Movement),
            )
            .unwrap();
        world.update(0.5).unwrap();
        assert_eq!(world.entity(e).unwrap().position(), Vec2::new(5.0, -2.0));
        assert_eq!(world.entity(e).unwrap().rect().center(), Vec2::new(5.0, -2.0));
    }

    #[test]
    fn zero_velocity_stays_put() {
        let mut world = setup_world();
        let e = world
            .spawn(Entity::new().at(Vec2::splat(3.0)).with_component(Movement))
            .unwrap();
        world.update(1.0).unwrap();
        assert_eq!(world.entity(e).unwrap().position(), Vec2::splat(3.0));
    }

    #[test]
    fn crossing_chunk_edge_migrates() {
        let mut world = setup_world();
        let e = world
            .spawn(
                Entity::new()
                    .at(Vec2::new(250.0, 10.0))
                    .with_velocity(Vec2::new(100.0, 0.0))
                    .with_component(Movement),
            )
            .unwrap();
        world.update(0.1).unwrap();
        assert_eq!(world.entity(e).unwrap().chunk(), ChunkCoord::new(1, 0));
        assert!(!world.chunk(ChunkCoord::new(0, 0)).unwrap().contains(e));
    }

    #[test]
    fn collider_entities_are_skipped() {
        let mut world = setup_world();
        let e = world
            .spawn(
                Entity::new()
                    .with_velocity(Vec2::X)
                    .with_component(Movement)
                    .with_component(Shape::aabb(1.0, 1.0))
                    .with_component(Collider::default()),
            )
            .unwrap();
        world.update(1.0).unwrap();
        assert_eq!(world.entity(e).unwrap().position(), Vec2::ZERO);
    }

    #[test]
    fn integrate_unknown_entity_is_stale() {
        let mut world = setup_world();
        let err = integrate(&mut world, EntityId::from_raw(99), 1.0).unwrap_err();
        assert!(matches!(err, EcsError::StaleEntity { .. }));
    }
}
