//! Entity identifiers, allocation, and per-entity state.
//!
//! An [`EntityId`] is a 64-bit handle drawn from a monotonic counter owned by
//! the [`World`](crate::world::World). Identities are never recycled, so a
//! handle to a removed entity can never alias a newer one.
//!
//! Entities start life as a detached [`Entity`] description. Passing it to
//! [`World::spawn`](crate::world::World::spawn) allocates the identity, files
//! the entity into its chunk, and attaches the queued components; from then on
//! the live state is an [`EntityRecord`] owned by the world.

use std::collections::HashMap;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::behavior::EntityBehavior;
use crate::chunk::ChunkCoord;
use crate::component::{Component, ComponentTypeId};
use crate::geometry::Rect;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A unique, never-reused entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out [`EntityId`]s from a monotonic counter.
///
/// Identity `0` is never issued; the first entity is `#1`.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    issued: u64,
}

impl EntityAllocator {
    /// Create a new allocator that has issued nothing yet.
    pub fn new() -> Self {
        Self { issued: 0 }
    }

    /// Allocate the next identity.
    pub fn allocate(&mut self) -> EntityId {
        self.issued += 1;
        EntityId(self.issued)
    }

    /// Number of identities issued over the allocator's lifetime.
    pub fn issued(&self) -> u64 {
        self.issued
    }
}

// ---------------------------------------------------------------------------
// Entity (detached)
// ---------------------------------------------------------------------------

/// Deferred `attach` call queued on a detached [`Entity`].
type PendingAttach = Box<dyn FnOnce(&mut World, EntityId) -> Result<(), EcsError>>;

/// A detached entity description.
///
/// ```
/// use sora_ecs::prelude::*;
///
/// let mut world = World::new(SpatialConfig::default());
/// let id = world
///     .spawn(Entity::new().at(Vec2::new(10.0, 20.0)).with_size(16.0, 16.0))
///     .unwrap();
/// assert_eq!(world.entity(id).unwrap().position(), Vec2::new(10.0, 20.0));
/// ```
pub struct Entity {
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) size: Vec2,
    pub(crate) pending: Vec<PendingAttach>,
    pub(crate) behavior: Option<Box<dyn EntityBehavior>>,
}

impl Entity {
    /// An entity at the origin with no extent, velocity, or components.
    pub fn new() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            size: Vec2::ZERO,
            pending: Vec::new(),
            behavior: None,
        }
    }

    /// Initial position (centre of the bounding rectangle).
    pub fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Initial velocity in pixels per second.
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Extent of the bounding rectangle.
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Vec2::new(width.max(0.0), height.max(0.0));
        self
    }

    /// Queue a component; it is attached, in queue order, when the entity is
    /// spawned.
    pub fn with_component<T: Component>(mut self, component: T) -> Self {
        self.pending
            .push(Box::new(move |world, id| world.attach(id, component)));
        self
    }

    /// Give the entity per-frame behaviour hooks.
    pub fn with_behavior<B: EntityBehavior>(mut self, behavior: B) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("size", &self.size)
            .field("pending_components", &self.pending.len())
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EntityRecord (live)
// ---------------------------------------------------------------------------

/// Live state of an entity registered in a [`World`].
///
/// Position is read-only from outside the crate: moves go through
/// [`World::set_position`] or [`World::commit_projected`] so that the bounding
/// rectangle and chunk residency stay in step.
pub struct EntityRecord {
    pub(crate) id: EntityId,
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) projected: Vec2,
    pub(crate) rect: Rect,
    pub(crate) chunk: ChunkCoord,
    pub(crate) alive: bool,
    pub(crate) components: HashMap<ComponentTypeId, Box<dyn Component>>,
    pub(crate) behavior: Option<Box<dyn EntityBehavior>>,
}

impl EntityRecord {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Mutable velocity. Velocity carries no derived state, so it may be
    /// edited freely.
    pub fn velocity_mut(&mut self) -> &mut Vec2 {
        &mut self.velocity
    }

    /// Scratch position used by look-ahead movement and collision passes.
    pub fn projected_position(&self) -> Vec2 {
        self.projected
    }

    /// Bounding rectangle, always centred on [`position`](Self::position).
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Chunk the entity currently resides in.
    pub fn chunk(&self) -> ChunkCoord {
        self.chunk
    }

    /// `false` once [`World::kill`] has been called for this entity.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Number of attached components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Whether a component of the given registered type is attached.
    pub fn has_component_id(&self, type_id: ComponentTypeId) -> bool {
        self.components.contains_key(&type_id)
    }

    /// Borrow a sibling component by registered type id, downcast to `T`.
    pub fn component<T: Component>(&self, type_id: ComponentTypeId) -> Option<&T> {
        self.components
            .get(&type_id)
            .and_then(|c| crate::component::downcast_ref::<T>(&**c))
    }

    /// The entity's behaviour hooks, if any.
    pub fn behavior(&self) -> Option<&dyn EntityBehavior> {
        self.behavior.as_deref()
    }
}

impl fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecord")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("chunk", &self.chunk)
            .field("alive", &self.alive)
            .field("components", &self.components.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
