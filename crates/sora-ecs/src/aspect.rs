//! Aspects: priority-ordered per-frame systems.
//!
//! An aspect declares (at most) one target component type and a priority.
//! Each frame the [`World`] runs its aspects in descending priority order,
//! ties broken by insertion order. An aspect normally walks the entities
//! owning its target type through [`AspectCore::iterate_entities`].
//!
//! # Mutating during a pass
//!
//! [`Members`] borrows the world's membership set, so an aspect that needs
//! `&mut World` while walking its entities takes a
//! [`snapshot`](AspectCore::snapshot) first.

use std::collections::btree_set;

use crate::component::{AsAny, ComponentTypeId};
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

/// A unit of per-frame logic.
pub trait Aspect: AsAny {
    /// Component type whose owners this aspect processes. `None` for
    /// world-level aspects (e.g. a tile map) that process no entities.
    fn target(&self) -> Option<ComponentTypeId>;

    /// Higher runs first.
    fn priority(&self) -> i32;

    /// Name used in diagnostics and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called once when the aspect is added to a world.
    fn on_add(&mut self, world: &World) {
        let _ = world;
    }

    /// Run one pass.
    fn handle(&mut self, world: &mut World, dt: f32) -> Result<(), EcsError>;
}

/// Target and priority shared by every concrete aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectCore {
    target: Option<ComponentTypeId>,
    priority: i32,
}

impl AspectCore {
    /// Core for an aspect over owners of `target`.
    pub fn new(target: ComponentTypeId, priority: i32) -> Self {
        Self {
            target: Some(target),
            priority,
        }
    }

    /// Core for a world-level aspect with no target component.
    pub fn untargeted(priority: i32) -> Self {
        Self {
            target: None,
            priority,
        }
    }

    pub fn target(&self) -> Option<ComponentTypeId> {
        self.target
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    /// Lazy walk over the current owners of the target type. Each call starts
    /// from the beginning.
    pub fn iterate_entities<'w>(&self, world: &'w World) -> Members<'w> {
        match self.target {
            Some(target) => world.members(target),
            None => Members::empty(),
        }
    }

    /// Owned copy of the current owners, safe to hold across world mutation.
    pub fn snapshot(&self, world: &World) -> Vec<EntityId> {
        self.iterate_entities(world).collect()
    }
}

/// Iterator over the entities owning one component type, in ascending
/// identity order.
#[derive(Debug, Clone)]
pub struct Members<'w> {
    inner: Option<btree_set::Iter<'w, EntityId>>,
}

impl<'w> Members<'w> {
    pub(crate) fn new(inner: btree_set::Iter<'w, EntityId>) -> Self {
        Self { inner: Some(inner) }
    }

    pub(crate) fn empty() -> Self {
        Self { inner: None }
    }
}

impl Iterator for Members<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        self.inner.as_mut()?.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Some(it) => it.size_hint(),
            None => (0, Some(0)),
        }
    }
}
