//! The [`World`] is the top-level container for one simulation layer. It owns
//! the entity table, the chunk table, the component registry, the
//! component-type → entity membership index, and the ordered aspect list.
//!
//! # Frame
//!
//! [`World::update`] runs three passes, always in this order:
//!
//! 1. **Chunk pass**: every live entity resident in an active chunk gets its
//!    [`EntityBehavior::update`] hook.
//! 2. **Aspect pass**: aspects run in descending priority order (ties keep
//!    insertion order). Aspects iterate membership sets directly, so they see
//!    entities regardless of chunk activity.
//! 3. **Ready pass**: entities spawned during this frame (including ones
//!    spawned by the ready hooks themselves) get [`EntityBehavior::on_ready`]
//!    exactly once.
//!
//! Aspects added or removed from inside an aspect's `handle` take effect
//! once the aspect pass ends: an added aspect first runs next frame, and a
//! removed one still finishes the current pass.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use glam::Vec2;

use crate::aspect::{Aspect, Members};
use crate::behavior::EntityBehavior;
use crate::chunk::{Chunk, ChunkCoord};
use crate::component::{self, AttachContext, Component, ComponentRegistry, ComponentTypeId};
use crate::config::SpatialConfig;
use crate::entity::{Entity, EntityAllocator, EntityId, EntityRecord};
use crate::geometry::Rect;
use crate::EcsError;

/// Default Chebyshev radius of the active chunk set.
pub const DEFAULT_RENDER_DISTANCE: u32 = 1;

/// Container for entities, chunks, and aspects of one simulation layer.
pub struct World {
    config: SpatialConfig,
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    entities: HashMap<EntityId, EntityRecord>,
    chunks: HashMap<ChunkCoord, Chunk>,
    active_chunks: BTreeSet<ChunkCoord>,
    center_chunk: ChunkCoord,
    render_distance: u32,
    /// Component type -> owning entities. Aspects iterate these.
    membership: HashMap<ComponentTypeId, BTreeSet<EntityId>>,
    /// Sorted by descending priority, stable.
    aspects: Vec<Box<dyn Aspect>>,
    /// True while `aspects` is taken out for the aspect pass.
    in_aspect_pass: bool,
    /// Removals requested during the aspect pass.
    pending_removals: Vec<fn(&dyn Aspect) -> bool>,
    /// Spawned this frame, waiting for their ready hook.
    pending_ready: Vec<EntityId>,
    frame: u64,
    aspect_times: Vec<(String, Duration)>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.len())
            .field("chunk_count", &self.chunks.len())
            .field("active_chunks", &self.active_chunks.len())
            .field("aspect_count", &self.aspects.len())
            .field("frame", &self.frame)
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(SpatialConfig::default())
    }
}

impl World {
    /// Create an empty world centred on chunk `(0, 0)` with the default
    /// render distance.
    pub fn new(config: SpatialConfig) -> Self {
        Self::with_render_distance(config, DEFAULT_RENDER_DISTANCE)
    }

    /// Create an empty world with an explicit render distance.
    pub fn with_render_distance(config: SpatialConfig, render_distance: u32) -> Self {
        let mut world = Self {
            config,
            allocator: EntityAllocator::new(),
            registry: ComponentRegistry::new(),
            entities: HashMap::new(),
            chunks: HashMap::new(),
            active_chunks: BTreeSet::new(),
            center_chunk: ChunkCoord::default(),
            render_distance,
            membership: HashMap::new(),
            aspects: Vec::new(),
            in_aspect_pass: false,
            pending_removals: Vec::new(),
            pending_ready: Vec::new(),
            frame: 0,
            aspect_times: Vec::new(),
        };
        world.set_center_chunk(ChunkCoord::default());
        world
    }

    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Mutable access to the component registry, for aspects that register
    /// their target types at construction.
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Register a component type. Convenience wrapper.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        self.registry.register::<T>(name)
    }

    /// Number of completed frames.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    // -- chunks -------------------------------------------------------------

    /// Return the chunk at `coord`, creating it if this is the first access.
    pub fn get_chunk(&mut self, coord: ChunkCoord) -> &mut Chunk {
        let config = &self.config;
        self.chunks.entry(coord).or_insert_with(|| {
            tracing::debug!(chunk = %coord, "created chunk");
            Chunk::new(coord, config)
        })
    }

    /// The chunk at `coord`, if it exists.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// All existing chunks, in no particular order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Register a pre-built chunk. Fails if one already exists at its
    /// coordinate.
    pub fn add_chunk(&mut self, chunk: Chunk) -> Result<(), EcsError> {
        let coord = chunk.coord();
        if self.chunks.contains_key(&coord) {
            return Err(EcsError::DuplicateChunk { coord });
        }
        self.chunks.insert(coord, chunk);
        Ok(())
    }

    /// Remove an empty chunk. Returns `Ok(None)` if no chunk exists at
    /// `coord`, and fails if entities still reside in it.
    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> Result<Option<Chunk>, EcsError> {
        match self.chunks.get(&coord) {
            None => Ok(None),
            Some(chunk) if !chunk.is_empty() => Err(EcsError::ChunkOccupied {
                coord,
                residents: chunk.resident_count(),
            }),
            Some(_) => {
                self.active_chunks.remove(&coord);
                Ok(self.chunks.remove(&coord))
            }
        }
    }

    pub fn center_chunk(&self) -> ChunkCoord {
        self.center_chunk
    }

    pub fn render_distance(&self) -> u32 {
        self.render_distance
    }

    /// Recentre the active set on `center`: every chunk within the render
    /// distance (Chebyshev, inclusive) becomes active, and is created if
    /// needed.
    pub fn set_center_chunk(&mut self, center: ChunkCoord) {
        self.center_chunk = center;
        self.active_chunks.clear();
        for coord in center.neighbourhood(self.render_distance) {
            self.get_chunk(coord);
            self.active_chunks.insert(coord);
        }
    }

    /// Change the render distance and recompute the active set.
    pub fn set_render_distance(&mut self, render_distance: u32) {
        self.render_distance = render_distance;
        self.set_center_chunk(self.center_chunk);
    }

    /// Active chunk coordinates, in ascending order.
    pub fn active_chunks(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.active_chunks.iter().copied()
    }

    pub fn is_chunk_active(&self, coord: ChunkCoord) -> bool {
        self.active_chunks.contains(&coord)
    }

    /// Entities resident in active chunks, chunk by chunk.
    pub fn active_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.active_chunks
            .iter()
            .filter_map(|coord| self.chunks.get(coord))
            .flat_map(|chunk| chunk.residents())
    }

    /// Move `entity` from chunk `old` to chunk `new` and record the new
    /// coordinate on the entity.
    pub fn move_entity_chunk(
        &mut self,
        entity: EntityId,
        old: ChunkCoord,
        new: ChunkCoord,
    ) -> Result<(), EcsError> {
        let stored = self
            .entities
            .get(&entity)
            .map(|r| r.chunk)
            .ok_or(EcsError::StaleEntity { entity })?;
        for coord in [old, stored] {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                chunk.remove(entity);
            }
        }
        self.get_chunk(new).insert(entity);
        if let Some(record) = self.entities.get_mut(&entity) {
            record.chunk = new;
        }
        tracing::debug!(%entity, from = %old, to = %new, "entity changed chunk");
        Ok(())
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Register a detached entity.
    ///
    /// Allocates its identity, files it into the chunk under its position,
    /// then attaches its queued components in order. If any attach fails the
    /// entity is removed again and the error returned.
    pub fn spawn(&mut self, entity: Entity) -> Result<EntityId, EcsError> {
        let Entity {
            position,
            velocity,
            size,
            pending,
            behavior,
        } = entity;

        let id = self.allocator.allocate();
        let rect = Rect::from_center(position, size.x, size.y);
        let chunk = self.config.chunk_coord_for(rect.center());
        self.entities.insert(
            id,
            EntityRecord {
                id,
                position,
                velocity,
                projected: position,
                rect,
                chunk,
                alive: true,
                components: HashMap::new(),
                behavior,
            },
        );
        self.get_chunk(chunk).insert(id);
        self.pending_ready.push(id);

        for attach in pending {
            if let Err(err) = attach(self, id) {
                let _ = self.despawn(id);
                return Err(err);
            }
        }

        tracing::debug!(entity = %id, %chunk, "spawned entity");
        Ok(id)
    }

    /// Remove an entity: purge it from its chunk and from every membership
    /// set it belongs to.
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let record = self
            .entities
            .remove(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        if let Some(chunk) = self.chunks.get_mut(&record.chunk) {
            chunk.remove(entity);
        }
        for type_id in record.components.keys() {
            if let Some(members) = self.membership.get_mut(type_id) {
                members.remove(&entity);
            }
        }
        self.pending_ready.retain(|e| *e != entity);
        tracing::debug!(%entity, "despawned entity");
        Ok(())
    }

    /// Mark an entity dead. It stays in the world until removed.
    pub fn kill(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        record.alive = false;
        Ok(())
    }

    /// Despawn every killed entity. Returns the removed identities in
    /// ascending order.
    pub fn remove_dead(&mut self) -> Vec<EntityId> {
        let mut dead: Vec<EntityId> = self
            .entities
            .values()
            .filter(|r| !r.alive)
            .map(|r| r.id)
            .collect();
        dead.sort();
        for &entity in &dead {
            let _ = self.despawn(entity);
        }
        dead
    }

    /// Whether `entity` is registered (dead or alive).
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Whether `entity` is registered and has not been killed.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.get(&entity).is_some_and(|r| r.alive)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All registered identities, ascending.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn entity(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&entity)
    }

    pub fn entity_mut(&mut self, entity: EntityId) -> Option<&mut EntityRecord> {
        self.entities.get_mut(&entity)
    }

    // -- movement -----------------------------------------------------------

    /// Move an entity: update its position, recentre its bounding rectangle,
    /// and migrate it if the rectangle's centre now falls in another chunk.
    /// The projected position is reset to the new position.
    pub fn set_position(&mut self, entity: EntityId, position: Vec2) -> Result<(), EcsError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        record.position = position;
        record.projected = position;
        record.rect.set_center(position);
        let old = record.chunk;
        let new = self.config.chunk_coord_for(record.rect.center());
        if old != new {
            self.move_entity_chunk(entity, old, new)?;
        }
        Ok(())
    }

    pub fn set_velocity(&mut self, entity: EntityId, velocity: Vec2) -> Result<(), EcsError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        record.velocity = velocity;
        Ok(())
    }

    /// Overwrite the scratch position. Position, rectangle, and chunk are
    /// untouched until [`commit_projected`](Self::commit_projected).
    pub fn set_projected(&mut self, entity: EntityId, projected: Vec2) -> Result<(), EcsError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        record.projected = projected;
        Ok(())
    }

    /// Make the projected position the real one.
    pub fn commit_projected(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let projected = self
            .entities
            .get(&entity)
            .map(|r| r.projected)
            .ok_or(EcsError::StaleEntity { entity })?;
        self.set_position(entity, projected)
    }

    // -- components ---------------------------------------------------------

    /// Attach `component` to `entity`.
    ///
    /// Fails with [`EcsError::DuplicateComponent`] if the entity already owns
    /// one of this type, or with whatever the component's
    /// [`on_attach`](Component::on_attach) hook returns. On failure the entity
    /// and the membership index are unchanged.
    pub fn attach<T: Component>(&mut self, entity: EntityId, mut component: T) -> Result<(), EcsError> {
        let type_id = self
            .registry
            .lookup::<T>()
            .ok_or_else(|| EcsError::UnknownComponent {
                name: std::any::type_name::<T>().to_owned(),
                registered: self.registry.registered_names().join(", "),
            })?;
        let record = self
            .entities
            .get(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        let name = self.registry.name_of(type_id);
        if record.components.contains_key(&type_id) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: name.to_owned(),
            });
        }

        let ctx = AttachContext {
            entity,
            component: name,
            record,
            registry: &self.registry,
        };
        component.on_attach(&ctx)?;

        let Some(record) = self.entities.get_mut(&entity) else {
            return Err(EcsError::StaleEntity { entity });
        };
        record.components.insert(type_id, Box::new(component));
        self.membership.entry(type_id).or_default().insert(entity);
        tracing::trace!(%entity, component = self.registry.name_of(type_id), "attached component");
        Ok(())
    }

    /// Detach and return the component of type `T`, or `None` if absent.
    pub fn detach<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        let type_id = self.registry.lookup::<T>()?;
        let boxed = self.detach_by_id(entity, type_id)?;
        boxed.into_any().downcast::<T>().ok().map(|b| *b)
    }

    /// Type-erased detach. A no-op returning `None` if absent.
    pub fn detach_by_id(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
    ) -> Option<Box<dyn Component>> {
        let record = self.entities.get_mut(&entity)?;
        let boxed = record.components.remove(&type_id)?;
        if let Some(members) = self.membership.get_mut(&type_id) {
            members.remove(&entity);
        }
        tracing::trace!(%entity, component = self.registry.name_of(type_id), "detached component");
        Some(boxed)
    }

    /// Borrow the component of type `T`, or `None` if absent.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let type_id = self.registry.lookup::<T>()?;
        self.entities.get(&entity)?.component::<T>(type_id)
    }

    /// Mutably borrow the component of type `T`, or `None` if absent.
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let type_id = self.registry.lookup::<T>()?;
        let boxed = self.entities.get_mut(&entity)?.components.get_mut(&type_id)?;
        component::downcast_mut::<T>(&mut **boxed)
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.registry
            .lookup::<T>()
            .is_some_and(|type_id| self.has_component_id(entity, type_id))
    }

    pub fn has_component_id(&self, entity: EntityId, type_id: ComponentTypeId) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|r| r.has_component_id(type_id))
    }

    /// Lazy walk over the owners of `type_id`, ascending.
    pub fn members(&self, type_id: ComponentTypeId) -> Members<'_> {
        match self.membership.get(&type_id) {
            Some(set) => Members::new(set.iter()),
            None => Members::empty(),
        }
    }

    /// Owned copy of the owners of `type_id`.
    pub fn members_snapshot(&self, type_id: ComponentTypeId) -> Vec<EntityId> {
        self.members(type_id).collect()
    }

    /// Whether a membership set exists for `type_id` (it may be empty).
    pub fn has_membership_set(&self, type_id: ComponentTypeId) -> bool {
        self.membership.contains_key(&type_id)
    }

    /// Rebuild the type → entity index from the entities' component maps.
    pub fn rebuild_membership_index(&mut self) {
        for members in self.membership.values_mut() {
            members.clear();
        }
        for (id, record) in &self.entities {
            for type_id in record.components.keys() {
                self.membership.entry(*type_id).or_default().insert(*id);
            }
        }
    }

    // -- behaviours ---------------------------------------------------------

    /// Borrow an entity's behaviour as its concrete type.
    ///
    /// Returns `None` while that behaviour's own hook is running.
    pub fn behavior<B: EntityBehavior>(&self, entity: EntityId) -> Option<&B> {
        self.entities
            .get(&entity)?
            .behavior
            .as_deref()
            .and_then(|b| b.as_any().downcast_ref::<B>())
    }

    pub fn behavior_mut<B: EntityBehavior>(&mut self, entity: EntityId) -> Option<&mut B> {
        self.entities
            .get_mut(&entity)?
            .behavior
            .as_deref_mut()
            .and_then(|b| b.as_any_mut().downcast_mut::<B>())
    }

    /// Run `hook` with the entity's behaviour detached, then put it back if
    /// the entity still exists.
    fn run_behavior_hook<F>(&mut self, entity: EntityId, hook: F) -> Result<(), EcsError>
    where
        F: FnOnce(&mut dyn EntityBehavior, &mut World) -> Result<(), EcsError>,
    {
        let Some(mut behavior) = self
            .entities
            .get_mut(&entity)
            .and_then(|r| r.behavior.take())
        else {
            return Ok(());
        };
        let result = hook(&mut *behavior, self);
        if let Some(record) = self.entities.get_mut(&entity) {
            if record.behavior.is_none() {
                record.behavior = Some(behavior);
            }
        }
        result
    }

    // -- aspects ------------------------------------------------------------

    /// Add an aspect. Its target type gets an (empty if need be) membership
    /// set so iteration never misses a key.
    ///
    /// Aspects added during a frame's aspect pass take effect next frame.
    pub fn add_aspect<A: Aspect>(&mut self, mut aspect: A) {
        aspect.on_add(self);
        if let Some(target) = aspect.target() {
            self.membership.entry(target).or_default();
        }
        tracing::debug!(aspect = aspect.name(), priority = aspect.priority(), "added aspect");
        self.insert_aspect(Box::new(aspect));
    }

    fn insert_aspect(&mut self, aspect: Box<dyn Aspect>) {
        self.aspects.push(aspect);
        // Stable sort keeps insertion order among equal priorities.
        self.aspects.sort_by_key(|a| Reverse(a.priority()));
    }

    /// First aspect of type `A`.
    pub fn get_aspect<A: Aspect>(&self) -> Option<&A> {
        self.aspects
            .iter()
            .find_map(|a| (**a).as_any().downcast_ref::<A>())
    }

    pub fn get_aspect_mut<A: Aspect>(&mut self) -> Option<&mut A> {
        self.aspects
            .iter_mut()
            .find_map(|a| (**a).as_any_mut().downcast_mut::<A>())
    }

    /// Remove every aspect of type `A`. Returns how many were removed.
    ///
    /// Called from inside an aspect pass, the removal is queued until the
    /// pass ends and the call returns 0.
    pub fn remove_aspect<A: Aspect>(&mut self) -> usize {
        if self.in_aspect_pass {
            tracing::debug!(aspect = std::any::type_name::<A>(), "queued aspect removal");
            self.pending_removals.push(is_aspect::<A>);
            return 0;
        }
        self.remove_aspects_where(is_aspect::<A>)
    }

    fn remove_aspects_where(&mut self, matches: fn(&dyn Aspect) -> bool) -> usize {
        let before = self.aspects.len();
        self.aspects.retain(|a| !matches(&**a));
        let removed = before - self.aspects.len();
        if removed > 0 {
            tracing::debug!(removed, "removed aspects");
        }
        removed
    }

    pub fn aspect_count(&self) -> usize {
        self.aspects.len()
    }

    /// Aspect names in execution order.
    pub fn aspect_names(&self) -> Vec<&str> {
        self.aspects.iter().map(|a| a.name()).collect()
    }

    /// Wall-clock time per aspect during the last frame, in execution order.
    pub fn aspect_times(&self) -> &[(String, Duration)] {
        &self.aspect_times
    }

    // -- frame --------------------------------------------------------------

    /// Advance the world by one frame of `dt` seconds.
    ///
    /// Structural errors raised by behaviour hooks or aspects abort the frame
    /// and are returned unchanged; the frame counter is not advanced.
    pub fn update(&mut self, dt: f32) -> Result<(), EcsError> {
        let residents: Vec<EntityId> = self.active_entities().collect();
        for entity in residents {
            if !self.is_alive(entity) {
                continue;
            }
            self.run_behavior_hook(entity, |b, world| b.update(entity, world, dt))?;
        }

        self.run_aspects(dt)?;
        self.flush_ready()?;

        self.frame += 1;
        tracing::trace!(frame = self.frame, entities = self.entities.len(), "world frame complete");
        Ok(())
    }

    fn run_aspects(&mut self, dt: f32) -> Result<(), EcsError> {
        let mut aspects = std::mem::take(&mut self.aspects);
        self.in_aspect_pass = true;
        let mut times = Vec::with_capacity(aspects.len());
        let mut outcome = Ok(());

        for aspect in aspects.iter_mut() {
            let start = Instant::now();
            let result = aspect.handle(self, dt);
            times.push((aspect.name().to_owned(), start.elapsed()));
            if let Err(err) = result {
                outcome = Err(err);
                break;
            }
        }

        // Anything in `self.aspects` now was added mid-pass.
        self.in_aspect_pass = false;
        let added = std::mem::replace(&mut self.aspects, aspects);
        for aspect in added {
            self.insert_aspect(aspect);
        }
        for matches in std::mem::take(&mut self.pending_removals) {
            self.remove_aspects_where(matches);
        }
        self.aspect_times = times;
        outcome
    }

    fn flush_ready(&mut self) -> Result<(), EcsError> {
        while !self.pending_ready.is_empty() {
            let batch = std::mem::take(&mut self.pending_ready);
            for entity in batch {
                self.run_behavior_hook(entity, |b, world| b.on_ready(entity, world))?;
            }
        }
        Ok(())
    }

    /// Drop every entity, chunk, aspect, and membership set. The registry and
    /// configuration are kept; the active set is rebuilt around the current
    /// centre.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.chunks.clear();
        self.aspects.clear();
        self.membership.clear();
        self.pending_ready.clear();
        self.pending_removals.clear();
        self.aspect_times.clear();
        self.set_center_chunk(self.center_chunk);
        tracing::debug!("cleared world");
    }
}

fn is_aspect<A: Aspect>(aspect: &dyn Aspect) -> bool {
    (*aspect).as_any().is::<A>()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
