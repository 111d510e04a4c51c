//! Collision detection and impulse resolution.
//!
//! Each frame the [`CollisionAspect`]:
//!
//! 1. integrates every collider entity's velocity into a scratch copy of its
//!    position (the projected position);
//! 2. tests every ordered pair of distinct colliders for overlap on the two
//!    cardinal axes, keeping one [`Collision`] per unordered pair;
//! 3. resolves each collision with the function registered for its pair of
//!    [`ShapeKind`]s;
//! 4. commits the projected positions and resolved velocities back to the
//!    world, migrating entities between chunks as needed.
//!
//! Detection is O(n²) over all colliders with no spatial culling.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use sora_ecs::aspect::{Aspect, AspectCore};
use sora_ecs::component::{AttachContext, Component, ComponentRegistry, ComponentTypeId};
use sora_ecs::entity::EntityId;
use sora_ecs::world::World;
use sora_ecs::EcsError;

use crate::shape::{self, Interval, Shape, ShapeKind, X_AXIS, Y_AXIS};

/// Priority of the collision aspect. Runs after movement.
pub const COLLISION_PRIORITY: i32 = 19;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by collision handling.
#[derive(Debug, thiserror::Error)]
pub enum CollisionError {
    /// No resolver is registered for this ordered pair of shape types.
    #[error("no collision resolver registered for ({first}, {second})")]
    UnsupportedCollisionPair { first: ShapeKind, second: ShapeKind },

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

// ---------------------------------------------------------------------------
// Collider component
// ---------------------------------------------------------------------------

/// Marks an entity as taking part in collision handling. Requires a
/// [`Shape`] sibling.
///
/// `mass` and `hardness` are carried for callers; resolution currently
/// assumes equal masses and a perfectly elastic exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub mass: f32,
    pub hardness: f32,
}

impl Default for Collider {
    fn default() -> Self {
        Self {
            mass: 1.0,
            hardness: 1.0,
        }
    }
}

impl Component for Collider {
    fn on_attach(&mut self, ctx: &AttachContext<'_>) -> Result<(), EcsError> {
        ctx.require::<Shape>()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Collision records
// ---------------------------------------------------------------------------

/// Order-independent identity of a pair of entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(EntityId, EntityId);

impl PairKey {
    pub fn new(a: EntityId, b: EntityId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        (self.0, self.1)
    }
}

/// One detected overlap between two colliders.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub first: EntityId,
    pub second: EntityId,
    /// `second`'s projected position minus `first`'s.
    pub separation: Vec2,
    /// Shape types of `first` and `second`, in that order.
    pub kinds: (ShapeKind, ShapeKind),
    /// `(first, second)` intervals on the X axis, then on the Y axis.
    pub intervals: [(Interval, Interval); 2],
}

impl Collision {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.first, self.second)
    }
}

/// Unordered pairs already handled this frame.
#[derive(Debug, Default)]
pub struct CollisionCache {
    seen: HashSet<PairKey>,
}

impl CollisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`. Returns `false` if it was already recorded.
    pub fn insert(&mut self, key: PairKey) -> bool {
        self.seen.insert(key)
    }

    pub fn contains(&self, key: PairKey) -> bool {
        self.seen.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Working state of one collider during a collision pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub entity: EntityId,
    /// Projected position.
    pub position: Vec2,
    pub velocity: Vec2,
    pub shape: Shape,
}

/// Find every overlapping pair among `bodies`.
///
/// All ordered pairs are tested; the cache keeps only the first detection of
/// each unordered pair. Pairs whose positions coincide exactly are skipped
/// since they have no collision normal.
pub fn detect(bodies: &[Body], cache: &mut CollisionCache) -> Vec<Collision> {
    let mut collisions = Vec::new();
    for (i, a) in bodies.iter().enumerate() {
        for (j, b) in bodies.iter().enumerate() {
            if i == j || !shape::overlaps(&a.shape, a.position, &b.shape, b.position) {
                continue;
            }
            let separation = b.position - a.position;
            if separation == Vec2::ZERO {
                tracing::trace!(first = %a.entity, second = %b.entity, "skipping coincident pair");
                continue;
            }
            if !cache.insert(PairKey::new(a.entity, b.entity)) {
                continue;
            }
            tracing::trace!(first = %a.entity, second = %b.entity, "collision detected");
            collisions.push(Collision {
                first: a.entity,
                second: b.entity,
                separation,
                kinds: (a.shape.kind(), b.shape.kind()),
                intervals: [
                    (
                        a.shape.interval(a.position, X_AXIS),
                        b.shape.interval(b.position, X_AXIS),
                    ),
                    (
                        a.shape.interval(a.position, Y_AXIS),
                        b.shape.interval(b.position, Y_AXIS),
                    ),
                ],
            });
        }
    }
    collisions
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolution function for one pair of shape types. Receives the bodies in
/// the collision's `(first, second)` order.
pub type ResolveFn = fn(&Collision, &mut Body, &mut Body);

/// Equal-mass elastic exchange along the line between the two bodies.
///
/// The velocity difference projected onto the normal is taken from the first
/// body and given to the second, then each body is pushed apart by half the
/// overlap of their projections onto the normal. Coincident bodies are left
/// untouched.
pub fn resolve_impulse(_collision: &Collision, a: &mut Body, b: &mut Body) {
    let separation = b.position - a.position;
    if separation == Vec2::ZERO {
        return;
    }
    let normal = separation.normalize();

    let relative = a.velocity - b.velocity;
    let impulse = normal * (relative.dot(normal) / normal.dot(normal));
    a.velocity -= impulse;
    b.velocity += impulse;

    let depth = a
        .shape
        .interval(a.position, normal)
        .overlap_depth(&b.shape.interval(b.position, normal));
    if depth > 0.0 {
        let correction = normal * (depth / 2.0);
        a.position -= correction;
        b.position += correction;
    }
}

/// Resolution functions keyed by ordered shape-type pair.
#[derive(Clone)]
pub struct ResolverRegistry {
    resolvers: HashMap<(ShapeKind, ShapeKind), ResolveFn>,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pairs: Vec<_> = self.resolvers.keys().collect();
        pairs.sort();
        f.debug_struct("ResolverRegistry")
            .field("pairs", &pairs)
            .finish()
    }
}

impl Default for ResolverRegistry {
    /// [`resolve_impulse`] for box/box and box/rotated-box in both orders.
    /// Rotated/rotated is left unregistered.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ShapeKind::Aabb, ShapeKind::Aabb, resolve_impulse);
        registry.register(ShapeKind::Aabb, ShapeKind::Rotated, resolve_impulse);
        registry
    }
}

impl ResolverRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Register `resolve` for `(a, b)` and `(b, a)`.
    pub fn register(&mut self, a: ShapeKind, b: ShapeKind, resolve: ResolveFn) {
        self.resolvers.insert((a, b), resolve);
        self.resolvers.insert((b, a), resolve);
    }

    pub fn supports(&self, a: ShapeKind, b: ShapeKind) -> bool {
        self.resolvers.contains_key(&(a, b))
    }

    /// Resolve one collision.
    pub fn resolve(
        &self,
        collision: &Collision,
        a: &mut Body,
        b: &mut Body,
    ) -> Result<(), CollisionError> {
        let (first, second) = collision.kinds;
        let resolve = self
            .resolvers
            .get(&(first, second))
            .ok_or(CollisionError::UnsupportedCollisionPair { first, second })?;
        resolve(collision, a, b);
        Ok(())
    }
}

/// Two distinct mutable elements of a slice.
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    assert_ne!(i, j, "pair_mut needs distinct indices");
    if i < j {
        let (head, tail) = items.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

// ---------------------------------------------------------------------------
// CollisionAspect
// ---------------------------------------------------------------------------

/// Moves collider entities, then detects and resolves their overlaps.
#[derive(Debug)]
pub struct CollisionAspect {
    core: AspectCore,
    resolvers: ResolverRegistry,
    cache: CollisionCache,
    last_collisions: Vec<Collision>,
}

impl CollisionAspect {
    /// Registers [`Collider`] and [`Shape`] if needed.
    pub fn new(registry: &mut ComponentRegistry) -> Self {
        let collider = registry.register::<Collider>("collider");
        registry.register::<Shape>("shape");
        Self {
            core: AspectCore::new(collider, COLLISION_PRIORITY),
            resolvers: ResolverRegistry::default(),
            cache: CollisionCache::new(),
            last_collisions: Vec::new(),
        }
    }

    pub fn with_resolvers(mut self, resolvers: ResolverRegistry) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    pub fn resolvers_mut(&mut self) -> &mut ResolverRegistry {
        &mut self.resolvers
    }

    /// Collisions resolved during the last pass, in resolution order.
    pub fn last_collisions(&self) -> &[Collision] {
        &self.last_collisions
    }

    fn gather_bodies(&self, world: &World, dt: f32) -> Vec<Body> {
        self.core
            .iterate_entities(world)
            .filter_map(|entity| {
                let record = world.entity(entity)?;
                let shape = *world.get_component::<Shape>(entity)?;
                Some(Body {
                    entity,
                    position: record.position() + record.velocity() * dt,
                    velocity: record.velocity(),
                    shape,
                })
            })
            .collect()
    }

    /// One full pass: integrate, detect, resolve, commit.
    pub fn step(&mut self, world: &mut World, dt: f32) -> Result<(), CollisionError> {
        self.cache.clear();
        let mut bodies = self.gather_bodies(world, dt);
        let collisions = detect(&bodies, &mut self.cache);

        // Bodies come out of the membership set in ascending id order.
        let index_of = |bodies: &[Body], entity: EntityId| {
            bodies.binary_search_by_key(&entity, |b| b.entity).ok()
        };
        for collision in &collisions {
            let (Some(i), Some(j)) = (
                index_of(&bodies, collision.first),
                index_of(&bodies, collision.second),
            ) else {
                continue;
            };
            let (a, b) = pair_mut(&mut bodies, i, j);
            self.resolvers.resolve(collision, a, b)?;
        }

        for body in &bodies {
            world.set_velocity(body.entity, body.velocity)?;
            world.set_projected(body.entity, body.position)?;
            world.commit_projected(body.entity)?;
        }

        if !collisions.is_empty() {
            tracing::trace!(count = collisions.len(), "resolved collisions");
        }
        self.last_collisions = collisions;
        Ok(())
    }
}

impl Aspect for CollisionAspect {
    fn target(&self) -> Option<ComponentTypeId> {
        self.core.target()
    }

    fn priority(&self) -> i32 {
        self.core.priority()
    }

    fn name(&self) -> &str {
        "collision"
    }

    fn handle(&mut self, world: &mut World, dt: f32) -> Result<(), EcsError> {
        self.step(world, dt).map_err(|err| match err {
            CollisionError::Ecs(inner) => inner,
            other => EcsError::aspect("collision", other),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sora_ecs::prelude::*;

    fn body(raw: u64, x: f32, vx: f32, shape: Shape) -> Body {
        Body {
            entity: EntityId::from_raw(raw),
            position: Vec2::new(x, 0.0),
            velocity: Vec2::new(vx, 0.0),
            shape,
        }
    }

    // -- pair keys ----------------------------------------------------------

    #[test]
    fn pair_key_is_symmetric() {
        let a = EntityId::from_raw(3);
        let b = EntityId::from_raw(9);
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        assert_eq!(PairKey::new(b, a).entities(), (a, b));
    }

    #[test]
    fn cache_rejects_repeat() {
        let mut cache = CollisionCache::new();
        let key = PairKey::new(EntityId::from_raw(1), EntityId::from_raw(2));
        assert!(cache.insert(key));
        assert!(!cache.insert(key));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    // -- detection ----------------------------------------------------------

    #[test]
    fn detect_emits_one_record_per_pair() {
        let s = Shape::aabb(10.0, 10.0);
        let bodies = vec![body(1, 0.0, 0.0, s), body(2, 5.0, 0.0, s)];
        let mut cache = CollisionCache::new();
        let found = detect(&bodies, &mut cache);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first, EntityId::from_raw(1));
        assert_eq!(found[0].separation, Vec2::new(5.0, 0.0));
        assert_eq!(found[0].kinds, (ShapeKind::Aabb, ShapeKind::Aabb));
        assert!(found[0].intervals.iter().all(|(a, b)| a.overlaps(b)));
    }

    #[test]
    fn detect_skips_separated_and_coincident() {
        let s = Shape::aabb(10.0, 10.0);
        let apart = vec![body(1, 0.0, 0.0, s), body(2, 50.0, 0.0, s)];
        assert!(detect(&apart, &mut CollisionCache::new()).is_empty());

        let stacked = vec![body(1, 0.0, 0.0, s), body(2, 0.0, 0.0, s)];
        assert!(detect(&stacked, &mut CollisionCache::new()).is_empty());
    }

    #[test]
    fn detect_honours_existing_cache_entries() {
        let s = Shape::aabb(10.0, 10.0);
        let bodies = vec![body(1, 0.0, 0.0, s), body(2, 5.0, 0.0, s)];
        let mut cache = CollisionCache::new();
        cache.insert(PairKey::new(EntityId::from_raw(2), EntityId::from_raw(1)));
        assert!(detect(&bodies, &mut cache).is_empty());
    }

    // -- resolution ---------------------------------------------------------

    #[test]
    fn impulse_swaps_equal_mass_velocities() {
        let s = Shape::aabb(10.0, 10.0);
        let mut a = body(1, 1.0, 10.0, s);
        let mut b = body(2, 4.0, -10.0, s);
        let collision = detect(&[a.clone(), b.clone()], &mut CollisionCache::new()).remove(0);
        resolve_impulse(&collision, &mut a, &mut b);

        assert_eq!(a.velocity, Vec2::new(-10.0, 0.0));
        assert_eq!(b.velocity, Vec2::new(10.0, 0.0));
        // Overlap was 7 on X; each side moves 3.5.
        assert!((a.position.x - -2.5).abs() < 1e-5);
        assert!((b.position.x - 7.5).abs() < 1e-5);
    }

    #[test]
    fn coincident_bodies_are_untouched() {
        let s = Shape::aabb(10.0, 10.0);
        let mut a = body(1, 0.0, 3.0, s);
        let mut b = body(2, 0.0, -3.0, s);
        let collision = Collision {
            first: a.entity,
            second: b.entity,
            separation: Vec2::ZERO,
            kinds: (ShapeKind::Aabb, ShapeKind::Aabb),
            intervals: [(Interval::new(0.0, 0.0), Interval::new(0.0, 0.0)); 2],
        };
        resolve_impulse(&collision, &mut a, &mut b);
        assert_eq!(a.velocity.x, 3.0);
        assert_eq!(b.velocity.x, -3.0);
    }

    #[test]
    fn registry_dispatches_both_orders() {
        let registry = ResolverRegistry::default();
        assert!(registry.supports(ShapeKind::Aabb, ShapeKind::Rotated));
        assert!(registry.supports(ShapeKind::Rotated, ShapeKind::Aabb));
        assert!(!registry.supports(ShapeKind::Rotated, ShapeKind::Rotated));
    }

    #[test]
    fn unregistered_pair_is_an_error() {
        let r = Shape::rotated(10.0, 10.0, 30.0);
        let mut a = body(1, 0.0, 0.0, r);
        let mut b = body(2, 4.0, 0.0, r);
        let collision = detect(&[a.clone(), b.clone()], &mut CollisionCache::new()).remove(0);
        let err = ResolverRegistry::default()
            .resolve(&collision, &mut a, &mut b)
            .unwrap_err();
        assert!(matches!(
            err,
            CollisionError::UnsupportedCollisionPair {
                first: ShapeKind::Rotated,
                second: ShapeKind::Rotated
            }
        ));
    }

    #[test]
    fn pair_mut_in_either_order() {
        let mut v = vec![1, 2, 3];
        let (a, b) = pair_mut(&mut v, 2, 0);
        std::mem::swap(a, b);
        assert_eq!(v, vec![3, 2, 1]);
    }

    // -- aspect ---------------------------------------------------------------

    #[test]
    fn collider_requires_shape() {
        let mut world = World::new(SpatialConfig::default());
        let aspect = CollisionAspect::new(world.registry_mut());
        world.add_aspect(aspect);
        let e = world.spawn(Entity::new()).unwrap();
        let err = world.attach(e, Collider::default()).unwrap_err();
        assert!(matches!(
            err,
            EcsError::MissingComponent { ref missing, ref required_by, .. }
                if missing == "shape" && required_by == "collider"
        ));
    }

    #[test]
    fn aspect_records_last_collisions() {
        let mut world = World::new(SpatialConfig::default());
        let aspect = CollisionAspect::new(world.registry_mut());
        world.add_aspect(aspect);
        for x in [0.0, 5.0] {
            world
                .spawn(
                    Entity::new()
                        .at(Vec2::new(x, 0.0))
                        .with_component(Shape::aabb(10.0, 10.0))
                        .with_component(Collider::default()),
                )
                .unwrap();
        }
        world.update(0.1).unwrap();
        let aspect = world.get_aspect::<CollisionAspect>().unwrap();
        assert_eq!(aspect.last_collisions().len(), 1);
        assert_eq!(world.aspect_names(), vec!["collision"]);
    }
}
