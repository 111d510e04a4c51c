//! Property tests for world operations.
//!
//! These tests use `proptest` to generate random sequences of world
//! operations and verify that chunk residency and the membership index stay
//! consistent after each step.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use sora_ecs::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Tag(u32);
impl Component for Tag {}

#[derive(Debug, Clone, PartialEq)]
struct Marker;
impl Component for Marker {}

/// Operations we can perform on the world.
#[derive(Debug, Clone)]
enum WorldOp {
    Spawn(f32, f32),
    SpawnTagged(f32, f32, u32),
    Despawn(usize),
    Move(usize, f32, f32),
    AttachTag(usize, u32),
    DetachTag(usize),
    AttachMarker(usize),
    Kill(usize),
    RemoveDead,
}

/// Positions spanning several chunks in every direction.
fn coord() -> impl Strategy<Value = f32> {
    (-100_000i32..100_000i32).prop_map(|v| v as f32 * 0.01)
}

fn world_op_strategy() -> impl Strategy<Value = WorldOp> {
    prop_oneof![
        (coord(), coord()).prop_map(|(x, y)| WorldOp::Spawn(x, y)),
        (coord(), coord(), any::<u32>()).prop_map(|(x, y, t)| WorldOp::SpawnTagged(x, y, t)),
        (0..100usize).prop_map(WorldOp::Despawn),
        (0..100usize, coord(), coord()).prop_map(|(i, x, y)| WorldOp::Move(i, x, y)),
        (0..100usize, any::<u32>()).prop_map(|(i, t)| WorldOp::AttachTag(i, t)),
        (0..100usize).prop_map(WorldOp::DetachTag),
        (0..100usize).prop_map(WorldOp::AttachMarker),
        (0..100usize).prop_map(WorldOp::Kill),
        Just(WorldOp::RemoveDead),
    ]
}

fn pick(entities: &[EntityId], idx: usize) -> Option<EntityId> {
    (!entities.is_empty()).then(|| entities[idx % entities.len()])
}

fn check_invariants(world: &World, entities: &[EntityId]) -> Result<(), TestCaseError> {
    prop_assert_eq!(world.entity_count(), entities.len());

    let tag = world.registry().lookup::<Tag>().unwrap();
    let mut tagged: Vec<EntityId> = Vec::new();

    for &e in entities {
        let record = world.entity(e).unwrap();

        // Chunk matches the rectangle centre.
        let expected = world.config().chunk_coord_for(record.rect().center());
        prop_assert_eq!(record.chunk(), expected);

        // Resident in exactly that chunk.
        let homes: Vec<ChunkCoord> = world
            .chunks()
            .filter(|c| c.contains(e))
            .map(|c| c.coord())
            .collect();
        prop_assert_eq!(homes, vec![expected]);

        if world.has_component_id(e, tag) {
            tagged.push(e);
        }
    }

    // Membership set equals the owners.
    tagged.sort();
    prop_assert_eq!(world.members_snapshot(tag), tagged);

    // No chunk holds an entity the world does not know.
    let residents: usize = world.chunks().map(|c| c.resident_count()).sum();
    prop_assert_eq!(residents, entities.len());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    #[test]
    fn random_ops_preserve_residency_and_membership(
        ops in prop::collection::vec(world_op_strategy(), 1..50)
    ) {
        let mut world = World::new(SpatialConfig::default());
        world.register_component::<Tag>("tag");
        world.register_component::<Marker>("marker");

        let mut entities: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                WorldOp::Spawn(x, y) => {
                    let e = world
                        .spawn(Entity::new().at(Vec2::new(x, y)).with_size(8.0, 8.0))
                        .unwrap();
                    entities.push(e);
                }
                WorldOp::SpawnTagged(x, y, t) => {
                    let e = world
                        .spawn(Entity::new().at(Vec2::new(x, y)).with_component(Tag(t)))
                        .unwrap();
                    entities.push(e);
                }
                WorldOp::Despawn(idx) => {
                    if let Some(e) = pick(&entities, idx) {
                        world.despawn(e).unwrap();
                        entities.retain(|x| *x != e);
                        prop_assert!(!world.contains(e));
                    }
                }
                WorldOp::Move(idx, x, y) => {
                    if let Some(e) = pick(&entities, idx) {
                        world.set_position(e, Vec2::new(x, y)).unwrap();
                        prop_assert_eq!(world.entity(e).unwrap().position(), Vec2::new(x, y));
                    }
                }
                WorldOp::AttachTag(idx, t) => {
                    if let Some(e) = pick(&entities, idx) {
                        let had = world.has_component::<Tag>(e);
                        let result = world.attach(e, Tag(t));
                        prop_assert_eq!(result.is_err(), had);
                    }
                }
                WorldOp::DetachTag(idx) => {
                    if let Some(e) = pick(&entities, idx) {
                        let had = world.has_component::<Tag>(e);
                        prop_assert_eq!(world.detach::<Tag>(e).is_some(), had);
                    }
                }
                WorldOp::AttachMarker(idx) => {
                    if let Some(e) = pick(&entities, idx) {
                        let _ = world.attach(e, Marker);
                    }
                }
                WorldOp::Kill(idx) => {
                    if let Some(e) = pick(&entities, idx) {
                        world.kill(e).unwrap();
                    }
                }
                WorldOp::RemoveDead => {
                    let removed = world.remove_dead();
                    entities.retain(|e| !removed.contains(e));
                }
            }

            check_invariants(&world, &entities)?;
        }
    }

    /// Removed identities are never handed out again.
    #[test]
    fn ids_never_recycled(
        spawn_count in 1..20usize,
        despawn_indices in prop::collection::vec(0..20usize, 1..10),
    ) {
        let mut world = World::new(SpatialConfig::default());
        let mut entities: Vec<EntityId> = (0..spawn_count)
            .map(|_| world.spawn(Entity::new()).unwrap())
            .collect();

        let mut removed: Vec<EntityId> = Vec::new();
        for &idx in &despawn_indices {
            if let Some(e) = pick(&entities, idx) {
                world.despawn(e).unwrap();
                entities.retain(|x| *x != e);
                removed.push(e);
            }
        }

        for _ in 0..removed.len() {
            let fresh = world.spawn(Entity::new()).unwrap();
            prop_assert!(!removed.contains(&fresh));
            prop_assert!(!entities.contains(&fresh));
            entities.push(fresh);
        }

        for &stale in &removed {
            prop_assert!(!world.contains(stale));
            prop_assert!(world.entity(stale).is_none());
        }
    }

    /// Aspects run in descending priority; equal priorities keep insertion
    /// order.
    #[test]
    fn aspect_order_is_stable_descending(priorities in prop::collection::vec(-5i32..5, 1..12)) {
        let mut world = World::new(SpatialConfig::default());
        let log: Rc<RefCell<Vec<usize>>> = Rc::default();

        for (index, &priority) in priorities.iter().enumerate() {
            world.add_aspect(Probe { index, priority, log: Rc::clone(&log) });
        }
        world.update(0.016).unwrap();

        let mut expected: Vec<usize> = (0..priorities.len()).collect();
        expected.sort_by_key(|&i| std::cmp::Reverse(priorities[i]));
        prop_assert_eq!(&*log.borrow(), &expected);
    }
}

struct Probe {
    index: usize,
    priority: i32,
    log: Rc<RefCell<Vec<usize>>>,
}

impl Aspect for Probe {
    fn target(&self) -> Option<ComponentTypeId> {
        None
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn handle(&mut self, _world: &mut World, _dt: f32) -> Result<(), EcsError> {
        self.log.borrow_mut().push(self.index);
        Ok(())
    }
}
