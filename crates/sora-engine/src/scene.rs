//! Scenes: ordered stacks of worlds updated together.
//!
//! A [`Scene`] owns several [`World`]s as named layers (a background world
//! and a foreground world, for example) and updates every layer once per
//! frame, highest priority first. A [`SceneStack`] holds scenes for menus
//! and pause screens; only the top scene runs.

use std::time::{Duration, Instant};

use sora_ecs::config::SpatialConfig;
use sora_ecs::world::World;
use sora_ecs::EcsError;

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// A world registered under a name and priority.
#[derive(Debug)]
pub struct Layer {
    name: String,
    priority: i32,
    world: World,
}

impl Layer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

/// An ordered list of worlds.
#[derive(Debug, Default)]
pub struct Scene {
    config: SpatialConfig,
    layers: Vec<Layer>,
    layer_times: Vec<(String, Duration)>,
}

impl Scene {
    /// Empty scene whose [`new_world`](Self::new_world) uses `config`.
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
            layer_times: Vec::new(),
        }
    }

    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    /// A fresh world laid out with this scene's configuration.
    pub fn new_world(&self) -> World {
        World::new(self.config)
    }

    /// Add `world` as layer `name`. Layers update in descending priority;
    /// equal priorities keep insertion order.
    ///
    /// # Panics
    ///
    /// Panics if a layer called `name` already exists.
    pub fn add_layer(&mut self, name: &str, world: World, priority: i32) {
        assert!(
            self.layer(name).is_none(),
            "duplicate layer name: {name:?}"
        );
        let at = self
            .layers
            .iter()
            .position(|l| l.priority < priority)
            .unwrap_or(self.layers.len());
        self.layers.insert(
            at,
            Layer {
                name: name.to_owned(),
                priority,
                world,
            },
        );
        tracing::debug!(layer = name, priority, "added scene layer");
    }

    /// Remove the layer called `name` and hand back its world.
    pub fn remove_layer(&mut self, name: &str) -> Option<World> {
        let index = self.layers.iter().position(|l| l.name == name)?;
        tracing::debug!(layer = name, "removed scene layer");
        Some(self.layers.remove(index).world)
    }

    pub fn layer(&self, name: &str) -> Option<&World> {
        self.layers.iter().find(|l| l.name == name).map(Layer::world)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut World> {
        self.layers
            .iter_mut()
            .find(|l| l.name == name)
            .map(Layer::world_mut)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer names in update order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Wall-clock time per layer during the last update, in update order.
    pub fn layer_times(&self) -> &[(String, Duration)] {
        &self.layer_times
    }

    /// Update every layer once. The first failing layer stops the update;
    /// layers after it are not run this frame.
    pub fn update(&mut self, dt: f32) -> Result<(), EcsError> {
        self.layer_times.clear();
        for layer in &mut self.layers {
            let start = Instant::now();
            let result = layer.world.update(dt);
            self.layer_times.push((layer.name.clone(), start.elapsed()));
            result?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SceneStack
// ---------------------------------------------------------------------------

/// Stack of scenes. Only the top scene is updated.
#[derive(Debug, Default)]
pub struct SceneStack {
    scenes: Vec<Scene>,
}

impl SceneStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scene: Scene) {
        self.scenes.push(scene);
        tracing::debug!(depth = self.scenes.len(), "pushed scene");
    }

    pub fn pop(&mut self) -> Option<Scene> {
        let scene = self.scenes.pop();
        if scene.is_some() {
            tracing::debug!(depth = self.scenes.len(), "popped scene");
        }
        scene
    }

    pub fn clear(&mut self) {
        self.scenes.clear();
    }

    pub fn current(&self) -> Option<&Scene> {
        self.scenes.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Scene> {
        self.scenes.last_mut()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Update the top scene. An empty stack does nothing.
    pub fn update(&mut self, dt: f32) -> Result<(), EcsError> {
        match self.scenes.last_mut() {
            Some(scene) => scene.update(dt),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{Movement, MovementAspect};
    use sora_ecs::prelude::*;

    fn moving_world(scene: &Scene, velocity: Vec2) -> (World, EntityId) {
        let mut world = scene.new_world();
        let movement = MovementAspect::new(world.registry_mut());
        world.add_aspect(movement);
        let e = world
            .spawn(Entity::new().with_velocity(velocity).with_component(Movement))
            .unwrap();
        (world, e)
    }

    // -- layers -------------------------------------------------------------

    #[test]
    fn layers_sorted_by_descending_priority_stably() {
        let mut scene = Scene::default();
        scene.add_layer("bg", World::default(), 0);
        scene.add_layer("fg", World::default(), 10);
        scene.add_layer("hud", World::default(), 10);
        scene.add_layer("sky", World::default(), -5);
        assert_eq!(scene.layer_names(), vec!["fg", "hud", "bg", "sky"]);
    }

    #[test]
    #[should_panic(expected = "duplicate layer name")]
    fn duplicate_layer_panics() {
        let mut scene = Scene::default();
        scene.add_layer("bg", World::default(), 0);
        scene.add_layer("bg", World::default(), 1);
    }

    #[test]
    fn remove_layer_returns_world() {
        let mut scene = Scene::default();
        let (world, e) = moving_world(&scene, Vec2::X);
        scene.add_layer("main", world, 0);
        let world = scene.remove_layer("main").unwrap();
        assert!(world.contains(e));
        assert!(scene.remove_layer("main").is_none());
        assert_eq!(scene.layer_count(), 0);
    }

    #[test]
    fn new_world_uses_scene_config() {
        let config = SpatialConfig::new(8, 8, 4, 4).unwrap();
        let scene = Scene::new(config);
        assert_eq!(scene.new_world().config().chunk_pixel_width(), 32);
    }

    // -- update -------------------------------------------------------------

    #[test]
    fn update_advances_every_layer_once() {
        let mut scene = Scene::default();
        let (a, ea) = moving_world(&scene, Vec2::new(10.0, 0.0));
        let (b, eb) = moving_world(&scene, Vec2::new(0.0, 4.0));
        scene.add_layer("a", a, 1);
        scene.add_layer("b", b, 2);
        scene.update(0.5).unwrap();

        assert_eq!(scene.layer("a").unwrap().entity(ea).unwrap().position(), Vec2::new(5.0, 0.0));
        assert_eq!(scene.layer("b").unwrap().entity(eb).unwrap().position(), Vec2::new(0.0, 2.0));
        assert_eq!(scene.layer("a").unwrap().frame_count(), 1);

        let timed: Vec<&str> = scene.layer_times().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(timed, vec!["b", "a"]);
    }

    #[test]
    fn stack_updates_only_top_scene() {
        let mut below = Scene::default();
        below.add_layer("main", World::default(), 0);
        let mut above = Scene::default();
        above.add_layer("main", World::default(), 0);

        let mut stack = SceneStack::new();
        stack.update(1.0).unwrap();
        stack.push(below);
        stack.push(above);
        stack.update(1.0).unwrap();

        assert_eq!(stack.current().unwrap().layer("main").unwrap().frame_count(), 1);
        let below = {
            stack.pop();
            stack.current().unwrap()
        };
        assert_eq!(below.layer("main").unwrap().frame_count(), 0);

        stack.clear();
        assert!(stack.is_empty());
        assert!(stack.pop().is_none());
    }
}
