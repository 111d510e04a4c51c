//! Fixed-timestep frame loop.
//!
//! The [`FrameLoop`] drives a [`SceneStack`] forward. Each frame the top
//! scene updates its layers in priority order, every layer running its own
//! chunk pass, aspects, and ready callbacks. The frame counter only advances
//! when the whole frame succeeds.
//!
//! # Example
//!
//! ```
//! use sora_engine::frame::{FrameConfig, FrameLoop};
//! use sora_engine::scene::{Scene, SceneStack};
//! use sora_engine::prelude::*;
//!
//! let mut scene = Scene::default();
//! let world = scene.new_world();
//! scene.add_layer("main", world, 0);
//!
//! let mut scenes = SceneStack::new();
//! scenes.push(scene);
//!
//! let mut frames = FrameLoop::new(scenes, FrameConfig::default());
//! frames.run_frames(10).unwrap();
//!
//! assert_eq!(frames.frame_count(), 10);
//! ```

use std::time::{Duration, Instant};

use sora_ecs::EcsError;

use crate::scene::SceneStack;

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Configuration for the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameConfig {
    /// Seconds per frame. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for FrameConfig {
    /// 60 frames per second.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// Timing for the last frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Wall-clock time per layer of the top scene, in update order.
    pub layer_times: Vec<(String, Duration)>,
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

pub struct FrameLoop {
    scenes: SceneStack,
    frame_counter: u64,
    fixed_dt: f64,
    last_diagnostics: FrameDiagnostics,
}

impl FrameLoop {
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(scenes: SceneStack, config: FrameConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            scenes,
            frame_counter: 0,
            fixed_dt: config.fixed_dt,
            last_diagnostics: FrameDiagnostics::default(),
        }
    }

    /// Run one frame. On error the frame counter is left unchanged.
    pub fn tick(&mut self) -> Result<(), EcsError> {
        let start = Instant::now();
        let result = self.scenes.update(self.fixed_dt as f32);

        self.last_diagnostics = FrameDiagnostics {
            layer_times: self
                .scenes
                .current()
                .map(|s| s.layer_times().to_vec())
                .unwrap_or_default(),
            total_time: start.elapsed(),
        };
        result?;

        self.frame_counter += 1;
        Ok(())
    }

    /// Run `count` frames, stopping at the first error.
    pub fn run_frames(&mut self, count: u64) -> Result<(), EcsError> {
        for _ in 0..count {
            self.tick()?;
        }
        Ok(())
    }

    // -- accessors ----------------------------------------------------------

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// Simulation time in seconds, computed as `frame_count * fixed_dt` so
    /// it does not drift.
    pub fn sim_time(&self) -> f64 {
        self.frame_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn scenes(&self) -> &SceneStack {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut SceneStack {
        &mut self.scenes
    }

    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use sora_ecs::prelude::*;

    fn one_layer_stack() -> SceneStack {
        let mut scene = Scene::default();
        scene.add_layer("main", World::default(), 0);
        let mut stack = SceneStack::new();
        stack.push(scene);
        stack
    }

    // -- construction ---------------------------------------------------------

    #[test]
    fn default_is_sixty_hz() {
        let frames = FrameLoop::new(SceneStack::new(), FrameConfig::default());
        assert!((frames.fixed_dt() - 1.0 / 60.0).abs() < f64::EPSILON);
        assert_eq!(frames.frame_count(), 0);
        assert_eq!(frames.sim_time(), 0.0);
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive and finite")]
    fn zero_dt_panics() {
        FrameLoop::new(SceneStack::new(), FrameConfig { fixed_dt: 0.0 });
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive and finite")]
    fn negative_dt_panics() {
        FrameLoop::new(SceneStack::new(), FrameConfig { fixed_dt: -0.1 });
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive and finite")]
    fn infinite_dt_panics() {
        FrameLoop::new(SceneStack::new(), FrameConfig { fixed_dt: f64::INFINITY });
    }

    // -- running ------------------------------------------------------------

    #[test]
    fn sim_time_is_count_times_dt() {
        let mut frames = FrameLoop::new(one_layer_stack(), FrameConfig { fixed_dt: 0.25 });
        frames.run_frames(8).unwrap();
        assert_eq!(frames.frame_count(), 8);
        assert_eq!(frames.sim_time(), 2.0);
        let world = frames.scenes().current().unwrap().layer("main").unwrap();
        assert_eq!(world.frame_count(), 8);
    }

    #[test]
    fn empty_stack_still_counts_frames() {
        let mut frames = FrameLoop::new(SceneStack::new(), FrameConfig::default());
        frames.tick().unwrap();
        assert_eq!(frames.frame_count(), 1);
        assert!(frames.last_diagnostics().layer_times.is_empty());
    }

    #[test]
    fn diagnostics_name_each_layer() {
        let mut frames = FrameLoop::new(one_layer_stack(), FrameConfig::default());
        frames.tick().unwrap();
        let names: Vec<&str> = frames
            .last_diagnostics()
            .layer_times
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["main"]);
    }

    #[derive(Debug)]
    struct Broken;

    impl Aspect for Broken {
        fn target(&self) -> Option<ComponentTypeId> {
            None
        }
        fn priority(&self) -> i32 {
            0
        }
        fn name(&self) -> &str {
            "broken"
        }
        fn handle(&mut self, _world: &mut World, _dt: f32) -> Result<(), EcsError> {
            Err(EcsError::StaleEntity {
                entity: EntityId::from_raw(7),
            })
        }
    }

    #[test]
    fn failed_frame_is_not_counted() {
        let mut stack = one_layer_stack();
        stack
            .current_mut()
            .unwrap()
            .layer_mut("main")
            .unwrap()
            .add_aspect(Broken);
        let mut frames = FrameLoop::new(stack, FrameConfig::default());
        assert!(frames.tick().is_err());
        assert_eq!(frames.frame_count(), 0);
    }
}
