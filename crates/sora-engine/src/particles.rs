//! Particle presets and emitters.
//!
//! A [`ParticleRegistry`] holds named, validated [`ParticleConfig`] presets.
//! A [`ParticleEmitter`] is an entity behaviour: it spawns particles at its
//! entity's position on a fixed interval, ages and moves them every frame,
//! and draws them through the renderable capability.
//!
//! ```
//! use sora_engine::particles::{ParticleEmitter, ParticleRegistry};
//! use sora_engine::prelude::*;
//!
//! let mut world = World::new(SpatialConfig::default());
//! let renderables = RenderableAspect::new(world.registry_mut());
//! world.add_aspect(renderables);
//!
//! let presets = ParticleRegistry::with_defaults();
//! let emitter = ParticleEmitter::from_preset(&presets, "square", 7).unwrap();
//! world
//!     .spawn(Entity::new().with_behavior(emitter).with_component(RenderableTag))
//!     .unwrap();
//!
//! for _ in 0..3 {
//!     world.update(0.1).unwrap();
//! }
//! ```

use std::collections::HashMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use sora_ecs::behavior::{DrawCall, EntityBehavior, Renderable};
use sora_ecs::entity::EntityId;
use sora_ecs::world::World;
use sora_ecs::EcsError;

/// Preset every registry falls back to.
pub const CIRCLE: &str = "circle";
pub const SQUARE: &str = "square";
pub const TRIANGLE: &str = "triangle";

/// Seconds between spawns for emitters built from a preset.
pub const DEFAULT_INTERVAL: f32 = 0.1;
/// Particle cap for emitters built from a preset.
pub const DEFAULT_MAX_PARTICLES: usize = 100;

/// Errors produced by particle configuration.
#[derive(Debug, thiserror::Error)]
pub enum ParticleError {
    #[error("particle preset '{name}' is already registered")]
    DuplicatePreset { name: String },

    #[error("no particle preset '{name}' and no 'circle' fallback")]
    UnknownPreset { name: String },

    #[error("invalid particle setting '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ParticleError {
    ParticleError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// ParticleConfig
// ---------------------------------------------------------------------------

/// Outline of a particle.
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleShape {
    Circle,
    /// Polygon through unit-radius points, scaled by the particle radius and
    /// spun by its angle.
    Polygon(Vec<Vec2>),
}

/// How one kind of particle is launched and evolves.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleConfig {
    pub shape: ParticleShape,
    pub radius: f32,
    /// Fixed launch velocity in pixels per second. `None` draws each
    /// component uniformly from `velocity_min..=velocity_max`.
    pub velocity: Option<Vec2>,
    pub velocity_min: Vec2,
    pub velocity_max: Vec2,
    /// Fixed spin in degrees per second. `None` draws uniformly from
    /// `±angular_spread / 2`.
    pub angular_velocity: Option<f32>,
    pub angular_spread: f32,
    pub color: [u8; 3],
    /// Seconds until the particle is removed.
    pub life: f32,
    /// Acceleration in pixels per second squared.
    pub gravity: Vec2,
}

impl ParticleConfig {
    /// Small blue circles launched upward and pulled down by gravity.
    pub fn circle() -> Self {
        Self {
            shape: ParticleShape::Circle,
            radius: 2.0,
            velocity: None,
            velocity_min: Vec2::new(-30.0, -300.0),
            velocity_max: Vec2::new(30.0, -300.0),
            angular_velocity: Some(0.0),
            angular_spread: 0.0,
            color: [0, 0, 255],
            life: 1.0,
            gravity: Vec2::new(0.0, 588.0),
        }
    }

    /// Spinning diamonds drifting in a random direction.
    pub fn square() -> Self {
        Self {
            shape: ParticleShape::Polygon(vec![
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, -1.0),
                Vec2::new(-1.0, 0.0),
                Vec2::new(0.0, 1.0),
            ]),
            radius: 10.0,
            velocity: None,
            velocity_min: Vec2::splat(-50.0),
            velocity_max: Vec2::splat(50.0),
            angular_velocity: None,
            angular_spread: 100.0,
            color: [0, 0, 255],
            life: 1.0,
            gravity: Vec2::ZERO,
        }
    }

    /// Fast-spinning triangles drifting in a random direction.
    pub fn triangle() -> Self {
        let corner = |degrees: f32| Vec2::from_angle(degrees.to_radians());
        Self {
            shape: ParticleShape::Polygon(vec![corner(0.0), corner(120.0), corner(240.0)]),
            angular_spread: 1000.0,
            ..Self::square()
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_life(mut self, life: f32) -> Self {
        self.life = life;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn validate(&self) -> Result<(), ParticleError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(invalid("radius", format!("must be positive, got {}", self.radius)));
        }
        if !(self.life.is_finite() && self.life > 0.0) {
            return Err(invalid("life", format!("must be positive, got {}", self.life)));
        }
        if !self.gravity.is_finite() {
            return Err(invalid("gravity", "must be finite"));
        }
        if let Some(v) = self.velocity {
            if !v.is_finite() {
                return Err(invalid("velocity", "must be finite"));
            }
        } else if !(self.velocity_min.is_finite()
            && self.velocity_max.is_finite()
            && self.velocity_min.cmple(self.velocity_max).all())
        {
            return Err(invalid(
                "velocity_min",
                "must be finite and no greater than velocity_max",
            ));
        }
        if !(self.angular_spread.is_finite() && self.angular_spread >= 0.0) {
            return Err(invalid("angular_spread", "must be finite and non-negative"));
        }
        if let ParticleShape::Polygon(points) = &self.shape {
            if points.len() < 3 {
                return Err(invalid(
                    "shape",
                    format!("a polygon needs at least 3 points, got {}", points.len()),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ParticleRegistry
// ---------------------------------------------------------------------------

/// Named particle presets.
#[derive(Debug, Clone, Default)]
pub struct ParticleRegistry {
    presets: HashMap<String, ParticleConfig>,
}

impl ParticleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `circle`, `square`, and `triangle` presets.
    pub fn with_defaults() -> Self {
        let mut presets = HashMap::new();
        presets.insert(CIRCLE.to_owned(), ParticleConfig::circle());
        presets.insert(SQUARE.to_owned(), ParticleConfig::square());
        presets.insert(TRIANGLE.to_owned(), ParticleConfig::triangle());
        Self { presets }
    }

    /// Add a preset after validating it.
    pub fn register(&mut self, name: &str, config: ParticleConfig) -> Result<(), ParticleError> {
        if self.presets.contains_key(name) {
            return Err(ParticleError::DuplicatePreset {
                name: name.to_owned(),
            });
        }
        config.validate()?;
        self.presets.insert(name.to_owned(), config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParticleConfig> {
        self.presets.get(name)
    }

    /// The preset called `name`, or the `circle` preset if there is none.
    pub fn resolve(&self, name: &str) -> Result<&ParticleConfig, ParticleError> {
        if let Some(config) = self.presets.get(name) {
            return Ok(config);
        }
        tracing::warn!(preset = name, fallback = CIRCLE, "unknown particle preset");
        self.presets
            .get(CIRCLE)
            .ok_or_else(|| ParticleError::UnknownPreset {
                name: name.to_owned(),
            })
    }

    /// Registered preset names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// ParticleEmitter
// ---------------------------------------------------------------------------

/// One live particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: u64,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Degrees.
    pub angle: f32,
    pub angular_velocity: f32,
    pub life: f32,
}

/// Entity behaviour that spawns and simulates particles.
#[derive(Debug)]
pub struct ParticleEmitter {
    config: ParticleConfig,
    interval: f32,
    max_particles: usize,
    timer: f32,
    issued: u64,
    particles: Vec<Particle>,
    rng: Pcg64Mcg,
}

impl ParticleEmitter {
    /// Emitter spawning one particle every `interval` seconds, never holding
    /// more than `max_particles`. `seed` makes random launches reproducible.
    pub fn new(
        config: ParticleConfig,
        interval: f32,
        max_particles: usize,
        seed: u64,
    ) -> Result<Self, ParticleError> {
        config.validate()?;
        if !(interval.is_finite() && interval > 0.0) {
            return Err(invalid("interval", format!("must be positive, got {interval}")));
        }
        if max_particles == 0 {
            return Err(invalid("max_particles", "must be at least 1"));
        }
        Ok(Self {
            config,
            interval,
            max_particles,
            timer: 0.0,
            issued: 0,
            particles: Vec::new(),
            rng: Pcg64Mcg::seed_from_u64(seed),
        })
    }

    /// Emitter for a registry preset with the default interval and cap.
    pub fn from_preset(
        registry: &ParticleRegistry,
        name: &str,
        seed: u64,
    ) -> Result<Self, ParticleError> {
        let config = registry.resolve(name)?.clone();
        Self::new(config, DEFAULT_INTERVAL, DEFAULT_MAX_PARTICLES, seed)
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    fn spawn_particle(&mut self, origin: Vec2) {
        let velocity = match self.config.velocity {
            Some(v) => v,
            None => {
                let (lo, hi) = (self.config.velocity_min, self.config.velocity_max);
                Vec2::new(self.rng.gen_range(lo.x..=hi.x), self.rng.gen_range(lo.y..=hi.y))
            }
        };
        let angular_velocity = match self.config.angular_velocity {
            Some(w) => w,
            None => {
                let half = self.config.angular_spread / 2.0;
                self.rng.gen_range(-half..=half)
            }
        };
        self.issued += 1;
        self.particles.push(Particle {
            id: self.issued,
            position: origin,
            velocity,
            angle: 0.0,
            angular_velocity,
            life: self.config.life,
        });
    }

    /// Advance the emitter by `dt` seconds with its source at `origin`.
    pub fn step(&mut self, origin: Vec2, dt: f32) {
        self.timer += dt;
        if self.timer >= self.interval {
            self.timer = 0.0;
            if self.particles.len() < self.max_particles {
                self.spawn_particle(origin);
            }
        }

        let gravity = self.config.gravity;
        self.particles.retain_mut(|p| {
            p.life -= dt;
            if p.life <= 0.0 {
                return false;
            }
            p.velocity += gravity * dt;
            p.position += p.velocity * dt;
            p.angle += p.angular_velocity * dt;
            true
        });
    }

    fn draw_call(&self, particle: &Particle) -> DrawCall {
        match &self.config.shape {
            ParticleShape::Circle => DrawCall::Circle {
                center: particle.position,
                radius: self.config.radius,
                color: self.config.color,
            },
            ParticleShape::Polygon(points) => {
                let spin = Vec2::from_angle(particle.angle.to_radians());
                DrawCall::Polygon {
                    points: points
                        .iter()
                        .map(|p| particle.position + spin.rotate(*p * self.config.radius))
                        .collect(),
                    color: self.config.color,
                }
            }
        }
    }
}

impl EntityBehavior for ParticleEmitter {
    fn update(&mut self, entity: EntityId, world: &mut World, dt: f32) -> Result<(), EcsError> {
        let origin = world
            .entity(entity)
            .ok_or(EcsError::StaleEntity { entity })?
            .position();
        self.step(origin, dt);
        Ok(())
    }

    fn as_renderable(&self) -> Option<&dyn Renderable> {
        Some(self)
    }
}

impl Renderable for ParticleEmitter {
    fn render(&self, _entity: EntityId, _world: &World, out: &mut Vec<DrawCall>) {
        out.extend(self.particles.iter().map(|p| self.draw_call(p)));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- presets --------------------------------------------------------------

    #[test]
    fn default_presets_are_valid() {
        let registry = ParticleRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["circle", "square", "triangle"]);
        for name in registry.names() {
            registry.get(name).unwrap().validate().unwrap();
        }
    }

    #[test]
    fn unknown_preset_falls_back_to_circle() {
        let registry = ParticleRegistry::with_defaults();
        let config = registry.resolve("confetti").unwrap();
        assert_eq!(config.shape, ParticleShape::Circle);

        let empty = ParticleRegistry::new();
        assert!(matches!(
            empty.resolve("confetti"),
            Err(ParticleError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn register_rejects_duplicates_and_invalid_configs() {
        let mut registry = ParticleRegistry::with_defaults();
        assert!(matches!(
            registry.register("circle", ParticleConfig::circle()),
            Err(ParticleError::DuplicatePreset { .. })
        ));
        let err = registry
            .register("dud", ParticleConfig::circle().with_life(0.0))
            .unwrap_err();
        assert!(matches!(err, ParticleError::InvalidConfig { field: "life", .. }));

        let mut line = ParticleConfig::square();
        line.shape = ParticleShape::Polygon(vec![Vec2::X, Vec2::NEG_X]);
        assert!(registry.register("line", line).is_err());

        registry
            .register("spark", ParticleConfig::circle().with_color([255, 200, 0]))
            .unwrap();
        assert_eq!(registry.get("spark").unwrap().color, [255, 200, 0]);
    }

    #[test]
    fn emitter_rejects_bad_interval_and_cap() {
        assert!(ParticleEmitter::new(ParticleConfig::circle(), 0.0, 10, 1).is_err());
        assert!(ParticleEmitter::new(ParticleConfig::circle(), 0.1, 0, 1).is_err());
    }

    // -- simulation -------------------------------------------------------------

    fn still_config() -> ParticleConfig {
        ParticleConfig::circle()
            .with_velocity(Vec2::new(10.0, 0.0))
            .with_gravity(Vec2::ZERO)
            .with_life(0.35)
    }

    #[test]
    fn spawns_on_interval_and_respects_cap() {
        let mut emitter = ParticleEmitter::new(still_config().with_life(100.0), 0.1, 3, 0).unwrap();
        for _ in 0..10 {
            emitter.step(Vec2::ZERO, 0.1);
        }
        assert_eq!(emitter.particle_count(), 3);
    }

    #[test]
    fn particles_move_and_expire() {
        let mut emitter = ParticleEmitter::new(still_config(), 0.1, 10, 0).unwrap();
        emitter.step(Vec2::new(5.0, 5.0), 0.1);
        assert_eq!(emitter.particle_count(), 1);
        let p = &emitter.particles()[0];
        assert_eq!(p.id, 1);
        assert!((p.position.x - 6.0).abs() < 1e-5);

        // Three more steps exhaust a 0.35 s life.
        for _ in 0..3 {
            emitter.step(Vec2::new(5.0, 5.0), 0.1);
        }
        assert!(emitter.particles().iter().all(|p| p.id != 1));
    }

    #[test]
    fn same_seed_same_particles() {
        let run = |seed| {
            let mut e = ParticleEmitter::new(ParticleConfig::triangle(), 0.05, 50, seed).unwrap();
            for _ in 0..20 {
                e.step(Vec2::ZERO, 0.05);
            }
            e.particles().to_vec()
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42), run(43));
    }

    #[test]
    fn polygon_particles_draw_scaled_outline() {
        let mut config = ParticleConfig::square()
            .with_velocity(Vec2::ZERO)
            .with_life(10.0);
        config.angular_velocity = Some(0.0);
        let mut emitter = ParticleEmitter::new(config, 0.1, 5, 0).unwrap();
        emitter.step(Vec2::new(100.0, 100.0), 0.1);

        let mut out = Vec::new();
        let world = World::default();
        emitter.render(EntityId::from_raw(1), &world, &mut out);
        match &out[..] {
            [DrawCall::Polygon { points, .. }] => {
                assert_eq!(points.len(), 4);
                assert!((points[0] - Vec2::new(110.0, 100.0)).length() < 1e-4);
            }
            other => panic!("unexpected draw calls: {other:?}"),
        }
    }
}
