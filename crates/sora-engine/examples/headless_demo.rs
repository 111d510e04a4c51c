//! Headless demo -- two boxes collide in a foreground layer over a tiled
//! background while a particle emitter rides along.
//!
//! Run with:
//!   cargo run --example headless_demo -p sora-engine [config.json]
//!
//! Set `RUST_LOG=sora_ecs=debug,sora_engine=trace` to watch spawns, chunk
//! migrations, and collisions.

use anyhow::Context;
use sora_engine::frame::{FrameConfig, FrameLoop};
use sora_engine::particles::{ParticleEmitter, ParticleRegistry};
use sora_engine::prelude::*;
use sora_engine::scene::{Scene, SceneStack};
use sora_engine::tilemap::TileMap;

const FRAMES: u64 = 120;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SpatialConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => SpatialConfig::default(),
    };
    let mut scene = Scene::new(config);

    // Background: a strip of floor tiles.
    let mut background = scene.new_world();
    let mut map = TileMap::new(background.config());
    for tx in -8..24 {
        map.add_tile_global("floor.png", tx, 4);
    }
    background.add_aspect(map);

    // Foreground: two boxes on a collision course, and an emitter.
    let mut foreground = scene.new_world();
    sora_engine::add_default_aspects(&mut foreground);
    let mut spawn_box = |x: f32, vx: f32, texture: &str| {
        foreground.spawn(
            Entity::new()
                .at(Vec2::new(x, 40.0))
                .with_velocity(Vec2::new(vx, 0.0))
                .with_component(Shape::aabb(16.0, 16.0))
                .with_component(Collider::default())
                .with_component(Sprite::new(texture, 16.0, 16.0))
                .with_component(SpriteRenderer::default()),
        )
    };
    let left = spawn_box(40.0, 80.0, "red.png")?;
    let right = spawn_box(200.0, -80.0, "blue.png")?;

    let presets = ParticleRegistry::with_defaults();
    let emitter = ParticleEmitter::from_preset(&presets, "triangle", 0xC0FFEE)?;
    foreground.spawn(
        Entity::new()
            .at(Vec2::new(120.0, 120.0))
            .with_behavior(emitter)
            .with_component(RenderableTag),
    )?;

    scene.add_layer("background", background, 0);
    scene.add_layer("foreground", foreground, 10);

    let mut scenes = SceneStack::new();
    scenes.push(scene);
    let mut frames = FrameLoop::new(scenes, FrameConfig::default());
    frames.run_frames(FRAMES)?;

    let scene = frames.scenes().current().context("scene stack is empty")?;
    let fg = scene.layer("foreground").context("missing foreground layer")?;
    for (name, id) in [("left", left), ("right", right)] {
        let record = fg.entity(id).context("box vanished")?;
        tracing::info!(
            name,
            position = ?record.position(),
            velocity = ?record.velocity(),
            chunk = %record.chunk(),
            "box after {FRAMES} frames"
        );
    }

    let sprites = fg
        .get_aspect::<SpriteRenderAspect>()
        .map_or(0, |a| a.draw_calls().len());
    let particles = fg
        .get_aspect::<RenderableAspect>()
        .map_or(0, |a| a.draw_calls().len());
    let tiles = scene
        .layer("background")
        .and_then(|w| w.get_aspect::<TileMap>())
        .map_or(0, |m| m.draw_calls().len());
    tracing::info!(
        sim_time = frames.sim_time(),
        sprites,
        particles,
        tiles,
        total = ?frames.last_diagnostics().total_time,
        "demo finished"
    );
    Ok(())
}
