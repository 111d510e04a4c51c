//! Render-family aspects.
//!
//! These aspects do not draw anything themselves. Each frame they collect
//! [`DrawCall`]s for a presentation layer to consume through
//! [`SpriteRenderAspect::draw_calls`] and [`RenderableAspect::draw_calls`].

use glam::Vec2;
use sora_ecs::aspect::{Aspect, AspectCore};
use sora_ecs::behavior::DrawCall;
use sora_ecs::component::{AttachContext, Component, ComponentRegistry, ComponentTypeId};
use sora_ecs::world::World;
use sora_ecs::EcsError;

/// Priority of [`SpriteRenderAspect`]. Runs after simulation aspects.
pub const SPRITE_RENDER_PRIORITY: i32 = 0;
/// Priority of [`RenderableAspect`].
pub const RENDERABLE_PRIORITY: i32 = 2;

// ---------------------------------------------------------------------------
// Sprites
// ---------------------------------------------------------------------------

/// A texture reference and its on-screen extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    texture: String,
    width: f32,
    height: f32,
}

impl Component for Sprite {}

impl Sprite {
    /// # Panics
    ///
    /// Panics if `width` or `height` is negative or not finite.
    pub fn new(texture: impl Into<String>, width: f32, height: f32) -> Self {
        crate::shape::assert_extents("sprite", width, height);
        Self {
            texture: texture.into(),
            width,
            height,
        }
    }

    pub fn texture(&self) -> &str {
        &self.texture
    }

    pub fn set_texture(&mut self, texture: impl Into<String>) {
        self.texture = texture.into();
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn half_extents(&self) -> Vec2 {
        self.size() * 0.5
    }
}

/// Draws the entity's [`Sprite`] centred on its position. Requires a
/// `Sprite` sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteRenderer {
    pub visible: bool,
}

impl Default for SpriteRenderer {
    fn default() -> Self {
        Self { visible: true }
    }
}

impl Component for SpriteRenderer {
    fn on_attach(&mut self, ctx: &AttachContext<'_>) -> Result<(), EcsError> {
        ctx.require::<Sprite>()?;
        Ok(())
    }
}

/// Emits one [`DrawCall::Sprite`] per visible [`SpriteRenderer`] entity.
#[derive(Debug)]
pub struct SpriteRenderAspect {
    core: AspectCore,
    draws: Vec<DrawCall>,
}

impl SpriteRenderAspect {
    /// Registers [`Sprite`] and [`SpriteRenderer`] if needed.
    pub fn new(registry: &mut ComponentRegistry) -> Self {
        registry.register::<Sprite>("sprite");
        let renderer = registry.register::<SpriteRenderer>("sprite_renderer");
        Self {
            core: AspectCore::new(renderer, SPRITE_RENDER_PRIORITY),
            draws: Vec::new(),
        }
    }

    /// Draw calls collected during the last pass.
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }
}

impl Aspect for SpriteRenderAspect {
    fn target(&self) -> Option<ComponentTypeId> {
        self.core.target()
    }

    fn priority(&self) -> i32 {
        self.core.priority()
    }

    fn name(&self) -> &str {
        "sprite-render"
    }

    fn handle(&mut self, world: &mut World, _dt: f32) -> Result<(), EcsError> {
        self.draws.clear();
        let world: &World = world;
        for entity in self.core.iterate_entities(world) {
            let visible = world
                .get_component::<SpriteRenderer>(entity)
                .is_some_and(|r| r.visible);
            let (Some(record), Some(sprite)) = (world.entity(entity), world.get_component::<Sprite>(entity))
            else {
                continue;
            };
            if !visible || sprite.texture().is_empty() {
                continue;
            }
            self.draws.push(DrawCall::Sprite {
                entity,
                texture: sprite.texture().to_owned(),
                top_left: record.position() - sprite.half_extents(),
                size: sprite.size(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Self-rendering entities
// ---------------------------------------------------------------------------

/// Hands drawing over to the entity's own behaviour. Attaching fails with
/// [`EcsError::MissingCapability`] unless the behaviour exposes the
/// [`Renderable`](sora_ecs::behavior::Renderable) capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderableTag;

impl Component for RenderableTag {
    fn on_attach(&mut self, ctx: &AttachContext<'_>) -> Result<(), EcsError> {
        if ctx.behavior().and_then(|b| b.as_renderable()).is_none() {
            return Err(EcsError::MissingCapability {
                entity: ctx.entity(),
                component: ctx.component_name().to_owned(),
                capability: "renderable",
            });
        }
        Ok(())
    }
}

/// Collects draw calls from every [`RenderableTag`] entity's behaviour.
#[derive(Debug)]
pub struct RenderableAspect {
    core: AspectCore,
    draws: Vec<DrawCall>,
}

impl RenderableAspect {
    /// Registers [`RenderableTag`] if needed.
    pub fn new(registry: &mut ComponentRegistry) -> Self {
        let tag = registry.register::<RenderableTag>("renderable");
        Self {
            core: AspectCore::new(tag, RENDERABLE_PRIORITY),
            draws: Vec::new(),
        }
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }
}

impl Aspect for RenderableAspect {
    fn target(&self) -> Option<ComponentTypeId> {
        self.core.target()
    }

    fn priority(&self) -> i32 {
        self.core.priority()
    }

    fn name(&self) -> &str {
        "renderable"
    }

    fn handle(&mut self, world: &mut World, _dt: f32) -> Result<(), EcsError> {
        self.draws.clear();
        let world: &World = world;
        for entity in self.core.iterate_entities(world) {
            let renderable = world
                .entity(entity)
                .and_then(|r| r.behavior())
                .and_then(|b| b.as_renderable());
            if let Some(renderable) = renderable {
                renderable.render(entity, world, &mut self.draws);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
