//! Sora ECS -- chunked entity/component/aspect core for 2D simulations.
//!
//! Entities live in a [`World`](world::World) and are filed into fixed-size
//! spatial chunks by position. Components are typed values attached to
//! entities, validated against their siblings at attach time. Aspects are
//! priority-ordered systems that each process the owners of one component
//! type, found through a membership index the world keeps in step with every
//! attach, detach, and removal.
//!
//! # Quick Start
//!
//! ```
//! use sora_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Health(u32);
//! impl Component for Health {}
//!
//! let mut world = World::new(SpatialConfig::default());
//! world.register_component::<Health>("health");
//!
//! let entity = world
//!     .spawn(
//!         Entity::new()
//!             .at(Vec2::new(300.0, 40.0))
//!             .with_component(Health(10)),
//!     )
//!     .unwrap();
//!
//! assert_eq!(world.get_component::<Health>(entity), Some(&Health(10)));
//! assert_eq!(world.entity(entity).unwrap().chunk(), ChunkCoord::new(1, 0));
//! ```

#![deny(unsafe_code)]

pub mod aspect;
pub mod behavior;
pub mod chunk;
pub mod component;
pub mod config;
pub mod entity;
pub mod geometry;
pub mod world;

pub use glam;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (removed or never allocated).
    #[error("entity {entity} does not exist (removed or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// The entity already owns a component of this type.
    #[error("entity {entity} already has a '{component}' component")]
    DuplicateComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// A component's attach hook needs a sibling the entity does not have.
    #[error("'{required_by}' on entity {entity} requires a '{missing}' component")]
    MissingComponent {
        entity: entity::EntityId,
        missing: String,
        required_by: String,
    },

    /// A component's attach hook needs a capability the entity's behaviour
    /// does not provide.
    #[error("'{component}' on entity {entity} requires the entity to be {capability}")]
    MissingCapability {
        entity: entity::EntityId,
        component: String,
        capability: &'static str,
    },

    #[error("chunk {coord} already exists")]
    DuplicateChunk { coord: chunk::ChunkCoord },

    #[error("chunk {coord} still holds {residents} entities")]
    ChunkOccupied {
        coord: chunk::ChunkCoord,
        residents: usize,
    },

    /// A spatial configuration value is out of range or of the wrong type.
    #[error("invalid spatial config '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("config I/O failed: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config is not valid JSON: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// An aspect defined outside this crate failed with its own error type.
    #[error("aspect '{aspect}' failed: {source}")]
    Aspect {
        aspect: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl EcsError {
    /// Wrap an aspect-specific error.
    pub fn aspect(
        aspect: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Aspect {
            aspect: aspect.into(),
            source: source.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::aspect::{Aspect, AspectCore, Members};
    pub use crate::behavior::{DrawCall, EntityBehavior, Renderable};
    pub use crate::chunk::{Chunk, ChunkCoord};
    pub use crate::component::{
        AttachContext, Component, ComponentInfo, ComponentRegistry, ComponentTypeId,
    };
    pub use crate::config::SpatialConfig;
    pub use crate::entity::{Entity, EntityId, EntityRecord};
    pub use crate::geometry::Rect;
    pub use crate::world::World;
    pub use crate::EcsError;
    pub use glam::Vec2;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
