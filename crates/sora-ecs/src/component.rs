//! Component type registration, the [`Component`] contract, and attach-time
//! validation.
//!
//! Every component type used in a world must be registered in that world's
//! [`ComponentRegistry`]. Registration produces a [`ComponentTypeId`] that keys
//! the per-entity component maps and the world's type → entity membership
//! index that aspects iterate.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::behavior::EntityBehavior;
use crate::entity::{EntityId, EntityRecord};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Component trait
// ---------------------------------------------------------------------------

/// Upcast helper so that boxed trait objects can be downcast to their
/// concrete type. Implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A typed unit of data or behaviour attached to exactly one entity.
///
/// Components are identified by their concrete type: an entity holds at most
/// one component of each registered type.
pub trait Component: AsAny + fmt::Debug {
    /// Called once by the world when the component is attached, before it
    /// becomes visible to aspects.
    ///
    /// Use `ctx` to look up sibling components this component depends on.
    /// Returning an error aborts the attach and leaves the entity unchanged.
    fn on_attach(&mut self, ctx: &AttachContext<'_>) -> Result<(), EcsError> {
        let _ = ctx;
        Ok(())
    }
}

pub(crate) fn downcast_ref<T: Component>(component: &dyn Component) -> Option<&T> {
    component.as_any().downcast_ref::<T>()
}

pub(crate) fn downcast_mut<T: Component>(component: &mut dyn Component) -> Option<&mut T> {
    component.as_any_mut().downcast_mut::<T>()
}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name (supplied by the caller).
    pub name: String,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and their metadata.
///
/// A type can only be registered once; subsequent registrations of the same
/// Rust `TypeId` return the existing [`ComponentTypeId`].
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type under the given `name`.
    ///
    /// If the type has already been registered, the existing
    /// [`ComponentTypeId`] is returned and `name` is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken by a different type.
    pub fn register<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return existing;
        }
        assert!(
            !self.by_name.contains_key(name),
            "component name '{name}' is already registered for a different type"
        );

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            type_id: rust_type_id,
        });
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Look up a component type by its Rust type.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a component type by its registered string name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Get the [`ComponentInfo`] for a registered component type ID.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// Registered name for `id`, or `"<unregistered>"`.
    pub fn name_of(&self, id: ComponentTypeId) -> &str {
        self.get_info(id)
            .map(|info| info.name.as_str())
            .unwrap_or("<unregistered>")
    }

    /// Registered name for `T`, falling back to the Rust type name.
    pub fn name_for<T: 'static>(&self) -> String {
        match self.lookup::<T>() {
            Some(id) => self.name_of(id).to_owned(),
            None => std::any::type_name::<T>().to_owned(),
        }
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// AttachContext
// ---------------------------------------------------------------------------

/// Read-only view of the owning entity handed to [`Component::on_attach`].
pub struct AttachContext<'a> {
    pub(crate) entity: EntityId,
    pub(crate) component: &'a str,
    pub(crate) record: &'a EntityRecord,
    pub(crate) registry: &'a ComponentRegistry,
}

impl<'a> AttachContext<'a> {
    /// The entity the component is being attached to.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Registered name of the component being attached.
    pub fn component_name(&self) -> &str {
        self.component
    }

    /// Current state of the owning entity.
    pub fn record(&self) -> &'a EntityRecord {
        self.record
    }

    /// A sibling component, if present.
    pub fn get<T: Component>(&self) -> Option<&'a T> {
        let type_id = self.registry.lookup::<T>()?;
        self.record.component::<T>(type_id)
    }

    /// Whether a sibling component of type `T` is present.
    pub fn has<T: Component>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// A sibling component that must be present.
    ///
    /// Fails with [`EcsError::MissingComponent`] naming both the missing type
    /// and the component that required it.
    pub fn require<T: Component>(&self) -> Result<&'a T, EcsError> {
        self.get::<T>().ok_or_else(|| EcsError::MissingComponent {
            entity: self.entity,
            missing: self.registry.name_for::<T>(),
            required_by: self.component.to_owned(),
        })
    }

    /// The owning entity's behaviour hooks, if it has any.
    pub fn behavior(&self) -> Option<&'a dyn EntityBehavior> {
        self.record.behavior()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
