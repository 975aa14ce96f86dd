//! Cinder ECS -- type-indexed component storage, an ordered system registry,
//! and a typed event bus.
//!
//! Components and events are plain Rust types. Each type gets a dense integer
//! id at first use ([`type_id`]), which indexes per-type component columns in
//! the [`ComponentStore`](component::ComponentStore) and per-type slot tables
//! on the [`EventBus`](event::EventBus). The [`World`](world::World) owns the
//! live entity set and the component store; the
//! [`SystemRegistry`](system::SystemRegistry) runs systems against it in
//! registration order.
//!
//! Everything except the type-id allocator is single-threaded.
//!
//! # Quick Start
//!
//! ```
//! use cinder_ecs::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Name(&'static str);
//!
//! struct Greeter;
//!
//! impl System for Greeter {
//!     fn init(&mut self, world: &mut World) {
//!         for &entity in world.entities() {
//!             if world.has_component::<Name>(entity) {
//!                 println!("hello, {}", world.get_component::<Name>(entity).0);
//!             }
//!         }
//!     }
//! }
//!
//! let mut world = World::new();
//! let player = world.create_entity();
//! world.add_component(player, Name("player"));
//! world.add_entity(player);
//!
//! let mut systems = SystemRegistry::new(EventBus::new());
//! systems.add(Greeter);
//! systems.init(&mut world);
//!
//! assert_eq!(world.get_component::<Name>(player), &Name("player"));
//! ```

#![deny(unsafe_code)]

use std::any::type_name;

pub mod component;
pub mod entity;
pub mod event;
pub mod system;
pub mod type_id;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the fallible ECS accessors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity has no component of the requested type.
    #[error("entity {entity} has no component of type `{component}`")]
    MissingComponent {
        entity: entity::Entity,
        component: &'static str,
    },
}

impl EcsError {
    pub(crate) fn missing<C: 'static>(entity: entity::Entity) -> Self {
        Self::MissingComponent {
            entity,
            component: type_name::<C>(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::ComponentStore;
    pub use crate::entity::Entity;
    pub use crate::event::{EventBus, Receive, Receiver, SlotHandle, Subscriptions};
    pub use crate::system::{System, SystemRegistry};
    pub use crate::type_id::{component_id, event_id, ComponentTypeId, EventTypeId};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
