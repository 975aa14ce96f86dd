//! The [`World`] is the entity store. It allocates entity handles, keeps the
//! ordered live set that systems iterate, and owns the companion
//! [`ComponentStore`] holding every component attached to those entities.
//!
//! Creating an entity and making it live are separate steps: an entity from
//! [`World::create_entity`] can be decorated with components first and only
//! becomes visible to systems once passed to [`World::add_entity`].

#[cfg(debug_assertions)]
use std::collections::HashSet;

use tracing::debug;

use crate::component::ComponentStore;
use crate::entity::{Entity, EntityAllocator};
use crate::EcsError;

/// Entity store plus the component store its entities index into.
#[derive(Debug, Default)]
pub struct World {
    allocator: EntityAllocator,
    /// Live entities in insertion order.
    live: Vec<Entity>,
    /// Mirror of `live` backing the double-add check.
    #[cfg(debug_assertions)]
    live_set: HashSet<Entity>,
    components: ComponentStore,
}

impl World {
    /// Create an empty world. Its first entity will have id 0.
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            live: Vec::new(),
            #[cfg(debug_assertions)]
            live_set: HashSet::new(),
            components: ComponentStore::new(),
        }
    }

    // -- entities -----------------------------------------------------------

    /// Allocate a fresh entity. It is *not* added to the live set.
    pub fn create_entity(&mut self) -> Entity {
        self.allocator.allocate()
    }

    /// Append `entity` to the live set.
    ///
    /// Adding the same entity twice breaks the live set's contract; debug
    /// builds assert against it.
    pub fn add_entity(&mut self, entity: Entity) {
        #[cfg(debug_assertions)]
        assert!(
            self.live_set.insert(entity),
            "{entity:?} is already in the live set"
        );
        self.live.push(entity);
    }

    /// Entity removal is not supported; the call is accepted and ignored.
    pub fn remove_entity(&mut self, entity: Entity) {
        debug!(%entity, "entity removal is not supported; ignoring");
    }

    /// [`create_entity`](Self::create_entity) followed by
    /// [`add_entity`](Self::add_entity).
    pub fn spawn(&mut self) -> Entity {
        let entity = self.create_entity();
        self.add_entity(entity);
        entity
    }

    /// The live set, in insertion order.
    pub fn entities(&self) -> &[Entity] {
        &self.live
    }

    /// The live set together with mutable component access, for systems
    /// that walk entities and mutate their components in place.
    pub fn split_mut(&mut self) -> (&[Entity], &mut ComponentStore) {
        (&self.live, &mut self.components)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.live.len()
    }

    /// Whether `entity` is in the live set. Linear in the live set size.
    pub fn is_live(&self, entity: Entity) -> bool {
        self.live.contains(&entity)
    }

    /// Run `f` on every live entity carrying a `C`, in live-set order.
    pub fn for_each_with<C: 'static>(&mut self, mut f: impl FnMut(Entity, &mut C)) {
        let (live, components) = self.split_mut();
        for &entity in live {
            if let Ok(component) = components.try_get_mut::<C>(entity) {
                f(entity, component);
            }
        }
    }

    // -- components ---------------------------------------------------------

    /// Read access to the component store.
    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// Write access to the component store.
    pub fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    /// See [`ComponentStore::add`].
    pub fn add_component<C: 'static>(&mut self, entity: Entity, value: C) -> Option<C> {
        self.components.add(entity, value)
    }

    /// See [`ComponentStore::add_with`].
    pub fn add_component_with<C: 'static, F: FnOnce() -> C>(
        &mut self,
        entity: Entity,
        make: F,
    ) -> Option<C> {
        self.components.add_with(entity, make)
    }

    /// See [`ComponentStore::has`].
    pub fn has_component<C: 'static>(&self, entity: Entity) -> bool {
        self.components.has::<C>(entity)
    }

    /// See [`ComponentStore::get`].
    pub fn get_component<C: 'static>(&self, entity: Entity) -> &C {
        self.components.get(entity)
    }

    /// See [`ComponentStore::get_mut`].
    pub fn get_component_mut<C: 'static>(&mut self, entity: Entity) -> &mut C {
        self.components.get_mut(entity)
    }

    /// See [`ComponentStore::try_get`].
    pub fn try_get_component<C: 'static>(&self, entity: Entity) -> Result<&C, EcsError> {
        self.components.try_get(entity)
    }

    /// See [`ComponentStore::remove`].
    pub fn remove_component<C: 'static>(&mut self, entity: Entity) -> Option<C> {
        self.components.remove(entity)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
