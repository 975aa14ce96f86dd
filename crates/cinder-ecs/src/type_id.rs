//! Dense, process-wide type ids for component and event types.
//!
//! Every distinct Rust type used as a component or as an event is assigned a
//! small integer the first time it is looked up. Ids start at 0, are handed
//! out in first-use order and are never recycled. The two namespaces are
//! independent: a type used both as a component and as an event gets one id
//! in each.
//!
//! This is the only process-wide mutable state in the crate. It lives in two
//! [`TypeIdAllocator`] instances reached through [`component_id`] and
//! [`event_id`]. Tests that need predictable numbering build their own
//! allocator with [`TypeIdAllocator::new`].
//!
//! The first lookup of a type on a thread takes the allocator's mutex; later
//! lookups on that thread hit a thread-local cache.

use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::LocalKey;

use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// ComponentTypeId / EventTypeId
// ---------------------------------------------------------------------------

/// Dense id of a component type, `cid(C)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Position of this type's column in dense per-type storage.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

/// Dense id of an event type, `eid(E)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventTypeId(pub(crate) u32);

impl EventTypeId {
    /// Position of this type's slot table on the event bus.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EventTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// TypeIdAllocator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AllocatorState {
    by_type: HashMap<TypeId, u32>,
    /// Indexed by id.
    names: Vec<&'static str>,
}

/// Append-only map from Rust types to dense integers.
///
/// First-use registration is serialised by a mutex, so an allocator can be
/// shared between threads even though the rest of the crate is
/// single-threaded.
#[derive(Debug)]
pub struct TypeIdAllocator {
    namespace: &'static str,
    state: Mutex<AllocatorState>,
}

impl TypeIdAllocator {
    /// Create an empty allocator. `namespace` only labels log output.
    pub fn new(namespace: &'static str) -> Self {
        Self {
            namespace,
            state: Mutex::new(AllocatorState::default()),
        }
    }

    /// Return the id for `T`, allocating the next unused one on first use.
    pub fn id_of<T: ?Sized + 'static>(&self) -> u32 {
        let mut state = self.lock();
        let key = TypeId::of::<T>();
        if let Some(&id) = state.by_type.get(&key) {
            return id;
        }

        let id = u32::try_from(state.names.len())
            .unwrap_or_else(|_| panic!("{} type id space exhausted", self.namespace));
        state.by_type.insert(key, id);
        state.names.push(type_name::<T>());
        debug!(
            namespace = self.namespace,
            id,
            type_name = type_name::<T>(),
            "allocated type id"
        );
        id
    }

    /// Rust type name recorded when `id` was allocated.
    pub fn name_of(&self, id: u32) -> Option<&'static str> {
        self.lock().names.get(id as usize).copied()
    }

    /// Number of types registered so far.
    pub fn len(&self) -> usize {
        self.lock().names.len()
    }

    /// Whether no type has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave the maps half-updated
    // (insert and push happen after every fallible step), so poisoning is
    // ignored.
    fn lock(&self) -> MutexGuard<'_, AllocatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Process-wide namespaces
// ---------------------------------------------------------------------------

static COMPONENT_IDS: OnceLock<TypeIdAllocator> = OnceLock::new();
static EVENT_IDS: OnceLock<TypeIdAllocator> = OnceLock::new();

fn components() -> &'static TypeIdAllocator {
    COMPONENT_IDS.get_or_init(|| TypeIdAllocator::new("component"))
}

fn events() -> &'static TypeIdAllocator {
    EVENT_IDS.get_or_init(|| TypeIdAllocator::new("event"))
}

type IdCache = RefCell<HashMap<TypeId, u32>>;

// Per-thread copies of ids already handed out, so steady-state lookups on
// the component and event hot paths never touch the global mutex.
thread_local! {
    static COMPONENT_CACHE: IdCache = RefCell::new(HashMap::new());
    static EVENT_CACHE: IdCache = RefCell::new(HashMap::new());
}

fn cached_id<T: 'static>(
    cache: &'static LocalKey<IdCache>,
    allocator: fn() -> &'static TypeIdAllocator,
) -> u32 {
    let key = TypeId::of::<T>();
    if let Some(id) = cache.with(|ids| ids.borrow().get(&key).copied()) {
        return id;
    }
    let id = allocator().id_of::<T>();
    cache.with(|ids| ids.borrow_mut().insert(key, id));
    id
}

/// `cid(C)`: the process-wide id of component type `C`.
#[inline]
pub fn component_id<C: 'static>() -> ComponentTypeId {
    ComponentTypeId(cached_id::<C>(&COMPONENT_CACHE, components))
}

/// `eid(E)`: the process-wide id of event type `E`.
#[inline]
pub fn event_id<E: 'static>() -> EventTypeId {
    EventTypeId(cached_id::<E>(&EVENT_CACHE, events))
}

/// Type name behind a component id, for diagnostics.
pub fn component_name(id: ComponentTypeId) -> Option<&'static str> {
    components().name_of(id.0)
}

/// Type name behind an event id, for diagnostics.
pub fn event_name(id: EventTypeId) -> Option<&'static str> {
    events().name_of(id.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;
    struct Gamma;

    #[test]
    fn fresh_allocator_is_dense_from_zero() {
        let ids = TypeIdAllocator::new("test");
        assert!(ids.is_empty());
        assert_eq!(ids.id_of::<Alpha>(), 0);
        assert_eq!(ids.id_of::<Beta>(), 1);
        assert_eq!(ids.id_of::<Gamma>(), 2);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn repeated_lookup_returns_same_id() {
        let ids = TypeIdAllocator::new("test");
        let first = ids.id_of::<Beta>();
        ids.id_of::<Alpha>();
        assert_eq!(ids.id_of::<Beta>(), first);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn names_are_recorded() {
        let ids = TypeIdAllocator::new("test");
        let id = ids.id_of::<Gamma>();
        assert!(ids.name_of(id).unwrap().ends_with("Gamma"));
        assert_eq!(ids.name_of(id + 1), None);
    }

    #[test]
    fn unsized_types_are_accepted() {
        let ids = TypeIdAllocator::new("test");
        assert_eq!(ids.id_of::<str>(), 0);
        assert_eq!(ids.id_of::<[u8]>(), 1);
    }

    #[test]
    fn global_component_ids_are_stable_and_distinct() {
        let a = component_id::<Alpha>();
        let b = component_id::<Beta>();
        assert_ne!(a, b);
        assert_eq!(component_id::<Alpha>(), a);
        assert_eq!(component_id::<Beta>(), b);
        assert!(component_name(a).unwrap().ends_with("Alpha"));
    }

    #[test]
    fn cached_ids_agree_across_threads() {
        struct Delta;

        let here = component_id::<Delta>();
        let cached = COMPONENT_CACHE.with(|ids| ids.borrow().get(&TypeId::of::<Delta>()).copied());
        assert_eq!(cached, Some(here.0));

        let (cid, eid) = std::thread::spawn(|| (component_id::<Delta>(), event_id::<Delta>()))
            .join()
            .unwrap();
        assert_eq!(cid, here);
        assert_eq!(event_id::<Delta>(), eid);
    }

    #[test]
    fn event_namespace_is_independent() {
        // Both lookups succeed and are stable regardless of the other namespace.
        let cid = component_id::<Gamma>();
        let eid = event_id::<Gamma>();
        assert_eq!(component_id::<Gamma>(), cid);
        assert_eq!(event_id::<Gamma>(), eid);
        assert!(event_name(eid).unwrap().ends_with("Gamma"));
    }

    #[test]
    fn concurrent_first_use_yields_one_id() {
        let ids = std::sync::Arc::new(TypeIdAllocator::new("test"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = std::sync::Arc::clone(&ids);
                std::thread::spawn(move || ids.id_of::<Alpha>())
            })
            .collect();
        let results: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|&id| id == results[0]));
        assert_eq!(ids.len(), 1);
    }
}
