//! Entity handles and their allocation.
//!
//! An [`Entity`] is a plain 64-bit handle. Ids come from a monotonic counter
//! owned by each [`World`](crate::world::World), so two worlds hand out
//! overlapping ids and an id is never reused within one world.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Opaque handle for a game object. Equality, ordering and hashing are by id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u64);

impl Entity {
    /// The raw identifier.
    #[inline]
    pub fn id(self) -> u64 {
        self.0
    }

    /// Reconstruct a handle from a raw identifier.
    #[inline]
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Monotonic id source. Ids start at 0 and are never recycled.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    /// Create an allocator whose first id is 0.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Hand out the next id.
    pub fn allocate(&mut self) -> Entity {
        let entity = Entity(self.next);
        self.next += 1;
        entity
    }

    /// How many ids have been handed out.
    pub fn allocated(&self) -> u64 {
        self.next
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
