//! Type-indexed component storage.
//!
//! The [`ComponentStore`] keeps one [`Column`] per component type, held in a
//! `Vec` indexed by the type's [`ComponentTypeId`]. A column is a slot map:
//!
//! - `dense`: the component values, packed for iteration,
//! - `owners`: the entity owning each dense row,
//! - `sparse`: entity id -> dense row, with a hash-map fallback for ids too
//!   large to index directly.
//!
//! Insert, lookup and removal are amortised O(1). Removal swap-removes the
//! row and patches the sparse entry of the entity that moved into the hole,
//! so iteration order is stable between mutations but not across them.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;

use crate::entity::Entity;
use crate::type_id::component_id;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Slot-map storage for every instance of one component type.
pub(crate) struct Column<C> {
    dense: Vec<C>,
    owners: Vec<Entity>,
    /// Rows of entities with ids below [`DENSE_ID_LIMIT`].
    sparse: Vec<Option<usize>>,
    /// Rows of entities with larger ids.
    far: HashMap<u64, usize>,
}

/// Entity ids below this are indexed directly; larger ids (only reachable
/// through [`Entity::from_raw`]) fall back to a hash map.
const DENSE_ID_LIMIT: u64 = 1 << 20;

impl<C> Column<C> {
    fn new() -> Self {
        Self {
            dense: Vec::new(),
            owners: Vec::new(),
            sparse: Vec::new(),
            far: HashMap::new(),
        }
    }

    fn row(&self, entity: Entity) -> Option<usize> {
        let id = entity.id();
        if id < DENSE_ID_LIMIT {
            self.sparse.get(id as usize).copied().flatten()
        } else {
            self.far.get(&id).copied()
        }
    }

    fn set_row(&mut self, entity: Entity, row: Option<usize>) {
        let id = entity.id();
        if id >= DENSE_ID_LIMIT {
            match row {
                Some(row) => self.far.insert(id, row),
                None => self.far.remove(&id),
            };
            return;
        }
        let idx = id as usize;
        if idx >= self.sparse.len() {
            if row.is_none() {
                return;
            }
            self.sparse.resize(idx + 1, None);
        }
        self.sparse[idx] = row;
    }

    fn insert(&mut self, entity: Entity, value: C) -> Option<C> {
        if let Some(row) = self.row(entity) {
            return Some(std::mem::replace(&mut self.dense[row], value));
        }
        self.set_row(entity, Some(self.dense.len()));
        self.dense.push(value);
        self.owners.push(entity);
        None
    }

    fn get(&self, entity: Entity) -> Option<&C> {
        self.row(entity).map(|row| &self.dense[row])
    }

    fn get_mut(&mut self, entity: Entity) -> Option<&mut C> {
        let row = self.row(entity)?;
        Some(&mut self.dense[row])
    }

    fn remove(&mut self, entity: Entity) -> Option<C> {
        let row = self.row(entity)?;
        self.set_row(entity, None);
        let value = self.dense.swap_remove(row);
        self.owners.swap_remove(row);
        if let Some(&moved) = self.owners.get(row) {
            self.set_row(moved, Some(row));
        }
        Some(value)
    }

    fn iter(&self) -> impl Iterator<Item = (Entity, &C)> + '_ {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> + '_ {
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }
}

// ---------------------------------------------------------------------------
// ErasedColumn -- what the store needs without knowing `C`
// ---------------------------------------------------------------------------

trait ErasedColumn {
    fn len(&self) -> usize;
    fn clear(&mut self);
    fn component_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: 'static> ErasedColumn for Column<C> {
    fn len(&self) -> usize {
        self.dense.len()
    }

    fn clear(&mut self) {
        self.dense.clear();
        self.owners.clear();
        self.sparse.clear();
        self.far.clear();
    }

    fn component_name(&self) -> &'static str {
        type_name::<C>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Owns every component value, keyed by `(cid(C), entity)`.
///
/// References handed out by [`get`](Self::get) and friends borrow the store,
/// so they stay valid until the next mutation of the store.
#[derive(Default)]
pub struct ComponentStore {
    /// Indexed by `ComponentTypeId::index()`; `None` until the type is first stored.
    columns: Vec<Option<Box<dyn ErasedColumn>>>,
}

impl ComponentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    fn column<C: 'static>(&self) -> Option<&Column<C>> {
        let slot = self.columns.get(component_id::<C>().index())?;
        slot.as_ref()?.as_any().downcast_ref::<Column<C>>()
    }

    fn column_mut<C: 'static>(&mut self) -> Option<&mut Column<C>> {
        let slot = self.columns.get_mut(component_id::<C>().index())?;
        slot.as_mut()?.as_any_mut().downcast_mut::<Column<C>>()
    }

    fn column_or_insert<C: 'static>(&mut self) -> &mut Column<C> {
        let idx = component_id::<C>().index();
        if idx >= self.columns.len() {
            self.columns.resize_with(idx + 1, || None);
        }
        let column = self.columns[idx].get_or_insert_with(|| Box::new(Column::<C>::new()));
        match column.as_any_mut().downcast_mut::<Column<C>>() {
            Some(column) => column,
            None => unreachable!("column {idx} does not hold `{}`", type_name::<C>()),
        }
    }

    /// Attach `value` to `entity`, replacing any existing `C`.
    ///
    /// Returns the replaced value, if there was one.
    pub fn add<C: 'static>(&mut self, entity: Entity, value: C) -> Option<C> {
        self.column_or_insert::<C>().insert(entity, value)
    }

    /// Construct-in-place variant of [`add`](Self::add).
    pub fn add_with<C: 'static, F: FnOnce() -> C>(&mut self, entity: Entity, make: F) -> Option<C> {
        self.add(entity, make())
    }

    /// Whether a `C` is stored against `entity`.
    pub fn has<C: 'static>(&self, entity: Entity) -> bool {
        self.column::<C>().is_some_and(|column| column.row(entity).is_some())
    }

    /// The `C` attached to `entity`, or [`EcsError::MissingComponent`].
    pub fn try_get<C: 'static>(&self, entity: Entity) -> Result<&C, EcsError> {
        self.column::<C>()
            .and_then(|column| column.get(entity))
            .ok_or_else(|| EcsError::missing::<C>(entity))
    }

    /// Mutable variant of [`try_get`](Self::try_get).
    pub fn try_get_mut<C: 'static>(&mut self, entity: Entity) -> Result<&mut C, EcsError> {
        self.column_mut::<C>()
            .and_then(|column| column.get_mut(entity))
            .ok_or_else(|| EcsError::missing::<C>(entity))
    }

    /// The `C` attached to `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no `C`. Check with [`has`](Self::has) or use
    /// [`try_get`](Self::try_get) when absence is expected.
    pub fn get<C: 'static>(&self, entity: Entity) -> &C {
        match self.try_get(entity) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Mutable variant of [`get`](Self::get).
    ///
    /// # Panics
    ///
    /// Panics if `entity` has no `C`.
    pub fn get_mut<C: 'static>(&mut self, entity: Entity) -> &mut C {
        match self.try_get_mut(entity) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Detach and return the `C` of `entity`. No-op when absent.
    pub fn remove<C: 'static>(&mut self, entity: Entity) -> Option<C> {
        self.column_mut::<C>()?.remove(entity)
    }

    /// Number of entities carrying a `C`.
    pub fn len<C: 'static>(&self) -> usize {
        self.column::<C>().map_or(0, |column| column.dense.len())
    }

    /// Every `(entity, &C)` pair, in storage order.
    pub fn iter<C: 'static>(&self) -> impl Iterator<Item = (Entity, &C)> + '_ {
        self.column::<C>().into_iter().flat_map(Column::iter)
    }

    /// Every `(entity, &mut C)` pair, in storage order.
    pub fn iter_mut<C: 'static>(&mut self) -> impl Iterator<Item = (Entity, &mut C)> + '_ {
        self.column_mut::<C>().into_iter().flat_map(Column::iter_mut)
    }

    /// Number of component types that have storage allocated.
    pub fn column_count(&self) -> usize {
        self.columns.iter().filter(|column| column.is_some()).count()
    }

    /// Total number of stored components across all types.
    pub fn total_len(&self) -> usize {
        self.columns.iter().flatten().map(|column| column.len()).sum()
    }

    /// Drop every stored component. Columns stay allocated.
    pub fn clear(&mut self) {
        for column in self.columns.iter_mut().flatten() {
            column.clear();
        }
    }
}

impl fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.columns
                    .iter()
                    .flatten()
                    .map(|column| (column.component_name(), column.len())),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
