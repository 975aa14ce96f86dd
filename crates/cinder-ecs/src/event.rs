//! Typed, synchronous publish/subscribe.
//!
//! The [`EventBus`] keeps one slot table per event type, indexed by
//! [`EventTypeId`]. Each slot holds a dispatcher: a capability object that
//! knows the concrete event type and holds a weak reference to one receiver.
//! Type erasure happens once, at [`subscribe`](EventBus::subscribe); a
//! broadcast only downcasts the event back to the type the slot was built for.
//!
//! Receivers own their subscriptions. A receiver embeds a [`Subscriptions`]
//! value that records every `(eid, slot)` handle it holds plus a weak pointer
//! to its bus; dropping the receiver drops the `Subscriptions`, which sweeps
//! those slots off the bus. Both directions are weak, so the bus and its
//! receivers can be dropped in any order.
//!
//! # Delivery during a broadcast
//!
//! A broadcast takes a snapshot of the slot table before delivering.
//! Subscriptions added while it runs are not visited until the next broadcast.
//! Slots removed while it runs (unsubscribe, or a receiver being dropped) are
//! skipped if they have not been reached yet.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use cinder_ecs::event::{EventBus, Receive, Receiver, Subscriptions};
//!
//! struct Ping;
//!
//! #[derive(Default)]
//! struct Counter {
//!     pings: u32,
//!     subscriptions: Subscriptions,
//! }
//!
//! impl Receiver for Counter {
//!     fn subscriptions(&mut self) -> &mut Subscriptions {
//!         &mut self.subscriptions
//!     }
//! }
//!
//! impl Receive<Ping> for Counter {
//!     fn receive(&mut self, _event: &Ping) {
//!         self.pings += 1;
//!     }
//! }
//!
//! let bus = EventBus::new();
//! let counter = Rc::new(RefCell::new(Counter::default()));
//! bus.subscribe::<Ping, _>(&counter);
//!
//! bus.broadcast(Ping);
//! bus.broadcast(Ping);
//! assert_eq!(counter.borrow().pings, 2);
//!
//! drop(counter);
//! assert_eq!(bus.subscriber_count::<Ping>(), 0);
//! ```

use std::any::{type_name, Any};
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::type_id::{event_id, EventTypeId};

// ---------------------------------------------------------------------------
// SlotHandle
// ---------------------------------------------------------------------------

/// Identifies one subscription: `(eid, slot-index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotHandle {
    event: EventTypeId,
    slot: u64,
}

impl SlotHandle {
    /// The event type this subscription listens to.
    pub fn event(self) -> EventTypeId {
        self.event
    }

    /// The slot index within that event type's table.
    pub fn slot(self) -> u64 {
        self.slot
    }
}

// ---------------------------------------------------------------------------
// Receiver traits
// ---------------------------------------------------------------------------

/// An object that can hold subscriptions.
///
/// Implementors embed a [`Subscriptions`] field and expose it here.
pub trait Receiver: 'static {
    /// The receiver's handle list.
    fn subscriptions(&mut self) -> &mut Subscriptions;
}

/// Ability to handle events of type `E`.
pub trait Receive<E: 'static>: Receiver {
    /// Called synchronously for every broadcast of `E` while subscribed.
    fn receive(&mut self, event: &E);
}

// ---------------------------------------------------------------------------
// Dispatch -- the per-slot capability object
// ---------------------------------------------------------------------------

trait Dispatch {
    fn dispatch(&self, event: &dyn Any);
}

struct Dispatcher<E, R> {
    receiver: Weak<RefCell<R>>,
    _event: PhantomData<fn(&E)>,
}

impl<E: 'static, R: Receive<E>> Dispatch for Dispatcher<E, R> {
    fn dispatch(&self, event: &dyn Any) {
        let Some(event) = event.downcast_ref::<E>() else {
            unreachable!("slot for `{}` got a different event type", type_name::<E>());
        };
        let Some(cell) = self.receiver.upgrade() else {
            warn!(
                event = type_name::<E>(),
                receiver = type_name::<R>(),
                "receiver dropped before its slot was swept"
            );
            return;
        };
        let mut receiver = borrow_receiver::<R>(&cell);
        receiver.receive(event);
    }
}

fn borrow_receiver<R: 'static>(cell: &RefCell<R>) -> RefMut<'_, R> {
    match cell.try_borrow_mut() {
        Ok(receiver) => receiver,
        Err(_) => panic!(
            "receiver `{}` is already borrowed; it cannot be subscribed to or \
             delivered an event from inside its own borrow",
            type_name::<R>()
        ),
    }
}

// ---------------------------------------------------------------------------
// Bus internals
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SlotTable {
    next_slot: u64,
    /// Keyed by slot index; slot indices grow monotonically, so key order is
    /// subscription order.
    slots: BTreeMap<u64, Rc<dyn Dispatch>>,
}

#[derive(Default)]
struct BusState {
    /// Indexed by `EventTypeId::index()`.
    tables: Vec<SlotTable>,
}

impl BusState {
    fn table(&self, event: EventTypeId) -> Option<&SlotTable> {
        self.tables.get(event.index())
    }

    fn insert(&mut self, event: EventTypeId, dispatcher: Rc<dyn Dispatch>) -> SlotHandle {
        let idx = event.index();
        if idx >= self.tables.len() {
            self.tables.resize_with(idx + 1, SlotTable::default);
        }
        let table = &mut self.tables[idx];
        let slot = table.next_slot;
        table.next_slot += 1;
        table.slots.insert(slot, dispatcher);
        SlotHandle { event, slot }
    }

    fn remove(&mut self, handle: SlotHandle) -> bool {
        self.tables
            .get_mut(handle.event.index())
            .is_some_and(|table| table.slots.remove(&handle.slot).is_some())
    }

    fn contains(&self, handle: SlotHandle) -> bool {
        self.table(handle.event)
            .is_some_and(|table| table.slots.contains_key(&handle.slot))
    }
}

// ---------------------------------------------------------------------------
// Subscriptions -- the receiver-side handle list
// ---------------------------------------------------------------------------

/// Handle list embedded in every [`Receiver`].
///
/// Bound to one bus by the first subscription made through it; it may rebind
/// once it holds nothing or that bus is gone. Dropping it removes every slot
/// it still holds from that bus.
#[derive(Debug, Default)]
pub struct Subscriptions {
    bus: Option<Weak<RefCell<BusState>>>,
    handles: Vec<SlotHandle>,
}

impl Subscriptions {
    /// An empty, unbound handle list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Live handles in subscription order.
    pub fn handles(&self) -> &[SlotHandle] {
        &self.handles
    }

    /// Whether this list is bound to `bus`.
    pub fn is_bound_to(&self, bus: &EventBus) -> bool {
        self.bus
            .as_ref()
            .is_some_and(|weak| Weak::as_ptr(weak) == Rc::as_ptr(&bus.state))
    }

    /// Drop every subscription to `E`. Returns how many slots left the bus.
    ///
    /// Safe to call from inside [`Receive::receive`].
    pub fn unsubscribe<E: 'static>(&mut self) -> usize {
        let event = event_id::<E>();
        let Some(shared) = self.bus.as_ref().and_then(Weak::upgrade) else {
            self.handles.retain(|handle| handle.event != event);
            return 0;
        };
        let mut bus = shared.borrow_mut();
        let mut removed = 0;
        self.handles.retain(|&handle| {
            if handle.event != event {
                return true;
            }
            if bus.remove(handle) {
                removed += 1;
            }
            false
        });
        trace!(event = type_name::<E>(), removed, "unsubscribed");
        removed
    }

    /// Drop every subscription. Returns how many slots left the bus.
    pub fn clear(&mut self) -> usize {
        let handles = std::mem::take(&mut self.handles);
        if handles.is_empty() {
            return 0;
        }
        let Some(shared) = self.bus.as_ref().and_then(Weak::upgrade) else {
            return 0;
        };
        let mut bus = shared.borrow_mut();
        handles.into_iter().filter(|&handle| bus.remove(handle)).count()
    }

    fn bind(&mut self, bus: &EventBus) {
        if self.is_bound_to(bus) {
            return;
        }
        if let Some(current) = &self.bus {
            assert!(
                self.handles.is_empty() || current.strong_count() == 0,
                "receiver is already subscribed through a different event bus"
            );
            // Either nothing is held, or the old bus is gone and with it every
            // slot these handles named.
            self.handles.clear();
        }
        self.bus = Some(Rc::downgrade(&bus.state));
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        let swept = self.clear();
        if swept > 0 {
            debug!(swept, "receiver dropped; subscriptions swept");
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Shared handle to an event bus. Clones refer to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Rc<RefCell<BusState>>,
}

impl EventBus {
    /// Create a bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `receiver` to events of type `E`.
    ///
    /// Every call allocates a new slot, so subscribing twice means receiving
    /// each broadcast twice.
    ///
    /// # Panics
    ///
    /// Panics if `receiver` is currently borrowed, or if it already holds
    /// subscriptions on a different bus that is still alive.
    pub fn subscribe<E: 'static, R: Receive<E>>(&self, receiver: &Rc<RefCell<R>>) -> SlotHandle {
        let mut guard = borrow_receiver::<R>(receiver);
        let subscriptions = guard.subscriptions();
        subscriptions.bind(self);

        let dispatcher: Rc<dyn Dispatch> = Rc::new(Dispatcher::<E, R> {
            receiver: Rc::downgrade(receiver),
            _event: PhantomData,
        });
        let handle = self.state.borrow_mut().insert(event_id::<E>(), dispatcher);
        subscriptions.handles.push(handle);

        trace!(
            event = type_name::<E>(),
            receiver = type_name::<R>(),
            slot = handle.slot,
            "subscribed"
        );
        handle
    }

    /// Remove every subscription `receiver` holds for `E` on this bus.
    ///
    /// Returns the number of slots removed; 0 when not subscribed.
    pub fn unsubscribe<E: 'static, R: Receiver>(&self, receiver: &Rc<RefCell<R>>) -> usize {
        let mut guard = borrow_receiver::<R>(receiver);
        let subscriptions = guard.subscriptions();
        if !subscriptions.is_bound_to(self) {
            return 0;
        }
        subscriptions.unsubscribe::<E>()
    }

    /// Deliver `event` to every current subscriber of `E`, in subscription order.
    pub fn broadcast<E: 'static>(&self, event: E) {
        self.broadcast_ref(&event);
    }

    /// Construct an `E` with [`Default`] and broadcast it.
    pub fn broadcast_default<E: Default + 'static>(&self) {
        self.broadcast(E::default());
    }

    /// Deliver a borrowed `event`. See [`broadcast`](Self::broadcast).
    pub fn broadcast_ref<E: 'static>(&self, event: &E) {
        let id = event_id::<E>();
        let snapshot: Vec<(SlotHandle, Rc<dyn Dispatch>)> = {
            let state = self.state.borrow();
            let Some(table) = state.table(id) else {
                return;
            };
            table
                .slots
                .iter()
                .map(|(&slot, dispatcher)| (SlotHandle { event: id, slot }, Rc::clone(dispatcher)))
                .collect()
        };
        trace!(event = type_name::<E>(), subscribers = snapshot.len(), "broadcast");

        for (handle, dispatcher) in snapshot {
            // A subscriber earlier in this broadcast may have removed it.
            if !self.state.borrow().contains(handle) {
                continue;
            }
            dispatcher.dispatch(event);
        }
    }

    /// Number of live slots for `E`.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.state
            .borrow()
            .table(event_id::<E>())
            .map_or(0, |table| table.slots.len())
    }

    /// Number of live slots across all event types.
    pub fn total_subscriptions(&self) -> usize {
        self.state.borrow().tables.iter().map(|table| table.slots.len()).sum()
    }

    /// Whether `self` and `other` are handles to the same bus.
    pub fn ptr_eq(&self, other: &EventBus) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.total_subscriptions())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
