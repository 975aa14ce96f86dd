//! Systems and the ordered registry that drives them.
//!
//! A [`System`] is a unit of behaviour with four lifecycle hooks. The
//! [`SystemRegistry`] owns systems in registration order and walks them for
//! each hook, so the expected call pattern
//!
//! ```text
//! init(); while running { update(dt); render(); } clean();
//! ```
//!
//! runs every system's `update` (in order) before any system's `render`.
//! The registry imposes no cadence: `dt` is whatever the caller passes.

use std::any::type_name;
use std::fmt;

use tracing::{debug, debug_span};

use crate::event::EventBus;
use crate::world::World;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Behaviour invoked once per lifecycle phase against the entity store.
///
/// Systems keep no per-entity state of their own; per-entity state lives in
/// components. Every hook defaults to doing nothing.
pub trait System: 'static {
    /// Name used in logs and diagnostics. Defaults to the Rust type name.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Receives a handle to the registry's event bus when the system is
    /// registered. Systems that broadcast keep it.
    fn attach(&mut self, _events: EventBus) {}

    /// Runs once before the first frame.
    fn init(&mut self, _world: &mut World) {}

    /// Runs once per frame, before any system renders.
    fn update(&mut self, _world: &mut World, _dt: f32) {}

    /// Runs once per frame, after every system has updated.
    fn render(&mut self, _world: &mut World) {}

    /// Runs once after the last frame.
    fn clean(&mut self, _world: &mut World) {}
}

// ---------------------------------------------------------------------------
// SystemRegistry
// ---------------------------------------------------------------------------

/// Ordered list of systems plus the event bus they are given.
pub struct SystemRegistry {
    systems: Vec<Box<dyn System>>,
    events: EventBus,
}

impl SystemRegistry {
    /// Create an empty registry that hands `events` to each system it receives.
    pub fn new(events: EventBus) -> Self {
        Self {
            systems: Vec::new(),
            events,
        }
    }

    /// The bus handed to registered systems.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Append `system`; it runs after every system registered before it.
    pub fn add<S: System>(&mut self, mut system: S) {
        system.attach(self.events.clone());
        debug!(
            system = system.name(),
            position = self.systems.len(),
            "system registered"
        );
        self.systems.push(Box::new(system));
    }

    /// Construct an `S` with [`Default`] and register it.
    pub fn add_default<S: System + Default>(&mut self) {
        self.add(S::default());
    }

    /// System removal is not supported; the call is accepted and ignored.
    pub fn remove<S: System>(&mut self) {
        debug!(
            system = type_name::<S>(),
            "system removal is not supported; ignoring"
        );
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether no system is registered.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Names of all systems, in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.systems.iter().map(|system| system.name()).collect()
    }

    /// Run every system's `init` hook.
    pub fn init(&mut self, world: &mut World) {
        self.each("init", |system| system.init(world));
    }

    /// Run every system's `update` hook with the caller's `dt`.
    pub fn update(&mut self, world: &mut World, dt: f32) {
        self.each("update", |system| system.update(world, dt));
    }

    /// Run every system's `render` hook.
    pub fn render(&mut self, world: &mut World) {
        self.each("render", |system| system.render(world));
    }

    /// Run every system's `clean` hook.
    pub fn clean(&mut self, world: &mut World) {
        self.each("clean", |system| system.clean(world));
    }

    fn each(&mut self, phase: &'static str, mut hook: impl FnMut(&mut dyn System)) {
        for system in &mut self.systems {
            let _span = debug_span!("system", phase, name = system.name()).entered();
            hook(system.as_mut());
        }
    }
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::new(EventBus::new())
    }
}

impl fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRegistry")
            .field("systems", &self.names())
            .field("events", &self.events)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        log: Log,
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn init(&mut self, _world: &mut World) {
            self.log.borrow_mut().push(format!("{}.init", self.label));
        }

        fn update(&mut self, _world: &mut World, dt: f32) {
            self.log.borrow_mut().push(format!("{}.update({dt})", self.label));
        }

        fn render(&mut self, _world: &mut World) {
            self.log.borrow_mut().push(format!("{}.render", self.label));
        }

        fn clean(&mut self, _world: &mut World) {
            self.log.borrow_mut().push(format!("{}.clean", self.label));
        }
    }

    #[derive(Default)]
    struct Silent;

    impl System for Silent {}

    #[derive(Default)]
    struct Tracker {
        bus: Option<EventBus>,
    }

    impl System for Tracker {
        fn attach(&mut self, events: EventBus) {
            self.bus = Some(events);
        }

        fn update(&mut self, world: &mut World, _dt: f32) {
            assert!(self.bus.is_some(), "bus attached before first hook");
            world.spawn();
        }
    }

    fn registry_with(labels: &[&'static str], log: &Log) -> SystemRegistry {
        let mut registry = SystemRegistry::default();
        for &label in labels {
            registry.add(Recorder {
                label,
                log: Rc::clone(log),
            });
        }
        registry
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let log: Log = Rc::default();
        let mut registry = registry_with(&["a", "b"], &log);
        let mut world = World::new();

        registry.init(&mut world);
        registry.update(&mut world, 0.5);
        registry.render(&mut world);
        registry.clean(&mut world);

        assert_eq!(
            *log.borrow(),
            vec![
                "a.init",
                "b.init",
                "a.update(0.5)",
                "b.update(0.5)",
                "a.render",
                "b.render",
                "a.clean",
                "b.clean",
            ]
        );
    }

    #[test]
    fn names_follow_registration_order() {
        let log: Log = Rc::default();
        let mut registry = registry_with(&["physics", "audio"], &log);
        registry.add_default::<Silent>();
        assert_eq!(registry.len(), 3);
        let names = registry.names();
        assert_eq!(&names[..2], &["physics", "audio"]);
        assert!(names[2].ends_with("Silent"));
    }

    #[test]
    fn remove_is_a_noop() {
        let mut registry = SystemRegistry::default();
        registry.add_default::<Silent>();
        registry.remove::<Silent>();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn systems_receive_the_registry_bus() {
        let bus = EventBus::new();
        let mut registry = SystemRegistry::new(bus.clone());
        registry.add_default::<Tracker>();
        assert!(registry.events().ptr_eq(&bus));

        let mut world = World::new();
        registry.update(&mut world, 1.0);
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn empty_registry_runs_nothing() {
        let mut registry = SystemRegistry::default();
        let mut world = World::new();
        assert!(registry.is_empty());
        registry.init(&mut world);
        registry.update(&mut world, 1.0 / 60.0);
        registry.render(&mut world);
        registry.clean(&mut world);
        assert_eq!(world.entity_count(), 0);
    }
}
