//! The frame driver.
//!
//! [`Engine`] owns the [`World`], the [`EventBus`] and the
//! [`SystemRegistry`], and enforces the lifecycle
//!
//! ```text
//! init(); while running { update(dt); render(); } clean();
//! ```
//!
//! Callers can step it by hand (`update`/`render`/`frame`) with any `dt`, or
//! hand control to [`Engine::run`], which advances at the configured
//! `fixed_dt` until a predicate or the frame limit stops it.
//!
//! # Example
//!
//! ```
//! use cinder_engine::prelude::*;
//!
//! struct Counter(u32);
//!
//! struct Tick;
//!
//! impl System for Tick {
//!     fn update(&mut self, world: &mut World, _dt: f32) {
//!         world.for_each_with::<Counter>(|_, c| c.0 += 1);
//!     }
//! }
//!
//! let mut engine = Engine::new(EngineConfig::default().with_max_frames(10));
//! let e = engine.world_mut().spawn();
//! engine.world_mut().add_component(e, Counter(0));
//! engine.add_system(Tick);
//!
//! let frames = engine.run(|_| true);
//! assert_eq!(frames, 10);
//! assert_eq!(engine.world().get_component::<Counter>(e).0, 10);
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use cinder_ecs::event::EventBus;
use cinder_ecs::system::{System, SystemRegistry};
use cinder_ecs::world::World;
use tracing::{debug, info, trace};

use crate::config::EngineConfig;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed; `init` has not run.
    Created,
    /// `init` has run; frames may be driven.
    Running,
    /// `clean` has run; the engine accepts no further lifecycle calls.
    Cleaned,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Created => "created",
            Phase::Running => "running",
            Phase::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// Timing of the most recent frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameDiagnostics {
    /// Index of the frame these timings belong to (0-based).
    pub frame: u64,
    /// Wall-clock time spent in every system's `update`.
    pub update_time: Duration,
    /// Wall-clock time spent in every system's `render`.
    pub render_time: Duration,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the world, the event bus and the systems, and drives frames.
pub struct Engine {
    world: World,
    events: EventBus,
    systems: SystemRegistry,
    config: EngineConfig,
    phase: Phase,
    /// Frames completed, counted when `render` finishes.
    frame_counter: u64,
    /// Sum of every `dt` passed to `update`.
    elapsed: f64,
    last_diagnostics: FrameDiagnostics,
}

impl Engine {
    /// Create an engine with an empty world and no systems.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(config: EngineConfig) -> Self {
        assert!(
            config.validate().is_ok(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        let events = EventBus::new();
        Self {
            world: World::new(),
            systems: SystemRegistry::new(events.clone()),
            events,
            config,
            phase: Phase::Created,
            frame_counter: 0,
            elapsed: 0.0,
            last_diagnostics: FrameDiagnostics::default(),
        }
    }

    // -- systems ------------------------------------------------------------

    /// Register a system. Systems run in registration order.
    pub fn add_system<S: System>(&mut self, system: S) {
        self.systems.add(system);
    }

    /// Register a default-constructed `S`.
    pub fn add_default_system<S: System + Default>(&mut self) {
        self.systems.add_default::<S>();
    }

    /// Accepted and ignored; systems cannot be removed once registered.
    pub fn remove_system<S: System>(&mut self) {
        self.systems.remove::<S>();
    }

    // -- lifecycle ----------------------------------------------------------

    /// Run every system's `init`.
    ///
    /// # Panics
    ///
    /// Panics unless the engine is in [`Phase::Created`].
    pub fn init(&mut self) {
        self.expect_phase(Phase::Created, "init");
        info!(systems = self.systems.len(), "engine init");
        self.systems.init(&mut self.world);
        self.phase = Phase::Running;
    }

    /// Run every system's `update` with `dt` and add `dt` to [`elapsed`](Self::elapsed).
    ///
    /// # Panics
    ///
    /// Panics unless the engine is in [`Phase::Running`].
    pub fn update(&mut self, dt: f32) {
        self.expect_phase(Phase::Running, "update");
        let start = Instant::now();
        self.systems.update(&mut self.world, dt);
        self.elapsed += f64::from(dt);
        self.last_diagnostics.frame = self.frame_counter;
        self.last_diagnostics.update_time = start.elapsed();
    }

    /// Run every system's `render` and close the current frame.
    ///
    /// # Panics
    ///
    /// Panics unless the engine is in [`Phase::Running`].
    pub fn render(&mut self) {
        self.expect_phase(Phase::Running, "render");
        let start = Instant::now();
        self.systems.render(&mut self.world);
        self.last_diagnostics.frame = self.frame_counter;
        self.last_diagnostics.render_time = start.elapsed();
        trace!(
            frame = self.frame_counter,
            update_us = self.last_diagnostics.update_time.as_micros() as u64,
            render_us = self.last_diagnostics.render_time.as_micros() as u64,
            "frame complete"
        );
        self.frame_counter += 1;
    }

    /// One frame: `update(dt)` followed by `render()`.
    pub fn frame(&mut self, dt: f32) {
        self.update(dt);
        self.render();
    }

    /// Run every system's `clean`.
    ///
    /// # Panics
    ///
    /// Panics unless the engine is in [`Phase::Running`].
    pub fn clean(&mut self) {
        self.expect_phase(Phase::Running, "clean");
        self.systems.clean(&mut self.world);
        self.phase = Phase::Cleaned;
        info!(
            frames = self.frame_counter,
            elapsed = self.elapsed,
            "engine cleaned"
        );
    }

    /// Drive the whole lifecycle at `fixed_dt`.
    ///
    /// Calls `init`, then runs frames while `keep_running` returns `true` and
    /// `max_frames` (if set) has not been reached, then calls `clean`. The
    /// predicate is consulted before every frame. Returns the number of
    /// frames run.
    ///
    /// # Panics
    ///
    /// Panics unless the engine is in [`Phase::Created`].
    pub fn run(&mut self, mut keep_running: impl FnMut(&Engine) -> bool) -> u64 {
        self.init();
        let dt = self.config.fixed_dt;
        let mut frames = 0u64;
        loop {
            if self.config.max_frames.is_some_and(|max| frames >= max) {
                debug!(frames, "frame limit reached");
                break;
            }
            if !keep_running(self) {
                break;
            }
            self.frame(dt);
            frames += 1;
        }
        self.clean();
        frames
    }

    fn expect_phase(&self, expected: Phase, operation: &str) {
        assert!(
            self.phase == expected,
            "Engine::{operation} requires phase {expected}, but the engine is {}",
            self.phase
        );
    }

    // -- accessors ----------------------------------------------------------

    /// The entity and component store.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the store, for setup between frames.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The bus shared with every registered system.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of registered systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// System names in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.names()
    }

    /// Frames completed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// Total simulated seconds, the sum of every `dt` given to `update`.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Timings from the last frame.
    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("phase", &self.phase)
            .field("frames", &self.frame_counter)
            .field("entities", &self.world.entity_count())
            .field("systems", &self.systems.names())
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

    #[derive(Debug, Clone, PartialEq)]
    struct Counter(u64);

    #[derive(Default)]
    struct Increment;

    impl System for Increment {
        fn update(&mut self, world: &mut World, _dt: f32) {
            world.for_each_with::<Counter>(|_, counter| counter.0 += 1);
        }
    }

    struct PhaseLog(Rc<RefCell<Vec<&'static str>>>);

    impl System for PhaseLog {
        fn init(&mut self, _world: &mut World) {
            self.0.borrow_mut().push("init");
        }
        fn update(&mut self, _world: &mut World, _dt: f32) {
            self.0.borrow_mut().push("update");
        }
        fn render(&mut self, _world: &mut World) {
            self.0.borrow_mut().push("render");
        }
        fn clean(&mut self, _world: &mut World) {
            self.0.borrow_mut().push("clean");
        }
    }

    // -- 1. construction ----------------------------------------------------

    #[test]
    fn new_engine_starts_created_and_empty() {
        let engine = Engine::default();
        assert_eq!(engine.phase(), Phase::Created);
        assert_eq!(engine.frame_count(), 0);
        assert_eq!(engine.elapsed(), 0.0);
        assert_eq!(engine.system_count(), 0);
        assert_eq!(engine.world().entity_count(), 0);
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn zero_dt_panics() {
        let _engine = Engine::new(EngineConfig::default().with_fixed_dt(0.0));
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn nan_dt_panics() {
        let _engine = Engine::new(EngineConfig::default().with_fixed_dt(f32::NAN));
    }

    // -- 2. lifecycle -------------------------------------------------------

    #[test]
    fn manual_stepping_follows_phases() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut engine = Engine::default();
        engine.add_system(PhaseLog(Rc::clone(&log)));

        engine.init();
        assert_eq!(engine.phase(), Phase::Running);
        engine.frame(0.25);
        engine.update(0.5);
        engine.render();
        engine.clean();
        assert_eq!(engine.phase(), Phase::Cleaned);

        assert_eq!(
            *log.borrow(),
            vec!["init", "update", "render", "update", "render", "clean"]
        );
        assert_eq!(engine.frame_count(), 2);
        assert!((engine.elapsed() - 0.75).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "Engine::update requires phase running, but the engine is created")]
    fn update_before_init_panics() {
        let mut engine = Engine::default();
        engine.update(1.0);
    }

    #[test]
    #[should_panic(expected = "Engine::init requires phase created")]
    fn double_init_panics() {
        let mut engine = Engine::default();
        engine.init();
        engine.init();
    }

    #[test]
    #[should_panic(expected = "but the engine is cleaned")]
    fn render_after_clean_panics() {
        let mut engine = Engine::default();
        engine.init();
        engine.clean();
        engine.render();
    }

    // -- 3. run -------------------------------------------------------------

    #[test]
    fn run_stops_at_max_frames() {
        let mut engine = Engine::new(EngineConfig::default().with_max_frames(10));
        engine.add_default_system::<Increment>();
        let e = engine.world_mut().spawn();
        engine.world_mut().add_component(e, Counter(0));

        let frames = engine.run(|_| true);

        assert_eq!(frames, 10);
        assert_eq!(engine.frame_count(), 10);
        assert_eq!(engine.world().get_component::<Counter>(e), &Counter(10));
        assert_eq!(engine.phase(), Phase::Cleaned);
    }

    #[test]
    fn run_stops_when_predicate_fails() {
        let mut engine = Engine::new(EngineConfig::default().with_fixed_dt(0.5));
        let frames = engine.run(|engine| engine.elapsed() < 2.0);
        assert_eq!(frames, 4);
        assert_eq!(engine.elapsed(), 2.0);
    }

    #[test]
    fn run_with_false_predicate_still_inits_and_cleans() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut engine = Engine::default();
        engine.add_system(PhaseLog(Rc::clone(&log)));
        assert_eq!(engine.run(|_| false), 0);
        assert_eq!(*log.borrow(), vec!["init", "clean"]);
    }

    // -- 4. accessors -------------------------------------------------------

    #[test]
    fn system_names_and_removal() {
        let mut engine = Engine::default();
        engine.add_default_system::<Increment>();
        engine.remove_system::<Increment>();
        assert_eq!(engine.system_count(), 1);
        assert!(engine.system_names()[0].ends_with("Increment"));
    }

    #[test]
    fn diagnostics_track_last_frame() {
        let mut engine = Engine::default();
        engine.init();
        engine.frame(1.0 / 60.0);
        engine.frame(1.0 / 60.0);
        assert_eq!(engine.last_diagnostics().frame, 1);
    }

    #[test]
    fn debug_output_names_phase() {
        let engine = Engine::default();
        let text = format!("{engine:?}");
        assert!(text.contains("Created"));
    }
}
