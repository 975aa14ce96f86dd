//! Minimal game loop: named game objects, a system that lists them, and an
//! event receiver that counts frames.
//!
//! Run with `cargo run -p cinder-engine --example game_object`. Set
//! `RUST_LOG=debug` to see the ECS internals.

use std::cell::RefCell;
use std::rc::Rc;

use cinder_engine::logging;
use cinder_engine::prelude::*;

#[derive(Debug, Clone)]
struct GameObject {
    name: String,
    tag: String,
}

#[derive(Debug, Clone, Copy)]
struct FrameTick {
    dt: f32,
}

/// Prints every game object once, then announces each update on the bus.
#[derive(Default)]
struct GameObjectSystem {
    events: Option<EventBus>,
}

impl System for GameObjectSystem {
    fn name(&self) -> &str {
        "game_objects"
    }

    fn attach(&mut self, events: EventBus) {
        self.events = Some(events);
    }

    fn init(&mut self, world: &mut World) {
        for &entity in world.entities() {
            if let Ok(object) = world.try_get_component::<GameObject>(entity) {
                println!("{entity}: {} [{}]", object.name, object.tag);
            }
        }
    }

    fn update(&mut self, _world: &mut World, dt: f32) {
        if let Some(events) = &self.events {
            events.broadcast(FrameTick { dt });
        }
    }
}

#[derive(Default)]
struct FrameCounter {
    frames: u64,
    simulated: f32,
    subscriptions: Subscriptions,
}

impl Receiver for FrameCounter {
    fn subscriptions(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }
}

impl Receive<FrameTick> for FrameCounter {
    fn receive(&mut self, event: &FrameTick) {
        self.frames += 1;
        self.simulated += event.dt;
    }
}

fn main() -> anyhow::Result<()> {
    let config = EngineConfig::default().with_max_frames(120);
    logging::init(&config.log_filter)?;

    let mut engine = Engine::new(config);
    engine.add_default_system::<GameObjectSystem>();

    for (name, tag) in [("player", "hero"), ("goblin", "enemy"), ("chest", "loot")] {
        let world = engine.world_mut();
        let entity = world.create_entity();
        world.add_component(
            entity,
            GameObject {
                name: name.to_owned(),
                tag: tag.to_owned(),
            },
        );
        world.add_entity(entity);
    }

    let counter = Rc::new(RefCell::new(FrameCounter::default()));
    engine.events().subscribe::<FrameTick, _>(&counter);

    let frames = engine.run(|_| true);

    let counter = counter.borrow();
    println!(
        "ran {frames} frames, receiver saw {} ticks covering {:.2}s",
        counter.frames, counter.simulated
    );
    Ok(())
}
