//! Cinder Engine -- frame driver, configuration and logging on top of
//! [`cinder_ecs`].
//!
//! The [`Engine`](engine::Engine) owns a world, an event bus and the ordered
//! system registry, and enforces the `init` / `update` + `render` / `clean`
//! lifecycle.
//!
//! # Quick Start
//!
//! ```
//! use cinder_engine::prelude::*;
//!
//! let config = EngineConfig::from_json_str(r#"{ "max_frames": 3 }"#).unwrap();
//! let mut engine = Engine::new(config);
//! engine.world_mut().spawn();
//!
//! assert_eq!(engine.run(|_| true), 3);
//! assert_eq!(engine.phase(), Phase::Cleaned);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod logging;

/// Re-export the ECS crate for convenience.
pub use cinder_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while configuring the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The configuration could not be parsed.
    #[error("invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read engine configuration: {0}")]
    Io(#[from] std::io::Error),

    /// `fixed_dt` was zero, negative, NaN or infinite.
    #[error("fixed_dt must be positive and finite, got {0}")]
    InvalidTimestep(f32),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use cinder_ecs::prelude::*;

    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, FrameDiagnostics, Phase};
    pub use crate::EngineError;
}
