//! Tracing subscriber setup for binaries and demos.

use tracing_subscriber::{fmt::time, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// When `RUST_LOG` is unset or unparsable, `default_filter` (an `EnvFilter`
/// directive such as `"info"` or `"cinder_ecs=debug"`) is used instead.
///
/// Only the first call installs anything. Later calls find a global
/// subscriber already set and return `Ok(())` after a debug message.
pub fn init(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_timer(time::uptime()),
        )
        .with(filter)
        .try_init();

    if let Err(err) = installed {
        tracing::debug!(%err, "tracing subscriber already installed");
    }
    Ok(())
}
