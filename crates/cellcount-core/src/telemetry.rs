//! Logging setup for binaries and tests built on the model
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to whoever embeds it.

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a formatted subscriber filtered by `RUST_LOG`, or by
/// `default_directive` (e.g. `"cellcount_core=debug"`) when `RUST_LOG` is unset.
///
/// Returns `Ok(false)` if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();

    if installed {
        info!(directive = default_directive, "Tracing initialized");
    }
    Ok(installed)
}
