//! Subscriber setup for hosts that have none
//!
//! The engine only emits `tracing` events. Hosts with their own subscriber
//! skip this module entirely.

use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;

/// Filter directive used when `RUST_LOG` is unset
pub fn default_directive(config: &CoreConfig) -> &'static str {
    if config.debug {
        "debug"
    } else {
        "info"
    }
}

/// Install a fmt subscriber as the global default
///
/// `RUST_LOG` wins over the config. Returns false if a global subscriber was
/// already installed.
pub fn init(config: &CoreConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(version = config.version, debug = config.debug, "resrec logging ready");
    }
    installed
}
