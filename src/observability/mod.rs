//! Observability
//!
//! The library only emits `tracing` events. Applications that want them
//! printed call `init_tracing` once at startup.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::LogConfig;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Builds the filter: `RUST_LOG` wins over the configured directive
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Installs a global fmt subscriber.
///
/// Returns `false` if this or another subscriber was already installed.
pub fn init_tracing(config: &LogConfig) -> bool {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return false;
    }

    let registry = tracing_subscriber::registry().with(env_filter(config));
    let installed = if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    installed.is_ok()
}
