//! Logging bootstrap
//!
//! The framework emits structured events through `tracing`; applications
//! call [`init`] once at startup to install a formatted subscriber. The
//! `RUST_LOG` filter syntax applies, defaulting to `info`.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // try_init so tests that each bootstrap an app do not fight over the
    // global subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
