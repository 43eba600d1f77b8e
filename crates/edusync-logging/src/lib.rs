//! Logging initialization for the edusync services.
//!
//! Single initialization point via `init(profile)`; every service binary
//! calls it once at startup. Verbosity is controlled through `RUST_LOG`, with
//! a per-profile default when the variable is unset.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Output profile selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output with debug-level default.
    Development,
    /// JSON structured output with info-level default.
    Production,
}

static INIT_ONCE: Once = Once::new();

/// Initialize the tracing subscriber. Idempotent; later calls are no-ops.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| match profile {
        Profile::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("edusync=debug")),
                )
                .init();
        }
        Profile::Production => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("edusync=info")),
                )
                .init();
        }
    });
}
