//! Tracing setup for hosts that embed the checkout.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,regflow=debug";

/// Installs a fmt subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=regflow_core=trace` - Trace the engine only
/// - Default: INFO, DEBUG for regflow crates
///
/// Returns false if a global subscriber was already installed, which is
/// normal when the host application sets up its own.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
