//! Tracing bootstrap for hosts embedding the engine
//!
//! The library itself only emits `tracing` events. Binaries and test harnesses
//! call [`init_tracing`] once to route them to stderr, filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_directive`
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let _ = init_tracing("objectspace_core=debug");
        assert!(!init_tracing("objectspace_core=debug"));
    }
}
