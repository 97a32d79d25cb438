//! `tracing` subscriber setup.
//!
//! The debug console and the C boundary both log through `tracing`. A host
//! embedding the library may already have installed a global subscriber, so
//! installation uses `try_init` and quietly keeps the existing one.

use tracing_subscriber::EnvFilter;

/// Installs a stderr `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to `default_level`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_rejected() {
        init_logging("debug");
        assert!(!init_logging("info"), "a global subscriber can only be set once");
    }
}
