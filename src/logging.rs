//! Logging setup for the toolkit's entry points
//!
//! The CLI verbosity counter maps onto a tracing level: `0` shows errors
//! only, `-v` warnings, `-vv` informational round logging, and `-vvv` or
//! more the full debug output. `RUST_LOG` still overrides per-target.

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Map a verbosity counter onto a log level
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Initialize the global subscriber for the given verbosity
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level_for(verbosity)).into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(level_for(0), Level::ERROR);
        assert_eq!(level_for(1), Level::WARN);
        assert_eq!(level_for(2), Level::INFO);
        assert_eq!(level_for(3), Level::DEBUG);
        assert_eq!(level_for(200), Level::DEBUG);
    }

    #[test]
    fn test_init_is_idempotent() {
        init(0);
        init(3);
    }
}
