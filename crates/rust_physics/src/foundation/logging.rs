//! Logging utilities and structured logging support
//!
//! All physics modules log through the `log` facade with a bracketed tag
//! naming the subsystem (`[Rapier]`, `[Reference]`, `[PhysicsSystem]`,
//! `[PhysicsSync]`), so a host can filter by engine with `RUST_LOG`.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from the `RUST_LOG` environment variable
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a default level
///
/// `RUST_LOG` still overrides `level` when it is set. Calling this more than
/// once is harmless, later calls are ignored.
pub fn init_with_level(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
