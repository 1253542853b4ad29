// ABOUTME: Shared logging setup for tether binaries and services embedding generated adapters
// ABOUTME: Three functions: init() for stderr, init_with_level() for verbosity flags, init_for() for one crate

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Standard logging to stderr. Default: INFO level, RUST_LOG override.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Logging to stderr at `level`, RUST_LOG override.
/// Used by the CLI to honor `--verbose`.
pub fn init_with_level(level: Level) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Crate-filtered logging to stderr. Default: INFO for named crate, WARN for everything else.
/// Used by services that only want adapter logs, e.g. `init_for("tether_runtime")`.
pub fn init_for(crate_name: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(crate_name))
        .with_writer(std::io::stderr)
        .init();
}

fn crate_filter(crate_name: &str) -> EnvFilter {
    let directive = format!("{crate_name}=info");
    EnvFilter::from_default_env()
        .add_directive(Level::WARN.into())
        .add_directive(directive.parse().unwrap_or_else(|_| Level::INFO.into()))
}
