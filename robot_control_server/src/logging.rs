// Diagnostic logging for the server binary.
//
// Filter comes from `RUST_LOG` (default `info`); output is compact text on
// stderr. Library code only emits `tracing` events; installing a subscriber
// is the binary's decision, so tests run without one.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Call once, at startup.
///
/// ```bash
/// RUST_LOG=robot_control_server=debug robot-server 3999
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
