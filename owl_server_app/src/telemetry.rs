use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes the global subscriber: compact console output, with the
/// level taken from `RUST_LOG` (default `info`).
pub fn init_subscriber() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let formatting_layer = fmt::layer().compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .init();
}
