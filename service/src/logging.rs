use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// JSON lines on stdout, one object per event with the current span
/// attached. `RUST_LOG` overrides the level. Timestamps are left to the
/// log sink.
pub fn logger_setup() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .try_init()
}
